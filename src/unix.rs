use std::{fs::File, io, path::Path};

use nix::unistd::AccessFlags;

/// Bytes an unprivileged writer may still allocate on the filesystem holding `path`.
#[allow(clippy::unnecessary_cast)]
pub(crate) fn free_space_bytes(path: &Path) -> io::Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path)?;
    let fragment = stat.fragment_size() as u64;
    Ok((stat.blocks_available() as u64).saturating_mul(fragment))
}

/// Asks the kernel to commit every dirty buffer of every filesystem.
///
/// sync(2) is allowed to return before the writeback completes on some
/// systems, which is why callers pause afterwards.
pub(crate) fn sync_filesystems() -> io::Result<()> {
    nix::unistd::sync();
    Ok(())
}

pub(crate) fn is_writable(path: &Path) -> bool {
    nix::unistd::access(path, AccessFlags::W_OK).is_ok()
}

/// Evicts the file's pages from the page cache so the next read has to go to the device.
///
/// Best effort: the kernel may ignore the hint for pages it considers busy.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn drop_cached_pages(file: &File) {
    use nix::fcntl::{posix_fadvise, PosixFadviseAdvice};
    use std::os::fd::AsRawFd;

    if let Err(errno) = posix_fadvise(
        file.as_raw_fd(),
        0,
        0,
        PosixFadviseAdvice::POSIX_FADV_DONTNEED,
    ) {
        tracing::debug!(%errno, "Could not drop cached pages");
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) fn drop_cached_pages(_file: &File) {}
