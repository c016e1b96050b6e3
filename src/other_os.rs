use std::{fs::File, io, path::Path};

use tracing::warn;

pub(crate) fn free_space_bytes(path: &Path) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("Can not query free space of {path:?} on this platform - pass an explicit size instead"),
    ))
}

/// There is no portable whole-filesystem sync here; every test file is
/// already synced individually.
pub(crate) fn sync_filesystems() -> io::Result<()> {
    warn!("No global filesystem sync available on this platform; relying on per-file syncs");
    Ok(())
}

pub(crate) fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false)
}

pub(crate) fn drop_cached_pages(_file: &File) {}
