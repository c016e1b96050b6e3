//! In-memory drives for exercising the engine against misbehaving media.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    io::{self, Read, Write},
    path::Path,
};

use crate::cancel::CancelToken;
use crate::volume::{DirectoryVolume, MediumWriter, Volume};

#[derive(Debug, Clone, Copy)]
struct Extent {
    offset: u64,
    len: u64,
}

/// A flash drive whose firmware may claim more space than it has.
///
/// Files are laid out back to back in creation order. Writes past
/// `physical` bytes are accepted and thrown away; reads past it alias onto
/// `offset % physical`, which is how the cheap controllers in counterfeit
/// drives decode addresses. Writing past `advertised` fails as a full disk.
pub(crate) struct SimulatedDrive {
    advertised: u64,
    physical: u64,
    reported_free: Option<u64>,
    cells: RefCell<Vec<u8>>,
    files: RefCell<BTreeMap<String, Extent>>,
    next_offset: Cell<u64>,
    bad_cells: Vec<u64>,
    write_error: Option<io::ErrorKind>,
    cancel_on_open: Option<CancelToken>,
    prepared: Cell<bool>,
    filesystem_syncs: Cell<usize>,
}

impl SimulatedDrive {
    pub(crate) fn genuine(capacity: u64) -> Self {
        Self::counterfeit(capacity, capacity)
    }

    pub(crate) fn counterfeit(advertised: u64, physical: u64) -> Self {
        assert!(physical > 0 && physical <= advertised);
        Self {
            advertised,
            physical,
            reported_free: None,
            cells: RefCell::new(vec![0; physical as usize]),
            files: RefCell::new(BTreeMap::new()),
            next_offset: Cell::new(0),
            bad_cells: Vec::new(),
            write_error: None,
            cancel_on_open: None,
            prepared: Cell::new(false),
            filesystem_syncs: Cell::new(0),
        }
    }

    /// Reports this much free space regardless of what is actually left.
    pub(crate) fn reporting_free(mut self, bytes: u64) -> Self {
        self.reported_free = Some(bytes);
        self
    }

    /// Flips the lowest bit of the byte at this physical offset on every read.
    pub(crate) fn with_bad_cell(mut self, offset: u64) -> Self {
        self.bad_cells.push(offset);
        self
    }

    /// Every write call fails with this error.
    pub(crate) fn failing_writes(mut self, kind: io::ErrorKind) -> Self {
        self.write_error = Some(kind);
        self
    }

    /// Trips `token` as soon as the first file is opened for reading.
    pub(crate) fn cancelling_on_open(mut self, token: CancelToken) -> Self {
        self.cancel_on_open = Some(token);
        self
    }

    pub(crate) fn remaining_files(&self) -> usize {
        self.files.borrow().len()
    }

    pub(crate) fn is_prepared(&self) -> bool {
        self.prepared.get()
    }

    pub(crate) fn filesystem_syncs(&self) -> usize {
        self.filesystem_syncs.get()
    }

    fn extent(&self, name: &str) -> io::Result<Extent> {
        self.files
            .borrow()
            .get(name)
            .copied()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

struct DriveWriter<'a> {
    drive: &'a SimulatedDrive,
    name: String,
}

impl Write for DriveWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self.drive.write_error {
            return Err(io::Error::new(kind, "simulated write error"));
        }
        let mut extent = self.drive.extent(&self.name)?;
        let pos = extent.offset + extent.len;
        let room = self.drive.advertised.saturating_sub(pos);
        let n = (buf.len() as u64).min(room) as usize;
        {
            let mut cells = self.drive.cells.borrow_mut();
            for (i, byte) in buf[..n].iter().enumerate() {
                let at = pos + i as u64;
                if at < self.drive.physical {
                    cells[at as usize] = *byte;
                }
            }
        }
        extent.len += n as u64;
        self.drive.files.borrow_mut().insert(self.name.clone(), extent);
        self.drive
            .next_offset
            .set(self.drive.next_offset.get().max(pos + n as u64));
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl MediumWriter for DriveWriter<'_> {
    fn sync_to_medium(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct DriveReader<'a> {
    drive: &'a SimulatedDrive,
    extent: Extent,
    pos: u64,
}

impl Read for DriveReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.extent.len - self.pos;
        let n = (buf.len() as u64).min(left) as usize;
        let cells = self.drive.cells.borrow();
        for (i, out) in buf[..n].iter_mut().enumerate() {
            let at = (self.extent.offset + self.pos + i as u64) % self.drive.physical;
            let mut byte = cells[at as usize];
            if self.drive.bad_cells.contains(&at) {
                byte ^= 1;
            }
            *out = byte;
        }
        self.pos += n as u64;
        Ok(n)
    }
}

impl Volume for SimulatedDrive {
    fn location(&self) -> &Path {
        Path::new("/simulated")
    }

    fn available_bytes(&self) -> io::Result<u64> {
        Ok(self
            .reported_free
            .unwrap_or(self.advertised - self.next_offset.get()))
    }

    fn prepare(&mut self) -> io::Result<()> {
        self.prepared.set(true);
        Ok(())
    }

    fn create_new(&self, name: &str) -> io::Result<Box<dyn MediumWriter + '_>> {
        let mut files = self.files.borrow_mut();
        if files.contains_key(name) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }
        files.insert(
            name.to_string(),
            Extent {
                offset: self.next_offset.get(),
                len: 0,
            },
        );
        Ok(Box::new(DriveWriter {
            drive: self,
            name: name.to_string(),
        }))
    }

    fn file_len(&self, name: &str) -> io::Result<u64> {
        Ok(self.extent(name)?.len)
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        if let Some(token) = &self.cancel_on_open {
            token.cancel();
        }
        Ok(Box::new(DriveReader {
            drive: self,
            extent: self.extent(name)?,
            pos: 0,
        }))
    }

    fn sync_filesystem(&self) -> io::Result<()> {
        self.filesystem_syncs.set(self.filesystem_syncs.get() + 1);
        Ok(())
    }

    fn remove_file(&self, name: &str) -> io::Result<()> {
        self.files.borrow_mut().remove(name);
        Ok(())
    }

    fn teardown(&mut self) -> io::Result<()> {
        self.files.borrow_mut().clear();
        self.prepared.set(false);
        Ok(())
    }
}

/// A real directory that trips a cancel token when verification starts.
pub(crate) struct CancelOnOpen {
    pub inner: DirectoryVolume,
    pub token: CancelToken,
}

impl Volume for CancelOnOpen {
    fn location(&self) -> &Path {
        self.inner.location()
    }

    fn available_bytes(&self) -> io::Result<u64> {
        self.inner.available_bytes()
    }

    fn prepare(&mut self) -> io::Result<()> {
        self.inner.prepare()
    }

    fn create_new(&self, name: &str) -> io::Result<Box<dyn MediumWriter + '_>> {
        self.inner.create_new(name)
    }

    fn file_len(&self, name: &str) -> io::Result<u64> {
        self.inner.file_len(name)
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        self.token.cancel();
        self.inner.open(name)
    }

    fn sync_filesystem(&self) -> io::Result<()> {
        self.inner.sync_filesystem()
    }

    fn remove_file(&self, name: &str) -> io::Result<()> {
        self.inner.remove_file(name)
    }

    fn teardown(&mut self) -> io::Result<()> {
        self.inner.teardown()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn drops_writes_past_physical_and_aliases_reads() {
        let drive = SimulatedDrive::counterfeit(8, 4);
        {
            let mut out = drive.create_new("a").unwrap();
            out.write_all(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        }
        let mut back = Vec::new();
        drive.open("a").unwrap().read_to_end(&mut back).unwrap();
        assert_eq!(back, vec![1, 2, 3, 4, 1, 2, 3, 4]);
        assert_eq!(drive.available_bytes().unwrap(), 0);
    }

    #[test]
    fn full_drive_refuses_more() {
        let drive = SimulatedDrive::genuine(4);
        let mut out = drive.create_new("a").unwrap();
        let err = out.write_all(&[0; 5]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        drop(out);
        assert_eq!(drive.file_len("a").unwrap(), 4);
    }
}
