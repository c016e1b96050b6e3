//! The medium under test, as seen by the engine.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use tempfile::TempDir;
use tracing::debug;

use crate::platform;

/// A mount point that has been checked to be a writable directory.
#[derive(Debug, Clone)]
pub(crate) struct ValidVolume {
    pub path: PathBuf,
}

impl FromStr for ValidVolume {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = PathBuf::from(s);
        let meta = fs::metadata(&path)
            .map_err(|e| anyhow::anyhow!("The volume {:?} can not be accessed: {}", path, e))?;
        if !meta.is_dir() {
            anyhow::bail!("The volume {:?} is not a directory.", path);
        }
        if !platform::is_writable(&path) {
            anyhow::bail!("The volume {:?} is not writable.", path);
        }
        Ok(Self { path })
    }
}

/// A test file being written that can be forced onto the physical medium.
pub(crate) trait MediumWriter: Write {
    /// Blocks until the data written so far has left every volatile cache.
    fn sync_to_medium(&mut self) -> io::Result<()>;
}

impl MediumWriter for File {
    fn sync_to_medium(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// Storage that test files are written to and read back from.
///
/// File names are relative to a per-run container that [Volume::prepare]
/// creates and [Volume::teardown] removes.
pub(crate) trait Volume {
    /// Where the volume lives, for messages.
    fn location(&self) -> &Path;

    fn available_bytes(&self) -> io::Result<u64>;

    fn prepare(&mut self) -> io::Result<()>;

    /// Creates a new file for exclusive writing; fails if it exists.
    fn create_new(&self, name: &str) -> io::Result<Box<dyn MediumWriter + '_>>;

    fn file_len(&self, name: &str) -> io::Result<u64>;

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + '_>>;

    /// Whole-filesystem barrier issued once every file has been written.
    fn sync_filesystem(&self) -> io::Result<()>;

    fn remove_file(&self, name: &str) -> io::Result<()>;

    fn teardown(&mut self) -> io::Result<()>;
}

/// A directory on a mounted filesystem.
#[derive(Debug)]
pub(crate) struct DirectoryVolume {
    root: PathBuf,
    run_dir: Option<TempDir>,
}

impl DirectoryVolume {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            run_dir: None,
        }
    }

    fn path_of(&self, name: &str) -> io::Result<PathBuf> {
        match &self.run_dir {
            Some(dir) => Ok(dir.path().join(name)),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "test directory has not been created",
            )),
        }
    }
}

impl Volume for DirectoryVolume {
    fn location(&self) -> &Path {
        &self.root
    }

    fn available_bytes(&self) -> io::Result<u64> {
        platform::free_space_bytes(&self.root)
    }

    fn prepare(&mut self) -> io::Result<()> {
        if self.run_dir.is_none() {
            let dir = tempfile::Builder::new()
                .prefix("capacity_test_")
                .tempdir_in(&self.root)?;
            debug!(path = ?dir.path(), "Created test directory");
            self.run_dir = Some(dir);
        }
        Ok(())
    }

    fn create_new(&self, name: &str) -> io::Result<Box<dyn MediumWriter + '_>> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_of(name)?)?;
        Ok(Box::new(file))
    }

    fn file_len(&self, name: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.path_of(name)?)?.len())
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        let file = File::open(self.path_of(name)?)?;
        platform::drop_cached_pages(&file);
        Ok(Box::new(file))
    }

    fn sync_filesystem(&self) -> io::Result<()> {
        platform::sync_filesystems()
    }

    fn remove_file(&self, name: &str) -> io::Result<()> {
        match fs::remove_file(self.path_of(name)?) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn teardown(&mut self) -> io::Result<()> {
        match self.run_dir.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}
