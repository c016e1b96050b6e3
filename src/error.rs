//! Failures that end a capacity test without a report.

use std::{io, path::PathBuf};

use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, CapacityError>;

#[derive(Debug, Error)]
pub(crate) enum CapacityError {
    #[error("invalid test options: {details}")]
    InvalidOptions { details: String },

    #[error("not enough free space on {volume:?}: {available} bytes available, {margin} bytes reserved")]
    InsufficientSpace {
        volume: PathBuf,
        available: u64,
        margin: u64,
    },

    #[error("{operation} failed on {volume:?}: {source}")]
    Volume {
        volume: PathBuf,
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("every write to {volume:?} failed ({files} files); last error: {source}")]
    AllWritesFailed {
        volume: PathBuf,
        files: usize,
        #[source]
        source: io::Error,
    },

    #[error("could not remove test data from {volume:?}: {source}")]
    Cleanup {
        volume: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("test on {volume:?} was cancelled")]
    Cancelled { volume: PathBuf },
}

impl CapacityError {
    pub(crate) fn volume(volume: impl Into<PathBuf>, operation: &'static str, source: io::Error) -> Self {
        Self::Volume {
            volume: volume.into(),
            operation,
            source,
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
