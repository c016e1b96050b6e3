//! The state of one capacity test run.

use serde::Serialize;

use crate::digest::FileDigest;

/// Why a file could not be written in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub(crate) enum WriteFailure {
    /// The medium reported that it is full.
    Exhausted { bytes_written: u64 },
    Io { message: String },
    /// The file was synced but reports a different size on disk.
    ShortFile { expected: u64, actual: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum FileStatus {
    Pending,
    Written,
    Verified,
    SizeMismatch { expected: u64, actual: u64 },
    ContentMismatch,
    Missing,
    ReadFailed { message: String },
    WriteFailed { failure: WriteFailure },
}

impl FileStatus {
    /// Whether verification found the file damaged in a way that
    /// counterfeit capacity produces.
    pub(crate) fn is_mismatch(&self) -> bool {
        matches!(
            self,
            Self::SizeMismatch { .. } | Self::ContentMismatch | Self::ReadFailed { .. }
        )
    }

    pub(crate) fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::WriteFailed {
                failure: WriteFailure::Exhausted { .. }
            }
        )
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Written => "WRITTEN",
            Self::Verified => "VERIFIED",
            Self::SizeMismatch { .. } => "SIZE MISMATCH",
            Self::ContentMismatch => "CONTENT MISMATCH",
            Self::Missing => "MISSING",
            Self::ReadFailed { .. } => "READ FAILED",
            Self::WriteFailed {
                failure: WriteFailure::Exhausted { .. },
            } => "WRITE FAILED (disk full)",
            Self::WriteFailed { .. } => "WRITE FAILED",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TestFile {
    pub ordinal: u64,
    pub name: String,
    pub expected_size_bytes: u64,
    pub expected_digest: Option<FileDigest>,
    pub status: FileStatus,
}

impl TestFile {
    fn new(ordinal: u64, expected_size_bytes: u64) -> Self {
        Self {
            ordinal,
            name: format!("test_{ordinal:05}.dat"),
            expected_size_bytes,
            expected_digest: None,
            status: FileStatus::Pending,
        }
    }
}

/// All test files of a run, in physical write order.
#[derive(Debug, Clone)]
pub(crate) struct TestRun {
    pub target_bytes: u64,
    pub file_size_bytes: u64,
    pub files: Vec<TestFile>,
}

impl TestRun {
    /// Splits `target_bytes` into full-size files plus one smaller
    /// remainder file, so that the sizes add up to exactly the budget.
    pub(crate) fn plan(target_bytes: u64, file_size_bytes: u64) -> Self {
        debug_assert!(file_size_bytes > 0, "file size must be positive");
        let full = target_bytes / file_size_bytes;
        let remainder = target_bytes % file_size_bytes;
        let mut files: Vec<TestFile> = (0..full)
            .map(|ordinal| TestFile::new(ordinal, file_size_bytes))
            .collect();
        if remainder > 0 {
            files.push(TestFile::new(full, remainder));
        }
        Self {
            target_bytes,
            file_size_bytes,
            files,
        }
    }

    pub(crate) fn requested_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.expected_size_bytes).sum()
    }
}
