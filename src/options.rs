//! Parameters of a capacity test.

use std::time::Duration;

use crate::error::{CapacityError, Result};

pub(crate) const MIB: u64 = 1024 * 1024;
pub(crate) const GIB: u64 = 1024 * MIB;

/// Per-file size used unless told otherwise.
pub(crate) const DEFAULT_FILE_SIZE: u64 = GIB;
/// The older, smaller per-file size; still selectable but multiplies sync overhead.
pub(crate) const SMALL_FILE_SIZE: u64 = 100 * MIB;
/// Budget of the quick test.
pub(crate) const DEFAULT_BUDGET: u64 = 5 * GIB;
pub(crate) const DEFAULT_SAFETY_MARGIN: u64 = 512 * MIB;
pub(crate) const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// How many bytes a run may consume on the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Budget {
    Fixed(u64),
    /// Everything the volume reports as free, minus the safety margin.
    AllFreeSpace,
}

#[derive(Debug, Clone)]
pub(crate) struct TestOptions {
    pub budget: Budget,
    pub file_size_bytes: u64,
    pub safety_margin_bytes: u64,
    /// Pause after the global sync barrier before reading anything back.
    pub settle_delay: Duration,
    /// Makes the payload reproducible; a random key is drawn otherwise.
    pub seed: Option<u64>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            budget: Budget::Fixed(DEFAULT_BUDGET),
            file_size_bytes: DEFAULT_FILE_SIZE,
            safety_margin_bytes: DEFAULT_SAFETY_MARGIN,
            settle_delay: DEFAULT_SETTLE_DELAY,
            seed: None,
        }
    }
}

impl TestOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.file_size_bytes == 0 {
            return Err(CapacityError::InvalidOptions {
                details: "file size must be at least one byte".to_string(),
            });
        }
        if self.budget == Budget::Fixed(0) {
            return Err(CapacityError::InvalidOptions {
                details: "a fixed budget must be at least one byte".to_string(),
            });
        }
        Ok(())
    }
}
