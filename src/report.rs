//! Turning the terminal state of a run into a verdict.

use std::{fmt, time::Duration};

use serde::Serialize;

use crate::run::{FileStatus, TestFile, TestRun};

/// What the pattern of failures says about the drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub(crate) enum Diagnosis {
    Genuine,
    /// A clean prefix of files followed only by damaged ones: the drive
    /// stores data up to some boundary and loses everything past it.
    SuspectedCounterfeit {
        genuine_capacity_bytes: u64,
        first_failed_ordinal: u64,
    },
    /// The medium ran out of room before the budget was written.
    CapacityExhausted { ordinal: u64, bytes_written: u64 },
    /// Failures that do not form a boundary: bad sectors or flaky I/O.
    IntegrityErrors { ordinals: Vec<u64> },
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FailureDetail {
    pub ordinal: u64,
    #[serde(flatten)]
    pub status: FileStatus,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TestReport {
    pub passed: bool,
    pub diagnosis: Diagnosis,
    pub files_planned: usize,
    pub files_total: usize,
    pub files_verified: usize,
    pub files_failed: usize,
    pub failure_details: Vec<FailureDetail>,
    pub estimated_genuine_capacity_bytes: Option<u64>,
    pub budget_bytes: u64,
    pub file_size_bytes: u64,
    pub bytes_written: u64,
    pub bytes_verified: u64,
    pub write_seconds: f64,
    pub verify_seconds: f64,
    pub duration_seconds: f64,
}

/// Timings and counters the orchestrator gathered while running.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RunStats {
    pub files_planned: usize,
    pub bytes_written: u64,
    pub write_time: Duration,
    pub verify_time: Duration,
    pub total_time: Duration,
    /// Running out of space on the last planned file is expected here.
    pub exhaustion_tolerated: bool,
}

/// Classifies the terminal file statuses of a run, in write order.
pub(crate) fn diagnose(files: &[&TestFile], file_size_bytes: u64, bytes_written: u64) -> Diagnosis {
    let exhausted = files.last().filter(|f| f.status.is_exhaustion());
    let checked = match exhausted {
        Some(_) => &files[..files.len() - 1],
        None => files,
    };

    let clean_prefix = checked
        .iter()
        .take_while(|f| f.status == FileStatus::Verified)
        .count();
    let suffix = &checked[clean_prefix..];
    if !suffix.is_empty() && suffix.iter().all(|f| f.status.is_mismatch()) {
        return Diagnosis::SuspectedCounterfeit {
            genuine_capacity_bytes: clean_prefix as u64 * file_size_bytes,
            first_failed_ordinal: suffix[0].ordinal,
        };
    }
    if let Some(file) = exhausted {
        return Diagnosis::CapacityExhausted {
            ordinal: file.ordinal,
            bytes_written,
        };
    }
    let ordinals: Vec<u64> = checked
        .iter()
        .filter(|f| f.status != FileStatus::Verified)
        .map(|f| f.ordinal)
        .collect();
    if ordinals.is_empty() {
        Diagnosis::Genuine
    } else {
        Diagnosis::IntegrityErrors { ordinals }
    }
}

impl TestReport {
    pub(crate) fn new(run: &TestRun, stats: RunStats) -> Self {
        let any_verified = run.files.iter().any(|f| f.status == FileStatus::Verified);
        let benign = |f: &TestFile| {
            stats.exhaustion_tolerated
                && any_verified
                && f.status.is_exhaustion()
                && f.ordinal + 1 == stats.files_planned as u64
        };
        let counted: Vec<&TestFile> = run.files.iter().filter(|&f| !benign(f)).collect();
        let diagnosis = diagnose(&counted, run.file_size_bytes, stats.bytes_written);

        let failure_details: Vec<FailureDetail> = counted
            .iter()
            .filter(|f| f.status != FileStatus::Verified)
            .map(|f| FailureDetail {
                ordinal: f.ordinal,
                status: f.status.clone(),
            })
            .collect();
        let verified = run
            .files
            .iter()
            .filter(|f| f.status == FileStatus::Verified);
        let estimated_genuine_capacity_bytes = match diagnosis {
            Diagnosis::SuspectedCounterfeit {
                genuine_capacity_bytes,
                ..
            } => Some(genuine_capacity_bytes),
            _ => None,
        };

        Self {
            passed: diagnosis == Diagnosis::Genuine,
            files_planned: stats.files_planned,
            files_total: counted.len(),
            files_verified: verified.clone().count(),
            files_failed: failure_details.len(),
            failure_details,
            estimated_genuine_capacity_bytes,
            budget_bytes: run.target_bytes,
            file_size_bytes: run.file_size_bytes,
            bytes_written: stats.bytes_written,
            bytes_verified: verified.map(|f| f.expected_size_bytes).sum(),
            write_seconds: stats.write_time.as_secs_f64(),
            verify_seconds: stats.verify_time.as_secs_f64(),
            duration_seconds: stats.total_time.as_secs_f64(),
            diagnosis,
        }
    }
}

/// Formats a byte count with binary units.
pub(crate) fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

fn throughput(bytes: u64, seconds: f64) -> String {
    if seconds > 0.0 {
        format!("{}/s", human_bytes((bytes as f64 / seconds) as u64))
    } else {
        "n/a".to_string()
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Wrote {} in {:.1}s ({})",
            human_bytes(self.bytes_written),
            self.write_seconds,
            throughput(self.bytes_written, self.write_seconds)
        )?;
        writeln!(
            f,
            "Verified {} in {:.1}s ({})",
            human_bytes(self.bytes_verified),
            self.verify_seconds,
            throughput(self.bytes_verified, self.verify_seconds)
        )?;
        writeln!(
            f,
            "Files: {} planned, {} written, {} verified, {} failed",
            self.files_planned, self.files_total, self.files_verified, self.files_failed
        )?;
        for detail in &self.failure_details {
            writeln!(f, "  file {:5}: {}", detail.ordinal, detail.status.label())?;
        }
        match &self.diagnosis {
            Diagnosis::Genuine => write!(
                f,
                "PASSED: drive appears genuine ({} tested without errors)",
                human_bytes(self.bytes_verified)
            ),
            Diagnosis::SuspectedCounterfeit {
                genuine_capacity_bytes,
                first_failed_ordinal,
            } => write!(
                f,
                "FAILED: {} regions failed from file {} on - drive capacity is likely fake; \
                 real capacity is about {}",
                self.files_failed,
                first_failed_ordinal,
                human_bytes(*genuine_capacity_bytes)
            ),
            Diagnosis::CapacityExhausted {
                ordinal,
                bytes_written,
            } => write!(
                f,
                "FAILED: the drive filled up at file {} after {} of the requested {}",
                ordinal,
                human_bytes(*bytes_written),
                human_bytes(self.budget_bytes)
            ),
            Diagnosis::IntegrityErrors { ordinals } => write!(
                f,
                "FAILED: {} regions failed - drive integrity compromised \
                 (bad sectors or unreliable I/O)",
                ordinals.len()
            ),
        }
    }
}
