use anyhow::Context;
use clap::Parser;
use indicatif::ProgressStyle;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[macro_use]
extern crate lazy_static;

mod cancel;
mod crypto;
mod digest;
mod error;
mod options;
mod report;
mod run;
#[cfg(test)]
mod testing;
mod volume;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as platform;

#[cfg(not(unix))]
mod other_os;
#[cfg(not(unix))]
use other_os as platform;

use cancel::CancelToken;
use capacity_test::CapacityTest;
use error::CapacityError;
use options::{Budget, TestOptions, GIB, MIB};
use report::human_bytes;
use volume::{DirectoryVolume, ValidVolume};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mount point of the drive to test.
    ///
    /// Test files go into a fresh directory below it and are removed
    /// afterwards; existing files are not touched.
    #[clap(value_parser = clap::value_parser!(ValidVolume))]
    volume: ValidVolume,

    /// Number of GiB to write and verify.
    ///
    /// Defaults to a quick 5 GiB test.
    #[clap(long, conflicts_with = "all_free_space")]
    size_gb: Option<u64>,

    /// Fill all free space (minus the safety margin). Best at catching fake drives.
    #[clap(long, alias = "full-capacity")]
    all_free_space: bool,

    /// Size of each test file in MiB.
    ///
    /// Defaults to 1024; smaller files mean more sync and metadata overhead.
    #[clap(long, conflicts_with = "small_files")]
    file_size_mb: Option<u64>,

    /// Use 100 MiB test files instead of 1 GiB ones.
    #[clap(long)]
    small_files: bool,

    /// MiB of free space to leave alone in --all-free-space mode.
    #[clap(long, default_value_t = 512)]
    safety_margin_mb: u64,

    /// Milliseconds to wait after the filesystem sync before reading back.
    #[clap(long, default_value_t = 1000)]
    settle_ms: u64,

    /// Seed for the test data, to make runs reproducible.
    #[clap(long)]
    seed: Option<u64>,

    /// Print the report as JSON.
    #[clap(long)]
    json: bool,

    /// Do not ask for confirmation before writing.
    #[clap(long, short)]
    yes: bool,
}

impl Args {
    fn test_options(&self) -> TestOptions {
        let budget = if self.all_free_space {
            Budget::AllFreeSpace
        } else {
            Budget::Fixed(self.size_gb.map_or(options::DEFAULT_BUDGET, |gb| gb.saturating_mul(GIB)))
        };
        let file_size_bytes = match (self.file_size_mb, self.small_files) {
            (Some(mb), _) => mb.saturating_mul(MIB),
            (None, true) => options::SMALL_FILE_SIZE,
            (None, false) => options::DEFAULT_FILE_SIZE,
        };
        TestOptions {
            budget,
            file_size_bytes,
            safety_margin_bytes: self.safety_margin_mb.saturating_mul(MIB),
            settle_delay: Duration::from_millis(self.settle_ms),
            seed: self.seed,
        }
    }
}

fn main() -> ExitCode {
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            if e
                .downcast_ref::<CapacityError>()
                .is_some_and(CapacityError::is_cancelled)
            {
                warn!("Cancelled; test files have been removed");
                ExitCode::from(130)
            } else {
                error!("{:#}", e);
                ExitCode::from(2)
            }
        }
    }
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let opts = args.test_options();
    let path = &args.volume.path;

    match opts.budget {
        Budget::AllFreeSpace => match platform::free_space_bytes(path) {
            Ok(free) => info!(?path, free = %human_bytes(free), "Testing all free space"),
            Err(e) => warn!(?path, %e, "Could not determine free space"),
        },
        Budget::Fixed(bytes) => info!(?path, size = %human_bytes(bytes), "Testing fixed size"),
    }
    if !args.yes && !confirm(path)? {
        info!("Capacity test cancelled");
        return Ok(false);
    }

    let cancel = CancelToken::new();
    cancel
        .install_signal_handlers()
        .context("Installing interrupt handlers")?;

    let mut test = CapacityTest::new(DirectoryVolume::new(path), opts, cancel);
    let report = test
        .run()
        .with_context(|| format!("During capacity test of {:?}", path))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Serializing the report")?
        );
    } else {
        println!("{report}");
    }
    Ok(report.passed)
}

fn confirm(path: &std::path::Path) -> anyhow::Result<bool> {
    eprint!(
        "This fills {:?} with test data (existing files are kept). Continue? (yes/no): ",
        path
    );
    io::stderr().flush().context("Flushing prompt")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Reading confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

lazy_static! {
    pub(crate) static ref PROGRESS_STYLE: ProgressStyle = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.white/grey} {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta_precise}) {msg}",
    ).expect("Internal error in indicatif progress bar template syntax");
}
