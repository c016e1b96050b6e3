//! Cooperative cancellation of a running test.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context as _;
use signal_hook::consts::TERM_SIGNALS;

/// Shared flag that the engine polls between blocks.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Routes SIGINT/SIGTERM into this token.
    ///
    /// The first signal only sets the flag so the test can clean up after
    /// itself; a second one while the first is still pending exits at once.
    pub(crate) fn install_signal_handlers(&self) -> anyhow::Result<()> {
        for &signal in TERM_SIGNALS {
            signal_hook::flag::register_conditional_shutdown(signal, 130, Arc::clone(&self.0))
                .with_context(|| format!("Registering forced shutdown on signal {signal}"))?;
            signal_hook::flag::register(signal, Arc::clone(&self.0))
                .with_context(|| format!("Registering handler for signal {signal}"))?;
        }
        Ok(())
    }
}
