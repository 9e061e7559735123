use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, warn};

/// Receives activity notifications from the message flow, e.g. to drive a
/// progress indicator.
pub trait ActivityObserver: Send + Sync {
    /// Called with `true` when a turn starts and `false` when it ends.
    fn set_processing(&self, processing: bool) -> anyhow::Result<()>;

    /// Called when the active conversation is created or switched.
    fn reset(&self) -> anyhow::Result<()>;
}

/// Runs an observer callback, containing both errors and panics.
pub(crate) fn notify(what: &str, call: impl FnOnce() -> anyhow::Result<()>) {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Activity observer failed during {what}: {e}"),
        Err(_) => warn!("Activity observer panicked during {what}"),
    }
}

/// Observer that tracks the processing flag and logs transitions.
#[derive(Debug, Default)]
pub struct ProcessingIndicator {
    processing: AtomicBool,
    resets: AtomicUsize,
}

impl ProcessingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl ActivityObserver for ProcessingIndicator {
    fn set_processing(&self, processing: bool) -> anyhow::Result<()> {
        debug!(processing, "activity changed");
        self.processing.store(processing, Ordering::SeqCst);
        Ok(())
    }

    fn reset(&self) -> anyhow::Result<()> {
        debug!("activity reset");
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
