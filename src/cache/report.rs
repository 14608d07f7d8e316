//! Progress and operator messaging hooks used by the cache engine

use tracing::warn;

/// Receives progress of a long-running cache operation
pub trait ProgressSink: Send + Sync {
    /// A new phase started (e.g. "Indexing layers")
    fn phase(&self, label: &str);

    /// `percent` of the current phase is done; `label` names the last item
    fn progress(&self, percent: u8, label: &str);
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn phase(&self, _label: &str) {}
    fn progress(&self, _percent: u8, _label: &str) {}
}

/// Surfaces warnings to the operator
pub trait Notifier: Send + Sync {
    fn warn(&self, message: &str);
}

/// Routes warnings to the log only (headless use)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn warn(&self, message: &str) {
        warn!("{}", message);
    }
}

/// Percentage of `done` out of `total`, clamped to 100
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100) / total).min(100) as u8
}
