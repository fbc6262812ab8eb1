//! Progress reporting side channel for long-running simulations.

use tracing::info;

/// Receives coarse progress updates from a running simulation.
///
/// The runner calls `report` at a bounded cadence, never once per trial.
/// Implementations must be cheap; reporting is best-effort and may be
/// skipped under concurrency without affecting results.
///
/// # Updates
///
/// ```text
/// Runner                       Sink
///   |-- report(0, 500) -------->|
///   |-- report(50, 500) ------->|
///   |          ...              |
///   |-- report(500, 500) ------>|
/// ```
pub trait ProgressSink: Send + Sync {
    /// Called with the number of completed trials out of `total`.
    fn report(&self, completed: usize, total: usize);
}

/// Discards all progress updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _completed: usize, _total: usize) {}
}

/// Logs progress through `tracing` at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, completed: usize, total: usize) {
        info!("Running simulation {}/{}", completed, total);
    }
}

/// Adapts a closure into a progress sink.
pub struct FnProgress<F>(pub F);

impl<F> ProgressSink for FnProgress<F>
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, completed: usize, total: usize) {
        (self.0)(completed, total)
    }
}
