//! Error types for simulation runs and report export.

use goal_core::CoreError;
use goal_env::EnvError;
use thiserror::Error;

/// Errors that abort a simulation run, a comparison, or an export.
#[derive(Debug, Error)]
pub enum SimError {
    /// Model, oracle or statistics error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Environment error (entropy, cancellation)
    #[error(transparent)]
    Env(#[from] EnvError),

    /// Dropped trials exceeded the configured ratio
    #[error("Too many infeasible trials: {dropped} of {trials} dropped (limit {:.0}%)", max_ratio * 100.0)]
    TooManyFailures {
        dropped: usize,
        trials: usize,
        max_ratio: f64,
    },

    /// A worker task panicked or was aborted
    #[error("Worker error: {0}")]
    Worker(String),

    /// Report or scenario file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report or scenario file (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
