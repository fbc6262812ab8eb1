//! Common types for the environment abstraction.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag for a simulation run.
///
/// Clones share the same flag: the caller keeps one handle and hands
/// another to the context driving the run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token in the "not cancelled" state.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once `cancel()` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a context's master seed came from.
///
/// Recorded in run reports so entropy-seeded runs can be replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "seed", rename_all = "snake_case")]
pub enum SeedSource {
    /// Seed supplied by the caller
    Fixed(u64),

    /// Seed drawn from OS entropy at context creation
    Entropy(u64),
}

impl SeedSource {
    /// Returns the numeric seed regardless of origin.
    pub fn seed(&self) -> u64 {
        match self {
            SeedSource::Fixed(seed) | SeedSource::Entropy(seed) => *seed,
        }
    }
}

impl std::fmt::Display for SeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedSource::Fixed(seed) => write!(f, "{} (fixed)", seed),
            SeedSource::Entropy(seed) => write!(f, "{} (entropy)", seed),
        }
    }
}
