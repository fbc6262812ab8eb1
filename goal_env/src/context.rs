//! Core experiment context trait and the deterministic implementation.

use crate::error::EnvError;
use crate::types::{CancelToken, SeedSource};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// The central interface between a simulation run and its environment.
///
/// # Implementations
///
/// - **Deterministic**: `SeededContext` - caller-supplied seed
/// - **Production**: `EntropyContext` - seed drawn from `OsRng`
///
/// # Determinism
///
/// Every trial gets its own generator derived from the master seed and the
/// trial index. A trial's draws therefore never depend on how many trials
/// ran before it or on which worker executes it.
pub trait ExperimentContext: Send + Sync {
    /// Returns where the master seed came from.
    fn seed_source(&self) -> SeedSource;

    /// Returns the cancel token observed by this context.
    fn cancel_token(&self) -> &CancelToken;

    /// Returns the master seed (for logging/reports).
    fn seed(&self) -> u64 {
        self.seed_source().seed()
    }

    /// Returns a fresh generator dedicated to trial `trial`.
    fn trial_rng(&self, trial: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(derive_trial_seed(self.seed(), trial))
    }

    /// Returns true once the run has been abandoned.
    fn is_cancelled(&self) -> bool {
        self.cancel_token().is_cancelled()
    }

    /// Fails with `EnvError::Cancelled` if the run has been abandoned.
    fn checkpoint(&self) -> Result<(), EnvError> {
        if self.is_cancelled() {
            Err(EnvError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Derives the seed for a single trial.
///
/// `master_seed * golden_ratio_prime + trial * prime`, so neighbouring trials
/// and neighbouring master seeds land far apart in seed space.
pub fn derive_trial_seed(master_seed: u64, trial: u64) -> u64 {
    master_seed
        .wrapping_mul(0x9e3779b97f4a7c15)
        .wrapping_add(trial.wrapping_mul(0x517cc1b727220a95))
}

/// Deterministic context backed by a caller-supplied seed.
#[derive(Debug, Clone)]
pub struct SeededContext {
    /// Master seed for this run
    seed: u64,

    /// Cancellation flag
    cancel: CancelToken,
}

impl SeededContext {
    /// Creates a new context with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            cancel: CancelToken::new(),
        }
    }

    /// Attaches an externally owned cancel token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }
}

impl ExperimentContext for SeededContext {
    fn seed_source(&self) -> SeedSource {
        SeedSource::Fixed(self.seed)
    }

    fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}
