//! Goal Environment Abstraction Layer
//!
//! This crate isolates everything a simulation run needs from "the outside
//! world" so that the experimentation engine stays a pure function of its
//! inputs:
//! - Randomness (`trial_rng()`), derived per trial from a single 64-bit seed
//! - Cancellation (`is_cancelled()`), driven by a shared [`CancelToken`]
//! - Progress reporting, through a rate-limited [`ProgressSink`]
//!
//! Two contexts are provided:
//!
//! - **Deterministic**: [`SeededContext`] - fixed seed, used by tests and CI
//! - **Production**: [`EntropyContext`] - seed drawn once from OS entropy and
//!   reported so any run can be replayed with `SeededContext`
//!
//! # Example
//!
//! ```ignore
//! use goal_env::{ExperimentContext, SeededContext};
//!
//! let ctx = SeededContext::new(42);
//! let mut rng = ctx.trial_rng(0);
//! ```

mod context;
mod entropy_impl;
mod error;
mod progress;
mod types;

pub use context::{derive_trial_seed, ExperimentContext, SeededContext};
pub use entropy_impl::EntropyContext;
pub use error::EnvError;
pub use progress::{FnProgress, LogProgress, NoProgress, ProgressSink};
pub use types::{CancelToken, SeedSource};
