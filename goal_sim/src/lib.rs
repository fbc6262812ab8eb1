//! Goal Sim - Monte Carlo Risk Simulation Harness
//!
//! Runs many perturbed copies of a production scenario through an
//! optimization oracle and hands back a caller-owned dataset.
//!
//! # Core Principle: Injected Randomness
//!
//! Nothing in a run reads ambient state:
//! - **Randomness**: every trial draws from its own ChaCha8 generator derived
//!   from the master seed and the trial index
//! - **Cancellation**: observed through the context's token between trials
//! - **Progress**: pushed to a caller-supplied sink at a bounded cadence
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SimulationRunner                        │
//! │                                                             │
//! │  base Scenario ──► PerturbationSampler ──► Scenario (×N)    │
//! │                          ▲                      │           │
//! │              trial_rng(i)│                      ▼           │
//! │  ┌───────────────────────┴──┐        ┌──────────────────┐   │
//! │  │   ExperimentContext      │        │  OracleAdapter   │   │
//! │  │ (seed + cancel token)    │        │   (any Oracle)   │   │
//! │  └──────────────────────────┘        └────────┬─────────┘   │
//! │                                               ▼             │
//! │                    Dataset ──► RiskAnalysis                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use goal_sim::{RunConfig, SimulationRunner, PresetId};
//! use goal_core::ProductMixSolver;
//! use goal_env::{NoProgress, SeededContext};
//!
//! let runner = SimulationRunner::new(ProductMixSolver::new(), RunConfig::default())?;
//! let outcome = runner.run(&PresetId::Baseline.scenario(), &SeededContext::new(42), &NoProgress)?;
//! ```

pub mod error;
pub mod exporter;
pub mod runner;
pub mod sampler;
pub mod scenarios;

pub use error::SimError;
pub use exporter::{ComparisonExport, RunExport, TrialRow};
pub use runner::{RunConfig, RunOutcome, SimulationRun, SimulationRunner};
pub use sampler::{PerturbationSampler, Uncertainty};
pub use scenarios::{default_comparison_set, load_scenarios, PresetId};
