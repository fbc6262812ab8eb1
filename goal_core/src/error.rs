//! Error types for the product-mix model and its statistics.

use thiserror::Error;

/// Errors raised by the oracle adapter, the aggregator and the comparator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A scenario field is outside its physical domain
    #[error("Invalid scenario: {field} = {value}")]
    InvalidScenario {
        field: &'static str,
        value: f64,
    },

    /// The oracle found no feasible solution (or returned garbage)
    #[error("Oracle infeasible: {0}")]
    OracleInfeasible(String),

    /// A statistic was requested over zero trials
    #[error("Cannot aggregate an empty dataset")]
    EmptyDataset,

    /// A comparison was requested over zero scenarios
    #[error("Cannot compare an empty scenario set")]
    EmptyComparison,

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CoreError {
    /// Creates an infeasibility error.
    pub fn infeasible(msg: impl Into<String>) -> Self {
        Self::OracleInfeasible(msg.into())
    }

    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Returns true if this error only invalidates a single trial.
    pub fn is_trial_local(&self) -> bool {
        matches!(self, CoreError::OracleInfeasible(_))
    }
}
