//! Optimization oracle contract and the adapter the engine calls it through.
//!
//! The oracle is an external collaborator: given capacities, demand
//! ceilings and unit profits it returns the profit-maximizing product mix.
//! The engine never looks inside it. [`OracleAdapter`] is the only caller;
//! it validates the scenario, marshals the fields, and tags the answer with
//! the scenario name.

use crate::error::CoreError;
use crate::scenario::{OptimizationResult, Scenario, Stage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Parameters handed to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub heat_treatment_capacity: f64,
    pub machining_capacity: f64,
    pub assembly_capacity: f64,
    pub demand_a: f64,
    pub demand_b: f64,
    pub profit_a: f64,
    pub profit_b: f64,
}

impl From<&Scenario> for OracleRequest {
    fn from(scenario: &Scenario) -> Self {
        Self {
            heat_treatment_capacity: scenario.heat_treatment_capacity,
            machining_capacity: scenario.machining_capacity,
            assembly_capacity: scenario.assembly_capacity,
            demand_a: scenario.demand_a,
            demand_b: scenario.demand_b,
            profit_a: scenario.profit_a,
            profit_b: scenario.profit_b,
        }
    }
}

/// The oracle's answer for a feasible request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OracleResponse {
    pub total_throughput: f64,
    pub product_a: f64,
    pub product_b: f64,
    pub bottleneck: Stage,
    pub heat_treatment_utilization: f64,
}

/// Failure signalled by the oracle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    /// No feasible product mix exists for the request
    #[error("no feasible solution: {0}")]
    Infeasible(String),
}

/// An optimization oracle.
///
/// Implementations must be pure: the same request always yields the same
/// response. They are shared across worker threads.
pub trait Oracle: Send + Sync {
    /// Solves one product-mix problem.
    fn solve(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;

    /// Returns the name of this oracle (for logs and reports).
    fn name(&self) -> &str;
}

impl<O: Oracle + ?Sized> Oracle for Arc<O> {
    fn solve(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        (**self).solve(request)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn solve(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        (**self).solve(request)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Fixed-contract bridge between scenarios and an [`Oracle`].
#[derive(Debug, Clone)]
pub struct OracleAdapter<O> {
    oracle: O,
}

impl<O: Oracle> OracleAdapter<O> {
    /// Wraps an oracle.
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Returns the wrapped oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Evaluates a scenario.
    ///
    /// # Errors
    /// * `InvalidScenario` - a field is outside its domain (never sent on)
    /// * `OracleInfeasible` - the oracle refused the request, or answered
    ///   with non-finite or negative quantities
    pub fn evaluate(&self, scenario: &Scenario) -> Result<OptimizationResult, CoreError> {
        scenario.validate()?;

        let request = OracleRequest::from(scenario);
        let response = self
            .oracle
            .solve(&request)
            .map_err(|e| CoreError::infeasible(format!("{}: {}", scenario.name, e)))?;

        let quantities = [
            response.total_throughput,
            response.product_a,
            response.product_b,
        ];
        if quantities.iter().any(|q| !q.is_finite())
            || response.product_a < 0.0
            || response.product_b < 0.0
            || !response.heat_treatment_utilization.is_finite()
        {
            return Err(CoreError::infeasible(format!(
                "{}: malformed response from {}",
                scenario.name,
                self.oracle.name()
            )));
        }

        Ok(OptimizationResult {
            scenario_name: scenario.name.clone(),
            total_throughput: response.total_throughput,
            product_a: response.product_a,
            product_b: response.product_b,
            bottleneck: response.bottleneck,
            heat_treatment_utilization: response.heat_treatment_utilization.clamp(0.0, 100.0),
        })
    }
}
