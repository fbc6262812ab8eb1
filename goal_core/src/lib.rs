//! Goal Core - Product-Mix Model and Throughput Statistics
//!
//! The pieces of the experimentation engine that do not involve randomness:
//! 1. **Model**: scenarios, stages and oracle results
//! 2. **Oracle**: the optimization contract, its adapter, and a reference
//!    vertex-enumeration solver
//! 3. **Statistics**: risk aggregation over simulation datasets
//! 4. **Comparison**: best-of-N ranking with bottleneck-shift detection

pub mod compare;
pub mod dataset;
pub mod error;
pub mod oracle;
pub mod scenario;
pub mod solver;
pub mod stats;

// Re-export key types for convenience
pub use compare::{BottleneckDiagnosis, ScenarioComparator, ScenarioComparison, TiePolicy};
pub use dataset::{Dataset, DatasetBuilder};
pub use error::CoreError;
pub use oracle::{Oracle, OracleAdapter, OracleError, OracleRequest, OracleResponse};
pub use scenario::{OptimizationResult, Scenario, Stage};
pub use solver::{ProductMixSolver, Routing};
pub use stats::{
    BottleneckFrequency, ConfidenceInterval, Delta, EmpiricalDistribution, MetricSummary,
    RiskAnalysis, TargetProbability, CONFIDENCE_LEVELS,
};
