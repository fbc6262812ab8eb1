//! Multi-scenario comparison.
//!
//! Evaluates a short ordered list of scenarios (the first one is the
//! baseline), finds the best, measures the improvement over the baseline and
//! reports whether the bottleneck moves between scenarios.

use crate::error::CoreError;
use crate::oracle::{Oracle, OracleAdapter};
use crate::scenario::{OptimizationResult, Scenario, Stage};
use crate::stats::Delta;
use serde::Serialize;
use tracing::debug;

/// How throughputs are matched against the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "kind", content = "epsilon", rename_all = "snake_case")]
pub enum TiePolicy {
    /// Exact floating-point equality with the maximum
    #[default]
    Exact,

    /// Within an absolute tolerance of the maximum
    Tolerance(f64),
}

impl TiePolicy {
    /// A tolerance must be finite and non-negative.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            TiePolicy::Tolerance(eps) if !eps.is_finite() || *eps < 0.0 => Err(CoreError::config(
                format!("tie tolerance must be non-negative, got {}", eps),
            )),
            _ => Ok(()),
        }
    }

    fn is_best(&self, throughput: f64, max: f64) -> bool {
        match self {
            TiePolicy::Exact => throughput == max,
            TiePolicy::Tolerance(eps) => (max - throughput).abs() <= *eps,
        }
    }
}

/// Whether the binding stage is the same everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "stages", rename_all = "snake_case")]
pub enum BottleneckDiagnosis {
    /// Every scenario binds on the same stage
    Consistent(Stage),

    /// The binding stage changes; distinct stages in first-seen order
    Shift(Vec<Stage>),
}

impl BottleneckDiagnosis {
    /// Diagnoses a sequence of bottlenecks. `None` for an empty sequence.
    pub fn from_stages<I>(stages: I) -> Option<Self>
    where
        I: IntoIterator<Item = Stage>,
    {
        let mut seen: Vec<Stage> = Vec::new();
        for stage in stages {
            if !seen.contains(&stage) {
                seen.push(stage);
            }
        }
        match seen.len() {
            0 => None,
            1 => Some(BottleneckDiagnosis::Consistent(seen[0])),
            _ => Some(BottleneckDiagnosis::Shift(seen)),
        }
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BottleneckDiagnosis::Shift(_))
    }
}

impl std::fmt::Display for BottleneckDiagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BottleneckDiagnosis::Consistent(stage) => write!(f, "consistent bottleneck: {}", stage),
            BottleneckDiagnosis::Shift(stages) => {
                let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
                write!(f, "bottleneck shift: {}", names.join(", "))
            }
        }
    }
}

/// Ranked outcome of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioComparison {
    /// Results in input order; index 0 is the baseline
    pub results: Vec<OptimizationResult>,

    /// Indices of every best scenario, ascending
    pub best: Vec<usize>,

    /// Highest throughput observed
    pub best_throughput: f64,

    /// Best throughput vs. the baseline; percent is `None` when the
    /// baseline throughput is not positive
    pub improvement: Delta,

    pub bottleneck: BottleneckDiagnosis,

    /// Tie policy used for `best`
    pub tie_policy: TiePolicy,
}

impl ScenarioComparison {
    /// Ranks already-evaluated results.
    ///
    /// # Errors
    /// `EmptyComparison` when `results` is empty, `InvalidConfig` for a
    /// negative or non-finite tolerance.
    pub fn from_results(
        results: Vec<OptimizationResult>,
        tie_policy: TiePolicy,
    ) -> Result<Self, CoreError> {
        tie_policy.validate()?;
        let baseline = results.first().ok_or(CoreError::EmptyComparison)?;
        let baseline_throughput = baseline.total_throughput;

        let best_throughput = results
            .iter()
            .map(|r| r.total_throughput)
            .fold(f64::NEG_INFINITY, f64::max);

        let best: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| tie_policy.is_best(r.total_throughput, best_throughput))
            .map(|(i, _)| i)
            .collect();

        // best is non-empty: the maximum itself always qualifies
        let absolute = best_throughput - baseline_throughput;
        let improvement = Delta {
            absolute,
            percent: (baseline_throughput > 0.0).then(|| absolute / baseline_throughput * 100.0),
        };

        let bottleneck = BottleneckDiagnosis::from_stages(results.iter().map(|r| r.bottleneck))
            .ok_or(CoreError::EmptyComparison)?;

        Ok(Self {
            results,
            best,
            best_throughput,
            improvement,
            bottleneck,
            tie_policy,
        })
    }

    /// Results of the best scenarios.
    pub fn best_results(&self) -> impl Iterator<Item = &OptimizationResult> {
        self.best.iter().map(move |i| &self.results[*i])
    }

    /// True if scenario `index` is among the best.
    pub fn is_best(&self, index: usize) -> bool {
        self.best.contains(&index)
    }

    /// True if the baseline itself is among the best.
    pub fn baseline_is_best(&self) -> bool {
        self.is_best(0)
    }
}

/// Evaluates scenario sets through an oracle and ranks them.
#[derive(Debug, Clone)]
pub struct ScenarioComparator<O> {
    adapter: OracleAdapter<O>,
    tie_policy: TiePolicy,
}

impl<O: Oracle> ScenarioComparator<O> {
    /// Creates a comparator with exact tie matching.
    pub fn new(oracle: O) -> Self {
        Self {
            adapter: OracleAdapter::new(oracle),
            tie_policy: TiePolicy::Exact,
        }
    }

    /// Sets the tie policy.
    ///
    /// # Errors
    /// `InvalidConfig` for a negative or non-finite tolerance.
    pub fn with_tie_policy(mut self, tie_policy: TiePolicy) -> Result<Self, CoreError> {
        tie_policy.validate()?;
        self.tie_policy = tie_policy;
        Ok(self)
    }

    /// Evaluates every scenario once and ranks them.
    ///
    /// # Errors
    /// `EmptyComparison` for no scenarios; any oracle or validation error
    /// aborts the comparison.
    pub fn compare(&self, scenarios: &[Scenario]) -> Result<ScenarioComparison, CoreError> {
        if scenarios.is_empty() {
            return Err(CoreError::EmptyComparison);
        }

        let results = scenarios
            .iter()
            .map(|s| {
                let result = self.adapter.evaluate(s)?;
                debug!(
                    "  {} -> throughput={:.2} bottleneck={}",
                    result.scenario_name, result.total_throughput, result.bottleneck
                );
                Ok(result)
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        ScenarioComparison::from_results(results, self.tie_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleError, OracleRequest, OracleResponse};
    use approx::assert_relative_eq;

    /// Throughput = profit_a * 10; bottleneck chosen by demand_b.
    struct TableOracle;

    impl Oracle for TableOracle {
        fn solve(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
            let bottleneck = match request.demand_b as u32 {
                0 => Stage::HeatTreatment,
                1 => Stage::Machining,
                _ => Stage::Assembly,
            };
            Ok(OracleResponse {
                total_throughput: request.profit_a * 10.0,
                product_a: 1.0,
                product_b: 1.0,
                bottleneck,
                heat_treatment_utilization: 100.0,
            })
        }

        fn name(&self) -> &str {
            "TableOracle"
        }
    }

    fn scenario(name: &str, profit_a: f64, demand_b: f64) -> Scenario {
        Scenario::new(name, [160.0, 200.0, 180.0], [50.0, demand_b], [profit_a, 60.0])
    }

    fn result(throughput: f64, bottleneck: Stage) -> OptimizationResult {
        OptimizationResult {
            scenario_name: format!("T{}", throughput),
            total_throughput: throughput,
            product_a: 0.0,
            product_b: 0.0,
            bottleneck,
            heat_treatment_utilization: 0.0,
        }
    }

    #[test]
    fn test_compare_joint_best() {
        let comparator = ScenarioComparator::new(TableOracle);
        let scenarios = vec![
            scenario("Baseline", 100.0, 1.0),
            scenario("Second", 120.0, 1.0),
            scenario("Third", 120.0, 1.0),
        ];

        let cmp = comparator.compare(&scenarios).unwrap();

        assert_eq!(cmp.best, vec![1, 2]);
        assert_eq!(cmp.best_throughput, 1200.0);
        assert_relative_eq!(cmp.improvement.absolute, 200.0);
        assert_relative_eq!(cmp.improvement.percent.unwrap(), 20.0);
        assert!(!cmp.baseline_is_best());
        let names: Vec<&str> = cmp.best_results().map(|r| r.scenario_name.as_str()).collect();
        assert_eq!(names, vec!["Second", "Third"]);
    }

    #[test]
    fn test_compare_bottleneck_shift() {
        let cmp = ScenarioComparison::from_results(
            vec![
                result(1.0, Stage::Machining),
                result(2.0, Stage::Machining),
                result(3.0, Stage::Assembly),
            ],
            TiePolicy::Exact,
        )
        .unwrap();

        assert_eq!(
            cmp.bottleneck,
            BottleneckDiagnosis::Shift(vec![Stage::Machining, Stage::Assembly])
        );
        assert_eq!(cmp.bottleneck.to_string(), "bottleneck shift: machining, assembly");
    }

    #[test]
    fn test_compare_consistent_bottleneck() {
        let cmp = ScenarioComparison::from_results(
            vec![
                result(1.0, Stage::Machining),
                result(2.0, Stage::Machining),
                result(3.0, Stage::Machining),
            ],
            TiePolicy::Exact,
        )
        .unwrap();

        assert_eq!(cmp.bottleneck, BottleneckDiagnosis::Consistent(Stage::Machining));
        assert_eq!(cmp.bottleneck.to_string(), "consistent bottleneck: machining");
        assert!(!cmp.bottleneck.is_shift());
    }

    #[test]
    fn test_shift_keeps_first_seen_order() {
        let diag = BottleneckDiagnosis::from_stages([
            Stage::Assembly,
            Stage::HeatTreatment,
            Stage::Assembly,
        ])
        .unwrap();
        assert_eq!(diag, BottleneckDiagnosis::Shift(vec![Stage::Assembly, Stage::HeatTreatment]));
    }

    #[test]
    fn test_baseline_best_has_zero_improvement() {
        let cmp = ScenarioComparison::from_results(
            vec![result(500.0, Stage::Assembly), result(400.0, Stage::Assembly)],
            TiePolicy::Exact,
        )
        .unwrap();

        assert_eq!(cmp.best, vec![0]);
        assert_eq!(cmp.improvement.absolute, 0.0);
        assert_eq!(cmp.improvement.percent, Some(0.0));
    }

    #[test]
    fn test_zero_baseline_percent_guarded() {
        let cmp = ScenarioComparison::from_results(
            vec![result(0.0, Stage::Assembly), result(400.0, Stage::Assembly)],
            TiePolicy::Exact,
        )
        .unwrap();

        assert_eq!(cmp.improvement.absolute, 400.0);
        assert_eq!(cmp.improvement.percent, None);
    }

    #[test]
    fn test_tolerance_tie_policy() {
        let results = vec![
            result(1000.0, Stage::Assembly),
            result(1200.0, Stage::Assembly),
            result(1200.0 - 1e-9, Stage::Assembly),
        ];

        let exact = ScenarioComparison::from_results(results.clone(), TiePolicy::Exact).unwrap();
        assert_eq!(exact.best, vec![1]);

        let tolerant =
            ScenarioComparison::from_results(results, TiePolicy::Tolerance(1e-6)).unwrap();
        assert_eq!(tolerant.best, vec![1, 2]);
    }

    #[test]
    fn test_tolerance_improvement_uses_maximum() {
        let results = vec![
            result(1000.0, Stage::Assembly),
            result(1199.9, Stage::Assembly),
            result(1200.0, Stage::Assembly),
        ];

        let cmp = ScenarioComparison::from_results(results, TiePolicy::Tolerance(0.5)).unwrap();

        assert_eq!(cmp.best, vec![1, 2]);
        assert_eq!(cmp.best_throughput, 1200.0);
        assert_relative_eq!(cmp.improvement.absolute, 200.0);
        assert_relative_eq!(cmp.improvement.percent.unwrap(), 20.0);
    }

    #[test]
    fn test_invalid_tolerance_rejected() {
        let results = vec![result(1000.0, Stage::Assembly), result(1200.0, Stage::Assembly)];

        for eps in [-1.0, f64::NAN, f64::INFINITY] {
            let err = ScenarioComparison::from_results(results.clone(), TiePolicy::Tolerance(eps));
            assert!(matches!(err, Err(CoreError::InvalidConfig(_))));
            assert!(ScenarioComparator::new(TableOracle)
                .with_tie_policy(TiePolicy::Tolerance(eps))
                .is_err());
        }
        assert!(ScenarioComparator::new(TableOracle)
            .with_tie_policy(TiePolicy::Tolerance(0.0))
            .is_ok());
    }

    #[test]
    fn test_compare_empty() {
        let comparator = ScenarioComparator::new(TableOracle);
        assert_eq!(comparator.compare(&[]), Err(CoreError::EmptyComparison));
    }

    #[test]
    fn test_compare_invalid_scenario_aborts() {
        let comparator = ScenarioComparator::new(TableOracle);
        let mut bad = scenario("Bad", 100.0, 1.0);
        bad.assembly_capacity = 0.0;

        let err = comparator.compare(&[scenario("Ok", 100.0, 1.0), bad]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidScenario { .. }));
    }
}
