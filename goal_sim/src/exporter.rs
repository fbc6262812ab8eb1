//! JSON report export for simulation runs and scenario comparisons.
//!
//! A report is written once at the end of a CLI invocation. Nothing here is
//! read back by the engine.

use crate::error::SimError;
use crate::runner::SimulationRun;
use crate::sampler::Uncertainty;
use goal_core::{
    OptimizationResult, RiskAnalysis, Scenario, ScenarioComparison, Stage, TargetProbability,
};
use goal_env::SeedSource;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One successful trial, flattened for tabular consumers.
#[derive(Debug, Clone, Serialize)]
pub struct TrialRow {
    pub trial: usize,
    pub total_throughput: f64,
    pub product_a: f64,
    pub product_b: f64,
    pub bottleneck: Stage,
    pub heat_treatment_utilization: f64,
}

impl TrialRow {
    fn new(trial: usize, result: &OptimizationResult) -> Self {
        Self {
            trial,
            total_throughput: result.total_throughput,
            product_a: result.product_a,
            product_b: result.product_b,
            bottleneck: result.bottleneck,
            heat_treatment_utilization: result.heat_treatment_utilization,
        }
    }
}

/// Complete simulation report.
#[derive(Debug, Clone, Serialize)]
pub struct RunExport {
    /// Unperturbed scenario
    pub base: Scenario,

    /// Seed used
    pub seed: SeedSource,

    pub uncertainty: Uncertainty,

    /// Oracle evaluation of the base scenario
    pub baseline: OptimizationResult,

    /// Aggregated statistics
    pub analysis: RiskAnalysis,

    /// Exceedance for a user-supplied target, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetProbability>,

    /// Per-trial rows, omitted unless requested
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trials: Vec<TrialRow>,
}

impl RunExport {
    /// Creates a report without per-trial rows.
    pub fn new(run: &SimulationRun, analysis: RiskAnalysis) -> Self {
        Self {
            base: run.base.clone(),
            seed: run.seed,
            uncertainty: run.uncertainty,
            baseline: run.baseline.clone(),
            analysis,
            target: None,
            trials: Vec::new(),
        }
    }

    /// Adds the exceedance for a custom target.
    pub fn with_target(mut self, target: TargetProbability) -> Self {
        self.target = Some(target);
        self
    }

    /// Adds one row per successful trial.
    pub fn with_trials(mut self, run: &SimulationRun) -> Self {
        self.trials = run
            .dataset
            .iter()
            .enumerate()
            .map(|(i, r)| TrialRow::new(i, r))
            .collect();
        self
    }

    pub fn to_json_pretty(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        write_json(self, path.as_ref())
    }
}

/// Complete comparison report.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonExport {
    /// Scenarios in input order (first is the baseline)
    pub scenarios: Vec<Scenario>,

    pub comparison: ScenarioComparison,

    /// Names of the best scenarios
    pub best: Vec<String>,

    /// Rendered bottleneck diagnosis
    pub diagnosis: String,
}

impl ComparisonExport {
    pub fn new(scenarios: &[Scenario], comparison: ScenarioComparison) -> Self {
        Self {
            scenarios: scenarios.to_vec(),
            best: comparison
                .best_results()
                .map(|r| r.scenario_name.clone())
                .collect(),
            diagnosis: comparison.bottleneck.to_string(),
            comparison,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        write_json(self, path.as_ref())
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), SimError> {
    let json = serde_json::to_string_pretty(value)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{RunConfig, SimulationRunner};
    use crate::scenarios::{default_comparison_set, PresetId};
    use goal_core::{ProductMixSolver, ScenarioComparator};
    use goal_env::{NoProgress, SeededContext};

    fn small_run() -> SimulationRun {
        let runner = SimulationRunner::new(ProductMixSolver::new(), RunConfig::default().with_trials(20)).unwrap();
        runner
            .run(&PresetId::Baseline.scenario(), &SeededContext::new(42), &NoProgress)
            .unwrap()
            .completed()
            .unwrap()
    }

    #[test]
    fn test_run_export_shape() {
        let run = small_run();
        let export = RunExport::new(&run, run.analyze().unwrap());
        let value: serde_json::Value = serde_json::from_str(&export.to_json_pretty().unwrap()).unwrap();

        assert_eq!(value["seed"]["kind"], "fixed");
        assert_eq!(value["seed"]["seed"], 42);
        assert_eq!(value["analysis"]["trials"], 20);
        assert_eq!(value["analysis"]["confidence_intervals"].as_array().unwrap().len(), 5);
        assert!(value.get("trials").is_none());
        assert!(value.get("target").is_none());
    }

    #[test]
    fn test_run_export_with_trials() {
        let run = small_run();
        let analysis = run.analyze().unwrap();
        let target = analysis.target_probability(Some(8000.0));
        let export = RunExport::new(&run, analysis).with_target(target).with_trials(&run);

        assert_eq!(export.trials.len(), 20);
        assert_eq!(export.trials[3].trial, 3);
        assert_eq!(export.trials[3].total_throughput, run.dataset.results()[3].total_throughput);

        let value: serde_json::Value = serde_json::from_str(&export.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["target"]["target"], 8000.0);
    }

    #[test]
    fn test_comparison_export() {
        let scenarios = default_comparison_set();
        let comparison = ScenarioComparator::new(ProductMixSolver::new()).compare(&scenarios).unwrap();
        let export = ComparisonExport::new(&scenarios, comparison);

        assert_eq!(export.best, vec!["Premium Product A".to_string()]);
        assert_eq!(export.diagnosis, "consistent bottleneck: heat_treatment");
        assert_eq!(export.scenarios.len(), 3);
    }

    #[test]
    fn test_write_to_file() {
        let run = small_run();
        let path = std::env::temp_dir().join(format!("goal_sim_report_{}.json", std::process::id()));

        RunExport::new(&run, run.analyze().unwrap()).write_to_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(text.contains("\"dominant_bottleneck\""));
    }
}
