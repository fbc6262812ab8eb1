//! Simulation runner - executes Monte Carlo trials against the oracle.

use crate::error::SimError;
use crate::sampler::{PerturbationSampler, Uncertainty};

use goal_core::{
    CoreError, Dataset, DatasetBuilder, OptimizationResult, Oracle, OracleAdapter, RiskAnalysis,
    Scenario,
};
use goal_env::{ExperimentContext, ProgressSink, SeedSource};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Configuration for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunConfig {
    /// Number of trials to run
    pub trials: usize,

    /// Perturbation applied to every trial
    pub uncertainty: Uncertainty,

    /// Report progress every this many completed trials
    pub progress_every: usize,

    /// Abort once dropped trials exceed this fraction of `trials`
    pub max_failure_ratio: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            trials: 500,
            uncertainty: Uncertainty::default(),
            progress_every: 50,
            max_failure_ratio: 0.5,
        }
    }
}

impl RunConfig {
    /// Sets the trial count.
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Sets the uncertainty model.
    pub fn with_uncertainty(mut self, uncertainty: Uncertainty) -> Self {
        self.uncertainty = uncertainty;
        self
    }

    /// Sets the progress cadence.
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }

    /// Sets the dropped-trial abort ratio.
    pub fn with_max_failure_ratio(mut self, ratio: f64) -> Self {
        self.max_failure_ratio = ratio;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.trials == 0 {
            return Err(CoreError::config("trials must be at least 1"));
        }
        if self.progress_every == 0 {
            return Err(CoreError::config("progress_every must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.max_failure_ratio) {
            return Err(CoreError::config(format!(
                "max_failure_ratio {} outside [0, 1]",
                self.max_failure_ratio
            )));
        }
        self.uncertainty.validate()
    }
}

/// A completed run, owned by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationRun {
    /// Unperturbed scenario
    pub base: Scenario,

    /// Master seed of the run
    pub seed: SeedSource,

    /// Perturbation model used
    pub uncertainty: Uncertainty,

    /// Oracle evaluation of `base`
    pub baseline: OptimizationResult,

    /// One result per successful trial, in trial order
    pub dataset: Dataset,
}

impl SimulationRun {
    /// Aggregates the dataset against the baseline.
    pub fn analyze(&self) -> Result<RiskAnalysis, CoreError> {
        RiskAnalysis::compute(&self.dataset, &self.baseline)
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Every trial was processed
    Completed(SimulationRun),

    /// The run was abandoned; partial results were discarded
    Cancelled {
        /// Trials processed before cancellation was observed
        completed: usize,
    },
}

impl RunOutcome {
    /// Returns the run if it completed.
    pub fn completed(self) -> Option<SimulationRun> {
        match self {
            RunOutcome::Completed(run) => Some(run),
            RunOutcome::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled { .. })
    }
}

/// Runs Monte Carlo simulations over one oracle.
pub struct SimulationRunner<O> {
    /// Shared with worker tasks
    adapter: Arc<OracleAdapter<O>>,

    sampler: PerturbationSampler,

    config: RunConfig,
}

impl<O> Clone for SimulationRunner<O> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            sampler: self.sampler,
            config: self.config,
        }
    }
}

impl<O: Oracle> SimulationRunner<O> {
    /// Creates a runner, validating the configuration.
    pub fn new(oracle: O, config: RunConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            adapter: Arc::new(OracleAdapter::new(oracle)),
            sampler: PerturbationSampler::new(config.uncertainty)?,
            config,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn oracle_name(&self) -> &str {
        self.adapter.oracle().name()
    }

    /// Evaluates the unperturbed scenario.
    pub fn baseline(&self, base: &Scenario) -> Result<OptimizationResult, SimError> {
        Ok(self.adapter.evaluate(base)?)
    }

    /// Checks the base against the sampling floors, then evaluates it.
    fn prepare(&self, base: &Scenario) -> Result<OptimizationResult, SimError> {
        self.sampler.check_floors(base)?;
        let baseline = self.baseline(base)?;
        debug!("  baseline throughput={:.2}", baseline.total_throughput);
        Ok(baseline)
    }

    /// True once `dropped` trials exceed the configured failure ratio.
    fn exceeds_failure_limit(&self, dropped: usize) -> bool {
        dropped as f64 > self.config.max_failure_ratio * self.config.trials as f64
    }

    /// Samples and evaluates trial `index`.
    fn trial<C>(&self, base: &Scenario, ctx: &C, index: usize) -> Result<OptimizationResult, CoreError>
    where
        C: ExperimentContext + ?Sized,
    {
        let mut rng = ctx.trial_rng(index as u64);
        let scenario = self.sampler.sample(base, &mut rng);
        self.adapter.evaluate(&scenario)
    }

    /// Folds one trial outcome into the dataset.
    ///
    /// Infeasible trials are dropped and counted; anything else aborts.
    fn record(
        &self,
        builder: &mut DatasetBuilder,
        index: usize,
        outcome: Result<OptimizationResult, CoreError>,
    ) -> Result<(), SimError> {
        match outcome {
            Ok(result) => builder.push(result),
            Err(e) if e.is_trial_local() => {
                builder.drop_trial();
                warn!("Trial {} dropped: {}", index, e);

                if self.exceeds_failure_limit(builder.dropped()) {
                    return Err(SimError::TooManyFailures {
                        dropped: builder.dropped(),
                        trials: self.config.trials,
                        max_ratio: self.config.max_failure_ratio,
                    });
                }
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn finish<C>(&self, base: &Scenario, ctx: &C, baseline: OptimizationResult, dataset: Dataset) -> RunOutcome
    where
        C: ExperimentContext + ?Sized,
    {
        info!(
            "✓ Simulation complete: {} trials, {} dropped (seed={})",
            dataset.len(),
            dataset.dropped_trials(),
            ctx.seed_source()
        );
        RunOutcome::Completed(SimulationRun {
            base: base.clone(),
            seed: ctx.seed_source(),
            uncertainty: self.config.uncertainty,
            baseline,
            dataset,
        })
    }

    /// Runs every trial sequentially on the calling thread.
    ///
    /// Cancellation is checked before each trial. Progress is reported at
    /// the start, every `progress_every` completed trials, and at the end.
    pub fn run<C>(&self, base: &Scenario, ctx: &C, progress: &dyn ProgressSink) -> Result<RunOutcome, SimError>
    where
        C: ExperimentContext + ?Sized,
    {
        let trials = self.config.trials;
        info!(
            "Starting simulation: {} trials of '{}' (seed={})",
            trials,
            base.name,
            ctx.seed_source()
        );

        let baseline = self.prepare(base)?;

        let mut builder = DatasetBuilder::new(trials);
        progress.report(0, trials);

        for index in 0..trials {
            if ctx.is_cancelled() {
                let completed = builder.processed();
                info!("Simulation cancelled after {} of {} trials", completed, trials);
                return Ok(RunOutcome::Cancelled { completed });
            }

            let outcome = self.trial(base, ctx, index);
            self.record(&mut builder, index, outcome)?;

            let done = index + 1;
            if done % self.config.progress_every == 0 && done < trials {
                progress.report(done, trials);
            }
        }

        progress.report(trials, trials);
        Ok(self.finish(base, ctx, baseline, builder.finish()))
    }
}

impl<O: Oracle + 'static> SimulationRunner<O> {
    /// Runs the trials on `workers` blocking tasks.
    ///
    /// Worker `w` takes trials `w, w + workers, ...`. Outcomes are merged in
    /// trial order before any bookkeeping, so the resulting dataset (and any
    /// abort) is exactly what `run` produces for the same seed. Workers stop
    /// issuing trials as soon as the failure limit is crossed or a trial
    /// fails fatally.
    pub async fn run_concurrent<C>(
        &self,
        base: &Scenario,
        ctx: Arc<C>,
        workers: usize,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<RunOutcome, SimError>
    where
        C: ExperimentContext + 'static,
    {
        let trials = self.config.trials;
        let workers = workers.clamp(1, trials);
        info!(
            "Starting simulation: {} trials of '{}' on {} workers (seed={})",
            trials,
            base.name,
            workers,
            ctx.seed_source()
        );

        let baseline = self.prepare(base)?;
        progress.report(0, trials);

        let completed = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        let halted = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for worker in 0..workers {
            let runner = self.clone();
            let ctx = Arc::clone(&ctx);
            let base = base.clone();
            let completed = Arc::clone(&completed);
            let dropped = Arc::clone(&dropped);
            let halted = Arc::clone(&halted);
            let progress = Arc::clone(&progress);
            let every = self.config.progress_every;

            tasks.spawn_blocking(move || {
                let mut outcomes = Vec::with_capacity(trials / workers + 1);
                for index in (worker..trials).step_by(workers) {
                    if ctx.is_cancelled() || halted.load(Ordering::Relaxed) {
                        break;
                    }
                    let outcome = runner.trial(&base, ctx.as_ref(), index);
                    match &outcome {
                        Ok(_) => {}
                        Err(e) if e.is_trial_local() => {
                            let seen = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                            if runner.exceeds_failure_limit(seen) {
                                halted.store(true, Ordering::Relaxed);
                            }
                        }
                        Err(_) => halted.store(true, Ordering::Relaxed),
                    }
                    outcomes.push((index, outcome));

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % every == 0 && done < trials {
                        progress.report(done, trials);
                    }
                }
                outcomes
            });
        }

        let mut outcomes = Vec::with_capacity(trials);
        while let Some(joined) = tasks.join_next().await {
            outcomes.extend(joined.map_err(|e| SimError::Worker(e.to_string()))?);
        }

        // A halted run always trips `record` on the outcomes it collected
        outcomes.sort_by_key(|(index, _)| *index);
        let mut builder = DatasetBuilder::new(trials);
        for (index, outcome) in outcomes {
            self.record(&mut builder, index, outcome)?;
        }

        if builder.processed() < trials {
            let completed = builder.processed();
            info!("Simulation cancelled after {} of {} trials", completed, trials);
            return Ok(RunOutcome::Cancelled { completed });
        }

        progress.report(trials, trials);
        Ok(self.finish(base, ctx.as_ref(), baseline, builder.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goal_core::{OracleError, OracleRequest, OracleResponse, ProductMixSolver, Stage};
    use goal_env::{CancelToken, FnProgress, NoProgress, SeededContext};
    use std::sync::Mutex;

    fn goal_scenario() -> Scenario {
        Scenario::new("Base", [160.0, 200.0, 180.0], [50.0, 80.0], [90.0, 60.0])
    }

    /// Refuses any request whose demand A falls outside a band.
    struct PickyOracle {
        accept: std::ops::RangeInclusive<f64>,
    }

    impl Oracle for PickyOracle {
        fn solve(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
            if !self.accept.contains(&request.demand_a) {
                return Err(OracleError::Infeasible("demand too low".to_string()));
            }
            Ok(OracleResponse {
                total_throughput: request.demand_a * request.profit_a,
                product_a: request.demand_a,
                product_b: 0.0,
                bottleneck: Stage::Assembly,
                heat_treatment_utilization: 50.0,
            })
        }

        fn name(&self) -> &str {
            "PickyOracle"
        }
    }

    /// Counts every call that reaches the wrapped oracle.
    struct Counting<O> {
        inner: O,
        calls: AtomicUsize,
    }

    impl<O: Oracle> Oracle for Counting<O> {
        fn solve(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.solve(request)
        }

        fn name(&self) -> &str {
            self.inner.name()
        }
    }

    /// Cancels its token once a given progress count is reached.
    struct CancelAt {
        token: CancelToken,
        at: usize,
    }

    impl ProgressSink for CancelAt {
        fn report(&self, completed: usize, _total: usize) {
            if completed >= self.at {
                self.token.cancel();
            }
        }
    }

    #[test]
    fn test_zero_uncertainty_end_to_end() {
        let config = RunConfig::default()
            .with_trials(500)
            .with_uncertainty(Uncertainty::none());
        let runner = SimulationRunner::new(ProductMixSolver::new(), config).unwrap();
        let ctx = SeededContext::new(42);

        let run = runner
            .run(&goal_scenario(), &ctx, &NoProgress)
            .unwrap()
            .completed()
            .unwrap();

        assert_eq!(run.dataset.len(), 500);
        assert!(run.dataset.iter().all(|r| *r == run.baseline));

        let analysis = run.analyze().unwrap();
        assert!(analysis.std_throughput < 1e-9);
        let ci50 = analysis.confidence_intervals[0];
        assert_eq!(ci50.confidence_level, 50.0);
        assert_eq!(ci50.lower_bound, run.baseline.total_throughput);
        assert_eq!(ci50.upper_bound, run.baseline.total_throughput);
        assert_eq!(analysis.baseline_target.exceed, 1.0);
        assert_eq!(analysis.dominant_bottleneck, Stage::HeatTreatment);
        assert_eq!(analysis.dominant_bottleneck_pct, 100.0);
    }

    #[test]
    fn test_same_seed_same_dataset() {
        let runner = SimulationRunner::new(ProductMixSolver::new(), RunConfig::default().with_trials(200)).unwrap();
        let base = goal_scenario();

        let a = runner.run(&base, &SeededContext::new(9), &NoProgress).unwrap().completed().unwrap();
        let b = runner.run(&base, &SeededContext::new(9), &NoProgress).unwrap().completed().unwrap();
        let c = runner.run(&base, &SeededContext::new(10), &NoProgress).unwrap().completed().unwrap();

        assert_eq!(a.dataset, b.dataset);
        assert_ne!(a.dataset, c.dataset);
    }

    #[test]
    fn test_uncertain_run_statistics() {
        let runner = SimulationRunner::new(ProductMixSolver::new(), RunConfig::default().with_trials(1000)).unwrap();
        let run = runner
            .run(&goal_scenario(), &SeededContext::new(2024), &NoProgress)
            .unwrap()
            .completed()
            .unwrap();

        let analysis = run.analyze().unwrap();
        assert!(analysis.std_throughput > 0.0);
        assert!(analysis.worst_case <= analysis.mean_throughput);
        assert!(analysis.mean_throughput <= analysis.best_case);
        for pair in analysis.confidence_intervals.windows(2) {
            assert!(pair[1].contains(&pair[0]));
        }
        let p = analysis.target_probability(Some(8000.0));
        assert!((p.exceed + p.below - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_progress_is_rate_limited() {
        let seen = Mutex::new(Vec::new());
        let sink = FnProgress(|done, _total| seen.lock().unwrap().push(done));
        let config = RunConfig::default().with_trials(120).with_progress_every(50);
        let runner = SimulationRunner::new(ProductMixSolver::new(), config).unwrap();

        runner.run(&goal_scenario(), &SeededContext::new(1), &sink).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 50, 100, 120]);
    }

    #[test]
    fn test_cancellation_discards_results() {
        let token = CancelToken::new();
        let ctx = SeededContext::new(5).with_cancel_token(token.clone());
        let sink = CancelAt { token, at: 100 };
        let config = RunConfig::default().with_trials(500).with_progress_every(50);
        let runner = SimulationRunner::new(ProductMixSolver::new(), config).unwrap();

        let outcome = runner.run(&goal_scenario(), &ctx, &sink).unwrap();

        assert!(outcome.is_cancelled());
        assert!(matches!(outcome, RunOutcome::Cancelled { completed: 100 }));
        assert!(outcome.completed().is_none());
    }

    #[test]
    fn test_infeasible_trials_are_counted() {
        // Demand A ~ N(50, 10): roughly 16% fall below 40
        let oracle = PickyOracle { accept: 40.0..=f64::MAX };
        let config = RunConfig::default()
            .with_trials(400)
            .with_uncertainty(Uncertainty::new(20.0, 0.0, 0.0));
        let runner = SimulationRunner::new(oracle, config).unwrap();

        let run = runner
            .run(&goal_scenario(), &SeededContext::new(77), &NoProgress)
            .unwrap()
            .completed()
            .unwrap();

        let dropped = run.dataset.dropped_trials();
        assert!(dropped > 0);
        assert_eq!(run.dataset.len() + dropped, 400);
        assert_eq!(run.analyze().unwrap().dropped_trials, dropped);
    }

    #[test]
    fn test_infeasible_baseline_aborts() {
        let oracle = PickyOracle { accept: 60.0..=f64::MAX };
        let runner = SimulationRunner::new(oracle, RunConfig::default()).unwrap();

        let err = runner.run(&goal_scenario(), &SeededContext::new(3), &NoProgress);

        assert!(matches!(err, Err(SimError::Core(CoreError::OracleInfeasible(_)))));
    }

    #[test]
    fn test_too_many_failures_aborts() {
        // Only the unperturbed demand is accepted, so nearly every trial fails
        let oracle = PickyOracle { accept: 49.999..=50.001 };
        let config = RunConfig::default()
            .with_trials(200)
            .with_uncertainty(Uncertainty::new(20.0, 0.0, 0.0));
        let runner = SimulationRunner::new(oracle, config).unwrap();

        let err = runner.run(&goal_scenario(), &SeededContext::new(3), &NoProgress);

        assert!(matches!(
            err,
            Err(SimError::TooManyFailures { dropped: 101, trials: 200, .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let solver = ProductMixSolver::new();
        assert!(SimulationRunner::new(solver.clone(), RunConfig::default().with_trials(0)).is_err());
        assert!(SimulationRunner::new(solver.clone(), RunConfig::default().with_progress_every(0)).is_err());
        assert!(SimulationRunner::new(solver.clone(), RunConfig::default().with_max_failure_ratio(1.5)).is_err());
        assert!(SimulationRunner::new(
            solver,
            RunConfig::default().with_uncertainty(Uncertainty::new(-5.0, 0.0, 0.0))
        )
        .is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_matches_sequential() {
        let runner = SimulationRunner::new(ProductMixSolver::new(), RunConfig::default().with_trials(300)).unwrap();
        let base = goal_scenario();

        let sequential = runner
            .run(&base, &SeededContext::new(11), &NoProgress)
            .unwrap()
            .completed()
            .unwrap();
        let concurrent = runner
            .run_concurrent(&base, Arc::new(SeededContext::new(11)), 4, Arc::new(NoProgress))
            .await
            .unwrap()
            .completed()
            .unwrap();

        assert_eq!(sequential.dataset, concurrent.dataset);
        assert_eq!(sequential.baseline, concurrent.baseline);
    }

    #[tokio::test]
    async fn test_concurrent_cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = Arc::new(SeededContext::new(1).with_cancel_token(token));
        let runner = SimulationRunner::new(ProductMixSolver::new(), RunConfig::default().with_trials(50)).unwrap();

        let outcome = runner
            .run_concurrent(&goal_scenario(), ctx, 2, Arc::new(NoProgress))
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Cancelled { completed: 0 }));
    }

    #[test]
    fn test_base_below_floor_rejected() {
        let runner = SimulationRunner::new(
            ProductMixSolver::new(),
            RunConfig::default().with_trials(10).with_uncertainty(Uncertainty::none()),
        )
        .unwrap();
        let base = Scenario::new("Low", [40.0, 200.0, 180.0], [50.0, 80.0], [90.0, 5.0]);
        assert!(base.validate().is_ok());

        let err = runner.run(&base, &SeededContext::new(1), &NoProgress);

        assert!(matches!(err, Err(SimError::Core(CoreError::InvalidConfig(_)))));
    }

    #[tokio::test]
    async fn test_concurrent_base_below_floor_rejected() {
        let runner = SimulationRunner::new(ProductMixSolver::new(), RunConfig::default().with_trials(10)).unwrap();
        let base = Scenario::new("Low", [160.0, 200.0, 30.0], [50.0, 80.0], [90.0, 60.0]);

        let err = runner
            .run_concurrent(&base, Arc::new(SeededContext::new(1)), 2, Arc::new(NoProgress))
            .await;

        assert!(matches!(err, Err(SimError::Core(CoreError::InvalidConfig(_)))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_too_many_failures_stops_early() {
        let oracle = Arc::new(Counting {
            inner: PickyOracle { accept: 49.999..=50.001 },
            calls: AtomicUsize::new(0),
        });
        let config = RunConfig::default()
            .with_trials(1000)
            .with_uncertainty(Uncertainty::new(20.0, 0.0, 0.0));
        let runner = SimulationRunner::new(Arc::clone(&oracle), config).unwrap();

        let err = runner
            .run_concurrent(&goal_scenario(), Arc::new(SeededContext::new(3)), 4, Arc::new(NoProgress))
            .await;

        assert!(matches!(
            err,
            Err(SimError::TooManyFailures { dropped: 501, trials: 1000, .. })
        ));
        // Baseline plus roughly the first 501 trials; the rest are never issued
        assert!(oracle.calls.load(Ordering::Relaxed) < 700);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cancelled_mid_run() {
        let token = CancelToken::new();
        let ctx = Arc::new(SeededContext::new(5).with_cancel_token(token.clone()));
        let sink = Arc::new(CancelAt { token, at: 100 });
        let config = RunConfig::default().with_trials(2000).with_progress_every(50);
        let runner = SimulationRunner::new(ProductMixSolver::new(), config).unwrap();

        let outcome = runner.run_concurrent(&goal_scenario(), ctx, 2, sink).await.unwrap();

        match outcome {
            RunOutcome::Cancelled { completed } => assert!((100..2000).contains(&completed)),
            RunOutcome::Completed(_) => panic!("run should have been cancelled"),
        }
    }
}
