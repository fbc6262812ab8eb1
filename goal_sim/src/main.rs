//! Goal Sim CLI
//!
//! Monte Carlo risk simulation and what-if scenario comparison for the
//! three-stage product-mix model.

use clap::{Args, Parser, Subcommand};
use goal_core::{CoreError, Delta, ProductMixSolver, Scenario, ScenarioComparator, TiePolicy};
use goal_env::{CancelToken, EntropyContext, ExperimentContext, LogProgress, SeededContext};
use goal_sim::{
    default_comparison_set, load_scenarios, ComparisonExport, PresetId, RunConfig, RunExport,
    RunOutcome, SimError, SimulationRunner, Uncertainty,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit code when a run is interrupted.
const EXIT_CANCELLED: i32 = 130;

/// Goal Sim - throughput risk simulation CLI
#[derive(Parser, Debug)]
#[command(name = "goal-sim")]
#[command(about = "Monte Carlo throughput simulation and scenario comparison", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a Monte Carlo simulation around one scenario
    Simulate(SimulateArgs),

    /// Evaluate an ordered set of scenarios and rank them
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Master seed for determinism (0 = random from OS entropy)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of trials
    #[arg(short = 'n', long, default_value = "500")]
    trials: usize,

    /// Base scenario preset (baseline, elevate_bottleneck, premium_product_a)
    #[arg(short, long, default_value = "baseline")]
    preset: String,

    /// Heat treatment capacity override (hours)
    #[arg(long)]
    heat: Option<f64>,

    /// Machining capacity override (hours)
    #[arg(long)]
    machining: Option<f64>,

    /// Assembly capacity override (hours)
    #[arg(long)]
    assembly: Option<f64>,

    /// Product A demand override (units)
    #[arg(long)]
    demand_a: Option<f64>,

    /// Product B demand override (units)
    #[arg(long)]
    demand_b: Option<f64>,

    /// Product A profit override (per unit)
    #[arg(long)]
    profit_a: Option<f64>,

    /// Product B profit override (per unit)
    #[arg(long)]
    profit_b: Option<f64>,

    /// Demand standard deviation, percent of base
    #[arg(long, default_value = "20")]
    demand_pct: f64,

    /// Capacity standard deviation, percent of base
    #[arg(long, default_value = "10")]
    capacity_pct: f64,

    /// Profit standard deviation, percent of base
    #[arg(long, default_value = "15")]
    price_pct: f64,

    /// Throughput target for the exceedance probability (default or 0: baseline)
    #[arg(short, long)]
    target: Option<f64>,

    /// Worker tasks (1 = sequential)
    #[arg(short, long, default_value = "1")]
    workers: usize,

    /// Abort when more than this fraction of trials is infeasible
    #[arg(long, default_value = "0.5")]
    max_failure_ratio: f64,

    /// Write the report to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Include one row per trial in the report
    #[arg(long)]
    include_trials: bool,
}

impl SimulateArgs {
    fn base_scenario(&self) -> Result<Scenario, SimError> {
        let preset: PresetId = self.preset.parse().map_err(CoreError::config)?;
        let mut base = preset.scenario();

        let overrides = [
            (self.heat, &mut base.heat_treatment_capacity),
            (self.machining, &mut base.machining_capacity),
            (self.assembly, &mut base.assembly_capacity),
            (self.demand_a, &mut base.demand_a),
            (self.demand_b, &mut base.demand_b),
            (self.profit_a, &mut base.profit_a),
            (self.profit_b, &mut base.profit_b),
        ];
        let mut customized = false;
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value;
                customized = true;
            }
        }
        if customized {
            base.name = format!("{} (custom)", base.name);
        }

        base.validate()?;
        Ok(base)
    }

    fn config(&self) -> RunConfig {
        RunConfig::default()
            .with_trials(self.trials)
            .with_uncertainty(Uncertainty::new(self.demand_pct, self.capacity_pct, self.price_pct))
            .with_max_failure_ratio(self.max_failure_ratio)
    }
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// JSON array of scenarios, first is the baseline (default: built-in presets)
    #[arg(long)]
    scenarios: Option<PathBuf>,

    /// Treat throughputs within this absolute tolerance of the best as tied
    #[arg(long)]
    tolerance: Option<f64>,

    /// Write the report to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let result = match &cli.command {
        Command::Simulate(args) => simulate(args, cli.json).await,
        Command::Compare(args) => compare(args, cli.json),
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("✗ {}", e);
            std::process::exit(1);
        }
    }
}

async fn simulate(args: &SimulateArgs, json: bool) -> Result<i32, SimError> {
    let base = args.base_scenario()?;
    let runner = SimulationRunner::new(reference_solver(), args.config())?;

    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling simulation");
            token.cancel();
        }
    });

    if !json {
        info!("Goal Sim v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let outcome = if args.seed == 0 {
        let ctx = EntropyContext::new()?.with_cancel_token(cancel);
        execute(&runner, &base, Arc::new(ctx), args.workers).await?
    } else {
        let ctx = SeededContext::new(args.seed).with_cancel_token(cancel);
        execute(&runner, &base, Arc::new(ctx), args.workers).await?
    };

    let run = match outcome {
        RunOutcome::Completed(run) => run,
        RunOutcome::Cancelled { completed } => {
            warn!("Simulation cancelled after {} trials; no results kept", completed);
            return Ok(EXIT_CANCELLED);
        }
    };

    let analysis = run.analyze()?;
    let mut export = RunExport::new(&run, analysis);
    if let Some(target) = args.target {
        let probability = export.analysis.target_probability(Some(target));
        export = export.with_target(probability);
    }
    if args.include_trials {
        export = export.with_trials(&run);
    }

    if json {
        println!("{}", export.to_json_pretty()?);
    } else {
        print_run_report(&export);
    }

    if let Some(path) = &args.export {
        export.write_to_file(path)?;
        info!("Exported report to {}", path.display());
    }
    Ok(0)
}

fn reference_solver() -> ProductMixSolver {
    let solver = ProductMixSolver::new();
    let routing = solver.routing();
    debug!(
        "Routing hours: A={:?} B={:?} (heat, machining, assembly)",
        routing.product_a, routing.product_b
    );
    solver
}

/// Runs sequentially on a blocking thread, or across `workers` tasks.
async fn execute<C>(
    runner: &SimulationRunner<ProductMixSolver>,
    base: &Scenario,
    ctx: Arc<C>,
    workers: usize,
) -> Result<RunOutcome, SimError>
where
    C: ExperimentContext + 'static,
{
    if workers > 1 {
        return runner
            .run_concurrent(base, ctx, workers, Arc::new(LogProgress))
            .await;
    }

    let runner = runner.clone();
    let base = base.clone();
    tokio::task::spawn_blocking(move || runner.run(&base, ctx.as_ref(), &LogProgress))
        .await
        .map_err(|e| SimError::Worker(e.to_string()))?
}

fn compare(args: &CompareArgs, json: bool) -> Result<i32, SimError> {
    let scenarios = match &args.scenarios {
        Some(path) => load_scenarios(path)?,
        None => default_comparison_set(),
    };

    let tie_policy = args.tolerance.map_or(TiePolicy::Exact, TiePolicy::Tolerance);
    debug!("Comparing {} scenarios with {:?}", scenarios.len(), tie_policy);

    let comparison = ScenarioComparator::new(reference_solver())
        .with_tie_policy(tie_policy)?
        .compare(&scenarios)?;
    let export = ComparisonExport::new(&scenarios, comparison);

    if json {
        println!("{}", export.to_json_pretty()?);
    } else {
        print_comparison_report(&export);
    }

    if let Some(path) = &args.export {
        export.write_to_file(path)?;
        info!("Exported report to {}", path.display());
    }
    Ok(0)
}

fn fmt_delta(delta: &Delta) -> String {
    match delta.percent {
        Some(pct) => format!("{:+.2} ({:+.1}%)", delta.absolute, pct),
        None => format!("{:+.2}", delta.absolute),
    }
}

fn print_run_report(export: &RunExport) {
    let a = &export.analysis;
    let b = &export.baseline;

    info!("Scenario: {} (seed={})", export.base.name, export.seed);
    info!(
        "Uncertainty: demand ±{}%, capacity ±{}%, price ±{}%",
        export.uncertainty.demand_pct, export.uncertainty.capacity_pct, export.uncertainty.price_pct
    );
    info!(
        "Baseline: throughput={:.2} mix=({:.1} A, {:.1} B) bottleneck={} heat={:.1}%",
        b.total_throughput, b.product_a, b.product_b, b.bottleneck, b.heat_treatment_utilization
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("Trials: {} ok, {} dropped", a.trials, a.dropped_trials);
    info!("Mean:       {:.2} ± {:.2}  {}", a.mean_throughput, a.std_throughput, fmt_delta(&a.mean_delta));
    info!("Worst (P5): {:.2}  {}", a.worst_case, fmt_delta(&a.worst_case_delta));
    info!("Best (P95): {:.2}  {}", a.best_case, fmt_delta(&a.best_case_delta));
    for ci in &a.confidence_intervals {
        info!(
            "  {:>2.0}% CI: [{:.2}, {:.2}]",
            ci.confidence_level, ci.lower_bound, ci.upper_bound
        );
    }
    info!(
        "P(throughput ≥ baseline) = {:.1}%   P(throughput > baseline) = {:.1}%",
        a.baseline_target.exceed * 100.0,
        a.probability_above_baseline * 100.0
    );
    if let Some(t) = &export.target {
        info!(
            "P(throughput ≥ {:.2}) = {:.1}%   P(below) = {:.1}%",
            t.target,
            t.exceed * 100.0,
            t.below * 100.0
        );
    }
    for (stage, count) in &a.bottlenecks.counts {
        info!("  bottleneck {:<15} {:>5} ({:.1}%)", stage.name(), count, a.bottlenecks.share_pct(*stage));
    }
    info!(
        "Dominant bottleneck: {} ({:.1}% of trials)",
        a.dominant_bottleneck, a.dominant_bottleneck_pct
    );
}

fn print_comparison_report(export: &ComparisonExport) {
    let c = &export.comparison;

    info!("Comparing {} scenarios ({:?})", c.results.len(), c.tie_policy);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (i, r) in c.results.iter().enumerate() {
        let marker = if c.is_best(i) { "★" } else { " " };
        info!(
            "{} {:<24} throughput={:>10.2} mix=({:.1} A, {:.1} B) bottleneck={} heat={:.1}%",
            marker,
            r.scenario_name,
            r.total_throughput,
            r.product_a,
            r.product_b,
            r.bottleneck,
            r.heat_treatment_utilization
        );
    }
    info!("Best: {}", export.best.join(", "));
    info!("Improvement over {}: {}", export.scenarios[0].name, fmt_delta(&c.improvement));
    info!("Diagnosis: {}", export.diagnosis);
}
