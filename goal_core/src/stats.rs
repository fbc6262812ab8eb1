//! Throughput Statistics
//! =====================
//!
//! Turns a [`Dataset`] plus its baseline evaluation into risk figures:
//! - **Descriptive**: mean, sample standard deviation, percentiles
//! - **Confidence intervals**: empirical two-sided percentile ranges
//! - **Exceedance**: probability of reaching a throughput target
//! - **Bottlenecks**: how often each stage binds, and the modal stage
//!
//! Every quantile goes through [`quantile_sorted`] (linear interpolation
//! between order statistics, `h = (n - 1) * q`). All statistics are computed
//! from a sorted copy of the sample, so they do not depend on trial order.

use crate::dataset::Dataset;
use crate::error::CoreError;
use crate::scenario::{OptimizationResult, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confidence levels reported in the interval table (percent).
pub const CONFIDENCE_LEVELS: [f64; 5] = [50.0, 80.0, 90.0, 95.0, 99.0];

/// Percentile used as the "worst case".
pub const WORST_CASE_PERCENTILE: f64 = 5.0;

/// Percentile used as the "best case".
pub const BEST_CASE_PERCENTILE: f64 = 95.0;

// =============================================================================
// QUANTILES
// =============================================================================

/// Linear-interpolation quantile of an ascending slice.
///
/// `q` is clamped to [0, 1]. Returns `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    let frac = h - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Empirical distribution of one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct EmpiricalDistribution {
    /// Ascending, never empty
    sorted: Vec<f64>,
}

impl EmpiricalDistribution {
    /// Builds a distribution from raw samples.
    ///
    /// # Errors
    /// `EmptyDataset` for zero samples; `InvalidConfig` if a sample is not
    /// finite.
    pub fn new(mut samples: Vec<f64>) -> Result<Self, CoreError> {
        if samples.is_empty() {
            return Err(CoreError::EmptyDataset);
        }
        if let Some(bad) = samples.iter().find(|v| !v.is_finite()) {
            return Err(CoreError::config(format!("non-finite sample {}", bad)));
        }
        samples.sort_by(f64::total_cmp);
        Ok(Self { sorted: samples })
    }

    /// Throughput distribution of a dataset.
    pub fn throughput(dataset: &Dataset) -> Result<Self, CoreError> {
        Self::new(dataset.throughputs())
    }

    /// Distribution of an arbitrary result column.
    pub fn of<F>(dataset: &Dataset, column: F) -> Result<Self, CoreError>
    where
        F: Fn(&OptimizationResult) -> f64,
    {
        Self::new(dataset.iter().map(column).collect())
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Samples in ascending order.
    pub fn sorted(&self) -> &[f64] {
        &self.sorted
    }

    pub fn min(&self) -> f64 {
        self.sorted[0]
    }

    pub fn max(&self) -> f64 {
        self.sorted[self.sorted.len() - 1]
    }

    pub fn mean(&self) -> f64 {
        self.sorted.iter().sum::<f64>() / self.sorted.len() as f64
    }

    /// Sample standard deviation (n - 1 denominator); 0 for a single sample.
    pub fn std_dev(&self) -> f64 {
        let n = self.sorted.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let ss: f64 = self.sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    }

    /// Quantile for `q` in [0, 1].
    pub fn quantile(&self, q: f64) -> f64 {
        // sorted is never empty
        quantile_sorted(&self.sorted, q).unwrap_or(f64::NAN)
    }

    /// Percentile for `p` in [0, 100].
    pub fn percentile(&self, p: f64) -> f64 {
        self.quantile(p / 100.0)
    }

    pub fn median(&self) -> f64 {
        self.percentile(50.0)
    }

    /// Two-sided interval holding the central `level` percent.
    pub fn confidence_interval(&self, level: f64) -> Result<ConfidenceInterval, CoreError> {
        if !(level > 0.0 && level < 100.0) {
            return Err(CoreError::config(format!(
                "confidence level {} outside (0, 100)",
                level
            )));
        }
        let tail = (100.0 - level) / 2.0;
        Ok(ConfidenceInterval {
            confidence_level: level,
            lower_bound: self.percentile(tail),
            upper_bound: self.percentile(100.0 - tail),
        })
    }

    /// Fraction of samples `>= target`.
    pub fn probability_exceed(&self, target: f64) -> f64 {
        let below = self.sorted.partition_point(|v| *v < target);
        (self.sorted.len() - below) as f64 / self.sorted.len() as f64
    }

    /// Fraction of samples `< target`; complement of `probability_exceed`.
    pub fn probability_below(&self, target: f64) -> f64 {
        1.0 - self.probability_exceed(target)
    }

    /// Fraction of samples strictly `> target`.
    pub fn probability_above(&self, target: f64) -> f64 {
        let at_or_below = self.sorted.partition_point(|v| *v <= target);
        (self.sorted.len() - at_or_below) as f64 / self.sorted.len() as f64
    }

    /// Compact summary of the distribution.
    pub fn summary(&self) -> MetricSummary {
        MetricSummary {
            mean: self.mean(),
            std_dev: self.std_dev(),
            min: self.min(),
            p5: self.percentile(WORST_CASE_PERCENTILE),
            median: self.median(),
            p95: self.percentile(BEST_CASE_PERCENTILE),
            max: self.max(),
        }
    }
}

// =============================================================================
// REPORT TYPES
// =============================================================================

/// Empirical two-sided percentile range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Percent in (0, 100)
    pub confidence_level: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ConfidenceInterval {
    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    /// True if `other` lies inside this interval (bounds inclusive).
    pub fn contains(&self, other: &ConfidenceInterval) -> bool {
        self.lower_bound <= other.lower_bound && other.upper_bound <= self.upper_bound
    }
}

/// Descriptive statistics of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub p5: f64,
    pub median: f64,
    pub p95: f64,
    pub max: f64,
}

/// Difference between a statistic and the baseline throughput.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// `value - baseline` in currency
    pub absolute: f64,

    /// `(value / baseline - 1) * 100`; `None` when the baseline is zero
    pub percent: Option<f64>,
}

impl Delta {
    pub fn between(value: f64, baseline: f64) -> Self {
        let absolute = value - baseline;
        let percent = if baseline == 0.0 {
            None
        } else {
            Some(absolute / baseline * 100.0)
        };
        Self { absolute, percent }
    }
}

/// How often each stage was the bottleneck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BottleneckFrequency {
    /// Count per stage; every stage is present
    pub counts: BTreeMap<Stage, usize>,

    /// Number of trials counted
    pub total: usize,
}

impl BottleneckFrequency {
    /// Counts bottlenecks across a dataset.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self, CoreError> {
        Self::from_stages(dataset.iter().map(|r| r.bottleneck))
    }

    /// Counts an arbitrary stage sequence.
    pub fn from_stages<I>(stages: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = Stage>,
    {
        let mut counts: BTreeMap<Stage, usize> = Stage::ALL.iter().map(|s| (*s, 0)).collect();
        let mut total = 0;
        for stage in stages {
            *counts.entry(stage).or_insert(0) += 1;
            total += 1;
        }
        if total == 0 {
            return Err(CoreError::EmptyDataset);
        }
        Ok(Self { counts, total })
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.counts.get(&stage).copied().unwrap_or(0)
    }

    /// Share of trials in percent.
    pub fn share_pct(&self, stage: Stage) -> f64 {
        self.count(stage) as f64 / self.total as f64 * 100.0
    }

    /// Modal stage; ties go to the earlier stage in routing order.
    pub fn dominant(&self) -> Stage {
        let mut best = Stage::HeatTreatment;
        for stage in Stage::ALL {
            if self.count(stage) > self.count(best) {
                best = stage;
            }
        }
        best
    }
}

/// Probability of reaching a given throughput target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetProbability {
    pub target: f64,

    /// Fraction of trials with throughput >= target
    pub exceed: f64,

    /// Fraction of trials with throughput < target
    pub below: f64,
}

// =============================================================================
// RISK ANALYSIS
// =============================================================================

/// Full aggregate view of a simulation run against its baseline.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAnalysis {
    /// Successful trials aggregated
    pub trials: usize,

    /// Trials dropped as infeasible during the run
    pub dropped_trials: usize,

    /// Throughput of the unperturbed evaluation
    pub baseline_throughput: f64,

    pub mean_throughput: f64,

    /// Sample standard deviation
    pub std_throughput: f64,

    /// 5th percentile
    pub worst_case: f64,

    /// 95th percentile
    pub best_case: f64,

    pub mean_delta: Delta,
    pub worst_case_delta: Delta,
    pub best_case_delta: Delta,

    /// One entry per level in [`CONFIDENCE_LEVELS`]
    pub confidence_intervals: Vec<ConfidenceInterval>,

    /// Exceedance at the baseline throughput
    pub baseline_target: TargetProbability,

    /// Fraction of trials strictly above the baseline
    pub probability_above_baseline: f64,

    pub bottlenecks: BottleneckFrequency,
    pub dominant_bottleneck: Stage,
    pub dominant_bottleneck_pct: f64,

    pub throughput: MetricSummary,
    pub product_a: MetricSummary,
    pub product_b: MetricSummary,
    pub heat_treatment_utilization: MetricSummary,

    #[serde(skip)]
    distribution: EmpiricalDistribution,
}

impl RiskAnalysis {
    /// Aggregates a dataset against its baseline.
    ///
    /// # Errors
    /// `EmptyDataset` when the dataset holds no trials.
    pub fn compute(dataset: &Dataset, baseline: &OptimizationResult) -> Result<Self, CoreError> {
        let distribution = EmpiricalDistribution::throughput(dataset)?;
        let base = baseline.total_throughput;

        let mean_throughput = distribution.mean();
        let worst_case = distribution.percentile(WORST_CASE_PERCENTILE);
        let best_case = distribution.percentile(BEST_CASE_PERCENTILE);

        let confidence_intervals = CONFIDENCE_LEVELS
            .iter()
            .map(|level| distribution.confidence_interval(*level))
            .collect::<Result<Vec<_>, _>>()?;

        let bottlenecks = BottleneckFrequency::from_dataset(dataset)?;
        let dominant_bottleneck = bottlenecks.dominant();
        let dominant_bottleneck_pct = bottlenecks.share_pct(dominant_bottleneck);

        Ok(Self {
            trials: distribution.len(),
            dropped_trials: dataset.dropped_trials(),
            baseline_throughput: base,
            mean_throughput,
            std_throughput: distribution.std_dev(),
            worst_case,
            best_case,
            mean_delta: Delta::between(mean_throughput, base),
            worst_case_delta: Delta::between(worst_case, base),
            best_case_delta: Delta::between(best_case, base),
            confidence_intervals,
            baseline_target: TargetProbability {
                target: base,
                exceed: distribution.probability_exceed(base),
                below: distribution.probability_below(base),
            },
            probability_above_baseline: distribution.probability_above(base),
            bottlenecks,
            dominant_bottleneck,
            dominant_bottleneck_pct,
            throughput: distribution.summary(),
            product_a: EmpiricalDistribution::of(dataset, |r| r.product_a)?.summary(),
            product_b: EmpiricalDistribution::of(dataset, |r| r.product_b)?.summary(),
            heat_treatment_utilization: EmpiricalDistribution::of(dataset, |r| {
                r.heat_treatment_utilization
            })?
            .summary(),
            distribution,
        })
    }

    /// Exceedance for an arbitrary target.
    ///
    /// `None` and a zero target both mean "no target set" and fall back to
    /// the baseline throughput.
    pub fn target_probability(&self, target: Option<f64>) -> TargetProbability {
        let target = target
            .filter(|t| *t != 0.0)
            .unwrap_or(self.baseline_throughput);
        TargetProbability {
            target,
            exceed: self.distribution.probability_exceed(target),
            below: self.distribution.probability_below(target),
        }
    }

    /// Interval at a specific level (need not be in the standard table).
    pub fn confidence_interval(&self, level: f64) -> Result<ConfidenceInterval, CoreError> {
        self.distribution.confidence_interval(level)
    }

    /// The underlying throughput distribution.
    pub fn distribution(&self) -> &EmpiricalDistribution {
        &self.distribution
    }
}
