//! Simulation dataset: the ordered results of one run.

use crate::scenario::OptimizationResult;
use serde::{Deserialize, Serialize};

/// Results of one completed simulation run, in trial order.
///
/// Only [`DatasetBuilder`] can grow a dataset; once finished it is
/// immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// One entry per successful trial
    results: Vec<OptimizationResult>,

    /// Number of trials the run was asked for
    requested_trials: usize,

    /// Trials lost to oracle infeasibility
    dropped_trials: usize,
}

impl Dataset {
    /// Returns the results in trial order.
    pub fn results(&self) -> &[OptimizationResult] {
        &self.results
    }

    /// Number of successful trials.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if no trial succeeded.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of trials the run was asked for.
    pub fn requested_trials(&self) -> usize {
        self.requested_trials
    }

    /// Number of trials dropped as infeasible.
    pub fn dropped_trials(&self) -> usize {
        self.dropped_trials
    }

    /// Throughput column.
    pub fn throughputs(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.total_throughput).collect()
    }

    /// Iterates over the results.
    pub fn iter(&self) -> std::slice::Iter<'_, OptimizationResult> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a OptimizationResult;
    type IntoIter = std::slice::Iter<'a, OptimizationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Append-only accumulator used while a run is in progress.
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    results: Vec<OptimizationResult>,
    requested_trials: usize,
    dropped_trials: usize,
}

impl DatasetBuilder {
    /// Creates a builder for a run of `requested_trials` trials.
    pub fn new(requested_trials: usize) -> Self {
        Self {
            results: Vec::with_capacity(requested_trials),
            requested_trials,
            dropped_trials: 0,
        }
    }

    /// Appends a successful trial.
    pub fn push(&mut self, result: OptimizationResult) {
        self.results.push(result);
    }

    /// Records a trial lost to infeasibility.
    pub fn drop_trial(&mut self) {
        self.dropped_trials += 1;
    }

    /// Trials accounted for so far (successful + dropped).
    pub fn processed(&self) -> usize {
        self.results.len() + self.dropped_trials
    }

    /// Trials dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped_trials
    }

    /// Freezes the builder into a dataset.
    pub fn finish(self) -> Dataset {
        Dataset {
            results: self.results,
            requested_trials: self.requested_trials,
            dropped_trials: self.dropped_trials,
        }
    }
}
