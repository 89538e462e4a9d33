//! Anomaly scores computed from Temporal Memory predictions.
//!
//! The raw score is the fraction of active columns that were not predicted in the previous step.
//! An [`Anomaly`] detector turns raw scores into final scores. The `Pure` mode reports them as they
//! are (optionally smoothed by a moving average). The `Likelihood` and `Weighted` modes consult an
//! external [`LikelihoodEstimator`].

use fxhash::FxHashSet;
use std::collections::VecDeque;
use std::fmt::Debug;

/// The fraction of `active_columns` that is missing from `prev_predicted_columns`.
///
/// With no active columns the score is 1.0 if something was predicted and 0.0 otherwise.
pub fn compute_raw_anomaly_score(active_columns: &[usize], prev_predicted_columns: &[usize]) -> f64 {
    if active_columns.is_empty() {
        return if prev_predicted_columns.is_empty() {
            0.0
        } else {
            1.0
        };
    }

    let predicted: FxHashSet<usize> = prev_predicted_columns.iter().copied().collect();
    let num_predicted_active = active_columns
        .iter()
        .filter(|&&col| predicted.contains(&col))
        .count();

    (active_columns.len() - num_predicted_active) as f64 / active_columns.len() as f64
}

/// Estimates how unusual a raw anomaly score is given the history of the stream.
/// Implemented outside this crate.
pub trait LikelihoodEstimator: Debug {
    /// Returns the probability, in `[0, 1]`, that `raw_score` is anomalous for this input.
    fn anomaly_probability(&mut self, input_value: f64, raw_score: f64, timestamp: Option<i64>)
        -> f64;
}

/// How final anomaly scores are derived from raw ones.
#[derive(Debug)]
pub enum Anomaly {
    /// The raw score.
    Pure,

    /// The likelihood reported by the estimator.
    Likelihood(Box<dyn LikelihoodEstimator>),

    /// The raw score multiplied by the likelihood.
    Weighted(Box<dyn LikelihoodEstimator>),
}

impl Anomaly {
    /// Computes the final anomaly score for one step.
    pub fn compute(
        &mut self,
        active_columns: &[usize],
        prev_predicted_columns: &[usize],
        input_value: f64,
        timestamp: Option<i64>,
    ) -> f64 {
        let raw = compute_raw_anomaly_score(active_columns, prev_predicted_columns);
        match self {
            Anomaly::Pure => raw,
            Anomaly::Likelihood(estimator) => {
                estimator.anomaly_probability(input_value, raw, timestamp)
            }
            Anomaly::Weighted(estimator) => {
                raw * estimator.anomaly_probability(input_value, raw, timestamp)
            }
        }
    }
}

/// A moving average over the last `window` values.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverage {
    window: usize,
    values: VecDeque<f64>,
    total: f64,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            values: VecDeque::with_capacity(window.max(1)),
            total: 0.0,
        }
    }

    /// Adds a value and returns the new average.
    pub fn push(&mut self, value: f64) -> f64 {
        if self.values.len() == self.window {
            if let Some(oldest) = self.values.pop_front() {
                self.total -= oldest;
            }
        }
        self.values.push_back(value);
        self.total += value;
        self.average()
    }

    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.total / self.values.len() as f64
        }
    }
}

/// Pairs an [`Anomaly`] mode with a moving average over its output.
#[derive(Debug)]
pub struct SmoothedAnomaly {
    anomaly: Anomaly,
    average: MovingAverage,
}

impl SmoothedAnomaly {
    pub fn new(anomaly: Anomaly, window: usize) -> Self {
        Self {
            anomaly,
            average: MovingAverage::new(window),
        }
    }

    /// Computes the score of this step and returns the average over the window.
    pub fn compute(
        &mut self,
        active_columns: &[usize],
        prev_predicted_columns: &[usize],
        input_value: f64,
        timestamp: Option<i64>,
    ) -> f64 {
        let score =
            self.anomaly
                .compute(active_columns, prev_predicted_columns, input_value, timestamp);
        self.average.push(score)
    }
}
