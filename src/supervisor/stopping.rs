//! Stop policy
//!
//! Pure functions over the aggregate score history; the supervisor calls
//! [`StopPolicy::evaluate`] after every completed iteration.

use crate::config::RunConfig;
use crate::models::StopReason;

/// Plateau needs at least this many completed iterations
pub const MIN_ITERATIONS_FOR_PLATEAU: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopPolicy {
    pub max_iterations: usize,
    pub threshold: Option<f64>,
    pub window: usize,
}

impl StopPolicy {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            max_iterations: config.max_iterations as usize,
            threshold: config.score_improvement_threshold,
            window: config.plateau_window,
        }
    }

    /// Stop reason for `aggregates`, one entry per completed iteration.
    /// A plateau wins over exhaustion when both hold.
    pub fn evaluate(&self, aggregates: &[f64]) -> Option<StopReason> {
        if let Some(threshold) = self.threshold {
            if is_plateau(aggregates, threshold, self.window) {
                return Some(StopReason::Plateau);
            }
        }
        if aggregates.len() >= self.max_iterations {
            return Some(StopReason::ExhaustedIterations);
        }
        None
    }
}

/// True when each of the last `window` deltas between consecutive
/// aggregates is below `threshold`.
pub fn is_plateau(aggregates: &[f64], threshold: f64, window: usize) -> bool {
    let window = window.max(1);
    let n = aggregates.len();
    if n < (window + 1).max(MIN_ITERATIONS_FOR_PLATEAU) {
        return false;
    }
    aggregates[n - window - 1..]
        .windows(2)
        .all(|pair| pair[1] - pair[0] < threshold)
}
