//! Summary statistics over percentage scores.

use serde::{Deserialize, Serialize};

/// Count, mean, median and range of a score set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,
}

impl ScoreStatistics {
    /// Computes statistics for `scores`. Returns `None` for an empty slice;
    /// callers decide what an empty set means for them.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let mut sorted = scores.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let min = sorted[0];
        let max = sorted[count - 1];
        // Rounding in the sum can push the quotient just past the range.
        let mean = (sorted.iter().sum::<f64>() / count as f64).max(min).min(max);
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            count,
            mean,
            median,
            max,
            min,
        })
    }
}
