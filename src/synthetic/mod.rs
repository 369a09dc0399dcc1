//! Class balancing
//!
//! Rebalances a training dataset by synthesizing minority records
//! (SMOTE-style interpolation between same-class nearest neighbours) and
//! undersampling the majority class.

mod balancer;

pub use balancer::{BalancerConfig, ClassBalancer};

use crate::data::Dataset;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Rebalanced dataset
    pub dataset: Dataset,
    /// Label of the minority class in the input
    pub minority_label: u8,
    /// Number of synthetic minority records added
    pub n_synthetic: usize,
    /// Number of majority records kept
    pub n_majority_kept: usize,
}

impl ResampleResult {
    pub fn summary(&self, input: &Dataset) -> BalanceSummary {
        BalanceSummary {
            input_counts: input.class_counts(),
            output_counts: self.dataset.class_counts(),
            n_synthetic: self.n_synthetic,
            n_majority_dropped: input.class_counts()[1 - self.minority_label as usize] - self.n_majority_kept,
        }
    }
}

/// Before/after class counts of a balancing pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// `[negatives, positives]` before balancing
    pub input_counts: [usize; 2],
    /// `[negatives, positives]` after balancing
    pub output_counts: [usize; 2],
    pub n_synthetic: usize,
    pub n_majority_dropped: usize,
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    /// Resample a labeled dataset
    fn resample(&self, data: &Dataset) -> Result<ResampleResult>;
}

/// Distance of a positive-label share from an even split
pub fn imbalance(counts: [usize; 2]) -> f64 {
    let total = counts[0] + counts[1];
    if total == 0 {
        return 0.0;
    }
    (counts[1] as f64 / total as f64 - 0.5).abs()
}
