//! Stratified train/test partitioning

use super::Dataset;
use crate::error::{HarnessError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Disjoint train/test split of a dataset
#[derive(Debug, Clone)]
pub struct Partition {
    pub train: Dataset,
    pub test: Dataset,
    /// Original row indices of the training records, ascending
    pub train_indices: Vec<usize>,
    /// Original row indices of the test records, ascending
    pub test_indices: Vec<usize>,
}

impl Partition {
    /// `(train, test)` record counts
    pub fn sizes(&self) -> (usize, usize) {
        (self.train.len(), self.test.len())
    }
}

/// Seeded stratified splitter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Partitioner {
    ratio: f64,
    seed: u64,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self { ratio: 0.7, seed: 42 }
    }
}

impl Partitioner {
    /// Create a partitioner; `ratio` is the training share and must lie in (0, 1)
    pub fn new(ratio: f64, seed: u64) -> Result<Self> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(HarnessError::config(
                "split_ratio",
                format!("must be in (0, 1), got {}", ratio),
            ));
        }
        Ok(Self { ratio, seed })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Split a dataset so that each side keeps the label proportions.
    ///
    /// Each class is shuffled independently and its first
    /// `round(ratio * n_class)` records go to train. Both sides keep every
    /// class, so a class needs at least two records.
    pub fn split(&self, dataset: &Dataset) -> Result<Partition> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut train_indices = Vec::new();
        let mut test_indices = Vec::new();

        for (class, mut indices) in dataset.class_indices().into_iter().enumerate() {
            if indices.len() < 2 {
                return Err(HarnessError::data_integrity(
                    dataset.label_name(),
                    format!(
                        "class {} has {} record(s), at least 2 are needed to stratify",
                        class,
                        indices.len()
                    ),
                ));
            }
            indices.shuffle(&mut rng);
            let n_train = ((self.ratio * indices.len() as f64).round() as usize).clamp(1, indices.len() - 1);
            train_indices.extend_from_slice(&indices[..n_train]);
            test_indices.extend_from_slice(&indices[n_train..]);
        }

        train_indices.sort_unstable();
        test_indices.sort_unstable();

        debug!(
            train = train_indices.len(),
            test = test_indices.len(),
            seed = self.seed,
            "Partitioned dataset"
        );

        Ok(Partition {
            train: dataset.subset(&train_indices),
            test: dataset.subset(&test_indices),
            train_indices,
            test_indices,
        })
    }
}
