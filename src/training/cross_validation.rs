//! Cross-validation splitters

use crate::error::{HarnessError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 10, shuffle: true }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match *self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => n_splits,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 42,
        }
    }

    /// Stratified k-fold with shuffling
    pub fn stratified(n_splits: usize) -> Self {
        Self::new(CVStrategy::StratifiedKFold { n_splits, shuffle: true })
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn strategy(&self) -> CVStrategy {
        self.strategy
    }

    /// Generate train/test splits; `y` is required for stratification
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(HarnessError::config("folds", "must be at least 2"));
        }
        if n_samples < n_splits {
            return Err(HarnessError::config(
                "folds",
                format!("{} folds requested for only {} records", n_splits, n_samples),
            ));
        }

        let folds = match self.strategy {
            CVStrategy::KFold { shuffle, .. } => self.k_fold(n_samples, n_splits, shuffle),
            CVStrategy::StratifiedKFold { shuffle, .. } => {
                let y = y.ok_or_else(|| HarnessError::config("folds", "stratified k-fold requires labels"))?;
                if y.len() != n_samples {
                    return Err(HarnessError::ShapeError {
                        expected: format!("{} labels", n_samples),
                        actual: format!("{} labels", y.len()),
                    });
                }
                self.stratified_k_fold(y, n_splits, shuffle)
            }
        };

        Ok(Self::into_splits(folds))
    }

    fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.random_state)
    }

    fn k_fold(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut folds = Vec::with_capacity(n_splits);
        let mut current = 0;
        for i in 0..n_splits {
            let size = if i < remainder { base + 1 } else { base };
            folds.push(indices[current..current + size].to_vec());
            current += size;
        }
        folds
    }

    fn stratified_k_fold(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Vec<Vec<usize>> {
        // Classes in a fixed order so the same seed always yields the same folds
        let mut class_indices: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        for (idx, &val) in y.iter().enumerate() {
            class_indices[usize::from(val >= 0.5)].push(idx);
        }

        let mut rng = self.rng();
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];

        // Round-robin continues across classes, keeping fold sizes within one
        let mut offset = 0;
        for indices in class_indices.iter_mut() {
            if shuffle {
                indices.shuffle(&mut rng);
            }
            for &idx in indices.iter() {
                folds[offset % n_splits].push(idx);
                offset += 1;
            }
        }
        folds
    }

    fn into_splits(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        (0..folds.len())
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize, n_pos: usize) -> Array1<f64> {
        Array1::from_shape_fn(n, |i| if i < n_pos { 1.0 } else { 0.0 })
    }

    #[test]
    fn test_kfold_covers_every_index_once() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 3, shuffle: true }).with_random_state(1);
        let splits = cv.split(10, None).unwrap();
        assert_eq!(splits.len(), 3);

        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 10);
        }
    }

    #[test]
    fn test_stratified_keeps_class_balance() {
        let y = labels(100, 20);
        let splits = CrossValidator::stratified(10).split(100, Some(&y)).unwrap();
        for split in &splits {
            assert_eq!(split.test_indices.len(), 10);
            let positives = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 2);
        }
    }

    #[test]
    fn test_stratified_fold_sizes_stay_even() {
        let y = labels(23, 7);
        let splits = CrossValidator::stratified(5).split(23, Some(&y)).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 23);
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let y = labels(50, 15);
        let a = CrossValidator::stratified(5).with_random_state(9).split(50, Some(&y)).unwrap();
        let b = CrossValidator::stratified(5).with_random_state(9).split(50, Some(&y)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_fold_counts() {
        let y = labels(5, 2);
        assert!(CrossValidator::stratified(1).split(5, Some(&y)).is_err());
        assert!(CrossValidator::stratified(6).split(5, Some(&y)).is_err());
        assert!(CrossValidator::stratified(2).split(5, None).is_err());
    }
}
