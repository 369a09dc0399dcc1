//! Gradient Boosting implementation
//!
//! Binary log-loss boosting: each round fits a squared-error regression tree
//! to the residuals `y - p` and adds its shrunken output to the log-odds of
//! every training record.

use super::decision_tree::DecisionTree;
use super::{Classifier, ClassifierKind, ParamSet, TrainedModel};
use crate::error::{HarnessError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

/// Boosted ensemble of regression trees on the log-odds scale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_log_odds: f64,
    feature_importances: Vec<f64>,
    fitted: bool,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl GradientBoostedTrees {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_log_odds: 0.0,
            feature_importances: Vec::new(),
            fitted: false,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(HarnessError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(HarnessError::ShapeError {
                expected: "at least one sample".to_string(),
                actual: "0 samples".to_string(),
            });
        }

        let p = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        self.initial_log_odds = (p / (1.0 - p)).ln();
        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        self.trees.clear();
        self.feature_importances = vec![0.0; x.ncols()];

        for round in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(&yi, &lo)| yi - sigmoid(lo))
                .collect();

            let sample_indices = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &sample_indices);
            let r_sub = residuals.select(Axis(0), &sample_indices);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(Some(self.config.max_depth))
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_random_state(self.config.random_state.wrapping_add(round as u64));
            tree.fit(&x_sub, &r_sub)?;

            // Every record moves, not only the subsample the tree was fitted on
            let update = tree.predict(x)?;
            log_odds.scaled_add(self.config.learning_rate, &update);

            if log_odds.iter().any(|v| !v.is_finite()) {
                return Err(HarnessError::ConvergenceFailure {
                    model: "gradient_boosting".to_string(),
                    reason: format!("non-finite log-odds after round {}", round + 1),
                });
            }

            if let Some(imp) = tree.feature_importances() {
                for (total, &v) in self.feature_importances.iter_mut().zip(imp.iter()) {
                    *total += v;
                }
            }
            self.trees.push(tree);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }
        self.fitted = true;
        Ok(())
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }

    /// Positive-class probability for one row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        if !self.fitted {
            return Err(HarnessError::ModelNotFitted);
        }
        let mut log_odds = self.initial_log_odds;
        for tree in &self.trees {
            log_odds += self.config.learning_rate * tree.predict_row(row)?;
        }
        Ok(sigmoid(log_odds))
    }

    /// Positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(HarnessError::ModelNotFitted);
        }
        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            log_odds.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(log_odds.mapv(sigmoid))
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

/// Hyperparameters accepted by [`GradientBoostingClassifier`]
pub const GRADIENT_BOOSTING_KEYS: &[&str] = &["n_estimators", "learning_rate", "max_depth", "min_samples_leaf", "subsample"];

/// Classifier adapter over [`GradientBoostedTrees`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GradientBoostingClassifier;

impl GradientBoostingClassifier {
    pub fn build(params: &ParamSet) -> Result<GradientBoostingConfig> {
        params.ensure_known(GRADIENT_BOOSTING_KEYS)?;
        let defaults = GradientBoostingConfig::default();

        let n_estimators = params.usize("n_estimators")?.unwrap_or(defaults.n_estimators);
        if n_estimators == 0 {
            return Err(HarnessError::config("n_estimators", "must be at least 1"));
        }
        let learning_rate = params.f64("learning_rate")?.unwrap_or(defaults.learning_rate);
        if learning_rate <= 0.0 {
            return Err(HarnessError::config("learning_rate", "must be positive"));
        }
        let max_depth = params.usize("max_depth")?.unwrap_or(defaults.max_depth);
        if max_depth == 0 {
            return Err(HarnessError::config("max_depth", "must be at least 1"));
        }
        let min_samples_leaf = params.usize("min_samples_leaf")?.unwrap_or(defaults.min_samples_leaf);
        if min_samples_leaf == 0 {
            return Err(HarnessError::config("min_samples_leaf", "must be at least 1"));
        }
        let subsample = params.f64("subsample")?.unwrap_or(defaults.subsample);
        if !(subsample > 0.0 && subsample <= 1.0) {
            return Err(HarnessError::config("subsample", "must be in (0, 1]"));
        }

        Ok(GradientBoostingConfig {
            n_estimators,
            learning_rate,
            max_depth,
            min_samples_leaf,
            subsample,
            random_state: defaults.random_state,
        })
    }
}

impl Classifier for GradientBoostingClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::GradientBoosting
    }

    fn validate(&self, params: &ParamSet) -> Result<()> {
        Self::build(params).map(|_| ())
    }

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, params: &ParamSet, seed: u64) -> Result<TrainedModel> {
        let config = GradientBoostingConfig {
            random_state: seed,
            ..Self::build(params)?
        };
        let mut model = GradientBoostedTrees::new(config);
        model.fit(x, y)?;
        Ok(TrainedModel::GradientBoosting(model))
    }
}
