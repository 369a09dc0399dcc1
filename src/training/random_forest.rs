//! Random Forest implementation

use super::decision_tree::{Criterion, DecisionTree};
use super::{Classifier, ClassifierKind, ParamSet, ParamValue, TrainedModel};
use crate::error::{HarnessError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    fn from_param(value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Text(s) => match s.to_ascii_lowercase().as_str() {
                "sqrt" | "auto" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                "all" => Ok(MaxFeatures::All),
                other => Err(HarnessError::config(
                    "max_features",
                    format!("unknown strategy '{}' (expected sqrt, log2, all or a number)", other),
                )),
            },
            ParamValue::Int(n) if *n >= 1 => Ok(MaxFeatures::Fixed(*n as usize)),
            ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
            other => Err(HarnessError::config(
                "max_features",
                format!("invalid value {}", other),
            )),
        }
    }
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree
    pub bootstrap: bool,
    pub criterion: Criterion,
    pub random_state: u64,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: 42,
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the forest; tree `i` draws from a generator seeded with `random_state + i`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(HarnessError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_estimators == 0 {
            return Err(HarnessError::config("n_estimators", "must be at least 1"));
        }

        self.n_features = x.ncols();
        let max_features = self.max_features.resolve(self.n_features);
        let base_seed = self.random_state;

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::new(self.criterion)
                    .with_max_depth(self.max_depth)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(Some(max_features))
                    .with_random_state(rng.next_u64());
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<_>>()?;

        self.trees = trees;
        self.compute_feature_importances();
        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total = Array1::zeros(self.n_features);
        for imp in self.trees.iter().filter_map(DecisionTree::feature_importances) {
            total += imp;
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        self.feature_importances = Some(total);
    }

    /// Positive-class probability for one row: mean of the tree leaves
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(HarnessError::ModelNotFitted);
        }
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict_row(row)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(HarnessError::ModelNotFitted);
        }
        let rows: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.predict_row(x.row(i)))
            .collect::<Result<_>>()?;
        Ok(Array1::from_vec(rows))
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Hyperparameters accepted by [`RandomForestClassifier`]
pub const RANDOM_FOREST_KEYS: &[&str] = &["n_estimators", "max_depth", "min_samples_leaf", "max_features", "bootstrap"];

/// Classifier adapter over [`RandomForest`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomForestClassifier;

impl RandomForestClassifier {
    pub fn build(params: &ParamSet) -> Result<RandomForest> {
        params.ensure_known(RANDOM_FOREST_KEYS)?;

        let n_estimators = params.usize("n_estimators")?.unwrap_or(100);
        if n_estimators == 0 {
            return Err(HarnessError::config("n_estimators", "must be at least 1"));
        }
        let max_depth = params.usize("max_depth")?;
        if max_depth == Some(0) {
            return Err(HarnessError::config("max_depth", "must be at least 1"));
        }
        let min_samples_leaf = params.usize("min_samples_leaf")?.unwrap_or(1);
        if min_samples_leaf == 0 {
            return Err(HarnessError::config("min_samples_leaf", "must be at least 1"));
        }
        let max_features = match params.get("max_features") {
            Some(v) => MaxFeatures::from_param(v)?,
            None => MaxFeatures::Sqrt,
        };
        let bootstrap = params.flag("bootstrap")?.unwrap_or(true);

        Ok(RandomForest::new(n_estimators)
            .with_max_depth(max_depth)
            .with_min_samples_leaf(min_samples_leaf)
            .with_max_features(max_features)
            .with_bootstrap(bootstrap))
    }
}

impl Classifier for RandomForestClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::RandomForest
    }

    fn validate(&self, params: &ParamSet) -> Result<()> {
        Self::build(params).map(|_| ())
    }

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, params: &ParamSet, seed: u64) -> Result<TrainedModel> {
        let mut forest = Self::build(params)?.with_random_state(seed);
        forest.fit(x, y)?;
        Ok(TrainedModel::RandomForest(forest))
    }
}
