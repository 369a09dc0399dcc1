//! Decision tree implementation
//!
//! CART-style binary tree. Splits are found with a sorted sweep per feature,
//! so each node costs `O(n log n)` per candidate feature. Leaves store the
//! mean target of their records, which for 0/1 labels is the churn
//! probability.

use super::{Classifier, ClassifierKind, ParamSet, TrainedModel};
use crate::error::{HarnessError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Nodes with at least this many records scan features in parallel
const PARALLEL_MIN_SAMPLES: usize = 2048;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        gain: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Gini impurity (binary classification)
    Gini,
    /// Entropy (binary classification)
    Entropy,
    /// Mean squared error (regression on residuals)
    Mse,
}

impl FromStr for Criterion {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            "mse" | "squared_error" => Ok(Criterion::Mse),
            other => Err(HarnessError::config("criterion", format!("unknown criterion '{}'", other))),
        }
    }
}

/// Running count, sum and sum of squares of targets
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    n: f64,
    sum: f64,
    sum_sq: f64,
}

impl Stats {
    fn push(&mut self, y: f64) {
        self.n += 1.0;
        self.sum += y;
        self.sum_sq += y * y;
    }

    fn minus(&self, other: &Stats) -> Stats {
        Stats {
            n: self.n - other.n,
            sum: self.sum - other.sum,
            sum_sq: self.sum_sq - other.sum_sq,
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.n <= 0.0 {
            return 0.0;
        }
        let mean = self.sum / self.n;
        match criterion {
            Criterion::Gini => {
                let p = mean.clamp(0.0, 1.0);
                2.0 * p * (1.0 - p)
            }
            Criterion::Entropy => {
                let p = mean.clamp(0.0, 1.0);
                let term = |q: f64| if q > 0.0 { -q * q.ln() } else { 0.0 };
                term(p) + term(1.0 - p)
            }
            Criterion::Mse => (self.sum_sq / self.n - mean * mean).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features sampled per split (all when `None`)
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for per-split feature sampling
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(Criterion::Gini)
    }
}

impl DecisionTree {
    pub fn new(criterion: Criterion) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Tree fitted on squared error, used for boosting residuals
    pub fn new_regressor() -> Self {
        Self::new(Criterion::Mse)
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
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
        if y.iter().any(|v| !v.is_finite()) {
            return Err(HarnessError::ConvergenceFailure {
                model: "decision_tree".to_string(),
                reason: "non-finite target values".to_string(),
            });
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let mut stats = Stats::default();
        for &i in &indices {
            stats.push(y[i]);
        }
        let leaf = TreeNode::Leaf {
            value: stats.sum / stats.n,
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || stats.impurity(Criterion::Mse) <= 1e-14;
        if should_stop {
            return leaf;
        }

        let Some(split) = self.find_best_split(x, y, &indices, &stats, rng) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| x[[i, split.feature]] <= split.threshold);
        importances[split.feature] += n_samples as f64 * split.gain;

        let left = Box::new(self.build_tree(x, y, left, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, right, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: split.feature,
            threshold: split.threshold,
            left,
            right,
            n_samples,
            gain: split.gain,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(m) if m < self.n_features => {
                let mut features = index::sample(rng, self.n_features, m.max(1)).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        parent: &Stats,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let features = self.candidate_features(rng);
        let scan = |&feature: &usize| self.best_split_for_feature(x, y, indices, parent, feature);

        let per_feature: Vec<Option<SplitCandidate>> = if indices.len() >= PARALLEL_MIN_SAMPLES {
            features.par_iter().map(scan).collect()
        } else {
            features.iter().map(scan).collect()
        };

        // Strict comparison keeps the lowest feature index on ties
        per_feature.into_iter().flatten().fold(None, |best: Option<SplitCandidate>, c| match best {
            Some(b) if b.gain >= c.gain => Some(b),
            _ => Some(c),
        })
    }

    fn best_split_for_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        parent: &Stats,
        feature: usize,
    ) -> Option<SplitCandidate> {
        let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature]], y[i])).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = pairs.len();
        let parent_impurity = parent.impurity(self.criterion);
        let mut left = Stats::default();
        let mut best: Option<SplitCandidate> = None;

        for i in 0..n - 1 {
            left.push(pairs[i].1);
            let (lo, hi) = (pairs[i].0, pairs[i + 1].0);
            if lo == hi {
                continue;
            }
            let n_left = i + 1;
            if n_left < self.min_samples_leaf || n - n_left < self.min_samples_leaf {
                continue;
            }
            let right = parent.minus(&left);
            let weighted =
                (left.n * left.impurity(self.criterion) + right.n * right.impurity(self.criterion)) / parent.n;
            let gain = parent_impurity - weighted;
            if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
                let mid = lo + (hi - lo) / 2.0;
                best = Some(SplitCandidate {
                    feature,
                    threshold: if mid < hi { mid } else { lo },
                    gain,
                });
            }
        }
        best
    }

    /// Predict a single row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let mut node = self.root.as_ref().ok_or(HarnessError::ModelNotFitted)?;
        if row.len() != self.n_features {
            return Err(HarnessError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", row.len()),
            });
        }
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return Ok(*value),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Predict every row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Normalized impurity decrease per feature
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Depth of the fitted tree (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }
}

/// Hyperparameters accepted by [`DecisionTreeClassifier`]
pub const DECISION_TREE_KEYS: &[&str] = &["max_depth", "min_samples_split", "min_samples_leaf", "criterion"];

/// Classifier adapter over [`DecisionTree`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionTreeClassifier;

impl DecisionTreeClassifier {
    /// Build an unfitted tree from a configuration
    pub fn build(params: &ParamSet) -> Result<DecisionTree> {
        params.ensure_known(DECISION_TREE_KEYS)?;

        let criterion = match params.text("criterion")? {
            Some(name) => match Criterion::from_str(name)? {
                Criterion::Mse => {
                    return Err(HarnessError::config("criterion", "must be 'gini' or 'entropy' for classification"))
                }
                c => c,
            },
            None => Criterion::Gini,
        };
        let max_depth = params.usize("max_depth")?;
        if max_depth == Some(0) {
            return Err(HarnessError::config("max_depth", "must be at least 1"));
        }
        let min_samples_split = params.usize("min_samples_split")?.unwrap_or(2);
        if min_samples_split < 2 {
            return Err(HarnessError::config("min_samples_split", "must be at least 2"));
        }
        let min_samples_leaf = params.usize("min_samples_leaf")?.unwrap_or(1);
        if min_samples_leaf < 1 {
            return Err(HarnessError::config("min_samples_leaf", "must be at least 1"));
        }

        Ok(DecisionTree::new(criterion)
            .with_max_depth(max_depth)
            .with_min_samples_split(min_samples_split)
            .with_min_samples_leaf(min_samples_leaf))
    }
}

impl Classifier for DecisionTreeClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::DecisionTree
    }

    fn validate(&self, params: &ParamSet) -> Result<()> {
        Self::build(params).map(|_| ())
    }

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, params: &ParamSet, seed: u64) -> Result<TrainedModel> {
        let mut tree = Self::build(params)?.with_random_state(seed);
        tree.fit(x, y)?;
        Ok(TrainedModel::DecisionTree(tree))
    }
}
