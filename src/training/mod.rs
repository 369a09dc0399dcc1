//! Model training module
//!
//! Provides the classifier variants compared by the harness:
//! - Logistic regression (L2, gradient descent, internal standardization)
//! - Decision trees (CART, gini or entropy)
//! - Random forests (bagged trees, built in parallel)
//! - Gradient-boosted trees (log-loss)
//!
//! plus hyperparameter grids, stratified k-fold splitting and the parallel
//! cross-validated grid search.

mod config;
mod grid_search;
mod params;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod random_forest;

pub use config::{ClassifierSpec, SearchConfig};
pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, DecisionTreeClassifier, TreeNode};
pub use gradient_boosting::{GradientBoostedTrees, GradientBoostingClassifier, GradientBoostingConfig};
pub use grid_search::{CancellationToken, CandidateStatus, CandidateSummary, GridSearch, SearchOutcome};
pub use linear_models::{LogisticRegression, LogisticRegressionClassifier};
pub use params::{ParamGrid, ParamSet, ParamValue};
pub use random_forest::{MaxFeatures, RandomForest, RandomForestClassifier};

use crate::error::{HarnessError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability shared by every classifier variant.
///
/// Implementations are stateless adapters: `validate` checks a configuration
/// against the variant's hyperparameter schema and `fit` returns an owned
/// [`TrainedModel`]. All randomness comes from `seed`.
pub trait Classifier: Send + Sync {
    /// Variant this adapter trains
    fn kind(&self) -> ClassifierKind;

    /// Reject unknown keys, wrong types and out-of-range values
    fn validate(&self, params: &ParamSet) -> Result<()>;

    /// Fit on 0/1 labels
    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, params: &ParamSet, seed: u64) -> Result<TrainedModel>;
}

/// Classifier variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    LogisticRegression,
    DecisionTree,
    RandomForest,
    GradientBoosting,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 4] = [
        ClassifierKind::LogisticRegression,
        ClassifierKind::DecisionTree,
        ClassifierKind::RandomForest,
        ClassifierKind::GradientBoosting,
    ];

    /// Stable identifier used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::LogisticRegression => "logistic_regression",
            ClassifierKind::DecisionTree => "decision_tree",
            ClassifierKind::RandomForest => "random_forest",
            ClassifierKind::GradientBoosting => "gradient_boosting",
        }
    }

    /// Human-readable name for reports
    pub fn display_name(&self) -> &'static str {
        match self {
            ClassifierKind::LogisticRegression => "Logistic Regression",
            ClassifierKind::DecisionTree => "Decision Tree",
            ClassifierKind::RandomForest => "Random Forest",
            ClassifierKind::GradientBoosting => "Gradient Boosting",
        }
    }

    pub fn adapter(&self) -> Box<dyn Classifier> {
        match self {
            ClassifierKind::LogisticRegression => Box::new(LogisticRegressionClassifier),
            ClassifierKind::DecisionTree => Box::new(DecisionTreeClassifier),
            ClassifierKind::RandomForest => Box::new(RandomForestClassifier),
            ClassifierKind::GradientBoosting => Box::new(GradientBoostingClassifier),
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClassifierKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "logistic_regression" | "logistic" | "lr" => Ok(ClassifierKind::LogisticRegression),
            "decision_tree" | "tree" | "dt" => Ok(ClassifierKind::DecisionTree),
            "random_forest" | "forest" | "rf" => Ok(ClassifierKind::RandomForest),
            "gradient_boosting" | "boosting" | "gb" => Ok(ClassifierKind::GradientBoosting),
            other => Err(HarnessError::config(
                "classifier",
                format!("unknown classifier '{}'", other),
            )),
        }
    }
}

/// A fitted model, owned by whoever trained it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostedTrees),
}

impl TrainedModel {
    pub fn kind(&self) -> ClassifierKind {
        match self {
            TrainedModel::LogisticRegression(_) => ClassifierKind::LogisticRegression,
            TrainedModel::DecisionTree(_) => ClassifierKind::DecisionTree,
            TrainedModel::RandomForest(_) => ClassifierKind::RandomForest,
            TrainedModel::GradientBoosting(_) => ClassifierKind::GradientBoosting,
        }
    }

    /// Positive-class probability per row, each in [0, 1]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::LogisticRegression(m) => m.predict_proba(x),
            TrainedModel::DecisionTree(m) => m.predict(x),
            TrainedModel::RandomForest(m) => m.predict_proba(x),
            TrainedModel::GradientBoosting(m) => m.predict_proba(x),
        }
    }

    /// Positive-class probability for one encoded record
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        match self {
            TrainedModel::LogisticRegression(m) => m.predict_row(row),
            TrainedModel::DecisionTree(m) => m.predict_row(row),
            TrainedModel::RandomForest(m) => m.predict_row(row),
            TrainedModel::GradientBoosting(m) => m.predict_row(row),
        }
    }

    /// Labels with `probability >= threshold` mapped to 1
    pub fn predict_label(&self, x: &Array2<f64>, threshold: f64) -> Result<Array1<u8>> {
        Ok(self.predict_proba(x)?.mapv(|p| u8::from(p >= threshold)))
    }

    /// Normalized impurity-based importances for the tree variants
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            TrainedModel::LogisticRegression(_) => None,
            TrainedModel::DecisionTree(m) => m.feature_importances().map(|a| a.to_vec()),
            TrainedModel::RandomForest(m) => m.feature_importances().map(|a| a.to_vec()),
            TrainedModel::GradientBoosting(m) => Some(m.feature_importances().to_vec()),
        }
    }
}
