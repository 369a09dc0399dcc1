//! Training configuration

use super::{ClassifierKind, ParamGrid};
use crate::error::{HarnessError, Result};
use crate::evaluation::Metric;
use serde::{Deserialize, Serialize};

/// Configuration for the cross-validated grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of stratified folds
    pub folds: usize,

    /// Metric averaged across folds to pick the best configuration
    pub metric: Metric,

    /// Worker threads for (configuration × fold) units, 0 for the rayon default
    pub n_workers: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            folds: 10,
            metric: Metric::Kappa,
            n_workers: 0,
        }
    }
}

impl SearchConfig {
    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = n_workers;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.folds < 2 {
            return Err(HarnessError::config("folds", "must be at least 2"));
        }
        Ok(())
    }
}

/// One classifier to compare and the grid searched for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSpec {
    pub kind: ClassifierKind,
    #[serde(default)]
    pub grid: ParamGrid,
}

impl ClassifierSpec {
    pub fn new(kind: ClassifierKind, grid: ParamGrid) -> Self {
        Self { kind, grid }
    }

    /// Small default grid per variant
    pub fn default_for(kind: ClassifierKind) -> Self {
        let grid = match kind {
            ClassifierKind::LogisticRegression => ParamGrid::new().axis("alpha", [0.0, 0.01]),
            ClassifierKind::DecisionTree => ParamGrid::new().axis("max_depth", [3i64, 5, 7]),
            ClassifierKind::RandomForest => ParamGrid::new()
                .axis("n_estimators", [100i64])
                .axis("max_depth", [6i64, 10])
                .axis("max_features", ["sqrt"]),
            ClassifierKind::GradientBoosting => ParamGrid::new()
                .axis("n_estimators", [50i64, 100])
                .axis("learning_rate", [0.1])
                .axis("max_depth", [3i64]),
        };
        Self { kind, grid }
    }

    /// Default specs for all four variants
    pub fn defaults() -> Vec<Self> {
        ClassifierKind::ALL.iter().map(|&k| Self::default_for(k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grids_are_valid() {
        for spec in ClassifierSpec::defaults() {
            let adapter = spec.kind.adapter();
            for params in spec.grid.configurations().unwrap() {
                adapter.validate(&params).unwrap();
            }
        }
    }

    #[test]
    fn test_spec_from_json() {
        let spec: ClassifierSpec =
            serde_json::from_str(r#"{"kind": "decision_tree", "grid": {"max_depth": [2, 4]}}"#).unwrap();
        assert_eq!(spec.kind, ClassifierKind::DecisionTree);
        assert_eq!(spec.grid.len(), 2);

        let config: SearchConfig = serde_json::from_str(r#"{"folds": 5}"#).unwrap();
        assert_eq!(config.metric, Metric::Kappa);
        assert!(SearchConfig::default().with_folds(1).validate().is_err());
    }
}
