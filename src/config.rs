//! Harness configuration
//!
//! One explicit value carries every knob of a run. It deserializes from JSON
//! with defaults for anything omitted, and CLI flags override it through the
//! builder methods.

use crate::error::{HarnessError, Result};
use crate::evaluation::Metric;
use crate::preprocessing::{PreparationConfig, SelectionConfig};
use crate::synthetic::BalancerConfig;
use crate::training::{ClassifierSpec, SearchConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration of a comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Seed for partitioning, balancing, fold assignment and classifiers
    pub seed: u64,

    /// Fraction of each class placed in Train
    pub split_ratio: f64,

    /// Probability at or above which a record is labeled churned
    pub threshold: f64,

    /// Metric ranking the comparison report
    pub primary_metric: Metric,

    pub preparation: PreparationConfig,

    pub selection: SelectionConfig,

    pub balancer: BalancerConfig,

    pub search: SearchConfig,

    /// Classifiers to compare, in report insertion order
    pub classifiers: Vec<ClassifierSpec>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            split_ratio: 0.7,
            threshold: 0.5,
            primary_metric: Metric::Auc,
            preparation: PreparationConfig::default(),
            selection: SelectionConfig::default(),
            balancer: BalancerConfig::default(),
            search: SearchConfig::default(),
            classifiers: ClassifierSpec::defaults(),
        }
    }
}

impl HarnessConfig {
    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_split_ratio(mut self, ratio: f64) -> Self {
        self.split_ratio = ratio;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_primary_metric(mut self, metric: Metric) -> Self {
        self.primary_metric = metric;
        self
    }

    pub fn with_selection_metric(mut self, metric: Metric) -> Self {
        self.search.metric = metric;
        self
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.search.folds = folds;
        self
    }

    pub fn with_workers(mut self, n_workers: usize) -> Self {
        self.search.n_workers = n_workers;
        self
    }

    pub fn with_preparation(mut self, preparation: PreparationConfig) -> Self {
        self.preparation = preparation;
        self
    }

    pub fn with_selection(mut self, selection: SelectionConfig) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_balancer(mut self, balancer: BalancerConfig) -> Self {
        self.balancer = balancer;
        self
    }

    pub fn with_classifiers(mut self, classifiers: Vec<ClassifierSpec>) -> Self {
        self.classifiers = classifiers;
        self
    }

    /// Check every value that does not depend on the data
    pub fn validate(&self) -> Result<()> {
        if !(self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return Err(HarnessError::config("split_ratio", "must be strictly between 0 and 1"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(HarnessError::config("threshold", "must be in [0, 1]"));
        }
        if !(self.selection.significance > 0.0 && self.selection.significance < 1.0) {
            return Err(HarnessError::config("significance", "must be strictly between 0 and 1"));
        }
        if self.preparation.label_column.is_empty() {
            return Err(HarnessError::config("label_column", "must not be empty"));
        }
        self.balancer.validate()?;
        self.search.validate()?;
        if self.classifiers.is_empty() {
            return Err(HarnessError::config("classifiers", "at least one classifier is required"));
        }
        for spec in &self.classifiers {
            let adapter = spec.kind.adapter();
            for params in spec.grid.configurations()? {
                adapter.validate(&params)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{ClassifierKind, ParamGrid};
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_validate() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.search.metric, Metric::Kappa);
        assert_eq!(config.primary_metric, Metric::Auc);
        assert_eq!(config.classifiers.len(), 4);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: HarnessConfig = serde_json::from_str(
            r#"{
                "seed": 7,
                "search": {"folds": 5, "metric": "auc"},
                "classifiers": [{"kind": "logistic_regression", "grid": {"alpha": [0.0]}}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.search.folds, 5);
        assert_eq!(config.search.metric, Metric::Auc);
        assert_eq!(config.split_ratio, 0.7);
        assert_eq!(config.balancer.perc_over, 100.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let cases = [
            (HarnessConfig::default().with_split_ratio(1.0), "split_ratio"),
            (HarnessConfig::default().with_threshold(2.0), "threshold"),
            (HarnessConfig::default().with_folds(1), "folds"),
            (HarnessConfig::default().with_classifiers(Vec::new()), "classifiers"),
            (
                HarnessConfig::default().with_classifiers(vec![ClassifierSpec::new(
                    ClassifierKind::DecisionTree,
                    ParamGrid::new().axis("depth", [3i64]),
                )]),
                "depth",
            ),
        ];
        for (config, expected) in cases {
            match config.validate() {
                Err(HarnessError::ConfigError { key, .. }) => assert_eq!(key, expected),
                other => panic!("expected ConfigError for {}, got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let parsed: std::result::Result<HarnessConfig, _> = serde_json::from_str(r#"{"primary_metric": "logloss"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let config = HarnessConfig::default().with_seed(99).with_folds(3);
        config.save(file.path()).unwrap();
        assert_eq!(HarnessConfig::from_file(file.path()).unwrap(), config);
    }
}
