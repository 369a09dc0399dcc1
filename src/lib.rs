//! Churn harness - model evaluation for bank customer churn
//!
//! This crate compares binary classifiers on a tabular churn dataset:
//! - Data preparation, descriptive statistics and chi-square screening
//! - Stratified train/test partitioning
//! - SMOTE oversampling with majority undersampling
//! - Cross-validated grid search run in parallel
//! - Evaluation (accuracy, precision, recall, F-measure, Kappa, ROC-AUC)
//! - Ranked comparison report and a persisted scoring model
//!
//! # Modules
//!
//! - [`data`] - Dataset model, CSV loading, partitioning, synthetic data
//! - [`preprocessing`] - Preparation, statistics, feature selection, encoding
//! - [`synthetic`] - Class balancing
//! - [`training`] - Classifiers, hyperparameter grids, grid search
//! - [`evaluation`] - Metrics and ROC curves
//! - [`report`] - Comparison report
//! - [`pipeline`] - End-to-end run
//! - [`scoring`] - Single-record scoring model
//! - [`server`] - HTTP scoring service
//! - [`cli`] - Command-line interface

// Core error handling and configuration
pub mod error;
pub mod config;

// Data and preprocessing
pub mod data;
pub mod preprocessing;
pub mod synthetic;

// Modeling
pub mod training;
pub mod evaluation;
pub mod report;
pub mod pipeline;
pub mod scoring;

// Services
pub mod server;
pub mod cli;

pub use error::{HarnessError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{HarnessError, Result};

    // Configuration
    pub use crate::config::HarnessConfig;

    // Data
    pub use crate::data::{load_table, ChurnGenerator, Dataset, FieldValue, Partition, Partitioner, RawRecord};

    // Preprocessing
    pub use crate::preprocessing::{DatasetPreparer, FeatureEncoder, FeatureSelector, PreparationConfig};

    // Balancing
    pub use crate::synthetic::{BalancerConfig, ClassBalancer, Sampler};

    // Training
    pub use crate::training::{
        CancellationToken, Classifier, ClassifierKind, ClassifierSpec, GridSearch, ParamGrid, ParamSet,
        SearchConfig, TrainedModel,
    };

    // Evaluation and reporting
    pub use crate::evaluation::{EvaluationResult, Evaluator, Metric, MetricValue};
    pub use crate::report::ComparisonReport;

    // Running and scoring
    pub use crate::pipeline::{Harness, HarnessOutcome};
    pub use crate::scoring::ScoringModel;
}
