//! Data preprocessing module
//!
//! Turns a raw churn table into model-ready inputs:
//! - Dataset preparation (identifier removal, nominal casting, missing-value checks)
//! - Descriptive statistics and per-level churn rates
//! - Chi-square feature selection for categorical features
//! - One-hot encoding of datasets and single records
//! - Standard scaling for gradient-based models

mod config;
mod describe;
mod encoder;
mod preparer;
mod scaler;
pub mod feature_selection;

pub use config::{PreparationConfig, SelectionConfig};
pub use describe::{describe, CategoricalSummary, CorrelationMatrix, DatasetSummary, LevelSummary, NumericSummary};
pub use encoder::{EncodedFeature, FeatureEncoder};
pub use feature_selection::{ChiSquareScore, FeatureSelection, FeatureSelector};
pub use preparer::{ColumnDiagnostic, DatasetPreparer, PreparationReport};
pub use scaler::StandardScaler;
