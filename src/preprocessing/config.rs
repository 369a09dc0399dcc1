//! Preparation and feature-selection configuration

use serde::{Deserialize, Serialize};

/// How raw tables are turned into a [`Dataset`](crate::data::Dataset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreparationConfig {
    /// Label column (1 = churned)
    pub label_column: String,

    /// Text value mapped to the positive class when the label is not numeric
    pub positive_label: Option<String>,

    /// Columns dropped before anything else (row numbers, ids, names)
    pub identifier_columns: Vec<String>,

    /// Numeric columns that are really nominal and become categorical
    pub nominal_columns: Vec<String>,

    /// Columns whose missing values are imputed instead of rejected
    pub allow_missing: Vec<String>,
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            label_column: "Exited".to_string(),
            positive_label: None,
            identifier_columns: vec!["RowNumber".into(), "CustomerId".into(), "Surname".into()],
            nominal_columns: vec!["HasCrCard".into(), "IsActiveMember".into(), "NumOfProducts".into()],
            allow_missing: Vec::new(),
        }
    }
}

impl PreparationConfig {
    pub fn with_label_column(mut self, name: impl Into<String>) -> Self {
        self.label_column = name.into();
        self
    }

    pub fn with_positive_label(mut self, value: impl Into<String>) -> Self {
        self.positive_label = Some(value.into());
        self
    }

    pub fn with_identifier_columns(mut self, columns: Vec<String>) -> Self {
        self.identifier_columns = columns;
        self
    }

    pub fn with_nominal_columns(mut self, columns: Vec<String>) -> Self {
        self.nominal_columns = columns;
        self
    }

    pub fn with_allow_missing(mut self, columns: Vec<String>) -> Self {
        self.allow_missing = columns;
        self
    }
}

/// Chi-square feature selection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Features with a p-value above this are flagged low-value
    pub significance: f64,

    /// Drop flagged features before partitioning
    pub drop_low_value_features: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            significance: 0.05,
            drop_low_value_features: false,
        }
    }
}
