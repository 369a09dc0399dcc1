//! Dataset model
//!
//! A [`Dataset`] is a column-oriented, immutable collection of customer
//! records sharing one schema: numeric and categorical feature columns plus a
//! binary churn label. It is produced by
//! [`DatasetPreparer`](crate::preprocessing::DatasetPreparer) and never
//! mutated afterwards; every transformation (subsetting, dropping columns,
//! rebalancing) returns a new value.

mod generator;
mod loader;
mod partition;

pub use generator::ChurnGenerator;
pub use loader::{load_table, write_table};
pub use partition::{Partition, Partitioner};

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single field value of an unlabeled record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

/// One unlabeled customer record, field name → value
pub type RawRecord = BTreeMap<String, FieldValue>;

/// Kind of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Values held by a feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    /// Continuous values
    Numeric(Vec<f64>),
    /// Level codes into a sorted list of level names
    Categorical { levels: Vec<String>, codes: Vec<usize> },
}

/// A named feature column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub values: ColumnValues,
}

impl FeatureColumn {
    /// Create a numeric column
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric(values),
        }
    }

    /// Create a categorical column from raw level strings.
    ///
    /// Levels are sorted so that the code assignment does not depend on row order.
    pub fn categorical<S: AsRef<str>>(name: impl Into<String>, raw: &[S]) -> Self {
        let mut levels: Vec<String> = raw.iter().map(|s| s.as_ref().to_string()).collect();
        levels.sort();
        levels.dedup();
        let codes = raw
            .iter()
            .map(|s| levels.binary_search_by(|l| l.as_str().cmp(s.as_ref())).unwrap_or(0))
            .collect();
        Self {
            name: name.into(),
            values: ColumnValues::Categorical { levels, codes },
        }
    }

    /// Column kind
    pub fn kind(&self) -> ColumnKind {
        match self.values {
            ColumnValues::Numeric(_) => ColumnKind::Numeric,
            ColumnValues::Categorical { .. } => ColumnKind::Categorical,
        }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Categorical { codes, .. } => codes.len(),
        }
    }

    /// Whether the column is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric values, if this is a numeric column
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match &self.values {
            ColumnValues::Numeric(v) => Some(v),
            ColumnValues::Categorical { .. } => None,
        }
    }

    /// Levels and codes, if this is a categorical column
    pub fn as_categorical(&self) -> Option<(&[String], &[usize])> {
        match &self.values {
            ColumnValues::Numeric(_) => None,
            ColumnValues::Categorical { levels, codes } => Some((levels, codes)),
        }
    }

    /// Select rows by index (indices may repeat)
    pub fn select(&self, indices: &[usize]) -> Self {
        let values = match &self.values {
            ColumnValues::Numeric(v) => ColumnValues::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnValues::Categorical { levels, codes } => ColumnValues::Categorical {
                levels: levels.clone(),
                codes: indices.iter().map(|&i| codes[i]).collect(),
            },
        };
        Self {
            name: self.name.clone(),
            values,
        }
    }
}

/// Render a numeric value as a categorical level name (`1.0` → `"1"`)
pub fn format_level(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// An ordered collection of labeled records with a fixed schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<FeatureColumn>,
    labels: Vec<u8>,
    label_name: String,
}

impl Dataset {
    /// Create a dataset, checking that every column has one value per label
    pub fn new(columns: Vec<FeatureColumn>, labels: Vec<u8>, label_name: impl Into<String>) -> Result<Self> {
        let label_name = label_name.into();
        for column in &columns {
            if column.len() != labels.len() {
                return Err(HarnessError::data_integrity(
                    column.name.clone(),
                    format!("has {} values but the label has {}", column.len(), labels.len()),
                ));
            }
        }
        if let Some(&bad) = labels.iter().find(|&&l| l > 1) {
            return Err(HarnessError::data_integrity(
                label_name,
                format!("label must be 0 or 1, found {}", bad),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(HarnessError::data_integrity(column.name.clone(), "duplicate column name"));
            }
        }
        Ok(Self {
            columns,
            labels,
            label_name,
        })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Feature columns in schema order
    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&FeatureColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Feature names in schema order
    pub fn feature_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Binary labels (1 = churned)
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Name of the label column
    pub fn label_name(&self) -> &str {
        &self.label_name
    }

    /// Record counts per class, `[negatives, positives]`
    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.labels.iter().filter(|&&l| l == 1).count();
        [self.labels.len() - positives, positives]
    }

    /// Number of positive (churned) records
    pub fn n_positive(&self) -> usize {
        self.class_counts()[1]
    }

    /// Fraction of positive records
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.n_positive() as f64 / self.labels.len() as f64
    }

    /// Indices of the records in each class
    pub fn class_indices(&self) -> [Vec<usize>; 2] {
        let mut indices = [Vec::new(), Vec::new()];
        for (i, &label) in self.labels.iter().enumerate() {
            indices[label as usize].push(i);
        }
        indices
    }

    /// New dataset holding the given rows, in the given order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.iter().map(|c| c.select(indices)).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            label_name: self.label_name.clone(),
        }
    }

    /// New dataset without the named columns; unknown names are ignored
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .filter(|c| !names.iter().any(|n| n.as_ref() == c.name))
                .cloned()
                .collect(),
            labels: self.labels.clone(),
            label_name: self.label_name.clone(),
        }
    }

    /// Append records from another dataset with the same schema.
    ///
    /// Categorical levels must match exactly; the balancer relies on this when
    /// it adds synthetic rows.
    pub fn concat(&self, other: &Dataset) -> Result<Self> {
        if self.columns.len() != other.columns.len() {
            return Err(HarnessError::ShapeError {
                expected: format!("{} columns", self.columns.len()),
                actual: format!("{} columns", other.columns.len()),
            });
        }
        let mut columns = Vec::with_capacity(self.columns.len());
        for (a, b) in self.columns.iter().zip(other.columns.iter()) {
            if a.name != b.name {
                return Err(HarnessError::data_integrity(
                    b.name.clone(),
                    format!("schema mismatch, expected column '{}'", a.name),
                ));
            }
            let values = match (&a.values, &b.values) {
                (ColumnValues::Numeric(x), ColumnValues::Numeric(y)) => {
                    ColumnValues::Numeric(x.iter().chain(y.iter()).copied().collect())
                }
                (
                    ColumnValues::Categorical { levels: la, codes: ca },
                    ColumnValues::Categorical { levels: lb, codes: cb },
                ) if la == lb => ColumnValues::Categorical {
                    levels: la.clone(),
                    codes: ca.iter().chain(cb.iter()).copied().collect(),
                },
                _ => {
                    return Err(HarnessError::data_integrity(
                        a.name.clone(),
                        "column kind or levels differ between datasets",
                    ))
                }
            };
            columns.push(FeatureColumn {
                name: a.name.clone(),
                values,
            });
        }
        let mut labels = self.labels.clone();
        labels.extend_from_slice(&other.labels);
        Ok(Self {
            columns,
            labels,
            label_name: self.label_name.clone(),
        })
    }
}
