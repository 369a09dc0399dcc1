//! One-hot encoding of datasets and single records into feature matrices

use crate::data::{format_level, ColumnKind, ColumnValues, Dataset, FieldValue, RawRecord};
use crate::error::{HarnessError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Encoded form of one dataset column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedFeature {
    pub name: String,
    pub kind: ColumnKind,
    /// Levels in one-hot order; empty for numeric features
    pub levels: Vec<String>,
}

impl EncodedFeature {
    /// Number of matrix columns this feature expands to
    pub fn width(&self) -> usize {
        match self.kind {
            ColumnKind::Numeric => 1,
            ColumnKind::Categorical => self.levels.len(),
        }
    }
}

/// Maps datasets and records onto a fixed matrix layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    features: Vec<EncodedFeature>,
}

impl FeatureEncoder {
    /// Capture the schema (column order, kinds and levels) of a dataset
    pub fn fit(dataset: &Dataset) -> Self {
        let features = dataset
            .columns()
            .iter()
            .map(|c| EncodedFeature {
                name: c.name.clone(),
                kind: c.kind(),
                levels: c.as_categorical().map(|(l, _)| l.to_vec()).unwrap_or_default(),
            })
            .collect();
        Self { features }
    }

    pub fn features(&self) -> &[EncodedFeature] {
        &self.features
    }

    /// Total number of matrix columns
    pub fn n_columns(&self) -> usize {
        self.features.iter().map(EncodedFeature::width).sum()
    }

    /// Matrix column names; one-hot columns are named `feature=level`
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.n_columns());
        for f in &self.features {
            match f.kind {
                ColumnKind::Numeric => names.push(f.name.clone()),
                ColumnKind::Categorical => {
                    names.extend(f.levels.iter().map(|l| format!("{}={}", f.name, l)));
                }
            }
        }
        names
    }

    /// Encode a dataset with the fitted schema
    pub fn transform(&self, dataset: &Dataset) -> Result<Array2<f64>> {
        let n = dataset.len();
        let mut x = Array2::zeros((n, self.n_columns()));
        let mut offset = 0;

        for feature in &self.features {
            let column = dataset
                .column(&feature.name)
                .ok_or_else(|| HarnessError::data_integrity(feature.name.clone(), "column missing from dataset"))?;
            match (&column.values, feature.kind) {
                (ColumnValues::Numeric(values), ColumnKind::Numeric) => {
                    for (i, &v) in values.iter().enumerate() {
                        x[[i, offset]] = v;
                    }
                }
                (ColumnValues::Categorical { levels, codes }, ColumnKind::Categorical) => {
                    // Map the dataset's codes onto the fitted level order
                    let mapping: Vec<usize> = levels
                        .iter()
                        .map(|l| self.level_index(feature, l))
                        .collect::<Result<_>>()?;
                    for (i, &code) in codes.iter().enumerate() {
                        x[[i, offset + mapping[code]]] = 1.0;
                    }
                }
                _ => {
                    return Err(HarnessError::data_integrity(
                        feature.name.clone(),
                        "column kind differs from the fitted schema",
                    ))
                }
            }
            offset += feature.width();
        }
        Ok(x)
    }

    /// Binary label vector as `0.0` / `1.0`
    pub fn labels(dataset: &Dataset) -> Array1<f64> {
        dataset.labels().iter().map(|&l| f64::from(l)).collect()
    }

    /// Encode one unlabeled record. Fields not in the schema are ignored.
    pub fn encode_record(&self, record: &RawRecord) -> Result<Array1<f64>> {
        let mut row = Array1::zeros(self.n_columns());
        let mut offset = 0;

        for feature in &self.features {
            let value = record
                .get(&feature.name)
                .ok_or_else(|| HarnessError::data_integrity(feature.name.clone(), "field missing from record"))?;
            match feature.kind {
                ColumnKind::Numeric => {
                    row[offset] = match value {
                        FieldValue::Number(v) if v.is_finite() => *v,
                        FieldValue::Flag(b) => f64::from(u8::from(*b)),
                        FieldValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                            HarnessError::data_integrity(feature.name.clone(), format!("'{}' is not a number", s))
                        })?,
                        FieldValue::Number(v) => {
                            return Err(HarnessError::data_integrity(
                                feature.name.clone(),
                                format!("non-finite value {}", v),
                            ))
                        }
                    };
                }
                ColumnKind::Categorical => {
                    let level = match value {
                        FieldValue::Number(v) => format_level(*v),
                        FieldValue::Flag(b) => (if *b { "1" } else { "0" }).to_string(),
                        FieldValue::Text(s) => s.trim().to_string(),
                    };
                    row[offset + self.level_index(feature, &level)?] = 1.0;
                }
            }
            offset += feature.width();
        }
        Ok(row)
    }

    fn level_index(&self, feature: &EncodedFeature, level: &str) -> Result<usize> {
        feature.levels.iter().position(|l| l == level).ok_or_else(|| {
            HarnessError::data_integrity(
                feature.name.clone(),
                format!("unknown level '{}' (known: {})", level, feature.levels.join(", ")),
            )
        })
    }
}
