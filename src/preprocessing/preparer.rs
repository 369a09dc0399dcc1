//! Raw table → clean dataset

use super::PreparationConfig;
use crate::data::{format_level, ColumnKind, Dataset, FeatureColumn};
use crate::error::{HarnessError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Per-column outcome of preparation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDiagnostic {
    pub name: String,
    pub kind: ColumnKind,
    pub missing: usize,
    pub imputed: bool,
}

/// What preparation did to the raw table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparationReport {
    pub n_records: usize,
    pub n_positive: usize,
    pub dropped_columns: Vec<String>,
    pub columns: Vec<ColumnDiagnostic>,
}

impl PreparationReport {
    /// Columns whose missing values were imputed
    pub fn imputed_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.imputed)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Cleans a raw table into a [`Dataset`]
#[derive(Debug, Clone, Default)]
pub struct DatasetPreparer {
    config: PreparationConfig,
}

impl DatasetPreparer {
    pub fn new(config: PreparationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreparationConfig {
        &self.config
    }

    /// Drop identifiers, cast nominal columns, check for missing values and
    /// extract the binary label.
    pub fn prepare(&self, df: &DataFrame) -> Result<(Dataset, PreparationReport)> {
        let label_name = self.config.label_column.as_str();
        let label_column = df
            .column(label_name)
            .map_err(|_| HarnessError::data_integrity(label_name, "label column not found"))?;
        let labels = self.extract_labels(label_column.as_materialized_series())?;

        let mut dropped = Vec::new();
        let mut raw_columns = Vec::new();

        for column in df.get_columns() {
            let name = column.name().to_string();
            if name == label_name {
                continue;
            }
            if self.config.identifier_columns.iter().any(|c| *c == name) {
                dropped.push(name);
                continue;
            }
            raw_columns.push(self.extract_column(&name, column.as_materialized_series())?);
        }

        let offending: Vec<&RawColumn> = raw_columns
            .iter()
            .filter(|c| c.missing() > 0 && !self.config.allow_missing.iter().any(|a| *a == c.name))
            .collect();
        if let Some(first) = offending.first() {
            let others: Vec<&str> = offending[1..].iter().map(|c| c.name.as_str()).collect();
            let mut reason = format!("{} missing value(s) and the column is not allowed to have any", first.missing());
            if !others.is_empty() {
                reason.push_str(&format!(" (also missing: {})", others.join(", ")));
            }
            return Err(HarnessError::data_integrity(first.name.clone(), reason));
        }

        let mut diagnostics = Vec::with_capacity(raw_columns.len());
        let mut columns = Vec::with_capacity(raw_columns.len());
        for raw in raw_columns {
            let missing = raw.missing();
            if missing > 0 {
                warn!(column = %raw.name, missing, "Imputing missing values");
            }
            let column = raw.into_feature()?;
            diagnostics.push(ColumnDiagnostic {
                name: column.name.clone(),
                kind: column.kind(),
                missing,
                imputed: missing > 0,
            });
            columns.push(column);
        }

        let dataset = Dataset::new(columns, labels, label_name)?;
        let report = PreparationReport {
            n_records: dataset.len(),
            n_positive: dataset.n_positive(),
            dropped_columns: dropped,
            columns: diagnostics,
        };

        info!(
            records = report.n_records,
            positives = report.n_positive,
            features = dataset.columns().len(),
            dropped = report.dropped_columns.len(),
            "Prepared dataset"
        );

        Ok((dataset, report))
    }

    fn extract_labels(&self, series: &Series) -> Result<Vec<u8>> {
        let name = self.config.label_column.as_str();
        if series.null_count() > 0 {
            return Err(HarnessError::data_integrity(
                name,
                format!("{} missing label value(s)", series.null_count()),
            ));
        }

        match series.dtype() {
            DataType::String => {
                let values: Vec<String> = series
                    .str()?
                    .into_iter()
                    .map(|v| v.unwrap_or_default().trim().to_string())
                    .collect();
                let mut distinct: Vec<&str> = values.iter().map(String::as_str).collect();
                distinct.sort_unstable();
                distinct.dedup();
                if distinct.len() > 2 {
                    return Err(HarnessError::data_integrity(
                        name,
                        format!("label must be binary, found {} distinct values", distinct.len()),
                    ));
                }
                let positive = match &self.config.positive_label {
                    Some(p) => p.clone(),
                    None if distinct.iter().all(|v| *v == "0" || *v == "1") => "1".to_string(),
                    None => {
                        return Err(HarnessError::data_integrity(
                            name,
                            "text label needs a configured positive value",
                        ))
                    }
                };
                Ok(values.iter().map(|v| u8::from(*v == positive)).collect())
            }
            DataType::Boolean => Ok(series.bool()?.into_iter().map(|v| u8::from(v.unwrap_or(false))).collect()),
            dtype if is_numeric_dtype(dtype) => {
                let floats = series.cast(&DataType::Float64)?;
                floats
                    .f64()?
                    .into_iter()
                    .map(|v| match v {
                        Some(x) if x == 0.0 => Ok(0),
                        Some(x) if x == 1.0 => Ok(1),
                        other => Err(HarnessError::data_integrity(
                            name,
                            format!("label must be 0 or 1, found {:?}", other),
                        )),
                    })
                    .collect()
            }
            other => Err(HarnessError::data_integrity(name, format!("unsupported label type {}", other))),
        }
    }

    fn extract_column(&self, name: &str, series: &Series) -> Result<RawColumn> {
        let nominal = self.config.nominal_columns.iter().any(|c| c == name);
        let values = match series.dtype() {
            DataType::String => RawValues::Text(
                series
                    .str()?
                    .into_iter()
                    .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
                    .collect(),
            ),
            DataType::Boolean => RawValues::Text(
                series
                    .bool()?
                    .into_iter()
                    .map(|v| v.map(|b| if b { "1".to_string() } else { "0".to_string() }))
                    .collect(),
            ),
            dtype if is_numeric_dtype(dtype) => {
                let floats: Vec<Option<f64>> = series
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()))
                    .collect();
                if nominal {
                    RawValues::Text(floats.into_iter().map(|v| v.map(format_level)).collect())
                } else {
                    RawValues::Numeric(floats)
                }
            }
            other => {
                return Err(HarnessError::data_integrity(
                    name,
                    format!("unsupported column type {}", other),
                ))
            }
        };
        Ok(RawColumn {
            name: name.to_string(),
            values,
        })
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

enum RawValues {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

struct RawColumn {
    name: String,
    values: RawValues,
}

impl RawColumn {
    fn missing(&self) -> usize {
        match &self.values {
            RawValues::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            RawValues::Text(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Impute remaining gaps (mean / mode) and build the feature column
    fn into_feature(self) -> Result<FeatureColumn> {
        match self.values {
            RawValues::Numeric(values) => {
                let present: Vec<f64> = values.iter().flatten().copied().collect();
                if present.is_empty() {
                    return Err(HarnessError::data_integrity(self.name, "column has no values"));
                }
                let mean = present.iter().sum::<f64>() / present.len() as f64;
                Ok(FeatureColumn::numeric(
                    self.name,
                    values.into_iter().map(|v| v.unwrap_or(mean)).collect(),
                ))
            }
            RawValues::Text(values) => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for v in values.iter().flatten() {
                    *counts.entry(v.as_str()).or_insert(0) += 1;
                }
                // BTreeMap order makes the lexicographically first level win ties
                let mode = counts
                    .iter()
                    .fold(None::<(&str, usize)>, |best, (&level, &count)| match best {
                        Some((_, c)) if c >= count => best,
                        _ => Some((level, count)),
                    })
                    .map(|(level, _)| level.to_string())
                    .ok_or_else(|| HarnessError::data_integrity(self.name.clone(), "column has no values"))?;
                let filled: Vec<String> = values.into_iter().map(|v| v.unwrap_or_else(|| mode.clone())).collect();
                Ok(FeatureColumn::categorical(self.name, &filled))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_raw_table() -> DataFrame {
        df!(
            "RowNumber" => &[1i64, 2, 3, 4],
            "CustomerId" => &[101i64, 102, 103, 104],
            "Surname" => &["Hill", "Chu", "Kay", "He"],
            "CreditScore" => &[619i64, 608, 502, 699],
            "Geography" => &["France", "Spain", "France", "Germany"],
            "HasCrCard" => &[1i64, 0, 1, 0],
            "Exited" => &[1i64, 0, 1, 0]
        )
        .unwrap()
    }

    #[test]
    fn test_prepare_drops_identifiers_and_casts_nominal() {
        let (dataset, report) = DatasetPreparer::default().prepare(&create_raw_table()).unwrap();

        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.feature_names(), vec!["CreditScore", "Geography", "HasCrCard"]);
        assert_eq!(report.dropped_columns, vec!["RowNumber", "CustomerId", "Surname"]);

        let card = dataset.column("HasCrCard").unwrap();
        assert_eq!(card.kind(), ColumnKind::Categorical);
        let (levels, _) = card.as_categorical().unwrap();
        assert_eq!(levels, &["0".to_string(), "1".to_string()]);
        assert_eq!(dataset.labels(), &[1, 0, 1, 0]);
    }

    #[test]
    fn test_missing_values_rejected() {
        let df = df!(
            "Age" => &[Some(30.0), None, Some(40.0)],
            "Exited" => &[0i64, 1, 0]
        )
        .unwrap();

        let err = DatasetPreparer::default().prepare(&df).unwrap_err();
        match err {
            HarnessError::DataIntegrity { column, reason } => {
                assert_eq!(column, "Age");
                assert!(reason.starts_with("1 missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_allowed_missing_imputed() {
        let df = df!(
            "Age" => &[Some(30.0), None, Some(40.0)],
            "Gender" => &[Some("Male"), Some("Female"), None],
            "Exited" => &[0i64, 1, 0]
        )
        .unwrap();
        let config = PreparationConfig::default().with_allow_missing(vec!["Age".into(), "Gender".into()]);

        let (dataset, report) = DatasetPreparer::new(config).prepare(&df).unwrap();
        assert_eq!(dataset.column("Age").unwrap().as_numeric().unwrap(), &[30.0, 35.0, 40.0]);
        let (levels, codes) = dataset.column("Gender").unwrap().as_categorical().unwrap();
        // Tie between Female and Male resolves to the first level
        assert_eq!(levels[codes[2]], "Female");
        assert_eq!(report.imputed_columns(), vec!["Age", "Gender"]);
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let df = df!("Age" => &[1.0, 2.0], "Exited" => &[0i64, 2]).unwrap();
        assert!(matches!(
            DatasetPreparer::default().prepare(&df),
            Err(HarnessError::DataIntegrity { .. })
        ));
    }

    #[test]
    fn test_text_label_with_positive_value() {
        let df = df!("Age" => &[1.0, 2.0, 3.0], "Churn" => &["yes", "no", "yes"]).unwrap();
        let config = PreparationConfig::default()
            .with_label_column("Churn")
            .with_positive_label("yes");
        let (dataset, _) = DatasetPreparer::new(config).prepare(&df).unwrap();
        assert_eq!(dataset.labels(), &[1, 0, 1]);
    }

    #[test]
    fn test_missing_label_column() {
        let df = df!("Age" => &[1.0]).unwrap();
        let err = DatasetPreparer::default().prepare(&df).unwrap_err();
        assert!(err.to_string().contains("Exited"));
    }
}
