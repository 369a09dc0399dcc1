//! Descriptive statistics for a prepared dataset

use crate::data::{ColumnValues, Dataset};
use serde::{Deserialize, Serialize};

/// Summary of a numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Record count and churn rate for one categorical level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: String,
    pub count: usize,
    pub churn_rate: f64,
}

/// Summary of a categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub name: String,
    pub levels: Vec<LevelSummary>,
}

/// Pearson correlation between numeric columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Correlation between two named columns
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[i][j])
    }
}

/// Descriptive statistics for a whole dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_records: usize,
    /// `[retained, churned]`
    pub label_distribution: [usize; 2],
    pub positive_rate: f64,
    pub numeric: Vec<NumericSummary>,
    pub categorical: Vec<CategoricalSummary>,
    pub correlation: CorrelationMatrix,
}

/// Compute descriptive statistics, per-level churn rates and the numeric
/// correlation matrix
pub fn describe(dataset: &Dataset) -> DatasetSummary {
    let labels = dataset.labels();
    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    let mut numeric_values: Vec<&[f64]> = Vec::new();

    for column in dataset.columns() {
        match &column.values {
            ColumnValues::Numeric(values) => {
                numeric.push(summarize_numeric(&column.name, values));
                numeric_values.push(values);
            }
            ColumnValues::Categorical { levels, codes } => {
                let mut counts = vec![0usize; levels.len()];
                let mut churned = vec![0usize; levels.len()];
                for (&code, &label) in codes.iter().zip(labels.iter()) {
                    counts[code] += 1;
                    churned[code] += label as usize;
                }
                categorical.push(CategoricalSummary {
                    name: column.name.clone(),
                    levels: levels
                        .iter()
                        .enumerate()
                        .map(|(i, level)| LevelSummary {
                            level: level.clone(),
                            count: counts[i],
                            churn_rate: if counts[i] > 0 {
                                churned[i] as f64 / counts[i] as f64
                            } else {
                                0.0
                            },
                        })
                        .collect(),
                });
            }
        }
    }

    let k = numeric_values.len();
    let mut values = vec![vec![0.0; k]; k];
    for i in 0..k {
        values[i][i] = 1.0;
        for j in (i + 1)..k {
            let r = pearson(numeric_values[i], numeric_values[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    let names = numeric.iter().map(|s| s.name.clone()).collect();
    DatasetSummary {
        n_records: dataset.len(),
        label_distribution: dataset.class_counts(),
        positive_rate: dataset.positive_rate(),
        numeric,
        categorical,
        correlation: CorrelationMatrix { names, values },
    }
}

fn summarize_numeric(name: &str, values: &[f64]) -> NumericSummary {
    let n = values.len();
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mean = if n > 0 { values.iter().sum::<f64>() / n as f64 } else { f64::NAN };
    let std = if n > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        0.0
    };
    NumericSummary {
        name: name.to_string(),
        count: n,
        mean,
        std,
        min: sorted.first().copied().unwrap_or(f64::NAN),
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted.last().copied().unwrap_or(f64::NAN),
    }
}

/// Linear-interpolated quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Pearson correlation; 0 when either column is constant
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    let denom = (var_a * var_b).sqrt();
    if denom < 1e-12 {
        0.0
    } else {
        cov / denom
    }
}
