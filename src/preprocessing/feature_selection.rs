//! Chi-square feature selection for categorical features
//!
//! Each categorical feature is tested for independence from the churn label
//! with Pearson's chi-square test on its level × label contingency table.
//! Features whose p-value exceeds the significance threshold are flagged as
//! low-value; dropping them is left to the caller.

use crate::data::{ColumnValues, Dataset};
use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Chi-square test result for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareScore {
    pub feature: String,
    pub statistic: f64,
    pub dof: usize,
    pub p_value: f64,
    pub low_value: bool,
}

/// Outcome of a selection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelection {
    pub significance: f64,
    pub scores: Vec<ChiSquareScore>,
}

impl FeatureSelection {
    /// Features flagged as low-value
    pub fn flagged(&self) -> Vec<&str> {
        self.scores
            .iter()
            .filter(|s| s.low_value)
            .map(|s| s.feature.as_str())
            .collect()
    }

    /// Score for a named feature
    pub fn score(&self, feature: &str) -> Option<&ChiSquareScore> {
        self.scores.iter().find(|s| s.feature == feature)
    }

    /// Copy of the dataset without the flagged features
    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        dataset.drop_columns(&self.flagged())
    }
}

/// Chi-square test of independence between categorical features and the label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelector {
    significance: f64,
}

impl Default for FeatureSelector {
    fn default() -> Self {
        Self { significance: 0.05 }
    }
}

impl FeatureSelector {
    /// Create a selector; `significance` must lie in (0, 1)
    pub fn new(significance: f64) -> Result<Self> {
        if !(significance > 0.0 && significance < 1.0) {
            return Err(HarnessError::config(
                "significance",
                format!("must be in (0, 1), got {}", significance),
            ));
        }
        Ok(Self { significance })
    }

    pub fn significance(&self) -> f64 {
        self.significance
    }

    /// Score every categorical feature of the dataset
    pub fn evaluate(&self, dataset: &Dataset) -> FeatureSelection {
        let labels = dataset.labels();
        let scores: Vec<ChiSquareScore> = dataset
            .columns()
            .iter()
            .filter_map(|column| match &column.values {
                ColumnValues::Categorical { levels, codes } => {
                    let mut table = vec![[0usize; 2]; levels.len()];
                    for (&code, &label) in codes.iter().zip(labels.iter()) {
                        table[code][label as usize] += 1;
                    }
                    let (statistic, dof) = chi_square_statistic(&table);
                    let p_value = if dof == 0 { 1.0 } else { chi_square_sf(statistic, dof as f64) };
                    Some(ChiSquareScore {
                        feature: column.name.clone(),
                        statistic,
                        dof,
                        p_value,
                        low_value: p_value > self.significance,
                    })
                }
                ColumnValues::Numeric(_) => None,
            })
            .collect();

        let selection = FeatureSelection {
            significance: self.significance,
            scores,
        };
        info!(
            tested = selection.scores.len(),
            flagged = selection.flagged().len(),
            significance = self.significance,
            "Chi-square feature selection"
        );
        selection
    }
}

/// Pearson statistic and degrees of freedom of a level × class table.
///
/// Empty rows and columns do not contribute cells or degrees of freedom.
fn chi_square_statistic(table: &[[usize; 2]]) -> (f64, usize) {
    let rows: Vec<&[usize; 2]> = table.iter().filter(|r| r[0] + r[1] > 0).collect();
    let col_totals = [
        rows.iter().map(|r| r[0]).sum::<usize>(),
        rows.iter().map(|r| r[1]).sum::<usize>(),
    ];
    let n = (col_totals[0] + col_totals[1]) as f64;
    let n_cols = col_totals.iter().filter(|&&c| c > 0).count();
    if rows.len() < 2 || n_cols < 2 {
        return (0.0, 0);
    }

    let mut statistic = 0.0;
    for row in &rows {
        let row_total = (row[0] + row[1]) as f64;
        for (j, &observed) in row.iter().enumerate() {
            let expected = row_total * col_totals[j] as f64 / n;
            statistic += (observed as f64 - expected).powi(2) / expected;
        }
    }
    (statistic, (rows.len() - 1) * (n_cols - 1))
}

/// Upper tail probability of the chi-square distribution with `k` degrees of freedom
pub fn chi_square_sf(x: f64, k: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    regularized_gamma_q(k / 2.0, x / 2.0)
}

/// Regularized upper incomplete gamma function Q(a, x)
fn regularized_gamma_q(a: f64, x: f64) -> f64 {
    if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_continued_fraction(a, x)
    }
}

fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut sum = 1.0 / a;
    let mut del = sum;
    for _ in 0..500 {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * 1e-15 {
            break;
        }
    }
    (sum.ln() - x + a * x.ln() - ln_gamma(a)).exp()
}

fn gamma_q_continued_fraction(a: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..500 {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < 1e-15 {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// Lanczos approximation of ln Γ(x) for x > 0
fn ln_gamma(x: f64) -> f64 {
    const COEF: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.001_208_650_973_866_179,
        -0.000_005_395_239_384_953,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000_000_000_190_015;
    for c in COEF {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}
