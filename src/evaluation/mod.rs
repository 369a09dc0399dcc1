//! Model evaluation
//!
//! Scores a fitted model's probabilities against held-out labels:
//! confusion matrix, accuracy, precision, recall, F-measure, Cohen's Kappa
//! and ROC-AUC. Metrics with a zero denominator are reported as
//! [`MetricValue::Undefined`] instead of a number.

mod roc;

pub use roc::{RocCurve, RocPoint};

use crate::error::{HarnessError, Result};
use crate::training::TrainedModel;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Evaluation metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    Precision,
    Recall,
    #[serde(alias = "f1")]
    FMeasure,
    Kappa,
    #[serde(alias = "roc_auc")]
    Auc,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Accuracy,
        Metric::Precision,
        Metric::Recall,
        Metric::FMeasure,
        Metric::Kappa,
        Metric::Auc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::FMeasure => "f_measure",
            Metric::Kappa => "kappa",
            Metric::Auc => "auc",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Metric {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "accuracy" => Ok(Metric::Accuracy),
            "precision" => Ok(Metric::Precision),
            "recall" => Ok(Metric::Recall),
            "f_measure" | "f1" => Ok(Metric::FMeasure),
            "kappa" => Ok(Metric::Kappa),
            "auc" | "roc_auc" => Ok(Metric::Auc),
            other => Err(HarnessError::config("metric", format!("unknown metric '{}'", other))),
        }
    }
}

/// A metric outcome: a number, or the marker for a zero denominator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Defined(f64),
    Undefined,
}

impl MetricValue {
    /// `numerator / denominator`, undefined when the denominator is zero
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            MetricValue::Undefined
        } else {
            MetricValue::Defined(numerator / denominator)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Defined(v) => Some(*v),
            MetricValue::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, MetricValue::Defined(_))
    }

    /// Numeric view, NaN when undefined
    pub fn as_f64(&self) -> f64 {
        self.value().unwrap_or(f64::NAN)
    }

    /// Sort key where undefined ranks below every number
    pub fn ranking_key(&self) -> f64 {
        self.value().unwrap_or(f64::NEG_INFINITY)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Defined(v) => write!(f, "{:.4}", v),
            MetricValue::Undefined => write!(f, "NA"),
        }
    }
}

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(predicted: &[u8], actual: &[u8]) -> Self {
        let mut matrix = Self::default();
        for (&p, &a) in predicted.iter().zip(actual.iter()) {
            match (p, a) {
                (1, 1) => matrix.tp += 1,
                (0, 0) => matrix.tn += 1,
                (1, _) => matrix.fp += 1,
                _ => matrix.fn_ += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    pub fn accuracy(&self) -> MetricValue {
        MetricValue::ratio((self.tp + self.tn) as f64, self.total() as f64)
    }

    pub fn precision(&self) -> MetricValue {
        MetricValue::ratio(self.tp as f64, (self.tp + self.fp) as f64)
    }

    pub fn recall(&self) -> MetricValue {
        MetricValue::ratio(self.tp as f64, (self.tp + self.fn_) as f64)
    }

    /// Harmonic mean of precision and recall
    pub fn f_measure(&self) -> MetricValue {
        match (self.precision(), self.recall()) {
            (MetricValue::Defined(p), MetricValue::Defined(r)) => MetricValue::ratio(2.0 * p * r, p + r),
            _ => MetricValue::Undefined,
        }
    }

    /// Cohen's Kappa: `(p_o - p_e) / (1 - p_e)`
    pub fn kappa(&self) -> MetricValue {
        let n = self.total() as f64;
        if n == 0.0 {
            return MetricValue::Undefined;
        }
        let p_o = (self.tp + self.tn) as f64 / n;
        let predicted_pos = (self.tp + self.fp) as f64;
        let actual_pos = (self.tp + self.fn_) as f64;
        let predicted_neg = (self.tn + self.fn_) as f64;
        let actual_neg = (self.tn + self.fp) as f64;
        let p_e = (predicted_pos * actual_pos + predicted_neg * actual_neg) / (n * n);

        let denominator = 1.0 - p_e;
        if denominator.abs() < 1e-12 {
            MetricValue::Undefined
        } else {
            MetricValue::Defined((p_o - p_e) / denominator)
        }
    }
}

/// Metrics of one classifier on a test set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub classifier: String,
    pub threshold: f64,
    pub n_records: usize,
    pub confusion: ConfusionMatrix,
    pub accuracy: MetricValue,
    pub precision: MetricValue,
    pub recall: MetricValue,
    pub f_measure: MetricValue,
    pub kappa: MetricValue,
    pub auc: MetricValue,
    pub roc: RocCurve,
}

impl EvaluationResult {
    pub fn metric(&self, metric: Metric) -> MetricValue {
        match metric {
            Metric::Accuracy => self.accuracy,
            Metric::Precision => self.precision,
            Metric::Recall => self.recall,
            Metric::FMeasure => self.f_measure,
            Metric::Kappa => self.kappa,
            Metric::Auc => self.auc,
        }
    }

    /// Numeric value of a metric, failing when it is undefined
    pub fn require(&self, metric: Metric) -> Result<f64> {
        self.metric(metric).value().ok_or_else(|| HarnessError::MetricUndefined {
            metric: metric.to_string(),
            reason: format!("zero denominator for classifier '{}'", self.classifier),
        })
    }
}

/// Scores probabilities at a fixed decision threshold
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    threshold: f64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl Evaluator {
    pub fn new(threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(HarnessError::config("threshold", "must be in [0, 1]"));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Predict on `x` and score against 0/1 labels `y`
    pub fn evaluate(&self, name: &str, model: &TrainedModel, x: &Array2<f64>, y: &Array1<f64>) -> Result<EvaluationResult> {
        let probabilities = model.predict_proba(x)?;
        self.evaluate_probabilities(name, &probabilities, y)
    }

    /// Score precomputed positive-class probabilities
    pub fn evaluate_probabilities(
        &self,
        name: &str,
        probabilities: &Array1<f64>,
        y: &Array1<f64>,
    ) -> Result<EvaluationResult> {
        if probabilities.len() != y.len() {
            return Err(HarnessError::ShapeError {
                expected: format!("{} probabilities", y.len()),
                actual: format!("{} probabilities", probabilities.len()),
            });
        }
        if let Some(p) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(HarnessError::ConvergenceFailure {
                model: name.to_string(),
                reason: format!("probability {} outside [0, 1]", p),
            });
        }

        let actual: Vec<u8> = y.iter().map(|&v| u8::from(v >= 0.5)).collect();
        let predicted: Vec<u8> = probabilities.iter().map(|&p| u8::from(p >= self.threshold)).collect();
        let probabilities = probabilities.to_vec();

        let confusion = ConfusionMatrix::from_labels(&predicted, &actual);
        let roc = RocCurve::compute(&probabilities, &actual);

        Ok(EvaluationResult {
            classifier: name.to_string(),
            threshold: self.threshold,
            n_records: actual.len(),
            accuracy: confusion.accuracy(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            f_measure: confusion.f_measure(),
            kappa: confusion.kappa(),
            auc: roc.auc,
            confusion,
            roc,
        })
    }
}
