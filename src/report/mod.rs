//! Classifier comparison report

use crate::error::Result;
use crate::evaluation::{EvaluationResult, Metric, RocPoint};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Evaluation results ranked by a primary metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    primary_metric: Metric,
    /// Results in insertion order
    results: Vec<EvaluationResult>,
}

impl Default for ComparisonReport {
    fn default() -> Self {
        Self::new(Metric::Auc)
    }
}

impl ComparisonReport {
    pub fn new(primary_metric: Metric) -> Self {
        Self {
            primary_metric,
            results: Vec::new(),
        }
    }

    pub fn primary_metric(&self) -> Metric {
        self.primary_metric
    }

    pub fn add(&mut self, result: EvaluationResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[EvaluationResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results by descending primary metric; undefined last, ties in insertion order
    pub fn ranking(&self) -> Vec<&EvaluationResult> {
        let mut ranked: Vec<&EvaluationResult> = self.results.iter().collect();
        ranked.sort_by(|a, b| {
            let ka = a.metric(self.primary_metric).ranking_key();
            let kb = b.metric(self.primary_metric).ranking_key();
            kb.total_cmp(&ka)
        });
        ranked
    }

    pub fn best(&self) -> Option<&EvaluationResult> {
        self.ranking().into_iter().next()
    }

    /// ROC points per classifier, in insertion order
    pub fn roc_curves(&self) -> Vec<(&str, &[RocPoint])> {
        self.results
            .iter()
            .map(|r| (r.classifier.as_str(), r.roc.points.as_slice()))
            .collect()
    }

    /// Fixed-width text table
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Classifier Comparison (ranked by {}) ===", self.primary_metric);
        let _ = write!(out, "{:<4} {:<22}", "#", "Classifier");
        for metric in Metric::ALL {
            let _ = write!(out, " {:>10}", metric.as_str());
        }
        out.push('\n');

        for (rank, result) in self.ranking().iter().enumerate() {
            let _ = write!(out, "{:<4} {:<22}", rank + 1, result.classifier);
            for metric in Metric::ALL {
                let _ = write!(out, " {:>10}", result.metric(metric).to_string());
            }
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
