//! ROC curve and trapezoidal AUC

use super::MetricValue;
use serde::{Deserialize, Serialize};

/// One operating point of the ROC curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    /// Probability threshold producing this point (`None` for the origin)
    pub threshold: Option<f64>,
    pub fpr: f64,
    pub tpr: f64,
}

/// ROC curve from (0,0) to (1,1) and its area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    pub auc: MetricValue,
}

impl RocCurve {
    /// Sweep the threshold over every distinct probability, highest first.
    ///
    /// Records sharing a probability move the curve together, so ties
    /// contribute a diagonal segment. Empty and AUC undefined when `labels`
    /// lacks either class.
    pub fn compute(probabilities: &[f64], labels: &[u8]) -> Self {
        let n_pos = labels.iter().filter(|&&l| l == 1).count();
        let n_neg = labels.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Self {
                points: Vec::new(),
                auc: MetricValue::Undefined,
            };
        }

        let mut order: Vec<usize> = (0..probabilities.len()).collect();
        order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));

        let mut points = Vec::with_capacity(order.len() + 1);
        points.push(RocPoint {
            threshold: None,
            fpr: 0.0,
            tpr: 0.0,
        });

        let (mut tp, mut fp) = (0usize, 0usize);
        let mut auc = 0.0;
        let mut i = 0;
        while i < order.len() {
            let threshold = probabilities[order[i]];
            while i < order.len() && probabilities[order[i]] == threshold {
                if labels[order[i]] == 1 {
                    tp += 1;
                } else {
                    fp += 1;
                }
                i += 1;
            }

            let prev = points[points.len() - 1];
            let point = RocPoint {
                threshold: Some(threshold),
                fpr: fp as f64 / n_neg as f64,
                tpr: tp as f64 / n_pos as f64,
            };
            auc += (point.fpr - prev.fpr) * (point.tpr + prev.tpr) / 2.0;
            points.push(point);
        }

        Self {
            points,
            auc: MetricValue::Defined(auc.clamp(0.0, 1.0)),
        }
    }
}
