//! Persisted single-record scoring model

use crate::data::RawRecord;
use crate::error::{HarnessError, Result};
use crate::preprocessing::{EncodedFeature, FeatureEncoder};
use crate::training::{ClassifierKind, ParamSet, TrainedModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Encoder, fitted model and decision threshold bundled for scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringModel {
    pub classifier: ClassifierKind,
    /// Configuration chosen by the grid search
    pub params: ParamSet,
    pub threshold: f64,
    /// Name of the label the probabilities refer to
    pub label_column: String,
    pub trained_at: DateTime<Utc>,
    encoder: FeatureEncoder,
    model: TrainedModel,
}

impl ScoringModel {
    pub fn new(
        encoder: FeatureEncoder,
        model: TrainedModel,
        params: ParamSet,
        threshold: f64,
        label_column: impl Into<String>,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(HarnessError::config("threshold", "must be in [0, 1]"));
        }
        Ok(Self {
            classifier: model.kind(),
            params,
            threshold,
            label_column: label_column.into(),
            trained_at: Utc::now(),
            encoder,
            model,
        })
    }

    /// Fields a record must carry, in encoding order
    pub fn schema(&self) -> &[EncodedFeature] {
        self.encoder.features()
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Churn probability of one record
    pub fn score(&self, record: &RawRecord) -> Result<f64> {
        let row = self.encoder.encode_record(record)?;
        self.model.predict_row(row.view())
    }

    /// Whether the record is predicted to churn at the bundled threshold
    pub fn classify(&self, record: &RawRecord) -> Result<bool> {
        Ok(self.score(record)? >= self.threshold)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, serde_json::to_string(self)?)?;
        info!(path = %path.display(), classifier = %self.classifier, "Scoring model saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&text)?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, FeatureColumn, FieldValue};
    use crate::training::Classifier;
    use crate::training::DecisionTreeClassifier;

    fn fitted() -> ScoringModel {
        let ages: Vec<f64> = (0..20).map(|i| 20.0 + i as f64 * 2.0).collect();
        let geo: Vec<&str> = (0..20).map(|i| if i % 2 == 0 { "France" } else { "Spain" }).collect();
        let labels: Vec<u8> = (0..20).map(|i| u8::from(i >= 10)).collect();
        let dataset = Dataset::new(
            vec![FeatureColumn::numeric("Age", ages), FeatureColumn::categorical("Geography", &geo)],
            labels,
            "Exited",
        )
        .unwrap();

        let encoder = FeatureEncoder::fit(&dataset);
        let x = encoder.transform(&dataset).unwrap();
        let y = FeatureEncoder::labels(&dataset);
        let model = DecisionTreeClassifier.fit(&x, &y, &ParamSet::new(), 3).unwrap();
        ScoringModel::new(encoder, model, ParamSet::new(), 0.5, "Exited").unwrap()
    }

    fn record(age: f64, geo: &str) -> RawRecord {
        let mut r = RawRecord::new();
        r.insert("Age".to_string(), FieldValue::Number(age));
        r.insert("Geography".to_string(), FieldValue::Text(geo.to_string()));
        r
    }

    #[test]
    fn test_score_and_classify() {
        let model = fitted();
        assert_eq!(model.score(&record(58.0, "Spain")).unwrap(), 1.0);
        assert!(!model.classify(&record(22.0, "France")).unwrap());
    }

    #[test]
    fn test_invalid_record() {
        let model = fitted();
        assert!(matches!(
            model.score(&record(30.0, "Germany")),
            Err(HarnessError::DataIntegrity { column, .. }) if column == "Geography"
        ));
        let mut missing = record(30.0, "France");
        missing.remove("Age");
        assert!(model.score(&missing).is_err());
    }

    #[test]
    fn test_save_load() {
        let model = fitted();
        let file = tempfile::NamedTempFile::new().unwrap();
        model.save(file.path()).unwrap();
        let restored = ScoringModel::load(file.path()).unwrap();
        assert_eq!(restored.classifier, ClassifierKind::DecisionTree);
        assert_eq!(
            restored.score(&record(40.0, "Spain")).unwrap(),
            model.score(&record(40.0, "Spain")).unwrap()
        );
    }
}
