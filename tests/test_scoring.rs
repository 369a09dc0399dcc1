//! Integration tests for the persisted scoring model

use churn_harness::data::{ChurnGenerator, FieldValue, RawRecord};
use churn_harness::preprocessing::{DatasetPreparer, FeatureEncoder, PreparationConfig};
use churn_harness::scoring::ScoringModel;
use churn_harness::training::{Classifier, ClassifierKind, ParamSet};
use churn_harness::HarnessError;

fn trained(kind: ClassifierKind, params: ParamSet) -> ScoringModel {
    let df = ChurnGenerator::new(500).with_seed(13).generate().unwrap();
    let (dataset, _) = DatasetPreparer::new(PreparationConfig::default()).prepare(&df).unwrap();
    let encoder = FeatureEncoder::fit(&dataset);
    let x = encoder.transform(&dataset).unwrap();
    let y = FeatureEncoder::labels(&dataset);
    let model = kind.adapter().fit(&x, &y, &params, 42).unwrap();
    ScoringModel::new(encoder, model, params, 0.5, "Exited").unwrap()
}

fn customer(age: f64, geography: &str, products: f64, active: f64) -> RawRecord {
    let mut record = RawRecord::new();
    let numbers = [
        ("CreditScore", 640.0),
        ("Age", age),
        ("Tenure", 4.0),
        ("Balance", 95_000.0),
        ("NumOfProducts", products),
        ("HasCrCard", 1.0),
        ("IsActiveMember", active),
        ("EstimatedSalary", 88_000.0),
    ];
    for (name, value) in numbers {
        record.insert(name.to_string(), FieldValue::Number(value));
    }
    record.insert("Geography".to_string(), FieldValue::Text(geography.to_string()));
    record.insert("Gender".to_string(), FieldValue::Text("Female".to_string()));
    record
}

// ============================================================================
// Scoring
// ============================================================================

#[test]
fn test_probabilities_in_unit_interval() {
    let model = trained(ClassifierKind::LogisticRegression, ParamSet::new().with("alpha", 0.01));
    for (age, geo) in [(25.0, "France"), (48.0, "Germany"), (70.0, "Spain")] {
        let p = model.score(&customer(age, geo, 1.0, 0.0)).unwrap();
        assert!((0.0..=1.0).contains(&p), "p = {}", p);
        assert_eq!(model.classify(&customer(age, geo, 1.0, 0.0)).unwrap(), p >= 0.5);
    }
}

#[test]
fn test_older_inactive_customer_scores_higher() {
    let model = trained(ClassifierKind::LogisticRegression, ParamSet::new().with("alpha", 0.01));
    let risky = model.score(&customer(55.0, "Germany", 1.0, 0.0)).unwrap();
    let safe = model.score(&customer(28.0, "France", 2.0, 1.0)).unwrap();
    assert!(risky > safe, "{} <= {}", risky, safe);
}

#[test]
fn test_schema_lists_prepared_features() {
    let model = trained(ClassifierKind::DecisionTree, ParamSet::new().with("max_depth", 4i64));
    let names: Vec<&str> = model.schema().iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"Age"));
    assert!(names.contains(&"Geography"));
    assert!(!names.contains(&"CustomerId"));
    assert!(!names.contains(&"Exited"));
}

#[test]
fn test_unseen_level_rejected() {
    let model = trained(ClassifierKind::DecisionTree, ParamSet::new().with("max_depth", 4i64));
    let err = model.score(&customer(40.0, "Italy", 1.0, 1.0)).unwrap_err();
    assert!(matches!(err, HarnessError::DataIntegrity { ref column, .. } if column == "Geography"));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_save_and_load_round_trip() {
    let model = trained(ClassifierKind::RandomForest, ParamSet::new().with("n_estimators", 10i64));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    model.save(&path).unwrap();

    let restored = ScoringModel::load(&path).unwrap();
    assert_eq!(restored.classifier, ClassifierKind::RandomForest);
    assert_eq!(restored.params, model.params);
    assert_eq!(restored.threshold, 0.5);
    assert_eq!(restored.label_column, "Exited");

    let record = customer(47.0, "Germany", 1.0, 0.0);
    assert_eq!(restored.score(&record).unwrap(), model.score(&record).unwrap());
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ScoringModel::load(dir.path().join("absent.json")),
        Err(HarnessError::Io(_))
    ));
}
