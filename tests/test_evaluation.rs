//! Integration tests for evaluation metrics, ROC-AUC and the comparison report

use churn_harness::data::{ChurnGenerator, Partitioner};
use churn_harness::evaluation::{ConfusionMatrix, Evaluator, Metric, MetricValue};
use churn_harness::preprocessing::{DatasetPreparer, FeatureEncoder, PreparationConfig};
use churn_harness::report::ComparisonReport;
use churn_harness::training::{Classifier, ClassifierKind, ParamSet};
use churn_harness::HarnessError;
use ndarray::{array, Array1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn assert_close(actual: MetricValue, expected: f64) {
    let value = actual.value().expect("metric should be defined");
    assert!((value - expected).abs() < 1e-9, "{} != {}", value, expected);
}

// ============================================================================
// Metric values
// ============================================================================

#[test]
fn test_known_confusion_matrix() {
    // 20 TP, 10 FN, 5 FP, 15 TN
    let mut probabilities = Vec::new();
    let mut labels = Vec::new();
    for (p, y, count) in [(0.9, 1.0, 20), (0.1, 1.0, 10), (0.8, 0.0, 5), (0.2, 0.0, 15)] {
        probabilities.extend(std::iter::repeat(p).take(count));
        labels.extend(std::iter::repeat(y).take(count));
    }
    let result = Evaluator::default()
        .evaluate_probabilities("fixed", &Array1::from(probabilities), &Array1::from(labels))
        .unwrap();

    assert_eq!(
        result.confusion,
        ConfusionMatrix {
            tp: 20,
            tn: 15,
            fp: 5,
            fn_: 10
        }
    );
    assert_close(result.accuracy, 0.7);
    assert_close(result.precision, 0.8);
    assert_close(result.recall, 2.0 / 3.0);
    assert_close(result.f_measure, 2.0 * 0.8 * (2.0 / 3.0) / (0.8 + 2.0 / 3.0));
    assert_close(result.kappa, 0.4);
}

#[test]
fn test_threshold_moves_predictions() {
    let probabilities = array![0.65, 0.55, 0.45, 0.35];
    let labels = array![1.0, 0.0, 1.0, 0.0];

    let strict = Evaluator::new(0.6).unwrap().evaluate_probabilities("m", &probabilities, &labels).unwrap();
    let lenient = Evaluator::new(0.4).unwrap().evaluate_probabilities("m", &probabilities, &labels).unwrap();
    assert_eq!(strict.confusion.tp + strict.confusion.fp, 1);
    assert_eq!(lenient.confusion.tp + lenient.confusion.fp, 3);
    assert_eq!(strict.auc, lenient.auc);
}

#[test]
fn test_perfect_separation_auc_is_one() {
    let result = Evaluator::default()
        .evaluate_probabilities("oracle", &array![0.95, 0.7, 0.6, 0.3, 0.05], &array![1.0, 1.0, 1.0, 0.0, 0.0])
        .unwrap();
    assert_eq!(result.auc, MetricValue::Defined(1.0));
    let last = result.roc.points.last().unwrap();
    assert_eq!((last.fpr, last.tpr), (1.0, 1.0));
}

#[test]
fn test_random_scores_auc_near_half() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let n = 4000;
    let probabilities: Array1<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let labels: Array1<f64> = (0..n).map(|i| (i % 2) as f64).collect();

    let result = Evaluator::default().evaluate_probabilities("coin", &probabilities, &labels).unwrap();
    let auc = result.require(Metric::Auc).unwrap();
    assert!((auc - 0.5).abs() < 0.05, "auc = {}", auc);
}

#[test]
fn test_single_class_labels() {
    let result = Evaluator::default()
        .evaluate_probabilities("one-class", &array![0.2, 0.7, 0.9], &array![0.0, 0.0, 0.0])
        .unwrap();
    assert_eq!(result.auc, MetricValue::Undefined);
    assert_eq!(result.recall, MetricValue::Undefined);
    assert!(result.accuracy.is_defined());
    assert!(matches!(result.require(Metric::Auc), Err(HarnessError::MetricUndefined { .. })));
}

#[test]
fn test_rejects_bad_input() {
    assert!(matches!(Evaluator::new(1.5), Err(HarnessError::ConfigError { .. })));

    let err = Evaluator::default()
        .evaluate_probabilities("short", &array![0.1, 0.2], &array![0.0, 1.0, 1.0])
        .unwrap_err();
    assert!(matches!(err, HarnessError::ShapeError { .. }));

    let err = Evaluator::default()
        .evaluate_probabilities("broken", &array![0.1, 1.2], &array![0.0, 1.0])
        .unwrap_err();
    assert!(matches!(err, HarnessError::ConvergenceFailure { .. }));
}

// ============================================================================
// Fitted models and the report
// ============================================================================

#[test]
fn test_fitted_models_evaluated_and_ranked() {
    let df = ChurnGenerator::new(800).with_seed(21).generate().unwrap();
    let (dataset, _) = DatasetPreparer::new(PreparationConfig::default()).prepare(&df).unwrap();
    let partition = Partitioner::new(0.7, 42).unwrap().split(&dataset).unwrap();

    let encoder = FeatureEncoder::fit(&partition.train);
    let x_train = encoder.transform(&partition.train).unwrap();
    let y_train = FeatureEncoder::labels(&partition.train);
    let x_test = encoder.transform(&partition.test).unwrap();
    let y_test = FeatureEncoder::labels(&partition.test);

    let evaluator = Evaluator::default();
    let mut report = ComparisonReport::new(Metric::Auc);
    for kind in [ClassifierKind::LogisticRegression, ClassifierKind::DecisionTree] {
        let model = kind.adapter().fit(&x_train, &y_train, &ParamSet::new(), 42).unwrap();
        let result = evaluator.evaluate(kind.display_name(), &model, &x_test, &y_test).unwrap();

        assert_eq!(result.n_records, partition.test.len());
        for metric in [Metric::Accuracy, Metric::Auc] {
            let value = result.require(metric).unwrap();
            assert!((0.0..=1.0).contains(&value), "{} {} = {}", kind, metric, value);
        }
        report.add(result);
    }

    let ranking = report.ranking();
    assert_eq!(ranking.len(), 2);
    assert!(ranking[0].auc.ranking_key() >= ranking[1].auc.ranking_key());
    assert!(report.best().unwrap().require(Metric::Auc).unwrap() > 0.6);

    let rendered = report.render();
    assert!(rendered.contains("Logistic Regression"));
    assert!(rendered.contains("Decision Tree"));
}
