//! Integration tests for the cross-validated grid search

use churn_harness::data::ChurnGenerator;
use churn_harness::evaluation::Metric;
use churn_harness::preprocessing::{DatasetPreparer, FeatureEncoder, PreparationConfig};
use churn_harness::training::{
    CancellationToken, CandidateStatus, ClassifierKind, GridSearch, ParamGrid, SearchConfig,
};
use churn_harness::HarnessError;
use ndarray::{Array1, Array2};

fn encoded(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let df = ChurnGenerator::new(n).with_seed(seed).generate().unwrap();
    let (dataset, _) = DatasetPreparer::new(PreparationConfig::default()).prepare(&df).unwrap();
    let encoder = FeatureEncoder::fit(&dataset);
    (encoder.transform(&dataset).unwrap(), FeatureEncoder::labels(&dataset))
}

fn search(kind: ClassifierKind, grid: ParamGrid, workers: usize) -> GridSearch {
    GridSearch::for_kind(kind, grid)
        .with_config(SearchConfig::default().with_folds(4).with_workers(workers))
        .with_seed(42)
}

// ============================================================================
// Search results
// ============================================================================

#[test]
fn test_single_configuration_grid() {
    let (x, y) = encoded(400, 1);
    let grid = ParamGrid::new().axis("alpha", [0.01]).axis("max_iter", [300i64]);
    let outcome = search(ClassifierKind::LogisticRegression, grid, 2).run(&x, &y).unwrap();

    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.best_index, 0);
    assert_eq!(outcome.folds, 4);
    assert_eq!(outcome.metric, Metric::Kappa);
    assert_eq!(outcome.candidates[0].fold_scores.len(), 4);
    assert_eq!(outcome.model.kind(), ClassifierKind::LogisticRegression);
    assert_eq!(outcome.n_failed(), 0);
}

#[test]
fn test_every_configuration_scored() {
    let (x, y) = encoded(400, 2);
    let grid = ParamGrid::new()
        .axis("max_depth", [2i64, 4, 6])
        .axis("criterion", ["gini", "entropy"]);
    let outcome = search(ClassifierKind::DecisionTree, grid, 0).run(&x, &y).unwrap();

    assert_eq!(outcome.candidates.len(), 6);
    for (i, candidate) in outcome.candidates.iter().enumerate() {
        assert_eq!(candidate.index, i);
        assert!(!matches!(candidate.status, CandidateStatus::Failed { .. }));
    }
    let best = &outcome.candidates[outcome.best_index];
    assert!(outcome
        .candidates
        .iter()
        .all(|c| c.ranking_score() <= best.ranking_score()));
    assert_eq!(outcome.best_params, best.params);
}

#[test]
fn test_result_independent_of_worker_count() {
    let (x, y) = encoded(300, 3);
    let grid = ParamGrid::new().axis("max_depth", [3i64, 5]);

    let serial = search(ClassifierKind::DecisionTree, grid.clone(), 1).run(&x, &y).unwrap();
    let parallel = search(ClassifierKind::DecisionTree, grid, 4).run(&x, &y).unwrap();

    assert_eq!(serial.best_index, parallel.best_index);
    assert_eq!(serial.best_score, parallel.best_score);
    for (a, b) in serial.candidates.iter().zip(parallel.candidates.iter()) {
        assert_eq!(a.fold_scores, b.fold_scores);
    }
    assert_eq!(
        serial.model.predict_proba(&x).unwrap(),
        parallel.model.predict_proba(&x).unwrap()
    );
}

// ============================================================================
// Error cases
// ============================================================================

#[test]
fn test_unknown_hyperparameter_rejected_before_training() {
    let (x, y) = encoded(200, 4);
    let grid = ParamGrid::new().axis("depth_limit", [3i64]);
    let err = search(ClassifierKind::DecisionTree, grid, 1).run(&x, &y).unwrap_err();
    assert!(matches!(err, HarnessError::ConfigError { .. }));
}

#[test]
fn test_too_few_folds_rejected() {
    let (x, y) = encoded(200, 4);
    let err = GridSearch::for_kind(ClassifierKind::DecisionTree, ParamGrid::new())
        .with_config(SearchConfig::default().with_folds(1))
        .run(&x, &y)
        .unwrap_err();
    assert!(matches!(err, HarnessError::ConfigError { .. }));
}

#[test]
fn test_cancelled_search() {
    let (x, y) = encoded(200, 5);
    let token = CancellationToken::new();
    token.cancel();

    let err = search(ClassifierKind::DecisionTree, ParamGrid::new().axis("max_depth", [3i64]), 1)
        .with_cancellation(token)
        .run(&x, &y)
        .unwrap_err();
    assert!(matches!(err, HarnessError::Cancelled { completed_units: 0 }));
}
