//! Integration tests for class balancing of the training partition

use churn_harness::data::{ChurnGenerator, Dataset, FeatureColumn, Partition, Partitioner};
use churn_harness::preprocessing::{DatasetPreparer, PreparationConfig};
use churn_harness::synthetic::{imbalance, BalancerConfig, ClassBalancer, Sampler};
use churn_harness::HarnessError;

fn partitioned(n: usize) -> Partition {
    let df = ChurnGenerator::new(n).with_positive_rate(0.2).with_seed(9).generate().unwrap();
    let (dataset, _) = DatasetPreparer::new(PreparationConfig::default()).prepare(&df).unwrap();
    Partitioner::new(0.7, 42).unwrap().split(&dataset).unwrap()
}

// ============================================================================
// Balancing behaviour
// ============================================================================

#[test]
fn test_default_percentages_even_the_classes() {
    let partition = partitioned(1000);
    assert_eq!(partition.train.class_counts(), [560, 140]);

    let balancer = ClassBalancer::new(BalancerConfig::default(), 42).unwrap();
    let result = balancer.resample(&partition.train).unwrap();
    let summary = result.summary(&partition.train);

    assert_eq!(result.minority_label, 1);
    assert_eq!(summary.n_synthetic, 140);
    assert_eq!(summary.output_counts, [280, 280]);
    assert_eq!(summary.n_majority_dropped, 280);
}

#[test]
fn test_balancing_moves_toward_even_split() {
    let partition = partitioned(1000);
    for (over, under) in [(100.0, 200.0), (50.0, 150.0), (300.0, 100.0), (200.0, 400.0)] {
        let config = BalancerConfig {
            perc_over: over,
            perc_under: under,
            ..Default::default()
        };
        let result = ClassBalancer::new(config, 5).unwrap().resample(&partition.train).unwrap();
        let before = imbalance(partition.train.class_counts());
        let after = imbalance(result.dataset.class_counts());
        assert!(after < before, "over={} under={}: {} !< {}", over, under, after, before);
    }
}

#[test]
fn test_test_partition_untouched() {
    let partition = partitioned(600);
    let test_before = partition.test.clone();

    let balancer = ClassBalancer::new(BalancerConfig::default(), 42).unwrap();
    let balanced = balancer.resample(&partition.train).unwrap();

    assert_eq!(partition.test, test_before);
    assert_eq!(partition.test.len(), 180);
    assert_ne!(balanced.dataset.len(), partition.train.len());
}

#[test]
fn test_same_seed_same_output() {
    let partition = partitioned(600);
    let a = ClassBalancer::new(BalancerConfig::default(), 17).unwrap().resample(&partition.train).unwrap();
    let b = ClassBalancer::new(BalancerConfig::default(), 17).unwrap().resample(&partition.train).unwrap();
    assert_eq!(a.dataset, b.dataset);
}

#[test]
fn test_schema_preserved() {
    let partition = partitioned(600);
    let result = ClassBalancer::new(BalancerConfig::default(), 1).unwrap().resample(&partition.train).unwrap();
    assert_eq!(result.dataset.feature_names(), partition.train.feature_names());

    let (levels_in, _) = partition.train.column("Geography").unwrap().as_categorical().unwrap();
    let (levels_out, codes_out) = result.dataset.column("Geography").unwrap().as_categorical().unwrap();
    assert_eq!(levels_in, levels_out);
    assert!(codes_out.iter().all(|&c| c < levels_out.len()));
}

// ============================================================================
// Error cases
// ============================================================================

#[test]
fn test_insufficient_minority_samples() {
    let n = 30;
    let labels: Vec<u8> = (0..n).map(|i| u8::from(i < 5)).collect();
    let ages: Vec<f64> = (0..n).map(|i| 20.0 + i as f64).collect();
    let dataset = Dataset::new(vec![FeatureColumn::numeric("Age", ages)], labels, "Exited").unwrap();

    let err = ClassBalancer::new(BalancerConfig::default(), 1)
        .unwrap()
        .resample(&dataset)
        .unwrap_err();
    assert!(matches!(
        err,
        HarnessError::InsufficientMinoritySamples { available: 5, required: 6 }
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let config = BalancerConfig {
        k_neighbors: 0,
        ..Default::default()
    };
    assert!(ClassBalancer::new(config, 1).is_err());

    let config = BalancerConfig {
        perc_over: -10.0,
        ..Default::default()
    };
    assert!(matches!(ClassBalancer::new(config, 1), Err(HarnessError::ConfigError { .. })));
}
