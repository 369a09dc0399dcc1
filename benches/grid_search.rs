use churn_harness::data::ChurnGenerator;
use churn_harness::preprocessing::{DatasetPreparer, FeatureEncoder, PreparationConfig};
use churn_harness::synthetic::{BalancerConfig, ClassBalancer, Sampler};
use churn_harness::training::{ClassifierKind, GridSearch, ParamGrid, SearchConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn prepared(n_records: usize) -> churn_harness::data::Dataset {
    let df = ChurnGenerator::new(n_records).with_seed(42).generate().unwrap();
    let (dataset, _) = DatasetPreparer::new(PreparationConfig::default()).prepare(&df).unwrap();
    dataset
}

fn bench_balancer(c: &mut Criterion) {
    let mut group = c.benchmark_group("balancer");
    group.sample_size(10);

    for n_records in [1000, 5000].iter() {
        let dataset = prepared(*n_records);
        let balancer = ClassBalancer::new(BalancerConfig::default(), 42).unwrap();
        group.bench_with_input(BenchmarkId::new("resample", n_records), &dataset, |b, dataset| {
            b.iter(|| balancer.resample(black_box(dataset)).unwrap())
        });
    }

    group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10); // each iteration fits configurations × folds models

    let dataset = prepared(2000);
    let encoder = FeatureEncoder::fit(&dataset);
    let x = encoder.transform(&dataset).unwrap();
    let y = FeatureEncoder::labels(&dataset);

    let cases = [
        (ClassifierKind::LogisticRegression, ParamGrid::new().axis("alpha", [0.0, 0.01])),
        (ClassifierKind::DecisionTree, ParamGrid::new().axis("max_depth", [3i64, 5, 7])),
        (
            ClassifierKind::RandomForest,
            ParamGrid::new().axis("n_estimators", [20i64]).axis("max_depth", [6i64]),
        ),
    ];

    for (kind, grid) in cases {
        for workers in [1usize, 0] {
            let search = GridSearch::for_kind(kind, grid.clone())
                .with_config(SearchConfig::default().with_folds(5).with_workers(workers));
            let label = if workers == 0 { "all_cores" } else { "single" };
            group.bench_function(BenchmarkId::new(kind.as_str(), label), |b| {
                b.iter(|| search.run(black_box(&x), black_box(&y)).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_balancer, bench_grid_search);
criterion_main!(benches);
