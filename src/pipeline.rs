//! End-to-end comparison run
//!
//! prepare → chi-square screening → stratified split → balance Train →
//! encode → cross-validated grid search per classifier → evaluate on Test →
//! rank. Stages run sequentially; only the grid search fans out.

use crate::config::HarnessConfig;
use crate::data::{load_table, Dataset, Partitioner};
use crate::error::{HarnessError, Result};
use crate::evaluation::{Evaluator, MetricValue};
use crate::preprocessing::{
    describe, DatasetPreparer, DatasetSummary, FeatureEncoder, FeatureSelection, FeatureSelector, PreparationReport,
};
use crate::report::ComparisonReport;
use crate::scoring::ScoringModel;
use crate::synthetic::{BalanceSummary, ClassBalancer, Sampler};
use crate::training::{CancellationToken, CandidateSummary, ClassifierKind, GridSearch, ParamSet, SearchOutcome};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Grid-search result of one classifier, without the fitted model
#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub classifier: ClassifierKind,
    pub best_index: usize,
    pub best_params: ParamSet,
    pub best_score: MetricValue,
    pub candidates: Vec<CandidateSummary>,
    pub elapsed_secs: f64,
}

impl From<&SearchOutcome> for SearchSummary {
    fn from(outcome: &SearchOutcome) -> Self {
        Self {
            classifier: outcome.classifier,
            best_index: outcome.best_index,
            best_params: outcome.best_params.clone(),
            best_score: outcome.best_score,
            candidates: outcome.candidates.clone(),
            elapsed_secs: outcome.elapsed_secs,
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct HarnessOutcome {
    pub preparation: PreparationReport,
    pub summary: DatasetSummary,
    pub selection: FeatureSelection,
    /// `(train, test)` record counts before balancing
    pub partition_sizes: (usize, usize),
    pub balance: BalanceSummary,
    pub searches: Vec<SearchSummary>,
    /// Classifiers whose every configuration failed, with the reason
    pub failed_classifiers: Vec<(ClassifierKind, String)>,
    pub report: ComparisonReport,
    /// Top-ranked classifier, refit on balanced Train
    #[serde(skip)]
    pub scoring_model: ScoringModel,
}

/// Runs the comparison described by a [`HarnessConfig`]
#[derive(Debug, Clone)]
pub struct Harness {
    config: HarnessConfig,
    cancel: CancellationToken,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Share a token that aborts the grid searches between units
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Load a delimited file and run on it
    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<HarnessOutcome> {
        let df = load_table(path)?;
        self.run(&df)
    }

    pub fn run(&self, df: &DataFrame) -> Result<HarnessOutcome> {
        let config = &self.config;

        let (dataset, preparation) = DatasetPreparer::new(config.preparation.clone()).prepare(df)?;
        info!(
            records = dataset.len(),
            features = dataset.columns().len(),
            positive_rate = dataset.positive_rate(),
            "Dataset prepared"
        );
        let summary = describe(&dataset);

        let selection = FeatureSelector::new(config.selection.significance)?.evaluate(&dataset);
        let dataset = if config.selection.drop_low_value_features {
            let kept = selection.apply(&dataset);
            if kept.columns().is_empty() {
                return Err(HarnessError::config(
                    "drop_low_value_features",
                    "every feature was flagged as low value",
                ));
            }
            info!(dropped = ?selection.flagged(), "Low-value features dropped");
            kept
        } else {
            dataset
        };

        let partition = Partitioner::new(config.split_ratio, config.seed)?.split(&dataset)?;
        let partition_sizes = partition.sizes();
        info!(train = partition_sizes.0, test = partition_sizes.1, "Partitioned");

        let (train, balance) = self.balance(&partition.train)?;

        let encoder = FeatureEncoder::fit(&train);
        let x_train = encoder.transform(&train)?;
        let y_train = FeatureEncoder::labels(&train);
        let x_test = encoder.transform(&partition.test)?;
        let y_test = FeatureEncoder::labels(&partition.test);
        info!(columns = encoder.n_columns(), "Features encoded");

        let evaluator = Evaluator::new(config.threshold)?;
        let mut report = ComparisonReport::new(config.primary_metric);
        let mut searches: Vec<SearchOutcome> = Vec::new();
        let mut failed_classifiers = Vec::new();

        for spec in &config.classifiers {
            let search = GridSearch::for_kind(spec.kind, spec.grid.clone())
                .with_config(config.search.clone())
                .with_threshold(config.threshold)
                .with_seed(config.seed)
                .with_cancellation(self.cancel.clone());

            let outcome = match search.run(&x_train, &y_train) {
                Ok(outcome) => outcome,
                Err(err @ HarnessError::ConvergenceFailure { .. }) => {
                    warn!(classifier = %spec.kind, error = %err, "Classifier skipped");
                    failed_classifiers.push((spec.kind, err.to_string()));
                    continue;
                }
                Err(err) => return Err(err),
            };

            let evaluation = evaluator.evaluate(spec.kind.display_name(), &outcome.model, &x_test, &y_test)?;
            info!(
                classifier = %spec.kind,
                accuracy = %evaluation.accuracy,
                kappa = %evaluation.kappa,
                auc = %evaluation.auc,
                "Evaluated on test partition"
            );
            report.add(evaluation);
            searches.push(outcome);
        }

        // Report order matches `searches`, so the best result maps back by position
        let best_position = report
            .best()
            .and_then(|best| report.results().iter().position(|r| std::ptr::eq(r, best)))
            .ok_or_else(|| HarnessError::ConvergenceFailure {
                model: "all classifiers".to_string(),
                reason: "no classifier produced a model".to_string(),
            })?;
        let best = &searches[best_position];
        let scoring_model = ScoringModel::new(
            encoder,
            best.model.clone(),
            best.best_params.clone(),
            config.threshold,
            dataset.label_name(),
        )?;
        info!(classifier = %best.classifier, params = %best.best_params, "Scoring model selected");

        Ok(HarnessOutcome {
            preparation,
            summary,
            selection,
            partition_sizes,
            balance,
            searches: searches.iter().map(SearchSummary::from).collect(),
            failed_classifiers,
            report,
            scoring_model,
        })
    }

    fn balance(&self, train: &Dataset) -> Result<(Dataset, BalanceSummary)> {
        if !self.config.balancer.enabled {
            let counts = train.class_counts();
            let summary = BalanceSummary {
                input_counts: counts,
                output_counts: counts,
                n_synthetic: 0,
                n_majority_dropped: 0,
            };
            return Ok((train.clone(), summary));
        }

        let balancer = ClassBalancer::new(self.config.balancer.clone(), self.config.seed)?;
        let result = balancer.resample(train)?;
        let summary = result.summary(train);
        info!(
            before = ?summary.input_counts,
            after = ?summary.output_counts,
            synthetic = summary.n_synthetic,
            "Training partition balanced"
        );
        Ok((result.dataset, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ChurnGenerator;
    use crate::training::{ClassifierSpec, ParamGrid};

    fn quick_config() -> HarnessConfig {
        HarnessConfig::default().with_folds(3).with_classifiers(vec![
            ClassifierSpec::new(
                ClassifierKind::LogisticRegression,
                ParamGrid::new().axis("alpha", [0.01]).axis("max_iter", [200i64]),
            ),
            ClassifierSpec::new(ClassifierKind::DecisionTree, ParamGrid::new().axis("max_depth", [4i64])),
        ])
    }

    #[test]
    fn test_run_produces_ranked_report() {
        let df = ChurnGenerator::new(600).with_seed(5).generate().unwrap();
        let outcome = Harness::new(quick_config()).unwrap().run(&df).unwrap();

        assert_eq!(outcome.report.len(), 2);
        assert_eq!(outcome.partition_sizes.0 + outcome.partition_sizes.1, 600);
        let [neg, pos] = outcome.balance.output_counts;
        assert_eq!(neg, pos);
        assert!(outcome.preparation.dropped_columns.iter().any(|c| c == "CustomerId"));

        let best = outcome.report.best().unwrap();
        assert_eq!(best.classifier, outcome.scoring_model.classifier.display_name());
    }

    #[test]
    fn test_balancing_can_be_disabled() {
        let df = ChurnGenerator::new(400).with_seed(2).generate().unwrap();
        let mut config = quick_config();
        config.balancer.enabled = false;
        let outcome = Harness::new(config).unwrap().run(&df).unwrap();
        assert_eq!(outcome.balance.input_counts, outcome.balance.output_counts);
        assert_eq!(outcome.balance.n_synthetic, 0);
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        assert!(Harness::new(HarnessConfig::default().with_split_ratio(0.0)).is_err());
    }
}
