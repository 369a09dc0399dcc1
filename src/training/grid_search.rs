//! Cross-validated grid search
//!
//! Every (configuration × fold) pair is an independent unit: fit on the
//! other k−1 folds, score the held-out fold. Units run on a dedicated rayon
//! pool and their outcomes are folded into per-configuration slots, so the
//! reduction does not depend on scheduling order. Only the final choice of
//! the best configuration is order-sensitive, and it follows grid order.

use super::{Classifier, ClassifierKind, CrossValidator, ParamGrid, ParamSet, SearchConfig, TrainedModel};
use crate::error::{HarnessError, Result};
use crate::evaluation::{Evaluator, Metric, MetricValue};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shared flag checked between grid-search units
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one configuration across all folds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Every fold produced a number
    Scored,
    /// At least one fold had an undefined metric
    Undefined,
    /// At least one fold failed to fit
    Failed { reason: String },
}

/// Per-configuration cross-validation summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    /// Position in canonical grid order
    pub index: usize,
    pub params: ParamSet,
    pub fold_scores: Vec<MetricValue>,
    pub mean: MetricValue,
    pub std: MetricValue,
    #[serde(flatten)]
    pub status: CandidateStatus,
}

impl CandidateSummary {
    /// Score used for selection; failed and undefined rank as −∞
    pub fn ranking_score(&self) -> f64 {
        match self.status {
            CandidateStatus::Scored => self.mean.ranking_key(),
            _ => f64::NEG_INFINITY,
        }
    }
}

/// Result of a completed search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub classifier: ClassifierKind,
    pub metric: Metric,
    pub folds: usize,
    pub best_index: usize,
    pub best_params: ParamSet,
    pub best_score: MetricValue,
    /// Best configuration refit on the full training set
    pub model: TrainedModel,
    /// Every configuration, in grid order
    pub candidates: Vec<CandidateSummary>,
    pub elapsed_secs: f64,
}

impl SearchOutcome {
    pub fn n_failed(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| matches!(c.status, CandidateStatus::Failed { .. }))
            .count()
    }
}

#[derive(Debug, Clone)]
enum FoldOutcome {
    Scored(f64),
    Undefined,
    Failed(String),
}

enum UnitOutcome {
    Done(FoldOutcome),
    Skipped,
    Fatal(HarnessError),
}

/// Per-configuration fold slots plus run bookkeeping
struct Accumulator {
    slots: Vec<Vec<Option<FoldOutcome>>>,
    completed: usize,
    skipped: usize,
    /// Fatal error of the lowest-numbered unit, so the reported error is stable
    fatal: Option<(usize, HarnessError)>,
}

impl Accumulator {
    fn new(n_configs: usize, n_folds: usize) -> Self {
        Self {
            slots: vec![vec![None; n_folds]; n_configs],
            completed: 0,
            skipped: 0,
            fatal: None,
        }
    }

    fn record(mut self, unit: usize, config_idx: usize, fold_idx: usize, outcome: UnitOutcome) -> Self {
        match outcome {
            UnitOutcome::Done(fold) => {
                self.slots[config_idx][fold_idx] = Some(fold);
                self.completed += 1;
            }
            UnitOutcome::Skipped => self.skipped += 1,
            UnitOutcome::Fatal(err) => self.keep_fatal(unit, err),
        }
        self
    }

    fn keep_fatal(&mut self, unit: usize, err: HarnessError) {
        match &self.fatal {
            Some((existing, _)) if *existing <= unit => {}
            _ => self.fatal = Some((unit, err)),
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (mine, theirs) in self.slots.iter_mut().zip(other.slots) {
            for (slot, outcome) in mine.iter_mut().zip(theirs) {
                if outcome.is_some() {
                    *slot = outcome;
                }
            }
        }
        self.completed += other.completed;
        self.skipped += other.skipped;
        if let Some((unit, err)) = other.fatal {
            self.keep_fatal(unit, err);
        }
        self
    }
}

/// Cross-validated grid search over one classifier variant
pub struct GridSearch {
    classifier: Box<dyn Classifier>,
    grid: ParamGrid,
    config: SearchConfig,
    threshold: f64,
    seed: u64,
    cancel: CancellationToken,
}

impl GridSearch {
    pub fn new(classifier: Box<dyn Classifier>, grid: ParamGrid) -> Self {
        Self {
            classifier,
            grid,
            config: SearchConfig::default(),
            threshold: 0.5,
            seed: 42,
            cancel: CancellationToken::new(),
        }
    }

    /// Search using the built-in adapter for `kind`
    pub fn for_kind(kind: ClassifierKind, grid: ParamGrid) -> Self {
        Self::new(kind.adapter(), grid)
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the search on a training matrix with 0/1 labels
    pub fn run(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchOutcome> {
        let start = Instant::now();
        let kind = self.classifier.kind();
        self.config.validate()?;
        let evaluator = Evaluator::new(self.threshold)?;

        let configs = self.grid.configurations()?;
        for params in &configs {
            self.classifier.validate(params)?;
        }

        let k = self.config.folds;
        let splits = CrossValidator::stratified(k)
            .with_random_state(self.seed)
            .split(x.nrows(), Some(y))?;

        let units: Vec<(usize, usize)> = (0..configs.len())
            .flat_map(|c| (0..k).map(move |f| (c, f)))
            .collect();

        info!(
            classifier = %kind,
            configurations = configs.len(),
            folds = k,
            units = units.len(),
            metric = %self.config.metric,
            "Starting grid search"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.n_workers)
            .build()
            .map_err(|e| HarnessError::config("n_workers", e.to_string()))?;

        let accumulator = pool.install(|| {
            units
                .par_iter()
                .enumerate()
                .fold(
                    || Accumulator::new(configs.len(), k),
                    |acc, (unit, &(config_idx, fold_idx))| {
                        let outcome = if self.cancel.is_cancelled() {
                            UnitOutcome::Skipped
                        } else {
                            let split = &splits[fold_idx];
                            self.run_unit(
                                &configs[config_idx],
                                fold_idx,
                                x,
                                y,
                                &split.train_indices,
                                &split.test_indices,
                                &evaluator,
                            )
                        };
                        acc.record(unit, config_idx, fold_idx, outcome)
                    },
                )
                .reduce(|| Accumulator::new(configs.len(), k), Accumulator::merge)
        });

        if let Some((_, err)) = accumulator.fatal {
            return Err(err);
        }
        if accumulator.skipped > 0 || self.cancel.is_cancelled() {
            warn!(classifier = %kind, completed_units = accumulator.completed, "Grid search cancelled");
            return Err(HarnessError::Cancelled {
                completed_units: accumulator.completed,
            });
        }

        let candidates: Vec<CandidateSummary> = configs
            .into_iter()
            .zip(accumulator.slots)
            .enumerate()
            .map(|(index, (params, slots))| summarize(index, params, slots))
            .collect();

        let mut best: Option<&CandidateSummary> = None;
        for candidate in candidates.iter().filter(|c| !matches!(c.status, CandidateStatus::Failed { .. })) {
            match best {
                Some(b) if candidate.ranking_score() <= b.ranking_score() => {}
                _ => best = Some(candidate),
            }
        }
        let (best_index, best_params, best_score) = match best {
            Some(b) => (b.index, b.params.clone(), b.mean),
            None => {
                return Err(HarnessError::ConvergenceFailure {
                    model: kind.to_string(),
                    reason: format!("all {} configurations failed", candidates.len()),
                })
            }
        };

        let model = self.classifier.fit(x, y, &best_params, self.seed)?;
        let elapsed_secs = start.elapsed().as_secs_f64();
        let outcome = SearchOutcome {
            classifier: kind,
            metric: self.config.metric,
            folds: k,
            best_index,
            best_params,
            best_score,
            model,
            candidates,
            elapsed_secs,
        };

        info!(
            classifier = %kind,
            best = %outcome.best_params,
            score = %outcome.best_score,
            failed = outcome.n_failed(),
            elapsed_secs,
            "Grid search finished"
        );
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_unit(
        &self,
        params: &ParamSet,
        fold_idx: usize,
        x: &Array2<f64>,
        y: &Array1<f64>,
        train_indices: &[usize],
        test_indices: &[usize],
        evaluator: &Evaluator,
    ) -> UnitOutcome {
        let kind = self.classifier.kind();
        let x_train = x.select(Axis(0), train_indices);
        let y_train = y.select(Axis(0), train_indices);
        let x_test = x.select(Axis(0), test_indices);
        let y_test = y.select(Axis(0), test_indices);

        let fold_seed = self.seed.wrapping_add(fold_idx as u64 + 1);
        let scored = self
            .classifier
            .fit(&x_train, &y_train, params, fold_seed)
            .and_then(|model| evaluator.evaluate(kind.as_str(), &model, &x_test, &y_test));

        match scored {
            Ok(result) => {
                let value = result.metric(self.config.metric);
                debug!(classifier = %kind, params = %params, fold = fold_idx, score = %value, "Unit finished");
                match value {
                    MetricValue::Defined(v) => UnitOutcome::Done(FoldOutcome::Scored(v)),
                    MetricValue::Undefined => UnitOutcome::Done(FoldOutcome::Undefined),
                }
            }
            Err(err) if !err.is_fatal() => {
                warn!(classifier = %kind, params = %params, fold = fold_idx, error = %err, "Unit failed");
                UnitOutcome::Done(FoldOutcome::Failed(err.to_string()))
            }
            Err(err) => UnitOutcome::Fatal(err),
        }
    }
}

fn summarize(index: usize, params: ParamSet, slots: Vec<Option<FoldOutcome>>) -> CandidateSummary {
    let outcomes: Vec<FoldOutcome> = slots
        .into_iter()
        .map(|s| s.unwrap_or(FoldOutcome::Failed("fold did not run".to_string())))
        .collect();

    let fold_scores: Vec<MetricValue> = outcomes
        .iter()
        .map(|o| match o {
            FoldOutcome::Scored(v) => MetricValue::Defined(*v),
            _ => MetricValue::Undefined,
        })
        .collect();

    let failure = outcomes.iter().find_map(|o| match o {
        FoldOutcome::Failed(reason) => Some(reason.clone()),
        _ => None,
    });
    let status = match failure {
        Some(reason) => CandidateStatus::Failed { reason },
        None if fold_scores.iter().all(MetricValue::is_defined) => CandidateStatus::Scored,
        None => CandidateStatus::Undefined,
    };

    let (mean, std) = match status {
        CandidateStatus::Scored => {
            let values: Vec<f64> = fold_scores.iter().filter_map(MetricValue::value).collect();
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            (MetricValue::Defined(mean), MetricValue::Defined(var.sqrt()))
        }
        _ => (MetricValue::Undefined, MetricValue::Undefined),
    };

    CandidateSummary {
        index,
        params,
        fold_scores,
        mean,
        std,
        status,
    }
}
