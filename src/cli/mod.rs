//! Churn harness CLI
//!
//! Command-line interface for inspecting data, running the classifier
//! comparison, scoring single records and serving the scoring model.

use clap::{Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::HarnessConfig;
use crate::data::{load_table, write_table, ChurnGenerator, RawRecord};
use crate::evaluation::Metric;
use crate::pipeline::{Harness, HarnessOutcome};
use crate::preprocessing::{describe, DatasetPreparer, FeatureSelector};
use crate::scoring::ScoringModel;
use crate::server::{run_server, ServerConfig};
use crate::training::CandidateStatus;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<22} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "churn")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bank churn model-evaluation harness")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Describe a dataset: column statistics, churn rates per level, chi-square screening
    Inspect {
        /// Input data file (CSV or TSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Harness configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Compare classifiers with cross-validated grid search
    Compare {
        /// Input data file (CSV or TSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Harness configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Number of cross-validation folds
        #[arg(long)]
        folds: Option<usize>,

        /// Metric used to select configurations (accuracy, precision, recall, f_measure, kappa, auc)
        #[arg(long)]
        metric: Option<String>,

        /// Metric used to rank classifiers
        #[arg(long)]
        rank_by: Option<String>,

        /// Decision threshold on the churn probability
        #[arg(long)]
        threshold: Option<f64>,

        /// Grid-search worker threads (0 = all cores)
        #[arg(long)]
        workers: Option<usize>,

        /// Skip SMOTE balancing of the training partition
        #[arg(long)]
        no_balance: bool,

        /// Write the best model here for `score` and `serve`
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the full run summary as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Score one customer record with a saved model
    Score {
        /// Saved scoring model
        #[arg(short, long)]
        model: PathBuf,

        /// Record as a JSON object, e.g. '{"Age": 42, "Geography": "Spain", ...}'
        #[arg(short, long, conflicts_with = "file")]
        record: Option<String>,

        /// File holding the record as JSON
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Serve a saved model over HTTP
    Serve {
        /// Saved scoring model
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Server port
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Write a synthetic churn dataset
    Generate {
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of records
        #[arg(short = 'n', long, default_value = "10000")]
        records: usize,

        /// Share of churned customers
        #[arg(long, default_value = "0.2")]
        positive_rate: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Write the default configuration as JSON
    Config {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<HarnessConfig> {
    Ok(match path {
        Some(p) => HarnessConfig::from_file(p)?,
        None => HarnessConfig::default(),
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_inspect(data_path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    section("Inspect");

    step_run("Loading data");
    let start = Instant::now();
    let df = load_table(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    step_run("Preparing");
    let (dataset, report) = DatasetPreparer::new(config.preparation.clone()).prepare(&df)?;
    step_done(&format!("dropped {}", report.dropped_columns.join(", ")));

    let summary = describe(&dataset);
    kv("Records", &summary.n_records.to_string());
    kv(
        "Label distribution",
        &format!("{} retained / {} churned", summary.label_distribution[0], summary.label_distribution[1]),
    );
    kv("Churn rate", &format!("{:.2}%", summary.positive_rate * 100.0));
    if !report.imputed_columns().is_empty() {
        kv("Imputed", &report.imputed_columns().join(", "));
    }

    section("Numeric features");
    println!(
        "  {:<18} {:>10} {:>10} {:>10} {:>10} {:>10}",
        muted("column"), muted("mean"), muted("std"), muted("min"), muted("median"), muted("max")
    );
    for s in &summary.numeric {
        println!(
            "  {:<18} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
            s.name, s.mean, s.std, s.min, s.median, s.max
        );
    }

    section("Churn rate by level");
    for c in &summary.categorical {
        let levels: Vec<String> = c
            .levels
            .iter()
            .map(|l| format!("{}={:.1}%", l.level, l.churn_rate * 100.0))
            .collect();
        println!("  {:<18} {}", c.name, levels.join("  "));
    }

    section("Chi-square screening");
    let selection = FeatureSelector::new(config.selection.significance)?.evaluate(&dataset);
    for score in &selection.scores {
        let verdict = if score.low_value { "low value".yellow() } else { ok("keep") };
        println!(
            "  {:<18} χ²={:<10.3} dof={:<3} p={:<10.4} {}",
            score.feature, score.statistic, score.dof, score.p_value, verdict
        );
    }

    section("Correlation");
    let names = &summary.correlation.names;
    print!("  {:<18}", "");
    for n in names {
        print!(" {:>8}", truncate(n, 8));
    }
    println!();
    for (i, a) in names.iter().enumerate() {
        print!("  {:<18}", a);
        for j in 0..names.len() {
            print!(" {:>8.3}", summary.correlation.values[i][j]);
        }
        println!();
    }
    println!();
    Ok(())
}

fn truncate(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub struct CompareArgs {
    pub data: PathBuf,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub folds: Option<usize>,
    pub metric: Option<String>,
    pub rank_by: Option<String>,
    pub threshold: Option<f64>,
    pub workers: Option<usize>,
    pub no_balance: bool,
    pub output: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

pub fn cmd_compare(args: CompareArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(folds) = args.folds {
        config = config.with_folds(folds);
    }
    if let Some(metric) = args.metric.as_deref() {
        config = config.with_selection_metric(metric.parse::<Metric>()?);
    }
    if let Some(metric) = args.rank_by.as_deref() {
        config = config.with_primary_metric(metric.parse::<Metric>()?);
    }
    if let Some(threshold) = args.threshold {
        config = config.with_threshold(threshold);
    }
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if args.no_balance {
        config.balancer.enabled = false;
    }

    let harness = Harness::new(config)?;
    section("Compare");
    kv("Seed", &harness.config().seed.to_string());
    kv("Folds", &harness.config().search.folds.to_string());
    kv("Selection metric", harness.config().search.metric.as_str());

    step_run("Running");
    let start = Instant::now();
    let outcome = harness.run_file(&args.data)?;
    step_done(&format!("{:.1?}", start.elapsed()));

    print_outcome(&outcome);

    if let Some(path) = &args.output {
        outcome.scoring_model.save(path)?;
        println!("  {} model saved → {}", ok("✓"), path.display());
    }
    if let Some(path) = &args.report {
        std::fs::write(path, serde_json::to_string_pretty(&outcome)?)?;
        println!("  {} report saved → {}", ok("✓"), path.display());
    }
    println!();
    Ok(())
}

fn print_outcome(outcome: &HarnessOutcome) {
    let (train, test) = outcome.partition_sizes;
    kv("Train / Test", &format!("{} / {}", train, test));
    kv(
        "Balanced Train",
        &format!(
            "{:?} → {:?} (+{} synthetic)",
            outcome.balance.input_counts, outcome.balance.output_counts, outcome.balance.n_synthetic
        ),
    );
    let flagged = outcome.selection.flagged();
    if !flagged.is_empty() {
        kv("Low-value features", &flagged.join(", "));
    }

    section("Grid search");
    for search in &outcome.searches {
        println!(
            "  {:<22} best {} = {} ({})",
            search.classifier.display_name(),
            dim("score"),
            search.best_score,
            search.best_params
        );
        for c in &search.candidates {
            let status = match &c.status {
                CandidateStatus::Scored => format!("{} ± {}", c.mean, c.std),
                CandidateStatus::Undefined => "undefined".yellow().to_string(),
                CandidateStatus::Failed { reason } => format!("{} {}", "failed".red(), dim(reason)),
            };
            println!("    {:<40} {}", c.params.to_string(), status);
        }
    }
    for (kind, reason) in &outcome.failed_classifiers {
        println!("  {:<22} {}", kind.display_name(), reason.red());
    }

    println!();
    for line in outcome.report.render().lines() {
        println!("  {}", line);
    }
}

pub fn cmd_score(model_path: &Path, record: Option<&str>, file: Option<&Path>) -> anyhow::Result<()> {
    let model = ScoringModel::load(model_path)?;
    let text = match (record, file) {
        (Some(r), _) => r.to_string(),
        (None, Some(f)) => std::fs::read_to_string(f)?,
        (None, None) => anyhow::bail!("Provide a record with --record or --file"),
    };
    let record: RawRecord = serde_json::from_str(&text)?;

    let probability = model.score(&record)?;
    let churn = probability >= model.threshold;
    section("Score");
    kv("Classifier", model.classifier.display_name());
    kv("Churn probability", &format!("{:.4}", probability));
    kv(
        "Prediction",
        &if churn { "churn".red().to_string() } else { ok("stays").to_string() },
    );
    println!();
    Ok(())
}

pub async fn cmd_serve(model: Option<PathBuf>, host: &str, port: u16) -> anyhow::Result<()> {
    let mut config = ServerConfig {
        host: host.to_string(),
        port,
        ..ServerConfig::default()
    };
    if let Some(path) = model {
        config.model_path = path;
    }
    run_server(config).await
}

pub fn cmd_generate(output: &Path, records: usize, positive_rate: f64, seed: u64) -> anyhow::Result<()> {
    section("Generate");
    step_run(&format!("Generating {} records", records));
    let mut df = ChurnGenerator::new(records)
        .with_positive_rate(positive_rate)
        .with_seed(seed)
        .generate()?;
    write_table(&mut df, output)?;
    step_done(&output.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_config(output: &Path) -> anyhow::Result<()> {
    HarnessConfig::default().save(output)?;
    println!("  {} default configuration → {}", ok("✓"), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compare_overrides() {
        let cli = Cli::parse_from(["churn", "compare", "-d", "data.csv", "--folds", "5", "--metric", "auc", "--no-balance"]);
        match cli.command {
            Commands::Compare { folds, metric, no_balance, .. } => {
                assert_eq!(folds, Some(5));
                assert_eq!(metric.as_deref(), Some("auc"));
                assert!(no_balance);
            }
            _ => panic!("expected compare"),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("CreditScore", 6), "Credit");
        assert_eq!(truncate("Age", 6), "Age");
    }
}
