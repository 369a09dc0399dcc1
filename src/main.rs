//! Churn harness - Main Entry Point

use churn_harness::cli::{cmd_compare, cmd_config, cmd_generate, cmd_inspect, cmd_score, cmd_serve, Cli, Commands, CompareArgs};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churn_harness=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { data, config } => {
            cmd_inspect(&data, config.as_deref())?;
        }
        Commands::Compare {
            data,
            config,
            seed,
            folds,
            metric,
            rank_by,
            threshold,
            workers,
            no_balance,
            output,
            report,
        } => {
            // The search blocks on rayon; keep it off the async workers
            tokio::task::spawn_blocking(move || {
                cmd_compare(CompareArgs {
                    data,
                    config,
                    seed,
                    folds,
                    metric,
                    rank_by,
                    threshold,
                    workers,
                    no_balance,
                    output,
                    report,
                })
            })
            .await??;
        }
        Commands::Score { model, record, file } => {
            cmd_score(&model, record.as_deref(), file.as_deref())?;
        }
        Commands::Serve { model, port, host } => {
            cmd_serve(model, &host, port).await?;
        }
        Commands::Generate { output, records, positive_rate, seed } => {
            cmd_generate(&output, records, positive_rate, seed)?;
        }
        Commands::Config { output } => {
            cmd_config(&output)?;
        }
    }

    Ok(())
}
