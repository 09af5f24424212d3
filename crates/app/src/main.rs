//! Cadence - recurring event generation service
//!
//! `cadence serve` runs the daily trigger until Ctrl-C; `cadence run-now`
//! performs a single generation pass and exits.

mod context;
mod logging;

use std::path::PathBuf;

use anyhow::Context as _;
use cadence_core::{GenerationReport, RuleOutcome};
use cadence_domain::Config;
use cadence_infra::config;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use crate::context::AppContext;

#[derive(Parser, Debug)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Config file (JSON or TOML). Without it, `CADENCE_*` variables are
    /// tried first, then the standard config locations.
    #[arg(long, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daily trigger and run until interrupted.
    Serve,
    /// Run one generation pass immediately.
    RunNow,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the subscriber so RUST_LOG from the file applies.
    let dotenv = dotenvy::dotenv();
    logging::init()?;
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(err) => debug!(error = %err, "No .env file loaded"),
    }

    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    let context = AppContext::new(config).context("failed to initialise application")?;

    match cli.command {
        Command::Serve => serve(&context).await,
        Command::RunNow => run_now(&context).await,
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => config::load_from_file(Some(path))?,
        None => config::load()?,
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn serve(context: &AppContext) -> anyhow::Result<()> {
    if !context.config.scheduler.enabled {
        warn!("Scheduler disabled by configuration; nothing to serve");
        return Ok(());
    }

    let mut scheduler =
        context.create_scheduler().await.context("failed to create scheduler")?;
    scheduler.start().await.context("failed to start scheduler")?;
    info!(cron = %context.config.scheduler.cron_expression, "Cadence running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    scheduler.shutdown().await.context("failed to stop scheduler")?;
    let stats = serde_json::to_string(&context.metrics.snapshot())?;
    info!(%stats, "Scheduler stopped");
    Ok(())
}

async fn run_now(context: &AppContext) -> anyhow::Result<()> {
    let scheduler = context.create_scheduler().await.context("failed to create scheduler")?;
    let report = scheduler.run_now().await.context("generation pass failed")?;
    log_report(&report);
    Ok(())
}

fn log_report(report: &GenerationReport) {
    for rule in &report.rules {
        match &rule.outcome {
            RuleOutcome::Failed { error } => {
                warn!(rule_id = rule.rule_id, event_id = rule.event_id, %error, "Rule failed");
            }
            outcome => {
                let outcome = serde_json::to_string(outcome).unwrap_or_default();
                info!(rule_id = rule.rule_id, event_id = rule.event_id, %outcome, "Rule processed");
            }
        }
    }

    info!(
        run_date = %report.run_date,
        rules = report.rules.len(),
        generated = report.instances_created,
        failed = report.failed_rules(),
        "Generation pass complete"
    );
}
