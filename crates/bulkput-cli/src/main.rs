//! bulkput - publish local directories to an S3 bucket
//!
//! Every regular file below the configured root folders is uploaded with a
//! public-read ACL, keyed by its path relative to the base directory.

mod config;
mod progress;
mod s3_client;

use anyhow::{Context, Result};
use bulkput_core::{Coordinator, ObjectSink, ProgressSink, TracingProgress};
use clap::Parser;
use config::Config;
use progress::ConsoleProgress;
use s3_client::{create_client, DryRunSink, S3Sink};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bulkput")]
#[command(author = "Bulkput Team")]
#[command(version = bulkput_core::VERSION)]
#[command(about = "Publish local directories to an S3 bucket", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BULKPUT_CONFIG")]
    config: Option<PathBuf>,

    /// Show what would be uploaded without contacting the bucket
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BULKPUT_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let run_config = config.to_run_config(&cwd)?;

    let console = std::io::stderr().is_terminal();

    let sink: Arc<dyn ObjectSink> = if cli.dry_run {
        Arc::new(DryRunSink::new(config.bucket()).with_echo(!console))
    } else {
        let client = create_client(&config).await?;
        Arc::new(S3Sink::new(client, config.bucket()))
    };

    let progress: Arc<dyn ProgressSink> = if console {
        Arc::new(ConsoleProgress::new(config.bucket(), cli.dry_run))
    } else {
        Arc::new(TracingProgress)
    };

    info!(
        bucket = %config.bucket(),
        concurrency = run_config.concurrency,
        scheduling = ?run_config.scheduling,
        dry_run = cli.dry_run,
        "Starting upload"
    );

    let report = Coordinator::new(run_config, sink, progress).execute().await?;

    let urls: Vec<String> = report
        .sample_keys
        .iter()
        .map(|key| config.public_url(key))
        .collect();
    progress::print_summary(&report, &urls);

    Ok(())
}
