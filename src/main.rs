//! Pagefold main entry point
//!
//! Command-line front end: converts one website into a document by running a
//! single job through the library's job manager.

use anyhow::{bail, Context};
use clap::Parser;
use pagefold::config::{hash_content, load_config_with_hash, Config};
use pagefold::jobs::{parse_depth, JobId, JobManager, DEFAULT_MAX_DEPTH};
use pagefold::JobStatus;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Pagefold: turns a website into a single offline document
///
/// Pagefold crawls a site breadth-first up to a bounded depth while
/// respecting robots.txt, downloads the images it finds, recovers text from
/// them when a recognizer is installed, and renders everything into one
/// Markdown document.
#[derive(Parser, Debug)]
#[command(name = "pagefold")]
#[command(version)]
#[command(about = "Turns a website into a single offline document", long_about = None)]
struct Cli {
    /// Website to convert; https:// is assumed when no scheme is given
    #[arg(value_name = "URL")]
    url: String,

    /// How many links deep to follow from the start page (0-5)
    #[arg(short, long, value_parser = parse_depth, default_value_t = DEFAULT_MAX_DEPTH)]
    depth: u32,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where to write the document (defaults to a name derived from the site)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Skip text recovery from images
    #[arg(long)]
    no_ocr: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => (Config::default(), hash_content("")),
    };

    if cli.no_ocr {
        config.ocr.enabled = false;
    }

    let manager = JobManager::from_config(config, config_hash);
    let outcome = convert(&manager, &cli).await;
    manager.shutdown().await;
    outcome
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagefold=info,warn"),
            1 => EnvFilter::new("pagefold=debug,info"),
            2 => EnvFilter::new("pagefold=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs one job to completion, copies its document into place and removes
/// the job's working directory
async fn convert(manager: &JobManager, cli: &Cli) -> anyhow::Result<()> {
    let job = manager.submit(&cli.url, Some(i64::from(cli.depth)))?;
    let result = deliver(manager, cli, job.id).await;

    if manager.status(job.id).map_or(false, |s| !s.is_terminal()) {
        manager.cancel(job.id)?;
        manager.wait(job.id).await?;
    }
    if let Err(e) = manager.remove(job.id).await {
        tracing::warn!(job_id = %job.id, error = %e, "Failed to clean up job");
    }

    result
}

async fn deliver(manager: &JobManager, cli: &Cli, id: JobId) -> anyhow::Result<()> {
    let mut updates = manager
        .registry()
        .subscribe(id)
        .context("Job disappeared right after submission")?;

    loop {
        let snapshot = updates.borrow_and_update().clone();
        if !cli.quiet {
            println!("[{:>3}%] {}: {}", snapshot.progress, snapshot.status, snapshot.message);
        }
        if snapshot.is_terminal() {
            break;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, cancelling job");
                manager.cancel(id)?;
            }
        }
    }

    let finished = manager.status(id)?;
    if finished.status != JobStatus::Completed {
        bail!(
            "Conversion failed: {}",
            finished.error.unwrap_or_else(|| finished.message.clone())
        );
    }

    let artifact = manager.artifact(id)?;
    let destination = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&artifact.filename));
    tokio::fs::copy(&artifact.path, &destination)
        .await
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    if !cli.quiet {
        println!("✓ Document written to: {}", destination.display());
    }
    Ok(())
}
