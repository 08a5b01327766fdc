//! Handbook-Harvest main entry point
//!
//! This is the command-line interface for the Handbook-Harvest page fetcher.

use anyhow::Context;
use clap::Parser;
use handbook_harvest::config::{load_config_with_hash, validate, Config, StatusPolicy};
use handbook_harvest::crawler::Dispatcher;
use handbook_harvest::input::load_identifiers;
use handbook_harvest::output::print_summary;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Handbook-Harvest: a bounded concurrent page fetcher
///
/// Fetches `<prefix><identifier>` for every identifier in the list and
/// stores each body as `<output>/<identifier>.<extension>`. Failed fetches
/// are retried until they succeed unless an attempt budget is set.
#[derive(Parser, Debug)]
#[command(name = "handbook-harvest")]
#[command(version)]
#[command(about = "A bounded concurrent page fetcher", long_about = None)]
struct Cli {
    /// File with one identifier per line
    #[arg(short = 'l', long = "list", value_name = "FILE")]
    list: PathBuf,

    /// URL prefix each identifier is appended to
    #[arg(short, long, value_name = "URL")]
    prefix: Option<String>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Maximum number of fetches in flight
    #[arg(short = 'n', long = "concurrency", value_name = "N")]
    concurrency: Option<usize>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Per-attempt timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Give up on a job after this many attempts
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,

    /// Pause between attempts in milliseconds
    #[arg(long, value_name = "MS")]
    retry_delay_ms: Option<u64>,

    /// Maximum number of worker tasks alive at once
    #[arg(long, value_name = "N")]
    max_active_workers: Option<usize>,

    /// Treat 4xx responses (except 408 and 429) as permanent failures
    #[arg(long)]
    fail_fast_client_errors: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show the resolved settings and the first jobs without fetching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = resolve_config(&cli)?;
    let identifiers = load_identifiers(&cli.list)
        .await
        .with_context(|| format!("loading identifiers from {}", cli.list.display()))?;
    tracing::info!(
        "Loaded {} identifiers from {}",
        identifiers.len(),
        cli.list.display()
    );

    let dispatcher = Dispatcher::new(config.clone()).context("building HTTP client")?;

    if cli.dry_run {
        handle_dry_run(&config, &dispatcher, &identifiers);
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = dispatcher.cancellation_token();
    spawn_interrupt_handler(cancel);

    let report = dispatcher.run(&identifiers).await?;

    if !cli.quiet {
        print_summary(&report);
    }

    if report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("handbook_harvest=info,warn"),
            1 => EnvFilter::new("handbook_harvest=debug,info"),
            2 => EnvFilter::new("handbook_harvest=trace,debug"),
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

/// Builds the effective configuration: file values first, then CLI overrides
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            let prefix = cli
                .prefix
                .clone()
                .context("a URL prefix is required (--prefix or a config file)")?;
            Config::with_prefix(prefix)
        }
    };

    if let Some(prefix) = &cli.prefix {
        config.crawler.prefix = prefix.clone();
    }
    if let Some(output) = &cli.output {
        config.output.directory = output.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.max_concurrent_fetches = concurrency;
    }
    if let Some(timeout) = cli.timeout {
        config.crawler.request_timeout_secs = Some(timeout);
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.crawler.max_attempts = Some(max_attempts);
    }
    if let Some(delay) = cli.retry_delay_ms {
        config.crawler.retry_delay_ms = delay;
    }
    if let Some(workers) = cli.max_active_workers {
        config.crawler.max_active_workers = Some(workers);
    }
    if cli.fail_fast_client_errors {
        config.crawler.status_policy = StatusPolicy::FailFastClientErrors;
    }

    validate(&config).context("invalid configuration")?;
    Ok(config)
}

/// Cancels the run on Ctrl-C; in-flight workers stop and the summary still prints
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, cancelling crawl");
                cancel.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for interrupt: {}", e),
        }
    });
}

/// Handles the --dry-run mode: shows what would be fetched
fn handle_dry_run(config: &Config, dispatcher: &Dispatcher, identifiers: &[String]) {
    println!("=== Handbook-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Prefix: {}", config.crawler.prefix);
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    match config.crawler.max_active_workers {
        Some(workers) => println!("  Max active workers: {}", workers),
        None => println!("  Max active workers: unbounded"),
    }
    match config.crawler.max_attempts {
        Some(attempts) => println!("  Max attempts: {}", attempts),
        None => println!("  Max attempts: unlimited"),
    }
    match config.crawler.request_timeout_secs {
        Some(secs) => println!("  Request timeout: {}s", secs),
        None => println!("  Request timeout: none"),
    }
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);
    println!("  Status policy: {:?}", config.crawler.status_policy);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory.display());
    println!("  Extension: {}", config.output.extension);

    println!("\nJobs ({}):", identifiers.len());
    for identifier in identifiers.iter().take(10) {
        let job = dispatcher.job_for(identifier);
        println!(
            "  - {} -> {}",
            job.source_url(),
            job.destination_path().display()
        );
    }
    if identifiers.len() > 10 {
        println!("  ... and {} more", identifiers.len() - 10);
    }

    println!("\n✓ Configuration is valid");
}
