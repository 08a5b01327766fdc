//! Dispatcher - runs one crawl over an identifier list
//!
//! This module turns identifiers into fetch jobs and runs one worker task per
//! job. Launching a worker never consumes a fetch-gate slot: the fetch gate
//! only bounds attempts in flight, so its capacity is exactly the number of
//! concurrent requests. An optional launch gate caps how many worker tasks
//! are alive at once.

use crate::config::{validate, Config};
use crate::crawler::fetcher::{HttpSource, PageSource};
use crate::crawler::gate::ConcurrencyGate;
use crate::crawler::job::FetchJob;
use crate::crawler::worker::{FetchWorker, RetryPolicy};
use crate::crawler::writer::ensure_output_dir;
use crate::output::{CrawlReport, JobReport};
use crate::HarvestError;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Orchestrates a single crawl
pub struct Dispatcher {
    config: Config,
    source: Arc<dyn PageSource>,
    fetch_gate: ConcurrencyGate,
    launch_gate: Option<ConcurrencyGate>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Creates a dispatcher fetching over HTTP
    ///
    /// # Returns
    ///
    /// * `Ok(Dispatcher)` - Ready to run
    /// * `Err(HarvestError)` - The configuration is invalid or the HTTP
    ///   client could not be built
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let source = HttpSource::from_config(&config.user_agent)?;
        Self::with_source(config, Arc::new(source))
    }

    /// Creates a dispatcher fetching through `source`
    ///
    /// The configuration is validated first; a zero fetch limit would
    /// otherwise leave every worker waiting forever.
    pub fn with_source(config: Config, source: Arc<dyn PageSource>) -> Result<Self, HarvestError> {
        validate(&config)?;

        let fetch_gate = ConcurrencyGate::new(config.crawler.max_concurrent_fetches);
        let launch_gate = config.crawler.max_active_workers.map(ConcurrencyGate::new);
        let policy = RetryPolicy::from_config(&config.crawler);

        Ok(Self {
            config,
            source,
            fetch_gate,
            launch_gate,
            policy,
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the cancellation token the run observes
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Builds the job for one identifier
    pub fn job_for(&self, identifier: &str) -> FetchJob {
        FetchJob::new(
            &self.config.crawler.prefix,
            identifier,
            &self.config.output.directory,
            &self.config.output.extension,
        )
    }

    /// Runs the crawl to completion
    ///
    /// 1. Ensures the output directory exists (the only fatal failure)
    /// 2. Launches one worker per identifier, in input order
    /// 3. Waits for every launched worker to terminate
    ///
    /// Once cancellation is requested no further workers are launched; the
    /// identifiers left over are recorded as not launched.
    pub async fn run(self, identifiers: &[String]) -> Result<CrawlReport, HarvestError> {
        let output_dir = &self.config.output.directory;
        ensure_output_dir(output_dir)
            .await
            .map_err(|source| HarvestError::CreateOutputDir {
                path: output_dir.clone(),
                source,
            })?;

        tracing::info!(
            "Dispatching {} jobs ({} concurrent fetches) into {}",
            identifiers.len(),
            self.fetch_gate.capacity(),
            output_dir.display()
        );

        let mut report = CrawlReport::new(identifiers.len());
        let mut workers = JoinSet::new();

        for (index, identifier) in identifiers.iter().enumerate() {
            let launch_permit = match &self.launch_gate {
                Some(gate) => {
                    let permit = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => None,
                        permit = gate.acquire() => permit,
                    };
                    match permit {
                        Some(permit) => Some(permit),
                        None => {
                            report.record_not_launched(&identifiers[index..]);
                            break;
                        }
                    }
                }
                None => None,
            };

            if self.cancel.is_cancelled() {
                report.record_not_launched(&identifiers[index..]);
                break;
            }

            let worker = FetchWorker::new(
                self.job_for(identifier),
                Arc::clone(&self.source),
                self.fetch_gate.clone(),
                self.policy.clone(),
                self.cancel.child_token(),
            );

            workers.spawn(async move {
                let _launch_permit = launch_permit;
                let job = worker.job().clone();
                let outcome = worker.run().await;
                JobReport::new(job, outcome)
            });
        }

        if self.cancel.is_cancelled() {
            tracing::warn!(
                "Cancellation requested, {} jobs were not launched",
                report.not_launched().len()
            );
        }

        while let Some(joined) = workers.join_next().await {
            report.record(joined?);
        }

        report.finish();
        tracing::info!(
            "Crawl finished: {} written, {} incomplete",
            report.written_count(),
            report.incomplete_count()
        );

        Ok(report)
    }
}

/// Runs a crawl over HTTP with the given configuration
///
/// # Example
///
/// ```no_run
/// use handbook_harvest::config::Config;
/// use handbook_harvest::crawler::run_crawl;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::with_prefix("https://handbook.example.edu/view/2014/");
/// let ids = vec!["COMP10001".to_string()];
/// let report = run_crawl(config, &ids, CancellationToken::new()).await?;
/// assert!(report.is_complete());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    identifiers: &[String],
    cancel: CancellationToken,
) -> Result<CrawlReport, HarvestError> {
    Dispatcher::new(config)?
        .with_cancellation(cancel)
        .run(identifiers)
        .await
}
