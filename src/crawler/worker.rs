//! Fetch worker: drives one job to a terminal outcome
//!
//! A worker moves through `Attempting -> Writing -> Done`. Every attempt
//! holds one fetch-gate slot. A failed fetch loops back to `Attempting`; a
//! failed write keeps the body and loops on `Writing` so the page is not
//! requested again. By default the loop never gives up; cancellation, an
//! attempt budget, or a permanent status end it early.

use crate::config::{CrawlerConfig, StatusPolicy};
use crate::crawler::fetcher::{AttemptError, PageSource};
use crate::crawler::gate::ConcurrencyGate;
use crate::crawler::job::FetchJob;
use crate::crawler::writer::write_atomic;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Terminal result of one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Body stored at the destination path
    Written { attempts: u32, bytes: usize },

    /// Cancellation was requested before the job finished
    Cancelled { attempts: u32 },

    /// The attempt budget ran out
    Exhausted { attempts: u32, last_error: String },

    /// The status policy marked the response status as permanent
    Rejected { attempts: u32, status: u16 },
}

impl JobOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Written { attempts, .. }
            | Self::Cancelled { attempts }
            | Self::Exhausted { attempts, .. }
            | Self::Rejected { attempts, .. } => *attempts,
        }
    }
}

/// Retry behavior shared by every worker in a run
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// `None` retries forever
    pub max_attempts: Option<u32>,
    pub retry_delay: Duration,
    pub attempt_timeout: Option<Duration>,
    pub status_policy: StatusPolicy,
}

impl RetryPolicy {
    /// Retry forever, immediately, with no timeout
    pub fn unlimited() -> Self {
        Self {
            max_attempts: None,
            retry_delay: Duration::ZERO,
            attempt_timeout: None,
            status_policy: StatusPolicy::Retry,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay(),
            attempt_timeout: config.request_timeout(),
            status_policy: config.status_policy,
        }
    }

    fn budget_spent(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Attempt counter step; an unbounded retry loop pins at `u32::MAX`
fn next_attempt(attempts: u32) -> u32 {
    attempts.saturating_add(1)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unlimited()
    }
}

enum WorkerState {
    Attempting,
    Writing(Vec<u8>),
}

/// Executes exactly one `FetchJob`
pub struct FetchWorker {
    job: FetchJob,
    source: Arc<dyn PageSource>,
    gate: ConcurrencyGate,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl FetchWorker {
    pub fn new(
        job: FetchJob,
        source: Arc<dyn PageSource>,
        gate: ConcurrencyGate,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            job,
            source,
            gate,
            policy,
            cancel,
        }
    }

    pub fn job(&self) -> &FetchJob {
        &self.job
    }

    /// Runs the job until it reaches a terminal outcome
    pub async fn run(self) -> JobOutcome {
        let mut attempts: u32 = 0;
        let mut state = WorkerState::Attempting;

        loop {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = self.gate.acquire() => permit,
            };
            let Some(permit) = permit else {
                return JobOutcome::Cancelled { attempts };
            };

            attempts = next_attempt(attempts);
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = self.attempt(state) => Some(result),
            };
            drop(permit);

            let (next, error) = match result {
                None => return JobOutcome::Cancelled { attempts },
                Some(Ok(bytes)) => {
                    tracing::info!(
                        identifier = %self.job.identifier().trim(),
                        attempts,
                        bytes,
                        "Fetched"
                    );
                    return JobOutcome::Written { attempts, bytes };
                }
                Some(Err(failure)) => failure,
            };

            if let Some(status) = error.status() {
                if self.policy.status_policy.is_permanent(status) {
                    tracing::warn!(
                        url = %self.job.source_url(),
                        status,
                        "Permanent HTTP status, giving up"
                    );
                    return JobOutcome::Rejected { attempts, status };
                }
            }

            if self.policy.budget_spent(attempts) {
                tracing::warn!(
                    url = %self.job.source_url(),
                    attempts,
                    error = %error,
                    "Attempt budget exhausted"
                );
                return JobOutcome::Exhausted {
                    attempts,
                    last_error: error.to_string(),
                };
            }

            tracing::debug!(
                url = %self.job.source_url(),
                attempt = attempts,
                error = %error,
                "Attempt failed, retrying"
            );

            if !self.policy.retry_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return JobOutcome::Cancelled { attempts },
                    _ = tokio::time::sleep(self.policy.retry_delay) => {}
                }
            }

            state = next;
        }
    }

    /// Performs one attempt from `state`
    ///
    /// On failure the state to resume from is handed back alongside the error.
    async fn attempt(&self, state: WorkerState) -> Result<usize, (WorkerState, AttemptError)> {
        let body = match state {
            WorkerState::Attempting => self
                .fetch_once()
                .await
                .map_err(|e| (WorkerState::Attempting, e))?,
            WorkerState::Writing(body) => body,
        };

        match write_atomic(self.job.destination_path(), &body).await {
            Ok(()) => Ok(body.len()),
            Err(e) => Err((WorkerState::Writing(body), AttemptError::Write(e))),
        }
    }

    async fn fetch_once(&self) -> Result<Vec<u8>, AttemptError> {
        let fetch = self.source.fetch(self.job.source_url());

        match self.policy.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| AttemptError::Timeout(limit))?,
            None => fetch.await,
        }
    }
}
