//! Crawler module for fetching and storing pages
//!
//! This module contains the core crawling logic, including:
//! - Fetch job descriptors
//! - HTTP fetching behind the `PageSource` seam
//! - Per-job workers with retry and cancellation
//! - Dispatching workers under a bounded fetch gate

mod dispatcher;
mod fetcher;
mod gate;
mod job;
mod worker;
mod writer;

pub use dispatcher::{run_crawl, Dispatcher};
pub use fetcher::{build_http_client, AttemptError, HttpSource, PageSource};
pub use gate::ConcurrencyGate;
pub use job::FetchJob;
pub use worker::{FetchWorker, JobOutcome, RetryPolicy};
pub use writer::{ensure_output_dir, is_partial_file, write_atomic};
