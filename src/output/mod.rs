//! Output module for crawl results
//!
//! This module handles:
//! - Accumulating per-job outcomes into a `CrawlReport`
//! - Printing a run summary to stdout

pub mod report;

pub use report::{print_summary, CrawlReport, JobReport};
