//! Crawl report accumulation and display
//!
//! A report is created by the dispatcher for one run and returned to the
//! caller; nothing is shared between runs.

use crate::crawler::{FetchJob, JobOutcome};
use chrono::{DateTime, Utc};

/// Outcome of one launched job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: FetchJob,
    pub outcome: JobOutcome,
}

impl JobReport {
    pub fn new(job: FetchJob, outcome: JobOutcome) -> Self {
        Self { job, outcome }
    }
}

/// Results of a single crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Number of identifiers the run was given
    pub requested: usize,

    pub started_at: DateTime<Utc>,

    /// Set once every launched worker has terminated
    pub finished_at: Option<DateTime<Utc>>,

    /// Jobs in completion order
    jobs: Vec<JobReport>,

    /// Identifiers skipped because cancellation stopped launching
    not_launched: Vec<String>,
}

impl CrawlReport {
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            started_at: Utc::now(),
            finished_at: None,
            jobs: Vec::with_capacity(requested),
            not_launched: Vec::new(),
        }
    }

    pub fn record(&mut self, job: JobReport) {
        self.jobs.push(job);
    }

    pub fn record_not_launched(&mut self, identifiers: &[String]) {
        self.not_launched.extend_from_slice(identifiers);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn jobs(&self) -> &[JobReport] {
        &self.jobs
    }

    pub fn not_launched(&self) -> &[String] {
        &self.not_launched
    }

    /// Looks up a job by its identifier as given in the input list
    pub fn job(&self, identifier: &str) -> Option<&JobReport> {
        self.jobs
            .iter()
            .find(|report| report.job.identifier() == identifier)
    }

    pub fn written_count(&self) -> usize {
        self.jobs.iter().filter(|r| r.outcome.is_written()).count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|r| matches!(r.outcome, JobOutcome::Cancelled { .. }))
            .count()
    }

    /// Jobs that ended without a stored page, plus those never launched
    pub fn incomplete_count(&self) -> usize {
        self.requested - self.written_count()
    }

    pub fn total_attempts(&self) -> u64 {
        self.jobs.iter().map(|r| u64::from(r.outcome.attempts())).sum()
    }

    /// True when every requested identifier has its file
    pub fn is_complete(&self) -> bool {
        self.written_count() == self.requested
    }
}

/// Prints a run summary to stdout
pub fn print_summary(report: &CrawlReport) {
    println!("=== Crawl Summary ===\n");

    println!("Started:  {}", report.started_at.to_rfc3339());
    if let Some(finished) = report.finished_at {
        let elapsed = finished - report.started_at;
        println!(
            "Finished: {} ({:.1}s)",
            finished.to_rfc3339(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );
    }
    println!();

    println!("Jobs:");
    println!("  Requested: {}", report.requested);
    println!("  Written: {}", report.written_count());
    println!("  Cancelled: {}", report.cancelled_count());
    println!("  Not launched: {}", report.not_launched().len());
    println!("  Total attempts: {}", report.total_attempts());
    println!();

    let failures: Vec<_> = report
        .jobs()
        .iter()
        .filter(|r| {
            matches!(
                r.outcome,
                JobOutcome::Exhausted { .. } | JobOutcome::Rejected { .. }
            )
        })
        .collect();

    if !failures.is_empty() {
        println!("Failed ({}):", failures.len());
        for failure in failures {
            match &failure.outcome {
                JobOutcome::Exhausted {
                    attempts,
                    last_error,
                } => println!(
                    "  - {} after {} attempts: {}",
                    failure.job.source_url(),
                    attempts,
                    last_error
                ),
                JobOutcome::Rejected { status, .. } => {
                    println!("  - {}: HTTP {}", failure.job.source_url(), status)
                }
                _ => {}
            }
        }
        println!();
    }

    let success_rate = if report.requested > 0 {
        (report.written_count() as f64 / report.requested as f64) * 100.0
    } else {
        100.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages written)",
        success_rate,
        report.written_count(),
        report.requested
    );
}
