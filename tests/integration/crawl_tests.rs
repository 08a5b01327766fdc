//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! dispatch cycle end-to-end against a real HTTP client.

use async_trait::async_trait;
use handbook_harvest::config::{Config, StatusPolicy, UserAgentConfig};
use handbook_harvest::crawler::{
    is_partial_file, AttemptError, Dispatcher, HttpSource, JobOutcome, PageSource,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Wraps the HTTP source and records the peak number of requests in flight
struct InstrumentedSource {
    inner: HttpSource,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl InstrumentedSource {
    fn new() -> Self {
        Self {
            inner: HttpSource::from_config(&UserAgentConfig::default())
                .expect("Failed to build HTTP client"),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for InstrumentedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self.inner.fetch(url).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, output: &Path, limit: usize) -> Config {
    let mut config = Config::with_prefix(format!("{}/view/", base_url));
    config.crawler.max_concurrent_fetches = limit;
    config.output.directory = output.to_path_buf();
    config
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn mount_page(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/view/{}", page)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_two_subjects_with_one_transient_failure() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "AAAA10001", "<html>A</html>").await;

    // First request for the second subject fails, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/view/BBBB20002"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "BBBB20002", "<html>B</html>").await;

    let output = tempdir().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), output.path(), 1);
    let source = Arc::new(InstrumentedSource::new());

    let report = Dispatcher::with_source(config, source.clone())
        .expect("Failed to create dispatcher")
        .run(&ids(&["AAAA10001", "BBBB20002"]))
        .await
        .expect("Crawl failed");

    assert!(report.is_complete());
    assert_eq!(
        std::fs::read_to_string(output.path().join("AAAA10001.html")).unwrap(),
        "<html>A</html>"
    );
    assert_eq!(
        std::fs::read_to_string(output.path().join("BBBB20002.html")).unwrap(),
        "<html>B</html>"
    );
    assert_eq!(source.peak(), 1, "two requests were in flight at once");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    let second = report.job("BBBB20002").expect("Missing job report");
    assert_eq!(second.outcome.attempts(), 2);
}

#[tokio::test]
async fn test_many_transient_failures_end_in_one_write() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/view/MAST20004"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(7)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/view/MAST20004"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>MAST</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = tempdir().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), output.path(), 2);

    let report = Dispatcher::new(config)
        .expect("Failed to create dispatcher")
        .run(&ids(&["MAST20004"]))
        .await
        .expect("Crawl failed");

    assert_eq!(
        report.job("MAST20004").unwrap().outcome,
        JobOutcome::Written {
            attempts: 8,
            bytes: 17
        }
    );
    assert_eq!(
        std::fs::read_to_string(output.path().join("MAST20004.html")).unwrap(),
        "<html>MAST</html>"
    );

    let leftovers: Vec<_> = std::fs::read_dir(output.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "unexpected files: {:?}", leftovers);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "COMP10001", "<html>Foundations</html>").await;
    mount_page(&mock_server, "COMP10002", "<html>Foundations 2</html>").await;

    let output = tempdir().expect("Failed to create temp dir");
    let subjects = ids(&["COMP10001", "COMP10002"]);

    let first = Dispatcher::new(create_test_config(&mock_server.uri(), output.path(), 4))
        .unwrap()
        .run(&subjects)
        .await
        .expect("First crawl failed");
    let first_bytes = std::fs::read(output.path().join("COMP10001.html")).unwrap();

    // Second run against the already existing output directory
    let second = Dispatcher::new(create_test_config(&mock_server.uri(), output.path(), 4))
        .unwrap()
        .run(&subjects)
        .await
        .expect("Second crawl failed");
    let second_bytes = std::fs::read(output.path().join("COMP10001.html")).unwrap();

    assert!(first.is_complete());
    assert!(second.is_complete());
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(second_bytes, b"<html>Foundations</html>");
}

#[tokio::test]
async fn test_binary_body_is_stored_verbatim() {
    let mock_server = MockServer::start().await;
    let body: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

    Mock::given(method("GET"))
        .and(path("/view/BIN00001"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;

    let output = tempdir().expect("Failed to create temp dir");
    Dispatcher::new(create_test_config(&mock_server.uri(), output.path(), 1))
        .unwrap()
        .run(&ids(&["BIN00001"]))
        .await
        .expect("Crawl failed");

    assert_eq!(std::fs::read(output.path().join("BIN00001.html")).unwrap(), body);
}

#[tokio::test]
async fn test_reader_never_sees_partial_file() {
    let mock_server = MockServer::start().await;
    let body = "x".repeat(512 * 1024);
    mount_page(&mock_server, "BIG00001", &body).await;

    let output = tempdir().expect("Failed to create temp dir");
    let destination = output.path().join("BIG00001.html");
    let expected_len = body.len() as u64;

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let reader = {
        let destination = destination.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || {
            let mut observed = Vec::new();
            while !stop.load(Ordering::SeqCst) {
                if let Ok(meta) = std::fs::metadata(&destination) {
                    observed.push(meta.len());
                }
            }
            observed
        })
    };

    for _ in 0..3 {
        Dispatcher::new(create_test_config(&mock_server.uri(), output.path(), 1))
            .unwrap()
            .run(&ids(&["BIG00001"]))
            .await
            .expect("Crawl failed");
    }
    stop.store(true, Ordering::SeqCst);

    let observed = reader.await.unwrap();
    assert!(observed.iter().all(|len| *len == expected_len));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_identifiers_share_a_destination_safely() {
    let mock_server = MockServer::start().await;
    let body = vec![b'y'; 2 * 1024 * 1024];
    Mock::given(method("GET"))
        .and(path("/view/AAAA10001"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;

    let output = tempdir().expect("Failed to create temp dir");
    let destination = output.path().join("AAAA10001.html");
    let expected_len = body.len() as u64;

    // The trailing space trims to the same destination file
    let subjects: Vec<String> = (0..8)
        .map(|i| if i % 2 == 0 { "AAAA10001" } else { "AAAA10001 " }.to_string())
        .collect();

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let reader = {
        let destination = destination.clone();
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || {
            let mut observed = Vec::new();
            while !stop.load(Ordering::SeqCst) {
                if let Ok(meta) = std::fs::metadata(&destination) {
                    observed.push(meta.len());
                }
            }
            observed
        })
    };

    for _ in 0..5 {
        let config = create_test_config(&mock_server.uri(), output.path(), 8);
        let report = Dispatcher::with_source(config, Arc::new(InstrumentedSource::new()))
            .expect("Failed to create dispatcher")
            .run(&subjects)
            .await
            .expect("Crawl failed");
        assert_eq!(report.written_count(), subjects.len());
    }
    stop.store(true, Ordering::SeqCst);

    let observed = reader.await.unwrap();
    let bad: Vec<_> = observed.iter().filter(|len| **len != expected_len).collect();
    assert!(bad.is_empty(), "reader saw incomplete lengths: {:?}", bad);
    assert_eq!(std::fs::read(&destination).unwrap(), body);

    let partials: Vec<_> = std::fs::read_dir(output.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| is_partial_file(path))
        .collect();
    assert!(partials.is_empty(), "temporaries left behind: {:?}", partials);
}

#[tokio::test]
async fn test_fail_fast_policy_stops_on_not_found() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "AAAA10001", "<html>A</html>").await;
    Mock::given(method("GET"))
        .and(path("/view/ZZZZ99999"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let output = tempdir().expect("Failed to create temp dir");
    let mut config = create_test_config(&mock_server.uri(), output.path(), 2);
    config.crawler.status_policy = StatusPolicy::FailFastClientErrors;

    let report = Dispatcher::new(config)
        .unwrap()
        .run(&ids(&["AAAA10001", "ZZZZ99999"]))
        .await
        .expect("Crawl failed");

    assert!(!report.is_complete());
    assert_eq!(report.written_count(), 1);
    assert_eq!(
        report.job("ZZZZ99999").unwrap().outcome,
        JobOutcome::Rejected {
            attempts: 1,
            status: 404
        }
    );
    assert!(!output.path().join("ZZZZ99999.html").exists());
}

#[tokio::test]
async fn test_attempt_budget_bounds_unreachable_page() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/view/DOWN00001"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&mock_server)
        .await;

    let output = tempdir().expect("Failed to create temp dir");
    let mut config = create_test_config(&mock_server.uri(), output.path(), 1);
    config.crawler.max_attempts = Some(4);

    let report = Dispatcher::new(config)
        .unwrap()
        .run(&ids(&["DOWN00001"]))
        .await
        .expect("Crawl failed");

    match &report.job("DOWN00001").unwrap().outcome {
        JobOutcome::Exhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(*attempts, 4);
            assert_eq!(last_error, "HTTP status 502");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}
