//! HTTP fetcher implementation
//!
//! This module handles the HTTP side of a fetch attempt:
//! - Building the HTTP client with the configured user agent
//! - The `PageSource` seam workers fetch through
//! - Classifying a failed attempt into a typed `AttemptError`

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Why a single fetch attempt did not produce a stored page
///
/// None of these are fatal to the run; the worker decides whether to retry.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
}

impl AttemptError {
    /// Returns the HTTP status code if the server answered with a non-success status
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Something a worker can GET a page body from
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches `url` and returns the full response body
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AttemptError>;
}

/// `PageSource` backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a source whose client carries the configured user agent
    pub fn from_config(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        // Body bytes are kept verbatim; no decoding or content checks
        let body = response.bytes().await.map_err(classify_error)?;
        Ok(body.to_vec())
    }
}

/// Builds an HTTP client with proper configuration
///
/// Request timeouts are applied per attempt by the worker, so the client
/// only bounds the connect phase.
///
/// # Example
///
/// ```no_run
/// use handbook_harvest::config::UserAgentConfig;
/// use handbook_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

fn classify_error(error: reqwest::Error) -> AttemptError {
    if error.is_timeout() {
        AttemptError::Transport("request timeout".to_string())
    } else if error.is_connect() {
        AttemptError::Transport(format!("connection failed: {}", error))
    } else {
        AttemptError::Transport(error.to_string())
    }
}
