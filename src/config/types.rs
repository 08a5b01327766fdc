use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Handbook-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
}

impl Config {
    /// Creates a configuration for the given prefix with every other value defaulted
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            crawler: CrawlerConfig::with_prefix(prefix),
            output: OutputConfig::default(),
            user_agent: UserAgentConfig::default(),
        }
    }
}

/// Fetch behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// String prepended verbatim to every identifier to build its URL
    pub prefix: String,

    /// Maximum number of fetch attempts in flight at once
    #[serde(rename = "max-concurrent-fetches", default = "default_concurrency")]
    pub max_concurrent_fetches: usize,

    /// Maximum number of worker tasks alive at once (unbounded when absent)
    #[serde(rename = "max-active-workers", default)]
    pub max_active_workers: Option<usize>,

    /// Per-attempt timeout in seconds (none when absent)
    #[serde(rename = "request-timeout-secs", default)]
    pub request_timeout_secs: Option<u64>,

    /// Attempt budget per job (retry forever when absent)
    #[serde(rename = "max-attempts", default)]
    pub max_attempts: Option<u32>,

    /// Pause between a failed attempt and the next one (milliseconds)
    #[serde(rename = "retry-delay-ms", default)]
    pub retry_delay_ms: u64,

    /// How non-success HTTP statuses are treated
    #[serde(rename = "status-policy", default)]
    pub status_policy: StatusPolicy,
}

impl CrawlerConfig {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            max_concurrent_fetches: default_concurrency(),
            max_active_workers: None,
            request_timeout_secs: None,
            max_attempts: None,
            retry_delay_ms: 0,
            status_policy: StatusPolicy::default(),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Policy for HTTP responses with a non-success status code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusPolicy {
    /// Every non-success status is retried
    #[default]
    Retry,

    /// Client errors (4xx, except 408 and 429) end the job immediately
    FailFastClientErrors,
}

impl StatusPolicy {
    /// Returns true if a response with this status should never be retried
    pub fn is_permanent(&self, status: u16) -> bool {
        match self {
            Self::Retry => false,
            Self::FailFastClientErrors => {
                (400..500).contains(&status) && status != 408 && status != 429
            }
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one file per identifier
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// File extension appended to every trimmed identifier (without the dot)
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            extension: default_extension(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.crawler_name, self.crawler_version, url),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_directory() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_extension() -> String {
    "html".to_string()
}

fn default_crawler_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
