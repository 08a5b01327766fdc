use crate::config::types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on the fetch limit; beyond this the remote host is the bottleneck
const MAX_CONCURRENT_FETCHES: usize = 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_prefix(&config.prefix)?;

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > MAX_CONCURRENT_FETCHES
    {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-fetches must be between 1 and {}, got {}",
            MAX_CONCURRENT_FETCHES, config.max_concurrent_fetches
        )));
    }

    if config.max_active_workers == Some(0) {
        return Err(ConfigError::Validation(
            "max-active-workers must be >= 1 when set".to_string(),
        ));
    }

    if config.max_attempts == Some(0) {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1 when set".to_string(),
        ));
    }

    if config.request_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the URL prefix: must parse as an absolute http(s) URL
fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    if prefix.is_empty() {
        return Err(ConfigError::Validation("prefix cannot be empty".to_string()));
    }

    let url = Url::parse(prefix)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid prefix '{}': {}", prefix, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Prefix '{}' must use http or https, got '{}'",
            prefix,
            url.scheme()
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    validate_extension(&config.extension)
}

/// Extensions are bare suffixes: no dot, no path separator
fn validate_extension(extension: &str) -> Result<(), ConfigError> {
    if extension.is_empty() {
        return Err(ConfigError::Validation(
            "extension cannot be empty".to_string(),
        ));
    }

    if extension.contains(['.', '/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "extension '{}' must not contain '.' or path separators",
            extension
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    Ok(())
}
