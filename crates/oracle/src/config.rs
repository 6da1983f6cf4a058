//! Per-run settings.

use crate::{OracleError, Result};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default number of candidate names sent per request.
pub const DEFAULT_BUCKET_SIZE: usize = 64;

/// Default number of requests in flight (1 = strictly sequential).
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Default timeout for a single request (30 seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Placeholder substituted in query templates.
pub const PLACEHOLDER: &str = "FUZZ";

/// Immutable settings shared by every probe of a run.
///
/// ```
/// # use graphql_oracle::Config;
/// let config = Config::new("https://api.example.com/graphql")
///     .with_header("Authorization", "Bearer token")
///     .with_bucket_size(128)
///     .with_concurrency(4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub bucket_size: usize,
    pub concurrency: usize,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retries: u32,
}

impl Config {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            bucket_size: DEFAULT_BUCKET_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            retries: 0,
        }
    }

    /// Adds a header, replacing an earlier one with the same name
    /// (case-insensitive).
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self = self.with_header(name, value);
        }
        self
    }

    #[must_use]
    pub fn with_bucket_size(mut self, bucket_size: usize) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    /// Sets how many requests may be in flight at once.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the number of retry attempts on network and 5xx failures.
    ///
    /// Retries use exponential backoff starting at 1 second.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(OracleError::InvalidConfig("endpoint URL is empty".to_string()));
        }
        if self.bucket_size == 0 {
            return Err(OracleError::InvalidConfig(
                "bucket size must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(OracleError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(OracleError::InvalidConfig(format!(
                "concurrency must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(())
    }
}

/// Checks that a query template carries exactly one placeholder.
pub fn validate_template(template: &str) -> Result<()> {
    match template.matches(PLACEHOLDER).count() {
        1 => Ok(()),
        0 => Err(OracleError::InvalidTemplate(format!(
            "'{template}' has no {PLACEHOLDER} placeholder"
        ))),
        n => Err(OracleError::InvalidTemplate(format!(
            "'{template}' has {n} {PLACEHOLDER} placeholders, expected one"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new("https://example.com/graphql");
        assert!(config.headers.is_empty());
        assert_eq!(config.bucket_size, DEFAULT_BUCKET_SIZE);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_header_replacement_is_case_insensitive() {
        let config = Config::new("https://example.com/graphql")
            .with_headers(vec![("Authorization", "Bearer old"), ("X-Trace", "1")])
            .with_header("authorization", "Bearer new");

        assert_eq!(config.headers.len(), 2);
        assert_eq!(
            config.headers[1],
            ("authorization".to_string(), "Bearer new".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_degenerate_settings() {
        let url = "https://example.com/graphql";
        assert!(Config::new(url).with_bucket_size(0).validate().is_err());
        assert!(Config::new(url).with_concurrency(0).validate().is_err());
        assert!(Config::new(url).with_concurrency(usize::MAX).validate().is_err());
        assert!(Config::new("  ").validate().is_err());
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_template("query { FUZZ }").is_ok());
        assert!(validate_template("query { user { FUZZ } }").is_ok());
        assert!(matches!(
            validate_template("query { user }"),
            Err(OracleError::InvalidTemplate(_))
        ));
        assert!(validate_template("query { FUZZ FUZZ }").is_err());
    }
}
