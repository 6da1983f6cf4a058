//! Query execution against the target endpoint.
//!
//! The probing engine only talks to an [`Executor`]; [`HttpExecutor`] is the
//! implementation that POSTs documents over HTTP with custom headers,
//! timeouts and retry logic.

use crate::{Config, OracleError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// One entry of a GraphQL response's `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

/// A decoded GraphQL response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

impl GraphQLResponse {
    /// A response carrying only the given error messages.
    #[must_use]
    pub fn from_errors<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: None,
            errors: Some(
                messages
                    .into_iter()
                    .map(|message| GraphQLError {
                        message: message.into(),
                    })
                    .collect(),
            ),
        }
    }

    /// Error messages, or an empty slice when the response has none.
    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        self.errors
            .iter()
            .flatten()
            .map(|error| error.message.as_str())
            .collect()
    }
}

/// Sends GraphQL documents to the oracle.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, document: &str) -> Result<GraphQLResponse>;
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for &E {
    async fn execute(&self, document: &str) -> Result<GraphQLResponse> {
        (**self).execute(document).await
    }
}

/// An [`Executor`] posting `{"query": document}` to an HTTP endpoint.
///
/// ```no_run
/// use graphql_oracle::{Config, Executor, HttpExecutor};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::new("https://api.example.com/graphql")
///     .with_header("Authorization", "Bearer my-token")
///     .with_retries(2);
/// let executor = HttpExecutor::new(&config)?;
/// let response = executor.execute("query { __typename }").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    url: String,
    headers: Vec<(String, String)>,
    retries: u32,
}

impl HttpExecutor {
    /// Builds the HTTP client once for the whole run.
    pub fn new(config: &Config) -> Result<Self> {
        tracing::debug!("Creating HTTP client with timeouts");
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| OracleError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            headers: config.headers.clone(),
            retries: config.retries,
        })
    }

    /// Executes a single request without retry logic.
    async fn execute_once(&self, document: &str) -> Result<GraphQLResponse> {
        let started = Instant::now();
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");

        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let response = request
            .json(&serde_json::json!({ "query": document }))
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;
        tracing::trace!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Received response"
        );

        // Validation failures usually come back as 400 with a regular
        // GraphQL body, so the body decides, not the status.
        match serde_json::from_str::<GraphQLResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => {
                tracing::error!(status = status.as_u16(), body = %body, "HTTP error response");
                Err(OracleError::Http(status.as_u16(), body))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse GraphQL response");
                Err(OracleError::MalformedResponse(e.to_string()))
            }
        }
    }

    /// Network errors and 5xx server errors are retryable.
    fn is_retryable(error: &OracleError) -> bool {
        match error {
            OracleError::Network(_) => true,
            OracleError::Http(status, _) => *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    #[tracing::instrument(skip(self, document), fields(url = %self.url, len = document.len()))]
    async fn execute(&self, document: &str) -> Result<GraphQLResponse> {
        let mut last_error = None;
        let attempts = self.retries + 1;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(6)); // 1s, 2s, 4s, ...
                tracing::info!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    "Retrying after delay"
                );
                tokio::time::sleep(delay).await;
            }

            match self.execute_once(document).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Request failed");
                    let retryable = Self::is_retryable(&e);
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| OracleError::Network("No attempts made".to_string())))
    }
}
