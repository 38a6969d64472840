use crate::core::config::RetryPolicy;
use crate::core::error::ApiRequestError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Why an attempt failed and whether another one is worth making.
enum AttemptError {
    /// Timeouts and connection failures: wait `retry_delay`.
    Transient(String),
    /// HTTP 429: wait twice `retry_delay`.
    RateLimited,
    /// Anything else ends the request immediately.
    Fatal(String),
}

/// GETs JSON documents with bounded retries.
///
/// Up to `max_retries` attempts are made in total. Timeouts and network
/// errors back off by `retry_delay`, rate limiting by twice that. Other HTTP
/// errors and malformed bodies fail on the spot.
pub struct JsonFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl JsonFetcher {
    pub fn new(policy: RetryPolicy) -> Result<Self, ApiRequestError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("valuta/", env!("CARGO_PKG_VERSION")))
            .timeout(policy.timeout)
            .build()
            .map_err(|e| ApiRequestError::new(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, policy })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiRequestError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiRequestError::new(format!("Invalid JSON response: {e}")))
    }

    async fn get_text(&self, url: &str) -> Result<String, ApiRequestError> {
        let attempts = self.policy.max_retries.max(1);
        let mut attempt = 1;
        loop {
            let (err, delay) = match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(AttemptError::Fatal(reason)) => return Err(ApiRequestError::new(reason)),
                Err(AttemptError::Transient(reason)) => (reason, self.policy.retry_delay),
                Err(AttemptError::RateLimited) => (
                    format!("HTTP {}: rate limit exceeded", StatusCode::TOO_MANY_REQUESTS),
                    self.policy.retry_delay * 2,
                ),
            };

            debug!(attempt, attempts, "Request attempt failed");
            if attempt >= attempts {
                return Err(ApiRequestError::new(err));
            }
            warn!(
                "Attempt {}/{} failed: {}. Retrying in {:?}",
                attempt, attempts, err, delay
            );
            attempt += 1;
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, url: &str) -> Result<String, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AttemptError::RateLimited);
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(format!("HTTP {status}")));
        }

        response.text().await.map_err(classify_transport_error)
    }
}

fn classify_transport_error(e: reqwest::Error) -> AttemptError {
    if e.is_timeout() {
        AttemptError::Transient("Request timeout".to_string())
    } else if e.is_connect() || e.is_request() || e.is_body() {
        AttemptError::Transient(format!("Network error: {}", e.without_url()))
    } else {
        AttemptError::Fatal(format!("Request failed: {}", e.without_url()))
    }
}
