//! Error taxonomy for the rate subsystem.

use thiserror::Error;

/// Failure talking to an upstream rate provider.
///
/// Raised by source clients after their own retries are exhausted. The
/// update coordinator records it against the source and moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct ApiRequestError {
    pub reason: String,
}

impl ApiRequestError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the cache, history log and resolver.
#[derive(Debug, Error)]
pub enum RateError {
    #[error("API request failed: {0}")]
    Api(#[from] ApiRequestError),

    #[error("Unknown currency '{0}'")]
    CurrencyNotFound(String),

    #[error("Invalid currency code '{0}'")]
    InvalidCurrencyCode(String),

    /// Rates must be strictly positive and finite.
    #[error("Invalid rate {rate} for {pair}")]
    InvalidRate { pair: String, rate: f64 },

    #[error("Storage error: {0}")]
    Database(String),
}

impl From<std::io::Error> for RateError {
    fn from(e: std::io::Error) -> Self {
        RateError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for RateError {
    fn from(e: serde_json::Error) -> Self {
        RateError::Database(format!("serialization failed: {e}"))
    }
}

impl From<fjall::Error> for RateError {
    fn from(e: fjall::Error) -> Self {
        RateError::Database(e.to_string())
    }
}

pub type RateResult<T> = Result<T, RateError>;
