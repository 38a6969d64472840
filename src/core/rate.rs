//! Cached rate values and the reports produced around them

use crate::core::error::RateError;
use crate::core::pair::CurrencyPair;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Current value of one pair in the rate cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

impl RateEntry {
    pub fn new(
        pair: &CurrencyPair,
        rate: f64,
        updated_at: DateTime<Utc>,
        source: &str,
    ) -> Result<Self, RateError> {
        check_rate(pair, rate)?;
        Ok(Self {
            rate,
            updated_at,
            source: source.to_string(),
        })
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.updated_at)
    }

    /// An entry is fresh while its age is strictly below the TTL.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) < ttl
    }
}

/// Rejects zero, negative and non-finite rates.
pub fn check_rate(pair: &CurrencyPair, rate: f64) -> Result<(), RateError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(RateError::InvalidRate {
            pair: pair.to_string(),
            rate,
        })
    }
}

/// A rate handed back to callers of the resolver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRate {
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    /// `None` for the identity rate, which never touches the cache.
    pub source: Option<String>,
}

impl From<RateEntry> for ResolvedRate {
    fn from(entry: RateEntry) -> Self {
        Self {
            rate: entry.rate,
            updated_at: entry.updated_at,
            source: Some(entry.source),
        }
    }
}

/// Outcome of one refresh cycle across the configured sources.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub total_rates: usize,
    pub updated_rates: usize,
    pub historical_records: usize,
    pub errors: Vec<String>,
    pub sources_processed: Vec<String>,
    pub success: bool,
    pub completed_at: DateTime<Utc>,
}

impl UpdateReport {
    pub(crate) fn empty() -> Self {
        Self {
            total_rates: 0,
            updated_rates: 0,
            historical_records: 0,
            errors: Vec::new(),
            sources_processed: Vec::new(),
            success: false,
            completed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    /// At least one entry carries a timestamp in the future.
    Stale,
    Outdated,
    Empty,
}

impl Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Freshness::Fresh => "fresh",
                Freshness::Stale => "stale",
                Freshness::Outdated => "outdated",
                Freshness::Empty => "empty",
            }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateStatus {
    pub status: Freshness,
    pub total_rates: usize,
    pub sources: Vec<String>,
    pub ttl_seconds: u64,
    pub oldest_update: Option<DateTime<Utc>>,
    pub newest_update: Option<DateTime<Utc>>,
}
