//! Read path: cache first, then the fallback source

use crate::core::rate::RateEntry;
use crate::core::{CurrencyPair, RateResult, RateSource, ResolvedRate};
use crate::store::rates::RateCacheStore;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Resolves a directional rate for a pair of currencies.
///
/// Lookup order is identity, fresh cache entry, direct fallback quote,
/// inverted fallback quote. A cached entry past its TTL is never returned;
/// it always triggers a fallback fetch first. `Ok(None)` means the rate is
/// unavailable, which is distinct from an upstream or storage error.
pub struct RateResolver {
    rates: Arc<RateCacheStore>,
    fallback: Arc<dyn RateSource>,
    ttl: Duration,
}

impl RateResolver {
    pub fn new(rates: Arc<RateCacheStore>, fallback: Arc<dyn RateSource>, ttl: Duration) -> Self {
        Self {
            rates,
            fallback,
            ttl,
        }
    }

    #[instrument(name = "ResolveRate", skip(self))]
    pub async fn get_rate(&self, from: &str, to: &str) -> RateResult<Option<ResolvedRate>> {
        let now = Utc::now();
        // Identity holds for any code, valid or not
        if from.trim().eq_ignore_ascii_case(to.trim()) {
            return Ok(Some(ResolvedRate {
                rate: 1.0,
                updated_at: now,
                source: None,
            }));
        }
        let pair = CurrencyPair::new(from, to)?;

        if let Some(entry) = self.rates.get(&pair)? {
            if entry.is_fresh(self.ttl, now) {
                debug!(%pair, "Serving cached rate");
                return Ok(Some(entry.into()));
            }
            info!(%pair, updated_at = %entry.updated_at, "Cached rate expired, refreshing");
        }

        let quotes = self.fallback.fetch_rates().await?;
        let source = self.fallback.name();

        let rate = if let Some(rate) = quotes.get(&pair) {
            *rate
        } else if let Some(inverse) = quotes.get(&pair.inverse()) {
            if *inverse == 0.0 {
                warn!(%pair, "Inverse quote is zero, cannot derive rate");
                return Ok(None);
            }
            debug!(%pair, inverse, "Deriving rate from inverse quote");
            1.0 / inverse
        } else {
            info!(%pair, "Rate unavailable");
            return Ok(None);
        };

        let entry = RateEntry::new(&pair, rate, now, source)?;
        let stored = self.rates.put_unless_fresh(&pair, entry, self.ttl, now)?;
        Ok(Some(stored.into()))
    }
}
