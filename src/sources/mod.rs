pub mod coingecko;
pub mod exchangerate;
pub mod fallback;
pub mod http;

use crate::core::config::ParserConfig;
use crate::core::{ApiRequestError, RateSource};
use coingecko::CoinGeckoSource;
use exchangerate::ExchangeRateSource;
use std::sync::Arc;

/// Builds one client per source enabled in the configuration.
pub fn configured_sources(
    config: &ParserConfig,
) -> Result<Vec<Arc<dyn RateSource>>, ApiRequestError> {
    let policy = config.retry_policy();
    let mut sources: Vec<Arc<dyn RateSource>> = Vec::new();

    if let Some(coingecko) = &config.sources.coingecko {
        sources.push(Arc::new(CoinGeckoSource::new(
            coingecko,
            &config.base_currency,
            &config.crypto_currencies,
            policy,
        )?));
    }
    if let Some(exchangerate) = &config.sources.exchangerate {
        sources.push(Arc::new(ExchangeRateSource::new(
            exchangerate,
            &config.base_currency,
            &config.fiat_currencies,
            policy,
        )?));
    }
    Ok(sources)
}
