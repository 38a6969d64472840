use super::http::JsonFetcher;
use crate::core::config::{CoinGeckoConfig, RetryPolicy};
use crate::core::{ApiRequestError, CurrencyPair, RateMap, RateSource};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// `{"bitcoin": {"usd": 59337.21}, ...}`
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

/// Crypto prices quoted in the base currency, e.g. `BTC_USD`.
pub struct CoinGeckoSource {
    url: String,
    base_currency: String,
    /// Configured crypto code paired with its CoinGecko id.
    coins: Vec<(String, String)>,
    fetcher: JsonFetcher,
}

impl CoinGeckoSource {
    pub const NAME: &'static str = "coingecko";

    pub fn new(
        config: &CoinGeckoConfig,
        base_currency: &str,
        crypto_currencies: &[String],
        policy: RetryPolicy,
    ) -> Result<Self, ApiRequestError> {
        let coins = crypto_currencies
            .iter()
            .filter_map(|code| match config.ids.get(code) {
                Some(id) => Some((code.clone(), id.clone())),
                None => {
                    warn!(%code, "No CoinGecko id configured, skipping");
                    None
                }
            })
            .collect();
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            base_currency: base_currency.to_string(),
            coins,
            fetcher: JsonFetcher::new(policy)?,
        })
    }
}

#[async_trait]
impl RateSource for CoinGeckoSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(name = "CoinGeckoFetch", skip(self), fields(base = %self.base_currency))]
    async fn fetch_rates(&self) -> Result<RateMap, ApiRequestError> {
        if self.coins.is_empty() {
            warn!("No valid crypto currencies configured");
            return Ok(RateMap::new());
        }

        let vs_currency = self.base_currency.to_lowercase();
        let ids: Vec<&str> = self.coins.iter().map(|(_, id)| id.as_str()).collect();
        let url = format!(
            "{}?ids={}&vs_currencies={}",
            self.url,
            ids.join(","),
            vs_currency
        );
        info!("Fetching crypto rates from CoinGecko");

        let data: SimplePriceResponse = self.fetcher.get_json(&url).await?;

        let mut rates = RateMap::new();
        for (code, id) in &self.coins {
            let Some(price) = data.get(id).and_then(|quotes| quotes.get(&vs_currency)) else {
                warn!(%code, %id, "Missing from CoinGecko response");
                continue;
            };
            let pair = CurrencyPair::new(code, &self.base_currency)
                .map_err(|e| ApiRequestError::new(e.to_string()))?;
            if !(price.is_finite() && *price > 0.0) {
                return Err(ApiRequestError::new(format!(
                    "Invalid rate {price} for {pair} in response"
                )));
            }
            rates.insert(pair, *price);
        }

        info!(count = rates.len(), "CoinGecko rates fetched");
        Ok(rates)
    }
}
