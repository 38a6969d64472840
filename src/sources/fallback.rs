use crate::core::{ApiRequestError, CurrencyPair, RateMap, RateSource};
use async_trait::async_trait;

/// Fixed rates used by the resolver when the cache has nothing fresh.
///
/// Stands in for a live quote feed. Any other [`RateSource`] can be plugged
/// into the resolver in its place.
pub struct StaticRateSource {
    rates: RateMap,
}

const STUB_RATES: &[(&str, f64)] = &[
    ("USD_EUR", 0.85),
    ("EUR_USD", 1.18),
    ("USD_BTC", 0.00001685),
    ("BTC_USD", 59337.21),
    ("USD_ETH", 0.000269),
    ("ETH_USD", 3720.00),
    ("USD_RUB", 98.42),
    ("RUB_USD", 0.01016),
    ("EUR_BTC", 0.0000142),
    ("BTC_EUR", 70500.00),
];

impl StaticRateSource {
    pub const NAME: &'static str = "fallback";

    pub fn new(rates: RateMap) -> Self {
        Self { rates }
    }
}

impl Default for StaticRateSource {
    fn default() -> Self {
        let rates = STUB_RATES
            .iter()
            .filter_map(|(pair, rate)| Some((pair.parse::<CurrencyPair>().ok()?, *rate)))
            .collect();
        Self::new(rates)
    }
}

#[async_trait]
impl RateSource for StaticRateSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch_rates(&self) -> Result<RateMap, ApiRequestError> {
        Ok(self.rates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_table() {
        let rates = StaticRateSource::default().fetch_rates().await.unwrap();
        assert_eq!(rates.len(), STUB_RATES.len());
        assert_eq!(rates[&"USD_EUR".parse().unwrap()], 0.85);
        assert_eq!(rates[&"BTC_EUR".parse().unwrap()], 70500.00);
    }
}
