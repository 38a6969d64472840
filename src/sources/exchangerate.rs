use super::http::JsonFetcher;
use crate::core::config::{DEMO_API_KEY, ExchangeRateConfig, RetryPolicy};
use crate::core::{ApiRequestError, CurrencyPair, RateMap, RateSource};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct LatestResponse {
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    conversion_rates: HashMap<String, f64>,
}

/// Fiat rates from ExchangeRate-API, quoted as `BASE_CODE`.
///
/// `conversion_rates[EUR] = 0.85` for base USD means one dollar buys 0.85
/// euro, stored as `USD_EUR = 0.85`. The identity `BASE_BASE = 1.0` is always
/// included.
pub struct ExchangeRateSource {
    url: String,
    api_key: String,
    base_currency: String,
    fiat_currencies: Vec<String>,
    fetcher: JsonFetcher,
}

impl ExchangeRateSource {
    pub const NAME: &'static str = "exchangerate";

    pub fn new(
        config: &ExchangeRateConfig,
        base_currency: &str,
        fiat_currencies: &[String],
        policy: RetryPolicy,
    ) -> Result<Self, ApiRequestError> {
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            base_currency: base_currency.to_string(),
            fiat_currencies: fiat_currencies.to_vec(),
            fetcher: JsonFetcher::new(policy)?,
        })
    }

    fn pair(&self, code: &str) -> Result<CurrencyPair, ApiRequestError> {
        CurrencyPair::new(&self.base_currency, code).map_err(|e| ApiRequestError::new(e.to_string()))
    }
}

#[async_trait]
impl RateSource for ExchangeRateSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(name = "ExchangeRateFetch", skip(self), fields(base = %self.base_currency))]
    async fn fetch_rates(&self) -> Result<RateMap, ApiRequestError> {
        if self.api_key == DEMO_API_KEY {
            debug!("Using demo API key, rates may be outdated");
        }
        info!("Fetching fiat rates from ExchangeRate-API");

        let url = format!("{}/{}/latest/{}", self.url, self.api_key, self.base_currency);
        let data: LatestResponse = self.fetcher.get_json(&url).await?;

        if data.result != "success" {
            let error_type = data.error_type.as_deref().unwrap_or("Unknown error");
            return Err(ApiRequestError::new(format!("API error: {error_type}")));
        }

        let mut rates = RateMap::new();
        for code in &self.fiat_currencies {
            if *code == self.base_currency {
                continue;
            }
            let Some(rate) = data.conversion_rates.get(code) else {
                warn!(%code, "Missing from ExchangeRate-API response");
                continue;
            };
            let pair = self.pair(code)?;
            if !(rate.is_finite() && *rate > 0.0) {
                return Err(ApiRequestError::new(format!(
                    "Invalid rate {rate} for {pair} in response"
                )));
            }
            rates.insert(pair, *rate);
        }
        rates.insert(self.pair(&self.base_currency)?, 1.0);

        info!(count = rates.len(), "ExchangeRate-API rates fetched");
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> ExchangeRateSource {
        let config = ExchangeRateConfig {
            url: format!("{}/v6", server.uri()),
            api_key: "test-key".to_string(),
        };
        let policy = RetryPolicy {
            max_retries: 2,
            retry_delay: Duration::from_millis(10),
            timeout: Duration::from_secs(2),
        };
        let fiat = vec!["EUR".to_string(), "GBP".to_string(), "JPY".to_string()];
        ExchangeRateSource::new(&config, "USD", &fiat, policy).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_fiat_rates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v6/test-key/latest/USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{
                    "result": "success",
                    "base_code": "USD",
                    "conversion_rates": {"USD": 1, "EUR": 0.85, "GBP": 0.79, "CHF": 0.9}
                }"#,
            ))
            .mount(&server)
            .await;

        let rates = source(&server).fetch_rates().await.unwrap();
        // JPY missing upstream, CHF not configured
        assert_eq!(rates.len(), 3);
        assert_eq!(rates[&"USD_EUR".parse().unwrap()], 0.85);
        assert_eq!(rates[&"USD_GBP".parse().unwrap()], 0.79);
        assert_eq!(rates[&"USD_USD".parse().unwrap()], 1.0);
    }

    #[tokio::test]
    async fn test_api_error_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v6/test-key/latest/USD"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"result": "error", "error-type": "invalid-key"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = source(&server).fetch_rates().await.unwrap_err();
        assert_eq!(err.reason, "API error: invalid-key");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v6/test-key/latest/USD"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = source(&server).fetch_rates().await.unwrap_err();
        assert_eq!(err.reason, "HTTP 403 Forbidden");
    }
}
