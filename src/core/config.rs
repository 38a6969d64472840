use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

use crate::core::pair::normalize_code;

pub const API_KEY_ENV: &str = "EXCHANGERATE_API_KEY";
pub const DEMO_API_KEY: &str = "demo-key";

/// Largest TTL a `chrono::Duration` can hold.
pub const MAX_RATES_TTL_SECS: u64 = (i64::MAX / 1000) as u64;
/// One year between scheduled updates.
pub const MAX_UPDATE_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CoinGeckoConfig {
    pub url: String,
    /// Currency code to CoinGecko coin id.
    #[serde(default = "default_crypto_ids")]
    pub ids: BTreeMap<String, String>,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            ids: default_crypto_ids(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExchangeRateConfig {
    pub url: String,
    /// Overridden by `EXCHANGERATE_API_KEY` when set.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

impl Default for ExchangeRateConfig {
    fn default() -> Self {
        Self {
            url: "https://v6.exchangerate-api.com/v6".to_string(),
            api_key: default_api_key(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    pub coingecko: Option<CoinGeckoConfig>,
    pub exchangerate: Option<ExchangeRateConfig>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        SourcesConfig {
            coingecko: Some(CoinGeckoConfig::default()),
            exchangerate: Some(ExchangeRateConfig::default()),
        }
    }
}

/// Retry parameters shared by every HTTP source client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

/// Configuration for the rate parser service. Built once at startup.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    pub base_currency: String,
    pub fiat_currencies: Vec<String>,
    pub crypto_currencies: Vec<String>,
    pub sources: SourcesConfig,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub rates_ttl_secs: u64,
    pub update_interval_minutes: u64,
    pub data_path: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            fiat_currencies: ["EUR", "GBP", "RUB", "JPY", "CNY", "CHF", "CAD", "AUD"]
                .map(String::from)
                .to_vec(),
            crypto_currencies: ["BTC", "ETH", "SOL", "ADA", "DOT", "BNB", "XRP", "DOGE"]
                .map(String::from)
                .to_vec(),
            sources: SourcesConfig::default(),
            request_timeout_secs: 10,
            max_retries: 3,
            retry_delay_secs: 2,
            rates_ttl_secs: 300,
            update_interval_minutes: 5,
            data_path: None,
        }
    }
}

fn default_api_key() -> String {
    DEMO_API_KEY.to_string()
}

fn default_crypto_ids() -> BTreeMap<String, String> {
    [
        ("BTC", "bitcoin"),
        ("ETH", "ethereum"),
        ("SOL", "solana"),
        ("ADA", "cardano"),
        ("DOT", "polkadot"),
        ("BNB", "binancecoin"),
        ("XRP", "ripple"),
        ("DOGE", "dogecoin"),
    ]
    .into_iter()
    .map(|(code, id)| (code.to_string(), id.to_string()))
    .collect()
}

impl ParserConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "valuta", "valuta")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "valuta", "valuta")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config = Self::from_yaml(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.apply_env_overrides();
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.normalize()?;
        Ok(config)
    }

    fn normalize(&mut self) -> Result<()> {
        self.base_currency = normalize_code(&self.base_currency)?;
        for code in self
            .fiat_currencies
            .iter_mut()
            .chain(self.crypto_currencies.iter_mut())
        {
            *code = normalize_code(code)?;
        }
        if let Some(coingecko) = self.sources.coingecko.as_mut() {
            coingecko.ids = std::mem::take(&mut coingecko.ids)
                .into_iter()
                .map(|(code, id)| -> Result<(String, String)> {
                    Ok((normalize_code(&code)?, id))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.override_api_key(std::env::var(API_KEY_ENV).ok());
    }

    fn override_api_key(&mut self, key: Option<String>) {
        if let (Some(exchangerate), Some(key)) = (self.sources.exchangerate.as_mut(), key)
            && !key.trim().is_empty()
        {
            exchangerate.api_key = key.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fiat_currencies.is_empty() && self.crypto_currencies.is_empty() {
            bail!("At least one fiat or crypto currency must be configured");
        }
        if self.crypto_currencies.contains(&self.base_currency) {
            bail!(
                "Base currency {} cannot be a crypto currency",
                self.base_currency
            );
        }
        if self.max_retries == 0 {
            bail!("max_retries must be at least 1");
        }
        if !(1..=MAX_RATES_TTL_SECS).contains(&self.rates_ttl_secs) {
            bail!("rates_ttl_secs must be between 1 and {MAX_RATES_TTL_SECS}");
        }
        if !(1..=MAX_UPDATE_INTERVAL_MINUTES).contains(&self.update_interval_minutes) {
            bail!("update_interval_minutes must be between 1 and {MAX_UPDATE_INTERVAL_MINUTES}");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        if let Some(exchangerate) = &self.sources.exchangerate
            && exchangerate.api_key == DEMO_API_KEY
        {
            warn!("Using demo ExchangeRate-API key, set {API_KEY_ENV} for live rates");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Clamped to the validated range.
    pub fn rates_ttl(&self) -> chrono::Duration {
        let secs = self.rates_ttl_secs.clamp(1, MAX_RATES_TTL_SECS) as i64;
        chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
    }

    /// Clamped to the validated range.
    pub fn update_interval(&self) -> Duration {
        let minutes = self
            .update_interval_minutes
            .clamp(1, MAX_UPDATE_INTERVAL_MINUTES);
        Duration::from_secs(minutes * 60)
    }
}
