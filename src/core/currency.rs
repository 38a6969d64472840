//! Registry of the currencies the service knows about

use crate::core::config::ParserConfig;
use crate::core::error::RateError;
use crate::core::pair::normalize_code;
use std::collections::BTreeMap;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    pub code: String,
    pub name: String,
    pub kind: CurrencyKind,
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.kind {
            CurrencyKind::Fiat => "FIAT",
            CurrencyKind::Crypto => "CRYPTO",
        };
        write!(f, "[{tag}] {} - {}", self.code, self.name)
    }
}

fn display_name(code: &str) -> &'static str {
    match code {
        "USD" => "US Dollar",
        "EUR" => "Euro",
        "GBP" => "British Pound",
        "RUB" => "Russian Ruble",
        "JPY" => "Japanese Yen",
        "CNY" => "Chinese Yuan",
        "CHF" => "Swiss Franc",
        "CAD" => "Canadian Dollar",
        "AUD" => "Australian Dollar",
        "BTC" => "Bitcoin",
        "ETH" => "Ethereum",
        "SOL" => "Solana",
        "ADA" => "Cardano",
        "DOT" => "Polkadot",
        "BNB" => "BNB",
        "XRP" => "XRP",
        "DOGE" => "Dogecoin",
        "LTC" => "Litecoin",
        _ => "Unknown",
    }
}

/// Currencies derived from the configured base, fiat and crypto lists.
#[derive(Debug, Clone)]
pub struct CurrencyRegistry {
    currencies: BTreeMap<String, Currency>,
}

impl CurrencyRegistry {
    pub fn from_config(config: &ParserConfig) -> Self {
        let mut currencies = BTreeMap::new();
        let fiat = std::iter::once(&config.base_currency)
            .chain(config.fiat_currencies.iter())
            .map(|code| (code, CurrencyKind::Fiat));
        let crypto = config
            .crypto_currencies
            .iter()
            .map(|code| (code, CurrencyKind::Crypto));

        for (code, kind) in fiat.chain(crypto) {
            currencies.insert(
                code.clone(),
                Currency {
                    code: code.clone(),
                    name: display_name(code).to_string(),
                    kind,
                },
            );
        }
        Self { currencies }
    }

    /// Looks up a currency, failing fast on unknown codes.
    pub fn get(&self, code: &str) -> Result<&Currency, RateError> {
        let code = normalize_code(code)?;
        self.currencies
            .get(&code)
            .ok_or(RateError::CurrencyNotFound(code))
    }

    pub fn all(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_from_config() {
        let registry = CurrencyRegistry::from_config(&ParserConfig::default());

        let usd = registry.get("usd").unwrap();
        assert_eq!(usd.kind, CurrencyKind::Fiat);
        assert_eq!(usd.to_string(), "[FIAT] USD - US Dollar");

        let btc = registry.get("BTC").unwrap();
        assert_eq!(btc.kind, CurrencyKind::Crypto);
        assert_eq!(registry.all().count(), 17);
    }

    #[test]
    fn test_registry_unknown_currency() {
        let registry = CurrencyRegistry::from_config(&ParserConfig::default());
        match registry.get("XYZ") {
            Err(RateError::CurrencyNotFound(code)) => assert_eq!(code, "XYZ"),
            other => panic!("Expected CurrencyNotFound, got {other:?}"),
        }
        assert!(matches!(
            registry.get("?"),
            Err(RateError::InvalidCurrencyCode(_))
        ));
    }
}
