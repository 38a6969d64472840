//! Currency pairs and the rate maps keyed by them

use crate::core::error::RateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// Rates fetched from a single source, keyed by ordered pair.
pub type RateMap = BTreeMap<CurrencyPair, f64>;

/// Ordered `(from, to)` pair. `USD_EUR` and `EUR_USD` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    from: String,
    to: String,
}

impl CurrencyPair {
    /// Builds a pair from two currency codes, normalising them to upper case.
    pub fn new(from: &str, to: &str) -> Result<Self, RateError> {
        Ok(Self {
            from: normalize_code(from)?,
            to: normalize_code(to)?,
        })
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    pub fn involves(&self, code: &str) -> bool {
        self.from.eq_ignore_ascii_case(code) || self.to.eq_ignore_ascii_case(code)
    }
}

/// Upper-cases and checks a currency code: 2 to 5 ASCII alphanumerics.
pub fn normalize_code(code: &str) -> Result<String, RateError> {
    let code = code.trim();
    if !(2..=5).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RateError::InvalidCurrencyCode(code.to_string()));
    }
    Ok(code.to_ascii_uppercase())
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.from, self.to)
    }
}

impl FromStr for CurrencyPair {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once('_')
            .ok_or_else(|| RateError::InvalidCurrencyCode(s.to_string()))?;
        Self::new(from, to)
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = RateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}
