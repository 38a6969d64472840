//! Core domain types and abstractions

pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod pair;
pub mod rate;
pub mod source;

// Re-export main types for cleaner imports
pub use error::{ApiRequestError, RateError, RateResult};
pub use pair::{CurrencyPair, RateMap};
pub use rate::{Freshness, RateEntry, ResolvedRate, UpdateReport, UpdateStatus};
pub use source::RateSource;
