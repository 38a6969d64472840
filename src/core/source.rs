//! Rate source abstraction

use crate::core::error::ApiRequestError;
use crate::core::pair::RateMap;
use async_trait::async_trait;

/// An upstream provider of exchange rates.
///
/// Implementations own their endpoint shape, response parsing and retry
/// handling. Every failure is normalised to a single [`ApiRequestError`].
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Name used in update reports and as the `source` of cached entries.
    fn name(&self) -> &str;

    async fn fetch_rates(&self) -> Result<RateMap, ApiRequestError>;
}
