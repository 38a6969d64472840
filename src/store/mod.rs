pub mod history;
pub mod json;
pub mod rates;

use crate::core::error::RateResult;
use history::HistoryLog;
use json::JsonStore;
use rates::RateCacheStore;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Durable state of the service: the current-rate cache and the history log.
///
/// Opened once by the application root and handed to the components that
/// need it, so each data directory has exactly one owner per process.
#[derive(Clone)]
pub struct Storage {
    pub rates: Arc<RateCacheStore>,
    pub history: Arc<HistoryLog>,
}

impl Storage {
    pub fn open(data_dir: &Path) -> RateResult<Self> {
        debug!("Opening storage at {}", data_dir.display());
        let json = Arc::new(JsonStore::open(data_dir)?);
        let history = HistoryLog::open(&data_dir.join("history"))?;
        Ok(Self {
            rates: Arc::new(RateCacheStore::new(json)),
            history: Arc::new(history),
        })
    }
}
