//! Append-only log of every observed rate sample

use crate::core::error::RateResult;
use crate::core::pair::{CurrencyPair, RateMap};
use chrono::{DateTime, SubsecRound, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

pub const HISTORY_PARTITION: &str = "exchange_rates";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    /// Observation time, truncated to whole seconds.
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Deterministic id, e.g. `BTC_USD_coingecko_20250101_120000`.
    pub fn record_id(pair: &CurrencyPair, source: &str, timestamp: DateTime<Utc>) -> String {
        format!("{pair}_{source}_{}", timestamp.format("%Y%m%d_%H%M%S"))
    }
}

pub struct HistoryLog {
    keyspace: Keyspace,
    records: PartitionHandle,
    // Serializes the exists-check and the batch commit of concurrent appends.
    append_lock: Mutex<()>,
}

impl HistoryLog {
    pub fn open(path: &Path) -> RateResult<Self> {
        std::fs::create_dir_all(path)?;
        let keyspace = Config::new(path).open()?;
        let records = keyspace.open_partition(HISTORY_PARTITION, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace,
            records,
            append_lock: Mutex::new(()),
        })
    }

    /// Appends one record per sample observed at `observed_at`.
    ///
    /// Samples whose derived id already exists are skipped, so replaying a
    /// batch within the same second is a no-op. Returns the number of
    /// records inserted.
    pub fn append(
        &self,
        rates: &RateMap,
        source: &str,
        observed_at: DateTime<Utc>,
    ) -> RateResult<usize> {
        let timestamp = observed_at.trunc_subsecs(0);
        let created_at = Utc::now();

        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut batch = self.keyspace.batch();
        let mut seen = HashSet::new();
        let mut inserted = 0;
        for (pair, rate) in rates {
            let id = HistoryRecord::record_id(pair, source, timestamp);
            if !seen.insert(id.clone()) || self.records.contains_key(id.as_bytes())? {
                debug!(%id, "History record already present");
                continue;
            }
            let record = HistoryRecord {
                id: id.clone(),
                from_currency: pair.from().to_string(),
                to_currency: pair.to().to_string(),
                rate: *rate,
                timestamp,
                source: source.to_string(),
                created_at,
            };
            batch.insert(&self.records, id.as_bytes(), serde_json::to_vec(&record)?);
            inserted += 1;
        }

        if inserted > 0 {
            batch.commit()?;
            self.keyspace.persist(PersistMode::SyncAll)?;
        }
        debug!(source, inserted, "Appended history records");
        Ok(inserted)
    }

    /// Lists records oldest first, optionally restricted to one pair.
    pub fn records(&self, pair: Option<&CurrencyPair>) -> RateResult<Vec<HistoryRecord>> {
        let mut records = Vec::new();
        for item in self.records.iter() {
            let (_, value) = item?;
            let record: HistoryRecord = serde_json::from_slice(&value)?;
            let matches = pair.is_none_or(|p| {
                p.from() == record.from_currency && p.to() == record.to_currency
            });
            if matches {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    pub fn len(&self) -> RateResult<usize> {
        Ok(self.records.len()?)
    }

    pub fn is_empty(&self) -> RateResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn pair(s: &str) -> CurrencyPair {
        s.parse().unwrap()
    }

    #[test]
    fn test_record_id_format() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            HistoryRecord::record_id(&pair("BTC_USD"), "coingecko", ts),
            "BTC_USD_coingecko_20250102_030405"
        );
    }

    #[test]
    fn test_append_is_idempotent_within_a_second() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::open(dir.path()).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let rates = RateMap::from([(pair("BTC_USD"), 59337.21), (pair("ETH_USD"), 3720.0)]);

        assert_eq!(log.append(&rates, "coingecko", ts).unwrap(), 2);
        // Same second, different sub-second part
        let replay = ts + Duration::milliseconds(700);
        assert_eq!(log.append(&rates, "coingecko", replay).unwrap(), 0);
        assert_eq!(log.len().unwrap(), 2);

        // Another source or another second is a new sample
        assert_eq!(log.append(&rates, "manual", ts).unwrap(), 2);
        assert_eq!(
            log.append(&rates, "coingecko", ts + Duration::seconds(1)).unwrap(),
            2
        );
        assert_eq!(log.len().unwrap(), 6);
    }

    #[test]
    fn test_records_are_listed_and_filtered() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::open(dir.path()).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();

        let later = RateMap::from([(pair("EUR_USD"), 1.18)]);
        let earlier = RateMap::from([(pair("EUR_USD"), 1.17), (pair("GBP_USD"), 1.3)]);
        log.append(&later, "exchangerate", ts + Duration::seconds(5))
            .unwrap();
        log.append(&earlier, "exchangerate", ts).unwrap();

        let all = log.records(None).unwrap();
        assert_eq!(all.len(), 3);

        let eur = log.records(Some(&pair("EUR_USD"))).unwrap();
        assert_eq!(eur.len(), 2);
        assert_eq!(eur[0].rate, 1.17);
        assert_eq!(eur[1].rate, 1.18);
        assert_eq!(eur[1].from_currency, "EUR");
        assert_eq!(eur[1].to_currency, "USD");
        assert_eq!(eur[1].timestamp, ts + Duration::seconds(5));
        assert_eq!(eur[1].id, "EUR_USD_exchangerate_20250102_030410");
    }
}
