//! Current-value rate cache, one entry per ordered pair

use super::json::JsonStore;
use crate::core::error::{RateError, RateResult};
use crate::core::pair::{CurrencyPair, RateMap};
use crate::core::rate::{RateEntry, check_rate};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub const RATES_FILE: &str = "rates.json";

pub type RateTable = BTreeMap<CurrencyPair, RateEntry>;

pub struct RateCacheStore {
    store: Arc<JsonStore>,
}

fn check_table(table: &RateTable) -> RateResult<()> {
    for (pair, entry) in table {
        check_rate(pair, entry.rate).map_err(|e| {
            RateError::Database(format!("Corrupt entry in {RATES_FILE}: {e}"))
        })?;
    }
    Ok(())
}

impl RateCacheStore {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }

    pub fn read(&self) -> RateResult<RateTable> {
        let table: RateTable = self.store.read(RATES_FILE)?;
        check_table(&table)?;
        Ok(table)
    }

    /// Replaces the whole table. All or nothing.
    pub fn write(&self, table: &RateTable) -> RateResult<()> {
        for (pair, entry) in table {
            check_rate(pair, entry.rate)?;
        }
        self.store.write(RATES_FILE, table)
    }

    pub fn get(&self, pair: &CurrencyPair) -> RateResult<Option<RateEntry>> {
        let entry = self.read()?.remove(pair);
        debug!(%pair, hit = entry.is_some(), "Rate cache lookup");
        Ok(entry)
    }

    /// Stores a single entry, last write wins.
    pub fn put(&self, pair: &CurrencyPair, entry: RateEntry) -> RateResult<()> {
        check_rate(pair, entry.rate)?;
        self.store.update(RATES_FILE, |table: &mut RateTable| {
            check_table(table)?;
            table.insert(pair.clone(), entry);
            Ok(())
        })
    }

    /// Stores `entry` unless the cached one is still fresh at `now`.
    ///
    /// Check and insert happen under the file lock, so a merge landing after
    /// the caller's own lookup is never overwritten. Returns the entry that
    /// ends up in the cache.
    pub fn put_unless_fresh(
        &self,
        pair: &CurrencyPair,
        entry: RateEntry,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> RateResult<RateEntry> {
        check_rate(pair, entry.rate)?;
        self.store.update(RATES_FILE, |table: &mut RateTable| {
            check_table(table)?;
            if let Some(current) = table.get(pair)
                && current.is_fresh(ttl, now)
            {
                debug!(%pair, "Fresher entry already cached, keeping it");
                return Ok(current.clone());
            }
            table.insert(pair.clone(), entry.clone());
            Ok(entry)
        })
    }

    /// Merges freshly fetched rates from `source`.
    ///
    /// An entry is rewritten only when the pair is new, or its source or rate
    /// differ from what is stored. Returns the number of entries changed.
    pub fn merge(&self, rates: &RateMap, source: &str, now: DateTime<Utc>) -> RateResult<usize> {
        for (pair, rate) in rates {
            check_rate(pair, *rate)?;
        }

        self.store.update(RATES_FILE, |table: &mut RateTable| {
            check_table(table)?;
            let mut changed = 0;
            for (pair, rate) in rates {
                let unchanged = table
                    .get(pair)
                    .is_some_and(|existing| existing.source == source && existing.rate == *rate);
                if unchanged {
                    continue;
                }
                table.insert(pair.clone(), RateEntry::new(pair, *rate, now, source)?);
                changed += 1;
            }
            debug!(source, changed, total = rates.len(), "Merged rates into cache");
            Ok(changed)
        })
    }
}
