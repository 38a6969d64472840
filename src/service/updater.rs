//! Refresh cycle across the configured sources

use crate::core::rate::{Freshness, UpdateReport, UpdateStatus, check_rate};
use crate::core::{RateMap, RateResult, RateSource};
use crate::store::Storage;
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// Pulls rates from each source and writes them to the cache and history.
///
/// Sources are processed one at a time. A failing or unknown source only
/// adds an entry to the report's error list; storage failures abort the
/// run and propagate.
pub struct UpdateCoordinator {
    sources: BTreeMap<String, Arc<dyn RateSource>>,
    storage: Storage,
    ttl: Duration,
    // One cycle at a time per coordinator
    run_lock: Mutex<()>,
}

impl UpdateCoordinator {
    pub fn new(sources: Vec<Arc<dyn RateSource>>, storage: Storage, ttl: Duration) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.name().to_string(), source))
            .collect();
        Self {
            sources,
            storage,
            ttl,
            run_lock: Mutex::new(()),
        }
    }

    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Runs one refresh cycle over `sources`, or every configured source.
    #[instrument(name = "RatesUpdate", skip(self))]
    pub async fn run_update(&self, sources: Option<&[String]>) -> RateResult<UpdateReport> {
        let _guard = self.run_lock.lock().await;
        info!("Starting rates update");

        let requested: Vec<String> = match sources {
            Some(names) => names.to_vec(),
            None => self.sources.keys().cloned().collect(),
        };

        let mut report = UpdateReport::empty();
        let mut all_rates = RateMap::new();

        for name in &requested {
            let Some(source) = self.sources.get(name) else {
                let message = format!("Unknown source: {name}");
                warn!("{message}");
                report.errors.push(message);
                continue;
            };

            info!(source = %name, "Fetching rates");
            let rates = match source.fetch_rates().await {
                Ok(rates) => rates,
                Err(e) => {
                    let message = format!("{name}: {e}");
                    error!("{message}");
                    report.errors.push(message);
                    continue;
                }
            };
            if let Err(e) = rates.iter().try_for_each(|(pair, rate)| check_rate(pair, *rate)) {
                let message = format!("{name}: {e}");
                error!("{message}");
                report.errors.push(message);
                continue;
            }

            let observed_at = Utc::now();
            let updated = self.storage.rates.merge(&rates, name, observed_at)?;
            let recorded = self.storage.history.append(&rates, name, observed_at)?;

            info!(
                source = %name,
                fetched = rates.len(),
                updated,
                recorded,
                "Source processed"
            );
            report.updated_rates += updated;
            report.historical_records += recorded;
            report.sources_processed.push(name.clone());
            all_rates.extend(rates);
        }

        report.total_rates = all_rates.len();
        report.success = report.errors.is_empty();
        report.completed_at = Utc::now();

        if report.success {
            info!(
                sources = report.sources_processed.len(),
                total = report.total_rates,
                "Update successful"
            );
        } else {
            warn!(errors = report.errors.len(), "Update completed with errors");
        }
        Ok(report)
    }

    /// Summarises the cache against the TTL, judged by its oldest entry.
    pub fn get_update_status(&self) -> RateResult<UpdateStatus> {
        let table = self.storage.rates.read()?;
        let now = Utc::now();

        let oldest_update = table.values().map(|e| e.updated_at).min();
        let newest_update = table.values().map(|e| e.updated_at).max();
        let sources: BTreeSet<String> = table.values().map(|e| e.source.clone()).collect();

        let status = match (oldest_update, newest_update) {
            (None, _) | (_, None) => Freshness::Empty,
            (_, Some(newest)) if newest > now => Freshness::Stale,
            (Some(oldest), _) if now - oldest < self.ttl => Freshness::Fresh,
            _ => Freshness::Outdated,
        };

        Ok(UpdateStatus {
            status,
            total_rates: table.len(),
            sources: sources.into_iter().collect(),
            ttl_seconds: self.ttl.num_seconds().max(0) as u64,
            oldest_update,
            newest_update,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ApiRequestError;
    use crate::core::rate::RateEntry;
    use async_trait::async_trait;
    use tempfile::{TempDir, tempdir};

    struct StubSource {
        name: &'static str,
        result: Result<RateMap, ApiRequestError>,
    }

    #[async_trait]
    impl RateSource for StubSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_rates(&self) -> Result<RateMap, ApiRequestError> {
            self.result.clone()
        }
    }

    fn rates(items: &[(&str, f64)]) -> RateMap {
        items.iter().map(|(p, r)| (p.parse().unwrap(), *r)).collect()
    }

    fn coordinator(sources: Vec<Arc<dyn RateSource>>) -> (TempDir, Storage, UpdateCoordinator) {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        let coordinator = UpdateCoordinator::new(sources, storage.clone(), Duration::seconds(300));
        (dir, storage, coordinator)
    }

    fn healthy() -> Arc<dyn RateSource> {
        Arc::new(StubSource {
            name: "coingecko",
            result: Ok(rates(&[("BTC_USD", 59337.21), ("ETH_USD", 3720.0)])),
        })
    }

    fn broken() -> Arc<dyn RateSource> {
        Arc::new(StubSource {
            name: "exchangerate",
            result: Err(ApiRequestError::new("HTTP 503 Service Unavailable")),
        })
    }

    #[test_log::test(tokio::test)]
    async fn test_partial_success_is_durable() {
        let (_dir, storage, coordinator) = coordinator(vec![healthy(), broken()]);

        let report = coordinator.run_update(None).await.unwrap();
        assert!(!report.success);
        assert_eq!(
            report.errors,
            vec!["exchangerate: HTTP 503 Service Unavailable".to_string()]
        );
        assert_eq!(report.sources_processed, vec!["coingecko".to_string()]);
        assert_eq!(report.total_rates, 2);
        assert_eq!(report.updated_rates, 2);
        assert_eq!(report.historical_records, 2);

        let table = storage.rates.read().unwrap();
        assert_eq!(table[&"BTC_USD".parse().unwrap()].rate, 59337.21);
        assert_eq!(table[&"BTC_USD".parse().unwrap()].source, "coingecko");
    }

    #[tokio::test]
    async fn test_invalid_rates_skip_only_that_source() {
        let bad: Arc<dyn RateSource> = Arc::new(StubSource {
            name: "manual",
            result: Ok(rates(&[("USD_EUR", 0.85), ("USD_RUB", 0.0)])),
        });
        let (_dir, storage, coordinator) = coordinator(vec![healthy(), bad]);

        let report = coordinator.run_update(None).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.sources_processed, vec!["coingecko".to_string()]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("manual: "), "{:?}", report.errors);

        // Nothing from the rejected source reaches the cache or history
        let table = storage.rates.read().unwrap();
        assert!(!table.contains_key(&"USD_EUR".parse().unwrap()));
        assert_eq!(table.len(), 2);
        assert_eq!(storage.history.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_source_is_reported() {
        let (_dir, _storage, coordinator) = coordinator(vec![healthy()]);

        let report = coordinator
            .run_update(Some(&["unknown_source".to_string()]))
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.errors, vec!["Unknown source: unknown_source".to_string()]);
        assert_eq!(report.total_rates, 0);
        assert!(report.sources_processed.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_update_changes_nothing() {
        let (_dir, _storage, coordinator) = coordinator(vec![healthy()]);

        let first = coordinator.run_update(None).await.unwrap();
        assert!(first.success);
        assert_eq!(first.updated_rates, 2);

        let second = coordinator.run_update(None).await.unwrap();
        assert!(second.success);
        assert_eq!(second.total_rates, 2);
        assert_eq!(second.updated_rates, 0);
    }

    #[tokio::test]
    async fn test_selected_sources_only() {
        let (_dir, storage, coordinator) = coordinator(vec![healthy(), broken()]);

        let report = coordinator
            .run_update(Some(&["coingecko".to_string()]))
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(storage.history.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_status_aggregates_oldest_entry() {
        let (_dir, storage, coordinator) = coordinator(vec![healthy()]);
        assert_eq!(
            coordinator.get_update_status().unwrap().status,
            Freshness::Empty
        );

        coordinator.run_update(None).await.unwrap();
        let status = coordinator.get_update_status().unwrap();
        assert_eq!(status.status, Freshness::Fresh);
        assert_eq!(status.total_rates, 2);
        assert_eq!(status.sources, vec!["coingecko".to_string()]);
        assert_eq!(status.ttl_seconds, 300);

        // One expired entry makes the whole cache outdated
        let pair = "USD_EUR".parse().unwrap();
        let old = Utc::now() - Duration::seconds(600);
        storage
            .rates
            .put(&pair, RateEntry::new(&pair, 0.85, old, "fallback").unwrap())
            .unwrap();
        let status = coordinator.get_update_status().unwrap();
        assert_eq!(status.status, Freshness::Outdated);
        assert_eq!(status.oldest_update, Some(old));
        assert_eq!(status.sources.len(), 2);

        let future = Utc::now() + Duration::seconds(600);
        storage
            .rates
            .put(&pair, RateEntry::new(&pair, 0.85, future, "fallback").unwrap())
            .unwrap();
        assert_eq!(
            coordinator.get_update_status().unwrap().status,
            Freshness::Stale
        );
    }
}
