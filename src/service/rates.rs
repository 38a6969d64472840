use super::resolver::RateResolver;
use super::scheduler::Scheduler;
use super::updater::UpdateCoordinator;
use crate::core::config::ParserConfig;
use crate::core::{
    CurrencyPair, RateMap, RateResult, RateSource, ResolvedRate, UpdateReport, UpdateStatus,
};
use crate::sources::configured_sources;
use crate::sources::fallback::StaticRateSource;
use crate::store::Storage;
use crate::store::history::HistoryRecord;
use crate::store::rates::RateTable;
use std::sync::Arc;
use std::time::Duration;

/// How long `stop_scheduler` waits for the background loop.
pub const SCHEDULER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Public face of the rate subsystem, owned by the application root.
pub struct RateService {
    storage: Storage,
    resolver: RateResolver,
    coordinator: Arc<UpdateCoordinator>,
    scheduler: Scheduler,
}

impl RateService {
    /// Wires the configured sources and the static fallback over `storage`.
    pub fn from_config(config: &ParserConfig, storage: Storage) -> RateResult<Self> {
        let sources = configured_sources(config)?;
        Ok(Self::new(
            sources,
            Arc::new(StaticRateSource::default()),
            storage,
            config,
        ))
    }

    pub fn new(
        sources: Vec<Arc<dyn RateSource>>,
        fallback: Arc<dyn RateSource>,
        storage: Storage,
        config: &ParserConfig,
    ) -> Self {
        let ttl = config.rates_ttl();
        let resolver = RateResolver::new(Arc::clone(&storage.rates), fallback, ttl);
        let coordinator = Arc::new(UpdateCoordinator::new(sources, storage.clone(), ttl));
        let scheduler = Scheduler::new(Arc::clone(&coordinator), config.update_interval());
        Self {
            storage,
            resolver,
            coordinator,
            scheduler,
        }
    }

    pub async fn get_rate(&self, from: &str, to: &str) -> RateResult<Option<ResolvedRate>> {
        self.resolver.get_rate(from, to).await
    }

    /// Flattened view of the cache.
    pub fn get_all_rates(&self) -> RateResult<RateMap> {
        Ok(self
            .storage
            .rates
            .read()?
            .into_iter()
            .map(|(pair, entry)| (pair, entry.rate))
            .collect())
    }

    /// Full cache entries, including source and timestamp.
    pub fn cached_entries(&self) -> RateResult<RateTable> {
        self.storage.rates.read()
    }

    pub async fn run_update(&self, sources: Option<&[String]>) -> RateResult<UpdateReport> {
        self.coordinator.run_update(sources).await
    }

    pub fn get_update_status(&self) -> RateResult<UpdateStatus> {
        self.coordinator.get_update_status()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.coordinator.source_names().map(str::to_string).collect()
    }

    /// The most recent `limit` history records, oldest first.
    pub fn history(
        &self,
        pair: Option<&CurrencyPair>,
        limit: usize,
    ) -> RateResult<Vec<HistoryRecord>> {
        let mut records = self.storage.history.records(pair)?;
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }

    pub fn start_scheduler(&self) -> bool {
        self.scheduler.start()
    }

    pub async fn stop_scheduler(&self) -> bool {
        self.scheduler.stop(SCHEDULER_STOP_TIMEOUT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ApiRequestError;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct FixedSource(&'static str, RateMap);

    #[async_trait]
    impl RateSource for FixedSource {
        fn name(&self) -> &str {
            self.0
        }

        async fn fetch_rates(&self) -> Result<RateMap, ApiRequestError> {
            Ok(self.1.clone())
        }
    }

    fn map(items: &[(&str, f64)]) -> RateMap {
        items.iter().map(|(p, r)| (p.parse().unwrap(), *r)).collect()
    }

    #[tokio::test]
    async fn test_update_then_read_back() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        let source: Arc<dyn RateSource> = Arc::new(FixedSource(
            "exchangerate",
            map(&[("USD_EUR", 0.85), ("USD_GBP", 0.79)]),
        ));
        let service = RateService::new(
            vec![source],
            Arc::new(StaticRateSource::default()),
            storage,
            &ParserConfig::default(),
        );

        let report = service.run_update(None).await.unwrap();
        assert!(report.success);
        assert_eq!(service.source_names(), vec!["exchangerate".to_string()]);

        let all = service.get_all_rates().unwrap();
        assert_eq!(all, map(&[("USD_EUR", 0.85), ("USD_GBP", 0.79)]));

        // Served from the fresh cache, the fallback has no GBP quote
        let gbp = service.get_rate("USD", "GBP").await.unwrap().unwrap();
        assert_eq!(gbp.rate, 0.79);
        assert_eq!(gbp.source.as_deref(), Some("exchangerate"));

        let pair = "USD_EUR".parse().unwrap();
        let history = service.history(Some(&pair), 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].rate, 0.85);
        assert_eq!(service.history(None, 1).unwrap().len(), 1);
    }
}
