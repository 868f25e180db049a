//! Shared application state.

use crate::config::Config;
use followtrack_core::{
    AccountService, CycleSettings, DeltaReconciler, HistoryStore, HttpProvider,
    NotificationEmitter, PollingCycle, ProviderGateway, SnapshotCache, SnapshotFetcher,
    SpacedGateway, SqliteHistoryStore, TrackerError, parse_time_zone,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub store: Arc<SqliteHistoryStore>,
    pub cache: Arc<SnapshotCache>,
    pub reconciler: Arc<DeltaReconciler>,
    pub cycle: Arc<PollingCycle>,
    pub accounts: Arc<AccountService>,
    pub config: Config,
}

impl AppState {
    /// State backed by the real provider API.
    pub fn new(config: Config) -> followtrack_core::Result<Self> {
        let provider =
            HttpProvider::new(config.provider.settings()).map_err(TrackerError::Fetch)?;
        let gateway = SpacedGateway::new(provider, config.provider.min_spacing());
        Self::with_gateway(config, Arc::new(gateway))
    }

    /// State wired to an arbitrary gateway.
    pub fn with_gateway(
        config: Config,
        gateway: Arc<dyn ProviderGateway>,
    ) -> followtrack_core::Result<Self> {
        let time_zone = parse_time_zone(&config.time_zone)?;
        let store = Arc::new(SqliteHistoryStore::open(&config.db_path)?);
        let history: Arc<dyn HistoryStore> = store.clone();

        let cache = Arc::new(SnapshotCache::new(config.cache_ttl()));
        let fetcher = Arc::new(SnapshotFetcher::new(cache.clone(), gateway));
        let reconciler = Arc::new(DeltaReconciler::new(
            history.clone(),
            NotificationEmitter::new(),
        ));
        let cycle = Arc::new(PollingCycle::new(
            history,
            fetcher.clone(),
            reconciler.clone(),
            CycleSettings {
                time_zone,
                account_delay: config.account_delay(),
            },
        ));
        let accounts = Arc::new(AccountService::new(store.clone(), fetcher, time_zone));

        Ok(Self {
            store,
            cache,
            reconciler,
            cycle,
            accounts,
            config,
        })
    }
}
