//! Cache-first snapshot lookups.

use crate::cache::{SnapshotCache, normalize_handle};
use crate::gateway::{FetchError, ProviderGateway};
use followtrack_types::Snapshot;
use std::sync::Arc;
use tracing::{debug, warn};

/// Consults the shared [`SnapshotCache`] before calling the provider, and
/// fills it on success. Failures are never cached.
pub struct SnapshotFetcher {
    cache: Arc<SnapshotCache>,
    gateway: Arc<dyn ProviderGateway>,
}

impl SnapshotFetcher {
    pub fn new(cache: Arc<SnapshotCache>, gateway: Arc<dyn ProviderGateway>) -> Self {
        Self { cache, gateway }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub async fn fetch(&self, handle: &str) -> Result<Snapshot, FetchError> {
        let key = normalize_handle(handle);
        if key.is_empty() {
            return Err(FetchError::NotFound("empty handle".to_string()));
        }

        if let Some(snapshot) = self.cache.get(&key) {
            debug!(target: "followtrack::cache", "Cache hit for @{}", key);
            return Ok(snapshot);
        }

        debug!(target: "followtrack::provider", "Provider call for @{}", key);
        match self.gateway.fetch_snapshot(&key).await {
            Ok(snapshot) => {
                self.cache.put(&key, snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                warn!(target: "followtrack::provider", "Fetch failed for @{}: {}", key, e);
                Err(e)
            }
        }
    }
}
