//! TTL-bounded snapshot cache shared by the polling cycle and request handlers.

use dashmap::DashMap;
use followtrack_types::{CacheEntryStats, CacheStats, Snapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Normalize an account handle into a cache key: trimmed, no leading `@`,
/// lowercased.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: Snapshot,
    fetched_at: Instant,
}

impl CacheEntry {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }
}

/// In-memory snapshot cache.
///
/// An entry is a hit only while its age is strictly below the TTL. Expired
/// entries are dropped when looked up and by [`SnapshotCache::sweep`].
pub struct SnapshotCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh snapshot for `handle`.
    pub fn get(&self, handle: &str) -> Option<Snapshot> {
        self.get_at(handle, Instant::now())
    }

    fn get_at(&self, handle: &str, now: Instant) -> Option<Snapshot> {
        let key = normalize_handle(handle);
        match self.entries.get(&key) {
            Some(entry) if entry.age(now) < self.ttl => return Some(entry.snapshot.clone()),
            Some(_) => {}
            None => return None,
        }

        self.evict_if_stale(&key, now);
        None
    }

    /// Remove `key` only if it is still stale; a concurrent put may have
    /// refreshed it after the read guard was released.
    fn evict_if_stale(&self, key: &str, now: Instant) -> bool {
        let evicted = self
            .entries
            .remove_if(key, |_, entry| entry.age(now) >= self.ttl)
            .is_some();
        if evicted {
            trace!(target: "followtrack::cache", "Evicted stale entry for @{}", key);
        }
        evicted
    }

    /// Store `snapshot` under `handle`, replacing any previous entry.
    pub fn put(&self, handle: &str, snapshot: Snapshot) {
        self.put_at(handle, snapshot, Instant::now());
    }

    fn put_at(&self, handle: &str, snapshot: Snapshot, fetched_at: Instant) {
        self.entries.insert(
            normalize_handle(handle),
            CacheEntry {
                snapshot,
                fetched_at,
            },
        );
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.age(now) < self.ttl;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry count plus per-entry age and expiry flag.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut entries: Vec<CacheEntryStats> = self
            .entries
            .iter()
            .map(|item| {
                let age = item.value().age(now);
                CacheEntryStats {
                    key: item.key().clone(),
                    age_ms: age.as_millis() as u64,
                    expired: age >= self.ttl,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        CacheStats {
            size: entries.len(),
            ttl_ms: self.ttl.as_millis() as u64,
            entries,
        }
    }

    /// Run [`SnapshotCache::sweep`] every `interval` until the task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(target: "followtrack::cache", "Swept {} expired snapshot(s), {} remaining", removed, cache.len());
                }
            }
        })
    }
}
