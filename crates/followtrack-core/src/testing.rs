//! Shared fixtures for unit tests.

use crate::db::SqliteHistoryStore;
use crate::gateway::{FetchError, ProviderGateway};
use crate::store::{HistoryStore, Observation};
use crate::{Result, TrackerError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use followtrack_types::{
    DailyStatsRecord, MetricDeltas, Metrics, NotificationRecord, Snapshot, TrackedAccount,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

pub fn snapshot(handle: &str, followers: i64, posts: i64, engagement: i64) -> Snapshot {
    Snapshot {
        provider_id: format!("id-{}", handle),
        handle: handle.to_string(),
        display_name: handle.to_uppercase(),
        avatar_url: None,
        bio: String::new(),
        verified: false,
        private: false,
        metrics: Metrics {
            follower_count: followers,
            following_count: 50,
            post_count: posts,
            engagement_count: engagement,
        },
    }
}

/// Day `n` of January 2025.
pub fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, n).unwrap()
}

pub fn create_test_store() -> (SqliteHistoryStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = SqliteHistoryStore::open(&temp_dir.path().join("test.db")).unwrap();
    (store, temp_dir)
}

/// Insert an account plus its zero-change first bucket, the way adding one does.
pub fn seed_account(
    store: &SqliteHistoryStore,
    user_id: Uuid,
    handle: &str,
    followers: i64,
    posts: i64,
    engagement: i64,
    added_on: NaiveDate,
) -> TrackedAccount {
    let snap = snapshot(handle, followers, posts, engagement);
    let now = Utc::now();
    let account = TrackedAccount::from_snapshot(user_id, &snap, now);
    let first = DailyStatsRecord {
        account_id: account.id,
        date: added_on,
        metrics: snap.metrics,
        changes: MetricDeltas::ZERO,
        created_at: now,
        updated_at: now,
    };
    store.insert_account(&account, &first).unwrap();
    account
}

/// Gateway answering from a table of canned responses.
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<HashMap<String, std::result::Result<Snapshot, FetchError>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, handle: &str, response: std::result::Result<Snapshot, FetchError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(handle.to_string(), response);
    }

    pub fn calls(&self, handle: &str) -> usize {
        self.calls.lock().unwrap().get(handle).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    async fn fetch_snapshot(&self, handle: &str) -> std::result::Result<Snapshot, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(handle.to_string())
            .or_default() += 1;
        self.responses
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound(format!("no script for @{}", handle))))
    }
}

/// Wraps a real store and fails observation writes for chosen accounts.
pub struct FailingStore<S> {
    pub inner: S,
    pub fail_writes_for: HashSet<Uuid>,
}

impl<S: HistoryStore> HistoryStore for FailingStore<S> {
    fn tracked_accounts(&self) -> Result<Vec<TrackedAccount>> {
        self.inner.tracked_accounts()
    }

    fn current_metrics(&self, account_id: Uuid) -> Result<Option<Metrics>> {
        self.inner.current_metrics(account_id)
    }

    fn daily_record(&self, account_id: Uuid, date: NaiveDate) -> Result<Option<DailyStatsRecord>> {
        self.inner.daily_record(account_id, date)
    }

    fn upsert_daily_record(&self, record: &DailyStatsRecord, is_new_day: bool) -> Result<()> {
        self.inner.upsert_daily_record(record, is_new_day)
    }

    fn update_current_metrics(
        &self,
        account_id: Uuid,
        snapshot: &Snapshot,
        observed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.inner.update_current_metrics(account_id, snapshot, observed_at)
    }

    fn insert_notification(&self, notification: &NotificationRecord) -> Result<()> {
        self.inner.insert_notification(notification)
    }

    fn ordered_history(&self, account_id: Uuid) -> Result<Vec<DailyStatsRecord>> {
        self.inner.ordered_history(account_id)
    }

    fn apply_observation(&self, observation: &Observation<'_>) -> Result<()> {
        if self.fail_writes_for.contains(&observation.account_id) {
            return Err(TrackerError::StoreUnavailable);
        }
        self.inner.apply_observation(observation)
    }

    fn claim_cycle_lock(
        &self,
        owner: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.claim_cycle_lock(owner, now, stale_before)
    }

    fn release_cycle_lock(&self, owner: Uuid) -> Result<()> {
        self.inner.release_cycle_lock(owner)
    }

    fn replace_change_series(&self, account_id: Uuid, records: &[DailyStatsRecord]) -> Result<()> {
        self.inner.replace_change_series(account_id, records)
    }
}
