//! Per-user account management on top of the shared store and fetcher.

use crate::bucket::bucket_date;
use crate::cache::normalize_handle;
use crate::db::SqliteHistoryStore;
use crate::fetcher::SnapshotFetcher;
use crate::{Result, TrackerError};
use chrono::Utc;
use chrono_tz::Tz;
use followtrack_types::{DailyStatsRecord, MetricDeltas, NotificationRecord, TrackedAccount};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Days of history returned when the caller does not ask for a window.
pub const DEFAULT_HISTORY_DAYS: usize = 14;

pub struct AccountService {
    store: Arc<SqliteHistoryStore>,
    fetcher: Arc<SnapshotFetcher>,
    time_zone: Tz,
}

impl AccountService {
    pub fn new(store: Arc<SqliteHistoryStore>, fetcher: Arc<SnapshotFetcher>, time_zone: Tz) -> Self {
        Self {
            store,
            fetcher,
            time_zone,
        }
    }

    /// Start tracking `handle` for `user_id`.
    ///
    /// The account row and its first bucket (today, zero changes) are written
    /// together, so a tracked account always has at least one history record.
    pub async fn add_account(&self, user_id: Uuid, handle: &str) -> Result<TrackedAccount> {
        let key = normalize_handle(handle);
        if key.is_empty() {
            return Err(TrackerError::InvalidHandle(handle.to_string()));
        }

        let snapshot = self.fetcher.fetch(&key).await?;
        if self
            .store
            .find_by_provider_id(user_id, &snapshot.provider_id)?
            .is_some()
        {
            return Err(TrackerError::AccountAlreadyTracked {
                handle: snapshot.handle,
            });
        }

        let now = Utc::now();
        let account = TrackedAccount::from_snapshot(user_id, &snapshot, now);
        let first = DailyStatsRecord {
            account_id: account.id,
            date: bucket_date(now, self.time_zone),
            metrics: snapshot.metrics,
            changes: MetricDeltas::ZERO,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_account(&account, &first) {
            Ok(()) => {}
            // Lost a race with a concurrent add of the same account.
            Err(TrackerError::DatabaseError(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(TrackerError::AccountAlreadyTracked {
                    handle: account.handle,
                });
            }
            Err(e) => return Err(e),
        }

        info!(
            target: "followtrack::store",
            "User {} now tracks @{} ({} followers)",
            user_id,
            account.handle,
            account.metrics.follower_count
        );
        Ok(account)
    }

    pub fn list_accounts(&self, user_id: Uuid) -> Result<Vec<TrackedAccount>> {
        self.store.list_accounts(user_id)
    }

    pub fn get_account(&self, user_id: Uuid, account_id: Uuid) -> Result<TrackedAccount> {
        self.store
            .account(user_id, account_id)?
            .ok_or(TrackerError::AccountNotFound(account_id))
    }

    /// The most recent `days` buckets, newest first.
    pub fn history(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        days: Option<usize>,
    ) -> Result<Vec<DailyStatsRecord>> {
        self.get_account(user_id, account_id)?;
        self.store
            .recent_history(account_id, days.unwrap_or(DEFAULT_HISTORY_DAYS))
    }

    pub fn remove_account(&self, user_id: Uuid, account_id: Uuid) -> Result<()> {
        if !self.store.delete_account(user_id, account_id)? {
            return Err(TrackerError::AccountNotFound(account_id));
        }
        info!(target: "followtrack::store", "User {} stopped tracking {}", user_id, account_id);
        Ok(())
    }

    pub fn notifications(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<NotificationRecord>> {
        self.store.notifications(user_id, unread_only)
    }

    pub fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<()> {
        if !self.store.mark_notification_read(user_id, notification_id)? {
            return Err(TrackerError::NotificationNotFound(notification_id));
        }
        Ok(())
    }

    pub fn mark_all_read(&self, user_id: Uuid) -> Result<usize> {
        self.store.mark_all_read(user_id)
    }
}
