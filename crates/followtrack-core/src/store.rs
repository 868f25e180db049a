//! Persistence contract consumed by the reconciler and the polling cycle.

use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use followtrack_types::{DailyStatsRecord, Metrics, NotificationRecord, Snapshot, TrackedAccount};
use uuid::Uuid;

/// Everything one reconciliation writes. Applied as a single transaction so
/// the current row and the day bucket never disagree.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub account_id: Uuid,
    pub snapshot: &'a Snapshot,
    pub observed_at: DateTime<Utc>,
    pub record: &'a DailyStatsRecord,
    /// `true` inserts the day bucket, `false` overwrites its totals only.
    pub is_new_day: bool,
    pub notification: Option<&'a NotificationRecord>,
}

/// Durable account, history and notification storage.
///
/// All dates are bucket dates in the tracker's reference time zone.
pub trait HistoryStore: Send + Sync {
    /// Every tracked account across all users, oldest first.
    fn tracked_accounts(&self) -> Result<Vec<TrackedAccount>>;

    /// Stored current metrics, or `None` if the account no longer exists.
    fn current_metrics(&self, account_id: Uuid) -> Result<Option<Metrics>>;

    fn daily_record(&self, account_id: Uuid, date: NaiveDate) -> Result<Option<DailyStatsRecord>>;

    /// Insert the bucket when `is_new_day`, otherwise overwrite its totals and
    /// leave the stored changes alone.
    fn upsert_daily_record(&self, record: &DailyStatsRecord, is_new_day: bool) -> Result<()>;

    /// Replace the account's current metrics and profile fields.
    fn update_current_metrics(
        &self,
        account_id: Uuid,
        snapshot: &Snapshot,
        observed_at: DateTime<Utc>,
    ) -> Result<()>;

    fn insert_notification(&self, notification: &NotificationRecord) -> Result<()>;

    /// All buckets for the account in ascending date order.
    fn ordered_history(&self, account_id: Uuid) -> Result<Vec<DailyStatsRecord>>;

    /// Current row, day bucket and optional notification in one transaction.
    fn apply_observation(&self, observation: &Observation<'_>) -> Result<()>;

    /// Claim or refresh the store-wide cycle lock for `owner`. Succeeds when the
    /// lock is free, already held by `owner`, or last refreshed before
    /// `stale_before`. Returns whether `owner` now holds it.
    fn claim_cycle_lock(
        &self,
        owner: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool>;

    /// Drop the cycle lock if `owner` holds it.
    fn release_cycle_lock(&self, owner: Uuid) -> Result<()>;

    /// Overwrite the change fields of the given buckets in one transaction.
    fn replace_change_series(&self, account_id: Uuid, records: &[DailyStatsRecord]) -> Result<()>;
}
