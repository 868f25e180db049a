//! Delta computation and day-bucket reconciliation.
//!
//! A bucket's change fields are fixed by the first observation of the day.
//! Later observations on the same date only move the totals, so a second
//! cycle cannot wipe the day's real delta with a near-zero intra-day one.
//! [`DeltaReconciler::recompute_change_series`] rebuilds the change fields
//! from the totals when history has been corrupted.

use crate::notify::NotificationEmitter;
use crate::store::{HistoryStore, Observation};
use crate::{Result, TrackerError};
use chrono::{DateTime, NaiveDate, Utc};
use followtrack_types::{
    DailyStatsRecord, MetricDeltas, NotificationRecord, RepairReport, RepairRun, Snapshot,
    TrackedAccount,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Whether reconciliation created the day's bucket or refreshed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketWrite {
    Inserted,
    Updated,
}

#[derive(Debug, Clone)]
pub struct ReconcileResult {
    /// Raw change against the account's previous current metrics.
    pub deltas: MetricDeltas,
    pub write: BucketWrite,
    /// The bucket as written.
    pub record: DailyStatsRecord,
    pub notification: Option<NotificationRecord>,
}

/// Decide the bucket row for `today` given what is already stored.
pub fn plan_bucket(
    account_id: Uuid,
    today: NaiveDate,
    snapshot: &Snapshot,
    deltas: MetricDeltas,
    existing: Option<DailyStatsRecord>,
    observed_at: DateTime<Utc>,
) -> (DailyStatsRecord, BucketWrite) {
    match existing {
        Some(existing) => (
            DailyStatsRecord {
                metrics: snapshot.metrics,
                updated_at: observed_at,
                ..existing
            },
            BucketWrite::Updated,
        ),
        None => (
            DailyStatsRecord {
                account_id,
                date: today,
                metrics: snapshot.metrics,
                changes: deltas,
                created_at: observed_at,
                updated_at: observed_at,
            },
            BucketWrite::Inserted,
        ),
    }
}

/// Rewrite change fields from consecutive totals. `records` must be in
/// ascending date order. Returns how many records changed.
pub fn rebuild_change_series(records: &mut [DailyStatsRecord]) -> usize {
    let mut corrected = 0;
    let mut previous = None;
    for record in records.iter_mut() {
        let expected = match previous {
            None => MetricDeltas::ZERO,
            Some(prev) => MetricDeltas::between(&prev, &record.metrics),
        };
        if record.changes != expected {
            record.changes = expected;
            corrected += 1;
        }
        previous = Some(record.metrics);
    }
    corrected
}

pub struct DeltaReconciler {
    store: Arc<dyn HistoryStore>,
    emitter: NotificationEmitter,
}

impl DeltaReconciler {
    pub fn new(store: Arc<dyn HistoryStore>, emitter: NotificationEmitter) -> Self {
        Self { store, emitter }
    }

    /// Fold a fresh snapshot into the account's current row and its bucket for
    /// `today`, emitting a notification when new posts appeared. All writes
    /// land in one store transaction.
    pub fn reconcile(
        &self,
        account: &TrackedAccount,
        snapshot: &Snapshot,
        today: NaiveDate,
        observed_at: DateTime<Utc>,
    ) -> Result<ReconcileResult> {
        let previous = self
            .store
            .current_metrics(account.id)?
            .ok_or(TrackerError::AccountNotFound(account.id))?;
        let deltas = MetricDeltas::between(&previous, &snapshot.metrics);

        let existing = self.store.daily_record(account.id, today)?;
        let (record, write) = plan_bucket(account.id, today, snapshot, deltas, existing, observed_at);
        let notification = self.emitter.emit(account, deltas.post_change, observed_at);

        self.store.apply_observation(&Observation {
            account_id: account.id,
            snapshot,
            observed_at,
            record: &record,
            is_new_day: write == BucketWrite::Inserted,
            notification: notification.as_ref(),
        })?;

        debug!(
            target: "followtrack::cycle",
            "Reconciled @{} for {} ({:?}): followers {:+}, posts {:+}, engagement {:+}",
            account.handle,
            today,
            write,
            deltas.follower_change,
            deltas.post_change,
            deltas.engagement_change
        );

        Ok(ReconcileResult {
            deltas,
            write,
            record,
            notification,
        })
    }

    /// Rebuild every change field of an account's history from its totals.
    /// Running it again on unchanged history corrects nothing.
    pub fn recompute_change_series(&self, account_id: Uuid) -> Result<RepairReport> {
        let mut history = self.store.ordered_history(account_id)?;
        let before = history.clone();
        let corrected = rebuild_change_series(&mut history);

        if corrected > 0 {
            let changed: Vec<DailyStatsRecord> = history
                .into_iter()
                .zip(before.iter())
                .filter(|(after, before)| after.changes != before.changes)
                .map(|(after, _)| after)
                .collect();
            self.store.replace_change_series(account_id, &changed)?;
        }

        info!(
            target: "followtrack::repair",
            "Recomputed change series for {}: {} record(s), {} corrected",
            account_id,
            before.len(),
            corrected
        );

        Ok(RepairReport {
            account_id,
            records: before.len(),
            corrected,
        })
    }

    /// Repair every tracked account. One account's failure does not stop the rest.
    pub fn recompute_all(&self) -> Result<RepairRun> {
        let accounts = self.store.tracked_accounts()?;
        let mut run = RepairRun {
            reports: Vec::with_capacity(accounts.len()),
            errors: 0,
        };

        for account in &accounts {
            match self.recompute_change_series(account.id) {
                Ok(report) => run.reports.push(report),
                Err(e) => {
                    warn!(target: "followtrack::repair", "Repair failed for @{}: {}", account.handle, e);
                    run.errors += 1;
                }
            }
        }

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteHistoryStore;
    use crate::testing::{create_test_store, day, seed_account, snapshot};
    use followtrack_types::Metrics;
    use proptest::prelude::*;

    fn reconciler(store: &Arc<SqliteHistoryStore>) -> DeltaReconciler {
        DeltaReconciler::new(store.clone(), NotificationEmitter::new())
    }

    fn setup() -> (Arc<SqliteHistoryStore>, tempfile::TempDir, TrackedAccount) {
        let (store, dir) = create_test_store();
        let account = seed_account(&store, Uuid::new_v4(), "alice", 100, 10, 1000, day(1));
        (Arc::new(store), dir, account)
    }

    #[test]
    fn test_new_day_inserts_with_raw_deltas() {
        let (store, _dir, account) = setup();
        let result = reconciler(&store)
            .reconcile(&account, &snapshot("alice", 130, 12, 1500), day(2), Utc::now())
            .unwrap();

        assert_eq!(result.write, BucketWrite::Inserted);
        assert_eq!(result.deltas.follower_change, 30);
        assert_eq!(result.deltas.post_change, 2);
        assert_eq!(result.deltas.engagement_change, 500);

        let stored = store.daily_record(account.id, day(2)).unwrap().unwrap();
        assert_eq!(stored.changes, result.deltas);
        assert_eq!(stored.metrics.follower_count, 130);
        assert_eq!(store.current_metrics(account.id).unwrap().unwrap().follower_count, 130);
    }

    #[test]
    fn test_same_day_rerun_keeps_first_changes() {
        let (store, _dir, account) = setup();
        let reconciler = reconciler(&store);

        let first = reconciler
            .reconcile(&account, &snapshot("alice", 130, 12, 1500), day(2), Utc::now())
            .unwrap();
        let second = reconciler
            .reconcile(&account, &snapshot("alice", 135, 12, 1600), day(2), Utc::now())
            .unwrap();

        assert_eq!(second.write, BucketWrite::Updated);
        assert_eq!(second.deltas.follower_change, 5);

        let history = store.ordered_history(account.id).unwrap();
        assert_eq!(history.len(), 2);
        let today = &history[1];
        assert_eq!(today.date, day(2));
        assert_eq!(today.changes, first.deltas);
        assert_eq!(today.metrics.follower_count, 135);
        assert_eq!(today.metrics.engagement_count, 1600);
    }

    #[test]
    fn test_first_observation_on_add_day_updates_totals_only() {
        let (store, _dir, account) = setup();
        let result = reconciler(&store)
            .reconcile(&account, &snapshot("alice", 90, 10, 1000), day(1), Utc::now())
            .unwrap();

        assert_eq!(result.write, BucketWrite::Updated);
        let stored = store.daily_record(account.id, day(1)).unwrap().unwrap();
        assert_eq!(stored.changes, MetricDeltas::ZERO);
        assert_eq!(stored.metrics.follower_count, 90);
    }

    #[test]
    fn test_extreme_stored_total_saturates() {
        let (store, _dir) = create_test_store();
        let account = seed_account(&store, Uuid::new_v4(), "alice", i64::MIN, 10, 1000, day(1));
        let store = Arc::new(store);
        let result = reconciler(&store)
            .reconcile(&account, &snapshot("alice", 5, 10, 1000), day(2), Utc::now())
            .unwrap();

        assert_eq!(result.deltas.follower_change, i64::MAX);
        let stored = store.daily_record(account.id, day(2)).unwrap().unwrap();
        assert_eq!(stored.changes.follower_change, i64::MAX);
    }

    #[test]
    fn test_follower_loss_is_negative() {
        let (store, _dir, account) = setup();
        reconciler(&store)
            .reconcile(&account, &snapshot("alice", 80, 10, 1000), day(2), Utc::now())
            .unwrap();

        let stored = store.daily_record(account.id, day(2)).unwrap().unwrap();
        assert_eq!(stored.changes.follower_change, -20);
    }

    #[test]
    fn test_new_posts_write_notification() {
        let (store, _dir, account) = setup();
        let result = reconciler(&store)
            .reconcile(&account, &snapshot("alice", 100, 13, 1000), day(2), Utc::now())
            .unwrap();

        let notification = result.notification.unwrap();
        assert_eq!(notification.message, "@alice uploaded 3 new posts");
        let stored = store.notifications(account.user_id, true).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, notification.id);
        assert_eq!(stored[0].account_id, account.id);
    }

    #[test]
    fn test_deleted_posts_do_not_notify() {
        let (store, _dir, account) = setup();
        let result = reconciler(&store)
            .reconcile(&account, &snapshot("alice", 100, 8, 1000), day(2), Utc::now())
            .unwrap();

        assert!(result.notification.is_none());
        assert!(store.notifications(account.user_id, false).unwrap().is_empty());
    }

    #[test]
    fn test_removed_account_is_not_found() {
        let (store, _dir, account) = setup();
        store.delete_account(account.user_id, account.id).unwrap();

        let err = reconciler(&store)
            .reconcile(&account, &snapshot("alice", 1, 1, 1), day(2), Utc::now())
            .unwrap_err();
        assert!(matches!(err, TrackerError::AccountNotFound(_)));
    }

    #[test]
    fn test_recompute_repairs_corrupted_changes() {
        let (store, _dir, account) = setup();
        let reconciler = reconciler(&store);
        reconciler
            .reconcile(&account, &snapshot("alice", 120, 11, 1100), day(2), Utc::now())
            .unwrap();
        reconciler
            .reconcile(&account, &snapshot("alice", 110, 11, 1300), day(3), Utc::now())
            .unwrap();

        // Corrupt the series.
        let mut corrupted = store.ordered_history(account.id).unwrap();
        for record in corrupted.iter_mut() {
            record.changes = MetricDeltas {
                follower_change: 999,
                post_change: -999,
                engagement_change: 0,
            };
        }
        store.replace_change_series(account.id, &corrupted).unwrap();

        let report = reconciler.recompute_change_series(account.id).unwrap();
        assert_eq!(report.records, 3);
        assert_eq!(report.corrected, 3);

        let history = store.ordered_history(account.id).unwrap();
        assert_eq!(history[0].changes, MetricDeltas::ZERO);
        assert_eq!(history[1].changes.follower_change, 20);
        assert_eq!(history[1].changes.post_change, 1);
        assert_eq!(history[2].changes.follower_change, -10);
        assert_eq!(history[2].changes.engagement_change, 200);

        let again = reconciler.recompute_change_series(account.id).unwrap();
        assert_eq!(again.corrected, 0);
        assert_eq!(store.ordered_history(account.id).unwrap(), history);
    }

    #[test]
    fn test_recompute_all_covers_every_account() {
        let (store, _dir, _alice) = setup();
        seed_account(&store, Uuid::new_v4(), "bob", 5, 1, 10, day(1));

        let run = reconciler(&store).recompute_all().unwrap();
        assert_eq!(run.reports.len(), 2);
        assert_eq!(run.errors, 0);
    }

    fn series(totals: &[(i64, i64, i64)]) -> Vec<DailyStatsRecord> {
        let account_id = Uuid::new_v4();
        let now = Utc::now();
        totals
            .iter()
            .enumerate()
            .map(|(i, &(followers, posts, engagement))| DailyStatsRecord {
                account_id,
                date: day(i as u32 + 1),
                metrics: Metrics {
                    follower_count: followers,
                    following_count: 0,
                    post_count: posts,
                    engagement_count: engagement,
                },
                changes: MetricDeltas {
                    follower_change: (i as i64) * 7,
                    post_change: -1,
                    engagement_change: 42,
                },
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_rebuild_is_idempotent(
            totals in prop::collection::vec((0i64..1_000_000, 0i64..5_000, 0i64..10_000_000), 1..25)
        ) {
            let mut records = series(&totals);
            rebuild_change_series(&mut records);
            let first_pass = records.clone();

            prop_assert_eq!(rebuild_change_series(&mut records), 0);
            prop_assert_eq!(&records, &first_pass);

            prop_assert_eq!(records[0].changes, MetricDeltas::ZERO);
            for i in 1..records.len() {
                prop_assert_eq!(
                    records[i].changes.follower_change,
                    totals[i].0 - totals[i - 1].0
                );
                prop_assert_eq!(records[i].changes.post_change, totals[i].1 - totals[i - 1].1);
                prop_assert_eq!(
                    records[i].changes.engagement_change,
                    totals[i].2 - totals[i - 1].2
                );
            }
        }
    }
}
