//! The batch polling cycle.

use crate::bucket::bucket_date;
use crate::fetcher::SnapshotFetcher;
use crate::reconcile::{DeltaReconciler, ReconcileResult};
use crate::store::HistoryStore;
use crate::{Result, TrackerError};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use followtrack_types::{CycleSummary, TrackedAccount};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Minutes after which an unrefreshed cycle lock is considered abandoned.
const CYCLE_LOCK_LEASE_MINUTES: i64 = 10;

/// Tunables for [`PollingCycle`].
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Zone bucket dates are computed in.
    pub time_zone: Tz,
    /// Pause between consecutive accounts.
    pub account_delay: Duration,
}

/// Clears the running flag when the cycle ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Refreshes every tracked account once, sequentially.
pub struct PollingCycle {
    store: Arc<dyn HistoryStore>,
    fetcher: Arc<SnapshotFetcher>,
    reconciler: Arc<DeltaReconciler>,
    settings: CycleSettings,
    running: AtomicBool,
}

impl PollingCycle {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        fetcher: Arc<SnapshotFetcher>,
        reconciler: Arc<DeltaReconciler>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            store,
            fetcher,
            reconciler,
            settings,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_start(&self) -> Result<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TrackerError::AlreadyRunning)?;
        Ok(RunningGuard(&self.running))
    }

    /// Run one cycle over every tracked account.
    ///
    /// Fails only when another cycle is in progress (in this process or any
    /// other process sharing the store) or the account list cannot be loaded;
    /// per-account failures are counted in the summary.
    pub async fn run(&self) -> Result<CycleSummary> {
        let _guard = self.try_start()?;
        let run_id = Uuid::new_v4();
        if !self.claim_store_lock(run_id)? {
            info!(target: "followtrack::cycle", "Another process holds the cycle lock; not starting");
            return Err(TrackerError::AlreadyRunning);
        }

        let outcome = self.run_locked(run_id).await;
        if let Err(e) = self.store.release_cycle_lock(run_id) {
            warn!(target: "followtrack::cycle", "Failed to release cycle lock: {}", e);
        }
        outcome
    }

    fn claim_store_lock(&self, run_id: Uuid) -> Result<bool> {
        let now = Utc::now();
        let stale_before = now - chrono::Duration::minutes(CYCLE_LOCK_LEASE_MINUTES);
        self.store.claim_cycle_lock(run_id, now, stale_before)
    }

    async fn run_locked(&self, run_id: Uuid) -> Result<CycleSummary> {
        let started_at = Utc::now();

        let accounts = self.store.tracked_accounts()?;
        let today = bucket_date(started_at, self.settings.time_zone);
        info!(
            target: "followtrack::cycle",
            "Starting cycle for {} account(s), bucket date {}",
            accounts.len(),
            today
        );

        let mut summary = CycleSummary {
            total: accounts.len(),
            updated: 0,
            errors: 0,
            new_content_count: 0,
            bucket_date: today,
            started_at,
            finished_at: started_at,
        };

        for (index, account) in accounts.iter().enumerate() {
            match self.process_account(account, today).await {
                Ok(result) => {
                    summary.updated += 1;
                    if result.deltas.post_change > 0 {
                        info!(
                            target: "followtrack::cycle",
                            "@{} published {} new post(s)",
                            account.handle,
                            result.deltas.post_change
                        );
                        summary.new_content_count += 1;
                    }
                }
                Err(e) => {
                    warn!(target: "followtrack::cycle", "Failed to update @{}: {}", account.handle, e);
                    summary.errors += 1;
                }
            }

            // Heartbeat; a lost lock does not end the cycle.
            match self.claim_store_lock(run_id) {
                Ok(true) => {}
                Ok(false) => warn!(target: "followtrack::cycle", "Cycle lock was taken over by another process"),
                Err(e) => warn!(target: "followtrack::cycle", "Failed to refresh cycle lock: {}", e),
            }

            if index + 1 < accounts.len() && !self.settings.account_delay.is_zero() {
                tokio::time::sleep(self.settings.account_delay).await;
            }
        }

        summary.finished_at = Utc::now();
        info!(
            target: "followtrack::cycle",
            "Cycle complete: {} total, {} updated, {} errors, {} with new content",
            summary.total,
            summary.updated,
            summary.errors,
            summary.new_content_count
        );
        Ok(summary)
    }

    async fn process_account(
        &self,
        account: &TrackedAccount,
        today: NaiveDate,
    ) -> Result<ReconcileResult> {
        debug!(target: "followtrack::cycle", "Updating @{}", account.handle);
        let snapshot = self.fetcher.fetch(&account.handle).await?;
        self.reconciler.reconcile(account, &snapshot, today, Utc::now())
    }
}
