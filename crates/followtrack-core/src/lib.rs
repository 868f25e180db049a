//! Core tracking engine for followtrack: snapshot fetching and caching,
//! day-bucket reconciliation, notifications and the polling cycle.

mod accounts;
mod bucket;
mod cache;
mod cycle;
mod db;
mod error;
mod fetcher;
mod gateway;
mod notify;
mod provider;
mod reconcile;
mod store;
#[cfg(test)]
mod testing;

pub use accounts::{AccountService, DEFAULT_HISTORY_DAYS};
pub use bucket::{bucket_date, parse_time_zone, DEFAULT_TIME_ZONE};
pub use cache::{normalize_handle, SnapshotCache};
pub use cycle::{CycleSettings, PollingCycle};
pub use db::SqliteHistoryStore;
pub use error::TrackerError;
pub use fetcher::SnapshotFetcher;
pub use gateway::{FetchError, ProviderGateway, SpacedGateway};
pub use notify::NotificationEmitter;
pub use provider::{HttpProvider, ProviderSettings, DEFAULT_API_HOST, DEFAULT_BASE_URL};
pub use reconcile::{
    plan_bucket, rebuild_change_series, BucketWrite, DeltaReconciler, ReconcileResult,
};
pub use store::{HistoryStore, Observation};

/// Result type for followtrack operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
