//! Reports produced by the polling cycle, the cache and the repair pass.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate outcome of one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Accounts loaded at the start of the cycle.
    pub total: usize,
    /// Accounts whose snapshot was fetched and persisted.
    pub updated: usize,
    /// Accounts that failed to fetch or persist.
    pub errors: usize,
    /// Accounts that published at least one new post since the last observation.
    pub new_content_count: usize,
    /// Bucket date every account in this cycle was written under.
    pub bucket_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Age information for one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryStats {
    pub key: String,
    pub age_ms: u64,
    pub expired: bool,
}

/// Read-only view of the snapshot cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub ttl_ms: u64,
    pub entries: Vec<CacheEntryStats>,
}

/// Result of rebuilding one account's change series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub account_id: Uuid,
    /// Records examined.
    pub records: usize,
    /// Records whose change fields were rewritten.
    pub corrected: usize,
}

/// Result of repairing every tracked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRun {
    pub reports: Vec<RepairReport>,
    /// Accounts whose history could not be read or rewritten.
    pub errors: usize,
}
