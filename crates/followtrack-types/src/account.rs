//! Tracked accounts and provider snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counters reported by the provider for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub follower_count: i64,
    pub following_count: i64,
    pub post_count: i64,
    /// Total likes/hearts received across all posts.
    pub engagement_count: i64,
}

/// One immutable reading of an account, as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Stable provider-assigned identity (survives handle renames).
    pub provider_id: String,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub verified: bool,
    pub private: bool,
    pub metrics: Metrics,
}

/// An account a user has asked us to follow over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedAccount {
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    pub provider_id: String,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: String,
    pub verified: bool,
    pub private: bool,
    /// Metrics as of the last successful reconciliation.
    pub metrics: Metrics,
    pub added_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl TrackedAccount {
    /// Build a new tracked account from its first snapshot.
    pub fn from_snapshot(user_id: Uuid, snapshot: &Snapshot, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider_id: snapshot.provider_id.clone(),
            handle: snapshot.handle.clone(),
            display_name: snapshot.display_name.clone(),
            avatar_url: snapshot.avatar_url.clone(),
            bio: snapshot.bio.clone(),
            verified: snapshot.verified,
            private: snapshot.private,
            metrics: snapshot.metrics,
            added_at: now,
            last_updated_at: now,
        }
    }
}
