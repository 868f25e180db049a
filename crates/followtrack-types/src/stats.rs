//! Daily time-series rows.

use crate::Metrics;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signed day-over-day changes. Negative values are legitimate (unfollows,
/// deleted posts) and are never clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDeltas {
    pub follower_change: i64,
    pub post_change: i64,
    pub engagement_change: i64,
}

impl MetricDeltas {
    pub const ZERO: MetricDeltas = MetricDeltas {
        follower_change: 0,
        post_change: 0,
        engagement_change: 0,
    };

    /// Changes going from `previous` to `next`, saturating at the `i64` bounds.
    pub fn between(previous: &Metrics, next: &Metrics) -> Self {
        Self {
            follower_change: next.follower_count.saturating_sub(previous.follower_count),
            post_change: next.post_count.saturating_sub(previous.post_count),
            engagement_change: next
                .engagement_count
                .saturating_sub(previous.engagement_count),
        }
    }
}

/// One row per account per bucket date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatsRecord {
    pub account_id: Uuid,
    /// Calendar date in the tracker's reference time zone.
    pub date: NaiveDate,
    /// Totals as of the day's last reconciliation.
    pub metrics: Metrics,
    /// Changes fixed at the day's first write.
    pub changes: MetricDeltas,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
