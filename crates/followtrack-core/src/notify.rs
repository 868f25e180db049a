//! New-content notifications derived from post deltas.

use chrono::{DateTime, Utc};
use followtrack_types::{NotificationRecord, TrackedAccount};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationEmitter;

impl NotificationEmitter {
    pub fn new() -> Self {
        Self
    }

    /// A notification for the account's owner when `post_change` is positive.
    /// Zero and negative changes (deleted posts) produce nothing.
    pub fn emit(
        &self,
        account: &TrackedAccount,
        post_change: i64,
        at: DateTime<Utc>,
    ) -> Option<NotificationRecord> {
        if post_change <= 0 {
            return None;
        }

        Some(NotificationRecord {
            id: Uuid::new_v4(),
            user_id: account.user_id,
            account_id: account.id,
            message: new_content_message(&account.handle, post_change),
            is_read: false,
            created_at: at,
        })
    }
}

fn new_content_message(handle: &str, post_change: i64) -> String {
    if post_change == 1 {
        format!("@{} uploaded a new post", handle)
    } else {
        format!("@{} uploaded {} new posts", handle, post_change)
    }
}
