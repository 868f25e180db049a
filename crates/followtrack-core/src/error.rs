//! Error types for the tracker core.

use crate::gateway::FetchError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Provider fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("A polling cycle is already running")]
    AlreadyRunning,

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("No daily record for account {account_id} on {date}")]
    DailyRecordNotFound { account_id: Uuid, date: chrono::NaiveDate },

    #[error("Notification not found: {0}")]
    NotificationNotFound(Uuid),

    #[error("Account @{handle} is already tracked")]
    AccountAlreadyTracked { handle: String },

    #[error("Invalid handle: {0:?}")]
    InvalidHandle(String),

    #[error("Store unavailable: connection lock poisoned")]
    StoreUnavailable,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
