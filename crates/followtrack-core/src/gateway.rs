//! Provider gateway contract and call spacing.

use async_trait::async_trait;
use followtrack_types::Snapshot;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Why a snapshot could not be fetched. Always carries the provider's message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Provider error (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}

/// Source of fresh account snapshots.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn fetch_snapshot(&self, handle: &str) -> Result<Snapshot, FetchError>;
}

#[async_trait]
impl<G: ProviderGateway + ?Sized> ProviderGateway for Arc<G> {
    async fn fetch_snapshot(&self, handle: &str) -> Result<Snapshot, FetchError> {
        (**self).fetch_snapshot(handle).await
    }
}

/// Enforces a minimum gap between successive provider calls.
///
/// Callers queue on an internal lock, so concurrent fetches are serialized
/// rather than bunched together.
pub struct SpacedGateway<G> {
    inner: G,
    min_spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl<G> SpacedGateway<G> {
    pub fn new(inner: G, min_spacing: Duration) -> Self {
        Self {
            inner,
            min_spacing,
            last_call: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<G: ProviderGateway> ProviderGateway for SpacedGateway<G> {
    async fn fetch_snapshot(&self, handle: &str) -> Result<Snapshot, FetchError> {
        {
            let mut last_call = self.last_call.lock().await;
            if let Some(previous) = *last_call {
                let elapsed = previous.elapsed();
                if elapsed < self.min_spacing {
                    let wait = self.min_spacing - elapsed;
                    trace!(target: "followtrack::provider", "Spacing provider call for @{} by {:?}", handle, wait);
                    tokio::time::sleep(wait).await;
                }
            }
            *last_call = Some(Instant::now());
        }
        self.inner.fetch_snapshot(handle).await
    }
}
