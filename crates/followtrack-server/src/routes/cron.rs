//! Externally triggered polling and cache inspection.

use super::{ApiError, api_error, authorize_cron};
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use followtrack_types::{CacheStats, CycleSummary};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Serialize)]
pub struct RunCycleResponse {
    pub success: bool,
    pub summary: CycleSummary,
}

/// Run one polling cycle and return its summary. 409 while another is running.
pub async fn run_cycle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RunCycleResponse>, ApiError> {
    authorize_cron(&state, &headers)?;
    info!(target: "followtrack::api", "Cycle requested via cron endpoint");

    // The cycle runs on its own task so a dropped request cannot cancel it mid-batch.
    let cycle = state.cycle.clone();
    let outcome = tokio::spawn(async move { cycle.run().await })
        .await
        .map_err(|e| {
            error!(target: "followtrack::api", "Cycle task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Cycle task failed".to_string(),
            )
        })?;

    let summary = outcome.map_err(|e| {
        let (status, message) = api_error(e);
        // Only "already running" is a conflict here; a failed load is a server error.
        if status == StatusCode::CONFLICT {
            (status, message)
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    })?;

    Ok(Json(RunCycleResponse {
        success: true,
        summary,
    }))
}

pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CacheStats>, ApiError> {
    authorize_cron(&state, &headers)?;
    Ok(Json(state.cache.stats()))
}
