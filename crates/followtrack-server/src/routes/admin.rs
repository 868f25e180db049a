//! Change-series repair endpoints.

use super::{ApiError, api_error, authorize_cron};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use followtrack_core::{HistoryStore, TrackerError};
use followtrack_types::{RepairReport, RepairRun};
use std::sync::Arc;
use uuid::Uuid;

pub async fn repair_all(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RepairRun>, ApiError> {
    authorize_cron(&state, &headers)?;
    state.reconciler.recompute_all().map(Json).map_err(api_error)
}

pub async fn repair_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<RepairReport>, ApiError> {
    authorize_cron(&state, &headers)?;
    if state.store.current_metrics(id).map_err(api_error)?.is_none() {
        return Err(api_error(TrackerError::AccountNotFound(id)));
    }
    state
        .reconciler
        .recompute_change_series(id)
        .map(Json)
        .map_err(api_error)
}
