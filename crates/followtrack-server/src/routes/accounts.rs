//! Tracked account routes, scoped by user.

use super::{ApiError, api_error};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use followtrack_types::{DailyStatsRecord, TrackedAccount};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Serialize)]
pub struct AccountListResponse {
    pub accounts: Vec<TrackedAccount>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AccountListResponse>, ApiError> {
    let accounts = state.accounts.list_accounts(user_id).map_err(api_error)?;
    Ok(Json(AccountListResponse { accounts }))
}

#[derive(Deserialize)]
pub struct AddAccountRequest {
    pub handle: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AddAccountRequest>,
) -> Result<(StatusCode, Json<TrackedAccount>), ApiError> {
    let account = state
        .accounts
        .add_account(user_id, &req.handle)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<TrackedAccount>, ApiError> {
    state
        .accounts
        .get_account(user_id, id)
        .map(Json)
        .map_err(api_error)
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .remove_account(user_id, id)
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub days: Option<usize>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub account_id: Uuid,
    pub records: Vec<DailyStatsRecord>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let records = state
        .accounts
        .history(user_id, id, query.days)
        .map_err(api_error)?;
    Ok(Json(HistoryResponse {
        account_id: id,
        records,
    }))
}
