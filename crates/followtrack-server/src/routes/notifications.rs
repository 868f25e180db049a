//! Notification inbox routes.

use super::{ApiError, api_error};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use followtrack_types::NotificationRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationRecord>,
    pub unread_count: usize,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let notifications = state
        .accounts
        .notifications(user_id, query.unread)
        .map_err(api_error)?;
    let unread_count = notifications.iter().filter(|n| !n.is_read).count();
    Ok(Json(NotificationListResponse {
        notifications,
        unread_count,
    }))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .mark_notification_read(user_id, id)
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let updated = state.accounts.mark_all_read(user_id).map_err(api_error)?;
    Ok(Json(MarkAllReadResponse { updated }))
}
