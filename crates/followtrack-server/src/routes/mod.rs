//! HTTP route handlers.

pub mod accounts;
pub mod admin;
pub mod cron;
pub mod notifications;

use crate::state::AppState;
use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use followtrack_core::TrackerError;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// Header carrying the shared secret for cron and admin routes.
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

pub type ApiError = (StatusCode, String);

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The `/api` router with state attached.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/cron/run-cycle", post(cron::run_cycle))
        .route("/cron/cache-stats", get(cron::cache_stats))
        .route("/admin/repair", post(admin::repair_all))
        .route("/admin/accounts/{id}/repair", post(admin::repair_account))
        .route(
            "/users/{user_id}/accounts",
            get(accounts::list).post(accounts::create),
        )
        .route(
            "/users/{user_id}/accounts/{id}",
            get(accounts::get).delete(accounts::remove),
        )
        .route("/users/{user_id}/accounts/{id}/history", get(accounts::history))
        .route("/users/{user_id}/notifications", get(notifications::list))
        .route(
            "/users/{user_id}/notifications/read-all",
            post(notifications::mark_all_read),
        )
        .route(
            "/users/{user_id}/notifications/{id}/read",
            post(notifications::mark_read),
        );

    Router::new().nest("/api", api).with_state(state)
}

/// Reject the request unless it carries the configured cron secret.
/// Open when no secret is configured.
pub fn authorize_cron(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config.cron_secret.as_deref() else {
        return Ok(());
    };
    let supplied = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if supplied == expected {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()))
    }
}

/// Map a core error to a status code and message.
pub fn api_error(e: TrackerError) -> ApiError {
    let status = match &e {
        TrackerError::AccountNotFound(_)
        | TrackerError::NotificationNotFound(_)
        | TrackerError::DailyRecordNotFound { .. }
        | TrackerError::Fetch(_) => StatusCode::NOT_FOUND,
        TrackerError::AccountAlreadyTracked { .. } | TrackerError::AlreadyRunning => {
            StatusCode::CONFLICT
        }
        TrackerError::InvalidHandle(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(target: "followtrack::api", "Request failed: {}", e);
    }
    (status, e.to_string())
}
