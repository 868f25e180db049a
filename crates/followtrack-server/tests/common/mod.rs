//! Common test utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use followtrack_core::{FetchError, ProviderGateway};
use followtrack_server::{config::Config, routes, state::AppState};
use followtrack_types::{Metrics, Snapshot};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

/// In-memory provider with scripted answers per handle.
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<HashMap<String, Result<Snapshot, FetchError>>>,
    calls: Mutex<usize>,
}

impl ScriptedGateway {
    pub fn respond(&self, handle: &str, response: Result<Snapshot, FetchError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(handle.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    async fn fetch_snapshot(&self, handle: &str) -> Result<Snapshot, FetchError> {
        *self.calls.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotFound("user not found".to_string())))
    }
}

pub fn snapshot(handle: &str, followers: i64, posts: i64) -> Snapshot {
    Snapshot {
        provider_id: format!("id-{}", handle),
        handle: handle.to_string(),
        display_name: handle.to_string(),
        avatar_url: None,
        bio: String::new(),
        verified: false,
        private: false,
        metrics: Metrics {
            follower_count: followers,
            following_count: 10,
            post_count: posts,
            engagement_count: 1000,
        },
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: Arc<AppState>,
    pub gateway: Arc<ScriptedGateway>,
    _dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        db_path: dir.path().join("test.db"),
        time_zone: "UTC".to_string(),
        account_delay_ms: 0,
        ..Config::default()
    };
    config.provider.api_key = "test-key".to_string();
    config
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(|_| {})
}

/// Build the app after letting the caller adjust the config.
pub fn create_test_app_with(adjust: impl FnOnce(&mut Config)) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    adjust(&mut config);

    let gateway = Arc::new(ScriptedGateway::default());
    let state = Arc::new(
        AppState::with_gateway(config, gateway.clone()).expect("Failed to create AppState"),
    );
    TestApp {
        app: routes::router(state.clone()),
        state,
        gateway,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}
