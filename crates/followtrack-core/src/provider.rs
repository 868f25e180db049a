//! HTTP adapter for the RapidAPI TikTok user-info endpoint.

use crate::gateway::{FetchError, ProviderGateway};
use async_trait::async_trait;
use followtrack_types::{Metrics, Snapshot};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://tiktok-api23.p.rapidapi.com/api";
pub const DEFAULT_API_HOST: &str = "tiktok-api23.p.rapidapi.com";

/// Connection settings for [`HttpProvider`].
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_host: String,
    pub api_key: String,
    /// Upper bound on a single request, connect included.
    pub timeout: Duration,
}

pub struct HttpProvider {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl HttpProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl ProviderGateway for HttpProvider {
    async fn fetch_snapshot(&self, handle: &str) -> Result<Snapshot, FetchError> {
        let url = format!("{}/user/info", self.settings.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(&url)
            .query(&[("uniqueId", handle)])
            .header("x-rapidapi-key", &self.settings.api_key)
            .header("x-rapidapi-host", &self.settings.api_host)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: provider_message(&body),
            });
        }

        let body = resp.text().await?;
        debug!(target: "followtrack::provider", "user/info for @{} returned {} bytes", handle, body.len());
        parse_user_info(&body)
    }
}

/// Prefer the provider's `message` field when the error body is JSON.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoResponse {
    user_info: Option<UserInfo>,
}

#[derive(Deserialize)]
struct UserInfo {
    user: RawUser,
    #[serde(default)]
    stats: RawStats,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    id: String,
    unique_id: String,
    #[serde(default)]
    nickname: String,
    avatar_larger: Option<String>,
    avatar_medium: Option<String>,
    avatar_thumb: Option<String>,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    secret: bool,
    #[serde(default)]
    signature: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawStats {
    #[serde(default)]
    follower_count: Value,
    #[serde(default)]
    following_count: Value,
    #[serde(default)]
    video_count: Value,
    #[serde(default)]
    heart_count: Value,
}

/// Counts arrive as numbers or numeric strings; anything else, including
/// negative or out-of-range values, reads as 0.
fn lenient_count(value: &Value) -> i64 {
    let count = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_count)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    count.filter(|c| *c >= 0).unwrap_or(0)
}

fn float_count(f: f64) -> Option<i64> {
    (f.is_finite() && f < i64::MAX as f64).then(|| f as i64)
}

fn parse_user_info(body: &str) -> Result<Snapshot, FetchError> {
    let parsed: UserInfoResponse = serde_json::from_str(body)?;
    let UserInfo { user, stats } = parsed
        .user_info
        .ok_or_else(|| FetchError::NotFound("User not found or invalid response".to_string()))?;

    let avatar_url = [user.avatar_larger, user.avatar_medium, user.avatar_thumb]
        .into_iter()
        .flatten()
        .find(|url| !url.is_empty());

    Ok(Snapshot {
        provider_id: user.id,
        handle: user.unique_id,
        display_name: user.nickname,
        avatar_url,
        bio: user.signature,
        verified: user.verified,
        private: user.secret,
        metrics: Metrics {
            follower_count: lenient_count(&stats.follower_count),
            following_count: lenient_count(&stats.following_count),
            post_count: lenient_count(&stats.video_count),
            engagement_count: lenient_count(&stats.heart_count),
        },
    })
}
