//! Server configuration.

use anyhow::{Result, bail};
use followtrack_core::{DEFAULT_API_HOST, DEFAULT_BASE_URL, DEFAULT_TIME_ZONE, ProviderSettings};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const API_KEY_ENV: &str = "FOLLOWTRACK_API_KEY";
pub const CRON_SECRET_ENV: &str = "FOLLOWTRACK_CRON_SECRET";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// IANA zone used for day-bucket dates.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Built-in scheduler period; 0 leaves cycles to the external trigger.
    #[serde(default)]
    pub cycle_interval_secs: u64,
    #[serde(default = "default_account_delay_ms")]
    pub account_delay_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_sweep_secs")]
    pub cache_sweep_secs: u64,
    /// Required in the `x-cron-secret` header of cron and admin routes when set.
    #[serde(default)]
    pub cron_secret: Option<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum gap between provider calls.
    #[serde(default)]
    pub min_spacing_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("followtrack")
        .join("tracker.db")
}

fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_string()
}

fn default_account_delay_ms() -> u64 {
    800
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_cache_sweep_secs() -> u64 {
    30
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_host: default_api_host(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            min_spacing_ms: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            time_zone: default_time_zone(),
            cycle_interval_secs: 0,
            account_delay_ms: default_account_delay_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_sweep_secs: default_cache_sweep_secs(),
            cron_secret: None,
            provider: ProviderConfig::default(),
        }
    }
}

impl ProviderConfig {
    pub fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            base_url: self.base_url.clone(),
            api_host: self.api_host.clone(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from default location (config/default.toml) or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }

        Ok(Config::default())
    }

    /// Secrets from the environment win over the file.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(CRON_SECRET_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, api_key: Option<String>, cron_secret: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.provider.api_key = key;
        }
        if let Some(secret) = cron_secret.filter(|s| !s.is_empty()) {
            self.cron_secret = Some(secret);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.api_key.trim().is_empty() {
            bail!(
                "provider api_key is not set (use [provider].api_key or {})",
                API_KEY_ENV
            );
        }
        followtrack_core::parse_time_zone(&self.time_zone)?;
        if self.cache_ttl_secs == 0 {
            bail!("cache_ttl_secs must be greater than zero");
        }
        if self.cache_sweep_secs == 0 || self.cache_sweep_secs >= self.cache_ttl_secs {
            bail!(
                "cache_sweep_secs ({}) must be positive and shorter than cache_ttl_secs ({})",
                self.cache_sweep_secs,
                self.cache_ttl_secs
            );
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_secs)
    }

    pub fn account_delay(&self) -> Duration {
        Duration::from_millis(self.account_delay_ms)
    }

    /// `None` when the built-in scheduler is disabled.
    pub fn cycle_interval(&self) -> Option<Duration> {
        (self.cycle_interval_secs > 0).then(|| Duration::from_secs(self.cycle_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        let mut config = Config::default();
        config.provider.api_key = "key".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.time_zone, "America/Mexico_City");
        assert_eq!(config.account_delay(), Duration::from_millis(800));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.cache_sweep_interval(), Duration::from_secs(30));
        assert_eq!(config.cycle_interval(), None);
        assert_eq!(config.provider.timeout_secs, 15);
        assert!(config.cron_secret.is_none());
    }

    #[test]
    fn test_parse_file() {
        let config: Config = toml::from_str(
            r#"
            port = 9000
            time_zone = "UTC"
            cycle_interval_secs = 3600
            cron_secret = "s3cret"

            [provider]
            api_key = "abc"
            min_spacing_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.cycle_interval(), Some(Duration::from_secs(3600)));
        assert_eq!(config.cron_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.provider.min_spacing(), Duration::from_millis(250));
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = valid();
        config.apply_overrides(Some("from-env".into()), Some("env-secret".into()));
        assert_eq!(config.provider.api_key, "from-env");
        assert_eq!(config.cron_secret.as_deref(), Some("env-secret"));

        config.apply_overrides(Some(String::new()), None);
        assert_eq!(config.provider.api_key, "from-env");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::default().validate().is_err());
        valid().validate().unwrap();

        let mut bad_zone = valid();
        bad_zone.time_zone = "Mars/Olympus".into();
        assert!(bad_zone.validate().is_err());

        let mut zero_ttl = valid();
        zero_ttl.cache_ttl_secs = 0;
        assert!(zero_ttl.validate().is_err());

        let mut slow_sweep = valid();
        slow_sweep.cache_sweep_secs = 60;
        assert!(slow_sweep.validate().is_err());
    }
}
