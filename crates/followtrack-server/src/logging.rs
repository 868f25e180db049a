//! Logging configuration and initialization.
//!
//! Every event in the workspace is emitted under a `followtrack::<area>`
//! target. Presets pick a level per area, `--log area=level` adjusts single
//! areas on top of the preset, and `RUST_LOG` replaces the whole filter.

use std::collections::BTreeMap;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const TARGET_PREFIX: &str = "followtrack::";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Cycle summaries, startup and failures.
    #[default]
    Production,
    /// Adds per-account and request detail.
    Verbose,
    Debug,
    Trace,
    /// Warnings and errors only.
    Quiet,
}

impl LogPreset {
    fn directives(self) -> Vec<String> {
        let pairs: &[(&str, &str)] = match self {
            LogPreset::Production => &[
                ("followtrack::startup", "info"),
                ("followtrack::api", "info"),
                ("followtrack::cycle", "info"),
                ("followtrack::scheduler", "info"),
                ("followtrack::repair", "info"),
                ("followtrack::store", "info"),
                ("followtrack::provider", "warn"),
                ("followtrack::cache", "warn"),
                ("tower_http", "warn"),
            ],
            LogPreset::Verbose => &[
                ("followtrack", "info"),
                ("followtrack::cache", "info"),
                ("tower_http", "info"),
            ],
            LogPreset::Debug => &[
                ("followtrack", "debug"),
                ("followtrack::cache", "info"),
                ("tower_http", "debug"),
            ],
            LogPreset::Trace => &[("followtrack", "trace"), ("tower_http", "trace")],
            LogPreset::Quiet => &[("followtrack", "warn"), ("tower_http", "error")],
        };
        pairs
            .iter()
            .map(|(target, level)| format!("{}={}", target, level))
            .collect()
    }
}

/// Logging configuration built from CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub preset: LogPreset,
    /// Per-target level overrides, keyed by full target.
    pub overrides: BTreeMap<String, Level>,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn from_cli(
        verbose: bool,
        debug: bool,
        trace: bool,
        quiet: bool,
        log_overrides: Vec<String>,
        format: LogFormat,
    ) -> Self {
        let preset = if quiet {
            LogPreset::Quiet
        } else if trace {
            LogPreset::Trace
        } else if debug {
            LogPreset::Debug
        } else if verbose {
            LogPreset::Verbose
        } else {
            LogPreset::Production
        };

        // "cycle=debug,cache=trace" style, repeatable.
        let mut overrides = BTreeMap::new();
        for part in log_overrides.iter().flat_map(|s| s.split(',')) {
            let Some((target, level)) = part.split_once('=') else {
                continue;
            };
            if let Some(level) = parse_level(level.trim()) {
                overrides.insert(full_target(target.trim()), level);
            }
        }

        Self {
            preset,
            overrides,
            format,
        }
    }

    /// Filter directives for the preset with overrides appended.
    pub fn directives(&self) -> String {
        let mut directives = self.preset.directives();
        for (target, level) in &self.overrides {
            directives.push(format!("{}={}", target, level.as_str().to_lowercase()));
        }
        directives.join(",")
    }

    /// `RUST_LOG` when set, otherwise [`LogConfig::directives`].
    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }
        EnvFilter::try_new(self.directives()).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn full_target(target: &str) -> String {
    if target == "followtrack" || target.starts_with(TARGET_PREFIX) || target == "tower_http" {
        target.to_string()
    } else {
        format!("{}{}", TARGET_PREFIX, target)
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global subscriber.
pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).with_thread_ids(false))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
    }
}
