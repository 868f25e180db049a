//! followtrack server - polls tracked social accounts and serves their history.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use followtrack_core::HistoryStore;
use followtrack_server::{logging, routes, scheduler, state};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use logging::{LogConfig, LogFormat};

/// followtrack - social account metrics tracker.
#[derive(Parser, Debug)]
#[command(name = "followtrack-server")]
#[command(about = "Tracks follower, post and engagement counts of social accounts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override port from config
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Enable verbose logging (INFO level for every area)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long, global = true)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "cycle=debug" or "provider=trace").
    /// Can be specified multiple times. Targets are prefixed with "followtrack::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL", global = true)]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Run one polling cycle and print its summary as JSON
    RunCycle,
    /// Rebuild change series from stored totals
    Repair {
        /// Repair a single account instead of all of them
        #[arg(long, value_name = "ID")]
        account: Option<Uuid>,
    },
}

use followtrack_server::config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env();
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.validate()?;

    tracing::info!(
        target: "followtrack::startup",
        "Loaded configuration (port: {}, zone: {}, db: {})",
        config.port,
        config.time_zone,
        config.db_path.display()
    );

    let state = Arc::new(AppState::new(config.clone())?);
    tracing::info!(target: "followtrack::startup", "Initialized application state");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, &config).await,
        Command::RunCycle => {
            let summary = state.cycle.run().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Repair { account: Some(id) } => {
            if state.store.current_metrics(id)?.is_none() {
                bail!("account {} not found", id);
            }
            let report = state.reconciler.recompute_change_series(id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Repair { account: None } => {
            let run = state.reconciler.recompute_all()?;
            println!("{}", serde_json::to_string_pretty(&run)?);
            Ok(())
        }
    }
}

async fn serve(state: Arc<AppState>, config: &Config) -> Result<()> {
    let _tasks = scheduler::spawn_background_tasks(&state);

    let app = routes::router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(target: "followtrack::startup", "Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
