//! Background tasks: the built-in cycle scheduler and the cache sweeper.

use crate::state::AppState;
use followtrack_core::TrackerError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Run a cycle every `interval`. The first run happens one interval after start.
pub fn spawn_cycle_scheduler(state: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    info!(
        target: "followtrack::scheduler",
        "Scheduler running a cycle every {}s",
        interval.as_secs()
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            run_scheduled_cycle(&state).await;
        }
    })
}

async fn run_scheduled_cycle(state: &AppState) {
    match state.cycle.run().await {
        Ok(summary) => info!(
            target: "followtrack::scheduler",
            "Scheduled cycle: {}/{} updated, {} errors, {} with new content",
            summary.updated,
            summary.total,
            summary.errors,
            summary.new_content_count
        ),
        Err(TrackerError::AlreadyRunning) => warn!(
            target: "followtrack::scheduler",
            "Skipping scheduled cycle: previous cycle still running"
        ),
        Err(e) => error!(target: "followtrack::scheduler", "Scheduled cycle failed: {}", e),
    }
}

/// Start whichever background tasks the configuration enables.
pub fn spawn_background_tasks(state: &Arc<AppState>) -> Vec<JoinHandle<()>> {
    let mut handles = vec![state.cache.spawn_sweeper(state.config.cache_sweep_interval())];
    match state.config.cycle_interval() {
        Some(interval) => handles.push(spawn_cycle_scheduler(state.clone(), interval)),
        None => info!(
            target: "followtrack::scheduler",
            "Built-in scheduler disabled; cycles run only via /api/cron/run-cycle"
        ),
    }
    handles
}
