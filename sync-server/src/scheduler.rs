//! Periodic sync runs.
//!
//! Triggers a run every `sync.interval_secs` until shutdown. A tick that
//! lands while a run is still executing is skipped.

use crate::error::ServerError;
use crate::server::{PaperFeed, Trigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Spawn the scheduler task.
///
/// The task ends when the server's shutdown token fires, or immediately
/// when the interval is 0.
pub fn spawn_scheduler(app: Arc<PaperFeed>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval_secs = app.config().sync.interval_secs;
        if interval_secs == 0 {
            tracing::info!("Scheduled runs disabled");
            return;
        }

        tracing::info!("Scheduler started (interval: {}s)", interval_secs);

        let shutdown = app.shutdown_token().clone();
        let mut timer = interval(Duration::from_secs(interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Scheduler stopped");
                    return;
                }
                _ = timer.tick() => {}
            }

            match app.trigger(Trigger::Schedule).await {
                Ok(report) => {
                    tracing::debug!("Scheduled run: {}", report.summary.message());
                }
                Err(ServerError::RunInProgress) => {
                    tracing::debug!("Scheduled run skipped, another run is in progress");
                }
                Err(e) => {
                    tracing::error!("Scheduled run error: {}", e);
                }
            }
        }
    })
}
