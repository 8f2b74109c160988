//! Health check endpoint.

use crate::server::PaperFeed;
use crate::sync::LastRun;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Whether a run is executing.
    pub running: bool,
    /// Runs completed since startup.
    pub runs_total: u64,
    /// The most recent finished run.
    pub last_run: Option<LastRun>,
}

/// Health check handler.
pub async fn health_handler(Extension(app): Extension<Arc<PaperFeed>>) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        running: app.service().is_running(),
        runs_total: app.metrics().runs_total.load(Ordering::Relaxed),
        last_run: app.service().last_run(),
    })
}
