//! Main paperfeed server coordination.
//!
//! `PaperFeed` owns the sync service, the trigger credential and the
//! shutdown token every run listens on.

use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::sync::{RunReport, SyncService};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Header carrying the trigger credential.
pub const API_KEY_HEADER: &str = "api-key";

/// Where a run was requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The HTTP endpoint.
    Http,
    /// The periodic scheduler.
    Schedule,
    /// The command line.
    Cli,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Http => write!(f, "http"),
            Trigger::Schedule => write!(f, "schedule"),
            Trigger::Cli => write!(f, "cli"),
        }
    }
}

/// Run counters since startup.
#[derive(Debug, Default)]
pub struct RunMetrics {
    /// Runs that completed.
    pub runs_total: AtomicU64,
    /// Triggers rejected because a run was in progress.
    pub runs_rejected: AtomicU64,
    /// Runs that could not start (e.g. datastore unavailable).
    pub runs_failed: AtomicU64,
}

/// Main server state.
pub struct PaperFeed {
    config: Config,
    service: Arc<SyncService>,
    shutdown: CancellationToken,
    metrics: RunMetrics,
}

impl std::fmt::Debug for PaperFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperFeed")
            .field("config", &self.config)
            .field("service", &self.service)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl PaperFeed {
    /// Create server state. Runs stop starting new work once `shutdown` fires.
    pub fn new(config: Config, service: Arc<SyncService>, shutdown: CancellationToken) -> Self {
        Self {
            config,
            service,
            shutdown,
            metrics: RunMetrics::default(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the sync service.
    pub fn service(&self) -> &Arc<SyncService> {
        &self.service
    }

    /// Get run counters.
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// The token that cancels runs on shutdown.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Whether `presented` matches the configured trigger credential.
    ///
    /// Always false when no credential is configured.
    pub fn authorize(&self, presented: Option<&str>) -> bool {
        match (self.config.server.api_key.as_deref(), presented) {
            (Some(expected), Some(presented)) => !expected.is_empty() && expected == presented,
            _ => false,
        }
    }

    /// Execute one run.
    ///
    /// The run executes on its own task, so dropping the returned future
    /// (e.g. a disconnected HTTP client) does not interrupt it.
    pub async fn trigger(&self, source: Trigger) -> Result<RunReport> {
        tracing::debug!("Run requested ({})", source);

        let service = Arc::clone(&self.service);
        let shutdown = self.shutdown.clone();
        let task = tokio::spawn(async move { service.run(&shutdown).await });

        match task.await.map_err(ServerError::from).and_then(|result| result) {
            Ok(report) => {
                self.metrics.runs_total.fetch_add(1, Ordering::Relaxed);
                Ok(report)
            }
            Err(ServerError::RunInProgress) => {
                self.metrics.runs_rejected.fetch_add(1, Ordering::Relaxed);
                tracing::info!("Run requested ({}) while another is in progress", source);
                Err(ServerError::RunInProgress)
            }
            Err(e) => {
                self.metrics.runs_failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Run ({}) could not start: {}", source, e);
                Err(e)
            }
        }
    }
}
