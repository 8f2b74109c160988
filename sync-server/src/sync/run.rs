//! One run over every user.

use super::SyncService;
use crate::error::{Result, ServerError};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use paperfeed_core::{RunSummary, UserReport};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Everything one run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall time in milliseconds.
    pub elapsed_ms: u64,
    /// Aggregated counts.
    pub summary: RunSummary,
    /// Per-user outcomes.
    pub users: Vec<UserReport>,
}

/// Summary of the most recent finished run, for health checks.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LastRun {
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Wall time in milliseconds.
    pub elapsed_ms: u64,
    /// Aggregated counts.
    pub summary: RunSummary,
}

impl SyncService {
    /// Synchronize every user once.
    ///
    /// Fails with [`ServerError::RunInProgress`] when another run is
    /// executing, and with a storage error when users cannot be listed.
    /// Everything below that is reported in the summary instead.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| ServerError::RunInProgress)?;

        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!("Sync run started");

        let users = self.datastore.list_users().await?;

        let limit = self.settings.max_concurrent_users;
        let semaphore = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));

        let reports = join_all(users.iter().map(|user| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = match &semaphore {
                    Some(semaphore) => match semaphore.acquire().await {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            return UserReport::failed(
                                &user.email,
                                Vec::new(),
                                "Semaphore closed unexpectedly",
                            )
                        }
                    },
                    None => None,
                };
                self.sync_user(user, started_at, cancel).await
            }
        }))
        .await;

        let summary = RunSummary::from_reports(&reports);
        let elapsed_ms = clock.elapsed().as_millis() as u64;

        if summary.has_failures() {
            tracing::warn!(
                "Sync run finished in {}ms with failures: {} user(s), {} feed(s), {} article(s) failed",
                elapsed_ms,
                summary.failed_users,
                summary.failed_feeds,
                summary.failed_articles
            );
        }
        tracing::info!("{} in {}ms", summary.message(), elapsed_ms);

        if let Ok(mut last_run) = self.last_run.lock() {
            *last_run = Some(LastRun {
                finished_at: Utc::now(),
                elapsed_ms,
                summary,
            });
        }

        Ok(RunReport {
            started_at,
            elapsed_ms,
            summary,
            users: reports,
        })
    }

    /// Whether a run is executing right now.
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// The most recent finished run.
    pub fn last_run(&self) -> Option<LastRun> {
        self.last_run.lock().ok().and_then(|last_run| *last_run)
    }
}
