//! The sync engine.
//!
//! A run walks every user, every feed of that user and every new article
//! of that feed:
//!
//! ```text
//! run ──► user ──┬─► feed ──► article ──► article ──► ...   (sequential)
//!                ├─► feed ──► article ──► ...
//!                └─► feed ...
//!        user ───► ...                                      (concurrent)
//! ```
//!
//! Users and feeds fan out concurrently; articles of one feed run in feed
//! order on the feed's own rendering context. Each level collects the
//! outcomes of the level below into a report, so a failure is contained to
//! the article, feed or user it happened in.

mod article;
mod feed;
mod run;
mod user;

pub use run::{LastRun, RunReport};

use crate::config::Config;
use crate::storage::Datastore;
use paperfeed_client::{FeedSource, RemoteConnector, RenderEngine, RenderOptions};
use paperfeed_core::CommitPolicy;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tunables of the sync engine.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Print options for every article.
    pub render: RenderOptions,
    /// Bound on root commit attempts per article.
    pub commit: CommitPolicy,
    /// Feed fetch timeout.
    pub feed_timeout: Duration,
    /// Per-article render timeout.
    pub render_timeout: Duration,
    /// Per-call remote store timeout.
    pub remote_timeout: Duration,
    /// Users synchronized at once (0 = unbounded).
    pub max_concurrent_users: usize,
}

impl SyncSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            render: config.render.clone(),
            commit: CommitPolicy::new(config.sync.commit_attempts),
            feed_timeout: config.timeouts.feed(),
            render_timeout: config.timeouts.render(),
            remote_timeout: config.timeouts.remote(),
            max_concurrent_users: config.sync.max_concurrent_users,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Runs synchronizations against injected capabilities.
///
/// Only one run executes at a time; the rendering engine is shared by
/// every feed of every user in a run.
pub struct SyncService {
    datastore: Arc<dyn Datastore>,
    feeds: Arc<dyn FeedSource>,
    renderer: Arc<dyn RenderEngine>,
    connector: Arc<dyn RemoteConnector>,
    settings: SyncSettings,
    running: tokio::sync::Mutex<()>,
    last_run: Mutex<Option<LastRun>>,
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SyncService {
    /// Create a service.
    pub fn new(
        datastore: Arc<dyn Datastore>,
        feeds: Arc<dyn FeedSource>,
        renderer: Arc<dyn RenderEngine>,
        connector: Arc<dyn RemoteConnector>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            datastore,
            feeds,
            renderer,
            connector,
            settings,
            running: tokio::sync::Mutex::new(()),
            last_run: Mutex::new(None),
        }
    }

    /// Engine settings.
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// The shared rendering engine.
    pub fn renderer(&self) -> &Arc<dyn RenderEngine> {
        &self.renderer
    }
}
