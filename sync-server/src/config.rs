//! Configuration loading for paperfeed.
//!
//! Configuration is loaded from a TOML file (default: `paperfeed.toml`).
//! Every field has a default, so an empty file is a valid configuration.

use paperfeed_client::RenderOptions;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that overrides `server.api_key`.
pub const API_KEY_ENV: &str = "PAPERFEED_API_KEY";

/// Root configuration for paperfeed.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Sync run configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Network time bounds.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// PDF rendering options.
    #[serde(default)]
    pub render: RenderOptions,
    /// Remote document store endpoints.
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// HTTP server configuration.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP server (default: 0.0.0.0:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Shared secret expected in the `api-key` header.
    ///
    /// With no key configured every trigger is rejected.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_address", &self.bind_address)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Sync run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Seconds between scheduled runs (default: 3600, 0 disables).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Root commit attempts per article before giving up (default: 3).
    #[serde(default = "default_commit_attempts")]
    pub commit_attempts: u32,
    /// Users synchronized at once (default: 0 = unbounded).
    #[serde(default)]
    pub max_concurrent_users: usize,
}

/// Network time bounds, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    /// Feed fetch timeout (default: 30).
    #[serde(default = "default_feed_secs")]
    pub feed_secs: u64,
    /// Per-article render timeout (default: 120).
    #[serde(default = "default_render_secs")]
    pub render_secs: u64,
    /// Per-call remote store timeout (default: 60).
    #[serde(default = "default_remote_secs")]
    pub remote_secs: u64,
}

impl TimeoutsConfig {
    /// Feed fetch timeout.
    pub fn feed(&self) -> Duration {
        Duration::from_secs(self.feed_secs)
    }

    /// Render timeout.
    pub fn render(&self) -> Duration {
        Duration::from_secs(self.render_secs)
    }

    /// Remote call timeout.
    pub fn remote(&self) -> Duration {
        Duration::from_secs(self.remote_secs)
    }
}

/// Remote document store endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Token service base URL.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Sync service base URL.
    #[serde(default = "default_sync_url")]
    pub sync_url: String,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("paperfeed.db")
}

fn default_interval_secs() -> u64 {
    3600 // 1 hour
}

fn default_commit_attempts() -> u32 {
    paperfeed_core::DEFAULT_COMMIT_ATTEMPTS
}

fn default_feed_secs() -> u64 {
    30
}

fn default_render_secs() -> u64 {
    120
}

fn default_remote_secs() -> u64 {
    60
}

fn default_auth_url() -> String {
    "https://webapp-prod.cloud.remarkable.engineering".to_string()
}

fn default_sync_url() -> String {
    "https://internal.cloud.remarkable.com".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            commit_attempts: default_commit_attempts(),
            max_concurrent_users: 0,
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            feed_secs: default_feed_secs(),
            render_secs: default_render_secs(),
            remote_secs: default_remote_secs(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            sync_url: default_sync_url(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            sync: SyncConfig::default(),
            timeouts: TimeoutsConfig::default(),
            render: RenderOptions::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Replace the API key with the value of [`API_KEY_ENV`], if set.
    pub fn apply_env(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.server.api_key = Some(key);
            }
        }
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
