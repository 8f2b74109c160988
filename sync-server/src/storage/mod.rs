//! Storage layer for paperfeed.
//!
//! Holds users, their feed subscriptions and device credentials, and each
//! user's sync watermark.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paperfeed_types::User;

/// Trait for datastore backends.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Load every user together with their feeds and device.
    async fn list_users(&self) -> Result<Vec<User>, StorageError>;

    /// Advance a user's watermark.
    ///
    /// The stored value never moves backwards: a `date` older than the
    /// current watermark leaves it unchanged. Returns the watermark now
    /// stored.
    async fn update_last_sync_date(
        &self,
        email: &str,
        date: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StorageError>;
}
