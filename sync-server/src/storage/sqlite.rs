//! SQLite storage backend for paperfeed.

use super::Datastore;
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paperfeed_types::{Device, Feed, User};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// SQLite-based datastore.
///
/// Uses WAL mode for concurrent reads/writes. Watermarks are stored as
/// unix milliseconds.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage").finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let path_str = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;

        let options = SqliteConnectOptions::from_str(path_str)
            .map_err(StorageError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                email TEXT PRIMARY KEY,
                last_sync_date INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_email TEXT NOT NULL REFERENCES users(email) ON DELETE CASCADE,
                url TEXT NOT NULL,
                UNIQUE(user_email, url)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                user_email TEXT PRIMARY KEY REFERENCES users(email) ON DELETE CASCADE,
                token TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_feeds_user ON feeds(user_email)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Migration(e.to_string()))?;
        }

        Ok(())
    }

    /// Register a user with no watermark.
    ///
    /// Registering an existing email is a no-op.
    pub async fn insert_user(&self, email: &str) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO users (email) VALUES (?1) ON CONFLICT(email) DO NOTHING")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;
        Ok(())
    }

    /// Subscribe a user to a feed.
    pub async fn add_feed(&self, email: &str, url: &str) -> Result<(), StorageError> {
        self.ensure_user(email).await?;
        sqlx::query(
            "INSERT INTO feeds (user_email, url) VALUES (?1, ?2) ON CONFLICT(user_email, url) DO NOTHING",
        )
        .bind(email)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;
        Ok(())
    }

    /// Link a device to a user, replacing any previous one.
    pub async fn link_device(&self, email: &str, token: &str) -> Result<(), StorageError> {
        self.ensure_user(email).await?;
        sqlx::query(
            r#"
            INSERT INTO devices (user_email, token)
            VALUES (?1, ?2)
            ON CONFLICT(user_email) DO UPDATE SET token = ?2
            "#,
        )
        .bind(email)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;
        Ok(())
    }

    async fn ensure_user(&self, email: &str) -> Result<(), StorageError> {
        let exists: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        match exists {
            Some(_) => Ok(()),
            None => Err(StorageError::UserNotFound {
                email: email.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Datastore for SqliteStorage {
    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let users = sqlx::query_as::<_, UserRow>(
            "SELECT email, last_sync_date FROM users ORDER BY email ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        // One query per table, joined in memory (avoids N+1)
        let feeds = sqlx::query_as::<_, FeedRow>(
            "SELECT user_email, url FROM feeds ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        let devices = sqlx::query_as::<_, DeviceRow>("SELECT user_email, token FROM devices")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        let mut feeds_by_user: HashMap<String, Vec<Feed>> = HashMap::new();
        for row in feeds {
            feeds_by_user
                .entry(row.user_email)
                .or_default()
                .push(Feed::new(&row.url));
        }
        let mut devices_by_user: HashMap<String, Device> = devices
            .into_iter()
            .map(|row| (row.user_email, Device::new(&row.token)))
            .collect();

        users
            .into_iter()
            .map(|row| {
                let mut user: User = row.try_into()?;
                user.feeds = feeds_by_user.remove(&user.email).unwrap_or_default();
                user.device = devices_by_user.remove(&user.email);
                Ok(user)
            })
            .collect()
    }

    async fn update_last_sync_date(
        &self,
        email: &str,
        date: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StorageError> {
        let stored: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET last_sync_date = CASE
                WHEN last_sync_date IS NULL OR last_sync_date < ?2 THEN ?2
                ELSE last_sync_date
            END
            WHERE email = ?1
            RETURNING last_sync_date
            "#,
        )
        .bind(email)
        .bind(date.timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        let millis = stored.ok_or_else(|| StorageError::UserNotFound {
            email: email.to_string(),
        })?;
        from_millis(millis)
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp out of range: {millis}")))
}

/// Internal row types for SQLite queries.
#[derive(sqlx::FromRow)]
struct UserRow {
    email: String,
    last_sync_date: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct FeedRow {
    user_email: String,
    url: String,
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    user_email: String,
    token: String,
}

impl TryFrom<UserRow> for User {
    type Error = StorageError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let mut user = User::new(&row.email);
        if let Some(millis) = row.last_sync_date {
            user = user.with_last_sync_date(from_millis(millis)?);
        }
        Ok(user)
    }
}
