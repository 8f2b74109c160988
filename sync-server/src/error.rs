//! Error types for paperfeed-server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use paperfeed_client::{RemoteError, RenderError};
use std::path::PathBuf;

/// Errors surfaced by the trigger endpoint and the binary.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Missing or wrong `api-key` header.
    #[error("Missing api key!")]
    Unauthorized,

    /// A run is already executing.
    #[error("A sync run is already in progress")]
    RunInProgress,

    /// The task executing a run panicked or was aborted.
    #[error("sync run aborted: {0}")]
    RunAborted(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::RunInProgress => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ServerError::Unauthorized | ServerError::RunInProgress => {
                self.to_string()
            }
            _ => {
                tracing::error!("Sync trigger failed: {}", self);
                "Internal Server Error".to_string()
            }
        };

        (
            status,
            Json(serde_json::json!({
                "status": "Error",
                "message": message,
            })),
        )
            .into_response()
    }
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// User not found.
    #[error("user not found: {email}")]
    UserNotFound {
        /// The email that was not found.
        email: String,
    },

    /// A stored value could not be interpreted.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Failure to deliver one article.
#[derive(Debug, thiserror::Error)]
pub enum ArticleError {
    /// The page could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A remote call failed outside the commit retry loop.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Every commit attempt presented a stale generation.
    #[error("gave up after {attempts} conflicting commit attempt(s)")]
    SyncFailed {
        /// Attempts made.
        attempts: u32,
    },
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ServerError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ServerError::RunInProgress.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ServerError::Storage(StorageError::Migration("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthorized_message() {
        assert_eq!(ServerError::Unauthorized.to_string(), "Missing api key!");
    }
}
