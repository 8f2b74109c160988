//! Sync trigger endpoint.

use crate::error::ServerError;
use crate::server::{PaperFeed, Trigger, API_KEY_HEADER};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use paperfeed_core::RunSummary;
use serde::Serialize;
use std::sync::Arc;

/// Successful trigger response.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerResponse {
    /// Always `"Success"`.
    pub status: &'static str,
    /// One-line summary.
    pub message: String,
    /// Run counts.
    pub stats: RunSummary,
}

/// Run a sync when the request carries the configured `api-key`.
pub async fn sync_handler(
    Extension(app): Extension<Arc<PaperFeed>>,
    headers: HeaderMap,
) -> Result<Json<TriggerResponse>, ServerError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if !app.authorize(presented) {
        tracing::warn!("Rejected sync trigger without a valid api key");
        return Err(ServerError::Unauthorized);
    }

    let report = app.trigger(Trigger::Http).await?;

    Ok(Json(TriggerResponse {
        status: "Success",
        message: report.summary.message(),
        stats: report.summary,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_serializes() {
        let response = TriggerResponse {
            status: "Success",
            message: RunSummary::default().message(),
            stats: RunSummary::default(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"Success\""));
        assert!(json.contains("\"failed_articles\":0"));
    }
}
