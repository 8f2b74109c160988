//! HTTP endpoints for paperfeed.
//!
//! Provides the sync trigger and a health check.

pub mod health;
pub mod trigger;

use crate::server::PaperFeed;
use axum::{routing::get, Extension, Router};
use std::sync::Arc;

pub use health::HealthStatus;
pub use trigger::TriggerResponse;

/// Build the HTTP router with all endpoints.
pub fn build_router(app: Arc<PaperFeed>) -> Router {
    Router::new()
        .route(
            "/api/sync",
            get(trigger::sync_handler).post(trigger::sync_handler),
        )
        .route("/health", get(health::health_handler))
        .layer(Extension(app))
}
