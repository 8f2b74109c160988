//! Feed source abstraction.
//!
//! A feed source turns a feed URL into the ordered items it currently
//! publishes. Items without a link or a publish time are never returned:
//! they cannot be rendered or placed against a watermark.
//!
//! # Design
//!
//! - [`HttpFeedSource`] fetches over HTTP and parses RSS, Atom and JSON Feed
//! - [`MockFeedSource`] serves canned items for tests

mod http;
mod mock;

pub use http::{parse_feed, HttpFeedSource};
pub use mock::MockFeedSource;

use async_trait::async_trait;
use paperfeed_types::FeedItem;
use thiserror::Error;

/// Feed fetch errors.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The request could not be sent or the body not read.
    #[error("request failed for {url}: {reason}")]
    Request {
        /// Feed URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("unexpected status {status} for {url}")]
    Status {
        /// Feed URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The payload is not a feed.
    #[error("unparseable feed: {0}")]
    Parse(String),

    /// The fetch exceeded its time bound.
    #[error("feed fetch timed out: {0}")]
    Timeout(String),
}

/// Fetches and parses feeds.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the items of the feed at `url`, in source order.
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FeedError>;
}
