//! HTTP feed source backed by reqwest and feed-rs.

use super::{FeedError, FeedSource};
use async_trait::async_trait;
use feed_rs::model::Entry;
use paperfeed_types::FeedItem;
use std::time::Duration;

/// Fetches feeds over HTTP.
///
/// Every request is bounded by the timeout given at construction.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    /// Create a feed source whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("paperfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::Request {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
        let request_error = |e: reqwest::Error| {
            if e.is_timeout() {
                FeedError::Timeout(url.to_string())
            } else {
                FeedError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(request_error)?;
        let items = parse_feed(&body)?;

        tracing::debug!("Fetched {} item(s) from {}", items.len(), url);
        Ok(items)
    }
}

/// Parse a feed document into items, dropping entries without a link or a
/// publish time.
pub fn parse_feed(body: &[u8]) -> Result<Vec<FeedItem>, FeedError> {
    let feed = feed_rs::parser::parse(body).map_err(|e| FeedError::Parse(e.to_string()))?;
    Ok(feed.entries.into_iter().filter_map(item_from_entry).collect())
}

fn item_from_entry(entry: Entry) -> Option<FeedItem> {
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())?;
    let pub_date = entry.published.or(entry.updated)?;

    Some(FeedItem {
        link,
        pub_date,
        title: entry.title.map(|t| t.content),
    })
}
