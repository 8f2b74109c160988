//! Mock feed source for testing.

use super::{FeedError, FeedSource};
use async_trait::async_trait;
use paperfeed_types::FeedItem;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock feed source serving canned items per URL.
///
/// Unknown URLs fail with [`FeedError::Status`] 404.
#[derive(Debug, Default, Clone)]
pub struct MockFeedSource {
    inner: Arc<Mutex<MockFeedInner>>,
}

#[derive(Debug, Default)]
struct MockFeedInner {
    feeds: HashMap<String, Result<Vec<FeedItem>, String>>,
    fetched: Vec<String>,
}

impl MockFeedSource {
    /// Create an empty mock feed source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `items` for `url`.
    pub fn add_feed(&self, url: &str, items: Vec<FeedItem>) {
        let mut inner = self.inner.lock().unwrap();
        inner.feeds.insert(url.to_string(), Ok(items));
    }

    /// Make fetches of `url` fail with a request error.
    pub fn fail_feed(&self, url: &str, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.feeds.insert(url.to_string(), Err(reason.to_string()));
    }

    /// URLs fetched so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.fetched.clone()
    }
}

#[async_trait]
impl FeedSource for MockFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetched.push(url.to_string());

        match inner.feeds.get(url) {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(reason)) => Err(FeedError::Request {
                url: url.to_string(),
                reason: reason.clone(),
            }),
            None => Err(FeedError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
