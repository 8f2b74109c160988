//! Synchronizing one feed of one user.

use super::SyncService;
use chrono::{DateTime, Utc};
use paperfeed_client::{FeedError, RemoteTree};
use paperfeed_core::{select_items, FeedReport};
use paperfeed_types::{Feed, FeedItem};
use tokio_util::sync::CancellationToken;

impl SyncService {
    /// Fetch `feed`, select items newer than `watermark` and deliver them
    /// in feed order.
    ///
    /// One rendering context serves every article of the feed and is
    /// closed on every exit path. Once `cancel` fires no further article is
    /// started; the remaining items are reported as unattempted.
    #[tracing::instrument(skip_all, fields(feed = %feed.url))]
    pub async fn sync_feed(
        &self,
        feed: &Feed,
        watermark: Option<DateTime<Utc>>,
        remote: &dyn RemoteTree,
        cancel: &CancellationToken,
    ) -> FeedReport {
        let items = match self.fetch(&feed.url).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Skipping feed: {}", e);
                return FeedReport::failed(&feed.url, e);
            }
        };

        let fetched = items.len();
        let selected = select_items(items, watermark);
        tracing::debug!("{} of {} item(s) selected", selected.len(), fetched);

        let mut report = FeedReport::new(&feed.url);
        if selected.is_empty() {
            return report;
        }

        let mut context = match self.renderer.new_context().await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!("No rendering context: {}", e);
                return FeedReport::failed(&feed.url, e);
            }
        };

        let mut pending = selected.into_iter();
        while let Some(item) = pending.next() {
            if cancel.is_cancelled() {
                tracing::info!("Cancelled, leaving remaining items for the next run");
                report.unattempted.push(item);
                report.unattempted.extend(pending);
                break;
            }

            match self.sync_article(&item, remote, context.as_mut()).await {
                Ok(_) => report.synced.push(item),
                Err(e) => {
                    tracing::warn!("Article {} failed: {}", item.link, e);
                    report.failed.push(item);
                }
            }
        }

        if let Err(e) = context.close().await {
            tracing::warn!("Failed to close rendering context: {}", e);
        }

        report
    }

    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
        let timeout = self.settings.feed_timeout;
        match tokio::time::timeout(timeout, self.feeds.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Timeout(format!(
                "{url} did not answer within {timeout:?}"
            ))),
        }
    }
}
