//! Feed item selection against a user's watermark.
//!
//! A user that has never been synchronized gets only the newest item of
//! each feed, so subscribing to a feed does not backfill its whole history.
//! After that, every item published strictly after the watermark is
//! eligible.

use chrono::{DateTime, Utc};
use paperfeed_types::FeedItem;

/// Select the items of one feed that should be synchronized.
///
/// Source order is preserved for the watermark case. For the first run the
/// newest item is chosen; on equal publish times the earliest in source
/// order wins.
pub fn select_items(items: Vec<FeedItem>, watermark: Option<DateTime<Utc>>) -> Vec<FeedItem> {
    match watermark {
        Some(since) => items
            .into_iter()
            .filter(|item| item.pub_date > since)
            .collect(),
        None => newest(items).into_iter().collect(),
    }
}

fn newest(items: Vec<FeedItem>) -> Option<FeedItem> {
    items.into_iter().reduce(|best, item| {
        if item.pub_date > best.pub_date {
            item
        } else {
            best
        }
    })
}
