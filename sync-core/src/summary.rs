//! Per-feed and per-user reports, folded into a run summary.
//!
//! Failures are recorded at the narrowest unit that failed (article, feed,
//! user) and counted next to the successes instead of aborting siblings.

use chrono::{DateTime, Utc};
use paperfeed_types::FeedItem;
use serde::{Deserialize, Serialize};

/// Outcome of synchronizing one feed of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedReport {
    /// Feed URL.
    pub url: String,
    /// Items whose documents were committed, in feed order.
    pub synced: Vec<FeedItem>,
    /// Items that were selected but failed to synchronize.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FeedItem>,
    /// Items that were selected but not attempted because the run was
    /// cancelled.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unattempted: Vec<FeedItem>,
    /// Feed-level failure (fetch, parse, rendering context).
    pub error: Option<String>,
}

impl FeedReport {
    /// A feed that has not synchronized anything yet.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            synced: Vec::new(),
            failed: Vec::new(),
            unattempted: Vec::new(),
            error: None,
        }
    }

    /// A feed that failed before any article was attempted.
    pub fn failed(url: &str, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(url)
        }
    }

    /// Whether the feed itself failed.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Whether at least one article was synchronized.
    pub fn has_activity(&self) -> bool {
        !self.synced.is_empty()
    }

    /// Number of selected articles that failed.
    pub fn failed_articles(&self) -> usize {
        self.failed.len()
    }

    /// Selected items that were not delivered and must stay eligible.
    pub fn held_back(&self) -> impl Iterator<Item = &FeedItem> {
        self.failed.iter().chain(self.unattempted.iter())
    }
}

/// How a user's synchronization ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UserStatus {
    /// Feeds were processed and the watermark was persisted.
    Synced {
        /// The watermark written to the datastore, if one was written.
        watermark: Option<DateTime<Utc>>,
    },
    /// Nothing was attempted (e.g. no linked device).
    Skipped {
        /// Why the user was skipped.
        reason: String,
    },
    /// The user's run failed (session, watermark persistence).
    Failed {
        /// Error description.
        error: String,
    },
}

/// Outcome of synchronizing one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserReport {
    /// User identity.
    pub email: String,
    /// Final status.
    #[serde(flatten)]
    pub status: UserStatus,
    /// Per-feed reports (empty when skipped or failed before fan-out).
    pub feeds: Vec<FeedReport>,
}

impl UserReport {
    /// A user whose feeds ran and whose watermark was persisted.
    pub fn synced(email: &str, feeds: Vec<FeedReport>, watermark: Option<DateTime<Utc>>) -> Self {
        Self {
            email: email.to_string(),
            status: UserStatus::Synced { watermark },
            feeds,
        }
    }

    /// A user that was not attempted.
    pub fn skipped(email: &str, reason: impl ToString) -> Self {
        Self {
            email: email.to_string(),
            status: UserStatus::Skipped {
                reason: reason.to_string(),
            },
            feeds: Vec::new(),
        }
    }

    /// A user whose run failed. `feeds` holds whatever ran before the failure.
    pub fn failed(email: &str, feeds: Vec<FeedReport>, error: impl ToString) -> Self {
        Self {
            email: email.to_string(),
            status: UserStatus::Failed {
                error: error.to_string(),
            },
            feeds,
        }
    }

    /// Number of articles synchronized.
    pub fn articles(&self) -> usize {
        self.feeds.iter().map(|feed| feed.synced.len()).sum()
    }
}

/// Aggregated counts of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Users processed (every known user, including skipped ones).
    pub users: usize,
    /// Feeds that synchronized at least one article.
    pub feeds: usize,
    /// Articles whose documents were committed.
    pub articles: usize,
    /// Users skipped without error.
    pub skipped_users: usize,
    /// Users whose run failed.
    pub failed_users: usize,
    /// Feeds that failed as a whole.
    pub failed_feeds: usize,
    /// Articles that failed inside otherwise healthy feeds.
    pub failed_articles: usize,
}

impl RunSummary {
    /// Fold user reports into a summary.
    ///
    /// Articles of a user whose watermark failed to persist still count:
    /// their documents are in the remote tree.
    pub fn from_reports(reports: &[UserReport]) -> Self {
        let mut summary = Self {
            users: reports.len(),
            ..Self::default()
        };

        for report in reports {
            match report.status {
                UserStatus::Synced { .. } => {}
                UserStatus::Skipped { .. } => summary.skipped_users += 1,
                UserStatus::Failed { .. } => summary.failed_users += 1,
            }

            for feed in &report.feeds {
                if feed.has_activity() {
                    summary.feeds += 1;
                }
                if feed.is_failed() {
                    summary.failed_feeds += 1;
                }
                summary.articles += feed.synced.len();
                summary.failed_articles += feed.failed_articles();
            }
        }

        summary
    }

    /// Whether anything failed during the run.
    pub fn has_failures(&self) -> bool {
        self.failed_users + self.failed_feeds + self.failed_articles > 0
    }

    /// Human-readable one-line summary.
    pub fn message(&self) -> String {
        format!(
            "Successfully synced {} feed(s) - {} article(s) for {} user(s)",
            self.feeds, self.articles, self.users
        )
    }
}
