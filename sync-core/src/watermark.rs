//! Watermark tracking for paperfeed.
//!
//! The watermark is the publish time of the newest article a user has
//! received. It gates which items the next run considers (see
//! [`select_items`](crate::select_items)).
//!
//! The tracker folds the items synchronized during one run, in any order,
//! and resolves the value to persist once every feed of the user is done.
//! Selected items that were not delivered hold the watermark strictly below
//! their publish time so the next run selects them again.

use chrono::{DateTime, Duration, Utc};
use paperfeed_types::FeedItem;

/// Gap kept below a held-back item. Stored watermarks have millisecond
/// precision.
const HOLD_BACK_GAP_MS: i64 = 1;

/// Folds synchronized items into the next watermark.
///
/// Completion order across feeds is irrelevant: the result is a max
/// reduction over delivered publish times, capped by a min reduction over
/// held-back ones.
#[derive(Debug, Clone, Default)]
pub struct WatermarkTracker {
    /// Newest publish time seen among synchronized items.
    newest: Option<DateTime<Utc>>,
    /// Oldest publish time among selected items that were not delivered.
    oldest_held_back: Option<DateTime<Utc>>,
    /// Number of items observed.
    observed: usize,
}

impl WatermarkTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successfully synchronized item.
    pub fn observe(&mut self, item: &FeedItem) {
        self.observed += 1;
        self.newest = Some(match self.newest {
            Some(current) if current >= item.pub_date => current,
            _ => item.pub_date,
        });
    }

    /// Record a batch of synchronized items.
    pub fn observe_all<'a>(&mut self, items: impl IntoIterator<Item = &'a FeedItem>) {
        for item in items {
            self.observe(item);
        }
    }

    /// Record a selected item that failed or was never attempted.
    pub fn hold_back(&mut self, item: &FeedItem) {
        self.oldest_held_back = Some(match self.oldest_held_back {
            Some(current) if current <= item.pub_date => current,
            _ => item.pub_date,
        });
    }

    /// Record a batch of held-back items.
    pub fn hold_back_all<'a>(&mut self, items: impl IntoIterator<Item = &'a FeedItem>) {
        for item in items {
            self.hold_back(item);
        }
    }

    /// Newest publish time observed, if any item was synchronized.
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.newest
    }

    /// Number of items observed.
    pub fn observed(&self) -> usize {
        self.observed
    }

    /// Whether any selected item was left undelivered.
    pub fn is_holding_back(&self) -> bool {
        self.oldest_held_back.is_some()
    }

    /// The watermark to persist after a completed run.
    ///
    /// A run that selected nothing counts as fully caught up, so the
    /// watermark moves to the run's start time. Held-back items disable
    /// that fallback.
    pub fn resolve(&self, run_started: DateTime<Utc>) -> DateTime<Utc> {
        self.resolve_partial().unwrap_or(run_started)
    }

    /// The watermark to persist after an interrupted run.
    ///
    /// There is no start-time fallback. `None` means nothing should be
    /// written.
    pub fn resolve_partial(&self) -> Option<DateTime<Utc>> {
        let ceiling = self
            .oldest_held_back
            .map(|oldest| oldest - Duration::milliseconds(HOLD_BACK_GAP_MS));

        match (self.newest, ceiling) {
            (Some(newest), Some(ceiling)) => Some(newest.min(ceiling)),
            (newest, ceiling) => newest.or(ceiling),
        }
    }
}
