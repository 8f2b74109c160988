//! Synchronizing every feed of one user.

use super::SyncService;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use paperfeed_core::{UserReport, WatermarkTracker};
use paperfeed_types::User;
use tokio_util::sync::CancellationToken;

impl SyncService {
    /// Deliver new articles from all of `user`'s feeds, then advance the
    /// user's watermark.
    ///
    /// The watermark becomes the newest publish time delivered in this run,
    /// or `run_started` when nothing was selected. It never passes a
    /// selected item that failed or was left unattempted, so those items
    /// are selected again by the next run.
    #[tracing::instrument(skip_all, fields(user = %user.email))]
    pub async fn sync_user(
        &self,
        user: &User,
        run_started: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> UserReport {
        if cancel.is_cancelled() {
            return UserReport::skipped(&user.email, "run cancelled");
        }

        let Some(device) = &user.device else {
            tracing::info!("No device linked, skipping");
            return UserReport::skipped(&user.email, "no device linked");
        };

        let remote = match self.connector.connect(device).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!("Could not open remote session: {}", e);
                return UserReport::failed(&user.email, Vec::new(), e);
            }
        };

        let feeds = join_all(user.feeds.iter().map(|feed| {
            self.sync_feed(feed, user.last_sync_date, remote.as_ref(), cancel)
        }))
        .await;

        let mut tracker = WatermarkTracker::new();
        for feed in &feeds {
            tracker.observe_all(&feed.synced);
            tracker.hold_back_all(feed.held_back());
        }
        if tracker.is_holding_back() {
            tracing::info!("Undelivered articles remain, watermark held below them");
        }

        let watermark = if cancel.is_cancelled() {
            tracker.resolve_partial()
        } else {
            Some(tracker.resolve(run_started))
        };

        let Some(watermark) = watermark else {
            tracing::info!("Cancelled before any article was selected, watermark unchanged");
            return UserReport::synced(&user.email, feeds, None);
        };

        match self
            .datastore
            .update_last_sync_date(&user.email, watermark)
            .await
        {
            Ok(stored) => {
                tracing::info!(
                    "Delivered {} article(s) from {} feed(s), watermark {}",
                    tracker.observed(),
                    feeds.len(),
                    stored
                );
                UserReport::synced(&user.email, feeds, Some(stored))
            }
            Err(e) => {
                tracing::error!("Failed to persist watermark: {}", e);
                UserReport::failed(&user.email, feeds, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Datastore;
    use crate::sync::fixtures::Harness;
    use chrono::TimeZone;
    use paperfeed_core::UserStatus;
    use paperfeed_types::FeedItem;

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    async fn stored_watermark(harness: &Harness, email: &str) -> Option<DateTime<Utc>> {
        harness
            .storage
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .find(|u| u.email == email)
            .and_then(|u| u.last_sync_date)
    }

    #[tokio::test]
    async fn watermark_is_newest_delivered_across_feeds() {
        let harness = Harness::new().await;
        harness.storage.insert_user("a@example.com").await.unwrap();
        let tree = harness.connector.add_device("token");
        harness.feeds.add_feed(
            "https://one",
            vec![FeedItem::new("https://one/1", date(3))],
        );
        harness.feeds.add_feed(
            "https://two",
            vec![FeedItem::new("https://two/1", date(7))],
        );

        let user = User::new("a@example.com")
            .with_feed("https://one")
            .with_feed("https://two")
            .with_device("token")
            .with_last_sync_date(date(1));

        let report = harness
            .service
            .sync_user(&user, date(20), &CancellationToken::new())
            .await;

        assert_eq!(report.articles(), 2);
        assert_eq!(tree.root_entries().len(), 2);
        assert_eq!(
            report.status,
            UserStatus::Synced {
                watermark: Some(date(7))
            }
        );
        assert_eq!(stored_watermark(&harness, "a@example.com").await, Some(date(7)));
    }

    #[tokio::test]
    async fn nothing_delivered_moves_watermark_to_run_start() {
        let harness = Harness::new().await;
        harness.storage.insert_user("a@example.com").await.unwrap();
        harness.connector.add_device("token");
        harness.feeds.add_feed("https://one", Vec::new());

        let user = User::new("a@example.com")
            .with_feed("https://one")
            .with_device("token");

        harness
            .service
            .sync_user(&user, date(20), &CancellationToken::new())
            .await;

        assert_eq!(stored_watermark(&harness, "a@example.com").await, Some(date(20)));
    }

    #[tokio::test]
    async fn missing_device_is_skipped() {
        let harness = Harness::new().await;
        harness.storage.insert_user("a@example.com").await.unwrap();
        let user = User::new("a@example.com").with_feed("https://one");

        let report = harness
            .service
            .sync_user(&user, date(20), &CancellationToken::new())
            .await;

        assert!(matches!(report.status, UserStatus::Skipped { .. }));
        assert!(harness.feeds.fetched().is_empty());
        assert_eq!(stored_watermark(&harness, "a@example.com").await, None);
    }

    #[tokio::test]
    async fn rejected_device_fails_the_user() {
        let harness = Harness::new().await;
        harness.storage.insert_user("a@example.com").await.unwrap();
        let user = User::new("a@example.com")
            .with_feed("https://one")
            .with_device("revoked");

        let report = harness
            .service
            .sync_user(&user, date(20), &CancellationToken::new())
            .await;

        assert!(matches!(report.status, UserStatus::Failed { .. }));
        assert_eq!(stored_watermark(&harness, "a@example.com").await, None);
    }

    #[tokio::test]
    async fn watermark_persist_failure_fails_the_user() {
        let harness = Harness::new().await;
        // not registered in the datastore
        harness.connector.add_device("token");
        harness.feeds.add_feed(
            "https://one",
            vec![FeedItem::new("https://one/1", date(3))],
        );
        let user = User::new("ghost@example.com")
            .with_feed("https://one")
            .with_device("token");

        let report = harness
            .service
            .sync_user(&user, date(20), &CancellationToken::new())
            .await;

        assert!(matches!(report.status, UserStatus::Failed { .. }));
        assert_eq!(report.articles(), 1);
    }

    #[tokio::test]
    async fn cancelled_run_without_deliveries_keeps_watermark() {
        let harness = Harness::new().await;
        harness.storage.insert_user("a@example.com").await.unwrap();
        harness.connector.add_device("token");
        let user = User::new("a@example.com").with_device("token");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = harness.service.sync_user(&user, date(20), &cancel).await;

        assert!(matches!(report.status, UserStatus::Skipped { .. }));
        assert_eq!(stored_watermark(&harness, "a@example.com").await, None);
    }

    #[tokio::test]
    async fn failed_article_stays_eligible_for_the_next_run() {
        let harness = Harness::new().await;
        harness.storage.insert_user("a@example.com").await.unwrap();
        harness
            .storage
            .update_last_sync_date("a@example.com", date(1))
            .await
            .unwrap();
        harness.connector.add_device("token");
        harness.feeds.add_feed(
            "https://one",
            vec![
                FeedItem::new("https://one/new", date(5)),
                FeedItem::new("https://one/old", date(3)),
            ],
        );
        harness.engine.fail_url("https://one/old");

        let user = User::new("a@example.com")
            .with_feed("https://one")
            .with_device("token")
            .with_last_sync_date(date(1));
        let report = harness
            .service
            .sync_user(&user, date(20), &CancellationToken::new())
            .await;

        assert_eq!(report.articles(), 1);
        let watermark = stored_watermark(&harness, "a@example.com").await.unwrap();
        assert!(watermark < date(3));
        assert!(watermark > date(2));
    }

    #[tokio::test]
    async fn all_articles_failing_skips_the_start_time_fallback() {
        let harness = Harness::new().await;
        harness.storage.insert_user("a@example.com").await.unwrap();
        harness.connector.add_device("token");
        harness.feeds.add_feed(
            "https://one",
            vec![FeedItem::new("https://one/1", date(3))],
        );
        harness.engine.fail_url("https://one/1");

        let user = User::new("a@example.com")
            .with_feed("https://one")
            .with_device("token")
            .with_last_sync_date(date(1));
        harness
            .service
            .sync_user(&user, date(20), &CancellationToken::new())
            .await;

        let watermark = stored_watermark(&harness, "a@example.com").await.unwrap();
        assert!(watermark < date(3));
    }

    #[tokio::test]
    async fn cancelled_run_keeps_unattempted_items_eligible() {
        let harness = Harness::new().await;
        harness.storage.insert_user("a@example.com").await.unwrap();
        harness.connector.add_device("token");
        harness.feeds.add_feed(
            "https://one",
            vec![
                FeedItem::new("https://one/new", date(5)),
                FeedItem::new("https://one/old", date(3)),
            ],
        );
        harness.engine.set_delay(std::time::Duration::from_millis(200));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let user = User::new("a@example.com")
            .with_feed("https://one")
            .with_device("token")
            .with_last_sync_date(date(1));
        let report = harness.service.sync_user(&user, date(20), &cancel).await;

        assert_eq!(report.articles(), 1);
        assert_eq!(harness.engine.rendered(), vec!["https://one/new".to_string()]);
        let watermark = stored_watermark(&harness, "a@example.com").await.unwrap();
        assert!(watermark < date(3));
    }

    #[tokio::test]
    async fn concurrent_feeds_contend_on_the_root_without_losing_entries() {
        let harness = Harness::new().await;
        harness.storage.insert_user("a@example.com").await.unwrap();
        let tree = harness.connector.add_device("token");
        tree.set_read_delay(std::time::Duration::from_millis(20));
        harness.feeds.add_feed(
            "https://one",
            vec![
                FeedItem::new("https://one/1", date(3)),
                FeedItem::new("https://one/2", date(4)),
            ],
        );
        harness.feeds.add_feed(
            "https://two",
            vec![
                FeedItem::new("https://two/1", date(5)),
                FeedItem::new("https://two/2", date(6)),
            ],
        );

        let user = User::new("a@example.com")
            .with_feed("https://one")
            .with_feed("https://two")
            .with_device("token")
            .with_last_sync_date(date(1));
        let report = harness
            .service
            .sync_user(&user, date(20), &CancellationToken::new())
            .await;

        assert_eq!(report.articles(), 4);
        assert!(tree.conflicts_raised() > 0);
        let mut ids: Vec<_> = tree.root_entries().into_iter().map(|e| e.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert_eq!(tree.documents().len(), 4);
    }

    #[tokio::test]
    async fn failed_sync_completion_fails_only_that_article() {
        let harness = Harness::new().await;
        harness.storage.insert_user("a@example.com").await.unwrap();
        let tree = harness.connector.add_device("token");
        tree.fail_next_complete("notification service down");
        harness.feeds.add_feed(
            "https://one",
            vec![
                FeedItem::new("https://one/1", date(3)),
                FeedItem::new("https://one/2", date(4)),
            ],
        );

        let user = User::new("a@example.com")
            .with_feed("https://one")
            .with_device("token")
            .with_last_sync_date(date(1));
        let report = harness
            .service
            .sync_user(&user, date(20), &CancellationToken::new())
            .await;

        assert_eq!(report.articles(), 1);
        assert_eq!(report.feeds[0].failed_articles(), 1);
        assert_eq!(tree.completed_syncs().len(), 1);
        let watermark = stored_watermark(&harness, "a@example.com").await.unwrap();
        assert!(watermark < date(3));
    }
}
