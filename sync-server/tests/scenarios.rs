//! End-to-end runs against mock capabilities and an in-memory datastore.

use chrono::{DateTime, TimeZone, Utc};
use paperfeed_client::{MockConnector, MockFeedSource, MockRemoteTree, MockRenderEngine};
use paperfeed_core::UserStatus;
use paperfeed_server::storage::{Datastore, SqliteStorage};
use paperfeed_server::sync::{SyncService, SyncSettings};
use paperfeed_types::FeedItem;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct World {
    service: SyncService,
    storage: Arc<SqliteStorage>,
    feeds: MockFeedSource,
    engine: MockRenderEngine,
    connector: MockConnector,
}

impl World {
    async fn new() -> Self {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let feeds = MockFeedSource::new();
        let engine = MockRenderEngine::new();
        let connector = MockConnector::new();

        let service = SyncService::new(
            storage.clone(),
            Arc::new(feeds.clone()),
            Arc::new(engine.clone()),
            Arc::new(connector.clone()),
            SyncSettings::default(),
        );

        Self {
            service,
            storage,
            feeds,
            engine,
            connector,
        }
    }

    /// Register a user with a linked device and return their remote tree.
    async fn user(&self, email: &str, feeds: &[&str]) -> MockRemoteTree {
        self.storage.insert_user(email).await.unwrap();
        for feed in feeds {
            self.storage.add_feed(email, feed).await.unwrap();
        }
        let token = format!("device-of-{email}");
        self.storage.link_device(email, &token).await.unwrap();
        self.connector.add_device(&token)
    }

    async fn watermark(&self, email: &str) -> Option<DateTime<Utc>> {
        self.storage
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .find(|u| u.email == email)
            .and_then(|u| u.last_sync_date)
    }
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn first_run_delivers_only_the_newest_item() {
    let world = World::new().await;
    let tree = world.user("a@example.com", &["https://blog.example.com/rss"]).await;
    world.feeds.add_feed(
        "https://blog.example.com/rss",
        vec![
            FeedItem::new("https://blog.example.com/3", at(2024, 3, 3)),
            FeedItem::new("https://blog.example.com/2", at(2024, 3, 2)),
            FeedItem::new("https://blog.example.com/1", at(2024, 3, 1)),
        ],
    );

    let report = world.service.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.summary.users, 1);
    assert_eq!(report.summary.feeds, 1);
    assert_eq!(report.summary.articles, 1);
    assert_eq!(world.engine.rendered(), vec!["https://blog.example.com/3".to_string()]);
    assert_eq!(tree.root_entries().len(), 1);
    assert_eq!(world.watermark("a@example.com").await, Some(at(2024, 3, 3)));
}

#[tokio::test]
async fn only_items_after_the_watermark_are_delivered() {
    let world = World::new().await;
    let tree = world.user("a@example.com", &["https://blog.example.com/rss"]).await;
    world
        .storage
        .update_last_sync_date("a@example.com", at(2024, 1, 1))
        .await
        .unwrap();
    world.feeds.add_feed(
        "https://blog.example.com/rss",
        vec![
            FeedItem::new("https://blog.example.com/old", at(2023, 12, 31)),
            FeedItem::new("https://blog.example.com/same", at(2024, 1, 1)),
            FeedItem::new("https://blog.example.com/new", at(2024, 1, 2)),
        ],
    );

    let report = world.service.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.summary.articles, 1);
    assert_eq!(world.engine.rendered(), vec!["https://blog.example.com/new".to_string()]);
    assert_eq!(tree.root_entries().len(), 1);
    assert_eq!(world.watermark("a@example.com").await, Some(at(2024, 1, 2)));
}

#[tokio::test]
async fn failed_feed_does_not_hold_back_the_other() {
    let world = World::new().await;
    let tree = world
        .user("a@example.com", &["https://down.example.com/rss", "https://up.example.com/rss"])
        .await;
    world
        .storage
        .update_last_sync_date("a@example.com", at(2024, 1, 1))
        .await
        .unwrap();
    world
        .feeds
        .fail_feed("https://down.example.com/rss", "connection refused");
    world.feeds.add_feed(
        "https://up.example.com/rss",
        vec![FeedItem::new("https://up.example.com/1", at(2024, 1, 5))],
    );

    let report = world.service.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.summary.articles, 1);
    assert_eq!(report.summary.feeds, 1);
    assert_eq!(report.summary.failed_feeds, 1);
    assert!(report.summary.has_failures());
    assert!(matches!(report.users[0].status, UserStatus::Synced { .. }));
    assert_eq!(tree.root_entries().len(), 1);
    assert_eq!(world.watermark("a@example.com").await, Some(at(2024, 1, 5)));
}

#[tokio::test]
async fn conflicting_writer_is_retried_without_duplicates() {
    let world = World::new().await;
    let tree = world.user("a@example.com", &["https://blog.example.com/rss"]).await;
    tree.inject_conflicts(1);
    world.feeds.add_feed(
        "https://blog.example.com/rss",
        vec![FeedItem::new("https://blog.example.com/1", at(2024, 2, 1))],
    );

    let report = world.service.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.summary.articles, 1);
    assert_eq!(tree.conflicts_raised(), 1);
    assert_eq!(tree.documents().len(), 1);

    let entries = tree.root_entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries.iter().filter(|e| e.id.starts_with("foreign-")).count(), 1);
    assert_eq!(tree.completed_syncs(), vec![tree.root().generation]);
}

#[tokio::test]
async fn user_without_device_is_skipped_without_affecting_others() {
    let world = World::new().await;
    let tree = world.user("a@example.com", &["https://blog.example.com/rss"]).await;
    world.storage.insert_user("b@example.com").await.unwrap();
    world
        .storage
        .add_feed("b@example.com", "https://blog.example.com/rss")
        .await
        .unwrap();
    world.feeds.add_feed(
        "https://blog.example.com/rss",
        vec![FeedItem::new("https://blog.example.com/1", at(2024, 2, 1))],
    );

    let report = world.service.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.summary.users, 2);
    assert_eq!(report.summary.skipped_users, 1);
    assert_eq!(report.summary.articles, 1);
    assert!(!report.summary.has_failures());
    assert_eq!(tree.root_entries().len(), 1);
    assert_eq!(world.watermark("b@example.com").await, None);
    assert_eq!(world.connector.connects(), 1);
}

#[tokio::test]
async fn second_run_delivers_nothing_new() {
    let world = World::new().await;
    let tree = world.user("a@example.com", &["https://blog.example.com/rss"]).await;
    world.feeds.add_feed(
        "https://blog.example.com/rss",
        vec![FeedItem::new("https://blog.example.com/1", at(2024, 2, 1))],
    );

    world.service.run(&CancellationToken::new()).await.unwrap();
    let second = world.service.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(second.summary.articles, 0);
    assert_eq!(tree.root_entries().len(), 1);
    // nothing delivered: the watermark moves to the second run's start
    assert!(world.watermark("a@example.com").await.unwrap() > at(2024, 2, 1));
}

#[tokio::test]
async fn failed_article_is_retried_by_the_next_run() {
    let world = World::new().await;
    let tree = world.user("a@example.com", &["https://blog.example.com/rss"]).await;
    world
        .storage
        .update_last_sync_date("a@example.com", at(2024, 1, 1))
        .await
        .unwrap();
    world.feeds.add_feed(
        "https://blog.example.com/rss",
        vec![
            FeedItem::new("https://blog.example.com/old", at(2024, 1, 3)),
            FeedItem::new("https://blog.example.com/new", at(2024, 1, 5)),
        ],
    );
    tree.fail_next_put_document("storage full");

    let first = world.service.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(first.summary.articles, 1);
    assert_eq!(first.summary.failed_articles, 1);
    assert!(world.watermark("a@example.com").await.unwrap() < at(2024, 1, 3));

    let second = world.service.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(second.summary.failed_articles, 0);
    let synced: Vec<_> = second.users[0].feeds[0]
        .synced
        .iter()
        .map(|item| item.link.as_str())
        .collect();
    assert!(synced.contains(&"https://blog.example.com/old"));
    assert_eq!(world.watermark("a@example.com").await, Some(at(2024, 1, 5)));
}

#[tokio::test]
async fn cancelled_run_leaves_older_items_for_later() {
    let world = World::new().await;
    world.user("a@example.com", &["https://blog.example.com/rss"]).await;
    world
        .storage
        .update_last_sync_date("a@example.com", at(2024, 1, 1))
        .await
        .unwrap();
    world.feeds.add_feed(
        "https://blog.example.com/rss",
        vec![
            FeedItem::new("https://blog.example.com/new", at(2024, 1, 5)),
            FeedItem::new("https://blog.example.com/old", at(2024, 1, 3)),
        ],
    );
    world.engine.set_delay(std::time::Duration::from_millis(200));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let report = world.service.run(&cancel).await.unwrap();

    assert_eq!(report.summary.articles, 1);
    assert_eq!(world.engine.rendered(), vec!["https://blog.example.com/new".to_string()]);
    assert!(world.watermark("a@example.com").await.unwrap() < at(2024, 1, 3));
}
