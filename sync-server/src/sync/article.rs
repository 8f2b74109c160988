//! Delivering one article: render, upload, append to the root.

use super::SyncService;
use crate::error::ArticleError;
use paperfeed_client::{render_with_timeout, RemoteError, RemoteTree, RenderContext};
use paperfeed_types::{Entry, FeedItem};
use std::future::Future;
use std::time::Duration;

/// Bound one remote call.
async fn bounded<T>(
    timeout: Duration,
    operation: &str,
    call: impl Future<Output = Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Timeout(format!(
            "{operation} exceeded {timeout:?}"
        ))),
    }
}

impl SyncService {
    /// Render `item` and append it to the remote tree.
    ///
    /// The document only becomes visible once the root commit succeeds. A
    /// stale generation restarts the read-append-commit cycle from a fresh
    /// read, so retries never duplicate the entry.
    pub async fn sync_article(
        &self,
        item: &FeedItem,
        remote: &dyn RemoteTree,
        context: &mut dyn RenderContext,
    ) -> Result<Entry, ArticleError> {
        let settings = &self.settings;
        let timeout = settings.remote_timeout;

        let pdf = render_with_timeout(
            context,
            &item.link,
            &settings.render,
            settings.render_timeout,
        )
        .await?;

        let entry = bounded(
            timeout,
            "put_document",
            remote.put_document(item.document_name(), &pdf),
        )
        .await?;

        let mut attempts = settings.commit.attempts();
        while let Some(attempt) = attempts.next_attempt() {
            let root = bounded(timeout, "get_root_hash", remote.get_root_hash()).await?;
            let mut entries =
                bounded(timeout, "get_entries", remote.get_entries(&root.root_hash)).await?;
            entries.push(entry.clone());

            let hash = bounded(timeout, "put_entries", remote.put_entries("", &entries)).await?;

            match bounded(
                timeout,
                "put_root_hash",
                remote.put_root_hash(&hash, root.generation),
            )
            .await
            {
                Ok(generation) => {
                    bounded(timeout, "complete_sync", remote.complete_sync(generation)).await?;
                    tracing::debug!(
                        "Committed {} at generation {} (attempt {})",
                        item.link,
                        generation,
                        attempt
                    );
                    return Ok(entry);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(
                        "Root moved while committing {} (attempt {}): {}",
                        item.link,
                        attempt,
                        e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ArticleError::SyncFailed {
            attempts: attempts.used(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::fixtures::Harness;
    use crate::sync::SyncSettings;
    use chrono::Utc;
    use paperfeed_client::{MockRemoteTree, RenderEngine, RenderError};
    use paperfeed_core::CommitPolicy;

    fn item(link: &str) -> FeedItem {
        FeedItem::new(link, Utc::now()).with_title("An article")
    }

    #[tokio::test]
    async fn appends_one_entry_and_completes() {
        let harness = Harness::new().await;
        let tree = MockRemoteTree::new();
        let mut context = harness.engine.new_context().await.unwrap();

        let entry = harness
            .service
            .sync_article(&item("https://a.example.com/1"), &tree, context.as_mut())
            .await
            .unwrap();

        assert_eq!(tree.root_entries(), vec![entry]);
        assert_eq!(tree.documents(), vec!["An article".to_string()]);
        assert_eq!(tree.completed_syncs(), vec![tree.root().generation]);
    }

    #[tokio::test]
    async fn conflict_is_retried_from_a_fresh_read() {
        let harness = Harness::new().await;
        let tree = MockRemoteTree::new();
        tree.inject_conflicts(2);
        let mut context = harness.engine.new_context().await.unwrap();

        let entry = harness
            .service
            .sync_article(&item("https://a.example.com/1"), &tree, context.as_mut())
            .await
            .unwrap();

        let entries = tree.root_entries();
        assert_eq!(tree.conflicts_raised(), 2);
        assert_eq!(entries.iter().filter(|e| **e == entry).count(), 1);
        // both foreign commits survive
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let harness = Harness::with_settings(SyncSettings {
            commit: CommitPolicy::new(2),
            ..SyncSettings::default()
        })
        .await;
        let tree = MockRemoteTree::new();
        tree.inject_conflicts(5);
        let mut context = harness.engine.new_context().await.unwrap();

        let result = harness
            .service
            .sync_article(&item("https://a.example.com/1"), &tree, context.as_mut())
            .await;

        assert!(matches!(result, Err(ArticleError::SyncFailed { attempts: 2 })));
        assert_eq!(tree.conflicts_raised(), 2);
        assert!(tree.completed_syncs().is_empty());
    }

    #[tokio::test]
    async fn render_failure_leaves_tree_untouched() {
        let harness = Harness::new().await;
        harness.engine.fail_url("https://a.example.com/broken");
        let tree = MockRemoteTree::new();
        let before = tree.root();
        let mut context = harness.engine.new_context().await.unwrap();

        let result = harness
            .service
            .sync_article(&item("https://a.example.com/broken"), &tree, context.as_mut())
            .await;

        assert!(matches!(result, Err(ArticleError::Render(_))));
        assert_eq!(tree.root(), before);
        assert!(tree.documents().is_empty());
    }

    #[tokio::test]
    async fn render_timeout_is_an_article_failure() {
        let harness = Harness::with_settings(SyncSettings {
            render_timeout: Duration::from_millis(20),
            ..SyncSettings::default()
        })
        .await;
        harness.engine.set_delay(Duration::from_secs(5));
        let tree = MockRemoteTree::new();
        let mut context = harness.engine.new_context().await.unwrap();

        let result = harness
            .service
            .sync_article(&item("https://a.example.com/slow"), &tree, context.as_mut())
            .await;

        assert!(matches!(
            result,
            Err(ArticleError::Render(RenderError::Timeout { .. }))
        ));
    }

    #[tokio::test]
    async fn upload_failure_is_reported() {
        let harness = Harness::new().await;
        let tree = MockRemoteTree::new();
        tree.fail_next_put_document("disk full");
        let mut context = harness.engine.new_context().await.unwrap();

        let result = harness
            .service
            .sync_article(&item("https://a.example.com/1"), &tree, context.as_mut())
            .await;

        assert!(matches!(result, Err(ArticleError::Remote(RemoteError::Http { .. }))));
        assert!(tree.root_entries().is_empty());
    }
}
