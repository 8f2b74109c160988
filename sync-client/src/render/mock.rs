//! Mock rendering engine for testing.
//!
//! Produces small fake PDF payloads and tracks context lifecycle so tests
//! can assert that every context handed out was released.

use super::{RenderContext, RenderEngine, RenderError, RenderOptions};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock rendering engine.
#[derive(Debug, Default, Clone)]
pub struct MockRenderEngine {
    inner: Arc<Mutex<MockEngineInner>>,
}

#[derive(Debug, Default)]
struct MockEngineInner {
    contexts_created: usize,
    contexts_open: usize,
    rendered: Vec<String>,
    failing_urls: HashSet<String>,
    fail_next_context: Option<String>,
    delay: Option<Duration>,
    shut_down: bool,
}

impl MockRenderEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every render of `url` fail.
    pub fn fail_url(&self, url: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing_urls.insert(url.to_string());
    }

    /// Cause the next `new_context()` to fail with the given error.
    pub fn fail_next_context(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_context = Some(error.to_string());
    }

    /// Delay every render by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.delay = Some(delay);
    }

    /// Number of contexts handed out so far.
    pub fn contexts_created(&self) -> usize {
        self.inner.lock().unwrap().contexts_created
    }

    /// Number of contexts not yet closed.
    pub fn contexts_open(&self) -> usize {
        self.inner.lock().unwrap().contexts_open
    }

    /// URLs rendered successfully, in completion order.
    pub fn rendered(&self) -> Vec<String> {
        self.inner.lock().unwrap().rendered.clone()
    }

}

#[async_trait]
impl RenderEngine for MockRenderEngine {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.shut_down {
            return Err(RenderError::Context("engine shut down".to_string()));
        }

        if let Some(error) = inner.fail_next_context.take() {
            return Err(RenderError::Context(error));
        }

        inner.contexts_created += 1;
        inner.contexts_open += 1;
        Ok(Box::new(MockRenderContext {
            engine: Arc::clone(&self.inner),
            closed: false,
        }))
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        self.inner.lock().unwrap().shut_down = true;
        Ok(())
    }
}

struct MockRenderContext {
    engine: Arc<Mutex<MockEngineInner>>,
    closed: bool,
}

#[async_trait]
impl RenderContext for MockRenderContext {
    async fn render(&mut self, url: &str, _options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }

        let (delay, fails) = {
            let inner = self.engine.lock().unwrap();
            (inner.delay, inner.failing_urls.contains(url))
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fails {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                reason: "mock navigation failure".to_string(),
            });
        }

        self.engine.lock().unwrap().rendered.push(url.to_string());
        Ok(format!("%PDF-1.4 mock render of {url}").into_bytes())
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.release();
        Ok(())
    }
}

impl MockRenderContext {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Ok(mut inner) = self.engine.lock() {
                inner.contexts_open -= 1;
            }
        }
    }
}

impl Drop for MockRenderContext {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_context_lifecycle() {
        let engine = MockRenderEngine::new();
        let mut a = engine.new_context().await.unwrap();
        let mut b = engine.new_context().await.unwrap();
        assert_eq!(engine.contexts_created(), 2);
        assert_eq!(engine.contexts_open(), 2);

        a.close().await.unwrap();
        a.close().await.unwrap();
        assert_eq!(engine.contexts_open(), 1);

        b.close().await.unwrap();
        assert_eq!(engine.contexts_open(), 0);
    }

    #[tokio::test]
    async fn dropping_a_context_releases_it() {
        let engine = MockRenderEngine::new();
        let context = engine.new_context().await.unwrap();
        assert_eq!(engine.contexts_open(), 1);

        drop(context);
        assert_eq!(engine.contexts_open(), 0);
    }

    #[tokio::test]
    async fn no_contexts_after_shutdown() {
        let engine = MockRenderEngine::new();
        engine.shutdown().await.unwrap();

        assert!(matches!(
            engine.new_context().await,
            Err(RenderError::Context(_))
        ));
    }

    #[tokio::test]
    async fn renders_and_fails_on_request() {
        let engine = MockRenderEngine::new();
        engine.fail_url("https://broken");
        let mut ctx = engine.new_context().await.unwrap();
        let options = RenderOptions::default();

        let bytes = ctx.render("https://ok", &options).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(ctx.render("https://broken", &options).await.is_err());
        assert_eq!(engine.rendered(), vec!["https://ok".to_string()]);

        ctx.close().await.unwrap();
        assert!(matches!(
            ctx.render("https://ok", &options).await,
            Err(RenderError::Closed)
        ));
    }

    #[tokio::test]
    async fn context_failure_is_one_shot() {
        let engine = MockRenderEngine::new();
        engine.fail_next_context("browser crashed");

        assert!(engine.new_context().await.is_err());
        assert!(engine.new_context().await.is_ok());
    }
}
