//! Headless Chromium rendering engine.
//!
//! Talks to a Chromium instance over the DevTools protocol. One browser per
//! engine; every context is a separate tab.

use super::{RenderContext, RenderEngine, RenderError, RenderOptions};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures_util::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Quiet period approximating "no network activity" after the load event.
const NETWORK_IDLE_SETTLE: Duration = Duration::from_millis(500);

/// Container-friendly launch flags.
const LAUNCH_ARGS: [&str; 3] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    // shared memory files go to /tmp; /dev/shm is 64MB in Docker
    "--disable-dev-shm-usage",
];

/// Chromium-backed [`RenderEngine`].
pub struct ChromiumEngine {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl std::fmt::Debug for ChromiumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumEngine").finish_non_exhaustive()
    }
}

impl ChromiumEngine {
    /// Launch a headless browser.
    pub async fn launch(executable: Option<&Path>) -> Result<Self, RenderError> {
        let mut builder = BrowserConfig::builder().args(LAUNCH_ARGS);
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // The DevTools connection only makes progress while its event stream is polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!("Chromium rendering engine launched");
        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Context(e.to_string()))?;
        Ok(Box::new(ChromiumContext { page: Some(page) }))
    }

    async fn shutdown(&self) -> Result<(), RenderError> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;
        if let Err(e) = browser.wait().await {
            tracing::warn!("Chromium process did not exit cleanly: {}", e);
        }
        self.handler.abort();
        tracing::info!("Chromium rendering engine stopped");
        Ok(())
    }
}

struct ChromiumContext {
    page: Option<Page>,
}

fn print_params(options: &RenderOptions) -> PrintToPdfParams {
    let margin = options.margin_in();
    PrintToPdfParams {
        print_background: Some(options.print_background),
        paper_width: Some(options.paper_width_in),
        paper_height: Some(options.paper_height_in),
        margin_top: Some(margin),
        margin_bottom: Some(margin),
        margin_left: Some(margin),
        margin_right: Some(margin),
        ..PrintToPdfParams::default()
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn render(&mut self, url: &str, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        let page = self.page.as_ref().ok_or(RenderError::Closed)?;

        page.goto(url)
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if options.wait_for_network_idle {
            tokio::time::sleep(NETWORK_IDLE_SETTLE).await;
        }

        page.pdf(print_params(options))
            .await
            .map_err(|e| RenderError::Print {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        match self.page.take() {
            Some(page) => page
                .close()
                .await
                .map_err(|e| RenderError::Context(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for ChromiumContext {
    fn drop(&mut self) {
        // dropped without close(), e.g. when the owning future was cancelled
        let Some(page) = self.page.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = page.close().await {
                        tracing::warn!("Failed to close abandoned tab: {}", e);
                    }
                });
            }
            Err(_) => tracing::warn!("Abandoned tab left open, no runtime to close it"),
        }
    }
}
