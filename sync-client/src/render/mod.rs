//! Document rendering abstraction.
//!
//! Rendering is done by one engine per run (e.g. a headless browser) that
//! hands out independent contexts (e.g. browser pages). A context is owned
//! by exactly one feed synchronization at a time and reused for all of that
//! feed's articles.
//!
//! ```text
//! RenderEngine (shared, one per run)
//!   ├── RenderContext  ← feed A (exclusive)
//!   └── RenderContext  ← feed B (exclusive)
//! ```

#[cfg(feature = "chromium")]
mod chromium;
mod mock;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumEngine;
pub use mock::MockRenderEngine;

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// CSS pixels per inch, used to convert margins.
const PX_PER_INCH: f64 = 96.0;

/// Rendering errors.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The engine could not be started.
    #[error("failed to launch rendering engine: {0}")]
    Launch(String),

    /// A rendering context could not be created.
    #[error("failed to create rendering context: {0}")]
    Context(String),

    /// Navigation to the article failed.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// Article URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The page could not be printed.
    #[error("printing {url} failed: {reason}")]
    Print {
        /// Article URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// Rendering exceeded its time bound.
    #[error("rendering {url} timed out after {timeout:?}")]
    Timeout {
        /// Article URL.
        url: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// The context was already closed.
    #[error("rendering context closed")]
    Closed,
}

/// Print options for one document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderOptions {
    /// Paper width in inches (default: A4).
    #[serde(default = "default_paper_width")]
    pub paper_width_in: f64,
    /// Paper height in inches (default: A4).
    #[serde(default = "default_paper_height")]
    pub paper_height_in: f64,
    /// Margin on every side in CSS pixels (default: 50).
    #[serde(default = "default_margin_px")]
    pub margin_px: u32,
    /// Print background graphics (default: true).
    #[serde(default = "default_true")]
    pub print_background: bool,
    /// Wait until the network is idle before printing (default: true).
    #[serde(default = "default_true")]
    pub wait_for_network_idle: bool,
    /// Engine executable, when not found on the search path.
    #[serde(default)]
    pub executable: Option<PathBuf>,
}

fn default_paper_width() -> f64 {
    8.27
}

fn default_paper_height() -> f64 {
    11.69
}

fn default_margin_px() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            paper_width_in: default_paper_width(),
            paper_height_in: default_paper_height(),
            margin_px: default_margin_px(),
            print_background: true,
            wait_for_network_idle: true,
            executable: None,
        }
    }
}

impl RenderOptions {
    /// Margin in inches.
    pub fn margin_in(&self) -> f64 {
        f64::from(self.margin_px) / PX_PER_INCH
    }
}

/// A shared rendering engine.
///
/// Creating a context is the only operation that touches the engine itself.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Create a new, exclusively owned rendering context.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, RenderError>;

    /// Stop the engine. Contexts must be closed first.
    async fn shutdown(&self) -> Result<(), RenderError>;
}

/// A reusable rendering handle owned by one feed synchronization.
#[async_trait]
pub trait RenderContext: Send {
    /// Render the page at `url` into document bytes.
    async fn render(&mut self, url: &str, options: &RenderOptions) -> Result<Vec<u8>, RenderError>;

    /// Release the context. Further renders fail with [`RenderError::Closed`].
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// Render with an upper bound on the time spent.
pub async fn render_with_timeout(
    context: &mut dyn RenderContext,
    url: &str,
    options: &RenderOptions,
    timeout: Duration,
) -> Result<Vec<u8>, RenderError> {
    match tokio::time::timeout(timeout, context.render(url, options)).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout {
            url: url.to_string(),
            timeout,
        }),
    }
}
