//! # paperfeed-client
//!
//! Everything paperfeed talks to over the network.
//!
//! ## Components
//!
//! - **Feeds** ([`feed`]): fetch and parse RSS, Atom and JSON Feed documents
//! - **Rendering** ([`render`]): turn article pages into PDFs through an
//!   isolated browsing context per feed
//! - **Remote tree** ([`remote`]): upload documents and append them to a
//!   user's content-addressed tree with a generation-checked commit
//!
//! Each component is a trait with a production implementation and a
//! mock, so the sync engine can be tested without a network or a browser.
//!
//! ## Example
//!
//! ```ignore
//! use paperfeed_client::{FeedSource, HttpFeedSource};
//! use std::time::Duration;
//!
//! let source = HttpFeedSource::new(Duration::from_secs(30))?;
//! let items = source.fetch("https://example.com/rss.xml").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod feed;
pub mod remote;
pub mod render;

pub use feed::{parse_feed, FeedError, FeedSource, HttpFeedSource, MockFeedSource};
pub use remote::{
    CloudConfig, CloudConnector, CloudSession, HashProvider, MockConnector, MockRemoteTree,
    RemoteConnector, RemoteError, RemoteTree, Sha256Provider,
};
#[cfg(feature = "chromium")]
pub use render::ChromiumEngine;
pub use render::{
    render_with_timeout, MockRenderEngine, RenderContext, RenderEngine, RenderError, RenderOptions,
};
