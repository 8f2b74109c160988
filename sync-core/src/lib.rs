//! # paperfeed-core
//!
//! Pure logic for paperfeed (no I/O, instant tests).
//!
//! This crate implements the decisions of a synchronization run without any
//! network, rendering or datastore I/O:
//! - which feed items are eligible ([`select_items`])
//! - where a user's watermark moves to ([`WatermarkTracker`])
//! - how many compare-and-swap commit cycles an article gets ([`CommitPolicy`])
//! - how per-user reports fold into a run summary ([`RunSummary`])
//!
//! The actual I/O is performed by `paperfeed-server`, which feeds results
//! from `paperfeed-client` capabilities into these functions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commit;
pub mod selection;
pub mod summary;
pub mod watermark;

pub use commit::{CommitAttempts, CommitPolicy, DEFAULT_COMMIT_ATTEMPTS};
pub use selection::select_items;
pub use summary::{FeedReport, RunSummary, UserReport, UserStatus};
pub use watermark::WatermarkTracker;
