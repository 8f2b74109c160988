//! # paperfeed-server
//!
//! Periodically turns new feed articles into PDFs and appends them to each
//! user's remote document tree.
//!
//! This crate:
//! - Loads users, feeds and devices from SQLite
//! - Fetches feeds and selects items newer than each user's watermark
//! - Renders articles and commits them with a generation-checked root swap
//! - Advances watermarks and reports what happened
//!
//! ## Architecture
//!
//! ```text
//!  POST /api/sync ──┐      ┌── scheduler tick
//!                   ▼      ▼
//!          ┌──────────────────────────┐
//!          │       SyncService        │
//!          │  users ─► feeds ─► items │──► feed source (HTTP)
//!          │                          │──► rendering engine
//!          │                          │──► remote document tree
//!          │  ┌────────────────────┐  │
//!          │  │ SQLite (datastore) │  │
//!          │  └────────────────────┘  │
//!          └──────────────────────────┘
//! ```
//!
//! ## Endpoints
//!
//! - `GET|POST /api/sync` (requires the `api-key` header): run once
//! - `GET /health`: uptime and the last run's counts

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod http;
pub mod scheduler;
pub mod server;
pub mod storage;
pub mod sync;
