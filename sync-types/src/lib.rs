//! # paperfeed-types
//!
//! Data model for the paperfeed synchronization engine.
//!
//! This crate provides the types shared by every paperfeed crate:
//! - [`User`], [`Feed`], [`Device`] - Datastore-owned records read at run start
//! - [`FeedItem`] - Transient item produced by a feed source
//! - [`ContentHash`], [`Generation`], [`DocumentId`] - Remote tree identity types
//! - [`TreeState`], [`Entry`] - Committed remote tree version and its references
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod model;
mod tree;

pub use error::TypesError;
pub use ids::{ContentHash, DocumentId, Generation};
pub use model::{Device, Feed, FeedItem, User};
pub use tree::{Entry, EntryKind, TreeState};
