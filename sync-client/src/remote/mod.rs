//! Remote document tree client.
//!
//! A user's documents live in a content-addressed tree. The root is a
//! `(hash, generation)` pair; committing a new root only succeeds when the
//! caller presents the generation the store currently holds, so concurrent
//! writers cannot overwrite each other.
//!
//! # Append protocol
//!
//! ```text
//! put_document ─► get_root_hash ─► get_entries ─► put_entries ─► put_root_hash ─► complete_sync
//!                      ▲                                              │
//!                      └────────────── Conflict (stale generation) ───┘
//! ```
//!
//! Nothing is visible to other devices until `put_root_hash` succeeds, so a
//! failure at any earlier step leaves the committed tree untouched.

mod cloud;
mod hash;
mod index;
mod mock;

pub use cloud::{CloudConfig, CloudConnector, CloudSession};
pub use hash::{HashProvider, Sha256Provider};
pub use index::{decode_index, encode_index, INDEX_SCHEMA};
pub use mock::{MockConnector, MockRemoteTree};

use async_trait::async_trait;
use paperfeed_types::{ContentHash, Device, Entry, Generation, TreeState};
use std::sync::Arc;
use thiserror::Error;

/// Remote tree errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The device credential was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The root moved since it was read.
    #[error("generation conflict: commit presented stale generation {presented}")]
    Conflict {
        /// The generation the caller presented.
        presented: Generation,
    },

    /// A referenced object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The store answered with an unexpected status.
    #[error("remote store returned {status}: {reason}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        reason: String,
    },

    /// The request could not be sent.
    #[error("request failed: {0}")]
    Request(String),

    /// The store's answer could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A call exceeded its time bound.
    #[error("remote call timed out: {0}")]
    Timeout(String),
}

impl RemoteError {
    /// Whether this is a compare-and-swap rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict { .. })
    }
}

/// An authenticated session on one user's remote document tree.
#[async_trait]
pub trait RemoteTree: Send + Sync {
    /// Upload a document and return the entry referencing it.
    ///
    /// The document is stored but not yet reachable from the root.
    async fn put_document(&self, name: &str, pdf: &[u8]) -> Result<Entry, RemoteError>;

    /// Read the committed root.
    async fn get_root_hash(&self) -> Result<TreeState, RemoteError>;

    /// Read the entries of the index stored under `hash`.
    async fn get_entries(&self, hash: &ContentHash) -> Result<Vec<Entry>, RemoteError>;

    /// Store an index of `entries` and return its hash.
    ///
    /// `index_id` names the owning document; it is empty for the root index.
    async fn put_entries(&self, index_id: &str, entries: &[Entry]) -> Result<ContentHash, RemoteError>;

    /// Commit `hash` as the new root if `generation` is still current.
    ///
    /// Fails with [`RemoteError::Conflict`] when another writer committed
    /// first. Returns the new generation.
    async fn put_root_hash(
        &self,
        hash: &ContentHash,
        generation: Generation,
    ) -> Result<Generation, RemoteError>;

    /// Make the commit at `generation` visible to other devices.
    async fn complete_sync(&self, generation: Generation) -> Result<(), RemoteError>;
}

/// Opens remote tree sessions from device credentials.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Authenticate `device` and open a session on its tree.
    async fn connect(&self, device: &Device) -> Result<Arc<dyn RemoteTree>, RemoteError>;
}
