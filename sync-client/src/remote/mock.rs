//! In-memory remote tree for testing.
//!
//! Behaves like the cloud store: content-addressed indexes plus a root that
//! only moves when the presented generation matches. Tests can inject
//! foreign commits to exercise the conflict path.

use super::hash::{HashProvider, Sha256Provider};
use super::{RemoteConnector, RemoteError, RemoteTree};
use async_trait::async_trait;
use paperfeed_types::{ContentHash, Device, DocumentId, Entry, Generation, TreeState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock remote tree.
///
/// Clones share state, so a test can keep a handle while the engine holds
/// another.
#[derive(Debug, Clone)]
pub struct MockRemoteTree {
    inner: Arc<Mutex<MockTreeInner>>,
}

#[derive(Debug)]
struct MockTreeInner {
    indexes: HashMap<ContentHash, Vec<Entry>>,
    blobs: HashMap<ContentHash, Vec<u8>>,
    root: TreeState,
    documents: Vec<String>,
    completed: Vec<Generation>,
    pending_conflicts: u32,
    conflicts_raised: u32,
    foreign_commits: u32,
    fail_next_put_document: Option<String>,
    fail_next_complete: Option<String>,
    read_delay: Option<Duration>,
}

impl Default for MockRemoteTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteTree {
    /// Create a tree with an empty root at generation 1.
    pub fn new() -> Self {
        let root_hash = Sha256Provider.index_hash(&[]);
        let mut indexes = HashMap::new();
        indexes.insert(root_hash, Vec::new());

        Self {
            inner: Arc::new(Mutex::new(MockTreeInner {
                indexes,
                blobs: HashMap::new(),
                root: TreeState {
                    root_hash,
                    generation: Generation::new(1),
                },
                documents: Vec::new(),
                completed: Vec::new(),
                pending_conflicts: 0,
                conflicts_raised: 0,
                foreign_commits: 0,
                fail_next_put_document: None,
                fail_next_complete: None,
                read_delay: None,
            })),
        }
    }

    /// Have another writer commit right before each of the next `count`
    /// root commits, so those commits present a stale generation.
    pub fn inject_conflicts(&self, count: u32) {
        self.inner.lock().unwrap().pending_conflicts += count;
    }

    /// Cause the next `put_document()` to fail with the given error.
    pub fn fail_next_put_document(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_put_document = Some(error.to_string());
    }

    /// Cause the next `complete_sync()` to fail with the given error.
    pub fn fail_next_complete(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_complete = Some(error.to_string());
    }

    /// Delay every `get_entries()` by `delay`, widening the window between
    /// reading the root and committing a new one.
    pub fn set_read_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().read_delay = Some(delay);
    }

    /// Names of uploaded documents, in upload order.
    pub fn documents(&self) -> Vec<String> {
        self.inner.lock().unwrap().documents.clone()
    }

    /// Entries reachable from the committed root.
    pub fn root_entries(&self) -> Vec<Entry> {
        let inner = self.inner.lock().unwrap();
        inner
            .indexes
            .get(&inner.root.root_hash)
            .cloned()
            .unwrap_or_default()
    }

    /// The committed root.
    pub fn root(&self) -> TreeState {
        self.inner.lock().unwrap().root
    }

    /// Generations passed to `complete_sync()`.
    pub fn completed_syncs(&self) -> Vec<Generation> {
        self.inner.lock().unwrap().completed.clone()
    }

    /// Number of root commits rejected for a stale generation.
    pub fn conflicts_raised(&self) -> u32 {
        self.inner.lock().unwrap().conflicts_raised
    }
}

impl MockTreeInner {
    /// Commit one entry on behalf of another device.
    fn foreign_commit(&mut self) {
        self.foreign_commits += 1;
        let id = format!("foreign-{}", self.foreign_commits);
        let entry = Entry::index(Sha256Provider.digest(id.as_bytes()), &id, 0, 0);

        let mut entries = self
            .indexes
            .get(&self.root.root_hash)
            .cloned()
            .unwrap_or_default();
        entries.push(entry);

        let hash = Sha256Provider.index_hash(&entries);
        self.indexes.insert(hash, entries);
        self.root = TreeState {
            root_hash: hash,
            generation: self.root.generation.next(),
        };
    }
}

#[async_trait]
impl RemoteTree for MockRemoteTree {
    async fn put_document(&self, name: &str, pdf: &[u8]) -> Result<Entry, RemoteError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_put_document.take() {
            return Err(RemoteError::Http {
                status: 500,
                reason: error,
            });
        }

        let id = DocumentId::new();
        let pdf_hash = Sha256Provider.digest(pdf);
        inner.blobs.insert(pdf_hash, pdf.to_vec());

        let files = vec![Entry::file(pdf_hash, &id.file_name("pdf"), pdf.len() as u64)];
        let doc_hash = Sha256Provider.index_hash(&files);
        inner.indexes.insert(doc_hash, files);
        inner.documents.push(name.to_string());

        Ok(Entry::index(doc_hash, &id.to_string(), 1, pdf.len() as u64))
    }

    async fn get_root_hash(&self) -> Result<TreeState, RemoteError> {
        Ok(self.inner.lock().unwrap().root)
    }

    async fn get_entries(&self, hash: &ContentHash) -> Result<Vec<Entry>, RemoteError> {
        let delay = self.inner.lock().unwrap().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.inner
            .lock()
            .unwrap()
            .indexes
            .get(hash)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(hash.to_hex()))
    }

    async fn put_entries(&self, _index_id: &str, entries: &[Entry]) -> Result<ContentHash, RemoteError> {
        let hash = Sha256Provider.index_hash(entries);
        self.inner
            .lock()
            .unwrap()
            .indexes
            .insert(hash, entries.to_vec());
        Ok(hash)
    }

    async fn put_root_hash(
        &self,
        hash: &ContentHash,
        generation: Generation,
    ) -> Result<Generation, RemoteError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.pending_conflicts > 0 {
            inner.pending_conflicts -= 1;
            inner.foreign_commit();
        }

        if generation != inner.root.generation {
            inner.conflicts_raised += 1;
            return Err(RemoteError::Conflict {
                presented: generation,
            });
        }

        if !inner.indexes.contains_key(hash) {
            return Err(RemoteError::NotFound(hash.to_hex()));
        }

        let committed = inner.root.generation.next();
        inner.root = TreeState {
            root_hash: *hash,
            generation: committed,
        };
        Ok(committed)
    }

    async fn complete_sync(&self, generation: Generation) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_complete.take() {
            return Err(RemoteError::Http {
                status: 500,
                reason: error,
            });
        }

        inner.completed.push(generation);
        Ok(())
    }
}

/// Mock connector mapping device tokens to [`MockRemoteTree`]s.
#[derive(Debug, Default, Clone)]
pub struct MockConnector {
    inner: Arc<Mutex<MockConnectorInner>>,
}

#[derive(Debug, Default)]
struct MockConnectorInner {
    trees: HashMap<String, MockRemoteTree>,
    connects: usize,
}

impl MockConnector {
    /// Create a connector that knows no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device token and return the tree it opens.
    pub fn add_device(&self, token: &str) -> MockRemoteTree {
        let tree = MockRemoteTree::new();
        self.inner
            .lock()
            .unwrap()
            .trees
            .insert(token.to_string(), tree.clone());
        tree
    }

    /// Number of successful connects.
    pub fn connects(&self) -> usize {
        self.inner.lock().unwrap().connects
    }
}

#[async_trait]
impl RemoteConnector for MockConnector {
    async fn connect(&self, device: &Device) -> Result<Arc<dyn RemoteTree>, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        let tree = inner
            .trees
            .get(&device.token)
            .cloned()
            .ok_or_else(|| RemoteError::Auth("unknown device token".to_string()))?;
        inner.connects += 1;
        Ok(Arc::new(tree))
    }
}
