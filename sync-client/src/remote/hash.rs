//! Content hashing for the remote tree.
//!
//! The hash function is a capability handed to the session at
//! construction time rather than something the session detects on its own.

use paperfeed_types::{ContentHash, Entry};
use sha2::{Digest, Sha256};

/// Computes content addresses.
pub trait HashProvider: Send + Sync + std::fmt::Debug {
    /// Hash a blob.
    fn digest(&self, data: &[u8]) -> ContentHash;

    /// Hash an entry index.
    ///
    /// Computed over the raw child hashes ordered by entry id, so the
    /// result does not depend on the order entries were appended in.
    fn index_hash(&self, entries: &[Entry]) -> ContentHash {
        let mut sorted: Vec<&Entry> = entries.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut buf = Vec::with_capacity(sorted.len() * 32);
        for entry in sorted {
            buf.extend_from_slice(entry.hash.as_bytes());
        }
        self.digest(&buf)
    }
}

/// SHA-256 content addressing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Provider;

impl HashProvider for Sha256Provider {
    fn digest(&self, data: &[u8]) -> ContentHash {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        ContentHash::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        let hash = Sha256Provider.digest(b"abc");
        assert_eq!(
            hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn index_hash_ignores_entry_order() {
        let a = Entry::file(Sha256Provider.digest(b"a"), "a.pdf", 1);
        let b = Entry::file(Sha256Provider.digest(b"b"), "b.pdf", 1);

        let forward = Sha256Provider.index_hash(&[a.clone(), b.clone()]);
        let backward = Sha256Provider.index_hash(&[b, a]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn index_hash_changes_with_content() {
        let a = Entry::file(Sha256Provider.digest(b"a"), "a.pdf", 1);
        let b = Entry::file(Sha256Provider.digest(b"b"), "b.pdf", 1);

        assert_ne!(
            Sha256Provider.index_hash(&[a.clone()]),
            Sha256Provider.index_hash(&[a, b])
        );
    }
}
