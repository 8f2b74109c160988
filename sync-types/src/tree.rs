//! Remote document tree versions and entries.

use crate::error::TypesError;
use crate::ids::{ContentHash, Generation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The committed version of a user's remote tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeState {
    /// Hash of the root entry index.
    pub root_hash: ContentHash,
    /// CAS token to present when committing a new root.
    pub generation: Generation,
}

/// What an entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// An index of further entries (a document or folder).
    Index,
    /// A single file blob.
    File,
}

impl EntryKind {
    /// Wire marker used in entry index lines.
    pub fn marker(&self) -> &'static str {
        match self {
            EntryKind::Index => "80000000",
            EntryKind::File => "0",
        }
    }
}

impl FromStr for EntryKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "80000000" => Ok(EntryKind::Index),
            "0" => Ok(EntryKind::File),
            other => Err(TypesError::InvalidEntryKind(other.to_string())),
        }
    }
}

/// A reference to one object inside the remote tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    /// Content address of the referenced object.
    pub hash: ContentHash,
    /// Index or file.
    pub kind: EntryKind,
    /// Document id or file name.
    pub id: String,
    /// Number of files below an index entry (0 for files).
    pub subfiles: u32,
    /// Total byte size.
    pub size: u64,
}

impl Entry {
    /// Entry for a single file blob.
    pub fn file(hash: ContentHash, id: &str, size: u64) -> Self {
        Self {
            hash,
            kind: EntryKind::File,
            id: id.to_string(),
            subfiles: 0,
            size,
        }
    }

    /// Entry for an index of `subfiles` files.
    pub fn index(hash: ContentHash, id: &str, subfiles: u32, size: u64) -> Self {
        Self {
            hash,
            kind: EntryKind::Index,
            id: id.to_string(),
            subfiles,
            size,
        }
    }
}

/// Line form: `hash:kind:id:subfiles:size`.
impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.hash,
            self.kind.marker(),
            self.id,
            self.subfiles,
            self.size
        )
    }
}

impl FromStr for Entry {
    type Err = TypesError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != 5 {
            return Err(TypesError::InvalidEntry(line.to_string()));
        }
        let invalid = || TypesError::InvalidEntry(line.to_string());

        Ok(Self {
            hash: fields[0].parse()?,
            kind: fields[1].parse()?,
            id: fields[2].to_string(),
            subfiles: fields[3].parse().map_err(|_| invalid())?,
            size: fields[4].parse().map_err(|_| invalid())?,
        })
    }
}
