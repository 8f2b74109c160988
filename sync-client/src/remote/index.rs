//! Entry index text format.
//!
//! ```text
//! 3
//! <hash>:80000000:<doc-id>:4:123456
//! <hash>:0:<doc-id>.pdf:0:120000
//! ```
//!
//! The first line is the schema version, followed by one entry per line.

use super::RemoteError;
use paperfeed_types::Entry;

/// Schema version written on the first line of every index.
pub const INDEX_SCHEMA: &str = "3";

/// Serialize entries into an index document.
pub fn encode_index(entries: &[Entry]) -> String {
    let mut out = String::with_capacity(2 + entries.len() * 128);
    out.push_str(INDEX_SCHEMA);
    out.push('\n');
    for entry in entries {
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

/// Parse an index document.
pub fn decode_index(text: &str) -> Result<Vec<Entry>, RemoteError> {
    let mut lines = text.lines();

    match lines.next().map(str::trim) {
        Some(INDEX_SCHEMA) => {}
        Some(other) => {
            return Err(RemoteError::InvalidResponse(format!(
                "unsupported index schema: {other}"
            )))
        }
        None => return Err(RemoteError::InvalidResponse("empty index".to_string())),
    }

    lines
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<Entry>()
                .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
        })
        .collect()
}
