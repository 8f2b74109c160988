//! Error types for paperfeed-types.

use thiserror::Error;

/// Errors raised while constructing or parsing model values.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Hash is not 64 hex characters
    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    /// Entry kind marker is unknown
    #[error("invalid entry kind: {0}")]
    InvalidEntryKind(String),

    /// Entry line does not have the expected fields
    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypesError::InvalidEntryKind("7".into());
        assert_eq!(err.to_string(), "invalid entry kind: 7");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
