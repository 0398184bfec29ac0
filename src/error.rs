//! Error types for the authenticated dictionary trees and their stores

use thiserror::Error;

/// Error returned by a [`Store`](crate::Store) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists under the given key.
    #[error("key not found: {0}")]
    NotFound(String),
    /// A record exists but could not be decoded.
    #[error("corrupted record: {0}")]
    Corrupted(String),
    /// RocksDB failed to read or write.
    #[cfg(feature = "rocksdb")]
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

/// Error type for tree operations
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TreeError {
    /// Leaf index exceeds `2^height - 1`.
    #[error("index {index} out of bounds, max index is {max_index}")]
    IndexOutOfBounds { index: u64, max_index: u64 },
    /// Root, node or leaf value is absent where it is required.
    #[error("not found: {0}")]
    NotFound(String),
    /// A proof does not have the shape the tree expects.
    #[error("invalid proof shape: {0}")]
    InvalidProofShape(String),
    /// The field encoding of a key or value has more components than allowed
    /// when hashing is disabled.
    #[error("encoding has {fields} fields but at most {max} are allowed without hashing")]
    UnsupportedValueEncoding { fields: usize, max: usize },
    /// A proof does not recompute the expected root.
    #[error("invalid merkle proof")]
    InvalidMerkleProof,
    /// Tree height is outside of the supported range.
    #[error("invalid tree height {0}")]
    InvalidHeight(usize),
    /// More values were handed to a batch insertion than the subtree can hold.
    #[error("batch of {len} values does not fit a subtree of {max} leaves")]
    BatchTooLarge { len: usize, max: usize },
    /// A caller supplied argument is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Value, hex or json decoding failed.
    #[error("decoding error: {0}")]
    Decode(String),
    /// The store failed for a reason other than a missing key.
    #[error("storage error: {0}")]
    Storage(String),
}

impl TreeError {
    /// Returns true if the error reports a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TreeError::NotFound(_))
    }
}

impl From<StoreError> for TreeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => TreeError::NotFound(key),
            other => TreeError::Storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for TreeError {
    fn from(err: serde_json::Error) -> Self {
        TreeError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::{StoreError, TreeError};

    #[test]
    fn test_store_not_found_maps_to_tree_not_found() {
        let err: TreeError = StoreError::NotFound("abc".to_string()).into();
        assert_eq!(err, TreeError::NotFound("abc".to_string()));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_store_corruption_maps_to_storage() {
        let err: TreeError = StoreError::Corrupted("bad length".to_string()).into();
        assert_eq!(
            err,
            TreeError::Storage("corrupted record: bad length".to_string())
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            TreeError::IndexOutOfBounds {
                index: 8,
                max_index: 7
            }
            .to_string(),
            "index 8 out of bounds, max index is 7"
        );
        assert_eq!(
            TreeError::InvalidMerkleProof.to_string(),
            "invalid merkle proof"
        );
    }
}
