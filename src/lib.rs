//! Authenticated dictionaries
//!
//! This crate provides merkle trees committing to a mapping with a single
//! root hash, and the proofs of membership and non-membership of entries
//! against that root.
//!
//! The trees are:
//! - [`SparseMerkleTree`]: fixed height tree keyed by (hashed) keys
//! - [`CompactSparseMerkleTree`]: keyed tree with domain separated leaves and
//!   nodes, where leaves sit at the shallowest unique depth
//! - [`StandardTree`]: append-only tree addressed by leaf index
//! - [`StandardIndexedTree`]: append-only tree whose leaves form a sorted
//!   linked list, with batch insertion
//! - [`DeepSparseMerkleSubTree`] and [`CompactDeepSparseMerkleSubTree`]:
//!   in-memory trees rebuilt from a few proven branches
//!
//! All of them persist through the [`Store`] trait and hash through the
//! [`Hasher`] trait.

mod db;
mod error;
mod node;
mod proof;
mod tree;

#[cfg(feature = "rocksdb")]
pub use db::{column_families, default_db_opts, open_rocksdb, RocksDbStore};
pub use db::{MemoryStore, Operation, OperationCache, Store, ThreadSafe};
pub use error::{StoreError, TreeError};
pub use node::{
    bit_index, count_common_prefix, decode_fields, encode_fields, CompactNode, FieldCodec,
    HashValue, Hasher, LinkedLeaf, TreeHasher, TreeOptions, HASH_SIZE,
};
pub use proof::{
    compute_root, verify_non_membership, verify_proof, verify_sibling_path, CompactCsmtProof,
    CompactSparseMerkleProof, CsmtProof, LowLeafWitness, SiblingPath, SparseMerkleProof,
};
pub use tree::{
    walk_up, BatchInsertion, CompactDeepSparseMerkleSubTree, CompactSparseMerkleTree,
    DeepSparseMerkleSubTree, DefaultNodeCache, IndexedTree, MerkleTree, SparseMerkleTree,
    StandardIndexedTree, StandardTree, MAX_STANDARD_HEIGHT, SMT_DEFAULT_HEIGHT,
};

/// The bundled hasher: `compress(a, b) = sha256(a || b)`.
pub type Sha256Hasher = sha2::Sha256;

#[cfg(test)]
mod tests;
