//! Example of implementing a custom hasher for the trees
//!
//! This example demonstrates:
//! - Creating a custom hasher implementation
//! - Using it with the tree
//! - Basic tree operations with the custom hasher

use authdict::{
    DefaultNodeCache, HashValue, Hasher, MemoryStore, SparseMerkleTree, TreeError, TreeOptions,
};
use sha2::{Digest, Sha256};

// Custom hasher that uses SHA256 but adds a prefix to the input
#[derive(Clone)]
struct PrefixedSha256;

impl Hasher for PrefixedSha256 {
    fn compress(&self, left: &HashValue, right: &HashValue) -> HashValue {
        self.compress_many(&[*left, *right])
    }

    fn compress_many(&self, inputs: &[HashValue]) -> HashValue {
        let mut hasher = Sha256::new();
        // Add a custom prefix to the input
        hasher.update(b"custom_prefix:");
        for input in inputs {
            hasher.update(input.as_bytes());
        }
        HashValue::new(hasher.finalize().into())
    }
}

fn main() -> Result<(), TreeError> {
    let cache = DefaultNodeCache::new();

    // Create a new tree with our custom hasher
    let mut tree = SparseMerkleTree::<u64, u64, _, _>::build(
        MemoryStore::new(),
        PrefixedSha256,
        &cache,
        64,
        TreeOptions::default(),
    )?;
    tree.update(&1, Some(&100))?;
    println!("Root hash with custom hasher: {}", tree.root());

    // Compare with standard SHA256
    let mut standard_tree = SparseMerkleTree::<u64, u64>::build(
        MemoryStore::new(),
        Sha256::default(),
        &cache,
        64,
        TreeOptions::default(),
    )?;
    standard_tree.update(&1, Some(&100))?;
    println!("Root hash with standard SHA256: {}", standard_tree.root());

    // Each hasher gets its own default nodes
    println!("Cached default node sets: {}", cache.len());
    println!("\nThe hashes are different because our custom hasher adds a prefix to the input.");
    Ok(())
}
