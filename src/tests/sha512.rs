use hex_literal::hex;
use sha2::{Digest, Sha256, Sha512};

use crate::{
    DefaultNodeCache, HashValue, Hasher, MemoryStore, SparseMerkleTree, TreeOptions, HASH_SIZE,
};

/// SHA-512 truncated to the 32 bytes of a node.
#[derive(Debug, Default, Clone)]
struct Sha512Trunc;

impl Hasher for Sha512Trunc {
    fn compress(&self, left: &HashValue, right: &HashValue) -> HashValue {
        self.compress_many(&[*left, *right])
    }

    fn compress_many(&self, inputs: &[HashValue]) -> HashValue {
        let mut hasher = Sha512::new();
        for input in inputs {
            hasher.update(input.as_bytes());
        }
        let mut bytes = [0; HASH_SIZE];
        bytes.copy_from_slice(&hasher.finalize()[..HASH_SIZE]);
        HashValue::new(bytes)
    }
}

#[test]
fn test_custom_hasher_default_nodes() {
    let cache = DefaultNodeCache::new();
    let defaults = cache.get(&Sha512Trunc, 8);
    assert_eq!(
        defaults[7],
        HashValue::new(hex!(
            "7be9fda48f4179e611c698a73cff09faf72869431efee6eaad14de0cb44bbf66"
        ))
    );
    assert_ne!(defaults[0], cache.get(&Sha256::default(), 8)[0]);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_custom_hasher_tree() {
    let cache = DefaultNodeCache::new();
    let mut tree = SparseMerkleTree::<u64, u64, _, _>::build(
        MemoryStore::new(),
        Sha512Trunc,
        &cache,
        32,
        TreeOptions::default(),
    )
    .unwrap();
    let mut reference = SparseMerkleTree::<u64, u64>::build(
        MemoryStore::new(),
        Sha256::default(),
        &cache,
        32,
        TreeOptions::default(),
    )
    .unwrap();
    tree.update(&1, Some(&100)).unwrap();
    reference.update(&1, Some(&100)).unwrap();
    assert_ne!(tree.root(), reference.root());

    let proof = tree.prove(&1).unwrap();
    assert!(tree.verify(&proof, &1, Some(&100)).unwrap());
    assert!(!reference.verify(&proof, &1, Some(&100)).unwrap());
}
