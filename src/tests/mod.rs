//! Tests spanning several trees and the proof formats

mod sha512;
mod sparse;

use hex_literal::hex;
use sha2::Sha256;

use crate::{
    DefaultNodeCache, HashValue, IndexedTree, MemoryStore, MerkleTree, StandardIndexedTree,
    StandardTree,
};

#[test]
fn test_default_nodes() {
    let defaults = DefaultNodeCache::new().get(&Sha256::default(), 2);
    assert_eq!(
        defaults.as_ref(),
        &[
            HashValue::new(hex!(
                "db56114e00fdd4c1f85c892bf35ac9a89289aaecb1ebd0a96cde606a748b5d71"
            )),
            HashValue::new(hex!(
                "f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"
            )),
            HashValue::ZERO,
        ]
    );
}

#[test]
fn test_standard_tree_root() {
    let mut tree = StandardTree::build(
        MemoryStore::new(),
        Sha256::default(),
        &DefaultNodeCache::new(),
        "standard",
        2,
    )
    .unwrap();
    let leaves: Vec<_> = (1..=4).map(HashValue::from_u64).collect();
    tree.append_leaves(&leaves).unwrap();
    tree.commit().unwrap();
    assert_eq!(
        tree.root(false),
        HashValue::new(hex!(
            "d7351286df93d1e31e51c21378fba9f9c7c14c3a8f621065069809b6e635ae0a"
        ))
    );
}

#[test]
fn test_indexed_tree_root() {
    let tree = StandardIndexedTree::build(
        MemoryStore::new(),
        Sha256::default(),
        &DefaultNodeCache::new(),
        "indexed",
        2,
        1,
    )
    .unwrap();
    assert_eq!(
        tree.leaf_value(0, false).unwrap(),
        Some(HashValue::new(hex!(
            "2ea9ab9198d1638007400cd2c3bef1cc745b864b76011a0e1bc52180ac6452d4"
        )))
    );
    assert_eq!(
        tree.root(false),
        HashValue::new(hex!(
            "c7710ce6569191a6a3b904abefca4848b09dfdc9e2c2d98e038153d1b083beac"
        ))
    );
    assert_eq!(
        tree.find_index_of_previous_value(&HashValue::from_u64(1), false),
        (0, false)
    );
}

#[test]
fn test_trees_share_a_store() {
    let cache = DefaultNodeCache::new();
    let mut first = StandardTree::build(MemoryStore::new(), Sha256::default(), &cache, "a", 4)
        .unwrap();
    first.append_leaves(&[HashValue::from_u64(1)]).unwrap();
    first.commit().unwrap();

    let mut second =
        StandardTree::build(first.store().clone(), Sha256::default(), &cache, "b", 4).unwrap();
    second.append_leaves(&[HashValue::from_u64(2)]).unwrap();
    second.commit().unwrap();

    let store = second.store().clone();
    let a = StandardTree::import(store.clone(), Sha256::default(), &cache, "a").unwrap();
    let b = StandardTree::import(store, Sha256::default(), &cache, "b").unwrap();
    assert_eq!(a.root(false), first.root(false));
    assert_eq!(b.root(false), second.root(false));
    assert_ne!(a.root(false), b.root(false));
}
