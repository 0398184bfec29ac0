//! Example of an indexed merkle tree
//!
//! This example demonstrates:
//! - Building an indexed tree
//! - Inserting values one by one and in batches
//! - Proving that a value is absent with its low leaf

use authdict::{
    DefaultNodeCache, HashValue, IndexedTree, MemoryStore, MerkleTree, StandardIndexedTree,
    TreeError,
};
use sha2::Sha256;

fn main() -> Result<(), TreeError> {
    let mut tree = StandardIndexedTree::build(
        MemoryStore::new(),
        Sha256::default(),
        &DefaultNodeCache::new(),
        "nullifiers",
        20,
        1,
    )?;

    for value in [5, 10, 15] {
        tree.append_leaf(HashValue::from_u64(value))?;
    }
    tree.commit()?;
    println!("Root after single inserts: {}", tree.root(false));

    // 2 and 3 share their low leaf: 3 is linked after the pending leaf of 2
    let batch = [2, 3, 20, 19].map(HashValue::from_u64);
    let insertion = tree.batch_insert(&batch, 2)?;
    match &insertion.low_leaf_witnesses {
        Some(witnesses) => {
            for (value, witness) in batch.iter().zip(witnesses) {
                if witness.is_empty() {
                    println!("{value}: low leaf is part of the batch");
                } else {
                    println!("{value}: low leaf at index {}", witness.index);
                }
            }
        }
        None => println!("A low leaf could not be found"),
    }
    tree.commit()?;

    // Absence of 12 is proven by the leaf holding 10
    let missing = HashValue::from_u64(12);
    let witness = tree.low_leaf_witness(&missing)?;
    println!(
        "12 is absent: {} (low leaf {})",
        witness.verify_non_membership(tree.hasher(), &tree.root(false), &missing),
        witness.leaf
    );

    Ok(())
}
