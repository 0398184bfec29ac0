//! Basic example of using the sparse merkle trees
//!
//! This example demonstrates:
//! - Creating a new tree
//! - Inserting and deleting entries
//! - Proving membership and non-membership
//! - Compacting a proof and exchanging it as JSON

use authdict::{
    CompactSparseMerkleProof, CompactSparseMerkleTree, DefaultNodeCache, MemoryStore,
    SparseMerkleTree, TreeError, TreeOptions, SMT_DEFAULT_HEIGHT,
};
use sha2::Sha256;

fn main() -> Result<(), TreeError> {
    // Default nodes are shared by every tree built from the same cache
    let cache = DefaultNodeCache::new();
    let mut tree = SparseMerkleTree::<String, u64>::build(
        MemoryStore::new(),
        Sha256::default(),
        &cache,
        SMT_DEFAULT_HEIGHT,
        TreeOptions::default(),
    )?;

    tree.update_all([
        (&"alice".to_string(), Some(&100)),
        (&"bob".to_string(), Some(&200)),
        (&"carol".to_string(), Some(&300)),
    ])?;
    println!("Root hash: {}", tree.root());
    println!("bob holds {:?}", tree.get(&"bob".to_string())?);

    // Prove that alice holds 100
    let alice = "alice".to_string();
    let proof = tree.prove(&alice)?;
    println!(
        "alice holds 100: {}",
        tree.verify(&proof, &alice, Some(&100))?
    );

    // Proofs are mostly default nodes, the compact form drops them
    let compact = tree.prove_compact(&alice)?;
    let json = compact.to_json()?;
    println!(
        "Compact proof: {} side nodes instead of {}",
        compact.side_nodes.len(),
        tree.height()
    );
    let received = CompactSparseMerkleProof::from_json(&json)?.decompact(tree.default_nodes())?;
    println!("Decompacted proof is valid: {}", tree.verify(&received, &alice, Some(&100))?);

    // Deleting an entry turns its proof into a non-membership proof
    tree.delete(&"carol".to_string())?;
    let carol = "carol".to_string();
    let proof = tree.prove(&carol)?;
    println!("carol is absent: {}", tree.verify(&proof, &carol, None)?);

    // The compact tree keeps leaves at the shallowest unique depth
    let mut compact_tree = CompactSparseMerkleTree::<String, u64>::build(
        MemoryStore::new(),
        Sha256::default(),
        256,
        TreeOptions::default(),
    )?;
    compact_tree.update(&alice, Some(&100))?;
    compact_tree.update(&"bob".to_string(), Some(&200))?;
    let proof = compact_tree.prove(&alice)?;
    println!(
        "Compact tree proof of alice: {} side nodes, valid: {}",
        proof.side_nodes.len(),
        compact_tree.verify(&proof, &alice, Some(&100))?
    );

    Ok(())
}
