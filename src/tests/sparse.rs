use std::collections::BTreeMap;

use rand::{rngs::StdRng, Rng, SeedableRng};
use sha2::Sha256;

use crate::{
    verify_non_membership, verify_proof, CompactCsmtProof, CompactSparseMerkleProof,
    CompactSparseMerkleTree, DefaultNodeCache, HashValue, MemoryStore, SparseMerkleTree,
    TreeOptions,
};

/// Random updates, a third of them deletions, over a small key space so that
/// keys get overwritten and deleted again.
fn random_updates(seed: u64, count: usize) -> Vec<(u64, Option<u64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let key = rng.gen_range(0..64);
            let value = (rng.gen_range(0..3) != 0).then(|| rng.gen_range(1..1000));
            (key, value)
        })
        .collect()
}

fn apply(model: &mut BTreeMap<u64, u64>, updates: &[(u64, Option<u64>)]) {
    for (key, value) in updates {
        match value {
            Some(value) => model.insert(*key, *value),
            None => model.remove(key),
        };
    }
}

#[test]
fn test_smt_random_updates() {
    let cache = DefaultNodeCache::new();
    let mut tree = SparseMerkleTree::<u64, u64>::build(
        MemoryStore::new(),
        Sha256::default(),
        &cache,
        64,
        TreeOptions::default(),
    )
    .unwrap();
    let updates = random_updates(7, 200);
    let mut model = BTreeMap::new();
    for (key, value) in &updates {
        tree.update(key, value.as_ref()).unwrap();
    }
    apply(&mut model, &updates);

    for key in 0..64u64 {
        assert_eq!(tree.get(&key).unwrap(), model.get(&key).copied());
        let proof = tree.prove(&key).unwrap();
        assert!(tree.verify(&proof, &key, model.get(&key)).unwrap());

        let path = tree.key_path(&key).unwrap();
        match model.get(&key) {
            Some(value) => {
                let leaf = tree.options().value_hash(tree.hasher(), value).unwrap();
                assert!(verify_proof(tree.hasher(), &proof, &tree.root(), &path, &leaf));
                assert!(!verify_non_membership(tree.hasher(), &proof, &tree.root(), &path));
            }
            None => {
                assert!(verify_non_membership(tree.hasher(), &proof, &tree.root(), &path))
            }
        }

        // Compaction changes the encoding, never the verification outcome.
        let compact = proof.compact(tree.default_nodes()).unwrap();
        let json = compact.to_json().unwrap();
        let decoded = CompactSparseMerkleProof::from_json(&json).unwrap();
        assert_eq!(decoded, compact);
        let restored = decoded.decompact(tree.default_nodes()).unwrap();
        assert_eq!(restored, proof);
        assert!(tree.verify(&restored, &key, model.get(&key)).unwrap());
    }

    // Same content, one batch, reversed order.
    let mut rebuilt = SparseMerkleTree::<u64, u64>::build(
        MemoryStore::new(),
        Sha256::default(),
        &cache,
        64,
        TreeOptions::default(),
    )
    .unwrap();
    rebuilt
        .update_all(model.iter().rev().map(|(key, value)| (key, Some(value))))
        .unwrap();
    assert_eq!(rebuilt.root(), tree.root());
}

#[test]
fn test_csmt_random_updates() {
    let mut tree = CompactSparseMerkleTree::<u64, u64>::build(
        MemoryStore::new(),
        Sha256::default(),
        256,
        TreeOptions::default(),
    )
    .unwrap();
    let updates = random_updates(11, 200);
    let mut model = BTreeMap::new();
    tree.update_all(updates.iter().map(|(key, value)| (key, value.as_ref())))
        .unwrap();
    apply(&mut model, &updates);

    for key in 0..64u64 {
        assert_eq!(tree.get(&key).unwrap(), model.get(&key).copied());
        let proof = tree.prove(&key).unwrap();
        assert!(tree.verify(&proof, &key, model.get(&key)).unwrap());
        assert!(!tree.verify(&proof, &key, Some(&0)).unwrap());

        let compact = proof.compact(tree.tree_hasher(), tree.height()).unwrap();
        let decoded = CompactCsmtProof::from_json(&compact.to_json().unwrap()).unwrap();
        let restored = decoded
            .decompact(tree.tree_hasher(), tree.height())
            .unwrap();
        assert_eq!(restored, proof);
    }

    let mut rebuilt = CompactSparseMerkleTree::<u64, u64>::build(
        MemoryStore::new(),
        Sha256::default(),
        256,
        TreeOptions::default(),
    )
    .unwrap();
    for (key, value) in model.iter().rev() {
        rebuilt.update(key, Some(value)).unwrap();
    }
    assert_eq!(rebuilt.root(), tree.root());
}

#[test]
fn test_updates_are_idempotent() {
    let mut tree = SparseMerkleTree::<HashValue, HashValue>::build(
        MemoryStore::new(),
        Sha256::default(),
        &DefaultNodeCache::new(),
        32,
        TreeOptions::default(),
    )
    .unwrap();
    let key = HashValue::from_u64(5);
    let value = HashValue::from_u64(6);
    let root = tree.update(&key, Some(&value)).unwrap();
    let operations = tree.store().get_nodes_map().len();
    assert_eq!(tree.update(&key, Some(&value)).unwrap(), root);
    assert_eq!(tree.store().get_nodes_map().len(), operations);
}

#[cfg(feature = "rocksdb")]
#[test]
fn test_smt_on_rocksdb() {
    use crate::{open_rocksdb, RocksDbStore};

    let dir = tempfile::tempdir().unwrap();
    let db = open_rocksdb(dir.path()).unwrap();
    let cache = DefaultNodeCache::new();
    let mut memory = SparseMerkleTree::<u64, u64>::build(
        MemoryStore::new(),
        Sha256::default(),
        &cache,
        64,
        TreeOptions::default(),
    )
    .unwrap();
    let mut tree = SparseMerkleTree::<u64, u64, _>::build(
        RocksDbStore::new(db.clone(), "smt"),
        Sha256::default(),
        &cache,
        64,
        TreeOptions::default(),
    )
    .unwrap();
    let updates = random_updates(3, 50);
    for (key, value) in &updates {
        memory.update(key, value.as_ref()).unwrap();
        tree.update(key, value.as_ref()).unwrap();
    }
    assert_eq!(tree.root(), memory.root());

    let imported = SparseMerkleTree::<u64, u64, _>::import(
        RocksDbStore::new(db, "smt"),
        Sha256::default(),
        &cache,
        64,
        TreeOptions::default(),
    )
    .unwrap();
    assert_eq!(imported.root(), memory.root());
    for key in 0..64u64 {
        assert_eq!(imported.get(&key).unwrap(), memory.get(&key).unwrap());
    }
}
