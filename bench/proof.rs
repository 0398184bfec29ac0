use authdict::{
    verify_proof, CompactSparseMerkleTree, DefaultNodeCache, HashValue, MemoryStore,
    SparseMerkleTree, TreeOptions, SMT_DEFAULT_HEIGHT,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sha2::Sha256;

pub fn generate_random_value() -> HashValue {
    let mut bytes = [0u8; 32];
    for byte in bytes.iter_mut() {
        *byte = rand::random();
    }
    HashValue::new(bytes)
}

type Smt = SparseMerkleTree<HashValue, HashValue>;
type Csmt = CompactSparseMerkleTree<HashValue, HashValue>;

fn setup_trees(num_leaves: usize) -> (Smt, Csmt, Vec<(HashValue, HashValue)>) {
    let mut regular_tree = Smt::build(
        MemoryStore::new(),
        Sha256::default(),
        &DefaultNodeCache::new(),
        SMT_DEFAULT_HEIGHT,
        TreeOptions::default(),
    )
    .unwrap();
    let mut compact_tree = Csmt::build(
        MemoryStore::new(),
        Sha256::default(),
        256,
        TreeOptions::default(),
    )
    .unwrap();

    let entries: Vec<_> = (0..num_leaves)
        .map(|_| (generate_random_value(), generate_random_value()))
        .collect();
    regular_tree
        .update_all(entries.iter().map(|(key, value)| (key, Some(value))))
        .unwrap();
    compact_tree
        .update_all(entries.iter().map(|(key, value)| (key, Some(value))))
        .unwrap();

    (regular_tree, compact_tree, entries)
}

fn bench_proof_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Proof Generation");

    let (regular_tree, compact_tree, entries) = setup_trees(100);

    group.bench_function("Sparse Merkle Tree", |b| {
        b.iter(|| {
            for (key, _) in &entries {
                black_box(regular_tree.prove(key)).unwrap();
            }
        })
    });

    group.bench_function("Sparse Merkle Tree Compact", |b| {
        b.iter(|| {
            for (key, _) in &entries {
                black_box(regular_tree.prove_compact(key)).unwrap();
            }
        })
    });

    group.bench_function("Compact Sparse Merkle Tree", |b| {
        b.iter(|| {
            for (key, _) in &entries {
                black_box(compact_tree.prove(key)).unwrap();
            }
        })
    });

    group.finish();
}

fn bench_proof_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("Proof Verification");

    let (regular_tree, compact_tree, entries) = setup_trees(100);

    let regular_proofs: Vec<_> = entries
        .iter()
        .map(|(key, value)| {
            let path = regular_tree.key_path(key).unwrap();
            let leaf = regular_tree
                .options()
                .value_hash(regular_tree.hasher(), value)
                .unwrap();
            (regular_tree.prove(key).unwrap(), path, leaf)
        })
        .collect();
    let compact_proofs: Vec<_> = entries
        .iter()
        .map(|(key, _)| compact_tree.prove(key).unwrap())
        .collect();

    group.bench_function("Sparse Merkle Tree", |b| {
        b.iter(|| {
            for (proof, path, leaf) in &regular_proofs {
                assert!(black_box(verify_proof(
                    regular_tree.hasher(),
                    proof,
                    &regular_tree.root(),
                    path,
                    leaf,
                )));
            }
        })
    });

    group.bench_function("Compact Sparse Merkle Tree", |b| {
        b.iter(|| {
            for ((key, value), proof) in entries.iter().zip(compact_proofs.iter()) {
                assert!(black_box(compact_tree.verify(proof, key, Some(value))).unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_proof_generation, bench_proof_verification);
criterion_main!(benches);
