use authdict::{
    CompactSparseMerkleTree, DefaultNodeCache, HashValue, IndexedTree, MemoryStore,
    SparseMerkleTree, StandardIndexedTree, TreeOptions, SMT_DEFAULT_HEIGHT,
};
use criterion::{criterion_group, criterion_main, Criterion};
use sha2::Sha256;

pub fn generate_random_value() -> HashValue {
    let mut bytes = [0u8; 32];
    for byte in bytes.iter_mut() {
        *byte = rand::random();
    }
    HashValue::new(bytes)
}

fn bench_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("Insertion");
    let cache = DefaultNodeCache::new();

    group.bench_function("Sparse Merkle Tree", |b| {
        b.iter(|| {
            let mut tree = SparseMerkleTree::<HashValue, HashValue>::build(
                MemoryStore::new(),
                Sha256::default(),
                &cache,
                SMT_DEFAULT_HEIGHT,
                TreeOptions::default(),
            )
            .unwrap();
            for _ in 0..100 {
                tree.update(&generate_random_value(), Some(&generate_random_value()))
                    .unwrap();
            }
        })
    });

    group.bench_function("Compact Sparse Merkle Tree", |b| {
        b.iter(|| {
            let mut tree = CompactSparseMerkleTree::<HashValue, HashValue>::build(
                MemoryStore::new(),
                Sha256::default(),
                256,
                TreeOptions::default(),
            )
            .unwrap();
            for _ in 0..100 {
                tree.update(&generate_random_value(), Some(&generate_random_value()))
                    .unwrap();
            }
        })
    });

    // Values fit in 64 bits so that the scan stays the dominant cost.
    group.bench_function("Indexed Tree Batch", |b| {
        b.iter(|| {
            let mut tree = StandardIndexedTree::build(
                MemoryStore::new(),
                Sha256::default(),
                &cache,
                "bench",
                20,
                1,
            )
            .unwrap();
            let values: Vec<_> = (0..64)
                .map(|_| HashValue::from_u64(rand::random::<u32>() as u64 + 1))
                .collect();
            tree.batch_insert(&values, 6).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_insertion);
criterion_main!(benches);
