//! Criterion micro-benchmarks for the core tree operations.

use blinktree::BlinkTree;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

/// Deterministic key scramble (Fibonacci hashing) so benches need no RNG.
fn scramble(i: u64) -> u64 {
    i.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn populated(order: usize, n: u64) -> BlinkTree<u64, u64> {
    let tree = BlinkTree::new(order);
    for i in 0..n {
        tree.insert(scramble(i), i).expect("bench keys are unique");
    }
    tree
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert_10k_scrambled", |b| {
        b.iter_batched(
            || BlinkTree::new(16),
            |tree| {
                for i in 0..10_000 {
                    tree.insert(scramble(i), i).expect("bench keys are unique");
                }
                tree
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_search(c: &mut Criterion) {
    let tree = populated(16, 100_000);
    let mut i = 0;
    c.bench_function("search_hit", |b| {
        b.iter(|| {
            i = (i + 1) % 100_000;
            tree.search(&scramble(i)).expect("key present")
        });
    });
}

fn bench_delete_insert_cycle(c: &mut Criterion) {
    let tree = populated(16, 100_000);
    let mut i = 0;
    c.bench_function("delete_then_reinsert", |b| {
        b.iter(|| {
            i = (i + 1) % 100_000;
            let key = scramble(i);
            tree.delete(&key).expect("key present");
            tree.insert(key, i).expect("key just removed");
        });
    });
}

fn bench_scan(c: &mut Criterion) {
    let tree = populated(16, 100_000);
    c.bench_function("iterate_100k", |b| {
        b.iter(|| tree.iter().count());
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_search,
    bench_delete_insert_cycle,
    bench_scan
);
criterion_main!(benches);
