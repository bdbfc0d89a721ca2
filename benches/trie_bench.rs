//! Benchmarks for the two dictionary variants
//!
//! Compares build and lookup against `HashMap` and `BTreeMap` on dense,
//! prefix-heavy, and random key sets.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::collections::{BTreeMap, HashMap};

use dartrie::{Key, TailTrie, TwoTrie, Value};

fn generate_dense_keys(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("key_{:06}", i).into_bytes())
        .collect()
}

fn generate_prefixed_keys(count: usize) -> Vec<Vec<u8>> {
    let prefixes = ["app", "application", "apply", "banana", "band", "cat", "dog"];
    let mut keys: Vec<Vec<u8>> = (0..count)
        .map(|i| format!("{}_{:04}", prefixes[i % prefixes.len()], i).into_bytes())
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

fn generate_random_keys(count: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut state = seed | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let mut keys: Vec<Vec<u8>> = (0..count)
        .map(|_| (0..8).map(|_| (next() >> 24) as u8).collect())
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

fn build_tail(keys: &[Vec<u8>]) -> TailTrie {
    let mut trie = TailTrie::with_capacity(keys.len());
    for (i, k) in keys.iter().enumerate() {
        trie.insert(&Key::from_bytes(k), (i + 1) as Value).unwrap();
    }
    trie
}

fn build_two(keys: &[Vec<u8>]) -> TwoTrie {
    let mut trie = TwoTrie::with_capacity(keys.len());
    for (i, k) in keys.iter().enumerate() {
        trie.insert(&Key::from_bytes(k), (i + 1) as Value).unwrap();
    }
    trie
}

fn bench_insertion(c: &mut Criterion) {
    let keys = generate_dense_keys(10_000);
    let mut group = c.benchmark_group("insert_dense_10k");
    group.throughput(Throughput::Elements(keys.len() as u64));

    group.bench_function("tail_trie", |b| b.iter(|| black_box(build_tail(&keys))));
    group.bench_function("two_trie", |b| b.iter(|| black_box(build_two(&keys))));
    group.bench_function("hash_map", |b| {
        b.iter(|| {
            let mut map = HashMap::new();
            for (i, k) in keys.iter().enumerate() {
                map.insert(k.clone(), (i + 1) as Value);
            }
            black_box(map)
        })
    });
    group.bench_function("btree_map", |b| {
        b.iter(|| {
            let mut map = BTreeMap::new();
            for (i, k) in keys.iter().enumerate() {
                map.insert(k.clone(), (i + 1) as Value);
            }
            black_box(map)
        })
    });
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    for (name, keys) in [
        ("prefixed", generate_prefixed_keys(10_000)),
        ("random", generate_random_keys(10_000, 0xbeef)),
    ] {
        let tail = build_tail(&keys);
        let two = build_two(&keys);
        let hash: HashMap<Vec<u8>, Value> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), (i + 1) as Value))
            .collect();

        let mut group = c.benchmark_group(format!("lookup_{}_10k", name));
        group.throughput(Throughput::Elements(keys.len() as u64));
        group.bench_function("tail_trie", |b| {
            b.iter(|| {
                for k in &keys {
                    black_box(tail.search(&Key::from_bytes(k)));
                }
            })
        });
        group.bench_function("two_trie", |b| {
            b.iter(|| {
                for k in &keys {
                    black_box(two.search(&Key::from_bytes(k)));
                }
            })
        });
        group.bench_function("hash_map", |b| {
            b.iter(|| {
                for k in &keys {
                    black_box(hash.get(k.as_slice()));
                }
            })
        });
        group.finish();
    }
}

fn bench_prefix_search(c: &mut Criterion) {
    let keys = generate_prefixed_keys(10_000);
    let tail = build_tail(&keys);
    let two = build_two(&keys);

    let mut group = c.benchmark_group("prefix_search");
    group.bench_function("tail_trie", |b| {
        b.iter(|| black_box(tail.prefix_search(&Key::from_bytes(b"app"))))
    });
    group.bench_function("two_trie", |b| {
        b.iter(|| black_box(two.prefix_search(&Key::from_bytes(b"app"))))
    });
    group.finish();
}

criterion_group!(benches, bench_insertion, bench_lookup, bench_prefix_search);
criterion_main!(benches);
