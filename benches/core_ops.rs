// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Core B+Tree operation benchmarks.
//!
//! Measures performance of:
//! - insert() - keyed insertion with splits
//! - search() - point lookup
//! - range_search() - sibling-chain scan
//! - remove() - deletion with borrow/merge repair

use blockbase::btree::BTreeIndex;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tempfile::TempDir;

/// 4KB blocks give order 341; the shape production files would use.
const BLOCK_SIZE: u32 = 4096;

/// Build a tree holding keys 0..n in scattered order.
fn build_tree(dir: &TempDir, n: i32) -> BTreeIndex {
    let mut tree = BTreeIndex::create(dir.path().join("bench.btree"), BLOCK_SIZE).unwrap();
    let mut key: i64 = 1;
    for _ in 0..n {
        key = (key * 48271) % (n as i64 + 1);
        tree.insert(key as i32, key * 10).unwrap();
    }
    tree
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.sample_size(20); // Each iteration builds a whole tree

    for size in [1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &n| {
            b.iter_batched(
                TempDir::new,
                |dir| {
                    let dir = dir.unwrap();
                    black_box(build_tree(&dir, n));
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for size in [1_000, 10_000, 100_000].iter() {
        let dir = TempDir::new().unwrap();
        let tree = build_tree(&dir, *size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &n| {
            let mut key = 0;
            b.iter(|| {
                key = (key + 7919) % n;
                black_box(tree.search(key).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_range_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_search");

    let dir = TempDir::new().unwrap();
    let tree = build_tree(&dir, 100_000);

    for width in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, &w| {
            b.iter(|| {
                black_box(tree.range_search(50_000, 50_000 + w).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove");
    group.sample_size(20);

    for size in [1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &n| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    let tree = build_tree(&dir, n);
                    (dir, tree)
                },
                |(_dir, mut tree)| {
                    for key in 0..n {
                        black_box(tree.remove(key).unwrap());
                    }
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_search,
    bench_range_search,
    bench_remove
);
criterion_main!(benches);
