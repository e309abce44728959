//! # Collection Benchmark
//!
//! - Create/delete churn through the deferred queues
//! - Transform pass over a deep and a wide hierarchy
//!
//! Run with: `cargo bench --package cinder_core --bench collection_benchmark`

#![allow(missing_docs)]

use std::sync::Arc;

use cinder_core::{Collection, CollectionConfig, InstanceId, Registry};
use cinder_shared::Vec3;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const CAPACITY: u32 = 8192;

fn collection() -> Collection {
    Collection::new("bench", Arc::new(Registry::new()), CollectionConfig::with_max_instances(CAPACITY))
        .expect("collection")
}

fn bench_create_delete_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_delete_cycle");
    for count in [100_u32, 1_000, 4_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut collection = collection();
            b.iter(|| {
                let ids: Vec<InstanceId> =
                    (0..count).map(|_| collection.new_instance(None).expect("slot")).collect();
                for &id in &ids {
                    collection.delete(id, false).expect("live");
                }
                black_box(collection.post_update())
            });
        });
    }
    group.finish();
}

/// Builds `width` chains of `depth` instances.
fn forest(collection: &mut Collection, width: u32, depth: u32) {
    for _ in 0..width {
        let mut parent = collection.new_instance(None).expect("slot");
        collection.set_position(parent, Vec3::new(1.0, 0.0, 0.0)).expect("live");
        for _ in 1..depth {
            let child = collection.new_instance(None).expect("slot");
            collection.set_position(child, Vec3::new(0.0, 1.0, 0.0)).expect("live");
            collection.set_parent(child, Some(parent)).expect("depth");
            parent = child;
        }
    }
}

fn bench_transform_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_pass");
    for (width, depth) in [(8000, 1), (800, 10), (80, 100)] {
        let mut collection = collection();
        forest(&mut collection, width, depth);
        group.bench_function(BenchmarkId::new("width_depth", format!("{width}x{depth}")), |b| {
            b.iter(|| {
                collection.update_transforms();
                black_box(collection.instance_count())
            });
        });
    }
    group.finish();
}

fn bench_reparent(c: &mut Criterion) {
    let mut collection = collection();
    forest(&mut collection, 1, 64);
    let roots: Vec<InstanceId> = collection.level(0).collect();
    let other = collection.new_instance(None).expect("slot");

    c.bench_function("reparent_subtree_64", |b| {
        b.iter(|| {
            collection.set_parent(roots[0], Some(other)).expect("depth");
            collection.set_parent(roots[0], None).expect("depth");
            black_box(collection.depth(roots[0]))
        });
    });
}

criterion_group!(benches, bench_create_delete_cycle, bench_transform_pass, bench_reparent);
criterion_main!(benches);
