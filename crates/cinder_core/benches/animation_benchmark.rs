//! # Animation Benchmark
//!
//! Measures the three update passes with a full pool and the cost of
//! starting and cancelling animations.
//!
//! Run with: `cargo bench --package cinder_core --bench animation_benchmark`

#![allow(missing_docs)]

use std::sync::Arc;

use cinder_core::{
    register_animation_component, AnimateParams, AnimationConfig, Collection, CollectionConfig, InstanceId,
    Playback, PropertyVar, Registry, UpdateContext,
};
use cinder_shared::hash_str;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn collection(instances: u32) -> (Collection, Vec<InstanceId>) {
    let mut registry = Registry::new();
    register_animation_component(&mut registry, AnimationConfig::default()).expect("register");
    let mut collection =
        Collection::new("bench", Arc::new(registry), CollectionConfig::with_max_instances(instances))
            .expect("collection");
    let ids = (0..instances).map(|_| collection.new_instance(None).expect("slot")).collect();
    (collection, ids)
}

fn bench_update_looping(c: &mut Criterion) {
    let mut group = c.benchmark_group("animation_update");
    for count in [1_000_u32, 10_000, 30_000] {
        let (mut collection, ids) = collection(count / 3);
        for &id in &ids {
            collection
                .animate(
                    id,
                    0,
                    hash_str("position"),
                    AnimateParams::new(PropertyVar::Number(5.0), 1.0).with_playback(Playback::LoopPingPong),
                )
                .expect("pool");
        }
        let frame = UpdateContext::new(1.0 / 60.0);
        group.bench_with_input(BenchmarkId::from_parameter(collection.animation_count()), &(), |b, _| {
            b.iter(|| black_box(collection.update(&frame)));
        });
    }
    group.finish();
}

fn bench_play_cancel(c: &mut Criterion) {
    let (mut collection, ids) = collection(1_000);
    let x = hash_str("position.x");
    c.bench_function("play_cancel_1000", |b| {
        b.iter(|| {
            for &id in &ids {
                collection
                    .animate(id, 0, x, AnimateParams::new(PropertyVar::Number(1.0), 1.0))
                    .expect("pool");
            }
            for &id in &ids {
                collection.cancel_all_animations(id);
            }
            black_box(collection.animation_count())
        });
    });
}

criterion_group!(benches, bench_update_looping, bench_play_cancel);
criterion_main!(benches);
