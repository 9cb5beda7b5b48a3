//! Benchmarks for the storage and query core
//!
//! Run with: cargo bench
//!
//! Measures entity creation, archetype transitions, cached query iteration
//! and handle dereference.

use column_ecs::{Component, World};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

#[derive(Default, Debug, Copy, Clone)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Position {}

#[derive(Default, Debug, Copy, Clone)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Velocity {}

#[derive(Default, Debug, Copy, Clone)]
struct Health(u32);
impl Component for Health {}

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("create");

    for count in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("bare", count), &count, |b, &count| {
            b.iter(|| {
                let world = World::new();
                for _ in 0..count {
                    black_box(world.create_entity().unwrap());
                }
            });
        });

        group.bench_with_input(
            BenchmarkId::new("two_components", count),
            &count,
            |b, &count| {
                b.iter(|| {
                    let world = World::new();
                    for _ in 0..count {
                        let e = world.create_entity().unwrap();
                        world.add_components::<(Position, Velocity)>(e).unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_transition(c: &mut Criterion) {
    c.bench_function("add_remove_component", |b| {
        let world = World::new();
        let entity = world.create_entity().unwrap();
        world.add_component::<Position>(entity).unwrap();

        b.iter(|| {
            world.add_component::<Health>(entity).unwrap();
            world.remove_component::<Health>(entity).unwrap();
        });
    });
}

fn bench_query_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    for count in [1_000, 10_000] {
        let world = World::new();
        for _ in 0..count {
            let e = world.create_entity().unwrap();
            let (_pos, vel) = world.add_components::<(Position, Velocity)>(e).unwrap();
            vel.set(Velocity {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            })
            .unwrap();
        }
        // Warm the cache so the measurement is the hot path.
        let _ = world.group_of::<(Position, Velocity)>().count();

        group.bench_with_input(BenchmarkId::new("integrate", count), &count, |b, _| {
            b.iter(|| {
                for (_entity, (pos, vel)) in world.group_of::<(Position, Velocity)>() {
                    pos.x += vel.x;
                    pos.y += vel.y;
                    pos.z += vel.z;
                }
            });
        });
    }
    group.finish();
}

fn bench_handle_deref(c: &mut Criterion) {
    c.bench_function("handle_deref", |b| {
        let world = World::new();
        let entity = world.create_entity().unwrap();
        let handle = world.add_component::<Position>(entity).unwrap();

        b.iter(|| {
            black_box(handle.get().unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_create,
    bench_transition,
    bench_query_iteration,
    bench_handle_deref
);
criterion_main!(benches);
