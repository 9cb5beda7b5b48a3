use column_ecs::{Component, World};

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}
impl Component for Velocity {}

#[derive(Default, Debug, Clone, Copy)]
struct Frozen;
impl Component for Frozen {}

#[test]
fn test_query_cache_basic() {
    let world = World::new();

    for i in 0..100 {
        let e = world.create_entity().unwrap();
        let (pos, _vel) = world.add_components::<(Position, Velocity)>(e).unwrap();
        pos.get_mut().unwrap().x = i as f32;
    }

    // First query builds the cache entry.
    let count1 = world.group_of::<(Position, Velocity)>().count();
    assert_eq!(count1, 100);

    // Second query hits it.
    let count2 = world.group_of::<(Position, Velocity)>().count();
    assert_eq!(count2, 100);
}

#[test]
fn test_cached_query_sees_new_archetypes() {
    let world = World::new();

    for _ in 0..50 {
        let e = world.create_entity().unwrap();
        world.add_component::<Position>(e).unwrap();
    }
    assert_eq!(world.group_of::<(Position,)>().count(), 50);

    // A new archetype that also matches the cached query.
    for _ in 0..50 {
        let e = world.create_entity().unwrap();
        world.add_components::<(Position, Frozen)>(e).unwrap();
    }
    assert_eq!(world.group_of::<(Position,)>().count(), 100);

    // An unrelated query entry is unaffected.
    assert_eq!(world.group_of::<(Position, Velocity)>().count(), 0);
}

#[test]
fn test_query_values_are_mutable_in_place() {
    let world = World::new();
    for _ in 0..10 {
        let e = world.create_entity().unwrap();
        let (_pos, vel) = world.add_components::<(Position, Velocity)>(e).unwrap();
        vel.set(Velocity { x: 1.0, y: -1.0 }).unwrap();
    }

    for (_entity, (pos, vel)) in world.group_of::<(Position, Velocity)>() {
        pos.x += vel.x;
        pos.y += vel.y;
    }

    for (_entity, (pos, _vel)) in world.group_of::<(Position, Velocity)>() {
        assert_eq!(pos.x, 1.0);
        assert_eq!(pos.y, -1.0);
    }
}

#[test]
fn test_compaction_preserves_query_results() {
    let world = World::new();
    let entities: Vec<_> = (0..20)
        .map(|_| {
            let e = world.create_entity().unwrap();
            world.add_component::<Position>(e).unwrap();
            e
        })
        .collect();

    for e in entities.iter().step_by(2) {
        world.destroy_entity(*e).unwrap();
    }

    let stats = world.fragmentation_stats();
    assert!(stats.ratio > 0.0);
    assert_eq!(stats.alive, 10);

    world.compact_archetypes().unwrap();
    let stats = world.fragmentation_stats();
    assert_eq!(stats.ratio, 0.0);

    assert_eq!(world.group_of::<(Position,)>().count(), 10);
}

#[test]
fn test_iteration_tolerates_entity_creation() {
    let world = World::new();
    for _ in 0..10 {
        let e = world.create_entity().unwrap();
        world.add_component::<Position>(e).unwrap();
    }

    let mut spawned = Vec::new();
    for (_entity, (_pos,)) in world.group_of::<(Position,)>() {
        // Creating entities mid-iteration may grow columns; the iterator
        // itself must stay well-formed.
        spawned.push(world.create_entity().unwrap());
    }
    assert_eq!(spawned.len(), 10);
    assert_eq!(world.entity_count(), 20);
}
