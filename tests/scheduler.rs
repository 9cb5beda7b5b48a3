use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use column_ecs::{EcsError, Result, System, SystemDescriptor, World, WorldOptions};

type Log = Arc<Mutex<Vec<&'static str>>>;

struct Tagged {
    name: &'static str,
    frequency: u32,
    priority: i32,
    log: Log,
}

impl System for Tagged {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new(self.name).with_execute(self.frequency, self.priority)
    }
    fn execute(&mut self, _world: &World) -> Result<()> {
        self.log.lock().unwrap().push(self.name);
        Ok(())
    }
}

// Distinct types so each registers as its own system.
struct Early(Tagged);
struct Gated(Tagged);
struct Late(Tagged);

macro_rules! forward_system {
    ($outer:ident) => {
        impl System for $outer {
            fn descriptor(&self) -> SystemDescriptor {
                self.0.descriptor()
            }
            fn execute(&mut self, world: &World) -> Result<()> {
                self.0.execute(world)
            }
        }
    };
}

forward_system!(Early);
forward_system!(Gated);
forward_system!(Late);

#[test]
fn test_priority_order_and_frequency_gate() {
    let world = World::new();
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    world
        .add_system(Late(Tagged {
            name: "late",
            frequency: 1,
            priority: 1,
            log: log.clone(),
        }))
        .unwrap();
    world
        .add_system(Gated(Tagged {
            name: "gated",
            frequency: 5,
            priority: 0,
            log: log.clone(),
        }))
        .unwrap();
    world
        .add_system(Early(Tagged {
            name: "early",
            frequency: 1,
            priority: -1,
            log: log.clone(),
        }))
        .unwrap();

    world.init().unwrap();
    for _ in 0..10 {
        world.update().unwrap();
    }

    let entries = log.lock().unwrap().clone();
    // The gated system fires only when its counter hits a multiple of five.
    assert_eq!(entries.iter().filter(|&&n| n == "gated").count(), 2);
    assert_eq!(entries.iter().filter(|&&n| n == "early").count(), 10);

    // Per tick: early strictly before the rest, late strictly after.
    let mut tick_start = 0;
    for tick in 1..=10 {
        let tick_len = if tick % 5 == 0 { 3 } else { 2 };
        let tick_slice = &entries[tick_start..tick_start + tick_len];
        assert_eq!(tick_slice.first(), Some(&"early"), "tick {tick}");
        assert_eq!(tick_slice.last(), Some(&"late"), "tick {tick}");
        if tick % 5 == 0 {
            assert_eq!(tick_slice[1], "gated", "tick {tick}");
        }
        tick_start += tick_len;
    }
}

struct Failing;
impl System for Failing {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("failing").with_execute(1, 0)
    }
    fn execute(&mut self, _world: &World) -> Result<()> {
        Err(EcsError::UserSystemError("boom".to_string()))
    }
}

struct Counting(Arc<AtomicU32>);
impl System for Counting {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("counting").with_execute(1, 0)
    }
    fn execute(&mut self, _world: &World) -> Result<()> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn test_failure_goes_to_sink_without_cancelling_siblings() {
    let world = World::new();
    let errors = world.subscribe_errors();
    let runs = Arc::new(AtomicU32::new(0));

    world.add_system(Failing).unwrap();
    world.add_system(Counting(runs.clone())).unwrap();

    world.init().unwrap();
    world.update().unwrap();

    // The sibling in the same bucket still ran.
    assert_eq!(runs.load(Ordering::Relaxed), 1);

    let delivered = errors.try_recv().unwrap();
    assert_eq!(delivered.source, "failing");
    assert_eq!(
        delivered.error,
        EcsError::UserSystemError("boom".to_string())
    );

    // The tick itself did not abort.
    world.update().unwrap();
    assert_eq!(runs.load(Ordering::Relaxed), 2);
}

struct RemovesLate;
impl System for RemovesLate {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("removes_late").with_execute(1, 0)
    }
    fn execute(&mut self, world: &World) -> Result<()> {
        world.remove_system::<LateCounter>()
    }
}

struct LateCounter(Arc<AtomicU32>);
impl System for LateCounter {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("late_counter").with_execute(1, 5)
    }
    fn execute(&mut self, _world: &World) -> Result<()> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn test_removal_mid_tick_applies_at_bucket_boundary() {
    let world = World::new();
    let runs = Arc::new(AtomicU32::new(0));

    world.add_system(RemovesLate).unwrap();
    world.add_system(LateCounter(runs.clone())).unwrap();
    world.init().unwrap();

    // The earlier bucket removes the later system; the removal lands at the
    // boundary, so the later bucket never runs it.
    world.update().unwrap();
    assert_eq!(runs.load(Ordering::Relaxed), 0);

    world.update().unwrap();
    assert_eq!(runs.load(Ordering::Relaxed), 0);
}

struct Sibling(Arc<AtomicU32>);
impl System for Sibling {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("sibling_a").with_execute(1, 0)
    }
    fn execute(&mut self, _world: &World) -> Result<()> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct Sibling2(Arc<AtomicU32>);
impl System for Sibling2 {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("sibling_b").with_execute(1, 0)
    }
    fn execute(&mut self, _world: &World) -> Result<()> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn test_parallel_bucket_runs_every_system() {
    let world = World::with_options(WorldOptions {
        parallel: true,
        parallelism: 2,
        ..WorldOptions::default()
    });
    let runs = Arc::new(AtomicU32::new(0));

    world.add_system(Sibling(runs.clone())).unwrap();
    world.add_system(Sibling2(runs.clone())).unwrap();
    world.init().unwrap();

    for _ in 0..50 {
        world.update().unwrap();
    }
    assert_eq!(runs.load(Ordering::Relaxed), 100);
}

struct Lifecycle {
    log: Log,
}
impl System for Lifecycle {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("lifecycle")
            .with_init()
            .with_execute(1, 0)
            .with_end()
    }
    fn init(&mut self, _world: &World) -> Result<()> {
        self.log.lock().unwrap().push("init");
        Ok(())
    }
    fn execute(&mut self, _world: &World) -> Result<()> {
        self.log.lock().unwrap().push("execute");
        Ok(())
    }
    fn end(&mut self, _world: &World) -> Result<()> {
        self.log.lock().unwrap().push("end");
        Ok(())
    }
}

#[test]
fn test_init_execute_end_ordering() {
    let world = World::new();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    world.add_system(Lifecycle { log: log.clone() }).unwrap();

    world.init().unwrap();
    world.update().unwrap();
    world.update().unwrap();
    world.dispose().unwrap();

    assert_eq!(
        log.lock().unwrap().clone(),
        vec!["init", "execute", "execute", "end"]
    );
}
