// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! World: entity directory, columns, archetype partition and lifecycle
//!
//! The world is a shared resource: systems receive `&World` and all mutation
//! goes through interior locking. A single structural mutex guards the
//! entity directory, column growth, the archetype partition and query-cache
//! writes; query-cache reads and registry reads stay off that mutex.
//!
//! # Shared-slot discipline
//!
//! Component slots are mutable shared state. A slot is mutated only through
//! a handle or query bundle the caller holds; two systems in the same
//! priority bucket writing one slot is a domain-level race the runtime does
//! not arbitrate. References obtained from handles or query bundles are
//! invalidated by any operation that can grow columns (entity creation,
//! capacity reservation) — re-dereference through the handle afterwards.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crossbeam::channel::Receiver;
use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use tracing::debug;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::ArchetypePartition;
use crate::component::{Component, ComponentSet, MAX_SET_COMPONENTS};
use crate::entity::{EntityDirectory, EntityHandle, SINGLETON_ID};
use crate::error::{EcsError, Result};
use crate::executor::{self, PhaseKind};
use crate::handle::ComponentHandle;
use crate::query::{Group, QueryCache, QueryTuple};
use crate::registry::TypeRegistry;
use crate::schedule::{Schedule, ScheduleOp};
use crate::sink::{ErrorSink, SystemError};
use crate::storage::{ColumnStore, SingletonStore};
use crate::system::System;
use crate::tag::Tag;

const PHASE_CREATED: u8 = 0;
const PHASE_INITIALIZED: u8 = 1;
const PHASE_DISPOSED: u8 = 2;

/// World construction options
#[derive(Debug, Clone)]
pub struct WorldOptions {
    /// Run systems within a priority bucket concurrently
    pub parallel: bool,

    /// Worker threads for parallel buckets; -1 uses all cores
    pub parallelism: i32,

    /// Entity slots reserved up front
    pub initial_entity_capacity: u32,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            parallelism: -1,
            initial_entity_capacity: 1024,
        }
    }
}

/// Snapshot of archetype slot usage
#[derive(Debug, Clone, Copy)]
pub struct FragmentationStats {
    /// Slots across all archetypes, tombstones included
    pub total_slots: u32,
    /// Non-tombstoned members
    pub alive: u32,
    /// `1 - alive / total_slots`
    pub ratio: f32,
}

/// Everything the structural mutex guards
pub(crate) struct WorldState {
    pub(crate) directory: EntityDirectory,
    pub(crate) columns: ColumnStore,
    pub(crate) singletons: SingletonStore,
    pub(crate) partition: ArchetypePartition,
}

impl WorldState {
    fn new(entity_capacity: usize) -> Self {
        let directory = EntityDirectory::new(entity_capacity);
        let span = directory.len();
        Self {
            directory,
            columns: ColumnStore::new(span),
            singletons: SingletonStore::new(),
            partition: ArchetypePartition::new(),
        }
    }

    /// Generation-then-liveness validation for an entity handle.
    fn validate(&self, entity: EntityHandle) -> Result<()> {
        if self.directory.generation(entity.id()) != entity.generation() {
            return Err(EcsError::EntityDestroyed);
        }
        if !self.directory.is_alive(entity.id()) {
            return Err(EcsError::EntityNotFound);
        }
        Ok(())
    }
}

/// Central ECS world
pub struct World {
    state: Mutex<WorldState>,
    cache: QueryCache,
    schedule: Mutex<Schedule>,
    pending: Mutex<Vec<ScheduleOp>>,
    phase: AtomicU8,
    sink: ErrorSink,
    options: WorldOptions,
    transitions: AtomicU64,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// World with default options
    pub fn new() -> Self {
        Self::with_options(WorldOptions::default())
    }

    /// World with explicit options
    pub fn with_options(options: WorldOptions) -> Self {
        #[cfg(feature = "parallel")]
        let pool = if options.parallel {
            let threads = if options.parallelism <= 0 {
                0 // rayon default: all cores
            } else {
                options.parallelism as usize
            };
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .ok()
        } else {
            None
        };

        Self {
            state: Mutex::new(WorldState::new(options.initial_entity_capacity.max(1) as usize)),
            cache: QueryCache::new(),
            schedule: Mutex::new(Schedule::new()),
            pending: Mutex::new(Vec::new()),
            phase: AtomicU8::new(PHASE_CREATED),
            sink: ErrorSink::new(),
            options,
            transitions: AtomicU64::new(0),
            #[cfg(feature = "parallel")]
            pool,
        }
    }

    // ========== Lifecycle ==========

    /// Run all init systems in priority order. Must be called exactly once,
    /// before the first `update`.
    pub fn init(&self) -> Result<()> {
        self.phase
            .compare_exchange(
                PHASE_CREATED,
                PHASE_INITIALIZED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|phase| match phase {
                PHASE_DISPOSED => EcsError::LifecycleMisuse("init on a disposed world"),
                _ => EcsError::LifecycleMisuse("init called twice"),
            })?;

        let mut schedule = self.schedule.lock();
        self.drain_pending_systems(&mut schedule);
        let plan = schedule.init_plan();
        executor::run_phase(self, &mut schedule, plan, PhaseKind::Init);
        Ok(())
    }

    /// Run one tick over the execute systems.
    pub fn update(&self) -> Result<()> {
        match self.phase.load(Ordering::Acquire) {
            PHASE_CREATED => return Err(EcsError::LifecycleMisuse("update before init")),
            PHASE_DISPOSED => return Err(EcsError::LifecycleMisuse("update on a disposed world")),
            _ => {}
        }

        let mut schedule = self
            .schedule
            .try_lock()
            .ok_or(EcsError::LifecycleMisuse("update re-entered from a system"))?;
        self.drain_pending_systems(&mut schedule);
        let plan = schedule.tick_plan();
        executor::run_phase(self, &mut schedule, plan, PhaseKind::Execute);
        Ok(())
    }

    /// Run all end systems and tear the world down.
    pub fn dispose(&self) -> Result<()> {
        if self.phase.load(Ordering::Acquire) == PHASE_DISPOSED {
            return Err(EcsError::LifecycleMisuse("dispose called twice"));
        }

        {
            let mut schedule = self.schedule.lock();
            self.drain_pending_systems(&mut schedule);
            let plan = schedule.end_plan();
            executor::run_phase(self, &mut schedule, plan, PhaseKind::End);
        }

        self.phase.store(PHASE_DISPOSED, Ordering::Release);
        *self.state.lock() = WorldState::new(1);
        self.cache.clear();
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.phase.load(Ordering::Acquire) == PHASE_DISPOSED {
            return Err(EcsError::LifecycleMisuse("world disposed"));
        }
        Ok(())
    }

    // ========== Entity API ==========

    /// Allocate an entity with an empty tag.
    pub fn create_entity(&self) -> Result<EntityHandle> {
        self.ensure_usable()?;
        let mut state = self.state.lock();

        let id = state.directory.allocate();
        let span = state.directory.len();
        state.columns.grow_id_space(span);

        let empty = Tag::new();
        let (archetype_id, created) = state.partition.get_or_create(&empty);
        if created {
            self.on_archetype_created(&empty, archetype_id);
        }
        state.partition.get_mut(archetype_id).add(id);

        let generation = state.directory.generation(id);
        Ok(EntityHandle::new(id, generation))
    }

    /// Destroy an entity immediately. The id becomes reusable; the bumped
    /// generation invalidates every outstanding handle to it.
    pub fn destroy_entity(&self, entity: EntityHandle) -> Result<()> {
        self.ensure_usable()?;
        if entity.id() == SINGLETON_ID {
            return Err(EcsError::InvalidSingleton);
        }

        let mut state = self.state.lock();
        state.validate(entity)?;

        let tag = state.directory.tag(entity.id()).clone();
        let (archetype_id, _) = state.partition.get_or_create(&tag);
        state.partition.get_mut(archetype_id).remove(entity.id());
        // Columns are left as-is; the next tenant of this id overwrites them.
        state.directory.release(entity.id());
        Ok(())
    }

    /// Handle for an alive entity id, if any
    pub fn try_get_entity_by_id(&self, id: u32) -> Option<EntityHandle> {
        if id == SINGLETON_ID {
            return None;
        }
        let state = self.state.lock();
        if state.directory.is_alive(id) {
            Some(EntityHandle::new(id, state.directory.generation(id)))
        } else {
            None
        }
    }

    /// Lazy iterator over all alive entities
    pub fn all_entities(&self) -> AllEntities<'_> {
        let end = self.state.lock().directory.id_end();
        AllEntities {
            world: self,
            next_id: SINGLETON_ID + 1,
            end,
        }
    }

    /// Alive entities, excluding the reserved singleton slot
    pub fn entity_count(&self) -> u32 {
        self.state.lock().directory.alive_count()
    }

    /// True when the handle's generation still matches the directory
    pub fn is_alive(&self, entity: EntityHandle) -> bool {
        let state = self.state.lock();
        state.directory.is_alive(entity.id())
            && state.directory.generation(entity.id()) == entity.generation()
    }

    // ========== Component API ==========

    /// Add component `T` to an entity.
    ///
    /// Adding a type the entity already carries is a no-op that preserves
    /// the current value; use the returned handle to mutate it.
    pub fn add_component<'w, T: Component>(
        &'w self,
        entity: EntityHandle,
    ) -> Result<ComponentHandle<'w, T>> {
        self.ensure_usable()?;
        if T::SINGLETON || entity.id() == SINGLETON_ID {
            return Err(EcsError::InvalidSingleton);
        }
        let index = TypeRegistry::global().get_or_register::<T>()?;

        let mut state = self.state.lock();
        state.validate(entity)?;
        state.columns.ensure::<T>(index);

        if !state.directory.tag(entity.id()).has(index) {
            let mut new_tag = state.directory.tag(entity.id()).clone();
            new_tag.set(index);
            self.transition(&mut state, entity.id(), new_tag, &[index]);
        }
        drop(state);

        Ok(ComponentHandle::new(self, entity, index))
    }

    /// Add every component in the set with a single archetype transition.
    pub fn add_components<'w, S: ComponentSet<'w>>(
        &'w self,
        entity: EntityHandle,
    ) -> Result<S::Handles> {
        self.ensure_usable()?;
        if S::contains_singleton() || entity.id() == SINGLETON_ID {
            return Err(EcsError::InvalidSingleton);
        }
        let indices = S::register()?;

        #[cfg(feature = "profiling")]
        let span = info_span!("world.add_components", count = indices.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let mut state = self.state.lock();
        state.validate(entity)?;
        S::ensure_columns(&mut state.columns, &indices);

        let current = state.directory.tag(entity.id());
        let added: SmallVec<[u16; MAX_SET_COMPONENTS]> = indices
            .iter()
            .copied()
            .filter(|&index| !current.has(index))
            .collect();

        if !added.is_empty() {
            let mut new_tag = current.clone();
            for &index in &added {
                new_tag.set(index);
            }
            // Final mask computed once: exactly one membership change.
            self.transition(&mut state, entity.id(), new_tag, &added);
        }
        drop(state);

        Ok(S::handles(self, entity, &indices))
    }

    /// Remove component `T` from an entity.
    pub fn remove_component<T: Component>(&self, entity: EntityHandle) -> Result<()> {
        self.ensure_usable()?;
        if T::SINGLETON || entity.id() == SINGLETON_ID {
            return Err(EcsError::InvalidSingleton);
        }
        let index = TypeRegistry::global()
            .try_get::<T>()
            .ok_or(EcsError::ComponentNotFound)?;

        let mut state = self.state.lock();
        state.validate(entity)?;
        if !state.directory.tag(entity.id()).has(index) {
            return Err(EcsError::ComponentNotFound);
        }

        let mut new_tag = state.directory.tag(entity.id()).clone();
        new_tag.clear(index);
        self.transition(&mut state, entity.id(), new_tag, &[index]);
        Ok(())
    }

    /// Remove every component in the set with a single archetype transition.
    /// Fails without mutating if any set member is absent.
    pub fn remove_components<'w, S: ComponentSet<'w>>(&'w self, entity: EntityHandle) -> Result<()> {
        self.ensure_usable()?;
        if S::contains_singleton() || entity.id() == SINGLETON_ID {
            return Err(EcsError::InvalidSingleton);
        }
        let indices = S::try_indices().ok_or(EcsError::ComponentNotFound)?;

        let mut state = self.state.lock();
        state.validate(entity)?;

        let current = state.directory.tag(entity.id());
        if indices.iter().any(|&index| !current.has(index)) {
            return Err(EcsError::ComponentNotFound);
        }

        let mut new_tag = current.clone();
        for &index in &indices {
            new_tag.clear(index);
        }
        self.transition(&mut state, entity.id(), new_tag, &indices);
        Ok(())
    }

    /// Handle to an existing component.
    pub fn get_component<'w, T: Component>(
        &'w self,
        entity: EntityHandle,
    ) -> Result<ComponentHandle<'w, T>> {
        self.ensure_usable()?;
        if T::SINGLETON {
            return Err(EcsError::InvalidSingleton);
        }
        let index = TypeRegistry::global()
            .try_get::<T>()
            .ok_or(EcsError::NotRegistered)?;

        let state = self.state.lock();
        state.validate(entity)?;
        if !state.directory.tag(entity.id()).has(index) {
            return Err(EcsError::ComponentNotFound);
        }
        drop(state);

        Ok(ComponentHandle::new(self, entity, index))
    }

    /// Non-signalling variant of [`World::get_component`]
    pub fn try_get_component<'w, T: Component>(
        &'w self,
        entity: EntityHandle,
    ) -> Option<ComponentHandle<'w, T>> {
        self.get_component(entity).ok()
    }

    /// True when the entity is alive at this generation and its tag carries `T`
    pub fn has_component<T: Component>(&self, entity: EntityHandle) -> bool {
        let Some(index) = TypeRegistry::global().try_get::<T>() else {
            return false;
        };
        let state = self.state.lock();
        state.validate(entity).is_ok() && state.directory.tag(entity.id()).has(index)
    }

    // ========== Singleton API ==========

    /// Bind singleton `T` to the reserved slot, creating its cell on first
    /// call. Re-adding preserves the current value.
    pub fn add_singleton<'w, T: Component>(&'w self) -> Result<ComponentHandle<'w, T>> {
        self.ensure_usable()?;
        if !T::SINGLETON {
            return Err(EcsError::InvalidSingleton);
        }
        let index = TypeRegistry::global().get_or_register::<T>()?;

        let mut state = self.state.lock();
        state.singletons.insert_default::<T>(index);
        state.directory.tag_mut(SINGLETON_ID).set(index);
        drop(state);

        Ok(ComponentHandle::new(
            self,
            EntityHandle::new(SINGLETON_ID, 0),
            index,
        ))
    }

    /// Handle to an existing singleton.
    pub fn get_singleton<'w, T: Component>(&'w self) -> Result<ComponentHandle<'w, T>> {
        self.ensure_usable()?;
        if !T::SINGLETON {
            return Err(EcsError::InvalidSingleton);
        }
        let index = TypeRegistry::global()
            .try_get::<T>()
            .ok_or(EcsError::NotRegistered)?;

        let state = self.state.lock();
        if !state.directory.tag(SINGLETON_ID).has(index) {
            return Err(EcsError::ComponentNotFound);
        }
        drop(state);

        Ok(ComponentHandle::new(
            self,
            EntityHandle::new(SINGLETON_ID, 0),
            index,
        ))
    }

    /// Non-signalling variant of [`World::get_singleton`]
    pub fn try_get_singleton<'w, T: Component>(&'w self) -> Option<ComponentHandle<'w, T>> {
        self.get_singleton().ok()
    }

    /// Unbind singleton `T` and drop its cell.
    pub fn remove_singleton<T: Component>(&self) -> Result<()> {
        self.ensure_usable()?;
        if !T::SINGLETON {
            return Err(EcsError::InvalidSingleton);
        }
        let index = TypeRegistry::global()
            .try_get::<T>()
            .ok_or(EcsError::ComponentNotFound)?;

        let mut state = self.state.lock();
        if !state.directory.tag(SINGLETON_ID).has(index) {
            return Err(EcsError::ComponentNotFound);
        }
        state.directory.tag_mut(SINGLETON_ID).clear(index);
        state.singletons.remove(index);
        Ok(())
    }

    pub fn has_singleton<T: Component>(&self) -> bool {
        if !T::SINGLETON {
            return false;
        }
        let Some(index) = TypeRegistry::global().try_get::<T>() else {
            return false;
        };
        self.state.lock().directory.tag(SINGLETON_ID).has(index)
    }

    // ========== Query API ==========

    /// Iterate `(entity, &mut T1, .., &mut Tk)` over every alive entity
    /// whose tag covers the tuple. Yields nothing if any type is
    /// unregistered.
    pub fn group_of<'w, Q: QueryTuple<'w>>(&'w self) -> Group<'w, Q> {
        let Some(indices) = Q::type_indices() else {
            return Group::empty(self);
        };
        let mask = Tag::from_indices(&indices);
        let archetype_ids = self.matching_archetypes(&mask);
        Group::new(self, indices, archetype_ids)
    }

    /// Cached archetype list for a query mask: lock-free read on hit, scan
    /// and publish under the structural mutex on miss.
    pub(crate) fn matching_archetypes(&self, mask: &Tag) -> SmallVec<[u32; 8]> {
        if let Some(ids) = self.cache.get(mask) {
            return ids;
        }

        let state = self.state.lock();
        // Double-check: another thread may have populated the entry while we
        // waited on the mutex.
        if let Some(ids) = self.cache.get(mask) {
            return ids;
        }
        let ids = state.partition.matching(mask);
        self.cache.insert(mask.clone(), ids.clone());
        debug!(matches = ids.len(), "query cache entry populated");
        ids
    }

    // ========== System API ==========

    /// Register a system. Applied immediately outside a tick, at the next
    /// bucket boundary otherwise.
    pub fn add_system<S: System>(&self, system: S) -> Result<()> {
        self.ensure_usable()?;
        self.pending
            .lock()
            .push(ScheduleOp::Add(Box::new(system), std::any::TypeId::of::<S>()));
        if let Some(mut schedule) = self.schedule.try_lock() {
            self.drain_pending_systems(&mut schedule);
        }
        Ok(())
    }

    /// Deregister a system by type; same boundary semantics as `add_system`.
    pub fn remove_system<S: System>(&self) -> Result<()> {
        self.ensure_usable()?;
        self.pending
            .lock()
            .push(ScheduleOp::Remove(std::any::TypeId::of::<S>()));
        if let Some(mut schedule) = self.schedule.try_lock() {
            self.drain_pending_systems(&mut schedule);
        }
        Ok(())
    }

    /// Number of registered systems
    pub fn system_count(&self) -> usize {
        match self.schedule.try_lock() {
            Some(schedule) => schedule.len(),
            None => 0,
        }
    }

    /// Subscribe to `(source, error)` pairs from failing systems
    pub fn subscribe_errors(&self) -> Receiver<SystemError> {
        self.sink.subscribe()
    }

    // ========== Maintenance ==========

    /// Rewrite every archetype in place, dropping tombstones. Never called
    /// automatically; not safe while a query is mid-iteration.
    pub fn compact_archetypes(&self) -> Result<()> {
        self.ensure_usable()?;
        let mut state = self.state.lock();
        for archetype in state.partition.iter_mut() {
            archetype.compact();
        }
        Ok(())
    }

    /// Slot usage across all archetypes
    pub fn fragmentation_stats(&self) -> FragmentationStats {
        let state = self.state.lock();
        let mut total_slots = 0u32;
        let mut alive = 0u32;
        for archetype in state.partition.iter() {
            total_slots += archetype.len() as u32;
            alive += archetype.alive_count();
        }
        FragmentationStats {
            total_slots,
            alive,
            ratio: if total_slots > 0 {
                1.0 - alive as f32 / total_slots as f32
            } else {
                0.0
            },
        }
    }

    /// Pre-grow the entity id space (and with it every column).
    pub fn ensure_entity_capacity(&self, capacity: u32) -> Result<()> {
        self.ensure_usable()?;
        let mut state = self.state.lock();
        state.directory.grow(capacity as usize);
        let span = state.directory.len();
        state.columns.grow_id_space(span);
        Ok(())
    }

    /// Total archetype membership changes; batched operations count once.
    pub fn transition_count(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    /// Number of archetypes in the partition
    pub fn archetype_count(&self) -> usize {
        self.state.lock().partition.len()
    }

    // ========== Internals ==========

    /// Canonical structural move: re-home `id` from its current archetype to
    /// the one for `new_tag`, then reset the columns named in `reset`.
    /// Caller holds the structural mutex and has validated the entity.
    fn transition(&self, state: &mut WorldState, id: u32, new_tag: Tag, reset: &[u16]) {
        let old_tag = state.directory.tag(id).clone();
        let (old_archetype, _) = state.partition.get_or_create(&old_tag);
        state.partition.get_mut(old_archetype).remove(id);

        state.directory.set_tag(id, new_tag.clone());

        let (new_archetype, created) = state.partition.get_or_create(&new_tag);
        if created {
            self.on_archetype_created(&new_tag, new_archetype);
        }
        state.partition.get_mut(new_archetype).add(id);

        for &index in reset {
            state.columns.reset(index, id);
        }
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Incremental query-cache maintenance for a fresh archetype. Caller
    /// holds the structural mutex.
    fn on_archetype_created(&self, mask: &Tag, archetype_id: u32) {
        self.cache.register_archetype(mask, archetype_id);
        debug!(archetype_id, bits = mask.count(), "archetype created");
    }

    /// Validate a handle and resolve its slot pointer. All three reads
    /// (generation, liveness, column base) happen under the structural
    /// mutex, so the handle observes one consistent slot snapshot.
    pub(crate) fn resolve_component_ptr<T: Component>(
        &self,
        entity: EntityHandle,
        index: u16,
    ) -> Result<*mut T> {
        self.ensure_usable()?;
        let mut state = self.state.lock();

        if state.directory.generation(entity.id()) != entity.generation() {
            return Err(EcsError::EntityDestroyed);
        }
        if T::SINGLETON {
            return state
                .singletons
                .ptr::<T>(index)
                .ok_or(EcsError::ComponentNotFound);
        }
        if !state.directory.is_alive(entity.id()) {
            return Err(EcsError::EntityNotFound);
        }
        Ok(state.columns.slot_ptr::<T>(index, entity.id()))
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock()
    }

    pub(crate) fn report_system_error(&self, source: &str, error: EcsError) {
        self.sink.report(source, error);
    }

    pub(crate) fn drain_pending_systems(&self, schedule: &mut Schedule) {
        let ops: Vec<ScheduleOp> = std::mem::take(&mut *self.pending.lock());
        for op in ops {
            match op {
                ScheduleOp::Add(system, type_id) => schedule.insert(system, type_id),
                ScheduleOp::Remove(type_id) => {
                    schedule.remove(type_id);
                }
            }
        }
    }

    pub(crate) fn parallel_enabled(&self) -> bool {
        #[cfg(feature = "parallel")]
        {
            self.options.parallel
        }
        #[cfg(not(feature = "parallel"))]
        {
            false
        }
    }

    #[cfg(feature = "parallel")]
    pub(crate) fn thread_pool(&self) -> Option<&rayon::ThreadPool> {
        self.pool.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn query_cache(&self) -> &QueryCache {
        &self.cache
    }
}

/// Lazy iterator over alive entities, see [`World::all_entities`]
pub struct AllEntities<'w> {
    world: &'w World,
    next_id: u32,
    end: u32,
}

impl Iterator for AllEntities<'_> {
    type Item = EntityHandle;

    fn next(&mut self) -> Option<EntityHandle> {
        let state = self.world.state.lock();
        while self.next_id < self.end {
            let id = self.next_id;
            self.next_id += 1;
            if state.directory.is_alive(id) {
                return Some(EntityHandle::new(id, state.directory.generation(id)));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Default)]
    struct Velocity {
        dx: f32,
    }
    impl Component for Velocity {}

    #[test]
    fn test_create_destroy_counts() {
        let world = World::new();
        assert_eq!(world.entity_count(), 0);

        let a = world.create_entity().unwrap();
        let b = world.create_entity().unwrap();
        assert_eq!(world.entity_count(), 2);
        assert!(world.is_alive(a));

        world.destroy_entity(a).unwrap();
        assert_eq!(world.entity_count(), 1);
        assert!(!world.is_alive(a));
        assert!(world.is_alive(b));

        assert_eq!(world.destroy_entity(a), Err(EcsError::EntityDestroyed));
    }

    #[test]
    fn test_add_get_component_round_trip() {
        let world = World::new();
        let entity = world.create_entity().unwrap();

        let handle = world.add_component::<Position>(entity).unwrap();
        handle.get_mut().unwrap().x = 3.5;

        let again = world.get_component::<Position>(entity).unwrap();
        assert_eq!(again.get().unwrap().x, 3.5);
        assert!(world.has_component::<Position>(entity));

        world.remove_component::<Position>(entity).unwrap();
        assert!(!world.has_component::<Position>(entity));
        assert_eq!(
            world.get_component::<Position>(entity).err(),
            Some(EcsError::ComponentNotFound)
        );
    }

    #[test]
    fn test_readd_preserves_value() {
        let world = World::new();
        let entity = world.create_entity().unwrap();

        let handle = world.add_component::<Position>(entity).unwrap();
        handle.set(Position { x: 1.0, y: 2.0 }).unwrap();

        // No-op add: the stored value must survive.
        let handle = world.add_component::<Position>(entity).unwrap();
        assert_eq!(*handle.get().unwrap(), Position { x: 1.0, y: 2.0 });
    }

    #[test]
    fn test_lifecycle_misuse() {
        let world = World::new();
        assert!(matches!(
            world.update(),
            Err(EcsError::LifecycleMisuse("update before init"))
        ));

        world.init().unwrap();
        assert!(matches!(
            world.init(),
            Err(EcsError::LifecycleMisuse("init called twice"))
        ));

        world.update().unwrap();
        world.dispose().unwrap();
        assert!(world.update().is_err());
        assert!(world.create_entity().is_err());
        assert!(world.dispose().is_err());
    }

    #[test]
    fn test_ensure_capacity_grows_columns() {
        let world = World::with_options(WorldOptions {
            initial_entity_capacity: 4,
            ..WorldOptions::default()
        });
        let entity = world.create_entity().unwrap();
        world.add_component::<Velocity>(entity).unwrap();

        world.ensure_entity_capacity(1000).unwrap();
        let handle = world.get_component::<Velocity>(entity).unwrap();
        assert_eq!(handle.get().unwrap().dx, 0.0);
    }

    #[test]
    fn test_fragmentation_and_compaction() {
        let world = World::new();
        let entities: Vec<_> = (0..4).map(|_| world.create_entity().unwrap()).collect();
        for &e in &entities {
            world.add_component::<Position>(e).unwrap();
        }
        for e in &entities[..2] {
            world.destroy_entity(*e).unwrap();
        }

        let stats = world.fragmentation_stats();
        assert_eq!(stats.alive, 2);
        assert!(stats.ratio > 0.0);

        world.compact_archetypes().unwrap();
        let stats = world.fragmentation_stats();
        assert_eq!(stats.alive, 2);
        assert_eq!(stats.total_slots, 2);
        assert_eq!(stats.ratio, 0.0);
    }
}
