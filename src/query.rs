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

//! Queries over component tuples
//!
//! A query resolves its component types to indices, builds the union mask,
//! and walks every archetype whose mask is a superset. Matching archetype
//! lists are memoized in a concurrent cache: reads never take the structural
//! mutex, writes (population on miss, append on archetype creation) always
//! happen under it.

use std::marker::PhantomData;

use dashmap::DashMap;
use smallvec::SmallVec;

use crate::archetype::TOMBSTONE;
use crate::component::{Component, MAX_SET_COMPONENTS};
use crate::entity::EntityHandle;
use crate::registry::TypeRegistry;
use crate::storage::ColumnStore;
use crate::tag::Tag;
use crate::world::World;

/// Memoized `query mask → matching archetype ids`.
///
/// Entries are appended to (never invalidated) when a new archetype appears;
/// appends happen under the structural mutex, reads do not.
pub(crate) struct QueryCache {
    map: DashMap<Tag, SmallVec<[u32; 8]>, ahash::RandomState>,
}

impl QueryCache {
    pub(crate) fn new() -> Self {
        Self {
            map: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Lock-free fast path: snapshot of the cached id list.
    pub(crate) fn get(&self, mask: &Tag) -> Option<SmallVec<[u32; 8]>> {
        self.map.get(mask).map(|entry| entry.value().clone())
    }

    /// Publish a fully built entry. Caller holds the structural mutex.
    pub(crate) fn insert(&self, mask: Tag, ids: SmallVec<[u32; 8]>) {
        self.map.insert(mask, ids);
    }

    /// Append a freshly created archetype to every entry it matches.
    /// Caller holds the structural mutex.
    pub(crate) fn register_archetype(&self, mask: &Tag, archetype_id: u32) {
        for mut entry in self.map.iter_mut() {
            if mask.contains_all(entry.key()) {
                entry.value_mut().push(archetype_id);
            }
        }
    }

    pub(crate) fn clear(&self) {
        self.map.clear();
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> Vec<(Tag, SmallVec<[u32; 8]>)> {
        self.map
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// A tuple of component types iterated together.
///
/// Implemented for tuples of one through nine components; all yielded
/// references are mutable.
pub trait QueryTuple<'w> {
    /// The reference bundle yielded per entity
    type Refs;

    #[doc(hidden)]
    fn type_indices() -> Option<SmallVec<[u16; MAX_SET_COMPONENTS]>>;

    /// Produce the reference bundle for one entity id.
    ///
    /// # Safety
    /// Caller must hold the structural mutex while resolving and must only
    /// call this for ids that are alive members of a matching archetype.
    #[doc(hidden)]
    unsafe fn deref(columns: &mut ColumnStore, indices: &[u16], id: u32) -> Self::Refs;
}

macro_rules! impl_query_tuple {
    ($(($T:ident, $idx:tt)),+) => {
        impl<'w, $($T: Component),+> QueryTuple<'w> for ($($T,)+) {
            type Refs = ($(&'w mut $T,)+);

            fn type_indices() -> Option<SmallVec<[u16; MAX_SET_COMPONENTS]>> {
                let registry = TypeRegistry::global();
                Some(smallvec::smallvec![$(registry.try_get::<$T>()?),+])
            }

            unsafe fn deref(columns: &mut ColumnStore, indices: &[u16], id: u32) -> Self::Refs {
                // SAFETY: per-type slots are disjoint for one entity id; the
                // pointers stay valid until the next column growth, which the
                // caller is warned about in the iteration contract.
                ($(&mut *columns.slot_ptr::<$T>(indices[$idx], id),)+)
            }
        }
    };
}

impl_query_tuple!((A, 0));
impl_query_tuple!((A, 0), (B, 1));
impl_query_tuple!((A, 0), (B, 1), (C, 2));
impl_query_tuple!((A, 0), (B, 1), (C, 2), (D, 3));
impl_query_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_query_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_query_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_query_tuple!(
    (A, 0),
    (B, 1),
    (C, 2),
    (D, 3),
    (E, 4),
    (F, 5),
    (G, 6),
    (H, 7)
);
impl_query_tuple!(
    (A, 0),
    (B, 1),
    (C, 2),
    (D, 3),
    (E, 4),
    (F, 5),
    (G, 6),
    (H, 7),
    (I, 8)
);

/// Iterator over all alive entities whose tag covers the query tuple.
///
/// The matching archetype list is snapshotted at construction; each step
/// refetches the archetype span under the structural mutex, so destroying or
/// mutating the currently yielded entity is safe. Creating entities during
/// iteration may grow columns — reference bundles from earlier steps must be
/// re-dereferenced through their handles after a create.
pub struct Group<'w, Q: QueryTuple<'w>> {
    world: &'w World,
    indices: SmallVec<[u16; MAX_SET_COMPONENTS]>,
    archetype_ids: SmallVec<[u32; 8]>,
    arch_pos: usize,
    slot: usize,
    _marker: PhantomData<fn() -> Q>,
}

impl<'w, Q: QueryTuple<'w>> Group<'w, Q> {
    pub(crate) fn new(
        world: &'w World,
        indices: SmallVec<[u16; MAX_SET_COMPONENTS]>,
        archetype_ids: SmallVec<[u32; 8]>,
    ) -> Self {
        Self {
            world,
            indices,
            archetype_ids,
            arch_pos: 0,
            slot: 0,
            _marker: PhantomData,
        }
    }

    /// Query over a type that was never registered: yields nothing.
    pub(crate) fn empty(world: &'w World) -> Self {
        Self::new(world, SmallVec::new(), SmallVec::new())
    }
}

impl<'w, Q: QueryTuple<'w>> Iterator for Group<'w, Q> {
    type Item = (EntityHandle, Q::Refs);

    fn next(&mut self) -> Option<Self::Item> {
        let mut state = self.world.lock_state();
        loop {
            let archetype_id = match self.archetype_ids.get(self.arch_pos) {
                Some(&id) => id,
                None => return None,
            };
            // Refetch the span every step; the archetype may have grown or
            // tombstoned slots since the previous one.
            match state.partition.get(archetype_id).entity_at(self.slot) {
                None => {
                    self.arch_pos += 1;
                    self.slot = 0;
                }
                Some(TOMBSTONE) => {
                    self.slot += 1;
                }
                Some(raw) => {
                    self.slot += 1;
                    let id = raw as u32;
                    let generation = state.directory.generation(id);
                    // SAFETY: the structural mutex is held; `id` is an alive
                    // member of a matching archetype, so every queried column
                    // covers it.
                    let refs = unsafe { Q::deref(&mut state.columns, &self.indices, id) };
                    return Some((EntityHandle::new(id, generation), refs));
                }
            }
        }
    }
}
