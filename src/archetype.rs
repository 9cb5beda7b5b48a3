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

//! Archetype storage: entities partitioned by component mask
//!
//! An archetype owns the append-only list of entity ids that currently share
//! one tag. Removal tombstones the slot instead of shifting the list, and a
//! free-slot stack gives O(1) reuse on the next add. Compaction is an
//! explicit maintenance action; a mid-tick rewrite would spike latency.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::tag::Tag;

/// Sentinel marking a vacated slot in an archetype's entity list
pub const TOMBSTONE: i32 = -1;

/// Rows reserved when a new archetype is created
const INITIAL_CAPACITY: usize = 1024;

/// Entities sharing one component mask
pub struct Archetype {
    mask: Tag,
    entity_ids: Vec<i32>,
    alive_count: u32,
    free_slots: Vec<u32>,
}

impl Archetype {
    pub(crate) fn new(mask: Tag) -> Self {
        Self {
            mask,
            entity_ids: Vec::with_capacity(INITIAL_CAPACITY),
            alive_count: 0,
            free_slots: Vec::new(),
        }
    }

    /// Component mask shared by every member
    pub fn mask(&self) -> &Tag {
        &self.mask
    }

    /// Add an entity: reuse a tombstoned slot if one is free, else append.
    pub(crate) fn add(&mut self, id: u32) {
        match self.free_slots.pop() {
            Some(slot) => self.entity_ids[slot as usize] = id as i32,
            None => self.entity_ids.push(id as i32),
        }
        self.alive_count += 1;
    }

    /// Remove an entity by tombstoning its slot.
    pub(crate) fn remove(&mut self, id: u32) {
        let needle = id as i32;
        if let Some(pos) = self.entity_ids.iter().position(|&e| e == needle) {
            self.entity_ids[pos] = TOMBSTONE;
            self.free_slots.push(pos as u32);
            self.alive_count -= 1;
        } else {
            debug_assert!(false, "entity {id} not a member of its archetype");
        }
    }

    /// Stable in-place rewrite that drops all tombstones.
    ///
    /// Not safe while any query over this archetype is mid-iteration.
    pub(crate) fn compact(&mut self) {
        self.entity_ids.retain(|&e| e != TOMBSTONE);
        self.free_slots.clear();
    }

    /// Read-only view of the slot list, tombstones included
    pub fn entity_span(&self) -> &[i32] {
        &self.entity_ids
    }

    /// Slot content at `slot`, if in range
    pub(crate) fn entity_at(&self, slot: usize) -> Option<i32> {
        self.entity_ids.get(slot).copied()
    }

    /// Members that are not tombstoned
    pub fn alive_count(&self) -> u32 {
        self.alive_count
    }

    /// Total slots, tombstones included
    pub fn len(&self) -> usize {
        self.entity_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_ids.is_empty()
    }

    /// Fraction of slots wasted on tombstones
    pub fn fragmentation(&self) -> f32 {
        if self.entity_ids.is_empty() {
            0.0
        } else {
            1.0 - self.alive_count as f32 / self.entity_ids.len() as f32
        }
    }
}

/// The world's map from tag to archetype.
///
/// Archetypes are kept in a stable arena; ids index it and never move.
pub(crate) struct ArchetypePartition {
    archetypes: Vec<Archetype>,
    by_mask: AHashMap<Tag, u32>,
}

impl ArchetypePartition {
    pub(crate) fn new() -> Self {
        Self {
            archetypes: Vec::new(),
            by_mask: AHashMap::new(),
        }
    }

    /// Look up the archetype for `mask`, creating it if absent.
    /// Returns `(id, created)`; on creation the caller is responsible for
    /// appending the new id to every matching query-cache entry.
    pub(crate) fn get_or_create(&mut self, mask: &Tag) -> (u32, bool) {
        if let Some(&id) = self.by_mask.get(mask) {
            return (id, false);
        }
        let id = self.archetypes.len() as u32;
        self.archetypes.push(Archetype::new(mask.clone()));
        self.by_mask.insert(mask.clone(), id);
        (id, true)
    }

    pub(crate) fn get(&self, id: u32) -> &Archetype {
        &self.archetypes[id as usize]
    }

    pub(crate) fn get_mut(&mut self, id: u32) -> &mut Archetype {
        &mut self.archetypes[id as usize]
    }

    /// Ids of all archetypes whose mask is a superset of `query`
    pub(crate) fn matching(&self, query: &Tag) -> SmallVec<[u32; 8]> {
        self.archetypes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.mask.contains_all(query))
            .map(|(id, _)| id as u32)
            .collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Archetype> {
        self.archetypes.iter_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.archetypes.len()
    }
}
