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

//! Entity identity and the entity directory
//!
//! An [`EntityHandle`] packs `(id, generation)`; the directory holds the
//! authoritative per-id state in parallel arrays. Destroying an entity bumps
//! its generation, so any handle minted before the destroy can be detected
//! on dereference.

use std::collections::VecDeque;

use crate::tag::Tag;

/// The slot reserved for singleton components; never handed to callers.
pub const SINGLETON_ID: u32 = 0;

/// Stable external reference to an entity.
///
/// Copyable token; validity is checked against the directory on every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    id: u32,
    generation: u32,
}

impl EntityHandle {
    pub(crate) fn new(id: u32, generation: u32) -> Self {
        Self { id, generation }
    }

    /// Dense slot index
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Generation the handle was minted at
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack into 64 bits (id in the low word)
    pub fn to_bits(&self) -> u64 {
        (self.generation as u64) << 32 | self.id as u64
    }

    /// Unpack a handle previously produced by [`EntityHandle::to_bits`]
    pub fn from_bits(bits: u64) -> Self {
        Self {
            id: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

/// Per-id entity state: parallel `alive`/`generation`/`tag` arrays plus a
/// FIFO free-list of reusable ids.
pub(crate) struct EntityDirectory {
    alive: Vec<bool>,
    generation: Vec<u32>,
    tag: Vec<Tag>,
    free_ids: VecDeque<u32>,
    id_counter: u32,
    alive_count: u32,
}

impl EntityDirectory {
    /// Directory sized for `capacity` ids; slot 0 is allocated alive and
    /// reserved for singletons.
    pub(crate) fn new(capacity: usize) -> Self {
        let len = capacity.max(2).next_power_of_two();
        let mut directory = Self {
            alive: vec![false; len],
            generation: vec![0; len],
            tag: vec![Tag::new(); len],
            free_ids: VecDeque::new(),
            id_counter: 1,
            alive_count: 0,
        };
        directory.alive[SINGLETON_ID as usize] = true;
        directory
    }

    /// Current id-space length (all parallel arrays share it)
    pub(crate) fn len(&self) -> usize {
        self.alive.len()
    }

    /// Allocate an id: FIFO reuse of destroyed ids, else a fresh one.
    pub(crate) fn allocate(&mut self) -> u32 {
        let id = match self.free_ids.pop_front() {
            Some(id) => id,
            None => {
                let id = self.id_counter;
                self.id_counter += 1;
                self.grow(id as usize + 1);
                id
            }
        };
        self.alive[id as usize] = true;
        self.tag[id as usize] = Tag::new();
        self.alive_count += 1;
        id
    }

    /// Release an id: flip alive, bump the generation, queue for reuse.
    pub(crate) fn release(&mut self, id: u32) {
        debug_assert_ne!(id, SINGLETON_ID);
        self.alive[id as usize] = false;
        self.generation[id as usize] += 1;
        self.free_ids.push_back(id);
        self.alive_count -= 1;
    }

    /// Extend the id space to at least `required` slots.
    pub(crate) fn grow(&mut self, required: usize) {
        if required <= self.alive.len() {
            return;
        }
        let len = required.next_power_of_two();
        self.alive.resize(len, false);
        self.generation.resize(len, 0);
        self.tag.resize(len, Tag::new());
    }

    pub(crate) fn is_alive(&self, id: u32) -> bool {
        self.alive.get(id as usize).copied().unwrap_or(false)
    }

    pub(crate) fn generation(&self, id: u32) -> u32 {
        self.generation.get(id as usize).copied().unwrap_or(0)
    }

    pub(crate) fn tag(&self, id: u32) -> &Tag {
        &self.tag[id as usize]
    }

    pub(crate) fn set_tag(&mut self, id: u32, tag: Tag) {
        self.tag[id as usize] = tag;
    }

    pub(crate) fn tag_mut(&mut self, id: u32) -> &mut Tag {
        &mut self.tag[id as usize]
    }

    /// Alive entities, excluding the reserved singleton slot
    pub(crate) fn alive_count(&self) -> u32 {
        self.alive_count
    }

    /// Upper bound over ever-allocated ids (exclusive)
    pub(crate) fn id_end(&self) -> u32 {
        self.id_counter
    }
}
