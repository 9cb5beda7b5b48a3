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

//! Global component type registry
//!
//! Maps component type identity to a dense `u16` index. Indices are assigned
//! monotonically and are stable for the process lifetime; all worlds share
//! the same assignment. Writes serialize on a single mutex; reads go through
//! a sharded concurrent map and never touch the writer lock. An entry is
//! inserted only after its metadata is fully built, so a reader that sees a
//! registration sees a completed one.

use std::any::TypeId;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::component::Component;
use crate::error::{EcsError, Result};

/// Maximum number of registrations a registry admits
const MAX_TYPES: u32 = 1 << 16;

/// Metadata recorded per registered type
#[derive(Debug, Clone, Copy)]
pub(crate) struct TypeMeta {
    pub(crate) index: u16,
    pub(crate) singleton: bool,
}

/// Registry of component types
pub struct TypeRegistry {
    map: DashMap<TypeId, TypeMeta, ahash::RandomState>,
    writer: Mutex<()>,
    assigned: AtomicU32,
}

static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create an empty registry (tests and tooling; production code uses
    /// [`TypeRegistry::global`])
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(ahash::RandomState::new()),
            writer: Mutex::new(()),
            assigned: AtomicU32::new(0),
        }
    }

    /// The process-wide registry shared by all worlds
    pub fn global() -> &'static TypeRegistry {
        GLOBAL.get_or_init(TypeRegistry::new)
    }

    /// Return the index for `T`, assigning a fresh one on first call
    pub fn get_or_register<T: Component>(&self) -> Result<u16> {
        let key = TypeId::of::<T>();
        if let Some(meta) = self.map.get(&key) {
            return Ok(meta.index);
        }

        let _guard = self.writer.lock();
        // Double-check: another writer may have registered T while we waited.
        if let Some(meta) = self.map.get(&key) {
            return Ok(meta.index);
        }

        let index = self.assign()?;
        self.map.insert(
            key,
            TypeMeta {
                index,
                singleton: T::SINGLETON,
            },
        );
        Ok(index)
    }

    /// Read-only lookup
    pub fn try_get<T: Component>(&self) -> Option<u16> {
        self.map.get(&TypeId::of::<T>()).map(|meta| meta.index)
    }

    /// Number of assigned indices
    pub fn len(&self) -> usize {
        self.assigned.load(Ordering::Acquire) as usize
    }

    /// True when nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset all assignments.
    ///
    /// Test harnesses only; must not be called while any world exists.
    pub fn clear(&self) {
        let _guard = self.writer.lock();
        self.map.clear();
        self.assigned.store(0, Ordering::Release);
    }

    /// Assign the next index; caller holds the writer lock.
    fn assign(&self) -> Result<u16> {
        let assigned = self.assigned.load(Ordering::Acquire);
        if assigned >= MAX_TYPES {
            return Err(EcsError::CapacityExceeded);
        }
        self.assigned.store(assigned + 1, Ordering::Release);
        Ok(assigned as u16)
    }

    /// Assign an index with no backing type. Capacity tests cannot mint
    /// 65,536 distinct Rust types, so they drive the counter directly.
    #[cfg(test)]
    pub(crate) fn register_raw(&self) -> Result<u16> {
        let _guard = self.writer.lock();
        self.assign()
    }
}
