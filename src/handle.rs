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

//! Component handles
//!
//! A [`ComponentHandle`] is a stable external reference to one component of
//! one entity. It survives structural changes to other entities; destroying
//! its own entity is exactly the condition dereference reports as
//! [`crate::EcsError::EntityDestroyed`].

use std::fmt;
use std::marker::PhantomData;

use crate::component::Component;
use crate::entity::EntityHandle;
use crate::error::Result;
use crate::world::World;

/// Validated reference to a component of a specific entity generation.
///
/// The handle carries `(id, generation, type_index)` plus the world it was
/// minted from. Every dereference re-validates the generation against the
/// entity directory under the structural mutex.
pub struct ComponentHandle<'w, T: Component> {
    world: &'w World,
    entity: EntityHandle,
    type_index: u16,
    _marker: PhantomData<fn() -> T>,
}

impl<'w, T: Component> ComponentHandle<'w, T> {
    pub(crate) fn new(world: &'w World, entity: EntityHandle, type_index: u16) -> Self {
        Self {
            world,
            entity,
            type_index,
            _marker: PhantomData,
        }
    }

    /// The entity this handle points into
    pub fn entity(&self) -> EntityHandle {
        self.entity
    }

    /// Dense index of the component type
    pub fn type_index(&self) -> u16 {
        self.type_index
    }

    /// Dereference read-only.
    pub fn get(&self) -> Result<&'w T> {
        let ptr = self
            .world
            .resolve_component_ptr::<T>(self.entity, self.type_index)?;
        // SAFETY: the slot was resolved under the structural mutex and stays
        // at this address until a column growth; callers must re-dereference
        // after creating entities (see the world module's aliasing contract).
        Ok(unsafe { &*ptr })
    }

    /// Dereference mutably.
    pub fn get_mut(&self) -> Result<&'w mut T> {
        let ptr = self
            .world
            .resolve_component_ptr::<T>(self.entity, self.type_index)?;
        // SAFETY: as in `get`; exclusive use of the slot is the caller's
        // obligation per the world's shared-slot discipline.
        Ok(unsafe { &mut *ptr })
    }

    /// Overwrite the component value.
    pub fn set(&self, value: T) -> Result<()> {
        *self.get_mut()? = value;
        Ok(())
    }
}

impl<T: Component> Clone for ComponentHandle<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Component> Copy for ComponentHandle<'_, T> {}

impl<T: Component> fmt::Debug for ComponentHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("entity", &self.entity)
            .field("type_index", &self.type_index)
            .finish()
    }
}
