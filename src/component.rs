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

//! Component trait and multi-component sets
//!
//! Components are value records attached to entities. A [`ComponentSet`]
//! groups up to nine component types so they can be added or removed with a
//! single archetype transition.

use smallvec::{smallvec, SmallVec};

use crate::entity::EntityHandle;
use crate::error::Result;
use crate::handle::ComponentHandle;
use crate::registry::TypeRegistry;
use crate::storage::ColumnStore;
use crate::world::World;

/// Maximum number of components in a set or query
pub const MAX_SET_COMPONENTS: usize = 9;

/// Marker trait for components.
///
/// Components must be plain value records: `Default` supplies the initial
/// slot content, `'static` forbids borrowed data. Types stored once per
/// world opt in with `SINGLETON`.
pub trait Component: Default + Send + Sync + 'static {
    /// Singleton types bind to the reserved entity slot
    const SINGLETON: bool = false;
}

/// A tuple of component types handled as one unit.
///
/// Adding or removing a set computes the final tag once and performs exactly
/// one archetype transition, regardless of arity.
pub trait ComponentSet<'w> {
    /// Tuple of component handles returned by a batched add
    type Handles;

    #[doc(hidden)]
    fn register() -> Result<SmallVec<[u16; MAX_SET_COMPONENTS]>>;

    #[doc(hidden)]
    fn try_indices() -> Option<SmallVec<[u16; MAX_SET_COMPONENTS]>>;

    #[doc(hidden)]
    fn contains_singleton() -> bool;

    #[doc(hidden)]
    fn ensure_columns(columns: &mut ColumnStore, indices: &[u16]);

    #[doc(hidden)]
    fn handles(world: &'w World, entity: EntityHandle, indices: &[u16]) -> Self::Handles;
}

// Tuple ComponentSet implementations
macro_rules! impl_component_set {
    ($(($T:ident, $idx:tt)),+) => {
        impl<'w, $($T: Component),+> ComponentSet<'w> for ($($T,)+) {
            type Handles = ($(ComponentHandle<'w, $T>,)+);

            fn register() -> Result<SmallVec<[u16; MAX_SET_COMPONENTS]>> {
                let registry = TypeRegistry::global();
                Ok(smallvec![$(registry.get_or_register::<$T>()?),+])
            }

            fn try_indices() -> Option<SmallVec<[u16; MAX_SET_COMPONENTS]>> {
                let registry = TypeRegistry::global();
                Some(smallvec![$(registry.try_get::<$T>()?),+])
            }

            fn contains_singleton() -> bool {
                $($T::SINGLETON)||+
            }

            fn ensure_columns(columns: &mut ColumnStore, indices: &[u16]) {
                $(columns.ensure::<$T>(indices[$idx]);)+
            }

            fn handles(world: &'w World, entity: EntityHandle, indices: &[u16]) -> Self::Handles {
                ($(ComponentHandle::new(world, entity, indices[$idx]),)+)
            }
        }
    };
}

impl_component_set!((A, 0));
impl_component_set!((A, 0), (B, 1));
impl_component_set!((A, 0), (B, 1), (C, 2));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_component_set!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_component_set!(
    (A, 0),
    (B, 1),
    (C, 2),
    (D, 3),
    (E, 4),
    (F, 5),
    (G, 6),
    (H, 7)
);
impl_component_set!(
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
