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

//! Column ECS - archetype-partitioned entity component system
//!
//! In-process ECS runtime for latency-sensitive simulation and server
//! workloads: dense per-type columns indexed by entity id, tag-bitset
//! archetypes with a cached query layer, generation-validated handles, and a
//! priority-bucketed, frequency-gated scheduler.

pub mod archetype;
pub mod component;
pub mod entity;
pub mod error;
pub mod handle;
pub mod query;
pub mod registry;
pub mod sink;
pub mod storage;
pub mod system;
pub mod tag;
pub mod world;

mod executor;
mod schedule;
mod simd;

// Re-exports for convenience
pub use archetype::{Archetype, TOMBSTONE};
pub use component::{Component, ComponentSet, MAX_SET_COMPONENTS};
pub use entity::EntityHandle;
pub use error::{EcsError, Result};
pub use handle::ComponentHandle;
pub use query::{Group, QueryTuple};
pub use registry::TypeRegistry;
pub use sink::SystemError;
pub use system::{BoxedSystem, ExecuteSpec, System, SystemDescriptor};
pub use tag::Tag;
pub use world::{FragmentationStats, World, WorldOptions};
