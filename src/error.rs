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

//! Error types

use std::fmt;

/// ECS error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Operation on an id that is not alive
    EntityNotFound,

    /// Handle generation does not match the directory; use-after-free
    EntityDestroyed,

    /// Component lookup on an entity whose tag does not carry that type
    ComponentNotFound,

    /// The component type has never been registered anywhere
    NotRegistered,

    /// Type registry is full
    CapacityExceeded,

    /// Singleton type used on a regular entity, or a regular type on the
    /// reserved singleton slot
    InvalidSingleton,

    /// Lifecycle ordering violated (update before init, use after dispose,
    /// double init)
    LifecycleMisuse(&'static str),

    /// A user system body failed
    UserSystemError(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityNotFound => write!(f, "Entity not found"),
            EcsError::EntityDestroyed => write!(f, "Entity destroyed (stale handle)"),
            EcsError::ComponentNotFound => write!(f, "Component not found"),
            EcsError::NotRegistered => write!(f, "Component type not registered"),
            EcsError::CapacityExceeded => write!(f, "Type registry capacity exceeded"),
            EcsError::InvalidSingleton => write!(f, "Invalid singleton usage"),
            EcsError::LifecycleMisuse(msg) => write!(f, "Lifecycle misuse: {msg}"),
            EcsError::UserSystemError(msg) => write!(f, "System error: {msg}"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
