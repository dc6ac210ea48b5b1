//! Component and resource identity.
//!
//! The scheduler never stores component data. It only needs a dense, stable identifier per data
//! type so that system accesses can be expressed as bitsets and compared cheaply. This module
//! provides that identifier, the marker traits data types implement, and the per-world
//! [`Registry`] that hands identifiers out.
//!
//! ```ignore
//! use rusty_schedule::ecs::component::{Component, Registry};
//!
//! #[derive(Component)]
//! struct Position { x: f32, y: f32 }
//!
//! let registry = Registry::new();
//! let position = registry.register_component::<Position>();
//! assert_eq!(registry.get_name(position), Some("Position"));
//! ```

mod registry;

use std::fmt;

pub use registry::{Info, Kind, Registry};
pub use rusty_schedule_macros::{Component, Resource};

use crate::ecs::access::SparseSetIndex;

/// Dense identifier of a registered component or resource type.
///
/// Components and resources share one identifier space per world; [`Access`] keeps them in
/// separate bitsets.
///
/// [`Access`]: crate::ecs::access::Access
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Construct a new id from a raw u32 value.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Position of this id in indexable storage (Vec, bitset).
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for ComponentId {
    #[inline]
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<usize> for ComponentId {
    #[inline]
    fn from(value: usize) -> Self {
        Self::new(value as u32)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

impl SparseSetIndex for ComponentId {
    #[inline]
    fn sparse_set_index(&self) -> usize {
        self.index()
    }

    #[inline]
    fn get_sparse_set_index(value: usize) -> Self {
        Self::from(value)
    }
}

/// Per-entity data.
///
/// At present this only sets the bounds a type needs for systems to declare access to it.
pub trait Component: 'static + Sized + Send + Sync {}

/// World-global singleton data.
pub trait Resource: 'static + Sized + Send + Sync {}
