//! System sets: named groups that systems and other sets can belong to.
//!
//! Sets carry configuration (ordering, conditions, ambiguity exemptions) that applies to every
//! member. Three kinds exist:
//!
//! - user sets, derived with `#[derive(SystemSet)]`
//! - [`SystemTypeSet`]s, one implicit singleton per system type
//! - [`AnonymousSet`]s, created when a tuple of systems receives collective conditions

use std::{
    any::{TypeId, type_name},
    fmt::{self, Debug},
    hash::{Hash, Hasher},
};

use crate::ecs::{
    schedule::{
        intern::Interned,
        label::{DynHash, define_label},
    },
    util::short_name,
};

pub use rusty_schedule_macros::SystemSet;

/// A group of systems that share configuration.
///
/// ```rust,ignore
/// #[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
/// enum Physics {
///     Integrate,
///     Collide,
/// }
/// ```
pub trait SystemSet: Send + Sync + DynHash + Debug + 'static {
    /// The system type this set stands for, when it is a [`SystemTypeSet`].
    fn system_type(&self) -> Option<TypeId> {
        None
    }

    /// Whether this is an [`AnonymousSet`].
    fn is_anonymous(&self) -> bool {
        false
    }

    /// Clone into a box.
    fn dyn_clone(&self) -> Box<dyn SystemSet>;

    /// The interned handle of this set.
    fn intern(&self) -> InternedSystemSet
    where
        Self: Sized,
    {
        SYSTEM_SET_INTERNER.intern(self)
    }
}

define_label!(SystemSet, SYSTEM_SET_INTERNER);

/// An interned [`SystemSet`].
pub type InternedSystemSet = Interned<dyn SystemSet>;

impl SystemSet for InternedSystemSet {
    fn system_type(&self) -> Option<TypeId> {
        (**self).system_type()
    }

    fn is_anonymous(&self) -> bool {
        (**self).is_anonymous()
    }

    fn dyn_clone(&self) -> Box<dyn SystemSet> {
        (**self).dyn_clone()
    }

    fn intern(&self) -> InternedSystemSet {
        *self
    }
}

/// The implicit set holding every instance of one system type.
///
/// Every system is placed in its type set, so `a.before(b.system_type_set())` orders `a` before
/// all systems sharing `b`'s type.
#[derive(Clone, Copy)]
pub struct SystemTypeSet {
    type_id: TypeId,
    name: &'static str,
}

impl SystemTypeSet {
    /// The type set of the system type with this identity.
    pub const fn new(type_id: TypeId, name: &'static str) -> Self {
        Self { type_id, name }
    }

    /// The type set of `T`.
    pub fn of<T: 'static>() -> Self {
        Self::new(TypeId::of::<T>(), type_name::<T>())
    }

    /// The type set of the type of `value`, typically a closure or function item.
    pub fn of_val<T: 'static>(_value: &T) -> Self {
        Self::of::<T>()
    }
}

impl Debug for SystemTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemTypeSet:{}", short_name(self.name))
    }
}

impl PartialEq for SystemTypeSet {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for SystemTypeSet {}

impl Hash for SystemTypeSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl SystemSet for SystemTypeSet {
    fn system_type(&self) -> Option<TypeId> {
        Some(self.type_id)
    }

    fn dyn_clone(&self) -> Box<dyn SystemSet> {
        Box::new(*self)
    }
}

/// A set created by the schedule to carry the collective conditions of a group of systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnonymousSet(usize);

impl AnonymousSet {
    pub(crate) const fn new(id: usize) -> Self {
        Self(id)
    }
}

impl SystemSet for AnonymousSet {
    fn is_anonymous(&self) -> bool {
        true
    }

    fn dyn_clone(&self) -> Box<dyn SystemSet> {
        Box::new(*self)
    }
}
