//! Object-safe label traits.
//!
//! Labels are user types (usually unit structs or enums) used as keys: schedule names, system
//! sets. They are stored as `dyn Trait`, so equality and hashing go through [`DynEq`] and
//! [`DynHash`], which compare the concrete type first and the value second.

use std::{
    any::Any,
    hash::{Hash, Hasher},
};

use crate::ecs::schedule::intern::{Interned, Interner};

pub use rusty_schedule_macros::ScheduleLabel;

/// Equality across trait objects.
pub trait DynEq: Any {
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Equal when `other` has the same concrete type and value.
    fn dyn_eq(&self, other: &dyn DynEq) -> bool;
}

impl<T: Any + Eq> DynEq for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynEq) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// Hashing across trait objects.
pub trait DynHash: DynEq {
    /// Upcast for [`DynEq`].
    fn as_dyn_eq(&self) -> &dyn DynEq;

    /// Hash the value together with its concrete type.
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T: DynEq + Hash> DynHash for T {
    fn as_dyn_eq(&self) -> &dyn DynEq {
        self
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        T::hash(self, &mut state);
        self.type_id().hash(&mut state);
    }
}

/// Implement equality, hashing and interning for a label trait object.
macro_rules! define_label {
    ($label_trait_name:ident, $interner_name:ident) => {
        impl PartialEq for dyn $label_trait_name {
            fn eq(&self, other: &Self) -> bool {
                self.as_dyn_eq().dyn_eq(other.as_dyn_eq())
            }
        }

        impl Eq for dyn $label_trait_name {}

        impl ::std::hash::Hash for dyn $label_trait_name {
            fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                self.dyn_hash(state);
            }
        }

        impl $crate::ecs::schedule::intern::Internable for dyn $label_trait_name {
            fn leak(&self) -> &'static Self {
                Box::leak(self.dyn_clone())
            }

            fn ref_eq(&self, other: &Self) -> bool {
                // Zero-sized labels of different types can share an address.
                self.as_dyn_eq().as_any().type_id() == other.as_dyn_eq().as_any().type_id()
                    && ::std::ptr::addr_eq(::std::ptr::from_ref(self), ::std::ptr::from_ref(other))
            }

            fn ref_hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                ::std::hash::Hash::hash(&::std::ptr::from_ref(self).cast::<()>(), state);
            }
        }

        static $interner_name: $crate::ecs::schedule::intern::Interner<dyn $label_trait_name> =
            $crate::ecs::schedule::intern::Interner::new();
    };
}

pub(crate) use define_label;

/// A key identifying a [`Schedule`](crate::ecs::schedule::Schedule).
///
/// ```rust,ignore
/// #[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
/// struct Update;
/// ```
pub trait ScheduleLabel: Send + Sync + DynHash + std::fmt::Debug + 'static {
    /// Clone into a box.
    fn dyn_clone(&self) -> Box<dyn ScheduleLabel>;

    /// The interned handle of this label.
    fn intern(&self) -> InternedScheduleLabel
    where
        Self: Sized,
    {
        SCHEDULE_LABEL_INTERNER.intern(self)
    }
}

define_label!(ScheduleLabel, SCHEDULE_LABEL_INTERNER);

/// An interned [`ScheduleLabel`].
pub type InternedScheduleLabel = Interned<dyn ScheduleLabel>;

impl ScheduleLabel for InternedScheduleLabel {
    fn dyn_clone(&self) -> Box<dyn ScheduleLabel> {
        (**self).dyn_clone()
    }

    fn intern(&self) -> InternedScheduleLabel {
        *self
    }
}
