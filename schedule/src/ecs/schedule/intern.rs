//! Content-addressed interning for labels and sets.
//!
//! Interning turns a value into an [`Interned`] handle: a `&'static` reference that is `Copy` and
//! compares and hashes by address. Equal values always intern to the same handle, so structural
//! comparison only happens once, inside the [`Interner`].

use std::{
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    ops::Deref,
    sync::OnceLock,
};

use dashmap::DashSet;

/// A leaked, deduplicated value compared by identity.
pub struct Interned<T: ?Sized + 'static>(pub &'static T);

impl<T: ?Sized> Deref for Interned<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl<T: ?Sized> Clone for Interned<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Interned<T> {}

impl<T: ?Sized + Internable> PartialEq for Interned<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.ref_eq(other.0)
    }
}

impl<T: ?Sized + Internable> Eq for Interned<T> {}

impl<T: ?Sized + Internable> Hash for Interned<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.ref_hash(state);
    }
}

impl<T: ?Sized + Debug> Debug for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A value that can be leaked into an [`Interner`] and compared by address afterwards.
pub trait Internable: Hash + Eq {
    /// Leak a copy of the value.
    fn leak(&self) -> &'static Self;

    /// Whether both references point at the same interned value.
    fn ref_eq(&self, other: &Self) -> bool;

    /// Hash the identity of the reference.
    fn ref_hash<H: Hasher>(&self, state: &mut H);
}

/// A global, thread-safe deduplication table.
///
/// Usable in a `static`: the backing set is created on first use.
pub struct Interner<T: ?Sized + 'static>(OnceLock<DashSet<&'static T>>);

impl<T: ?Sized> Interner<T> {
    /// An empty interner.
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }
}

impl<T: ?Sized> Default for Interner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Internable + ?Sized + Send + Sync> Interner<T> {
    /// Intern `value`, leaking it the first time an equal value is seen.
    pub fn intern(&self, value: &T) -> Interned<T> {
        let set = self.0.get_or_init(DashSet::new);
        if let Some(existing) = set.get(value) {
            return Interned(*existing);
        }

        let leaked = value.leak();
        if set.insert(leaked) {
            return Interned(leaked);
        }
        // Lost a race with another thread interning an equal value.
        match set.get(value) {
            Some(existing) => Interned(*existing),
            None => Interned(leaked),
        }
    }
}
