//! Static read/write footprints of systems and the conflict rules between them.
//!
//! # Overview
//!
//! An [`Access`] records which component and resource identifiers a system reads and writes.
//! Two systems may run in an unspecified relative order only if neither writes something the
//! other reads or writes, following Rust's aliasing rules:
//!
//! - any number of readers of the same identifier are fine
//! - a writer conflicts with every other reader or writer of that identifier
//!
//! ```rust,ignore
//! use rusty_schedule::ecs::access::Access;
//!
//! let mut read_pos = Access::<usize>::new();
//! read_pos.add_component_read(0);
//!
//! let mut write_pos = Access::<usize>::new();
//! write_pos.add_component_write(0);
//!
//! assert!(read_pos.is_compatible(&read_pos));
//! assert!(!read_pos.is_compatible(&write_pos));
//! ```
//!
//! # Inverted sets
//!
//! Components can be accessed "all except a few" (a system holding `&World` reads every
//! component). Instead of materializing an unbounded set, component reads and component writes
//! each carry an *inverted* flag: when set, the bitset lists the identifiers that are **not**
//! accessed. Every operation evaluates the four combinations explicitly:
//!
//! ```text
//!  lhs writes   rhs reads      compatible when
//!  ──────────   ──────────     ─────────────────────────────
//!  normal       normal         W ∩ R = ∅
//!  normal       inverted       W ⊆ R'        (R' = excluded ids)
//!  inverted     normal         R ⊆ W'
//!  inverted     inverted       never         (both cover almost everything)
//! ```
//!
//! Resources do not use inverted sets; "every resource" is a pair of flags.
//!
//! # Filters
//!
//! [`FilteredAccess`] adds `With`/`Without` predicates in disjunctive normal form so that two
//! queries touching the same component can still be proven disjoint, and
//! [`FilteredAccessSet`] aggregates the filtered accesses of every parameter of one system.

use std::{
    fmt::{self, Debug},
    marker::PhantomData,
};

use fixedbitset::FixedBitSet;
use thiserror::Error;

use crate::ecs::world::World;

mod filtered;
mod set;

pub use filtered::{AccessFilters, FilteredAccess};
pub use set::FilteredAccessSet;

/// Dense identifiers usable as bit positions.
pub trait SparseSetIndex: Clone + PartialEq + Eq {
    /// Bit position of this identifier.
    fn sparse_set_index(&self) -> usize;

    /// Identifier stored at a bit position.
    fn get_sparse_set_index(value: usize) -> Self;
}

macro_rules! impl_sparse_set_index {
    ($($ty:ty),+) => {
        $(impl SparseSetIndex for $ty {
            #[inline]
            fn sparse_set_index(&self) -> usize {
                *self as usize
            }

            #[inline]
            fn get_sparse_set_index(value: usize) -> Self {
                value as $ty
            }
        })*
    };
}

impl_sparse_set_index!(u8, u16, u32, u64, usize);

/// Insert `index`, growing the bitset as needed.
#[inline]
fn grow_and_insert(bitset: &mut FixedBitSet, index: usize) {
    if index >= bitset.len() {
        bitset.grow(index + 1);
    }
    bitset.insert(index);
}

/// Remove `index` if the bitset is large enough to hold it.
#[inline]
fn remove_if_present(bitset: &mut FixedBitSet, index: usize) {
    if index < bitset.len() {
        bitset.remove(index);
    }
}

/// Debug view of a bitset as a list of identifiers.
struct FormattedBitSet<'a, T: SparseSetIndex> {
    bitset: &'a FixedBitSet,
    _marker: PhantomData<T>,
}

impl<'a, T: SparseSetIndex> FormattedBitSet<'a, T> {
    fn new(bitset: &'a FixedBitSet) -> Self {
        Self {
            bitset,
            _marker: PhantomData,
        }
    }
}

impl<T: SparseSetIndex + Debug> Debug for FormattedBitSet<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.bitset.ones().map(T::get_sparse_set_index))
            .finish()
    }
}

/// Read and write footprint over components and resources.
///
/// Component writes are always also component reads, and "writes all resources" always implies
/// "reads all resources". Every mutator keeps both invariants.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Access<T: SparseSetIndex> {
    /// Components read or written. Excluded components when `component_read_and_writes_inverted`.
    component_read_and_writes: FixedBitSet,
    /// Components written. Excluded components when `component_writes_inverted`.
    component_writes: FixedBitSet,
    /// Resources read or written.
    resource_read_and_writes: FixedBitSet,
    /// Resources written.
    resource_writes: FixedBitSet,
    component_read_and_writes_inverted: bool,
    component_writes_inverted: bool,
    reads_all_resources: bool,
    writes_all_resources: bool,
    /// Components whose presence is checked without reading their data.
    archetypal: FixedBitSet,
    _marker: PhantomData<T>,
}

impl<T: SparseSetIndex> Default for Access<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SparseSetIndex + Debug> Debug for Access<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Access")
            .field(
                "component_read_and_writes",
                &FormattedBitSet::<T>::new(&self.component_read_and_writes),
            )
            .field(
                "component_writes",
                &FormattedBitSet::<T>::new(&self.component_writes),
            )
            .field(
                "resource_read_and_writes",
                &FormattedBitSet::<T>::new(&self.resource_read_and_writes),
            )
            .field(
                "resource_writes",
                &FormattedBitSet::<T>::new(&self.resource_writes),
            )
            .field(
                "component_read_and_writes_inverted",
                &self.component_read_and_writes_inverted,
            )
            .field("component_writes_inverted", &self.component_writes_inverted)
            .field("reads_all_resources", &self.reads_all_resources)
            .field("writes_all_resources", &self.writes_all_resources)
            .field("archetypal", &FormattedBitSet::<T>::new(&self.archetypal))
            .finish()
    }
}

impl<T: SparseSetIndex> Access<T> {
    /// An access that touches nothing.
    pub const fn new() -> Self {
        Self {
            component_read_and_writes: FixedBitSet::new(),
            component_writes: FixedBitSet::new(),
            resource_read_and_writes: FixedBitSet::new(),
            resource_writes: FixedBitSet::new(),
            component_read_and_writes_inverted: false,
            component_writes_inverted: false,
            reads_all_resources: false,
            writes_all_resources: false,
            archetypal: FixedBitSet::new(),
            _marker: PhantomData,
        }
    }

    fn add_component_sparse_set_index_read(&mut self, index: usize) {
        if self.component_read_and_writes_inverted {
            remove_if_present(&mut self.component_read_and_writes, index);
        } else {
            grow_and_insert(&mut self.component_read_and_writes, index);
        }
    }

    fn add_component_sparse_set_index_write(&mut self, index: usize) {
        if self.component_writes_inverted {
            remove_if_present(&mut self.component_writes, index);
        } else {
            grow_and_insert(&mut self.component_writes, index);
        }
    }

    fn remove_component_sparse_set_index_read(&mut self, index: usize) {
        if self.component_read_and_writes_inverted {
            grow_and_insert(&mut self.component_read_and_writes, index);
        } else {
            remove_if_present(&mut self.component_read_and_writes, index);
        }
    }

    fn remove_component_sparse_set_index_write(&mut self, index: usize) {
        if self.component_writes_inverted {
            grow_and_insert(&mut self.component_writes, index);
        } else {
            remove_if_present(&mut self.component_writes, index);
        }
    }

    /// Add read access to a component.
    pub fn add_component_read(&mut self, index: T) {
        self.add_component_sparse_set_index_read(index.sparse_set_index());
    }

    /// Add write access (and therefore read access) to a component.
    pub fn add_component_write(&mut self, index: T) {
        let index = index.sparse_set_index();
        self.add_component_sparse_set_index_read(index);
        self.add_component_sparse_set_index_write(index);
    }

    /// Add read access to a resource.
    pub fn add_resource_read(&mut self, index: T) {
        grow_and_insert(&mut self.resource_read_and_writes, index.sparse_set_index());
    }

    /// Add write access (and therefore read access) to a resource.
    pub fn add_resource_write(&mut self, index: T) {
        let index = index.sparse_set_index();
        grow_and_insert(&mut self.resource_read_and_writes, index);
        grow_and_insert(&mut self.resource_writes, index);
    }

    /// Remove read access (and therefore write access) to a component.
    pub fn remove_component_read(&mut self, index: T) {
        let index = index.sparse_set_index();
        self.remove_component_sparse_set_index_write(index);
        self.remove_component_sparse_set_index_read(index);
    }

    /// Remove write access to a component, keeping read access.
    pub fn remove_component_write(&mut self, index: T) {
        self.remove_component_sparse_set_index_write(index.sparse_set_index());
    }

    /// Record presence-only access to a component.
    ///
    /// Archetypal access never conflicts; it only tells the storage which archetypes matter.
    pub fn add_archetypal(&mut self, index: T) {
        grow_and_insert(&mut self.archetypal, index.sparse_set_index());
    }

    /// Whether the component is read.
    pub fn has_component_read(&self, index: T) -> bool {
        self.component_read_and_writes_inverted
            ^ self.component_read_and_writes.contains(index.sparse_set_index())
    }

    /// Whether any component is read.
    pub fn has_any_component_read(&self) -> bool {
        self.component_read_and_writes_inverted || !self.component_read_and_writes.is_clear()
    }

    /// Whether the component is written.
    pub fn has_component_write(&self, index: T) -> bool {
        self.component_writes_inverted ^ self.component_writes.contains(index.sparse_set_index())
    }

    /// Whether any component is written.
    pub fn has_any_component_write(&self) -> bool {
        self.component_writes_inverted || !self.component_writes.is_clear()
    }

    /// Whether the resource is read.
    pub fn has_resource_read(&self, index: T) -> bool {
        self.reads_all_resources || self.resource_read_and_writes.contains(index.sparse_set_index())
    }

    /// Whether any resource is read.
    pub fn has_any_resource_read(&self) -> bool {
        self.reads_all_resources || !self.resource_read_and_writes.is_clear()
    }

    /// Whether the resource is written.
    pub fn has_resource_write(&self, index: T) -> bool {
        self.writes_all_resources || self.resource_writes.contains(index.sparse_set_index())
    }

    /// Whether any resource is written.
    pub fn has_any_resource_write(&self) -> bool {
        self.writes_all_resources || !self.resource_writes.is_clear()
    }

    /// Whether anything is read.
    pub fn has_any_read(&self) -> bool {
        self.has_any_component_read() || self.has_any_resource_read()
    }

    /// Whether anything is written.
    pub fn has_any_write(&self) -> bool {
        self.has_any_component_write() || self.has_any_resource_write()
    }

    /// Whether the component is accessed for presence only.
    pub fn has_archetypal(&self, index: T) -> bool {
        self.archetypal.contains(index.sparse_set_index())
    }

    /// Read every component.
    #[inline]
    pub fn read_all_components(&mut self) {
        self.component_read_and_writes_inverted = true;
        self.component_read_and_writes.clear();
    }

    /// Write every component.
    #[inline]
    pub fn write_all_components(&mut self) {
        self.read_all_components();
        self.component_writes_inverted = true;
        self.component_writes.clear();
    }

    /// Read every resource.
    #[inline]
    pub const fn read_all_resources(&mut self) {
        self.reads_all_resources = true;
    }

    /// Write every resource.
    #[inline]
    pub const fn write_all_resources(&mut self) {
        self.reads_all_resources = true;
        self.writes_all_resources = true;
    }

    /// Read everything.
    #[inline]
    pub fn read_all(&mut self) {
        self.read_all_components();
        self.read_all_resources();
    }

    /// Write everything.
    #[inline]
    pub fn write_all(&mut self) {
        self.write_all_components();
        self.write_all_resources();
    }

    /// Whether every component is read.
    #[inline]
    pub fn has_read_all_components(&self) -> bool {
        self.component_read_and_writes_inverted && self.component_read_and_writes.is_clear()
    }

    /// Whether every component is written.
    #[inline]
    pub fn has_write_all_components(&self) -> bool {
        self.component_writes_inverted && self.component_writes.is_clear()
    }

    /// Whether every resource is read.
    #[inline]
    pub fn has_read_all_resources(&self) -> bool {
        self.reads_all_resources
    }

    /// Whether every resource is written.
    #[inline]
    pub fn has_write_all_resources(&self) -> bool {
        self.writes_all_resources
    }

    /// Whether everything is read.
    pub fn has_read_all(&self) -> bool {
        self.has_read_all_components() && self.has_read_all_resources()
    }

    /// Whether everything is written.
    pub fn has_write_all(&self) -> bool {
        self.has_write_all_components() && self.has_write_all_resources()
    }

    /// Drop all write access, keeping reads.
    pub fn clear_writes(&mut self) {
        self.writes_all_resources = false;
        self.component_writes_inverted = false;
        self.component_writes.clear();
        self.resource_writes.clear();
    }

    /// Drop all access.
    pub fn clear(&mut self) {
        self.reads_all_resources = false;
        self.writes_all_resources = false;
        self.component_read_and_writes_inverted = false;
        self.component_writes_inverted = false;
        self.component_read_and_writes.clear();
        self.component_writes.clear();
        self.resource_read_and_writes.clear();
        self.resource_writes.clear();
        self.archetypal.clear();
    }

    /// Merge `other` into `self`.
    ///
    /// The result accesses everything either input accesses. With inverted sets the bitsets are
    /// combined by the table below (`S`, `O` are the stored bitsets, primes are complements):
    ///
    /// ```text
    ///  self      other      result (inverted?)   stored bitset
    ///  normal    normal     no                   S ∪ O
    ///  inverted  normal     yes                  S \ O        (S' ∪ O = (S \ O)')
    ///  normal    inverted   yes                  O \ S        (S ∪ O' = (O \ S)')
    ///  inverted  inverted   yes                  S ∩ O        (S' ∪ O' = (S ∩ O)')
    /// ```
    pub fn extend(&mut self, other: &Access<T>) {
        let read_and_writes_inverted =
            self.component_read_and_writes_inverted || other.component_read_and_writes_inverted;
        let writes_inverted = self.component_writes_inverted || other.component_writes_inverted;

        extend_bitset(
            &mut self.component_read_and_writes,
            self.component_read_and_writes_inverted,
            &other.component_read_and_writes,
            other.component_read_and_writes_inverted,
        );
        extend_bitset(
            &mut self.component_writes,
            self.component_writes_inverted,
            &other.component_writes,
            other.component_writes_inverted,
        );

        self.reads_all_resources = self.reads_all_resources || other.reads_all_resources;
        self.writes_all_resources = self.writes_all_resources || other.writes_all_resources;
        self.component_read_and_writes_inverted = read_and_writes_inverted;
        self.component_writes_inverted = writes_inverted;
        self.resource_read_and_writes
            .union_with(&other.resource_read_and_writes);
        self.resource_writes.union_with(&other.resource_writes);
        self.archetypal.union_with(&other.archetypal);
    }

    /// Whether the component parts may be held at the same time.
    pub fn is_components_compatible(&self, other: &Access<T>) -> bool {
        for (lhs_writes, rhs_reads_and_writes, lhs_writes_inverted, rhs_reads_and_writes_inverted) in [
            (
                &self.component_writes,
                &other.component_read_and_writes,
                self.component_writes_inverted,
                other.component_read_and_writes_inverted,
            ),
            (
                &other.component_writes,
                &self.component_read_and_writes,
                other.component_writes_inverted,
                self.component_read_and_writes_inverted,
            ),
        ] {
            let compatible = match (lhs_writes_inverted, rhs_reads_and_writes_inverted) {
                (true, true) => false,
                (false, true) => lhs_writes.is_subset(rhs_reads_and_writes),
                (true, false) => rhs_reads_and_writes.is_subset(lhs_writes),
                (false, false) => lhs_writes.is_disjoint(rhs_reads_and_writes),
            };
            if !compatible {
                return false;
            }
        }
        true
    }

    /// Whether the resource parts may be held at the same time.
    pub fn is_resources_compatible(&self, other: &Access<T>) -> bool {
        if self.writes_all_resources {
            return !other.has_any_resource_read();
        }
        if other.writes_all_resources {
            return !self.has_any_resource_read();
        }
        if self.reads_all_resources {
            return !other.has_any_resource_write();
        }
        if other.reads_all_resources {
            return !self.has_any_resource_write();
        }
        self.resource_writes
            .is_disjoint(&other.resource_read_and_writes)
            && other
                .resource_writes
                .is_disjoint(&self.resource_read_and_writes)
    }

    /// Whether both accesses may be held at the same time.
    pub fn is_compatible(&self, other: &Access<T>) -> bool {
        self.is_components_compatible(other) && self.is_resources_compatible(other)
    }

    /// Whether `other` covers every component access of `self`.
    pub fn is_subset_components(&self, other: &Access<T>) -> bool {
        for (ours, theirs, ours_inverted, theirs_inverted) in [
            (
                &self.component_read_and_writes,
                &other.component_read_and_writes,
                self.component_read_and_writes_inverted,
                other.component_read_and_writes_inverted,
            ),
            (
                &self.component_writes,
                &other.component_writes,
                self.component_writes_inverted,
                other.component_writes_inverted,
            ),
        ] {
            let subset = match (ours_inverted, theirs_inverted) {
                (true, true) => theirs.is_subset(ours),
                (true, false) => false,
                (false, true) => ours.is_disjoint(theirs),
                (false, false) => ours.is_subset(theirs),
            };
            if !subset {
                return false;
            }
        }
        true
    }

    /// Whether `other` covers every resource access of `self`.
    pub fn is_subset_resources(&self, other: &Access<T>) -> bool {
        if self.writes_all_resources {
            return other.writes_all_resources;
        }
        if other.writes_all_resources {
            return true;
        }
        if self.reads_all_resources {
            return other.reads_all_resources;
        }
        if other.reads_all_resources {
            return self.resource_writes.is_subset(&other.resource_writes);
        }
        self.resource_read_and_writes
            .is_subset(&other.resource_read_and_writes)
            && self.resource_writes.is_subset(&other.resource_writes)
    }

    /// Whether `other` covers every access of `self`.
    pub fn is_subset(&self, other: &Access<T>) -> bool {
        self.is_subset_components(other) && self.is_subset_resources(other)
    }

    fn get_component_conflicts(&self, other: &Access<T>) -> AccessConflicts {
        let mut conflicts = FixedBitSet::new();

        // A conflict is a write on one side against a read or write on the other.
        for (lhs_writes, rhs_reads_and_writes, lhs_writes_inverted, rhs_reads_and_writes_inverted) in [
            (
                &self.component_writes,
                &other.component_read_and_writes,
                self.component_writes_inverted,
                other.component_read_and_writes_inverted,
            ),
            (
                &other.component_writes,
                &self.component_read_and_writes,
                other.component_writes_inverted,
                self.component_read_and_writes_inverted,
            ),
        ] {
            match (lhs_writes_inverted, rhs_reads_and_writes_inverted) {
                (true, true) => return AccessConflicts::All,
                (false, true) => conflicts.extend(lhs_writes.difference(rhs_reads_and_writes)),
                (true, false) => conflicts.extend(rhs_reads_and_writes.difference(lhs_writes)),
                (false, false) => conflicts.extend(lhs_writes.intersection(rhs_reads_and_writes)),
            }
        }

        AccessConflicts::Individual(conflicts)
    }

    /// Identifiers on which the two accesses conflict.
    ///
    /// Returns [`AccessConflicts::All`] when the conflict cannot be enumerated, for example two
    /// accesses that both write every component.
    pub fn get_conflicts(&self, other: &Access<T>) -> AccessConflicts {
        let mut conflicts = match self.get_component_conflicts(other) {
            AccessConflicts::All => return AccessConflicts::All,
            AccessConflicts::Individual(conflicts) => conflicts,
        };

        if self.reads_all_resources {
            if other.writes_all_resources {
                return AccessConflicts::All;
            }
            conflicts.extend(other.resource_writes.ones());
        }
        if other.reads_all_resources {
            if self.writes_all_resources {
                return AccessConflicts::All;
            }
            conflicts.extend(self.resource_writes.ones());
        }
        if self.writes_all_resources {
            conflicts.extend(other.resource_read_and_writes.ones());
        }
        if other.writes_all_resources {
            conflicts.extend(self.resource_read_and_writes.ones());
        }

        conflicts.extend(
            self.resource_writes
                .intersection(&other.resource_read_and_writes),
        );
        conflicts.extend(
            self.resource_read_and_writes
                .intersection(&other.resource_writes),
        );
        AccessConflicts::Individual(conflicts)
    }

    /// Resources read or written.
    pub fn resource_reads_and_writes(&self) -> impl Iterator<Item = T> + '_ {
        self.resource_read_and_writes
            .ones()
            .map(T::get_sparse_set_index)
    }

    /// Resources read but not written.
    pub fn resource_reads(&self) -> impl Iterator<Item = T> + '_ {
        self.resource_read_and_writes
            .difference(&self.resource_writes)
            .map(T::get_sparse_set_index)
    }

    /// Resources written.
    pub fn resource_writes(&self) -> impl Iterator<Item = T> + '_ {
        self.resource_writes.ones().map(T::get_sparse_set_index)
    }

    /// Components accessed for presence only.
    pub fn archetypal(&self) -> impl Iterator<Item = T> + '_ {
        self.archetypal.ones().map(T::get_sparse_set_index)
    }

    /// Enumerate component access, or fail if it is unbounded (inverted).
    pub fn try_iter_component_access(
        &self,
    ) -> Result<impl Iterator<Item = ComponentAccessKind<T>> + '_, UnboundedAccessError> {
        if self.component_read_and_writes_inverted || self.component_writes_inverted {
            return Err(UnboundedAccessError {
                writes_inverted: self.component_writes_inverted,
                read_and_writes_inverted: self.component_read_and_writes_inverted,
            });
        }

        let reads_and_writes = self.component_read_and_writes.ones().map(|index| {
            let id = T::get_sparse_set_index(index);
            if self.component_writes.contains(index) {
                ComponentAccessKind::Exclusive(id)
            } else {
                ComponentAccessKind::Shared(id)
            }
        });
        let archetypal = self
            .archetypal
            .ones()
            .filter(|&index| !self.component_read_and_writes.contains(index))
            .map(|index| ComponentAccessKind::Archetypal(T::get_sparse_set_index(index)));

        Ok(reads_and_writes.chain(archetypal))
    }
}

/// Union `other` into `bitset` honoring the inverted flags of both sides.
fn extend_bitset(
    bitset: &mut FixedBitSet,
    inverted: bool,
    other: &FixedBitSet,
    other_inverted: bool,
) {
    match (inverted, other_inverted) {
        (true, true) => bitset.intersect_with(other),
        (true, false) => bitset.difference_with(other),
        (false, true) => {
            // Bits past our length flip to 1, so grow first.
            bitset.grow(other.len());
            bitset.toggle_range(..);
            bitset.intersect_with(other);
        }
        (false, false) => bitset.union_with(other),
    }
}

/// How one component is accessed, from [`Access::try_iter_component_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentAccessKind<T> {
    /// Presence only.
    Archetypal(T),
    /// Read.
    Shared(T),
    /// Written.
    Exclusive(T),
}

impl<T> ComponentAccessKind<T> {
    /// The accessed identifier.
    pub fn index(&self) -> &T {
        match self {
            Self::Archetypal(value) | Self::Shared(value) | Self::Exclusive(value) => value,
        }
    }
}

/// Component access that cannot be enumerated because it covers an open-ended set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("access is unbounded (writes inverted: {writes_inverted}, reads inverted: {read_and_writes_inverted})")]
pub struct UnboundedAccessError {
    /// Whether the write set was inverted.
    pub writes_inverted: bool,
    /// Whether the read set was inverted.
    pub read_and_writes_inverted: bool,
}

/// Result of a conflict query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessConflicts {
    /// Conflicts exist but cannot be enumerated, e.g. two accesses that write everything.
    All,
    /// The conflicting identifiers, as bit positions.
    Individual(FixedBitSet),
}

impl AccessConflicts {
    /// No conflicts.
    pub(crate) fn empty() -> Self {
        Self::Individual(FixedBitSet::new())
    }

    /// Merge another conflict result into this one.
    pub(crate) fn add(&mut self, other: &Self) {
        match (self, other) {
            (s, AccessConflicts::All) => *s = AccessConflicts::All,
            (AccessConflicts::Individual(this), AccessConflicts::Individual(other)) => {
                this.extend(other.ones());
            }
            _ => {}
        }
    }

    /// Whether there is no conflict.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All => false,
            Self::Individual(set) => set.is_clear(),
        }
    }

    /// Render the conflicting identifiers with their registered names.
    pub fn format_conflict_list(&self, world: &World) -> String {
        match self {
            AccessConflicts::All => String::new(),
            AccessConflicts::Individual(indices) => indices
                .ones()
                .map(|index| world.components().get_name_by_index(index))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<FixedBitSet> for AccessConflicts {
    fn from(value: FixedBitSet) -> Self {
        Self::Individual(value)
    }
}

impl<T: SparseSetIndex> From<Vec<T>> for AccessConflicts {
    fn from(value: Vec<T>) -> Self {
        Self::Individual(value.iter().map(T::sparse_set_index).collect())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ones(conflicts: &AccessConflicts) -> Option<Vec<usize>> {
        match conflicts {
            AccessConflicts::All => None,
            AccessConflicts::Individual(set) => Some(set.ones().collect()),
        }
    }

    #[test]
    fn write_implies_read() {
        // Given
        let mut access = Access::<usize>::new();

        // When
        access.add_component_write(3);
        access.add_resource_write(4);

        // Then
        assert!(access.has_component_read(3));
        assert!(access.has_component_write(3));
        assert!(access.has_resource_read(4));
        assert!(access.has_resource_write(4));
        assert!(!access.has_component_read(4));
    }

    #[test]
    fn readers_are_compatible() {
        // Given
        let mut a = Access::<usize>::new();
        a.add_component_read(0);
        let mut b = Access::<usize>::new();
        b.add_component_read(0);

        // Then
        assert!(a.is_compatible(&b));
        assert!(a.get_conflicts(&b).is_empty());
    }

    #[test]
    fn reader_and_writer_conflict_on_the_shared_id() {
        // Given
        let mut a = Access::<usize>::new();
        a.add_component_read(0);
        a.add_component_read(1);
        let mut b = Access::<usize>::new();
        b.add_component_write(1);
        b.add_component_write(2);

        // When
        let conflicts = a.get_conflicts(&b);

        // Then
        assert!(!a.is_compatible(&b));
        assert_eq!(ones(&conflicts), Some(vec![1]));
    }

    #[test]
    fn read_all_conflicts_with_any_write() {
        // Given
        let mut a = Access::<usize>::new();
        a.read_all();
        let mut b = Access::<usize>::new();
        b.add_component_write(5);

        // Then
        assert!(!a.is_compatible(&b));
        assert_eq!(ones(&a.get_conflicts(&b)), Some(vec![5]));
    }

    #[test]
    fn read_all_with_an_exception_is_compatible_with_a_write_to_it() {
        // Given
        let mut a = Access::<usize>::new();
        a.read_all_components();
        a.remove_component_read(5);
        let mut b = Access::<usize>::new();
        b.add_component_write(5);

        // Then
        assert!(!a.has_component_read(5));
        assert!(a.has_component_read(6));
        assert!(a.is_compatible(&b));
    }

    #[test]
    fn write_all_components_conflicts_with_itself_entirely() {
        // Given
        let mut a = Access::<usize>::new();
        a.write_all_components();

        // Then
        assert_eq!(a.get_conflicts(&a.clone()), AccessConflicts::All);
    }

    #[test]
    fn resource_write_all_conflicts_with_read_all() {
        // Given
        let mut a = Access::<usize>::new();
        a.write_all_resources();
        let mut b = Access::<usize>::new();
        b.read_all_resources();

        // Then
        assert!(!a.is_compatible(&b));
        assert_eq!(a.get_conflicts(&b), AccessConflicts::All);
    }

    #[test]
    fn resource_write_all_lists_the_other_sides_resources() {
        // Given
        let mut a = Access::<usize>::new();
        a.write_all_resources();
        let mut b = Access::<usize>::new();
        b.add_resource_read(2);
        b.add_resource_read(9);

        // Then
        assert_eq!(ones(&a.get_conflicts(&b)), Some(vec![2, 9]));
    }

    #[test]
    fn components_and_resources_are_checked_separately() {
        // Given the same id used as component on one side and resource on the other
        let mut a = Access::<usize>::new();
        a.add_component_write(1);
        let mut b = Access::<usize>::new();
        b.add_resource_write(1);

        // Then
        assert!(a.is_compatible(&b));
    }

    #[test]
    fn extend_unions_inverted_sets_soundly() {
        // Given "everything but 1" and "everything but 2"
        let mut a = Access::<usize>::new();
        a.read_all_components();
        a.remove_component_read(1);
        let mut b = Access::<usize>::new();
        b.read_all_components();
        b.remove_component_read(2);

        // When
        a.extend(&b);

        // Then the union reads everything
        assert!(a.has_component_read(1));
        assert!(a.has_component_read(2));
        assert!(a.has_read_all_components());
    }

    #[test]
    fn extend_normal_with_inverted() {
        // Given {3} and "everything but 3 and 4"
        let mut a = Access::<usize>::new();
        a.add_component_read(3);
        let mut b = Access::<usize>::new();
        b.read_all_components();
        b.remove_component_read(3);
        b.remove_component_read(4);

        // When
        a.extend(&b);

        // Then only 4 stays excluded
        assert!(a.has_component_read(3));
        assert!(!a.has_component_read(4));
        assert!(a.has_component_read(100));
    }

    #[test]
    fn subset_checks() {
        // Given
        let mut small = Access::<usize>::new();
        small.add_component_read(1);
        small.add_resource_read(2);
        let mut big = Access::<usize>::new();
        big.add_component_write(1);
        big.read_all_resources();

        // Then
        assert!(small.is_subset(&big));
        assert!(!big.is_subset(&small));

        let mut everything = Access::<usize>::new();
        everything.write_all();
        assert!(big.is_subset(&everything));
    }

    #[test]
    fn clear_writes_keeps_reads() {
        // Given
        let mut access = Access::<usize>::new();
        access.add_component_write(1);
        access.write_all_resources();

        // When
        access.clear_writes();

        // Then
        assert!(access.has_component_read(1));
        assert!(!access.has_component_write(1));
        assert!(access.has_read_all_resources());
        assert!(!access.has_any_write());
    }

    #[test]
    fn iter_component_access_kinds() {
        // Given
        let mut access = Access::<usize>::new();
        access.add_component_read(1);
        access.add_component_write(2);
        access.add_archetypal(3);
        access.add_archetypal(1);

        // When
        let kinds = access
            .try_iter_component_access()
            .map(|iter| iter.collect::<Vec<_>>());

        // Then
        assert_eq!(
            kinds,
            Ok(vec![
                ComponentAccessKind::Shared(1),
                ComponentAccessKind::Exclusive(2),
                ComponentAccessKind::Archetypal(3),
            ])
        );
    }

    #[test]
    fn iter_component_access_rejects_inverted_sets() {
        let mut access = Access::<usize>::new();
        access.read_all_components();
        assert!(access.try_iter_component_access().is_err());
    }

    #[test]
    fn resource_reads_exclude_writes() {
        // Given
        let mut access = Access::<usize>::new();
        access.add_resource_read(1);
        access.add_resource_write(2);

        // Then
        assert_eq!(access.resource_reads().collect::<Vec<_>>(), vec![1]);
        assert_eq!(access.resource_writes().collect::<Vec<_>>(), vec![2]);
        assert_eq!(
            access.resource_reads_and_writes().collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn conflicts_add_promotes_to_all() {
        // Given
        let mut conflicts = AccessConflicts::from(vec![1usize, 2]);

        // When
        conflicts.add(&AccessConflicts::from(vec![3usize]));

        // Then
        assert_eq!(ones(&conflicts), Some(vec![1, 2, 3]));

        conflicts.add(&AccessConflicts::All);
        assert_eq!(conflicts, AccessConflicts::All);
    }

    #[derive(Debug, Clone)]
    enum Op {
        ReadComponent(u8),
        WriteComponent(u8),
        RemoveRead(u8),
        RemoveWrite(u8),
        ReadResource(u8),
        WriteResource(u8),
        ReadAllComponents,
        WriteAllComponents,
        ReadAllResources,
        WriteAllResources,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0u8..16).prop_map(Op::ReadComponent),
            4 => (0u8..16).prop_map(Op::WriteComponent),
            2 => (0u8..16).prop_map(Op::RemoveRead),
            2 => (0u8..16).prop_map(Op::RemoveWrite),
            3 => (0u8..16).prop_map(Op::ReadResource),
            3 => (0u8..16).prop_map(Op::WriteResource),
            1 => Just(Op::ReadAllComponents),
            1 => Just(Op::WriteAllComponents),
            1 => Just(Op::ReadAllResources),
            1 => Just(Op::WriteAllResources),
        ]
    }

    fn access() -> impl Strategy<Value = Access<usize>> {
        proptest::collection::vec(op(), 0..12).prop_map(|ops| {
            let mut access = Access::new();
            for op in ops {
                match op {
                    Op::ReadComponent(i) => access.add_component_read(i as usize),
                    Op::WriteComponent(i) => access.add_component_write(i as usize),
                    Op::RemoveRead(i) => access.remove_component_read(i as usize),
                    Op::RemoveWrite(i) => access.remove_component_write(i as usize),
                    Op::ReadResource(i) => access.add_resource_read(i as usize),
                    Op::WriteResource(i) => access.add_resource_write(i as usize),
                    Op::ReadAllComponents => access.read_all_components(),
                    Op::WriteAllComponents => access.write_all_components(),
                    Op::ReadAllResources => access.read_all_resources(),
                    Op::WriteAllResources => access.write_all_resources(),
                }
            }
            access
        })
    }

    proptest! {
        #[test]
        fn conflicts_are_symmetric(a in access(), b in access()) {
            prop_assert_eq!(a.is_compatible(&b), b.is_compatible(&a));
            prop_assert_eq!(ones(&a.get_conflicts(&b)), ones(&b.get_conflicts(&a)));
        }

        #[test]
        fn compatibility_matches_empty_conflicts(a in access(), b in access()) {
            prop_assert_eq!(a.is_compatible(&b), a.get_conflicts(&b).is_empty());
        }

        #[test]
        fn write_conflicts_with_read_all(i in 0usize..64, prefix in access()) {
            // Given
            let mut a = prefix;
            a.read_all();
            a.add_component_write(i);
            let mut b = Access::<usize>::new();
            b.read_all();

            // Then
            prop_assert!(!a.is_compatible(&b));
        }

        #[test]
        fn read_all_is_self_compatible(_seed in 0u8..1) {
            let mut a = Access::<usize>::new();
            a.read_all();
            let mut b = Access::<usize>::new();
            b.read_all();
            prop_assert!(a.is_compatible(&b));
        }

        #[test]
        fn extend_is_monotone(a in access(), b in access()) {
            // When
            let mut c = a.clone();
            c.extend(&b);

            // Then
            for i in 0usize..20 {
                if a.has_component_read(i) || b.has_component_read(i) {
                    prop_assert!(c.has_component_read(i));
                }
                if a.has_component_write(i) || b.has_component_write(i) {
                    prop_assert!(c.has_component_write(i));
                }
                if a.has_resource_read(i) || b.has_resource_read(i) {
                    prop_assert!(c.has_resource_read(i));
                }
                if a.has_resource_write(i) || b.has_resource_write(i) {
                    prop_assert!(c.has_resource_write(i));
                }
            }
            prop_assert!(a.is_subset(&c));
            prop_assert!(b.is_subset(&c));
        }
    }
}
