use std::{fmt, marker::PhantomData};

use fixedbitset::FixedBitSet;

use crate::ecs::access::{grow_and_insert, Access, AccessConflicts, FormattedBitSet, SparseSetIndex};

/// One conjunction of `With`/`Without` predicates.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessFilters<T: SparseSetIndex> {
    pub(crate) with: FixedBitSet,
    pub(crate) without: FixedBitSet,
    _marker: PhantomData<T>,
}

impl<T: SparseSetIndex> Default for AccessFilters<T> {
    fn default() -> Self {
        Self {
            with: FixedBitSet::new(),
            without: FixedBitSet::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: SparseSetIndex + fmt::Debug> fmt::Debug for AccessFilters<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessFilters")
            .field("with", &FormattedBitSet::<T>::new(&self.with))
            .field("without", &FormattedBitSet::<T>::new(&self.without))
            .finish()
    }
}

impl<T: SparseSetIndex> AccessFilters<T> {
    /// Whether no entity can satisfy both conjunctions.
    fn is_ruled_out_by(&self, other: &Self) -> bool {
        !self.with.is_disjoint(&other.without) || !self.without.is_disjoint(&other.with)
    }
}

/// An [`Access`] guarded by filters in disjunctive normal form.
///
/// `filter_sets` is an OR of AND-groups. Two filtered accesses whose component accesses conflict
/// are still compatible when every pair of groups is mutually exclusive, e.g. one requires
/// `With<A>` and the other `Without<A>`. An empty list of groups matches nothing.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FilteredAccess<T: SparseSetIndex> {
    pub(crate) access: Access<T>,
    pub(crate) required: FixedBitSet,
    pub(crate) filter_sets: Vec<AccessFilters<T>>,
}

impl<T: SparseSetIndex> Default for FilteredAccess<T> {
    fn default() -> Self {
        Self::matches_everything()
    }
}

impl<T: SparseSetIndex + fmt::Debug> fmt::Debug for FilteredAccess<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteredAccess")
            .field("access", &self.access)
            .field("required", &FormattedBitSet::<T>::new(&self.required))
            .field("filter_sets", &self.filter_sets)
            .finish()
    }
}

impl<T: SparseSetIndex> FilteredAccess<T> {
    /// No access, one empty filter group: matches every entity.
    pub fn matches_everything() -> Self {
        Self {
            access: Access::new(),
            required: FixedBitSet::new(),
            filter_sets: vec![AccessFilters::default()],
        }
    }

    /// No access, no filter group: matches no entity.
    pub fn matches_nothing() -> Self {
        Self {
            access: Access::new(),
            required: FixedBitSet::new(),
            filter_sets: Vec::new(),
        }
    }

    /// The unfiltered access.
    #[inline]
    pub fn access(&self) -> &Access<T> {
        &self.access
    }

    /// Mutable unfiltered access.
    #[inline]
    pub fn access_mut(&mut self) -> &mut Access<T> {
        &mut self.access
    }

    /// Components an entity must have to be matched.
    pub fn required(&self) -> impl Iterator<Item = T> + '_ {
        self.required.ones().map(T::get_sparse_set_index)
    }

    /// Read a component, which also requires it and filters on it.
    pub fn add_component_read(&mut self, index: T) {
        self.access.add_component_read(index.clone());
        self.add_required(index.clone());
        self.and_with(index);
    }

    /// Write a component, which also requires it and filters on it.
    pub fn add_component_write(&mut self, index: T) {
        self.access.add_component_write(index.clone());
        self.add_required(index.clone());
        self.and_with(index);
    }

    /// Read a resource.
    pub fn add_resource_read(&mut self, index: T) {
        self.access.add_resource_read(index);
    }

    /// Write a resource.
    pub fn add_resource_write(&mut self, index: T) {
        self.access.add_resource_write(index);
    }

    /// Require a component without accessing it.
    pub fn add_required(&mut self, index: T) {
        grow_and_insert(&mut self.required, index.sparse_set_index());
    }

    /// AND a `With` predicate into every group.
    pub fn and_with(&mut self, index: T) {
        let index = index.sparse_set_index();
        for filter in &mut self.filter_sets {
            grow_and_insert(&mut filter.with, index);
        }
    }

    /// AND a `Without` predicate into every group.
    pub fn and_without(&mut self, index: T) {
        let index = index.sparse_set_index();
        for filter in &mut self.filter_sets {
            grow_and_insert(&mut filter.without, index);
        }
    }

    /// OR the groups of `other` into this access.
    pub fn append_or(&mut self, other: &FilteredAccess<T>) {
        self.filter_sets.extend(other.filter_sets.iter().cloned());
    }

    /// Merge only the unfiltered access of `other`.
    pub fn extend_access(&mut self, other: &FilteredAccess<T>) {
        self.access.extend(&other.access);
    }

    /// Whether the two filtered accesses may be held at the same time.
    pub fn is_compatible(&self, other: &FilteredAccess<T>) -> bool {
        if !self.access.is_resources_compatible(&other.access) {
            return false;
        }
        if self.access.is_components_compatible(&other.access) {
            return true;
        }

        // Conflicting component access is fine when no entity can match both sides.
        self.filter_sets.iter().all(|filter| {
            other
                .filter_sets
                .iter()
                .all(|other_filter| filter.is_ruled_out_by(other_filter))
        })
    }

    /// Conflicting identifiers, empty when [`is_compatible`](Self::is_compatible).
    pub fn get_conflicts(&self, other: &FilteredAccess<T>) -> AccessConflicts {
        if !self.is_compatible(other) {
            return self.access.get_conflicts(&other.access);
        }
        AccessConflicts::empty()
    }

    /// AND `other` into this access: union the accesses and take the cross product of groups.
    pub fn extend(&mut self, other: &FilteredAccess<T>) {
        self.access.extend(&other.access);
        self.required.union_with(&other.required);

        if let [only] = other.filter_sets.as_slice() {
            for filter in &mut self.filter_sets {
                filter.with.union_with(&only.with);
                filter.without.union_with(&only.without);
            }
            return;
        }

        let mut filter_sets = Vec::with_capacity(self.filter_sets.len() * other.filter_sets.len());
        for filter in &self.filter_sets {
            for other_filter in &other.filter_sets {
                let mut combined = filter.clone();
                combined.with.union_with(&other_filter.with);
                combined.without.union_with(&other_filter.without);
                filter_sets.push(combined);
            }
        }
        self.filter_sets = filter_sets;
    }

    /// Read every component.
    pub fn read_all_components(&mut self) {
        self.access.read_all_components();
    }

    /// Write every component.
    pub fn write_all_components(&mut self) {
        self.access.write_all_components();
    }

    /// Read everything.
    pub fn read_all(&mut self) {
        self.access.read_all();
    }

    /// Write everything.
    pub fn write_all(&mut self) {
        self.access.write_all();
    }

    /// Whether `other` requires and accesses at least as much.
    pub fn is_subset(&self, other: &FilteredAccess<T>) -> bool {
        self.required.is_subset(&other.required) && self.access.is_subset(&other.access)
    }

    /// Whether the identifier is accessed or filtered on.
    pub fn contains(&self, index: T) -> bool {
        let raw = index.sparse_set_index();
        self.access.has_component_read(index.clone())
            || self.access.has_archetypal(index)
            || self
                .filter_sets
                .iter()
                .any(|filter| filter.with.contains(raw) || filter.without.contains(raw))
    }

    /// `With` predicates of each group.
    pub fn with_filters(&self) -> impl Iterator<Item = T> + '_ {
        self.filter_sets
            .iter()
            .flat_map(|filter| filter.with.ones().map(T::get_sparse_set_index))
    }

    /// `Without` predicates of each group.
    pub fn without_filters(&self) -> impl Iterator<Item = T> + '_ {
        self.filter_sets
            .iter()
            .flat_map(|filter| filter.without.ones().map(T::get_sparse_set_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(ids: &[usize]) -> FilteredAccess<usize> {
        let mut filtered = FilteredAccess::default();
        for &id in ids {
            filtered.and_with(id);
        }
        filtered
    }

    #[test]
    fn read_requires_and_filters() {
        // Given
        let mut filtered = FilteredAccess::<usize>::default();

        // When
        filtered.add_component_read(2);

        // Then
        assert!(filtered.access().has_component_read(2));
        assert_eq!(filtered.required().collect::<Vec<_>>(), vec![2]);
        assert_eq!(filtered.with_filters().collect::<Vec<_>>(), vec![2]);
        assert!(filtered.contains(2));
        assert!(!filtered.contains(3));
    }

    #[test]
    fn with_and_without_make_writes_disjoint() {
        // Given Query<&mut A, With<B>> and Query<&mut A, Without<B>>
        let mut a = FilteredAccess::<usize>::default();
        a.add_component_write(0);
        a.and_with(1);
        let mut b = FilteredAccess::<usize>::default();
        b.add_component_write(0);
        b.and_without(1);

        // Then
        assert!(a.is_compatible(&b));
        assert!(a.get_conflicts(&b).is_empty());
    }

    #[test]
    fn unfiltered_writes_conflict() {
        // Given
        let mut a = FilteredAccess::<usize>::default();
        a.add_component_write(0);
        let mut b = FilteredAccess::<usize>::default();
        b.add_component_read(0);

        // When
        let conflicts = a.get_conflicts(&b);

        // Then
        assert!(!a.is_compatible(&b));
        let AccessConflicts::Individual(ids) = conflicts else {
            panic!("expected individual conflicts");
        };
        assert_eq!(ids.ones().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn filters_do_not_help_resources() {
        // Given
        let mut a = FilteredAccess::<usize>::default();
        a.add_resource_write(0);
        a.and_with(1);
        let mut b = FilteredAccess::<usize>::default();
        b.add_resource_read(0);
        b.and_without(1);

        // Then
        assert!(!a.is_compatible(&b));
    }

    #[test]
    fn extend_with_single_group_ands_into_every_group() {
        // Given (With<0> OR With<1>) AND Without<2>
        let mut filtered = with(&[0]);
        filtered.append_or(&with(&[1]));
        let mut without = FilteredAccess::<usize>::default();
        without.and_without(2);

        // When
        filtered.extend(&without);

        // Then
        assert_eq!(filtered.filter_sets.len(), 2);
        assert!(filtered
            .filter_sets
            .iter()
            .all(|filter| filter.without.contains(2)));
    }

    #[test]
    fn extend_takes_the_cross_product_of_groups() {
        // Given (With<0> OR With<1>) AND (With<2> OR With<3>)
        let mut lhs = with(&[0]);
        lhs.append_or(&with(&[1]));
        let mut rhs = with(&[2]);
        rhs.append_or(&with(&[3]));

        // When
        lhs.extend(&rhs);

        // Then
        let mut groups = lhs
            .filter_sets
            .iter()
            .map(|filter| filter.with.ones().collect::<Vec<_>>())
            .collect::<Vec<_>>();
        groups.sort();
        assert_eq!(
            groups,
            vec![vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3]]
        );
    }

    #[test]
    fn or_group_that_overlaps_keeps_the_conflict() {
        // Given Query<&mut A, Or<(With<B>, With<C>)>> against Query<&mut A, Without<B>>
        let mut a = with(&[1]);
        a.append_or(&with(&[2]));
        a.add_component_write(0);
        let mut b = FilteredAccess::<usize>::default();
        b.add_component_write(0);
        b.and_without(1);

        // Then the With<C> branch can still overlap
        assert!(!a.is_compatible(&b));
    }

    #[test]
    fn matches_nothing_has_no_groups() {
        let nothing = FilteredAccess::<usize>::matches_nothing();
        assert!(nothing.filter_sets.is_empty());
        assert_eq!(FilteredAccess::<usize>::matches_everything().filter_sets.len(), 1);
    }

    #[test]
    fn subset_requires_both_parts() {
        // Given
        let mut small = FilteredAccess::<usize>::default();
        small.add_component_read(0);
        let mut big = FilteredAccess::<usize>::default();
        big.add_component_write(0);
        big.add_component_read(1);

        // Then
        assert!(small.is_subset(&big));
        assert!(!big.is_subset(&small));
    }
}
