use crate::ecs::access::{Access, AccessConflicts, FilteredAccess, SparseSetIndex};

/// Every filtered access of one system, plus their union.
///
/// The union answers the common case quickly: if the combined accesses are compatible, so is
/// every pair. Only otherwise are the individual filtered accesses compared pairwise, which lets
/// filters prove disjointness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredAccessSet<T: SparseSetIndex> {
    combined_access: Access<T>,
    filtered_accesses: Vec<FilteredAccess<T>>,
}

impl<T: SparseSetIndex> Default for FilteredAccessSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SparseSetIndex> FilteredAccessSet<T> {
    /// An empty set.
    pub const fn new() -> Self {
        Self {
            combined_access: Access::new(),
            filtered_accesses: Vec::new(),
        }
    }

    /// Union of every access in the set.
    #[inline]
    pub fn combined_access(&self) -> &Access<T> {
        &self.combined_access
    }

    /// The individual filtered accesses.
    #[inline]
    pub fn filtered_accesses(&self) -> &[FilteredAccess<T>] {
        &self.filtered_accesses
    }

    /// Iterate over the individual filtered accesses.
    pub fn iter(&self) -> impl Iterator<Item = &FilteredAccess<T>> {
        self.filtered_accesses.iter()
    }

    /// Whether every pair across the two sets is compatible.
    pub fn is_compatible(&self, other: &FilteredAccessSet<T>) -> bool {
        if self.combined_access.is_compatible(other.combined_access()) {
            return true;
        }
        self.filtered_accesses.iter().all(|filtered| {
            other
                .filtered_accesses
                .iter()
                .all(|other_filtered| filtered.is_compatible(other_filtered))
        })
    }

    /// Union of the conflicts of every incompatible pair.
    pub fn get_conflicts(&self, other: &FilteredAccessSet<T>) -> AccessConflicts {
        let mut conflicts = AccessConflicts::empty();
        if !self.combined_access.is_compatible(other.combined_access()) {
            for filtered in &self.filtered_accesses {
                for other_filtered in &other.filtered_accesses {
                    conflicts.add(&filtered.get_conflicts(other_filtered));
                }
            }
        }
        conflicts
    }

    /// Conflicts between this set and a single filtered access.
    pub fn get_conflicts_single(&self, filtered_access: &FilteredAccess<T>) -> AccessConflicts {
        let mut conflicts = AccessConflicts::empty();
        if !self.combined_access.is_compatible(filtered_access.access()) {
            for filtered in &self.filtered_accesses {
                conflicts.add(&filtered.get_conflicts(filtered_access));
            }
        }
        conflicts
    }

    /// Add a filtered access.
    pub fn add(&mut self, filtered_access: FilteredAccess<T>) {
        self.combined_access.extend(&filtered_access.access);
        self.filtered_accesses.push(filtered_access);
    }

    /// Read a component on every entity.
    pub fn add_unfiltered_component_read(&mut self, index: T) {
        let mut filtered = FilteredAccess::matches_everything();
        filtered.add_component_read(index);
        self.add(filtered);
    }

    /// Write a component on every entity.
    pub fn add_unfiltered_component_write(&mut self, index: T) {
        let mut filtered = FilteredAccess::matches_everything();
        filtered.add_component_write(index);
        self.add(filtered);
    }

    /// Read a resource.
    pub fn add_unfiltered_resource_read(&mut self, index: T) {
        let mut filtered = FilteredAccess::matches_everything();
        filtered.add_resource_read(index);
        self.add(filtered);
    }

    /// Write a resource.
    pub fn add_unfiltered_resource_write(&mut self, index: T) {
        let mut filtered = FilteredAccess::matches_everything();
        filtered.add_resource_write(index);
        self.add(filtered);
    }

    /// Read every resource.
    pub fn add_unfiltered_read_all_resources(&mut self) {
        let mut filtered = FilteredAccess::matches_everything();
        filtered.access.read_all_resources();
        self.add(filtered);
    }

    /// Write every resource.
    pub fn add_unfiltered_write_all_resources(&mut self) {
        let mut filtered = FilteredAccess::matches_everything();
        filtered.access.write_all_resources();
        self.add(filtered);
    }

    /// Merge another set into this one.
    pub fn extend(&mut self, other: FilteredAccessSet<T>) {
        self.combined_access.extend(&other.combined_access);
        self.filtered_accesses.extend(other.filtered_accesses);
    }

    /// Read everything.
    pub fn read_all(&mut self) {
        let mut filtered = FilteredAccess::matches_everything();
        filtered.read_all();
        self.add(filtered);
    }

    /// Write everything.
    pub fn write_all(&mut self) {
        let mut filtered = FilteredAccess::matches_everything();
        filtered.write_all();
        self.add(filtered);
    }

    /// Drop all access.
    pub fn clear(&mut self) {
        self.combined_access.clear();
        self.filtered_accesses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_access_is_the_union() {
        // Given
        let mut set = FilteredAccessSet::<usize>::new();

        // When
        set.add_unfiltered_component_read(1);
        set.add_unfiltered_resource_write(2);

        // Then
        assert!(set.combined_access().has_component_read(1));
        assert!(set.combined_access().has_resource_write(2));
        assert_eq!(set.filtered_accesses().len(), 2);
    }

    #[test]
    fn filters_rescue_a_conflicting_union() {
        // Given two systems whose queries write A on disjoint entity sets
        let mut with_b = FilteredAccess::<usize>::default();
        with_b.add_component_write(0);
        with_b.and_with(1);
        let mut without_b = FilteredAccess::<usize>::default();
        without_b.add_component_write(0);
        without_b.and_without(1);

        let mut lhs = FilteredAccessSet::new();
        lhs.add(with_b);
        let mut rhs = FilteredAccessSet::new();
        rhs.add(without_b);

        // Then
        assert!(!lhs.combined_access().is_compatible(rhs.combined_access()));
        assert!(lhs.is_compatible(&rhs));
        assert!(lhs.get_conflicts(&rhs).is_empty());
    }

    #[test]
    fn conflicts_are_collected_across_pairs() {
        // Given
        let mut lhs = FilteredAccessSet::<usize>::new();
        lhs.add_unfiltered_component_write(0);
        lhs.add_unfiltered_resource_write(5);
        let mut rhs = FilteredAccessSet::<usize>::new();
        rhs.add_unfiltered_component_read(0);
        rhs.add_unfiltered_resource_read(5);
        rhs.add_unfiltered_component_read(9);

        // When
        let conflicts = lhs.get_conflicts(&rhs);

        // Then
        let AccessConflicts::Individual(ids) = conflicts else {
            panic!("expected individual conflicts");
        };
        assert_eq!(ids.ones().collect::<Vec<_>>(), vec![0, 5]);
        assert!(!lhs.is_compatible(&rhs));
    }

    #[test]
    fn world_writers_conflict_with_everything() {
        // Given
        let mut exclusive = FilteredAccessSet::<usize>::new();
        exclusive.write_all();
        let mut reader = FilteredAccessSet::<usize>::new();
        reader.read_all();

        // Then
        assert_eq!(exclusive.get_conflicts(&reader), AccessConflicts::All);
    }

    #[test]
    fn single_conflicts_and_extend() {
        // Given
        let mut set = FilteredAccessSet::<usize>::new();
        set.add_unfiltered_read_all_resources();
        let mut other = FilteredAccessSet::<usize>::new();
        other.add_unfiltered_write_all_resources();

        // When
        set.extend(other);

        // Then
        assert!(set.combined_access().has_write_all_resources());
        let mut probe = FilteredAccess::<usize>::default();
        probe.add_resource_read(3);
        assert!(!set.get_conflicts_single(&probe).is_empty());

        set.clear();
        assert!(set.get_conflicts_single(&probe).is_empty());
    }
}
