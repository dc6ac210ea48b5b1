//! Strongly connected components with Pierce's space-efficient variant of Tarjan's algorithm.
//!
//! Instead of keeping a separate `index`, `lowlink` and `on_stack` per node, every node carries a
//! single `root_index`. It starts as the node's visitation index and is lowered to the smallest
//! root index reachable while walking. Finished components are relabelled with a marker counting
//! down from `usize::MAX`, which compares above every live index, so they can no longer lower
//! anyone. Recursion is simulated with an explicit `(node, is_local_root)` stack and a resumable
//! per-node neighbor cursor, so deep graphs cannot overflow the call stack.
//!
//! Reference: David J. Pierce, "A space-efficient algorithm for finding strongly connected
//! components" (2016).

use std::num::NonZeroUsize;

use crate::ecs::graph::{DiGraph, Direction, GraphNodeId};

/// Per-node search state.
#[derive(Debug, Clone, Copy)]
struct NodeData {
    /// `None` until visited; then the node's (possibly lowered) root index, or a component marker
    /// once the node's component has been emitted.
    root_index: Option<NonZeroUsize>,
    /// Position of the next link to inspect in the node's adjacency list.
    cursor: usize,
}

/// Iterator over the strongly connected components of a [`DiGraph`].
///
/// Components are yielded in reverse topological order. A component with more than one member
/// certifies at least one cycle; a singleton is acyclic unless the node has a self-loop.
pub struct TarjanScc<'g, N: GraphNodeId> {
    graph: &'g DiGraph<N>,
    /// Next node slot to offer as a search root.
    unchecked: usize,
    /// Next root index to hand out.
    index: usize,
    /// Marker for the next emitted component.
    component_count: usize,
    nodes: Vec<NodeData>,
    /// Nodes whose component is not settled yet. Filled while backtracking.
    stack: Vec<usize>,
    /// Simulated recursion.
    visitation_stack: Vec<(usize, bool)>,
    /// Start of the last emitted component on `stack`.
    start: Option<usize>,
    /// Amount to give back to `index` once the last emitted component is discarded.
    index_adjustment: Option<usize>,
}

impl<'g, N: GraphNodeId> TarjanScc<'g, N> {
    pub(crate) fn new(graph: &'g DiGraph<N>) -> Self {
        Self {
            graph,
            unchecked: 0,
            index: 1,
            component_count: usize::MAX,
            nodes: vec![
                NodeData {
                    root_index: None,
                    cursor: 0,
                };
                graph.node_count()
            ],
            stack: Vec::new(),
            visitation_stack: Vec::new(),
            start: None,
            index_adjustment: None,
        }
    }

    /// Advance to the next component, returned as node slots.
    fn next_scc(&mut self) -> Option<&[usize]> {
        // Discard the component emitted by the previous call.
        if let (Some(start), Some(index_adjustment)) =
            (self.start.take(), self.index_adjustment.take())
        {
            self.stack.truncate(start);
            self.index -= index_adjustment;
            self.component_count -= 1;
        }

        loop {
            // Finish the current search before starting another one.
            while let Some((v, v_is_local_root)) = self.visitation_stack.pop() {
                if let Some(start) = self.visit_once(v, v_is_local_root) {
                    return Some(&self.stack[start..]);
                }
            }

            if self.unchecked >= self.nodes.len() {
                return None;
            }
            let node = self.unchecked;
            self.unchecked += 1;
            if self.nodes[node].root_index.is_none() {
                self.visitation_stack.push((node, true));
            }
        }
    }

    /// Run one step of the search from `v`.
    ///
    /// Returns the start of a completed component on `stack`, or `None` if `v` descended into an
    /// unvisited neighbor or finished without being a component root.
    fn visit_once(&mut self, v: usize, mut v_is_local_root: bool) -> Option<usize> {
        if self.nodes[v].root_index.is_none() {
            self.nodes[v].root_index = NonZeroUsize::new(self.index);
            self.index += 1;
        }

        let links = self.graph.links_at(v);
        while let Some(&(neighbor, direction)) = links.get(self.nodes[v].cursor) {
            if direction == Direction::Outgoing {
                if let Some(w) = self.graph.to_index(neighbor) {
                    if self.nodes[w].root_index.is_none() {
                        // Descend. The cursor stays on `w` so its root index is compared when
                        // `v` resumes.
                        self.visitation_stack.push((v, v_is_local_root));
                        self.visitation_stack.push((w, true));
                        return None;
                    }

                    if self.nodes[w].root_index < self.nodes[v].root_index {
                        self.nodes[v].root_index = self.nodes[w].root_index;
                        v_is_local_root = false;
                    }
                }
            }
            self.nodes[v].cursor += 1;
        }

        if !v_is_local_root {
            self.stack.push(v);
            return None;
        }

        // `v` roots a component: everything above the first node with a smaller root index.
        let mut index_adjustment = 1;
        let marker = NonZeroUsize::new(self.component_count);
        let nodes = &mut self.nodes;
        let v_root = nodes[v].root_index;
        let start = self
            .stack
            .iter()
            .rposition(|&w| {
                if v_root > nodes[w].root_index {
                    true
                } else {
                    nodes[w].root_index = marker;
                    index_adjustment += 1;
                    false
                }
            })
            .map(|position| position + 1)
            .unwrap_or_default();
        nodes[v].root_index = marker;
        self.stack.push(v);

        self.start = Some(start);
        self.index_adjustment = Some(index_adjustment);
        Some(start)
    }
}

impl<N: GraphNodeId> Iterator for TarjanScc<'_, N> {
    type Item = Vec<N>;

    fn next(&mut self) -> Option<Self::Item> {
        let graph = self.graph;
        let scc = self.next_scc()?;
        Some(scc.iter().map(|&slot| graph.node_at(slot)).collect())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.graph.node_count()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use proptest::prelude::*;

    use super::*;

    fn reachable(graph: &DiGraph<u32>, from: u32) -> HashSet<u32> {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            for next in graph.neighbors(node) {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    #[test]
    fn empty_graph_has_no_components() {
        let graph = DiGraph::<u32>::default();
        assert_eq!(graph.iter_sccs().count(), 0);
    }

    #[test]
    fn chain_yields_singletons_in_reverse_topological_order() {
        // Given
        let mut graph = DiGraph::<u32>::default();
        graph.add_edge(1, 2);
        graph.add_edge(2, 3);

        // When
        let sccs = graph.iter_sccs().collect::<Vec<_>>();

        // Then
        assert_eq!(sccs, vec![vec![3], vec![2], vec![1]]);
    }

    #[test]
    fn cycle_is_one_component() {
        // Given
        let mut graph = DiGraph::<u32>::default();
        graph.add_edge(1, 2);
        graph.add_edge(2, 3);
        graph.add_edge(3, 1);
        graph.add_edge(3, 4);

        // When
        let sccs = graph.iter_sccs().collect::<Vec<_>>();

        // Then
        assert_eq!(sccs.len(), 2);
        assert_eq!(sccs[0], vec![4]);
        let mut cycle = sccs[1].clone();
        cycle.sort();
        assert_eq!(cycle, vec![1, 2, 3]);
    }

    #[test]
    fn two_cycles_joined_by_an_edge() {
        // Given
        let mut graph = DiGraph::<u32>::default();
        graph.add_edge(1, 2);
        graph.add_edge(2, 1);
        graph.add_edge(2, 3);
        graph.add_edge(3, 4);
        graph.add_edge(4, 3);

        // When
        let sccs = graph
            .iter_sccs()
            .map(|mut scc| {
                scc.sort();
                scc
            })
            .collect::<Vec<_>>();

        // Then the downstream cycle is reported first
        assert_eq!(sccs, vec![vec![3, 4], vec![1, 2]]);
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        // Given
        let mut graph = DiGraph::<u32>::default();
        for n in 0..50_000 {
            graph.add_edge(n, n + 1);
        }

        // When
        let count = graph.iter_sccs().count();

        // Then
        assert_eq!(count, 50_001);
    }

    proptest! {
        #[test]
        fn sccs_partition_the_graph_in_reverse_topological_order(
            edges in proptest::collection::vec((0u32..12, 0u32..12), 0..40)
        ) {
            // Given
            let mut graph = DiGraph::<u32>::default();
            for node in 0..12 {
                graph.add_node(node);
            }
            for (a, b) in edges.into_iter().filter(|(a, b)| a != b) {
                graph.add_edge(a, b);
            }

            // When
            let sccs = graph.iter_sccs().collect::<Vec<_>>();

            // Then every node appears in exactly one component
            let mut component_of = HashMap::new();
            for (position, scc) in sccs.iter().enumerate() {
                for &node in scc {
                    prop_assert!(component_of.insert(node, position).is_none());
                }
            }
            prop_assert_eq!(component_of.len(), 12);

            // Members are mutually reachable; non-members are not
            let reach = (0..12).map(|n| (n, reachable(&graph, n))).collect::<HashMap<_, _>>();
            for a in 0..12u32 {
                for b in 0..12u32 {
                    if a == b {
                        continue;
                    }
                    let same = component_of[&a] == component_of[&b];
                    let mutual = reach[&a].contains(&b) && reach[&b].contains(&a);
                    prop_assert_eq!(same, mutual);
                }
            }

            // Size > 1 iff the component contains a cycle
            for scc in &sccs {
                let cyclic = scc.iter().any(|n| reach[n].contains(n));
                prop_assert_eq!(scc.len() > 1, cyclic);
            }

            // No edge points from a later component back to an earlier one
            for (a, b) in graph.all_edges() {
                prop_assert!(component_of[&a] >= component_of[&b]);
            }
        }
    }
}
