use std::collections::{HashMap, HashSet};

use crate::ecs::graph::{DiGraph, GraphNodeId};

/// List every simple cycle inside one strongly connected component of `graph`.
///
/// Uses the structure of Johnson's algorithm: pick a root, walk depth first while keeping a
/// *blocked* set so permutations of an already reported cycle are not found again, and an
/// *unblock-together* map that releases whole path segments once a node turns out to lie on a
/// cycle. After the root is exhausted it is removed and the search recurses into the components
/// of what is left.
///
/// Only used to render cycle diagnostics; never called on a successful build.
pub fn simple_cycles_in_component<N: GraphNodeId>(graph: &DiGraph<N>, scc: &[N]) -> Vec<Vec<N>> {
    let mut cycles = Vec::new();
    let mut sccs = vec![scc.to_vec()];

    while let Some(mut scc) = sccs.pop() {
        // Restrict the search to this component.
        let mut subgraph = DiGraph::<N>::with_capacity(scc.len(), 0);
        for &node in &scc {
            subgraph.add_node(node);
        }
        for &node in &scc {
            for successor in graph.neighbors(node) {
                if subgraph.contains_node(successor) {
                    subgraph.add_edge(node, successor);
                }
            }
        }

        let Some(root) = scc.pop() else {
            continue;
        };

        let mut path = vec![root];
        let mut blocked = HashSet::with_capacity(subgraph.node_count());
        blocked.insert(root);
        let mut unblock_together: HashMap<N, HashSet<N>> = HashMap::new();
        let mut unblock_stack = Vec::new();
        let mut maybe_in_more_cycles: HashSet<N> = HashSet::new();

        // Depth-first search frames: node, its successors and a cursor into them.
        let mut stack = vec![(root, subgraph.neighbors(root).collect::<Vec<_>>(), 0usize)];
        while let Some((node, successors, cursor)) = stack.last_mut() {
            let node = *node;
            if let Some(&next) = successors.get(*cursor) {
                *cursor += 1;
                if next == root {
                    maybe_in_more_cycles.extend(path.iter().copied());
                    cycles.push(path.clone());
                } else if !blocked.contains(&next) {
                    maybe_in_more_cycles.remove(&next);
                    path.push(next);
                    blocked.insert(next);
                    let successors = subgraph.neighbors(next).collect::<Vec<_>>();
                    stack.push((next, successors, 0));
                    continue;
                }
            }

            let exhausted = matches!(stack.last(), Some((_, successors, cursor)) if *cursor >= successors.len());
            if exhausted {
                if maybe_in_more_cycles.contains(&node) {
                    unblock_stack.push(node);
                    while let Some(n) = unblock_stack.pop() {
                        if blocked.remove(&n) {
                            let predecessors = unblock_together.entry(n).or_default();
                            unblock_stack.extend(predecessors.iter().copied());
                            predecessors.clear();
                        }
                    }
                } else {
                    // Released together with whichever successor is unblocked first.
                    for successor in subgraph.neighbors(node) {
                        unblock_together.entry(successor).or_default().insert(node);
                    }
                }

                path.pop();
                stack.pop();
            }
        }

        subgraph.remove_node(root);
        sccs.extend(subgraph.iter_sccs().filter(|scc| scc.len() > 1));
    }

    cycles
}
