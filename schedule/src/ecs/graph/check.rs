use std::collections::HashMap;

use fixedbitset::FixedBitSet;

use crate::ecs::graph::{DiGraph, Direction, GraphNodeId};

/// Flat index of `(row, col)` in an `n × n` matrix.
#[inline]
pub fn index(row: usize, col: usize, num_cols: usize) -> usize {
    debug_assert!(col < num_cols);
    (row * num_cols) + col
}

/// Inverse of [`index`].
#[inline]
pub fn row_col(index: usize, num_cols: usize) -> (usize, usize) {
    (index / num_cols, index % num_cols)
}

/// Path and redundancy information about a DAG, produced by [`check_graph`].
#[derive(Debug)]
pub struct CheckGraphResults<N: GraphNodeId> {
    /// `reachable[index(i, j, n)]` is set when a path leads from the `i`-th to the `j`-th node
    /// of the topological order. Only the upper triangle can be set.
    pub reachable: FixedBitSet,
    /// Pairs connected by a path, in topological order of the pair.
    pub connected: Vec<(N, N)>,
    /// Pairs not connected by any path, in topological order of the pair.
    pub disconnected: Vec<(N, N)>,
    /// Edges implied by longer paths.
    pub transitive_edges: Vec<(N, N)>,
    /// The graph minus its transitive edges.
    pub transitive_reduction: DiGraph<N>,
    /// The graph plus an edge for every path.
    pub transitive_closure: DiGraph<N>,
    /// Node → position in the topological order used for `reachable`.
    topological_index: HashMap<N, usize>,
}

impl<N: GraphNodeId> Default for CheckGraphResults<N> {
    fn default() -> Self {
        Self {
            reachable: FixedBitSet::new(),
            connected: Vec::new(),
            disconnected: Vec::new(),
            transitive_edges: Vec::new(),
            transitive_reduction: DiGraph::default(),
            transitive_closure: DiGraph::default(),
            topological_index: HashMap::new(),
        }
    }
}

impl<N: GraphNodeId> CheckGraphResults<N> {
    /// Whether a path leads from `a` to `b`.
    pub fn contains_path(&self, a: N, b: N) -> bool {
        match (self.topological_index.get(&a), self.topological_index.get(&b)) {
            (Some(&i), Some(&j)) if i < j => {
                self.reachable[index(i, j, self.topological_index.len())]
            }
            _ => false,
        }
    }
}

/// Compute reachability, transitive reduction and transitive closure of a DAG.
///
/// `topological_order` must be a topological order of every node in `graph`.
pub fn check_graph<N: GraphNodeId>(
    graph: &DiGraph<N>,
    topological_order: &[N],
) -> CheckGraphResults<N> {
    if graph.node_count() == 0 {
        return CheckGraphResults::default();
    }

    let n = graph.node_count();

    // Copy the graph so that nodes, and each node's successors, appear in topological order.
    let mut topological_index = HashMap::with_capacity(n);
    let mut topsorted = DiGraph::<N>::with_capacity(n, graph.edge_count());
    for (i, &node) in topological_order.iter().enumerate() {
        topological_index.insert(node, i);
        topsorted.add_node(node);
        for predecessor in graph.neighbors_directed(node, Direction::Incoming) {
            topsorted.add_edge(predecessor, node);
        }
    }

    let mut reachable = FixedBitSet::with_capacity(n * n);
    let mut connected = Vec::new();
    let mut disconnected = Vec::new();
    let mut transitive_edges = Vec::new();
    let mut transitive_reduction = DiGraph::<N>::with_capacity(n, 0);
    let mut transitive_closure = DiGraph::<N>::with_capacity(n, 0);
    let mut visited = FixedBitSet::with_capacity(n);

    for node in topsorted.nodes() {
        transitive_reduction.add_node(node);
        transitive_closure.add_node(node);
    }

    // Bottom-up: every successor's closure is complete before its predecessors are processed.
    for a in topsorted.nodes().rev() {
        let index_a = topological_index[&a];
        for b in topsorted.neighbors_directed(a, Direction::Outgoing) {
            let index_b = topological_index[&b];
            debug_assert!(index_a < index_b);
            if visited[index_b] {
                // Already reachable through an earlier successor.
                transitive_edges.push((a, b));
                continue;
            }

            transitive_reduction.add_edge(a, b);
            transitive_closure.add_edge(a, b);
            reachable.insert(index(index_a, index_b, n));

            let successors = transitive_closure
                .neighbors_directed(b, Direction::Outgoing)
                .collect::<Vec<_>>();
            for c in successors {
                let index_c = topological_index[&c];
                debug_assert!(index_b < index_c);
                if !visited[index_c] {
                    visited.insert(index_c);
                    transitive_closure.add_edge(a, c);
                    reachable.insert(index(index_a, index_c, n));
                }
            }
        }
        visited.clear();
    }

    // Reachability is upper triangular because the nodes are in topological order.
    for i in 0..(n - 1) {
        for flat in index(i, i + 1, n)..=index(i, n - 1, n) {
            let (row, col) = row_col(flat, n);
            let pair = (topological_order[row], topological_order[col]);
            if reachable[flat] {
                connected.push(pair);
            } else {
                disconnected.push(pair);
            }
        }
    }

    CheckGraphResults {
        reachable,
        connected,
        disconnected,
        transitive_edges,
        transitive_reduction,
        transitive_closure,
        topological_index,
    }
}
