//! Node-keyed adjacency graphs used to validate and flatten scheduling constraints.
//!
//! # Overview
//!
//! The schedule builder keeps three graphs over [`NodeId`]s:
//!
//! - the **hierarchy** (set → member) and the **dependency** ("runs before") graphs, both
//!   directed ([`DiGraph`])
//! - the **ambiguity** graph of pairs that may run in any order, undirected ([`UnGraph`])
//!
//! ```text
//!   hierarchy          dependency          ambiguity
//!   ┌─────┐            A ──► B ──► C       A ─── C
//!   │ Set │
//!   └┬───┬┘
//!    ▼   ▼
//!    A   B
//! ```
//!
//! Each node owns one adjacency list of `(neighbor, direction)` pairs, so a directed graph can
//! answer both "who follows me" and "who precedes me" without a second map. Edge existence is a
//! flat set of endpoint pairs (normalized for undirected graphs) that is kept in sync with the
//! lists on every insert and removal.
//!
//! Node order is insertion order. Removing a node moves the last node into its slot. All
//! iteration is a deterministic function of the operations applied, which keeps the topological
//! orders computed from these graphs stable between builds.
//!
//! # Algorithms
//!
//! - [`Graph::iter_sccs`] yields strongly connected components in reverse topological order.
//! - [`simple_cycles_in_component`] lists every simple cycle of one component for error text.
//! - [`check_graph`] computes reachability, transitive reduction and closure of a DAG.

use std::{
    collections::{HashMap, HashSet, hash_map::Entry},
    fmt::{self, Debug},
    hash::Hash,
};

mod check;
mod cycles;
mod node;
mod tarjan_scc;

pub use check::{CheckGraphResults, check_graph, index, row_col};
pub use cycles::simple_cycles_in_component;
pub use node::NodeId;
pub use tarjan_scc::TarjanScc;

/// Types usable as graph node keys.
pub trait GraphNodeId: Copy + Eq + Hash + Ord + Debug {}

impl<T: Copy + Eq + Hash + Ord + Debug> GraphNodeId for T {}

/// Edge direction relative to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    /// An edge leaving the node.
    Outgoing,
    /// An edge entering the node.
    Incoming,
}

impl Direction {
    /// The other direction.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
        }
    }
}

/// A directed graph.
pub type DiGraph<N = NodeId> = Graph<true, N>;

/// An undirected graph.
pub type UnGraph<N = NodeId> = Graph<false, N>;

/// Adjacency-list graph keyed by node identifiers.
///
/// `DIRECTED` selects between a directed graph, where every node records its outgoing and
/// incoming neighbors separately, and an undirected one, where both endpoints record each other
/// as outgoing and direction-filtered queries return every neighbor.
#[derive(Clone)]
pub struct Graph<const DIRECTED: bool, N: GraphNodeId = NodeId> {
    /// Nodes in insertion order.
    nodes: Vec<N>,
    /// Node → position in `nodes` and `adjacency`.
    slots: HashMap<N, usize>,
    /// Per-node list of `(neighbor, direction)` links, parallel to `nodes`.
    adjacency: Vec<Vec<(N, Direction)>>,
    /// Edge existence index.
    edges: HashSet<(N, N)>,
}

impl<const DIRECTED: bool, N: GraphNodeId> Default for Graph<DIRECTED, N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            slots: HashMap::new(),
            adjacency: Vec::new(),
            edges: HashSet::new(),
        }
    }
}

impl<const DIRECTED: bool, N: GraphNodeId> Debug for Graph<DIRECTED, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("directed", &DIRECTED)
            .field("nodes", &self.nodes)
            .field("edges", &self.all_edges().collect::<Vec<_>>())
            .finish()
    }
}

impl<const DIRECTED: bool, N: GraphNodeId> Graph<DIRECTED, N> {
    /// Create an empty graph with room for `nodes` nodes and `edges` edges.
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            slots: HashMap::with_capacity(nodes),
            adjacency: Vec::with_capacity(nodes),
            edges: HashSet::with_capacity(edges),
        }
    }

    /// Key under which the edge `a → b` is stored in the existence index.
    #[inline]
    fn edge_key(a: N, b: N) -> (N, N) {
        if !DIRECTED && b < a { (b, a) } else { (a, b) }
    }

    /// Direction recorded on the far endpoint of a link.
    #[inline]
    fn mirror(direction: Direction) -> Direction {
        if DIRECTED { direction.opposite() } else { direction }
    }

    /// Number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Add a node. Adding an existing node does nothing.
    pub fn add_node(&mut self, n: N) {
        if let Entry::Vacant(entry) = self.slots.entry(n) {
            entry.insert(self.nodes.len());
            self.nodes.push(n);
            self.adjacency.push(Vec::new());
        }
    }

    /// Remove a node and every edge touching it. Returns `false` if the node was absent.
    pub fn remove_node(&mut self, n: N) -> bool {
        let Some(slot) = self.slots.remove(&n) else {
            return false;
        };

        let links = std::mem::take(&mut self.adjacency[slot]);
        for (other, direction) in links {
            let (a, b) = match direction {
                Direction::Outgoing => (n, other),
                Direction::Incoming => (other, n),
            };
            self.edges.remove(&Self::edge_key(a, b));
            if other != n {
                self.remove_link(other, n, Self::mirror(direction));
            }
        }

        self.nodes.swap_remove(slot);
        self.adjacency.swap_remove(slot);
        if let Some(&moved) = self.nodes.get(slot) {
            self.slots.insert(moved, slot);
        }
        true
    }

    /// Whether the node exists.
    #[inline]
    pub fn contains_node(&self, n: N) -> bool {
        self.slots.contains_key(&n)
    }

    /// Add an edge `a → b`, registering missing endpoints. Adding an existing edge does nothing.
    pub fn add_edge(&mut self, a: N, b: N) {
        if !self.edges.insert(Self::edge_key(a, b)) {
            return;
        }
        self.add_node(a);
        self.add_node(b);
        self.push_link(a, b, Direction::Outgoing);
        if DIRECTED || a != b {
            self.push_link(b, a, Self::mirror(Direction::Outgoing));
        }
    }

    /// Remove the edge `a → b`. Returns `false` if it did not exist.
    pub fn remove_edge(&mut self, a: N, b: N) -> bool {
        if !self.edges.remove(&Self::edge_key(a, b)) {
            return false;
        }
        self.remove_link(a, b, Direction::Outgoing);
        if DIRECTED || a != b {
            self.remove_link(b, a, Self::mirror(Direction::Outgoing));
        }
        true
    }

    /// Whether the edge `a → b` exists (either orientation for undirected graphs).
    #[inline]
    pub fn contains_edge(&self, a: N, b: N) -> bool {
        self.edges.contains(&Self::edge_key(a, b))
    }

    /// Iterate nodes in insertion order.
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = N> + ExactSizeIterator + '_ {
        self.nodes.iter().copied()
    }

    /// Iterate every edge once.
    ///
    /// Directed edges are reported as `(source, target)`, grouped by source in node order.
    /// Undirected edges are reported once, with the smaller endpoint first.
    pub fn all_edges(&self) -> impl Iterator<Item = (N, N)> + '_ {
        self.nodes.iter().zip(&self.adjacency).flat_map(|(&a, links)| {
            links
                .iter()
                .filter(move |&&(b, direction)| {
                    if DIRECTED {
                        direction == Direction::Outgoing
                    } else {
                        a <= b
                    }
                })
                .map(move |&(b, _)| (a, b))
        })
    }

    /// Successors of `a` (every neighbor for undirected graphs).
    pub fn neighbors(&self, a: N) -> impl Iterator<Item = N> + '_ {
        self.neighbors_directed(a, Direction::Outgoing)
    }

    /// Neighbors of `a` in the given direction (every neighbor for undirected graphs).
    pub fn neighbors_directed(&self, a: N, direction: Direction) -> impl Iterator<Item = N> + '_ {
        self.links(a)
            .iter()
            .filter(move |&&(_, d)| !DIRECTED || d == direction)
            .map(|&(n, _)| n)
    }

    /// Outgoing edges of `a` as `(a, neighbor)` pairs.
    pub fn edges(&self, a: N) -> impl Iterator<Item = (N, N)> + '_ {
        self.neighbors(a).map(move |b| (a, b))
    }

    /// Edges of `a` in the given direction, always oriented `(source, target)`.
    pub fn edges_directed(&self, a: N, direction: Direction) -> impl Iterator<Item = (N, N)> + '_ {
        self.neighbors_directed(a, direction)
            .map(move |b| match direction {
                Direction::Outgoing => (a, b),
                Direction::Incoming => (b, a),
            })
    }

    /// Position of a node in insertion order.
    #[inline]
    pub(crate) fn to_index(&self, n: N) -> Option<usize> {
        self.slots.get(&n).copied()
    }

    /// Node stored at `slot`.
    #[inline]
    pub(crate) fn node_at(&self, slot: usize) -> N {
        self.nodes[slot]
    }

    /// Links of the node stored at `slot`.
    #[inline]
    pub(crate) fn links_at(&self, slot: usize) -> &[(N, Direction)] {
        &self.adjacency[slot]
    }

    #[inline]
    fn links(&self, a: N) -> &[(N, Direction)] {
        match self.slots.get(&a) {
            Some(&slot) => &self.adjacency[slot],
            None => &[],
        }
    }

    fn push_link(&mut self, node: N, neighbor: N, direction: Direction) {
        if let Some(&slot) = self.slots.get(&node) {
            self.adjacency[slot].push((neighbor, direction));
        }
    }

    fn remove_link(&mut self, node: N, neighbor: N, direction: Direction) {
        if let Some(&slot) = self.slots.get(&node) {
            let links = &mut self.adjacency[slot];
            if let Some(position) = links.iter().position(|&link| link == (neighbor, direction)) {
                links.remove(position);
            }
        }
    }
}

impl<N: GraphNodeId> Graph<true, N> {
    /// Iterate the strongly connected components of the graph.
    ///
    /// Components are produced in reverse topological order: if component `X` is yielded before
    /// component `Y`, there is no edge from a member of `Y` to a member of `X`. See [`TarjanScc`].
    pub fn iter_sccs(&self) -> TarjanScc<'_, N> {
        TarjanScc::new(self)
    }
}
