use std::collections::{BTreeSet, HashMap};

use crate::ecs::{
    graph::{DiGraph, Direction, NodeId},
    schedule::{
        ScheduleBuildError, ScheduleBuildPass, ScheduleGraph, builder::ReportCycles,
        config::DependencyOption,
    },
    system::{ApplyDeferred, is_apply_deferred},
    world::World,
};

/// Inserts [`ApplyDeferred`] sync points into the flattened dependency graph.
///
/// Every node gets a distance: the number of sync points that must run before it on any path
/// from a root. An edge leaving a system with deferred mutations raises the distance of its
/// target by one, unless the edge was declared with [`DependencyOption::IgnoreDeferred`], in
/// which case the pending sync is carried to the target instead. Edges whose endpoints end up
/// at different distances are routed through the sync point of the target's distance.
///
/// A user-placed `ApplyDeferred` counts as the sync point of its distance when neither it nor
/// any set above it has run conditions. Otherwise one sync point is created per distance and
/// reused by later builds, so rebuilding an unchanged graph yields the same plan.
#[derive(Debug, Default)]
pub struct AutoInsertApplyDeferredPass {
    /// Edges that must not get a sync point.
    no_sync_edges: BTreeSet<(NodeId, NodeId)>,
    /// Sync points created so far, by distance.
    auto_sync_node_ids: HashMap<u32, NodeId>,
}

impl AutoInsertApplyDeferredPass {
    /// The sync point for `distance`, created on first use.
    fn get_sync_point(&mut self, graph: &mut ScheduleGraph, distance: u32) -> NodeId {
        if let Some(&id) = self.auto_sync_node_ids.get(&distance) {
            return id;
        }
        let id = graph.add_auto_sync(Box::new(ApplyDeferred));
        self.auto_sync_node_ids.insert(distance, id);
        id
    }
}

/// Whether a set or any set above it has run conditions.
fn set_has_conditions(graph: &ScheduleGraph, set: NodeId) -> bool {
    !graph.set_conditions_at(set).is_empty()
        || graph
            .hierarchy()
            .graph()
            .neighbors_directed(set, Direction::Incoming)
            .any(|parent| set_has_conditions(graph, parent))
}

/// Whether a system or any set above it has run conditions.
fn system_has_conditions(graph: &ScheduleGraph, system: NodeId) -> bool {
    !graph.system_conditions_at(system).is_empty()
        || graph
            .hierarchy()
            .graph()
            .neighbors_directed(system, Direction::Incoming)
            .any(|parent| set_has_conditions(graph, parent))
}

impl ScheduleBuildPass for AutoInsertApplyDeferredPass {
    fn add_dependency(&mut self, from: NodeId, to: NodeId, options: &[DependencyOption]) {
        if options.contains(&DependencyOption::IgnoreDeferred) {
            self.no_sync_edges.insert((from, to));
        }
    }

    fn collapse_set(
        &mut self,
        set: NodeId,
        systems: &[NodeId],
        dependency_flattened: &DiGraph,
        _dependencies_to_add: &mut Vec<(NodeId, NodeId)>,
    ) {
        if systems.is_empty() {
            // An empty set is bridged; the bridge ignores syncs only if both halves did.
            for a in dependency_flattened.neighbors_directed(set, Direction::Incoming) {
                for b in dependency_flattened.neighbors_directed(set, Direction::Outgoing) {
                    if self.no_sync_edges.contains(&(a, set))
                        && self.no_sync_edges.contains(&(set, b))
                    {
                        self.no_sync_edges.insert((a, b));
                    }
                }
            }
            return;
        }

        for a in dependency_flattened.neighbors_directed(set, Direction::Incoming) {
            if self.no_sync_edges.contains(&(a, set)) {
                for &system in systems {
                    self.no_sync_edges.insert((a, system));
                }
            }
        }
        for b in dependency_flattened.neighbors_directed(set, Direction::Outgoing) {
            if self.no_sync_edges.contains(&(set, b)) {
                for &system in systems {
                    self.no_sync_edges.insert((system, b));
                }
            }
        }
    }

    fn build(
        &mut self,
        _world: &mut World,
        graph: &mut ScheduleGraph,
        dependency_flattened: &mut DiGraph,
    ) -> Result<(), ScheduleBuildError> {
        let topo = graph.topsort_graph(dependency_flattened, ReportCycles::Dependency)?;

        let mut has_conditions_cache = HashMap::<NodeId, bool>::new();
        let mut is_valid_explicit_sync_point = |graph: &ScheduleGraph, node: NodeId| {
            graph.get_system_at(node).is_some_and(is_apply_deferred)
                && !*has_conditions_cache
                    .entry(node)
                    .or_insert_with(|| system_has_conditions(graph, node))
        };

        let mut distances_and_pending_sync = HashMap::<NodeId, (u32, bool)>::with_capacity(topo.len());
        let mut distance_to_explicit_sync_node = HashMap::<u32, NodeId>::new();

        for &node in &topo {
            let (node_distance, mut node_needs_sync) = distances_and_pending_sync
                .get(&node)
                .copied()
                .unwrap_or_default();

            if is_valid_explicit_sync_point(graph, node) {
                // Every predecessor has been visited, so this distance is final.
                distance_to_explicit_sync_node.insert(node_distance, node);
                node_needs_sync = false;
            } else if !node_needs_sync {
                node_needs_sync = graph
                    .get_system_at(node)
                    .is_some_and(|system| system.has_deferred());
            }

            for target in dependency_flattened.neighbors_directed(node, Direction::Outgoing) {
                let target_is_exclusive = graph
                    .get_system_at(target)
                    .is_some_and(|system| system.is_exclusive());
                let target_is_sync_point = is_valid_explicit_sync_point(graph, target);

                let (target_distance, target_pending_sync) =
                    distances_and_pending_sync.entry(target).or_default();

                let mut edge_needs_sync = node_needs_sync;
                if node_needs_sync
                    && !target_is_exclusive
                    && self.no_sync_edges.contains(&(node, target))
                {
                    // The target takes over the pending sync for a later edge.
                    *target_pending_sync = true;
                    edge_needs_sync = false;
                }

                let weight = u32::from(edge_needs_sync || target_is_sync_point);
                *target_distance = (node_distance + weight).max(*target_distance);
            }
        }

        let mut sync_point_graph = dependency_flattened.clone();
        for &node in &topo {
            let (node_distance, _) = distances_and_pending_sync
                .get(&node)
                .copied()
                .unwrap_or_default();

            let targets = dependency_flattened
                .neighbors_directed(node, Direction::Outgoing)
                .collect::<Vec<_>>();
            for target in targets {
                let (target_distance, _) = distances_and_pending_sync
                    .get(&target)
                    .copied()
                    .unwrap_or_default();

                if node_distance == target_distance {
                    continue;
                }
                if graph.get_system_at(target).is_some_and(is_apply_deferred) {
                    continue;
                }

                let sync_point = match distance_to_explicit_sync_node.get(&target_distance) {
                    Some(&sync_point) => sync_point,
                    None => self.get_sync_point(graph, target_distance),
                };

                sync_point_graph.add_edge(node, sync_point);
                sync_point_graph.add_edge(sync_point, target);
                sync_point_graph.remove_edge(node, target);
            }
        }

        *dependency_flattened = sync_point_graph;
        Ok(())
    }
}
