//! The schedule graph and its build pipeline.
//!
//! [`ScheduleGraph`] accumulates systems, sets and their metadata as they are registered, then
//! compiles them into a [`SystemSchedule`]. Compilation runs these phases in order, threading
//! one [`BuildContext`] through them:
//!
//! ```text
//!  1  topsort hierarchy              HierarchyCycle
//!  2  hierarchy redundancy           HierarchyRedundancy (per settings)
//!  3  topsort dependencies           DependencyCycle
//!  4  cross dependencies             CrossDependency
//!  5  map sets to systems
//!  6  ordered sets must be disjoint  SetsHaveOrderButIntersect
//!  7  system type set usage          SystemTypeSetAmbiguity
//!  8  flatten sets out of the dependency graph
//!  9  build passes
//! 10  topsort + reduce flattened     DependencyCycle
//! 11  flatten ambiguity exemptions
//! 12  access conflicts               Ambiguity (per settings)
//! 13  assemble the plan
//! ```
//!
//! Self-loops are rejected earlier, when the offending edge is registered.

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    mem,
};

use fixedbitset::FixedBitSet;
use log::{debug, warn};

use crate::ecs::{
    access::{AccessConflicts, SparseSetIndex},
    component::{ComponentId, Registry},
    graph::{
        CheckGraphResults, DiGraph, Direction, NodeId, UnGraph, check_graph, index,
        simple_cycles_in_component,
    },
    schedule::{
        AnonymousSet, BuildPass, BuildPassKind, InternedScheduleLabel, InternedSystemSet,
        LogLevel, ScheduleBuildError, ScheduleBuildSettings, ScheduleBuildWarning, SystemSet,
        config::{
            Ambiguity, Chain, Dependency, DependencyKind, DependencyOption, GraphInfo,
            IntoNodeConfigs, NodeConfig, NodeConfigs,
        },
        executor::SystemSchedule,
    },
    system::{BoxedCondition, BoxedSystem, System},
    util::short_name,
    world::World,
};

/// A system slot. Empty while the system is owned by the compiled plan.
pub struct SystemNode {
    inner: Option<BoxedSystem>,
    name: Cow<'static, str>,
}

impl SystemNode {
    fn new(system: BoxedSystem) -> Self {
        Self {
            name: system.name(),
            inner: Some(system),
        }
    }

    /// The system, unless it is currently owned by the plan.
    pub fn get(&self) -> Option<&dyn System<Out = ()>> {
        self.inner.as_deref()
    }

    /// The system, unless it is currently owned by the plan.
    pub fn get_mut(&mut self) -> Option<&mut BoxedSystem> {
        self.inner.as_mut()
    }

    /// Name of the system, available even while the slot is empty.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A set slot.
pub struct SystemSetNode {
    inner: InternedSystemSet,
}

impl SystemSetNode {
    fn new(set: InternedSystemSet) -> Self {
        Self { inner: set }
    }

    /// The interned set.
    pub fn set(&self) -> InternedSystemSet {
        self.inner
    }

    /// Debug rendering of the set.
    pub fn name(&self) -> String {
        format!("{:?}", self.inner)
    }

    /// Whether this is the implicit set of a system type.
    pub fn is_system_type(&self) -> bool {
        self.inner.system_type().is_some()
    }

    /// Whether this set was created for collective conditions.
    pub fn is_anonymous(&self) -> bool {
        self.inner.is_anonymous()
    }
}

/// A directed graph plus its topological order as of the last build.
#[derive(Debug, Default)]
pub struct Dag {
    graph: DiGraph,
    topsort: Vec<NodeId>,
}

impl Dag {
    /// The graph.
    pub fn graph(&self) -> &DiGraph {
        &self.graph
    }

    /// Topological order computed by the last build. May be stale.
    pub fn cached_topsort(&self) -> &[NodeId] {
        &self.topsort
    }
}

/// Which graph a topological sort is for; selects the error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReportCycles {
    Hierarchy,
    Dependency,
}

/// Intermediate results of one build, passed from phase to phase.
#[derive(Default)]
struct BuildContext {
    /// Reachability and reduction of the hierarchy.
    hierarchy: CheckGraphResults<NodeId>,
    /// Reachability of the declared dependency graph.
    dependency: CheckGraphResults<NodeId>,
    /// Every set's systems, deduplicated, in discovery order.
    set_systems: BTreeMap<NodeId, Vec<NodeId>>,
    /// Every set's systems, as a bitset over system indices.
    set_system_bitsets: BTreeMap<NodeId, FixedBitSet>,
    /// Systems-only dependency graph, reduced after the passes ran.
    dependency_flattened: Dag,
    /// System pairs with no path between them in the flattened graph.
    flat_disconnected: Vec<(NodeId, NodeId)>,
    /// Systems-only ambiguity exemptions.
    ambiguous_with_flattened: UnGraph,
    /// Systems exempt from ambiguity checks altogether.
    ambiguous_with_all_flattened: HashSet<NodeId>,
}

/// Outcome of processing one level of nested configs.
struct ProcessConfigsResult {
    /// Nodes added, in order. Only collected when chaining needs them.
    nodes: Vec<NodeId>,
    /// Whether every node is ordered after the previous one, so that only the first and last
    /// need edges when chaining this group into a larger chain.
    densely_chained: bool,
}

/// A node kind that can be registered from a [`NodeConfig`].
trait ProcessNodeConfig: Sized {
    fn process_config(
        graph: &mut ScheduleGraph,
        config: NodeConfig<Self>,
    ) -> Result<NodeId, ScheduleBuildError>;
}

impl ProcessNodeConfig for BoxedSystem {
    fn process_config(
        graph: &mut ScheduleGraph,
        config: NodeConfig<Self>,
    ) -> Result<NodeId, ScheduleBuildError> {
        graph.add_system_inner(config)
    }
}

impl ProcessNodeConfig for InternedSystemSet {
    fn process_config(
        graph: &mut ScheduleGraph,
        config: NodeConfig<Self>,
    ) -> Result<NodeId, ScheduleBuildError> {
        graph.configure_set_inner(config)
    }
}

/// Build-time state of a schedule.
pub struct ScheduleGraph {
    pub(crate) systems: Vec<SystemNode>,
    pub(crate) system_conditions: Vec<Vec<BoxedCondition>>,
    system_sets: Vec<SystemSetNode>,
    system_set_conditions: Vec<Vec<BoxedCondition>>,
    system_set_ids: HashMap<InternedSystemSet, NodeId>,
    /// Nodes awaiting initialization, with the index of their first new condition.
    uninit: Vec<(NodeId, usize)>,
    hierarchy: Dag,
    dependency: Dag,
    ambiguous_with: UnGraph,
    pub(crate) ambiguous_with_all: HashSet<NodeId>,
    /// Options of declared dependency edges, replayed to passes added later.
    edge_options: HashMap<(NodeId, NodeId), Vec<DependencyOption>>,
    conflicting_systems: Vec<(NodeId, NodeId, Vec<ComponentId>)>,
    anonymous_sets: usize,
    changed: bool,
    pub(crate) settings: ScheduleBuildSettings,
    passes: Vec<BuildPass>,
    warnings: Vec<ScheduleBuildWarning>,
}

impl Default for ScheduleGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleGraph {
    /// An empty graph with default settings and no passes.
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            system_conditions: Vec::new(),
            system_sets: Vec::new(),
            system_set_conditions: Vec::new(),
            system_set_ids: HashMap::new(),
            uninit: Vec::new(),
            hierarchy: Dag::default(),
            dependency: Dag::default(),
            ambiguous_with: UnGraph::default(),
            ambiguous_with_all: HashSet::new(),
            edge_options: HashMap::new(),
            conflicting_systems: Vec::new(),
            anonymous_sets: 0,
            changed: false,
            settings: ScheduleBuildSettings::default(),
            passes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The system at `id`, unless `id` is a set or the system is owned by the plan.
    pub fn get_system_at(&self, id: NodeId) -> Option<&dyn System<Out = ()>> {
        self.systems.get(id.as_system()?)?.get()
    }

    /// Whether `set` has a node in this graph.
    pub fn contains_set(&self, set: impl SystemSet) -> bool {
        self.system_set_ids.contains_key(&set.intern())
    }

    /// The set at `id`.
    pub fn get_set_at(&self, id: NodeId) -> Option<&dyn SystemSet> {
        self.system_sets.get(id.as_set()?).map(|node| &*node.inner.0)
    }

    /// Conditions of the set at `id` that are held by the graph.
    pub fn set_conditions_at(&self, id: NodeId) -> &[BoxedCondition] {
        id.as_set()
            .and_then(|index| self.system_set_conditions.get(index))
            .map_or(&[], Vec::as_slice)
    }

    /// Conditions of the system at `id` that are held by the graph.
    pub fn system_conditions_at(&self, id: NodeId) -> &[BoxedCondition] {
        id.as_system()
            .and_then(|index| self.system_conditions.get(index))
            .map_or(&[], Vec::as_slice)
    }

    /// Systems held by the graph, with their conditions.
    pub fn systems(
        &self,
    ) -> impl Iterator<Item = (NodeId, &dyn System<Out = ()>, &[BoxedCondition])> {
        self.systems
            .iter()
            .zip(&self.system_conditions)
            .enumerate()
            .filter_map(|(index, (node, conditions))| {
                Some((NodeId::System(index), node.get()?, conditions.as_slice()))
            })
    }

    /// Sets with the conditions held by the graph.
    pub fn system_sets(&self) -> impl Iterator<Item = (NodeId, &dyn SystemSet, &[BoxedCondition])> {
        self.system_sets
            .iter()
            .zip(&self.system_set_conditions)
            .enumerate()
            .map(|(index, (node, conditions))| {
                (NodeId::Set(index), &*node.inner.0, conditions.as_slice())
            })
    }

    /// Containment graph: edges from a set to its direct members.
    pub fn hierarchy(&self) -> &Dag {
        &self.hierarchy
    }

    /// Declared ordering graph, with sets.
    pub fn dependency(&self) -> &Dag {
        &self.dependency
    }

    /// Unordered conflicting system pairs found by the last build, with the ids they conflict
    /// on. An empty list means the pair conflicts on everything.
    pub fn conflicting_systems(&self) -> &[(NodeId, NodeId, Vec<ComponentId>)] {
        &self.conflicting_systems
    }

    /// Diagnostics the last build reported at [`LogLevel::Warn`].
    pub fn warnings(&self) -> &[ScheduleBuildWarning] {
        &self.warnings
    }

    /// Whether the graph changed since the last build.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Force or suppress a rebuild before the next run.
    pub fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
    }

    /// Current build settings.
    pub fn settings(&self) -> &ScheduleBuildSettings {
        &self.settings
    }

    /// Register systems.
    pub fn add_systems(
        &mut self,
        systems: impl IntoNodeConfigs<BoxedSystem>,
    ) -> Result<(), ScheduleBuildError> {
        self.process_configs(systems.into_configs(), false)?;
        Ok(())
    }

    /// Register or configure sets.
    pub fn configure_sets(
        &mut self,
        sets: impl IntoNodeConfigs<InternedSystemSet>,
    ) -> Result<(), ScheduleBuildError> {
        self.process_configs(sets.into_configs(), false)?;
        Ok(())
    }

    /// Exempt every system pair across `a` and `b` from ambiguity checks. Missing sets are
    /// created.
    pub fn ignore_ambiguity(&mut self, a: InternedSystemSet, b: InternedSystemSet) {
        let a = self.set_id_or_insert(a);
        let b = self.set_id_or_insert(b);
        self.ambiguous_with.add_edge(a, b);
        self.changed = true;
    }

    /// Register a pass, replacing one of the same kind in place.
    ///
    /// Every dependency declared so far is replayed to the new pass.
    pub fn add_build_pass(&mut self, pass: impl Into<BuildPass>) {
        let mut pass = pass.into();
        for (from, to) in self.dependency.graph.all_edges() {
            let options = self
                .edge_options
                .get(&(from, to))
                .map_or(&[][..], Vec::as_slice);
            pass.as_pass_mut().add_dependency(from, to, options);
        }

        let kind = pass.kind();
        match self.passes.iter_mut().find(|existing| existing.kind() == kind) {
            Some(existing) => *existing = pass,
            None => self.passes.push(pass),
        }
        self.changed = true;
    }

    /// Unregister a pass.
    pub fn remove_build_pass(&mut self, kind: BuildPassKind) -> Option<BuildPass> {
        let position = self.passes.iter().position(|pass| pass.kind() == kind)?;
        self.changed = true;
        Some(self.passes.remove(position))
    }

    /// Whether a pass of this kind is registered.
    pub fn has_build_pass(&self, kind: BuildPassKind) -> bool {
        self.passes.iter().any(|pass| pass.kind() == kind)
    }

    fn set_id_or_insert(&mut self, set: InternedSystemSet) -> NodeId {
        match self.system_set_ids.get(&set) {
            Some(&id) => id,
            None => self.add_set(set),
        }
    }

    fn add_set(&mut self, set: InternedSystemSet) -> NodeId {
        let id = NodeId::Set(self.system_sets.len());
        self.system_sets.push(SystemSetNode::new(set));
        self.system_set_conditions.push(Vec::new());
        self.system_set_ids.insert(set, id);
        self.hierarchy.graph.add_node(id);
        self.dependency.graph.add_node(id);
        self.changed = true;
        id
    }

    fn create_anonymous_set(&mut self) -> AnonymousSet {
        let id = self.anonymous_sets;
        self.anonymous_sets += 1;
        AnonymousSet::new(id)
    }

    /// Append an auto-inserted sync point. It belongs to no set and is exempt from ambiguity
    /// checks.
    pub(crate) fn add_auto_sync(&mut self, system: BoxedSystem) -> NodeId {
        let id = NodeId::System(self.systems.len());
        self.systems.push(SystemNode::new(system));
        self.system_conditions.push(Vec::new());
        self.ambiguous_with_all.insert(id);
        id
    }

    fn process_configs<T: ProcessNodeConfig>(
        &mut self,
        configs: NodeConfigs<T>,
        collect_nodes: bool,
    ) -> Result<ProcessConfigsResult, ScheduleBuildError> {
        let (mut configs, collective_conditions, chained) = match configs {
            NodeConfigs::NodeConfig(config) => {
                let id = T::process_config(self, config)?;
                return Ok(ProcessConfigsResult {
                    nodes: if collect_nodes { vec![id] } else { Vec::new() },
                    densely_chained: true,
                });
            }
            NodeConfigs::Configs {
                configs,
                collective_conditions,
                chained,
            } => (configs, collective_conditions, chained),
        };

        self.apply_collective_conditions(&mut configs, collective_conditions)?;

        let chain_options = match chained {
            Chain::Chained(options) => Some(options),
            Chain::Unchained => None,
        };
        let is_chained = chain_options.is_some();
        let mut densely_chained = is_chained || configs.len() == 1;
        let mut nodes = Vec::new();

        let mut configs = configs.into_iter();
        let Some(first) = configs.next() else {
            return Ok(ProcessConfigsResult {
                nodes,
                densely_chained,
            });
        };
        let mut previous = self.process_configs(first, collect_nodes || is_chained)?;
        densely_chained &= previous.densely_chained;

        for config in configs {
            let current = self.process_configs(config, collect_nodes || is_chained)?;
            densely_chained &= current.densely_chained;

            if let Some(options) = &chain_options {
                let current_nodes = if current.densely_chained {
                    &current.nodes[..current.nodes.len().min(1)]
                } else {
                    &current.nodes[..]
                };
                let previous_nodes = if previous.densely_chained {
                    &previous.nodes[previous.nodes.len().saturating_sub(1)..]
                } else {
                    &previous.nodes[..]
                };
                for &from in previous_nodes {
                    for &to in current_nodes {
                        self.add_dependency_edge(from, to, options);
                    }
                }
            }

            if collect_nodes {
                nodes.append(&mut previous.nodes);
            }
            previous = current;
        }
        if collect_nodes {
            nodes.append(&mut previous.nodes);
        }

        Ok(ProcessConfigsResult {
            nodes,
            densely_chained,
        })
    }

    /// Attach collective conditions: directly to a lone config, otherwise through a new
    /// anonymous set holding every config.
    fn apply_collective_conditions<T: ProcessNodeConfig>(
        &mut self,
        configs: &mut [NodeConfigs<T>],
        collective_conditions: Vec<BoxedCondition>,
    ) -> Result<(), ScheduleBuildError> {
        if collective_conditions.is_empty() {
            return Ok(());
        }
        if let [config] = configs {
            for condition in collective_conditions {
                config.run_if_dyn(condition);
            }
            return Ok(());
        }

        let set = self.create_anonymous_set().intern();
        for config in configs.iter_mut() {
            config.in_set_inner(set);
        }
        self.configure_set_inner(NodeConfig {
            node: set,
            graph_info: GraphInfo::default(),
            conditions: collective_conditions,
        })?;
        Ok(())
    }

    fn add_system_inner(
        &mut self,
        config: NodeConfig<BoxedSystem>,
    ) -> Result<NodeId, ScheduleBuildError> {
        let NodeConfig {
            node: system,
            graph_info,
            conditions,
        } = config;

        let default_sets = system.default_system_sets();
        if let Some(set) = graph_info
            .hierarchy
            .iter()
            .find(|set| set.system_type().is_some() && !default_sets.contains(*set))
        {
            return Err(ScheduleBuildError::SystemTypeSetMisuse(format!(
                "system `{}` cannot be added to `{set:?}`: a system type set only contains systems of its own type",
                system.name()
            )));
        }

        let id = NodeId::System(self.systems.len());
        self.systems.push(SystemNode::new(system));
        self.system_conditions.push(conditions);
        self.uninit.push((id, 0));
        self.update_graphs(id, graph_info)?;
        Ok(id)
    }

    fn configure_set_inner(
        &mut self,
        config: NodeConfig<InternedSystemSet>,
    ) -> Result<NodeId, ScheduleBuildError> {
        let NodeConfig {
            node: set,
            graph_info,
            mut conditions,
        } = config;

        if set.system_type().is_some() {
            return Err(ScheduleBuildError::SystemTypeSetMisuse(format!(
                "`{set:?}` is a system type set and cannot be configured"
            )));
        }
        if let Some(parent) = graph_info
            .hierarchy
            .iter()
            .find(|parent| parent.system_type().is_some())
        {
            return Err(ScheduleBuildError::SystemTypeSetMisuse(format!(
                "set `{set:?}` cannot be nested in `{parent:?}`: a system type set only contains systems of its own type"
            )));
        }

        let id = self.set_id_or_insert(set);
        self.update_graphs(id, graph_info)?;

        let set_conditions = &mut self.system_set_conditions[id.index()];
        self.uninit.push((id, set_conditions.len()));
        set_conditions.append(&mut conditions);
        Ok(id)
    }

    /// Add a declared ordering edge and tell every pass about it.
    fn add_dependency_edge(&mut self, from: NodeId, to: NodeId, options: &[DependencyOption]) {
        self.dependency.graph.add_edge(from, to);
        if !options.is_empty() {
            self.edge_options
                .entry((from, to))
                .or_default()
                .extend_from_slice(options);
        }
        for pass in &mut self.passes {
            pass.as_pass_mut().add_dependency(from, to, options);
        }
    }

    /// Record the metadata of a newly registered or reconfigured node.
    ///
    /// Referenced sets are created first. Self-loops are rejected before any edge is added.
    fn update_graphs(&mut self, id: NodeId, graph_info: GraphInfo) -> Result<(), ScheduleBuildError> {
        let GraphInfo {
            hierarchy,
            dependencies,
            ambiguous_with,
        } = graph_info;

        let parents = hierarchy
            .into_iter()
            .map(|set| self.set_id_or_insert(set))
            .collect::<Vec<_>>();
        if parents.contains(&id) {
            return Err(ScheduleBuildError::HierarchyLoop(self.get_node_name(&id)));
        }

        let dependencies = dependencies
            .into_iter()
            .map(|Dependency { kind, set, options }| (kind, self.set_id_or_insert(set), options))
            .collect::<Vec<_>>();
        if dependencies.iter().any(|&(_, set, _)| set == id) {
            return Err(ScheduleBuildError::DependencyLoop(self.get_node_name(&id)));
        }

        let ignore_all = matches!(ambiguous_with, Ambiguity::IgnoreAll);
        let ambiguous_with = match ambiguous_with {
            Ambiguity::IgnoreWithSet(sets) => sets
                .into_iter()
                .map(|set| self.set_id_or_insert(set))
                .collect::<Vec<_>>(),
            Ambiguity::Check | Ambiguity::IgnoreAll => Vec::new(),
        };

        self.changed = true;
        self.hierarchy.graph.add_node(id);
        self.dependency.graph.add_node(id);

        for parent in parents {
            self.hierarchy.graph.add_edge(parent, id);
        }

        for (kind, set, options) in dependencies {
            let (from, to) = match kind {
                DependencyKind::Before => (id, set),
                DependencyKind::After => (set, id),
            };
            self.add_dependency_edge(from, to, &options);
        }

        if ignore_all {
            self.ambiguous_with_all.insert(id);
        }
        for set in ambiguous_with {
            self.ambiguous_with.add_edge(id, set);
        }
        Ok(())
    }

    /// Initialize nodes added since the last call.
    pub fn initialize(&mut self, world: &mut World) {
        for (id, first_new_condition) in self.uninit.drain(..) {
            match id {
                NodeId::System(index) => {
                    if let Some(system) = self.systems.get_mut(index).and_then(SystemNode::get_mut)
                    {
                        system.initialize(world);
                    }
                    for condition in self.system_conditions.get_mut(index).into_iter().flatten() {
                        condition.initialize(world);
                    }
                }
                NodeId::Set(index) => {
                    for condition in self
                        .system_set_conditions
                        .get_mut(index)
                        .into_iter()
                        .flatten()
                        .skip(first_new_condition)
                    {
                        condition.initialize(world);
                    }
                }
            }
        }
    }

    /// Rebuild `schedule`, moving its systems and conditions back into the graph first and
    /// into the new plan afterwards.
    ///
    /// On failure the systems stay in the graph and `schedule` is left empty.
    pub fn update_schedule(
        &mut self,
        world: &mut World,
        schedule: &mut SystemSchedule,
        ignored_ambiguities: &BTreeSet<ComponentId>,
        schedule_label: InternedScheduleLabel,
    ) -> Result<(), ScheduleBuildError> {
        if !self.uninit.is_empty() {
            return Err(ScheduleBuildError::Uninitialized);
        }

        for ((id, system), conditions) in schedule
            .system_ids
            .drain(..)
            .zip(schedule.systems.drain(..))
            .zip(schedule.system_conditions.drain(..))
        {
            if let Some(node) = self.systems.get_mut(id.index()) {
                node.inner = Some(system);
            }
            if let Some(slot) = self.system_conditions.get_mut(id.index()) {
                *slot = conditions;
            }
        }
        for (id, mut conditions) in schedule
            .set_ids
            .drain(..)
            .zip(schedule.set_conditions.drain(..))
        {
            // Conditions configured since the last build come after the existing ones.
            if let Some(slot) = self.system_set_conditions.get_mut(id.index()) {
                conditions.append(slot);
                *slot = conditions;
            }
        }

        *schedule = self.build_schedule(world, schedule_label, ignored_ambiguities)?;

        for &id in &schedule.system_ids {
            let system = self
                .systems
                .get_mut(id.index())
                .and_then(|node| node.inner.take())
                .ok_or(ScheduleBuildError::Uninitialized)?;
            let conditions = self
                .system_conditions
                .get_mut(id.index())
                .map(mem::take)
                .unwrap_or_default();
            schedule.systems.push(system);
            schedule.system_conditions.push(conditions);
        }
        for &id in &schedule.set_ids {
            let conditions = self
                .system_set_conditions
                .get_mut(id.index())
                .map(mem::take)
                .unwrap_or_default();
            schedule.set_conditions.push(conditions);
        }
        Ok(())
    }

    /// Compile the graph into a plan without moving any system into it.
    ///
    /// Every system must be initialized and held by the graph.
    pub fn build_schedule(
        &mut self,
        world: &mut World,
        schedule_label: InternedScheduleLabel,
        ignored_ambiguities: &BTreeSet<ComponentId>,
    ) -> Result<SystemSchedule, ScheduleBuildError> {
        if !self.uninit.is_empty() || self.systems.iter().any(|node| node.inner.is_none()) {
            return Err(ScheduleBuildError::Uninitialized);
        }
        self.warnings.clear();

        let mut ctx = BuildContext::default();
        self.check_hierarchy(&mut ctx, schedule_label)?;
        self.check_dependencies(&mut ctx)?;
        self.map_sets_to_systems(&mut ctx);
        self.check_order_but_intersect(&ctx)?;
        self.check_system_type_set_ambiguity(&ctx)?;
        self.flatten_dependencies(&mut ctx);
        self.run_build_passes(world, &mut ctx)?;
        self.sort_flattened(&mut ctx)?;
        self.flatten_ambiguities(&mut ctx);
        self.check_conflicts(&ctx, world.components(), ignored_ambiguities, schedule_label)?;
        let schedule = self.assemble(ctx);

        // Auto-inserted sync points are the only systems outside the hierarchy.
        let sync_points = schedule
            .system_ids
            .iter()
            .filter(|id| !self.hierarchy.graph.contains_node(**id))
            .count();
        debug!(
            "built schedule {schedule_label:?}: {} systems, {sync_points} auto-inserted sync points",
            schedule.system_ids.len()
        );
        Ok(schedule)
    }

    /// Steps 1 and 2.
    fn check_hierarchy(
        &mut self,
        ctx: &mut BuildContext,
        schedule_label: InternedScheduleLabel,
    ) -> Result<(), ScheduleBuildError> {
        self.hierarchy.topsort = self.topsort_graph(&self.hierarchy.graph, ReportCycles::Hierarchy)?;
        ctx.hierarchy = check_graph(&self.hierarchy.graph, &self.hierarchy.topsort);
        self.optionally_check_hierarchy_conflicts(&ctx.hierarchy.transitive_edges, schedule_label)?;
        // Reachability is unchanged, so the topsort stays valid.
        self.hierarchy.graph = ctx.hierarchy.transitive_reduction.clone();
        Ok(())
    }

    fn optionally_check_hierarchy_conflicts(
        &mut self,
        transitive_edges: &[(NodeId, NodeId)],
        schedule_label: InternedScheduleLabel,
    ) -> Result<(), ScheduleBuildError> {
        if transitive_edges.is_empty() {
            return Ok(());
        }
        match self.settings.hierarchy_detection {
            LogLevel::Ignore => Ok(()),
            LogLevel::Warn => {
                warn!(
                    "schedule {schedule_label:?} has redundant edges:\n{}",
                    self.get_hierarchy_conflicts_error_message(transitive_edges)
                );
                self.warnings
                    .push(ScheduleBuildWarning::HierarchyRedundancy(transitive_edges.to_vec()));
                Ok(())
            }
            LogLevel::Error => Err(ScheduleBuildError::HierarchyRedundancy(
                self.get_hierarchy_conflicts_error_message(transitive_edges),
            )),
        }
    }

    /// Steps 3 and 4.
    fn check_dependencies(&mut self, ctx: &mut BuildContext) -> Result<(), ScheduleBuildError> {
        self.dependency.topsort =
            self.topsort_graph(&self.dependency.graph, ReportCycles::Dependency)?;
        ctx.dependency = check_graph(&self.dependency.graph, &self.dependency.topsort);

        let hierarchy_connected = ctx
            .hierarchy
            .connected
            .iter()
            .copied()
            .collect::<HashSet<_>>();
        for &(a, b) in &ctx.dependency.connected {
            if hierarchy_connected.contains(&(a, b)) || hierarchy_connected.contains(&(b, a)) {
                return Err(ScheduleBuildError::CrossDependency(
                    self.get_node_name(&a),
                    self.get_node_name(&b),
                ));
            }
        }
        Ok(())
    }

    /// Step 5. Bottom-up over the reduced hierarchy, so each child set is complete before its
    /// parents read it.
    fn map_sets_to_systems(&self, ctx: &mut BuildContext) {
        let reduction = &ctx.hierarchy.transitive_reduction;
        for &id in self.hierarchy.topsort.iter().rev() {
            if id.is_system() {
                continue;
            }

            let mut systems = Vec::new();
            let mut bitset = FixedBitSet::with_capacity(self.systems.len());
            for child in reduction.neighbors_directed(id, Direction::Outgoing) {
                match child {
                    NodeId::System(index) => {
                        if !bitset.put(index) {
                            systems.push(child);
                        }
                    }
                    NodeId::Set(_) => {
                        for &system in ctx.set_systems.get(&child).into_iter().flatten() {
                            if !bitset.put(system.index()) {
                                systems.push(system);
                            }
                        }
                    }
                }
            }
            ctx.set_systems.insert(id, systems);
            ctx.set_system_bitsets.insert(id, bitset);
        }
    }

    /// Step 6.
    fn check_order_but_intersect(&self, ctx: &BuildContext) -> Result<(), ScheduleBuildError> {
        for &(a, b) in &ctx.dependency.connected {
            if !(a.is_set() && b.is_set()) {
                continue;
            }
            let (Some(a_systems), Some(b_systems)) =
                (ctx.set_system_bitsets.get(&a), ctx.set_system_bitsets.get(&b))
            else {
                continue;
            };
            if !a_systems.is_disjoint(b_systems) {
                return Err(ScheduleBuildError::SetsHaveOrderButIntersect(
                    self.get_node_name(&a),
                    self.get_node_name(&b),
                ));
            }
        }
        Ok(())
    }

    /// Step 7.
    fn check_system_type_set_ambiguity(&self, ctx: &BuildContext) -> Result<(), ScheduleBuildError> {
        for (&id, systems) in &ctx.set_systems {
            if !self.system_sets[id.index()].is_system_type() || systems.len() < 2 {
                continue;
            }
            let relations = self.dependency.graph.neighbors_directed(id, Direction::Incoming).count()
                + self.dependency.graph.neighbors_directed(id, Direction::Outgoing).count()
                + self.ambiguous_with.neighbors(id).count();
            if relations > 0 {
                return Err(ScheduleBuildError::SystemTypeSetAmbiguity(self.get_node_name(&id)));
            }
        }
        Ok(())
    }

    /// Step 8. Sets are replaced one at a time so edges between sets resolve transitively.
    fn flatten_dependencies(&mut self, ctx: &mut BuildContext) {
        let mut flattened = self.dependency.graph.clone();
        let mut edges = Vec::new();
        for (&set, systems) in &ctx.set_systems {
            for pass in &mut self.passes {
                pass.as_pass_mut()
                    .collapse_set(set, systems, &flattened, &mut edges);
            }

            if systems.is_empty() {
                for a in flattened.neighbors_directed(set, Direction::Incoming) {
                    for b in flattened.neighbors_directed(set, Direction::Outgoing) {
                        edges.push((a, b));
                    }
                }
            } else {
                for a in flattened.neighbors_directed(set, Direction::Incoming) {
                    edges.extend(systems.iter().map(|&system| (a, system)));
                }
                for b in flattened.neighbors_directed(set, Direction::Outgoing) {
                    edges.extend(systems.iter().map(|&system| (system, b)));
                }
            }

            flattened.remove_node(set);
            for (a, b) in edges.drain(..) {
                flattened.add_edge(a, b);
            }
        }
        ctx.dependency_flattened.graph = flattened;
    }

    /// Step 9. Passes are taken out for the duration so they can mutate the graph; they are put
    /// back even when one fails.
    fn run_build_passes(
        &mut self,
        world: &mut World,
        ctx: &mut BuildContext,
    ) -> Result<(), ScheduleBuildError> {
        let mut passes = mem::take(&mut self.passes);
        let result = passes.iter_mut().try_for_each(|pass| {
            pass.as_pass_mut()
                .build(world, self, &mut ctx.dependency_flattened.graph)
        });
        self.passes = passes;
        result
    }

    /// Step 10.
    fn sort_flattened(&self, ctx: &mut BuildContext) -> Result<(), ScheduleBuildError> {
        let flattened = &mut ctx.dependency_flattened;
        flattened.topsort = self.topsort_graph(&flattened.graph, ReportCycles::Dependency)?;
        let results = check_graph(&flattened.graph, &flattened.topsort);
        flattened.graph = results.transitive_reduction;
        ctx.flat_disconnected = results.disconnected;
        Ok(())
    }

    /// Step 11.
    fn flatten_ambiguities(&self, ctx: &mut BuildContext) {
        let members = |id: NodeId| -> Vec<NodeId> {
            match id {
                NodeId::System(_) => vec![id],
                NodeId::Set(_) => ctx.set_systems.get(&id).cloned().unwrap_or_default(),
            }
        };

        let mut flattened = UnGraph::default();
        for (lhs, rhs) in self.ambiguous_with.all_edges() {
            let rhs_members = members(rhs);
            for a in members(lhs) {
                for &b in &rhs_members {
                    flattened.add_edge(a, b);
                }
            }
        }

        let ignore_all = self
            .ambiguous_with_all
            .iter()
            .flat_map(|&id| members(id))
            .collect::<HashSet<_>>();

        ctx.ambiguous_with_flattened = flattened;
        ctx.ambiguous_with_all_flattened = ignore_all;
    }

    /// Step 12. Conflicts are kept even when they fail the build, for inspection.
    fn check_conflicts(
        &mut self,
        ctx: &BuildContext,
        components: &Registry,
        ignored_ambiguities: &BTreeSet<ComponentId>,
        schedule_label: InternedScheduleLabel,
    ) -> Result<(), ScheduleBuildError> {
        let mut conflicting_systems = Vec::new();
        for &(a, b) in &ctx.flat_disconnected {
            if !(a.is_system() && b.is_system())
                || ctx.ambiguous_with_flattened.contains_edge(a, b)
                || ctx.ambiguous_with_all_flattened.contains(&a)
                || ctx.ambiguous_with_all_flattened.contains(&b)
            {
                continue;
            }
            let (Some(system_a), Some(system_b)) = (self.get_system_at(a), self.get_system_at(b))
            else {
                continue;
            };

            if system_a.is_exclusive() || system_b.is_exclusive() {
                conflicting_systems.push((a, b, Vec::new()));
                continue;
            }

            let access_a = system_a.component_access_set();
            let access_b = system_b.component_access_set();
            if access_a.is_compatible(access_b) {
                continue;
            }
            match access_a.get_conflicts(access_b) {
                AccessConflicts::Individual(conflicts) => {
                    let conflicts = conflicts
                        .ones()
                        .map(ComponentId::get_sparse_set_index)
                        .filter(|id| !ignored_ambiguities.contains(id))
                        .collect::<Vec<_>>();
                    if !conflicts.is_empty() {
                        conflicting_systems.push((a, b, conflicts));
                    }
                }
                AccessConflicts::All => conflicting_systems.push((a, b, Vec::new())),
            }
        }
        self.conflicting_systems = conflicting_systems;

        if self.conflicting_systems.is_empty() {
            return Ok(());
        }
        match self.settings.ambiguity_detection {
            LogLevel::Ignore => Ok(()),
            LogLevel::Warn => {
                warn!(
                    "schedule {schedule_label:?} has ambiguities.\n{}",
                    self.get_conflicts_error_message(&self.conflicting_systems, components)
                );
                self.warnings
                    .push(ScheduleBuildWarning::Ambiguity(self.conflicting_systems.clone()));
                Ok(())
            }
            LogLevel::Error => Err(ScheduleBuildError::Ambiguity(
                self.get_conflicts_error_message(&self.conflicting_systems, components),
            )),
        }
    }

    /// Step 13.
    fn assemble(&self, ctx: BuildContext) -> SystemSchedule {
        let BuildContext {
            hierarchy,
            dependency_flattened,
            ..
        } = ctx;
        let reachable = hierarchy.reachable;
        let hierarchy_order = &self.hierarchy.topsort;
        let hierarchy_node_count = hierarchy_order.len();

        let system_ids = dependency_flattened.topsort;
        let system_count = system_ids.len();
        let system_index = system_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect::<HashMap<_, _>>();

        // (hierarchy position, plan index) of every planned system.
        let hierarchy_systems = hierarchy_order
            .iter()
            .enumerate()
            .filter_map(|(col, id)| Some((col, *system_index.get(id)?)))
            .collect::<Vec<_>>();

        // Outer sets come first in hierarchy order, so bit order is evaluation order.
        let (set_rows, set_ids): (Vec<_>, Vec<_>) = hierarchy_order
            .iter()
            .enumerate()
            .filter(|(_, id)| !self.set_conditions_at(**id).is_empty())
            .map(|(row, &id)| (row, id))
            .unzip();
        let set_count = set_ids.len();

        let mut system_dependencies = Vec::with_capacity(system_count);
        let mut system_dependents = Vec::with_capacity(system_count);
        for &id in &system_ids {
            let graph = &dependency_flattened.graph;
            system_dependencies.push(graph.neighbors_directed(id, Direction::Incoming).count());
            system_dependents.push(
                graph
                    .neighbors_directed(id, Direction::Outgoing)
                    .filter_map(|dependent| system_index.get(&dependent).copied())
                    .collect::<Vec<_>>(),
            );
        }

        let mut systems_in_sets_with_conditions =
            vec![FixedBitSet::with_capacity(system_count); set_count];
        let mut sets_with_conditions_of_systems =
            vec![FixedBitSet::with_capacity(set_count); system_count];
        for (set_index, &row) in set_rows.iter().enumerate() {
            for &(col, system) in &hierarchy_systems {
                if row < col && reachable[index(row, col, hierarchy_node_count)] {
                    systems_in_sets_with_conditions[set_index].insert(system);
                    sets_with_conditions_of_systems[system].insert(set_index);
                }
            }
        }

        SystemSchedule {
            systems: Vec::with_capacity(system_count),
            system_conditions: Vec::with_capacity(system_count),
            set_conditions: Vec::with_capacity(set_count),
            system_ids,
            set_ids,
            system_dependencies,
            system_dependents,
            sets_with_conditions_of_systems,
            systems_in_sets_with_conditions,
        }
    }

    /// Topological order of `graph`, or the error describing why there is none.
    pub(crate) fn topsort_graph(
        &self,
        graph: &DiGraph,
        report: ReportCycles,
    ) -> Result<Vec<NodeId>, ScheduleBuildError> {
        // A self-loop is its own one-node component, so it has to be looked for separately.
        if let Some((node, _)) = graph.all_edges().find(|(a, b)| a == b) {
            let name = self.get_node_name(&node);
            return Err(match report {
                ReportCycles::Hierarchy => ScheduleBuildError::HierarchyLoop(name),
                ReportCycles::Dependency => ScheduleBuildError::DependencyLoop(name),
            });
        }

        let mut sorted = Vec::with_capacity(graph.node_count());
        let mut sccs_with_cycles = Vec::new();
        for scc in graph.iter_sccs() {
            sorted.extend_from_slice(&scc);
            if scc.len() > 1 {
                sccs_with_cycles.push(scc);
            }
        }

        if sccs_with_cycles.is_empty() {
            // Components come out in reverse topological order.
            sorted.reverse();
            return Ok(sorted);
        }

        let cycles = sccs_with_cycles
            .iter()
            .flat_map(|scc| simple_cycles_in_component(graph, scc))
            .collect::<Vec<_>>();
        Err(match report {
            ReportCycles::Hierarchy => {
                ScheduleBuildError::HierarchyCycle(self.get_hierarchy_cycles_error_message(&cycles))
            }
            ReportCycles::Dependency => ScheduleBuildError::DependencyCycle(
                self.get_dependency_cycles_error_message(&cycles),
            ),
        })
    }

    /// Display name of a node, per the current settings.
    pub fn get_node_name(&self, id: &NodeId) -> String {
        self.get_node_name_inner(id, self.settings.report_sets)
    }

    fn get_node_name_inner(&self, id: &NodeId, report_sets: bool) -> String {
        let name = match *id {
            NodeId::System(index) => {
                let name = self
                    .systems
                    .get(index)
                    .map_or_else(|| format!("{id:?}"), |node| node.name().to_owned());
                if report_sets {
                    let sets = self.names_of_sets_containing_node(id);
                    match sets.len() {
                        0 => name,
                        1 => format!("{name} (in set {})", sets[0]),
                        _ => format!("{name} (in sets {})", sets.join(", ")),
                    }
                } else {
                    name
                }
            }
            NodeId::Set(index) => match self.system_sets.get(index) {
                Some(set) if set.is_anonymous() => self.anonymous_set_name(id),
                Some(set) => set.name(),
                None => format!("{id:?}"),
            },
        };
        if self.settings.use_shortnames {
            short_name(&name)
        } else {
            name
        }
    }

    fn anonymous_set_name(&self, id: &NodeId) -> String {
        let members = self
            .hierarchy
            .graph
            .neighbors_directed(*id, Direction::Outgoing)
            .map(|member| self.get_node_name_inner(&member, false))
            .collect::<Vec<_>>();
        format!("({})", members.join(", "))
    }

    /// Names of every non-type set above `id`, sorted.
    fn names_of_sets_containing_node(&self, id: &NodeId) -> Vec<String> {
        let mut found = HashSet::new();
        let mut stack = vec![*id];
        while let Some(node) = stack.pop() {
            for parent in self.hierarchy.graph.neighbors_directed(node, Direction::Incoming) {
                let is_type_set = self
                    .system_sets
                    .get(parent.index())
                    .is_some_and(SystemSetNode::is_system_type);
                if !is_type_set && found.insert(parent) {
                    stack.push(parent);
                }
            }
        }
        let mut names = found
            .into_iter()
            .map(|set| self.get_node_name(&set))
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    fn get_node_kind(id: &NodeId) -> &'static str {
        id.kind()
    }

    fn get_hierarchy_conflicts_error_message(&self, transitive_edges: &[(NodeId, NodeId)]) -> String {
        let mut message = String::from("hierarchy contains redundant edge(s)");
        for (parent, child) in transitive_edges {
            message.push_str(&format!(
                "\n -- {} `{}` cannot be child of set `{}`, longer path exists",
                Self::get_node_kind(child),
                self.get_node_name(child),
                self.get_node_name(parent),
            ));
        }
        message
    }

    fn get_hierarchy_cycles_error_message(&self, cycles: &[Vec<NodeId>]) -> String {
        let mut message = format!("schedule has {} in_set cycle(s):\n", cycles.len());
        for (i, cycle) in cycles.iter().enumerate() {
            let names = cycle.iter().map(|id| self.get_node_name(id)).collect::<Vec<_>>();
            let Some(first) = names.first() else {
                continue;
            };
            message.push_str(&format!("cycle {}: set `{first}` contains itself\n", i + 1));
            message.push_str(&format!("set `{first}`\n"));
            for name in names.iter().skip(1).chain([first]) {
                message.push_str(&format!(" ... which contains set `{name}`\n"));
            }
            message.push('\n');
        }
        message
    }

    fn get_dependency_cycles_error_message(&self, cycles: &[Vec<NodeId>]) -> String {
        let mut message = format!("schedule has {} before/after cycle(s):\n", cycles.len());
        for (i, cycle) in cycles.iter().enumerate() {
            let nodes = cycle
                .iter()
                .map(|id| (Self::get_node_kind(id), self.get_node_name(id)))
                .collect::<Vec<_>>();
            let Some((first_kind, first_name)) = nodes.first() else {
                continue;
            };
            message.push_str(&format!(
                "cycle {}: {first_kind} `{first_name}` must run before itself\n",
                i + 1
            ));
            message.push_str(&format!("{first_kind} `{first_name}`\n"));
            for (kind, name) in nodes.iter().skip(1).chain([&(*first_kind, first_name.clone())]) {
                message.push_str(&format!(" ... which must run before {kind} `{name}`\n"));
            }
            message.push('\n');
        }
        message
    }

    /// Render conflicting pairs as `(name, name, component names)`.
    pub fn conflicts_to_string<'a>(
        &'a self,
        ambiguities: &'a [(NodeId, NodeId, Vec<ComponentId>)],
        components: &'a Registry,
    ) -> impl Iterator<Item = (String, String, Vec<String>)> + 'a {
        ambiguities.iter().map(move |(a, b, conflicts)| {
            let conflicts = conflicts
                .iter()
                .map(|id| {
                    components
                        .get_name(*id)
                        .map_or_else(|| id.to_string(), short_name)
                })
                .collect();
            (self.get_node_name(a), self.get_node_name(b), conflicts)
        })
    }

    fn get_conflicts_error_message(
        &self,
        ambiguities: &[(NodeId, NodeId, Vec<ComponentId>)],
        components: &Registry,
    ) -> String {
        let mut message = format!(
            "{} pairs of systems with conflicting data access have indeterminate execution order. \
             Consider adding `before`, `after`, or `ambiguous_with` relationships between these:\n",
            ambiguities.len()
        );
        for (name_a, name_b, conflicts) in self.conflicts_to_string(ambiguities, components) {
            message.push_str(&format!(" -- {name_a} and {name_b}\n"));
            if conflicts.is_empty() {
                message.push_str("    conflict on: World\n");
            } else {
                message.push_str(&format!("    conflict on: {conflicts:?}\n"));
            }
        }
        message
    }
}
