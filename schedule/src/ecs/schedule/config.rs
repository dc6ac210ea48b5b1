//! Builder types describing how nodes are added to a schedule.
//!
//! Anything that can be added (a system, a set, or a tuple of them) converts into
//! [`NodeConfigs`] through [`IntoNodeConfigs`], and the builder methods on that trait record
//! hierarchy, ordering, conditions and ambiguity exemptions:
//!
//! ```rust,ignore
//! schedule.add_systems(
//!     (integrate, collide)
//!         .chain()
//!         .in_set(Physics)
//!         .run_if(resource_exists::<Running>()),
//! )?;
//! ```
//!
//! Nothing is validated here; the [`ScheduleGraph`](crate::ecs::schedule::ScheduleGraph) checks
//! the recorded metadata when the configs are added and when the schedule is built.

use crate::ecs::{
    schedule::{
        condition::IntoCondition,
        set::{InternedSystemSet, SystemSet},
    },
    system::{ApplyDeferred, BoxedCondition, BoxedSystem, FunctionSystem},
    util::all_tuples,
};

/// Whether a dependency runs before or after its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// The node runs before the target.
    Before,
    /// The node runs after the target.
    After,
}

/// Extra information attached to an ordering edge and read by build passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyOption {
    /// Do not insert a sync point on this edge. The caller flushes deferred mutations itself.
    IgnoreDeferred,
}

/// A requested ordering constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Before or after.
    pub kind: DependencyKind,
    /// The set ordered against.
    pub set: InternedSystemSet,
    /// Options consumed by build passes.
    pub options: Vec<DependencyOption>,
}

impl Dependency {
    /// A dependency with no options.
    pub fn new(kind: DependencyKind, set: InternedSystemSet) -> Self {
        Self {
            kind,
            set,
            options: Vec::new(),
        }
    }

    /// Attach an option.
    pub fn add_option(mut self, option: DependencyOption) -> Self {
        self.options.push(option);
        self
    }
}

/// Which unordered pairs involving a node are exempt from ambiguity detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Ambiguity {
    /// Check every pair.
    #[default]
    Check,
    /// Ignore pairs with members of these sets.
    IgnoreWithSet(Vec<InternedSystemSet>),
    /// Ignore every pair.
    IgnoreAll,
}

/// Graph metadata recorded for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphInfo {
    /// Sets the node belongs to.
    pub hierarchy: Vec<InternedSystemSet>,
    /// Ordering constraints.
    pub dependencies: Vec<Dependency>,
    /// Ambiguity exemptions.
    pub ambiguous_with: Ambiguity,
}

/// Whether a group of configs runs in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Chain {
    /// No implicit ordering.
    #[default]
    Unchained,
    /// Each entry runs before the next; the options are attached to every generated edge.
    Chained(Vec<DependencyOption>),
}

/// A single node and its metadata.
pub struct NodeConfig<T> {
    pub(crate) node: T,
    pub(crate) graph_info: GraphInfo,
    pub(crate) conditions: Vec<BoxedCondition>,
}

impl<T> NodeConfig<T> {
    /// The node being configured.
    pub fn node(&self) -> &T {
        &self.node
    }

    /// The recorded metadata.
    pub fn graph_info(&self) -> &GraphInfo {
        &self.graph_info
    }
}

/// One node config or a group of them.
pub enum NodeConfigs<T> {
    /// A single node.
    NodeConfig(NodeConfig<T>),
    /// A group, possibly chained, possibly sharing conditions.
    Configs {
        /// The members.
        configs: Vec<NodeConfigs<T>>,
        /// Conditions that gate the group as a whole.
        collective_conditions: Vec<BoxedCondition>,
        /// Whether members run in order.
        chained: Chain,
    },
}

/// Configs of systems.
pub type SystemConfigs = NodeConfigs<BoxedSystem>;

/// Configs of system sets.
pub type SystemSetConfigs = NodeConfigs<InternedSystemSet>;

impl NodeConfigs<BoxedSystem> {
    /// Config for a single system, placed in the system's default sets.
    pub fn new_system(system: BoxedSystem) -> Self {
        let hierarchy = system.default_system_sets();
        Self::NodeConfig(NodeConfig {
            node: system,
            graph_info: GraphInfo {
                hierarchy,
                ..GraphInfo::default()
            },
            conditions: Vec::new(),
        })
    }
}

impl NodeConfigs<InternedSystemSet> {
    /// Config for a single set.
    pub fn new_set(set: InternedSystemSet) -> Self {
        Self::NodeConfig(NodeConfig {
            node: set,
            graph_info: GraphInfo::default(),
            conditions: Vec::new(),
        })
    }
}

impl<T> NodeConfigs<T> {
    fn for_each_node(&mut self, f: &mut impl FnMut(&mut NodeConfig<T>)) {
        match self {
            Self::NodeConfig(config) => f(config),
            Self::Configs { configs, .. } => {
                for config in configs {
                    config.for_each_node(f);
                }
            }
        }
    }

    pub(crate) fn in_set_inner(&mut self, set: InternedSystemSet) {
        self.for_each_node(&mut |config| config.graph_info.hierarchy.push(set));
    }

    fn dependency_inner(&mut self, dependency: Dependency) {
        self.for_each_node(&mut |config| {
            config.graph_info.dependencies.push(dependency.clone());
        });
    }

    fn ambiguous_with_inner(&mut self, set: InternedSystemSet) {
        self.for_each_node(&mut |config| {
            let ambiguous_with = &mut config.graph_info.ambiguous_with;
            match ambiguous_with {
                Ambiguity::Check => *ambiguous_with = Ambiguity::IgnoreWithSet(vec![set]),
                Ambiguity::IgnoreWithSet(sets) => sets.push(set),
                Ambiguity::IgnoreAll => {}
            }
        });
    }

    fn ambiguous_with_all_inner(&mut self) {
        self.for_each_node(&mut |config| config.graph_info.ambiguous_with = Ambiguity::IgnoreAll);
    }

    /// Attach a condition. On a group it gates the group as a whole.
    pub(crate) fn run_if_dyn(&mut self, condition: BoxedCondition) {
        match self {
            Self::NodeConfig(config) => config.conditions.push(condition),
            Self::Configs {
                collective_conditions,
                ..
            } => collective_conditions.push(condition),
        }
    }

    fn chain_inner(&mut self, options: Vec<DependencyOption>) {
        if let Self::Configs { chained, .. } = self {
            *chained = Chain::Chained(options);
        }
    }
}

/// Types that can be added to a schedule as nodes of kind `T`.
///
/// `T` is [`BoxedSystem`] for systems and [`InternedSystemSet`] for sets. Tuples of up to 26
/// elements convert into a group.
pub trait IntoNodeConfigs<T>: Sized {
    /// Convert into configs.
    fn into_configs(self) -> NodeConfigs<T>;

    /// Add to `set`.
    fn in_set(self, set: impl SystemSet) -> NodeConfigs<T> {
        self.into_configs().in_set(set)
    }

    /// Run before every member of `set`.
    fn before(self, set: impl SystemSet) -> NodeConfigs<T> {
        self.into_configs().before(set)
    }

    /// Run after every member of `set`.
    fn after(self, set: impl SystemSet) -> NodeConfigs<T> {
        self.into_configs().after(set)
    }

    /// Run before `set` without an automatic sync point in between.
    fn before_ignore_deferred(self, set: impl SystemSet) -> NodeConfigs<T> {
        self.into_configs().before_ignore_deferred(set)
    }

    /// Run after `set` without an automatic sync point in between.
    fn after_ignore_deferred(self, set: impl SystemSet) -> NodeConfigs<T> {
        self.into_configs().after_ignore_deferred(set)
    }

    /// Run only if `condition` is true. On a group, the condition is evaluated once for the
    /// group.
    fn run_if<Marker>(self, condition: impl IntoCondition<Marker>) -> NodeConfigs<T> {
        self.into_configs().run_if(condition)
    }

    /// Do not report ambiguities with members of `set`.
    fn ambiguous_with(self, set: impl SystemSet) -> NodeConfigs<T> {
        self.into_configs().ambiguous_with(set)
    }

    /// Do not report any ambiguity.
    fn ambiguous_with_all(self) -> NodeConfigs<T> {
        self.into_configs().ambiguous_with_all()
    }

    /// Run the members of a group in order.
    fn chain(self) -> NodeConfigs<T> {
        self.into_configs().chain()
    }

    /// Run the members of a group in order, without automatic sync points between them.
    fn chain_ignore_deferred(self) -> NodeConfigs<T> {
        self.into_configs().chain_ignore_deferred()
    }
}

impl<T> IntoNodeConfigs<T> for NodeConfigs<T> {
    fn into_configs(self) -> Self {
        self
    }

    fn in_set(mut self, set: impl SystemSet) -> Self {
        self.in_set_inner(set.intern());
        self
    }

    fn before(mut self, set: impl SystemSet) -> Self {
        self.dependency_inner(Dependency::new(DependencyKind::Before, set.intern()));
        self
    }

    fn after(mut self, set: impl SystemSet) -> Self {
        self.dependency_inner(Dependency::new(DependencyKind::After, set.intern()));
        self
    }

    fn before_ignore_deferred(mut self, set: impl SystemSet) -> Self {
        self.dependency_inner(
            Dependency::new(DependencyKind::Before, set.intern())
                .add_option(DependencyOption::IgnoreDeferred),
        );
        self
    }

    fn after_ignore_deferred(mut self, set: impl SystemSet) -> Self {
        self.dependency_inner(
            Dependency::new(DependencyKind::After, set.intern())
                .add_option(DependencyOption::IgnoreDeferred),
        );
        self
    }

    fn run_if<Marker>(mut self, condition: impl IntoCondition<Marker>) -> Self {
        self.run_if_dyn(condition.into_condition());
        self
    }

    fn ambiguous_with(mut self, set: impl SystemSet) -> Self {
        self.ambiguous_with_inner(set.intern());
        self
    }

    fn ambiguous_with_all(mut self) -> Self {
        self.ambiguous_with_all_inner();
        self
    }

    fn chain(mut self) -> Self {
        self.chain_inner(Vec::new());
        self
    }

    fn chain_ignore_deferred(mut self) -> Self {
        self.chain_inner(vec![DependencyOption::IgnoreDeferred]);
        self
    }
}

impl IntoNodeConfigs<BoxedSystem> for BoxedSystem {
    fn into_configs(self) -> SystemConfigs {
        NodeConfigs::new_system(self)
    }
}

impl IntoNodeConfigs<BoxedSystem> for FunctionSystem<()> {
    fn into_configs(self) -> SystemConfigs {
        NodeConfigs::new_system(Box::new(self))
    }
}

impl IntoNodeConfigs<BoxedSystem> for ApplyDeferred {
    fn into_configs(self) -> SystemConfigs {
        NodeConfigs::new_system(Box::new(self))
    }
}

impl<S: SystemSet> IntoNodeConfigs<InternedSystemSet> for S {
    fn into_configs(self) -> SystemSetConfigs {
        NodeConfigs::new_set(self.intern())
    }
}

macro_rules! impl_node_configs_for_tuple {
    ($($name:ident),*) => {
        impl<Kind, $($name: IntoNodeConfigs<Kind>),*> IntoNodeConfigs<Kind> for ($($name,)*) {
            #[allow(non_snake_case)]
            fn into_configs(self) -> NodeConfigs<Kind> {
                let ($($name,)*) = self;
                NodeConfigs::Configs {
                    configs: vec![$($name.into_configs(),)*],
                    collective_conditions: Vec::new(),
                    chained: Chain::Unchained,
                }
            }
        }
    };
}

all_tuples!(impl_node_configs_for_tuple);
