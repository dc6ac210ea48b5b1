//! Executors run a compiled [`SystemSchedule`] against a world.
//!
//! The plan stores systems in topological order, so an executor that walks it front to back
//! respects every ordering constraint. The plan also carries what a concurrent executor would
//! need to find runnable systems (dependency counts and dependents); the single-threaded
//! executor ignores those.

mod single_threaded;

use fixedbitset::FixedBitSet;

pub use single_threaded::SingleThreadedExecutor;

use crate::ecs::{
    graph::NodeId,
    system::{BoxedCondition, BoxedSystem},
    world::World,
};

/// Runs a [`SystemSchedule`].
pub trait SystemExecutor: Send + Sync {
    /// Which executor this is.
    fn kind(&self) -> ExecutorKind;

    /// Size internal state for `schedule`. Called after every rebuild.
    fn init(&mut self, schedule: &SystemSchedule);

    /// Run every system once, skipping those set in `skip_systems`.
    fn run(
        &mut self,
        schedule: &mut SystemSchedule,
        world: &mut World,
        skip_systems: Option<&FixedBitSet>,
    );

    /// Whether deferred mutations still pending at the end of a run are applied.
    fn set_apply_final_deferred(&mut self, apply_final_deferred: bool);

    /// Apply the deferred mutations of systems that ran since the last sync point.
    fn apply_deferred(&mut self, schedule: &mut SystemSchedule, world: &mut World);
}

/// Available executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutorKind {
    /// Run systems one after another on the calling thread.
    #[default]
    SingleThreaded,
}

/// Create an executor of the given kind.
pub(crate) fn make_executor(kind: ExecutorKind) -> Box<dyn SystemExecutor> {
    match kind {
        ExecutorKind::SingleThreaded => Box::new(SingleThreadedExecutor::new()),
    }
}

/// A compiled, executor-ready schedule.
///
/// Indices into `systems` are positions in the topological order. Sets only appear here when
/// they have conditions.
#[derive(Default)]
pub struct SystemSchedule {
    /// Systems in topological order.
    pub(crate) systems: Vec<BoxedSystem>,
    /// Conditions of each system.
    pub(crate) system_conditions: Vec<Vec<BoxedCondition>>,
    /// Conditions of each condition-bearing set, in hierarchy order.
    pub(crate) set_conditions: Vec<Vec<BoxedCondition>>,
    /// Graph id of each system.
    pub(crate) system_ids: Vec<NodeId>,
    /// Graph id of each condition-bearing set.
    pub(crate) set_ids: Vec<NodeId>,
    /// Number of direct predecessors of each system.
    pub(crate) system_dependencies: Vec<usize>,
    /// Direct successors of each system, as system indices.
    pub(crate) system_dependents: Vec<Vec<usize>>,
    /// For each system, the condition-bearing sets that gate it.
    pub(crate) sets_with_conditions_of_systems: Vec<FixedBitSet>,
    /// For each condition-bearing set, the systems it gates.
    pub(crate) systems_in_sets_with_conditions: Vec<FixedBitSet>,
}

impl SystemSchedule {
    /// An empty plan.
    pub const fn new() -> Self {
        Self {
            systems: Vec::new(),
            system_conditions: Vec::new(),
            set_conditions: Vec::new(),
            system_ids: Vec::new(),
            set_ids: Vec::new(),
            system_dependencies: Vec::new(),
            system_dependents: Vec::new(),
            sets_with_conditions_of_systems: Vec::new(),
            systems_in_sets_with_conditions: Vec::new(),
        }
    }

    /// Graph ids of the systems, in run order.
    #[inline]
    pub fn system_ids(&self) -> &[NodeId] {
        &self.system_ids
    }

    /// Graph ids of the condition-bearing sets.
    #[inline]
    pub fn set_ids(&self) -> &[NodeId] {
        &self.set_ids
    }

    /// Number of direct predecessors of each system.
    #[inline]
    pub fn system_dependencies(&self) -> &[usize] {
        &self.system_dependencies
    }

    /// Direct successors of each system.
    #[inline]
    pub fn system_dependents(&self) -> &[Vec<usize>] {
        &self.system_dependents
    }

    /// For each system, the condition-bearing sets that gate it.
    #[inline]
    pub fn sets_with_conditions_of_systems(&self) -> &[FixedBitSet] {
        &self.sets_with_conditions_of_systems
    }

    /// For each condition-bearing set, the systems it gates.
    #[inline]
    pub fn systems_in_sets_with_conditions(&self) -> &[FixedBitSet] {
        &self.systems_in_sets_with_conditions
    }

    /// Number of systems.
    #[inline]
    pub fn len(&self) -> usize {
        self.system_ids.len()
    }

    /// Whether the plan has no systems.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.system_ids.is_empty()
    }
}
