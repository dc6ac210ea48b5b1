use thiserror::Error;

use crate::ecs::{component::ComponentId, graph::NodeId, world::WorldId};

/// Why a schedule could not be built or run.
///
/// Every variant carries text rendered from node names, ready to show to a user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleBuildError {
    /// A set was declared to contain itself.
    #[error("system set `{0}` contains itself")]
    HierarchyLoop(String),

    /// The containment graph has a cycle.
    #[error("system set hierarchy contains cycle(s).\n{0}")]
    HierarchyCycle(String),

    /// A node is a direct child of a set and also reachable from it through another set.
    #[error("system set hierarchy contains redundant edges.\n{0}")]
    HierarchyRedundancy(String),

    /// A node was ordered relative to itself.
    #[error("system or system set `{0}` has been told to run before itself")]
    DependencyLoop(String),

    /// The ordering graph has a cycle.
    #[error("system dependencies contain cycle(s).\n{0}")]
    DependencyCycle(String),

    /// Two nodes are related both by containment and by ordering.
    #[error("`{0}` and `{1}` have both `in_set` and `before`-`after` relationships (these might be transitive). This combination is unsolvable as a system cannot run before or after a set it belongs to.")]
    CrossDependency(String, String),

    /// Two ordered sets share a system.
    #[error("`{0}` and `{1}` have a `before`-`after` relationship (which may be transitive) but share systems.")]
    SetsHaveOrderButIntersect(String, String),

    /// A system type set with several members was used for ordering.
    #[error("tried to order against `{0}` in a schedule that has more than one `{0}` instance. `{0}` is a `SystemTypeSet` and cannot be used for ordering if ambiguous. Use a different set without this restriction.")]
    SystemTypeSetAmbiguity(String),

    /// Systems with conflicting access have no relative order.
    #[error("systems with conflicting access have indeterminate run order.\n{0}")]
    Ambiguity(String),

    /// Nodes were added but the schedule was not initialized before building.
    #[error("systems in schedule have not been initialized")]
    Uninitialized,

    /// A system type set was configured directly or used as a parent.
    #[error("{0}")]
    SystemTypeSetMisuse(String),

    /// A schedule initialized for one world was run against another.
    #[error("schedule was initialized for world {expected:?} but run against world {found:?}")]
    WorldMismatch {
        /// The world the schedule was initialized with.
        expected: WorldId,
        /// The world passed in.
        found: WorldId,
    },
}

/// A diagnostic that did not stop the build.
///
/// Collected when the corresponding [`LogLevel`](crate::ecs::schedule::LogLevel) is `Warn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleBuildWarning {
    /// Redundant containment edges, as `(parent, child)` pairs.
    HierarchyRedundancy(Vec<(NodeId, NodeId)>),

    /// Conflicting unordered systems and the ids they conflict on. An empty list means the
    /// systems conflict on everything.
    Ambiguity(Vec<(NodeId, NodeId, Vec<ComponentId>)>),
}

/// A schedule was used before it was initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("executable schedule has not been built")]
pub struct ScheduleNotInitialized;
