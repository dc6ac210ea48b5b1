//! Build passes: extension points of the schedule build pipeline.
//!
//! A pass observes every ordering edge as it is declared, contributes to set flattening, and
//! finally gets to rewrite the flattened dependency graph before the plan is assembled. The
//! pipeline owns an ordered list of [`BuildPass`] values; adding a pass of a kind that is already
//! registered replaces it in place, so registration order stays stable.

use std::fmt::Debug;

use crate::ecs::{
    graph::{DiGraph, NodeId},
    schedule::{
        AutoInsertApplyDeferredPass, ScheduleBuildError, ScheduleGraph, config::DependencyOption,
    },
    world::World,
};

/// A step of the build pipeline that may rewrite the flattened dependency graph.
pub trait ScheduleBuildPass: Send + Sync + Debug + 'static {
    /// Called for every declared ordering edge `from → to`, with the options it was declared
    /// with.
    fn add_dependency(&mut self, from: NodeId, to: NodeId, options: &[DependencyOption]);

    /// Called while `set` is replaced by direct edges to and from its member `systems`.
    ///
    /// Edges pushed to `dependencies_to_add` are added to the flattened graph together with the
    /// ones flattening produces.
    fn collapse_set(
        &mut self,
        set: NodeId,
        systems: &[NodeId],
        dependency_flattened: &DiGraph,
        dependencies_to_add: &mut Vec<(NodeId, NodeId)>,
    );

    /// Rewrite the flattened dependency graph.
    fn build(
        &mut self,
        world: &mut World,
        graph: &mut ScheduleGraph,
        dependency_flattened: &mut DiGraph,
    ) -> Result<(), ScheduleBuildError>;
}

/// Identity of a registered pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildPassKind {
    /// [`AutoInsertApplyDeferredPass`].
    AutoInsertApplyDeferred,
}

/// A registered pass.
#[derive(Debug)]
pub enum BuildPass {
    /// Inserts sync points between deferred systems and the systems ordered after them.
    AutoInsertApplyDeferred(AutoInsertApplyDeferredPass),
}

impl BuildPass {
    /// Which pass this is.
    pub fn kind(&self) -> BuildPassKind {
        match self {
            BuildPass::AutoInsertApplyDeferred(_) => BuildPassKind::AutoInsertApplyDeferred,
        }
    }

    pub(crate) fn as_pass_mut(&mut self) -> &mut dyn ScheduleBuildPass {
        match self {
            BuildPass::AutoInsertApplyDeferred(pass) => pass,
        }
    }
}

impl From<AutoInsertApplyDeferredPass> for BuildPass {
    fn from(pass: AutoInsertApplyDeferredPass) -> Self {
        BuildPass::AutoInsertApplyDeferred(pass)
    }
}
