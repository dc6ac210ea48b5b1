//! Declarative system scheduling.
//!
//! Systems are added to a [`Schedule`] together with declarations about them: which sets they
//! belong to, what they must run before or after, which conditions gate them. The schedule
//! compiles these declarations into an ordered plan and hands it to an executor.
//!
//! # Architecture
//!
//! ```text
//! add_systems / configure_sets
//!          │
//!          ▼
//!   ScheduleGraph ── hierarchy (in_set), dependency (before/after), ambiguous_with
//!          │
//!          │ build: cycle checks, set flattening, build passes, conflict detection
//!          ▼
//!   SystemSchedule ── systems in topological order + condition gating tables
//!          │
//!          ▼
//!   SystemExecutor ── evaluates conditions, runs systems, applies deferred mutations
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! #[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
//! struct Update;
//!
//! #[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
//! enum Physics {
//!     Integrate,
//!     Collide,
//! }
//!
//! let mut schedule = Schedule::new(Update);
//! schedule
//!     .configure_sets((Physics::Integrate, Physics::Collide).chain())?
//!     .add_systems(apply_velocity.in_set(Physics::Integrate))?
//!     .add_systems(resolve_contacts.in_set(Physics::Collide).run_if(resource_exists::<Contacts>()))?;
//!
//! schedule.run(&mut world)?;
//! ```
//!
//! # Sets
//!
//! A system belongs to every set it is added to with `in_set`, to the implicit
//! [`SystemTypeSet`] of its type, and to every set above those. Ordering or gating a set
//! applies to all of its systems. Sets never appear in the compiled plan; they are flattened
//! into edges between systems.
//!
//! # Deferred mutations
//!
//! Systems may buffer world mutations. These are applied at [`ApplyDeferred`] sync points,
//! which the [`AutoInsertApplyDeferredPass`] inserts automatically wherever a system with
//! buffered mutations is ordered before another system.
//!
//! [`ApplyDeferred`]: crate::ecs::system::ApplyDeferred

mod auto_insert_apply_deferred;
mod builder;
pub mod condition;
mod config;
mod error;
mod executor;
mod intern;
mod label;
mod pass;
mod schedules;
mod set;
mod settings;

pub use auto_insert_apply_deferred::AutoInsertApplyDeferredPass;
pub use builder::{Dag, ScheduleGraph, SystemNode, SystemSetNode};
pub use condition::{
    IntoCondition, NotCondition, not, resource_equals, resource_exists, resource_exists_and_equals,
    run_once,
};
pub use config::{
    Ambiguity, Chain, Dependency, DependencyKind, DependencyOption, GraphInfo, IntoNodeConfigs,
    NodeConfig, NodeConfigs, SystemConfigs, SystemSetConfigs,
};
pub use error::{ScheduleBuildError, ScheduleBuildWarning, ScheduleNotInitialized};
pub use executor::{ExecutorKind, SingleThreadedExecutor, SystemExecutor, SystemSchedule};
pub use intern::{Internable, Interned, Interner};
pub use label::{DynEq, DynHash, InternedScheduleLabel, ScheduleLabel};
pub use pass::{BuildPass, BuildPassKind, ScheduleBuildPass};
pub use schedules::{Schedule, Schedules, TryRunScheduleError};
pub use set::{AnonymousSet, InternedSystemSet, SystemSet, SystemTypeSet};
pub use settings::{LogLevel, ScheduleBuildSettings};

pub use crate::ecs::graph::NodeId;
