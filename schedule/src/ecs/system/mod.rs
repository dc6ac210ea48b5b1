//! The boundary between the scheduler and user logic.
//!
//! # Overview
//!
//! The scheduler treats a system as an opaque unit of work with a static read/write footprint.
//! Everything it needs is captured by the [`System`] trait:
//!
//! - identity: [`name`](System::name) and [`system_type_id`](System::system_type_id)
//! - footprint: [`component_access_set`](System::component_access_set)
//! - execution traits: [`is_exclusive`](System::is_exclusive), [`has_deferred`](System::has_deferred)
//! - lifecycle: initialize, validate, run, apply deferred mutations
//!
//! # System kinds
//!
//! [`FunctionSystem`] wraps a closure in one of three run modes:
//!
//! ```text
//!  mode        closure                                   exclusive   deferred
//!  ─────────   ───────────────────────────────────────   ─────────   ────────
//!  parallel    FnMut(&World) -> Out                      no          no
//!  deferred    FnMut(&World, &mut Commands) -> Out       no          yes
//!  exclusive   FnMut(&mut World) -> Out                  yes         no
//! ```
//!
//! Non-exclusive systems declare what they touch (`reads::<C>()`, `writes_resource::<R>()`, ...).
//! The declarations drive ambiguity detection; they are not enforced at run time.
//!
//! ```rust,ignore
//! use rusty_schedule::ecs::system::FunctionSystem;
//!
//! let gravity = FunctionSystem::parallel("gravity", |world: &World| {
//!     let _g = world.resource::<Gravity>();
//! })
//! .reads_resource::<Gravity>()
//! .writes::<Velocity>();
//! ```
//!
//! [`ApplyDeferred`] is the sync point: an exclusive no-op whose presence makes the executor apply
//! the deferred mutations of every system that ran before it.
//!
//! # Conditions
//!
//! A run condition is a system returning `bool`. It uses the same trait, so conditions get
//! initialization, validation and change ticks for free.

mod apply_deferred;
mod function;

use std::{any::TypeId, borrow::Cow};

use log::warn;
use thiserror::Error;

pub use apply_deferred::{ApplyDeferred, is_apply_deferred};
pub use function::FunctionSystem;

pub use crate::ecs::world::Commands;
use crate::ecs::{
    access::{Access, FilteredAccessSet},
    component::ComponentId,
    schedule::InternedSystemSet,
    world::{Tick, UnsafeWorldCell, World},
};

/// A unit of work the scheduler can order, gate and run.
pub trait System: Send + Sync + 'static {
    /// What the system returns. `()` for systems, `bool` for conditions.
    type Out;

    /// Human-readable name, used in diagnostics.
    fn name(&self) -> Cow<'static, str>;

    /// Identity of the system's type. Systems sharing it belong to the same
    /// [`SystemTypeSet`](crate::ecs::schedule::SystemTypeSet).
    fn system_type_id(&self) -> TypeId;

    /// Union of the system's declared access.
    #[inline]
    fn component_access(&self) -> &Access<ComponentId> {
        self.component_access_set().combined_access()
    }

    /// The system's declared access, per parameter.
    fn component_access_set(&self) -> &FilteredAccessSet<ComponentId>;

    /// Whether the system may run off the thread that owns the world.
    fn is_send(&self) -> bool;

    /// Whether the system needs `&mut World`.
    fn is_exclusive(&self) -> bool;

    /// Whether the system buffers mutations that must be applied later.
    fn has_deferred(&self) -> bool;

    /// Run the system through a shared world view.
    ///
    /// # Safety
    /// - The caller must ensure nothing else accesses what the system's access set declares for
    ///   the duration of the call.
    /// - If [`is_exclusive`](Self::is_exclusive), the cell must grant exclusive access to the
    ///   whole world.
    /// - [`update_archetype_component_access`](Self::update_archetype_component_access) must have
    ///   been called with the same world.
    unsafe fn run_unsafe(&mut self, world: UnsafeWorldCell) -> Self::Out;

    /// Run the system and apply its deferred mutations.
    fn run(&mut self, world: &mut World) -> Self::Out {
        let out = self.run_without_applying_deferred(world);
        self.apply_deferred(world);
        out
    }

    /// Run the system, leaving deferred mutations buffered.
    fn run_without_applying_deferred(&mut self, world: &mut World) -> Self::Out {
        let world = world.as_unsafe_world_cell();
        self.update_archetype_component_access(world);
        // SAFETY: the cell was created from `&mut World` and the archetype access was refreshed.
        unsafe { self.run_unsafe(world) }
    }

    /// Apply buffered mutations to the world.
    fn apply_deferred(&mut self, world: &mut World);

    /// Move buffered mutations into the world's command queue.
    fn queue_deferred(&mut self, world: &World);

    /// Check that the system can run against the world in its current state.
    ///
    /// # Safety
    /// Same contract as [`run_unsafe`](Self::run_unsafe), restricted to read access.
    unsafe fn validate_param_unsafe(
        &mut self,
        world: UnsafeWorldCell,
    ) -> Result<(), SystemParamValidationError>;

    /// Safe version of [`validate_param_unsafe`](Self::validate_param_unsafe).
    fn validate_param(&mut self, world: &World) -> Result<(), SystemParamValidationError> {
        let world = world.as_unsafe_world_cell_readonly();
        self.update_archetype_component_access(world);
        // SAFETY: shared access to the world is held for the duration of the call.
        unsafe { self.validate_param_unsafe(world) }
    }

    /// Resolve declared access against a world. Called once before the first run.
    fn initialize(&mut self, world: &mut World);

    /// Refresh access that depends on the world's current shape.
    fn update_archetype_component_access(&mut self, world: UnsafeWorldCell);

    /// Clamp the last-run tick if it is too old.
    fn check_change_tick(&mut self, change_tick: Tick);

    /// Sets this system belongs to without being told.
    fn default_system_sets(&self) -> Vec<InternedSystemSet> {
        Vec::new()
    }

    /// Tick of the last run.
    fn get_last_run(&self) -> Tick;

    /// Overwrite the tick of the last run.
    fn set_last_run(&mut self, last_run: Tick);
}

/// A type-erased system.
pub type BoxedSystem<Out = ()> = Box<dyn System<Out = Out>>;

/// A type-erased run condition.
pub type BoxedCondition = Box<dyn System<Out = bool>>;

/// Why a system cannot run right now.
///
/// Returned from [`System::validate_param`]. The executor treats it like a false run condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parameter validation failed: {message}")]
pub struct SystemParamValidationError {
    /// Whether skipping is expected, in which case nothing is logged.
    pub skipped: bool,
    /// What is wrong.
    pub message: Cow<'static, str>,
}

impl SystemParamValidationError {
    /// Skip silently.
    pub fn skipped(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            skipped: true,
            message: message.into(),
        }
    }

    /// Skip and warn.
    pub fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            skipped: false,
            message: message.into(),
        }
    }
}

/// Clamp a system's last-run tick, warning if it had to be clamped.
pub fn check_system_change_tick(last_run: &mut Tick, this_run: Tick, system_name: &str) {
    if last_run.check_tick(this_run) {
        let age = this_run.relative_to(*last_run).get();
        warn!(
            "System '{system_name}' has not run for {age} ticks. \
             Changes older than {} ticks will not be detected.",
            Tick::MAX.get() - 1,
        );
    }
}
