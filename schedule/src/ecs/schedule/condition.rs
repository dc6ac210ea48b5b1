//! Run conditions.
//!
//! A condition is a read-only system returning `bool`. Attach one with
//! [`run_if`](crate::ecs::schedule::IntoNodeConfigs::run_if):
//!
//! ```rust,ignore
//! schedule.add_systems(
//!     FunctionSystem::parallel("spawn_wave", spawn_wave)
//!         .run_if(resource_exists::<Wave>())
//!         .run_if(not(resource_equals(Paused(true)))),
//! )?;
//! ```
//!
//! Closures `FnMut(&World) -> bool` are conditions too.

use std::{
    any::{TypeId, type_name},
    borrow::Cow,
};

use crate::ecs::{
    access::FilteredAccessSet,
    component::{ComponentId, Resource},
    system::{BoxedCondition, FunctionSystem, System, SystemParamValidationError},
    util::short_name,
    world::{Tick, UnsafeWorldCell, World},
};

/// Types convertible into a [`BoxedCondition`].
pub trait IntoCondition<Marker>: Sized {
    /// Box the condition.
    fn into_condition(self) -> BoxedCondition;
}

impl IntoCondition<()> for BoxedCondition {
    fn into_condition(self) -> BoxedCondition {
        self
    }
}

impl IntoCondition<()> for FunctionSystem<bool> {
    fn into_condition(self) -> BoxedCondition {
        Box::new(self)
    }
}

impl IntoCondition<()> for NotCondition {
    fn into_condition(self) -> BoxedCondition {
        Box::new(self)
    }
}

#[doc(hidden)]
pub struct ClosureMarker;

impl<F> IntoCondition<ClosureMarker> for F
where
    F: FnMut(&World) -> bool + Send + Sync + 'static,
{
    fn into_condition(self) -> BoxedCondition {
        Box::new(FunctionSystem::parallel(short_name(type_name::<F>()), self))
    }
}

/// True while resource `R` exists.
pub fn resource_exists<R: Resource>() -> FunctionSystem<bool> {
    FunctionSystem::parallel(
        format!("resource_exists<{}>", short_name(type_name::<R>())),
        |world: &World| world.contains_resource::<R>(),
    )
}

/// True while resource `R` equals `value`.
///
/// Declares a read of `R`, so the gated system is skipped with a warning while `R` is missing.
pub fn resource_equals<R: Resource + PartialEq>(value: R) -> FunctionSystem<bool> {
    FunctionSystem::parallel(
        format!("resource_equals<{}>", short_name(type_name::<R>())),
        move |world: &World| world.resource::<R>().is_some_and(|current| *current == value),
    )
    .reads_resource::<R>()
}

/// True while resource `R` exists and equals `value`.
pub fn resource_exists_and_equals<R: Resource + PartialEq>(value: R) -> FunctionSystem<bool> {
    FunctionSystem::parallel(
        format!("resource_exists_and_equals<{}>", short_name(type_name::<R>())),
        move |world: &World| world.resource::<R>().is_some_and(|current| *current == value),
    )
}

/// True the first time it is evaluated, false afterwards.
pub fn run_once() -> FunctionSystem<bool> {
    let mut has_run = false;
    FunctionSystem::parallel("run_once", move |_: &World| {
        if has_run {
            false
        } else {
            has_run = true;
            true
        }
    })
}

/// Invert a condition.
pub fn not<Marker>(condition: impl IntoCondition<Marker>) -> NotCondition {
    let condition = condition.into_condition();
    NotCondition {
        name: Cow::Owned(format!("!{}", condition.name())),
        condition,
    }
}

/// A condition that returns the opposite of the one it wraps. Created by [`not`].
pub struct NotCondition {
    name: Cow<'static, str>,
    condition: BoxedCondition,
}

impl System for NotCondition {
    type Out = bool;

    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn system_type_id(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    fn component_access_set(&self) -> &FilteredAccessSet<ComponentId> {
        self.condition.component_access_set()
    }

    fn is_send(&self) -> bool {
        self.condition.is_send()
    }

    fn is_exclusive(&self) -> bool {
        self.condition.is_exclusive()
    }

    fn has_deferred(&self) -> bool {
        self.condition.has_deferred()
    }

    unsafe fn run_unsafe(&mut self, world: UnsafeWorldCell) -> bool {
        // SAFETY: forwarded from the caller.
        !unsafe { self.condition.run_unsafe(world) }
    }

    fn run(&mut self, world: &mut World) -> bool {
        !self.condition.run(world)
    }

    fn apply_deferred(&mut self, world: &mut World) {
        self.condition.apply_deferred(world);
    }

    fn queue_deferred(&mut self, world: &World) {
        self.condition.queue_deferred(world);
    }

    unsafe fn validate_param_unsafe(
        &mut self,
        world: UnsafeWorldCell,
    ) -> Result<(), SystemParamValidationError> {
        // SAFETY: forwarded from the caller.
        unsafe { self.condition.validate_param_unsafe(world) }
    }

    fn initialize(&mut self, world: &mut World) {
        self.condition.initialize(world);
    }

    fn update_archetype_component_access(&mut self, world: UnsafeWorldCell) {
        self.condition.update_archetype_component_access(world);
    }

    fn check_change_tick(&mut self, change_tick: Tick) {
        self.condition.check_change_tick(change_tick);
    }

    fn get_last_run(&self) -> Tick {
        self.condition.get_last_run()
    }

    fn set_last_run(&mut self, last_run: Tick) {
        self.condition.set_last_run(last_run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::world::WorldId;

    #[derive(Resource, Debug, PartialEq)]
    struct Paused(bool);

    fn evaluate(condition: &mut BoxedCondition, world: &mut World) -> bool {
        condition.initialize(world);
        condition.validate_param(world).is_ok() && condition.run(world)
    }

    #[test]
    fn resource_conditions() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let mut exists = resource_exists::<Paused>().into_condition();
        let mut equals = resource_equals(Paused(true)).into_condition();
        let mut exists_and_equals = resource_exists_and_equals(Paused(true)).into_condition();

        // Then, while missing
        assert!(!evaluate(&mut exists, &mut world));
        assert!(!evaluate(&mut equals, &mut world));
        assert!(equals.validate_param(&world).is_err());
        assert!(!evaluate(&mut exists_and_equals, &mut world));

        // Then, once present
        world.insert_resource(Paused(true));
        assert!(evaluate(&mut exists, &mut world));
        assert!(evaluate(&mut equals, &mut world));
        assert!(evaluate(&mut exists_and_equals, &mut world));

        world.insert_resource(Paused(false));
        assert!(!evaluate(&mut equals, &mut world));
    }

    #[test]
    fn run_once_fires_once() {
        let mut world = World::new(WorldId::new(1));
        let mut condition = run_once().into_condition();

        assert!(evaluate(&mut condition, &mut world));
        assert!(!evaluate(&mut condition, &mut world));
        assert!(!evaluate(&mut condition, &mut world));
    }

    #[test]
    fn not_inverts_and_keeps_access() {
        // Given
        let mut world = World::new(WorldId::new(1));
        world.insert_resource(Paused(true));
        let mut condition = not(resource_equals(Paused(true))).into_condition();

        // When
        let result = evaluate(&mut condition, &mut world);

        // Then
        assert!(!result);
        assert_eq!(condition.name(), "!resource_equals<Paused>");
        let paused = world.components().resource_id::<Paused>();
        assert!(paused.is_some_and(|id| condition.component_access().has_resource_read(id)));
    }

    #[test]
    fn closures_are_conditions() {
        let mut world = World::new(WorldId::new(1));
        let mut condition = (|world: &World| !world.contains_resource::<Paused>()).into_condition();

        assert!(evaluate(&mut condition, &mut world));
        assert!(!condition.is_exclusive());
    }
}
