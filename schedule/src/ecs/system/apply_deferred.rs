use std::{any::TypeId, borrow::Cow};

use crate::ecs::{
    access::FilteredAccessSet,
    component::ComponentId,
    system::{System, SystemParamValidationError},
    world::{Tick, UnsafeWorldCell, World},
};

static NO_ACCESS: FilteredAccessSet<ComponentId> = FilteredAccessSet::new();

/// A sync point.
///
/// Running it does nothing. Executors recognize it with [`is_apply_deferred`] and apply the
/// buffered commands of every system that ran before it instead.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyDeferred;

/// Whether `system` is an [`ApplyDeferred`] sync point.
#[inline]
pub fn is_apply_deferred(system: &dyn System<Out = ()>) -> bool {
    system.system_type_id() == TypeId::of::<ApplyDeferred>()
}

impl System for ApplyDeferred {
    type Out = ();

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("ApplyDeferred")
    }

    #[inline]
    fn system_type_id(&self) -> TypeId {
        TypeId::of::<ApplyDeferred>()
    }

    fn component_access_set(&self) -> &FilteredAccessSet<ComponentId> {
        &NO_ACCESS
    }

    #[inline]
    fn is_send(&self) -> bool {
        false
    }

    #[inline]
    fn is_exclusive(&self) -> bool {
        true
    }

    #[inline]
    fn has_deferred(&self) -> bool {
        false
    }

    unsafe fn run_unsafe(&mut self, _world: UnsafeWorldCell) {}

    fn run(&mut self, _world: &mut World) {}

    fn apply_deferred(&mut self, _world: &mut World) {}

    fn queue_deferred(&mut self, _world: &World) {}

    unsafe fn validate_param_unsafe(
        &mut self,
        _world: UnsafeWorldCell,
    ) -> Result<(), SystemParamValidationError> {
        Ok(())
    }

    fn initialize(&mut self, _world: &mut World) {}

    fn update_archetype_component_access(&mut self, _world: UnsafeWorldCell) {}

    fn check_change_tick(&mut self, _change_tick: Tick) {}

    fn get_last_run(&self) -> Tick {
        Tick::MAX
    }

    fn set_last_run(&mut self, _last_run: Tick) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::system::FunctionSystem;

    #[test]
    fn sync_points_are_recognized_by_type() {
        // Given
        let sync: Box<dyn System<Out = ()>> = Box::new(ApplyDeferred);
        let other: Box<dyn System<Out = ()>> =
            Box::new(FunctionSystem::parallel("noop", |_: &World| {}));

        // Then
        assert!(is_apply_deferred(sync.as_ref()));
        assert!(!is_apply_deferred(other.as_ref()));
        assert!(sync.is_exclusive());
        assert!(!sync.component_access().has_any_read());
    }
}
