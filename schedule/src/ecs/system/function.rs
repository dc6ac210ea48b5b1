//! Closure-backed systems.
//!
//! [`FunctionSystem`] is the everyday [`System`]: a named closure plus a declared footprint. The
//! footprint is declared with builder calls and resolved to [`ComponentId`]s when the system is
//! initialized against a world:
//!
//! ```rust,ignore
//! let movement = FunctionSystem::parallel("movement", |_world: &World| {})
//!     .reads::<Velocity>()
//!     .writes::<Position>();
//!
//! let spawn = FunctionSystem::deferred("spawn", |_world: &World, commands: &mut Commands| {
//!     commands.insert_resource(Spawned(true));
//! });
//!
//! let reset = FunctionSystem::exclusive("reset", |world: &mut World| {
//!     world.remove_resource::<Spawned>();
//! });
//! ```
//!
//! Declared resources are also checked for presence before every run; a missing resource makes
//! the system fail validation, which the executor treats as "skip this run".

use std::{
    any::{TypeId, type_name},
    borrow::Cow,
};

use crate::ecs::{
    access::FilteredAccessSet,
    component::{Component, ComponentId, Resource},
    schedule::{InternedSystemSet, SystemSet, SystemTypeSet},
    system::{System, SystemParamValidationError, check_system_change_tick},
    world::{CommandQueue, Commands, Tick, UnsafeWorldCell, World, WorldId},
};

/// How a function system receives the world.
enum RunMode<Out> {
    /// Shared world access.
    Parallel(Box<dyn FnMut(&World) -> Out + Send + Sync>),

    /// Shared world access plus a command buffer applied at the next sync point.
    Deferred(Box<dyn FnMut(&World, &mut Commands) -> Out + Send + Sync>),

    /// Exclusive world access.
    Exclusive(Box<dyn FnMut(&mut World) -> Out + Send + Sync>),
}

/// Read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessMode {
    Read,
    Write,
}

/// An access declared by type, resolved to an id on initialization.
#[derive(Clone, Copy)]
struct DeclaredAccess {
    mode: AccessMode,
    is_resource: bool,
    name: &'static str,
    resolve: fn(&World) -> ComponentId,
}

type Validator = Box<dyn FnMut(&World) -> Result<(), SystemParamValidationError> + Send + Sync>;

/// A system backed by a closure.
pub struct FunctionSystem<Out: 'static = ()> {
    name: Cow<'static, str>,
    type_id: TypeId,
    type_name: &'static str,
    run_mode: RunMode<Out>,
    declared: Vec<DeclaredAccess>,
    access_set: FilteredAccessSet<ComponentId>,
    required_resources: Vec<(ComponentId, &'static str)>,
    validators: Vec<Validator>,
    commands: CommandQueue,
    is_send: bool,
    world_id: Option<WorldId>,
    last_run: Tick,
}

impl<Out: 'static> FunctionSystem<Out> {
    fn new<F: 'static>(name: impl Into<Cow<'static, str>>, run_mode: RunMode<Out>) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<F>(),
            type_name: type_name::<F>(),
            run_mode,
            declared: Vec::new(),
            access_set: FilteredAccessSet::new(),
            required_resources: Vec::new(),
            validators: Vec::new(),
            commands: CommandQueue::new(),
            is_send: true,
            world_id: None,
            last_run: Tick::new(0),
        }
    }

    /// A system with shared world access.
    pub fn parallel<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: FnMut(&World) -> Out + Send + Sync + 'static,
    {
        Self::new::<F>(name, RunMode::Parallel(Box::new(func)))
    }

    /// A system with shared world access that buffers commands.
    pub fn deferred<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: FnMut(&World, &mut Commands) -> Out + Send + Sync + 'static,
    {
        Self::new::<F>(name, RunMode::Deferred(Box::new(func)))
    }

    /// A system with exclusive world access.
    pub fn exclusive<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: FnMut(&mut World) -> Out + Send + Sync + 'static,
    {
        Self::new::<F>(name, RunMode::Exclusive(Box::new(func)))
    }

    fn declare(
        mut self,
        mode: AccessMode,
        is_resource: bool,
        name: &'static str,
        resolve: fn(&World) -> ComponentId,
    ) -> Self {
        self.declared.push(DeclaredAccess {
            mode,
            is_resource,
            name,
            resolve,
        });
        self
    }

    /// Declare a read of component `C`.
    pub fn reads<C: Component>(self) -> Self {
        self.declare(AccessMode::Read, false, type_name::<C>(), |world| {
            world.register_component::<C>()
        })
    }

    /// Declare a write of component `C`.
    pub fn writes<C: Component>(self) -> Self {
        self.declare(AccessMode::Write, false, type_name::<C>(), |world| {
            world.register_component::<C>()
        })
    }

    /// Declare a read of resource `R`. The system is skipped while `R` is missing.
    pub fn reads_resource<R: Resource>(self) -> Self {
        self.declare(AccessMode::Read, true, type_name::<R>(), |world| {
            world.register_resource::<R>()
        })
    }

    /// Declare a write of resource `R`. The system is skipped while `R` is missing.
    pub fn writes_resource<R: Resource>(self) -> Self {
        self.declare(AccessMode::Write, true, type_name::<R>(), |world| {
            world.register_resource::<R>()
        })
    }

    /// Declare access in terms of raw ids.
    pub fn with_access(mut self, f: impl FnOnce(&mut FilteredAccessSet<ComponentId>)) -> Self {
        f(&mut self.access_set);
        self
    }

    /// Add a check run before every execution.
    pub fn with_validation<V>(mut self, validator: V) -> Self
    where
        V: FnMut(&World) -> Result<(), SystemParamValidationError> + Send + Sync + 'static,
    {
        self.validators.push(Box::new(validator));
        self
    }

    /// Mark the system as bound to the world's thread.
    pub fn non_send(mut self) -> Self {
        self.is_send = false;
        self
    }

    /// Share type identity with `T`, so the system lands in `T`'s [`SystemTypeSet`].
    pub fn with_type_id<T: 'static>(mut self) -> Self {
        self.type_id = TypeId::of::<T>();
        self.type_name = type_name::<T>();
        self
    }

    /// The implicit set of every system with this system's type.
    pub fn system_type_set(&self) -> SystemTypeSet {
        SystemTypeSet::new(self.type_id, self.type_name)
    }

    /// Whether the system has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.world_id.is_some()
    }
}

impl<Out: 'static> System for FunctionSystem<Out> {
    type Out = Out;

    #[inline]
    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    #[inline]
    fn system_type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    fn component_access_set(&self) -> &FilteredAccessSet<ComponentId> {
        &self.access_set
    }

    #[inline]
    fn is_send(&self) -> bool {
        self.is_send
    }

    #[inline]
    fn is_exclusive(&self) -> bool {
        matches!(self.run_mode, RunMode::Exclusive(_))
    }

    #[inline]
    fn has_deferred(&self) -> bool {
        matches!(self.run_mode, RunMode::Deferred(_))
    }

    unsafe fn run_unsafe(&mut self, world: UnsafeWorldCell) -> Out {
        let this_run = world.increment_change_tick();
        let out = match &mut self.run_mode {
            // SAFETY: the caller guarantees no conflicting access for the declared footprint.
            RunMode::Parallel(func) => func(unsafe { world.world() }),
            RunMode::Deferred(func) => {
                let mut commands = Commands::new(&self.commands);
                // SAFETY: as above.
                func(unsafe { world.world() }, &mut commands)
            }
            // SAFETY: the caller guarantees exclusive access for exclusive systems.
            RunMode::Exclusive(func) => func(unsafe { world.world_mut() }),
        };
        self.last_run = this_run;
        out
    }

    fn run(&mut self, world: &mut World) -> Out {
        let out = self.run_without_applying_deferred(world);
        self.apply_deferred(world);
        if self.is_exclusive() {
            world.flush();
        }
        out
    }

    fn apply_deferred(&mut self, world: &mut World) {
        self.commands.apply(world);
    }

    fn queue_deferred(&mut self, world: &World) {
        world.commands().append(&self.commands);
    }

    unsafe fn validate_param_unsafe(
        &mut self,
        world: UnsafeWorldCell,
    ) -> Result<(), SystemParamValidationError> {
        // SAFETY: validation only reads.
        let world = unsafe { world.world() };
        for &(id, name) in &self.required_resources {
            if !world.contains_resource_id(id) {
                return Err(SystemParamValidationError::invalid(format!(
                    "resource `{}` requested by `{}` does not exist",
                    crate::ecs::util::short_name(name),
                    self.name
                )));
            }
        }
        self.validators
            .iter_mut()
            .try_for_each(|validator| validator(world))
    }

    fn initialize(&mut self, world: &mut World) {
        if self.world_id == Some(world.id()) {
            return;
        }
        self.world_id = Some(world.id());
        self.last_run = world.change_tick().relative_to(Tick::MAX);

        if self.is_exclusive() {
            self.access_set.write_all();
        }
        for declared in &self.declared {
            let id = (declared.resolve)(world);
            match (declared.is_resource, declared.mode) {
                (false, AccessMode::Read) => self.access_set.add_unfiltered_component_read(id),
                (false, AccessMode::Write) => self.access_set.add_unfiltered_component_write(id),
                (true, AccessMode::Read) => self.access_set.add_unfiltered_resource_read(id),
                (true, AccessMode::Write) => self.access_set.add_unfiltered_resource_write(id),
            }
            if declared.is_resource {
                self.required_resources.push((id, declared.name));
            }
        }
    }

    fn update_archetype_component_access(&mut self, world: UnsafeWorldCell) {
        debug_assert_eq!(
            self.world_id,
            Some(world.id()),
            "system `{}` used with a world it was not initialized with",
            self.name
        );
    }

    fn check_change_tick(&mut self, change_tick: Tick) {
        check_system_change_tick(&mut self.last_run, change_tick, &self.name);
    }

    fn default_system_sets(&self) -> Vec<InternedSystemSet> {
        vec![self.system_type_set().intern()]
    }

    #[inline]
    fn get_last_run(&self) -> Tick {
        self.last_run
    }

    #[inline]
    fn set_last_run(&mut self, last_run: Tick) {
        self.last_run = last_run;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::ecs::component::{Component, Resource};

    #[derive(Component)]
    struct Position;

    #[derive(Resource, Debug, Default, PartialEq)]
    struct Gravity(u32);

    fn world() -> World {
        World::new(WorldId::new(1))
    }

    #[test]
    fn declared_access_is_resolved_on_initialize() {
        // Given
        let mut world = world();
        let mut system = FunctionSystem::parallel("physics", |_: &World| {})
            .writes::<Position>()
            .reads_resource::<Gravity>();

        // When
        system.initialize(&mut world);

        // Then
        let position = world.components().component_id::<Position>();
        let gravity = world.components().resource_id::<Gravity>();
        assert!(position.is_some_and(|id| system.component_access().has_component_write(id)));
        assert!(gravity.is_some_and(|id| system.component_access().has_resource_read(id)));
        assert!(!system.is_exclusive());
        assert!(!system.has_deferred());
    }

    #[test]
    fn initialize_is_idempotent() {
        // Given
        let mut world = world();
        let mut system = FunctionSystem::parallel("reader", |_: &World| {}).reads::<Position>();

        // When
        system.initialize(&mut world);
        system.initialize(&mut world);

        // Then
        assert_eq!(system.component_access_set().filtered_accesses().len(), 1);
    }

    #[test]
    fn missing_resource_fails_validation() {
        // Given
        let mut world = world();
        let mut system =
            FunctionSystem::parallel("gravity", |_: &World| {}).reads_resource::<Gravity>();
        system.initialize(&mut world);

        // When
        let missing = system.validate_param(&world);
        world.insert_resource(Gravity(10));
        let present = system.validate_param(&world);

        // Then
        assert!(missing.is_err_and(|error| !error.skipped && error.message.contains("Gravity")));
        assert_eq!(present, Ok(()));
    }

    #[test]
    fn custom_validation_is_consulted() {
        // Given
        let mut world = world();
        let mut system = FunctionSystem::parallel("gated", |_: &World| {}).with_validation(
            |world: &World| match world.contains_resource::<Gravity>() {
                true => Ok(()),
                false => Err(SystemParamValidationError::skipped("no gravity")),
            },
        );
        system.initialize(&mut world);

        // Then
        assert!(system.validate_param(&world).is_err_and(|error| error.skipped));
    }

    #[test]
    fn deferred_commands_wait_for_apply() {
        // Given
        let mut world = world();
        let mut system = FunctionSystem::deferred("spawn", |_: &World, commands: &mut Commands| {
            commands.insert_resource(Gravity(3));
        });
        system.initialize(&mut world);

        // When
        system.run_without_applying_deferred(&mut world);

        // Then
        assert!(system.has_deferred());
        assert!(!world.contains_resource::<Gravity>());

        system.apply_deferred(&mut world);
        assert_eq!(world.resource::<Gravity>(), Some(&Gravity(3)));
    }

    #[test]
    fn queue_deferred_hands_commands_to_the_world() {
        // Given
        let mut world = world();
        let mut system = FunctionSystem::deferred("spawn", |_: &World, commands: &mut Commands| {
            commands.insert_resource(Gravity(4));
        });
        system.initialize(&mut world);
        system.run_without_applying_deferred(&mut world);

        // When
        system.queue_deferred(&world);
        world.flush();

        // Then
        assert_eq!(world.resource::<Gravity>(), Some(&Gravity(4)));
    }

    #[test]
    fn exclusive_systems_write_everything() {
        // Given
        let mut world = world();
        let mut system = FunctionSystem::exclusive("reset", |world: &mut World| {
            world.insert_resource(Gravity(1));
        });

        // When
        system.initialize(&mut world);
        system.run(&mut world);

        // Then
        assert!(system.is_exclusive());
        assert!(system.component_access().has_write_all());
        assert_eq!(world.resource::<Gravity>(), Some(&Gravity(1)));
    }

    #[test]
    fn run_returns_output_and_records_last_run() {
        // Given
        let mut world = world();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut condition = FunctionSystem::parallel("every_other", move |_: &World| {
            counter.fetch_add(1, Ordering::Relaxed) % 2 == 0
        });
        condition.initialize(&mut world);

        // When
        let first = condition.run(&mut world);
        let second = condition.run(&mut world);

        // Then
        assert!(first);
        assert!(!second);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(condition.get_last_run().get() + 1, world.change_tick().get());
    }

    #[test]
    fn type_identity_drives_default_sets() {
        // Given
        struct Marker;
        let a = FunctionSystem::parallel("a", |_: &World| {}).with_type_id::<Marker>();
        let b = FunctionSystem::parallel("b", |_: &World| {}).with_type_id::<Marker>();
        let c = FunctionSystem::parallel("c", |_: &World| {});

        // Then
        assert_eq!(a.system_type_id(), b.system_type_id());
        assert_ne!(a.system_type_id(), c.system_type_id());
        assert_eq!(a.default_system_sets(), b.default_system_sets());
        assert_ne!(a.default_system_sets(), c.default_system_sets());
    }

    #[test]
    fn raw_access_is_kept() {
        let system = FunctionSystem::parallel("raw", |_: &World| {})
            .with_access(|set| set.add_unfiltered_component_write(ComponentId::new(7)));
        assert!(system
            .component_access()
            .has_component_write(ComponentId::new(7)));
    }
}
