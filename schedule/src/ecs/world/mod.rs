//! The world is the container the scheduler runs systems against.
//!
//! The scheduling core needs very little from it:
//!
//! - an identity, so a compiled plan can refuse to run on a world it was not built for
//! - a component [`Registry`] handing out the dense ids that access bitsets are keyed by
//! - resource storage, which also holds the [`Schedules`] registry
//! - a change tick counter and periodic clamping of stale ticks
//! - a [`CommandQueue`] that deferred mutations are flushed into
//!
//! # Example
//!
//! ```ignore
//! use rusty_schedule::ecs::world::{World, WorldId};
//!
//! let mut world = World::new(WorldId::new(1));
//! world.insert_resource(Gravity(9.81));
//! assert_eq!(world.resource::<Gravity>().map(|g| g.0), Some(9.81));
//! ```

mod command;
mod tick;

use std::{
    any::Any,
    cell::UnsafeCell,
    collections::HashMap,
    marker::PhantomData,
    mem,
    sync::atomic::{AtomicU32, Ordering},
};

use log::warn;

pub use command::{Command, CommandQueue, Commands};
pub use tick::{CHECK_TICK_THRESHOLD, MAX_CHANGE_AGE, Tick};

use crate::ecs::{
    component::{Component, ComponentId, Registry, Resource},
    schedule::{Schedule, ScheduleBuildError, ScheduleLabel, Schedules, TryRunScheduleError},
};

/// A world identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorldId(u32);

impl WorldId {
    /// Create a new world identifier.
    #[inline]
    pub const fn new(id: u32) -> Self {
        WorldId(id)
    }

    /// Get the raw identifier value.
    #[inline]
    pub const fn id(&self) -> u32 {
        self.0
    }
}

/// A stored resource and its change ticks.
struct ResourceData {
    value: Box<dyn Any + Send + Sync>,
    added: Tick,
    changed: Tick,
}

/// Container for resources, component ids and deferred commands.
pub struct World {
    /// The world's unique identifier.
    id: WorldId,

    /// Dense ids for component and resource types.
    components: Registry,

    /// Resource values keyed by id.
    resources: HashMap<ComponentId, ResourceData>,

    /// Commands waiting for the next flush.
    command_queue: CommandQueue,

    change_tick: AtomicU32,
    last_change_tick: Tick,
    last_check_tick: Tick,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("components", &self.components)
            .field("resources", &self.resources.len())
            .field("change_tick", &self.read_change_tick())
            .finish()
    }
}

impl World {
    /// Create an empty world.
    pub fn new(id: WorldId) -> Self {
        Self {
            id,
            components: Registry::new(),
            resources: HashMap::new(),
            command_queue: CommandQueue::new(),
            change_tick: AtomicU32::new(1),
            last_change_tick: Tick::new(0),
            last_check_tick: Tick::new(0),
        }
    }

    /// The world's identifier.
    #[inline]
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// The component and resource registry.
    #[inline]
    pub fn components(&self) -> &Registry {
        &self.components
    }

    /// Register a component type, returning its id.
    #[inline]
    pub fn register_component<C: Component>(&self) -> ComponentId {
        self.components.register_component::<C>()
    }

    /// Register a resource type, returning its id.
    #[inline]
    pub fn register_resource<R: Resource>(&self) -> ComponentId {
        self.components.register_resource::<R>()
    }

    /// Insert or replace a resource.
    pub fn insert_resource<R: Resource>(&mut self, value: R) {
        let id = self.register_resource::<R>();
        let tick = self.change_tick();
        match self.resources.get_mut(&id) {
            Some(data) => {
                data.value = Box::new(value);
                data.changed = tick;
            }
            None => {
                self.resources.insert(
                    id,
                    ResourceData {
                        value: Box::new(value),
                        added: tick,
                        changed: tick,
                    },
                );
            }
        }
    }

    /// Insert the default value of a resource unless it already exists.
    pub fn init_resource<R: Resource + Default>(&mut self) -> ComponentId {
        let id = self.register_resource::<R>();
        if !self.resources.contains_key(&id) {
            self.insert_resource(R::default());
        }
        id
    }

    /// Remove a resource, returning its value.
    pub fn remove_resource<R: Resource>(&mut self) -> Option<R> {
        let id = self.components.resource_id::<R>()?;
        let data = self.resources.remove(&id)?;
        data.value.downcast::<R>().ok().map(|value| *value)
    }

    /// Whether the resource exists.
    #[inline]
    pub fn contains_resource<R: Resource>(&self) -> bool {
        self.components
            .resource_id::<R>()
            .is_some_and(|id| self.resources.contains_key(&id))
    }

    /// Whether a resource with this id exists.
    #[inline]
    pub fn contains_resource_id(&self, id: ComponentId) -> bool {
        self.resources.contains_key(&id)
    }

    /// Shared access to a resource.
    pub fn resource<R: Resource>(&self) -> Option<&R> {
        let id = self.components.resource_id::<R>()?;
        self.resources.get(&id)?.value.downcast_ref::<R>()
    }

    /// Exclusive access to a resource. Marks it changed.
    pub fn resource_mut<R: Resource>(&mut self) -> Option<&mut R> {
        let id = self.components.resource_id::<R>()?;
        let tick = self.change_tick();
        let data = self.resources.get_mut(&id)?;
        data.changed = tick;
        data.value.downcast_mut::<R>()
    }

    /// Whether the resource was added or changed after `last_run`.
    pub fn is_resource_changed<R: Resource>(&self, last_run: Tick) -> bool {
        self.components
            .resource_id::<R>()
            .and_then(|id| self.resources.get(&id))
            .is_some_and(|data| data.changed.is_newer_than(last_run, self.read_change_tick()))
    }

    /// Exclusive access to a resource, inserting its default value first if missing.
    pub fn get_resource_or_init<R: Resource + Default>(&mut self) -> &mut R {
        self.init_resource::<R>();
        match self.resource_mut::<R>() {
            Some(value) => value,
            None => unreachable!("resource was initialized above"),
        }
    }

    /// Temporarily take a resource out of the world so both can be borrowed mutably.
    ///
    /// Returns `None` if the resource does not exist.
    pub fn resource_scope<R: Resource, U>(
        &mut self,
        f: impl FnOnce(&mut World, &mut R) -> U,
    ) -> Option<U> {
        let mut value = self.remove_resource::<R>()?;
        let result = f(self, &mut value);
        if self.contains_resource::<R>() {
            warn!(
                "resource {} was inserted during its own scope, the inserted value is replaced",
                std::any::type_name::<R>()
            );
        }
        self.insert_resource(value);
        Some(result)
    }

    /// The world's own command queue.
    #[inline]
    pub fn commands(&self) -> &CommandQueue {
        &self.command_queue
    }

    /// Apply every queued command.
    pub fn flush(&mut self) {
        while !self.command_queue.is_empty() {
            let queue = mem::take(&mut self.command_queue);
            queue.apply(self);
        }
    }

    /// Current change tick.
    #[inline]
    pub fn change_tick(&mut self) -> Tick {
        Tick::new(*self.change_tick.get_mut())
    }

    /// Current change tick through a shared reference.
    #[inline]
    pub fn read_change_tick(&self) -> Tick {
        Tick::new(self.change_tick.load(Ordering::Acquire))
    }

    /// Advance the change tick, returning the previous value.
    #[inline]
    pub fn increment_change_tick(&self) -> Tick {
        Tick::new(self.change_tick.fetch_add(1, Ordering::AcqRel))
    }

    /// Tick recorded by the last [`clear_trackers`](Self::clear_trackers).
    #[inline]
    pub fn last_change_tick(&self) -> Tick {
        self.last_change_tick
    }

    /// Start a new change-detection frame.
    pub fn clear_trackers(&mut self) {
        self.last_change_tick = self.increment_change_tick();
    }

    /// Clamp stale ticks, at most once every [`CHECK_TICK_THRESHOLD`] ticks.
    ///
    /// Covers resource ticks and the last-run ticks of every system in the [`Schedules`]
    /// resource.
    pub fn check_change_ticks(&mut self) {
        let change_tick = self.change_tick();
        if change_tick.relative_to(self.last_check_tick).get() < CHECK_TICK_THRESHOLD {
            return;
        }

        for data in self.resources.values_mut() {
            data.added.check_tick(change_tick);
            data.changed.check_tick(change_tick);
        }
        if let Some(schedules) = self.resource_mut::<Schedules>() {
            schedules.check_change_ticks(change_tick);
        }
        self.last_check_tick = change_tick;
    }

    /// Store a schedule in the [`Schedules`] resource, replacing one with the same label.
    pub fn add_schedule(&mut self, schedule: Schedule) {
        self.get_resource_or_init::<Schedules>().insert(schedule);
    }

    /// Take a schedule out of the [`Schedules`] resource for the duration of `f`.
    pub fn try_schedule_scope<U>(
        &mut self,
        label: impl ScheduleLabel,
        f: impl FnOnce(&mut World, &mut Schedule) -> U,
    ) -> Result<U, TryRunScheduleError> {
        let label = label.intern();
        let Some(mut schedule) = self
            .resource_mut::<Schedules>()
            .and_then(|schedules| schedules.remove(label))
        else {
            return Err(TryRunScheduleError::NotFound(label));
        };

        let value = f(self, &mut schedule);

        let old = self.get_resource_or_init::<Schedules>().insert(schedule);
        if old.is_some() {
            warn!(
                "schedule `{label:?}` was inserted during a call to `World::schedule_scope`: its value has been overwritten"
            );
        }
        Ok(value)
    }

    /// Run the schedule with this label.
    pub fn try_run_schedule(
        &mut self,
        label: impl ScheduleLabel,
    ) -> Result<(), TryRunScheduleError> {
        self.try_schedule_scope(label, |world, schedule| schedule.run(world))?
            .map_err(TryRunScheduleError::from)
    }

    /// Run the schedule with this label, doing nothing if there is none.
    pub fn run_schedule(&mut self, label: impl ScheduleLabel) -> Result<(), ScheduleBuildError> {
        match self.try_run_schedule(label) {
            Ok(()) => Ok(()),
            Err(TryRunScheduleError::NotFound(label)) => {
                warn!("no schedule `{label:?}` to run");
                Ok(())
            }
            Err(TryRunScheduleError::Build(error)) => Err(error),
        }
    }

    /// View of this world for code that manages aliasing itself.
    #[inline]
    pub fn as_unsafe_world_cell(&mut self) -> UnsafeWorldCell<'_> {
        UnsafeWorldCell::new_mutable(self)
    }

    /// Read-only view of this world for code that manages aliasing itself.
    #[inline]
    pub fn as_unsafe_world_cell_readonly(&self) -> UnsafeWorldCell<'_> {
        UnsafeWorldCell::new_readonly(self)
    }
}

/// A raw view of a [`World`] whose accesses are checked by the caller.
///
/// Executors hand this to systems so that many systems can hold a view at once; each system only
/// touches what its declared access allows.
#[derive(Clone, Copy)]
pub struct UnsafeWorldCell<'w>(*mut World, PhantomData<(&'w World, &'w UnsafeCell<World>)>);

// SAFETY: the cell only hands out access under the contracts of its unsafe methods, which require
// the caller to rule out conflicting access across threads.
unsafe impl Send for UnsafeWorldCell<'_> {}
// SAFETY: see above.
unsafe impl Sync for UnsafeWorldCell<'_> {}

impl<'w> UnsafeWorldCell<'w> {
    #[inline]
    pub(crate) fn new_readonly(world: &'w World) -> Self {
        Self(std::ptr::from_ref(world).cast_mut(), PhantomData)
    }

    #[inline]
    pub(crate) fn new_mutable(world: &'w mut World) -> Self {
        Self(std::ptr::from_mut(world), PhantomData)
    }

    /// Shared access to the whole world.
    ///
    /// # Safety
    /// No mutable reference to the world may be live for `'w`.
    #[inline]
    pub unsafe fn world(self) -> &'w World {
        // SAFETY: upheld by the caller.
        unsafe { &*self.0 }
    }

    /// Exclusive access to the whole world.
    ///
    /// # Safety
    /// The cell must have been created from `&mut World`, and no other reference to the world may
    /// be live for `'w`.
    #[inline]
    pub unsafe fn world_mut(self) -> &'w mut World {
        // SAFETY: upheld by the caller.
        unsafe { &mut *self.0 }
    }

    /// The world's identifier.
    #[inline]
    pub fn id(self) -> WorldId {
        // SAFETY: the id is never mutated after construction.
        unsafe { (*self.0).id }
    }

    /// Current change tick.
    #[inline]
    pub fn change_tick(self) -> Tick {
        // SAFETY: the counter is atomic.
        unsafe { (*self.0).read_change_tick() }
    }

    /// Advance the change tick, returning the previous value.
    #[inline]
    pub fn increment_change_tick(self) -> Tick {
        // SAFETY: the counter is atomic.
        unsafe { (*self.0).increment_change_tick() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Resource, Debug, Default, PartialEq)]
    struct Score(u32);

    #[derive(Resource, Debug, Default, PartialEq)]
    struct Lives(u8);

    #[test]
    fn insert_and_read_resources() {
        // Given
        let mut world = World::new(WorldId::new(1));

        // When
        world.insert_resource(Score(5));

        // Then
        assert!(world.contains_resource::<Score>());
        assert!(!world.contains_resource::<Lives>());
        assert_eq!(world.resource::<Score>(), Some(&Score(5)));
        assert_eq!(world.resource::<Lives>(), None);
    }

    #[test]
    fn init_keeps_existing_value() {
        // Given
        let mut world = World::new(WorldId::new(1));
        world.insert_resource(Score(3));

        // When
        let id = world.init_resource::<Score>();

        // Then
        assert!(world.contains_resource_id(id));
        assert_eq!(world.resource::<Score>(), Some(&Score(3)));
    }

    #[test]
    fn remove_returns_the_value() {
        let mut world = World::new(WorldId::new(1));
        world.insert_resource(Lives(2));
        assert_eq!(world.remove_resource::<Lives>(), Some(Lives(2)));
        assert_eq!(world.remove_resource::<Lives>(), None);
    }

    #[test]
    fn get_or_init_inserts_default() {
        // Given
        let mut world = World::new(WorldId::new(1));

        // When
        world.get_resource_or_init::<Score>().0 += 4;

        // Then
        assert_eq!(world.resource::<Score>(), Some(&Score(4)));
    }

    #[test]
    fn resource_scope_lends_the_world() {
        // Given
        let mut world = World::new(WorldId::new(1));
        world.insert_resource(Score(1));
        world.insert_resource(Lives(3));

        // When
        let result = world.resource_scope(|world, score: &mut Score| {
            assert!(!world.contains_resource::<Score>());
            score.0 += world.resource::<Lives>().map_or(0, |l| u32::from(l.0));
            score.0
        });

        // Then
        assert_eq!(result, Some(4));
        assert_eq!(world.resource::<Score>(), Some(&Score(4)));
        assert_eq!(world.resource_scope(|_, _: &mut Lives| ()), Some(()));
        assert!(world.resource_scope(|_, _: &mut Score| ()).is_some());
    }

    #[test]
    fn change_detection_on_resources() {
        // Given
        let mut world = World::new(WorldId::new(1));
        world.insert_resource(Score(0));
        let before = world.increment_change_tick();
        world.increment_change_tick();

        // Then
        assert!(!world.is_resource_changed::<Score>(before));

        // When
        if let Some(score) = world.resource_mut::<Score>() {
            score.0 = 1;
        }

        // Then
        assert!(world.is_resource_changed::<Score>(before));
    }

    #[test]
    fn change_tick_advances() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let start = world.change_tick();

        // When
        let previous = world.increment_change_tick();
        world.clear_trackers();

        // Then
        assert_eq!(previous, start);
        assert_eq!(world.last_change_tick().get(), start.get() + 1);
        assert_eq!(world.change_tick().get(), start.get() + 2);
    }

    #[test]
    fn check_change_ticks_clamps_old_resources() {
        // Given
        let mut world = World::new(WorldId::new(1));
        world.insert_resource(Score(0));
        world
            .change_tick
            .store(MAX_CHANGE_AGE + CHECK_TICK_THRESHOLD + 10, Ordering::Relaxed);

        // When
        world.check_change_ticks();

        // Then
        let now = world.change_tick();
        let data = world.resources.values().next().map(|data| data.added);
        assert_eq!(data.map(|tick| now.relative_to(tick)), Some(Tick::MAX));
        assert_eq!(world.last_check_tick, now);
    }

    #[test]
    fn unsafe_cell_reports_identity() {
        // Given
        let mut world = World::new(WorldId::new(7));

        // When
        let cell = world.as_unsafe_world_cell();

        // Then
        assert_eq!(cell.id(), WorldId::new(7));
        let tick = cell.increment_change_tick();
        assert_eq!(cell.change_tick().get(), tick.get() + 1);
    }
}
