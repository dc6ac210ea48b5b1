//! Labeled schedules and the registry that stores them in the world.
//!
//! A [`Schedule`] pairs a [`ScheduleGraph`] (what the user declared) with the compiled
//! [`SystemSchedule`] (what the executor runs). The plan is rebuilt lazily: registration only
//! marks the graph as changed, and the next [`initialize`](Schedule::initialize) or
//! [`run`](Schedule::run) compiles it.
//!
//! ```rust,ignore
//! #[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
//! struct Update;
//!
//! let mut schedule = Schedule::new(Update);
//! schedule.add_systems((read_input, apply_velocity).chain())?;
//! world.add_schedule(schedule);
//!
//! loop {
//!     world.run_schedule(Update)?;
//! }
//! ```

use std::collections::{BTreeSet, HashMap};

use fixedbitset::FixedBitSet;
use log::{info, trace};
use thiserror::Error;

use crate::ecs::{
    component::{Component, ComponentId, Resource},
    graph::NodeId,
    schedule::{
        AutoInsertApplyDeferredPass, BuildPass, BuildPassKind, ExecutorKind,
        InternedScheduleLabel, InternedSystemSet, ScheduleBuildError, ScheduleBuildSettings,
        ScheduleBuildWarning, ScheduleGraph, ScheduleLabel, ScheduleNotInitialized, SystemSchedule,
        SystemSet, config::IntoNodeConfigs, executor::SystemExecutor, executor::make_executor,
    },
    system::{BoxedSystem, is_apply_deferred},
    world::{Tick, World, WorldId},
};

/// Failure of [`World::try_run_schedule`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TryRunScheduleError {
    /// No schedule with this label is stored in the world.
    #[error("the schedule with the label {0:?} was not found")]
    NotFound(InternedScheduleLabel),

    /// The schedule failed to build.
    #[error(transparent)]
    Build(#[from] ScheduleBuildError),
}

/// A labeled collection of systems, compiled on demand and run by an executor.
pub struct Schedule {
    label: InternedScheduleLabel,
    graph: ScheduleGraph,
    executable: SystemSchedule,
    executor: Box<dyn SystemExecutor>,
    executor_initialized: bool,
    world_id: Option<WorldId>,
}

impl Schedule {
    /// An empty schedule with default settings and the automatic sync point pass.
    pub fn new(label: impl ScheduleLabel) -> Self {
        let mut schedule = Self {
            label: label.intern(),
            graph: ScheduleGraph::new(),
            executable: SystemSchedule::new(),
            executor: make_executor(ExecutorKind::default()),
            executor_initialized: false,
            world_id: None,
        };
        schedule.add_build_pass(AutoInsertApplyDeferredPass::default());
        schedule
    }

    /// The label of this schedule.
    pub fn label(&self) -> InternedScheduleLabel {
        self.label
    }

    /// Add systems.
    pub fn add_systems(
        &mut self,
        systems: impl IntoNodeConfigs<BoxedSystem>,
    ) -> Result<&mut Self, ScheduleBuildError> {
        self.graph.add_systems(systems)?;
        Ok(self)
    }

    /// Add or configure sets.
    pub fn configure_sets(
        &mut self,
        sets: impl IntoNodeConfigs<InternedSystemSet>,
    ) -> Result<&mut Self, ScheduleBuildError> {
        self.graph.configure_sets(sets)?;
        Ok(self)
    }

    /// Do not report ambiguities between members of `a` and members of `b`.
    pub fn ignore_ambiguity(&mut self, a: impl SystemSet, b: impl SystemSet) -> &mut Self {
        self.graph.ignore_ambiguity(a.intern(), b.intern());
        self
    }

    /// Register a build pass, replacing one of the same kind.
    pub fn add_build_pass(&mut self, pass: impl Into<BuildPass>) -> &mut Self {
        self.graph.add_build_pass(pass);
        self
    }

    /// Unregister a build pass.
    pub fn remove_build_pass(&mut self, kind: BuildPassKind) -> &mut Self {
        self.graph.remove_build_pass(kind);
        self
    }

    /// Replace the build settings. The automatic sync point pass follows
    /// [`auto_insert_apply_deferred`](ScheduleBuildSettings::auto_insert_apply_deferred).
    pub fn set_build_settings(&mut self, settings: ScheduleBuildSettings) -> &mut Self {
        let kind = BuildPassKind::AutoInsertApplyDeferred;
        if settings.auto_insert_apply_deferred {
            if !self.graph.has_build_pass(kind) {
                self.graph.add_build_pass(AutoInsertApplyDeferredPass::default());
            }
        } else {
            self.graph.remove_build_pass(kind);
        }
        self.graph.settings = settings;
        self.graph.set_changed(true);
        self
    }

    /// Current build settings.
    pub fn get_build_settings(&self) -> ScheduleBuildSettings {
        self.graph.settings().clone()
    }

    /// Kind of the executor running this schedule.
    pub fn get_executor_kind(&self) -> ExecutorKind {
        self.executor.kind()
    }

    /// Switch executors. The new one is initialized before the next run.
    pub fn set_executor_kind(&mut self, kind: ExecutorKind) -> &mut Self {
        if kind != self.executor.kind() {
            self.executor = make_executor(kind);
            self.executor_initialized = false;
        }
        self
    }

    /// Whether deferred mutations still pending at the end of a run are applied.
    pub fn set_apply_final_deferred(&mut self, apply_final_deferred: bool) -> &mut Self {
        self.executor.set_apply_final_deferred(apply_final_deferred);
        self
    }

    /// Run every system once, rebuilding first when the graph changed.
    pub fn run(&mut self, world: &mut World) -> Result<(), ScheduleBuildError> {
        world.check_change_ticks();
        self.initialize(world)?;

        trace!("running schedule {:?}", self.label);
        self.executor.run(&mut self.executable, world, None);
        Ok(())
    }

    /// Run every system once except those set in `skip_systems`, indexed like
    /// [`executable`](Self::executable).
    pub fn run_skipping(
        &mut self,
        world: &mut World,
        skip_systems: &FixedBitSet,
    ) -> Result<(), ScheduleBuildError> {
        world.check_change_ticks();
        self.initialize(world)?;
        self.executor
            .run(&mut self.executable, world, Some(skip_systems));
        Ok(())
    }

    /// Bind the schedule to `world`, initialize new nodes, and rebuild the plan if the graph
    /// changed.
    ///
    /// A schedule stays bound to the first world it is initialized with.
    pub fn initialize(&mut self, world: &mut World) -> Result<(), ScheduleBuildError> {
        match self.world_id {
            Some(expected) if expected != world.id() => {
                return Err(ScheduleBuildError::WorldMismatch {
                    expected,
                    found: world.id(),
                });
            }
            Some(_) => {}
            None => self.world_id = Some(world.id()),
        }

        if self.graph.changed() {
            // Pending mutations are tracked by plan position, which the rebuild invalidates.
            if self.executor_initialized {
                self.executor.apply_deferred(&mut self.executable, world);
            }
            self.graph.initialize(world);
            let ignored_ambiguities = world
                .get_resource_or_init::<Schedules>()
                .ignored_scheduling_ambiguities
                .clone();
            self.graph.update_schedule(
                world,
                &mut self.executable,
                &ignored_ambiguities,
                self.label,
            )?;
            self.graph.set_changed(false);
            self.executor_initialized = false;
        }

        if !self.executor_initialized {
            self.executor.init(&self.executable);
            self.executor_initialized = true;
        }
        Ok(())
    }

    /// Apply the deferred mutations of systems that ran since the last sync point.
    pub fn apply_deferred(&mut self, world: &mut World) {
        self.executor.apply_deferred(&mut self.executable, world);
    }

    /// Clamp stale last-run ticks of every system and condition.
    pub fn check_change_ticks(&mut self, change_tick: Tick) {
        for system in &mut self.executable.systems {
            if !is_apply_deferred(system.as_ref()) {
                system.check_change_tick(change_tick);
            }
        }
        for conditions in &mut self.executable.system_conditions {
            for condition in conditions {
                condition.check_change_tick(change_tick);
            }
        }
        for conditions in &mut self.executable.set_conditions {
            for condition in conditions {
                condition.check_change_tick(change_tick);
            }
        }
    }

    /// The declared graph.
    pub fn graph(&self) -> &ScheduleGraph {
        &self.graph
    }

    /// The declared graph, mutably.
    pub fn graph_mut(&mut self) -> &mut ScheduleGraph {
        &mut self.graph
    }

    /// The compiled plan. Empty until the first [`initialize`](Self::initialize).
    pub fn executable(&self) -> &SystemSchedule {
        &self.executable
    }

    /// Planned systems in run order, once the schedule is initialized.
    pub fn systems(
        &self,
    ) -> Result<impl Iterator<Item = (NodeId, &BoxedSystem)> + '_, ScheduleNotInitialized> {
        if !self.executor_initialized {
            return Err(ScheduleNotInitialized);
        }
        Ok(self
            .executable
            .system_ids
            .iter()
            .copied()
            .zip(&self.executable.systems))
    }

    /// Number of systems, counted in the graph before initialization and in the plan after.
    pub fn systems_len(&self) -> usize {
        if self.executor_initialized {
            self.executable.systems.len()
        } else {
            self.graph.systems().count()
        }
    }

    /// Diagnostics the last build reported at warn level.
    pub fn warnings(&self) -> &[ScheduleBuildWarning] {
        self.graph.warnings()
    }
}

/// Every schedule of a world, by label, plus scheduling settings shared by all of them.
#[derive(Resource, Default)]
pub struct Schedules {
    inner: HashMap<InternedScheduleLabel, Schedule>,
    /// Components and resources whose conflicts are never reported as ambiguities.
    pub ignored_scheduling_ambiguities: BTreeSet<ComponentId>,
}

impl Schedules {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `schedule`, returning the one it replaces.
    pub fn insert(&mut self, schedule: Schedule) -> Option<Schedule> {
        self.inner.insert(schedule.label, schedule)
    }

    /// Take out the schedule with this label.
    pub fn remove(&mut self, label: impl ScheduleLabel) -> Option<Schedule> {
        self.inner.remove(&label.intern())
    }

    /// Whether a schedule with this label is stored.
    pub fn contains(&self, label: impl ScheduleLabel) -> bool {
        self.inner.contains_key(&label.intern())
    }

    /// The schedule with this label.
    pub fn get(&self, label: impl ScheduleLabel) -> Option<&Schedule> {
        self.inner.get(&label.intern())
    }

    /// The schedule with this label, mutably.
    pub fn get_mut(&mut self, label: impl ScheduleLabel) -> Option<&mut Schedule> {
        self.inner.get_mut(&label.intern())
    }

    /// The schedule with this label, created empty if missing.
    pub fn entry(&mut self, label: impl ScheduleLabel) -> &mut Schedule {
        self.inner
            .entry(label.intern())
            .or_insert_with(|| Schedule::new(label))
    }

    /// Every schedule with its label.
    pub fn iter(&self) -> impl Iterator<Item = (&dyn ScheduleLabel, &Schedule)> {
        self.inner
            .iter()
            .map(|(label, schedule)| (&**label, schedule))
    }

    /// Every schedule with its label, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&dyn ScheduleLabel, &mut Schedule)> {
        self.inner
            .iter_mut()
            .map(|(label, schedule)| (&**label, schedule))
    }

    /// Clamp stale ticks in every stored schedule.
    pub fn check_change_ticks(&mut self, change_tick: Tick) {
        for schedule in self.inner.values_mut() {
            schedule.check_change_ticks(change_tick);
        }
    }

    /// Apply `settings` to every stored schedule.
    pub fn configure_schedules(&mut self, settings: ScheduleBuildSettings) {
        for schedule in self.inner.values_mut() {
            schedule.set_build_settings(settings.clone());
        }
    }

    /// Never report conflicts on component `C` as ambiguities.
    pub fn allow_ambiguous_component<C: Component>(&mut self, world: &World) {
        self.ignored_scheduling_ambiguities
            .insert(world.register_component::<C>());
    }

    /// Never report conflicts on resource `R` as ambiguities.
    pub fn allow_ambiguous_resource<R: Resource>(&mut self, world: &World) {
        self.ignored_scheduling_ambiguities
            .insert(world.register_resource::<R>());
    }

    /// Ids whose conflicts are never reported.
    pub fn iter_ignored_ambiguities(&self) -> impl Iterator<Item = &ComponentId> {
        self.ignored_scheduling_ambiguities.iter()
    }

    /// Log the names of the ids whose conflicts are never reported.
    pub fn print_ignored_ambiguities(&self, world: &World) {
        let mut message = String::from(
            "system ambiguities are ignored for the following components and resources:\n",
        );
        for id in self.iter_ignored_ambiguities() {
            let name = world.components().get_name(*id).unwrap_or("<unregistered>");
            message.push_str(&format!(" -- {name}\n"));
        }
        info!("{message}");
    }

    /// Add systems to the schedule with this label, creating it if missing.
    pub fn add_systems(
        &mut self,
        label: impl ScheduleLabel,
        systems: impl IntoNodeConfigs<BoxedSystem>,
    ) -> Result<&mut Self, ScheduleBuildError> {
        self.entry(label).add_systems(systems)?;
        Ok(self)
    }

    /// Configure sets in the schedule with this label, creating it if missing.
    pub fn configure_sets(
        &mut self,
        label: impl ScheduleLabel,
        sets: impl IntoNodeConfigs<InternedSystemSet>,
    ) -> Result<&mut Self, ScheduleBuildError> {
        self.entry(label).configure_sets(sets)?;
        Ok(self)
    }

    /// Exempt members of `a` and `b` from ambiguity reports in the schedule with this label.
    pub fn ignore_ambiguity(
        &mut self,
        label: impl ScheduleLabel,
        a: impl SystemSet,
        b: impl SystemSet,
    ) -> &mut Self {
        self.entry(label).ignore_ambiguity(a, b);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::ecs::{
        schedule::{LogLevel, condition::resource_exists},
        system::{Commands, FunctionSystem},
    };

    #[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
    struct Update;

    #[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
    struct Render;

    #[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
    enum Gate {
        Outer,
        Left,
        Right,
        Inner,
    }

    #[derive(Component)]
    struct Position;

    #[derive(Resource, Default)]
    struct Frames(u32);

    #[derive(Resource)]
    struct Paused;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn counting(name: &'static str, count: &Arc<AtomicUsize>) -> FunctionSystem {
        let count = Arc::clone(count);
        FunctionSystem::parallel(name, move |_: &World| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn counting_condition(
        count: &Arc<AtomicUsize>,
        result: bool,
    ) -> impl FnMut(&World) -> bool + Send + Sync + 'static {
        let count = Arc::clone(count);
        move |_: &World| {
            count.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    fn frame_counter(name: &'static str) -> FunctionSystem {
        FunctionSystem::deferred(name, |_: &World, commands: &mut Commands| {
            commands.queue(|world: &mut World| world.get_resource_or_init::<Frames>().0 += 1);
        })
    }

    #[test]
    fn false_set_condition_skips_members_and_their_conditions() {
        // Given a system gated by a false set condition and its own counting condition
        let mut world = World::new(WorldId::new(1));
        let set_checks = counter();
        let system_checks = counter();
        let runs = counter();
        let mut schedule = Schedule::new(Update);
        schedule
            .configure_sets(Gate::Outer.run_if(counting_condition(&set_checks, false)))
            .unwrap()
            .add_systems(
                counting("gated", &runs)
                    .in_set(Gate::Outer)
                    .run_if(counting_condition(&system_checks, true)),
            )
            .unwrap();

        // When
        schedule.run(&mut world).unwrap();

        // Then
        assert_eq!(set_checks.load(Ordering::SeqCst), 1);
        assert_eq!(system_checks.load(Ordering::SeqCst), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn diamond_set_conditions_are_evaluated_once_per_run() {
        // Given Outer contains Left and Right, which both contain Inner
        let mut world = World::new(WorldId::new(1));
        let checks = [counter(), counter(), counter(), counter()];
        let runs = counter();
        let mut schedule = Schedule::new(Update);
        schedule
            .configure_sets(Gate::Outer.run_if(counting_condition(&checks[0], true)))
            .unwrap()
            .configure_sets(
                Gate::Left
                    .in_set(Gate::Outer)
                    .run_if(counting_condition(&checks[1], true)),
            )
            .unwrap()
            .configure_sets(
                Gate::Right
                    .in_set(Gate::Outer)
                    .run_if(counting_condition(&checks[2], true)),
            )
            .unwrap()
            .configure_sets(
                Gate::Inner
                    .in_set(Gate::Left)
                    .in_set(Gate::Right)
                    .run_if(counting_condition(&checks[3], true)),
            )
            .unwrap()
            .add_systems((counting("first", &runs), counting("second", &runs)).in_set(Gate::Inner))
            .unwrap();

        // When
        schedule.run(&mut world).unwrap();
        schedule.run(&mut world).unwrap();

        // Then
        for check in &checks {
            assert_eq!(check.load(Ordering::SeqCst), 2);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn a_schedule_is_bound_to_one_world() {
        // Given
        let mut first = World::new(WorldId::new(1));
        let mut second = World::new(WorldId::new(2));
        let mut schedule = Schedule::new(Update);
        schedule.run(&mut first).unwrap();

        // When
        let result = schedule.run(&mut second);

        // Then
        assert_eq!(
            result,
            Err(ScheduleBuildError::WorldMismatch {
                expected: WorldId::new(1),
                found: WorldId::new(2),
            })
        );
    }

    #[test]
    fn systems_added_between_runs_trigger_a_rebuild() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let runs = counter();
        let mut schedule = Schedule::new(Update);
        schedule.add_systems(counting("first", &runs)).unwrap();
        schedule.run(&mut world).unwrap();
        assert!(!schedule.graph().changed());

        // When
        schedule.add_systems(counting("second", &runs)).unwrap();
        assert!(schedule.graph().changed());
        schedule.run(&mut world).unwrap();

        // Then
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(schedule.systems_len(), 2);
    }

    #[test]
    fn systems_are_only_listed_once_initialized() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let mut schedule = Schedule::new(Update);
        schedule
            .add_systems((counting("a", &counter()), counting("b", &counter())).chain())
            .unwrap();

        // Then
        assert!(schedule.systems().is_err());
        assert_eq!(schedule.systems_len(), 2);

        schedule.initialize(&mut world).unwrap();
        let names = schedule
            .systems()
            .unwrap()
            .map(|(_, system)| system.name().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn final_deferred_can_be_left_to_the_caller() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let mut schedule = Schedule::new(Update);
        schedule.add_systems(frame_counter("count")).unwrap();
        schedule.set_apply_final_deferred(false);

        // When
        schedule.run(&mut world).unwrap();

        // Then
        assert!(world.resource::<Frames>().is_none());
        schedule.apply_deferred(&mut world);
        assert_eq!(world.resource::<Frames>().map(|frames| frames.0), Some(1));
    }

    #[test]
    fn skipped_systems_do_not_run() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let runs = counter();
        let mut schedule = Schedule::new(Update);
        schedule
            .add_systems((counting("kept", &runs), counting("skipped", &counter())).chain())
            .unwrap();
        schedule.initialize(&mut world).unwrap();
        let mut skip = FixedBitSet::with_capacity(2);
        skip.insert(1);

        // When
        schedule.run_skipping(&mut world, &skip).unwrap();

        // Then
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn build_settings_toggle_the_sync_point_pass() {
        // Given
        let mut schedule = Schedule::new(Update);
        assert!(schedule
            .graph()
            .has_build_pass(BuildPassKind::AutoInsertApplyDeferred));

        // When
        schedule.set_build_settings(
            ScheduleBuildSettings::new().with_auto_insert_apply_deferred(false),
        );

        // Then
        assert!(!schedule
            .graph()
            .has_build_pass(BuildPassKind::AutoInsertApplyDeferred));
        assert!(!schedule.get_build_settings().auto_insert_apply_deferred);

        schedule.set_build_settings(ScheduleBuildSettings::new());
        assert!(schedule
            .graph()
            .has_build_pass(BuildPassKind::AutoInsertApplyDeferred));
    }

    #[test]
    fn executor_kind_defaults_to_single_threaded() {
        let mut schedule = Schedule::new(Update);
        assert_eq!(schedule.get_executor_kind(), ExecutorKind::SingleThreaded);
        schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        assert_eq!(schedule.get_executor_kind(), ExecutorKind::SingleThreaded);
    }

    #[test]
    fn allowed_components_are_not_ambiguous() {
        // Given two unordered writers of Position with ambiguity detection set to error
        let mut world = World::new(WorldId::new(1));
        let mut schedules = Schedules::new();
        schedules.allow_ambiguous_component::<Position>(&world);
        world.insert_resource(schedules);

        let mut schedule = Schedule::new(Update);
        schedule
            .set_build_settings(
                ScheduleBuildSettings::new().with_ambiguity_detection(LogLevel::Error),
            )
            .add_systems((
                counting("a", &counter()).writes::<Position>(),
                counting("b", &counter()).writes::<Position>(),
            ))
            .unwrap();

        // When
        let result = schedule.initialize(&mut world);

        // Then
        assert!(result.is_ok());
        assert!(schedule.graph().conflicting_systems().is_empty());
    }

    #[test]
    fn ignored_set_pairs_are_not_ambiguous() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let mut schedule = Schedule::new(Update);
        schedule
            .set_build_settings(
                ScheduleBuildSettings::new().with_ambiguity_detection(LogLevel::Error),
            )
            .add_systems(counting("a", &counter()).writes::<Position>().in_set(Gate::Left))
            .unwrap()
            .add_systems(counting("b", &counter()).writes::<Position>().in_set(Gate::Right))
            .unwrap()
            .ignore_ambiguity(Gate::Left, Gate::Right);

        // Then
        assert!(schedule.initialize(&mut world).is_ok());
    }

    #[test]
    fn worlds_run_stored_schedules_by_label() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let mut schedules = Schedules::new();
        schedules
            .add_systems(Update, frame_counter("count"))
            .unwrap();
        world.insert_resource(schedules);

        // When
        world.run_schedule(Update).unwrap();
        world.run_schedule(Update).unwrap();

        // Then
        assert_eq!(world.resource::<Frames>().map(|frames| frames.0), Some(2));
        let schedules = world.resource::<Schedules>().unwrap();
        assert!(schedules.contains(Update));
        assert!(!schedules.contains(Render));
    }

    #[test]
    fn running_a_missing_schedule_is_reported() {
        // Given
        let mut world = World::new(WorldId::new(1));

        // Then
        assert_eq!(
            world.try_run_schedule(Render),
            Err(TryRunScheduleError::NotFound(Render.intern()))
        );
        assert!(world.run_schedule(Render).is_ok());
    }

    #[test]
    fn conditions_can_read_resources() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let runs = counter();
        let mut schedule = Schedule::new(Update);
        schedule
            .add_systems(counting("paused_only", &runs).run_if(resource_exists::<Paused>()))
            .unwrap();

        // When
        schedule.run(&mut world).unwrap();
        world.insert_resource(Paused);
        schedule.run(&mut world).unwrap();

        // Then
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registry_entry_creates_missing_schedules() {
        // Given
        let mut schedules = Schedules::new();

        // When
        schedules.entry(Render);
        schedules.configure_schedules(
            ScheduleBuildSettings::new().with_hierarchy_detection(LogLevel::Error),
        );

        // Then
        let render = schedules.get(Render).unwrap();
        assert_eq!(render.label(), Render.intern());
        assert_eq!(
            render.get_build_settings().hierarchy_detection,
            LogLevel::Error
        );
        assert_eq!(schedules.iter().count(), 1);
        assert!(schedules.remove(Render).is_some());
        assert!(schedules.get_mut(Render).is_none());
    }
}
