use std::panic::{self, AssertUnwindSafe};

use fixedbitset::FixedBitSet;
use log::{error, trace, warn};

use crate::ecs::{
    schedule::executor::{ExecutorKind, SystemExecutor, SystemSchedule},
    system::{BoxedCondition, is_apply_deferred},
    world::World,
};

/// Runs systems one at a time, in plan order, on the calling thread.
///
/// # Conditions
///
/// Before a system runs, the conditions of every condition-bearing set above it that has not
/// been evaluated yet in this run are evaluated, outermost first. A set is evaluated at most
/// once per run, however many paths lead to it; a false set marks every system below it as
/// completed. The system's own conditions are only evaluated when it is still eligible, so
/// conditions of skipped systems never run. Evaluation stops at the first false condition.
///
/// # Deferred mutations
///
/// Systems with deferred mutations are recorded as unapplied after they run. The record is
/// flushed when an [`ApplyDeferred`](crate::ecs::system::ApplyDeferred) is reached, at the end
/// of the run when `apply_final_deferred` is set, or by an explicit
/// [`apply_deferred`](SystemExecutor::apply_deferred). With `apply_final_deferred` unset the
/// record survives into the next run.
#[derive(Debug)]
pub struct SingleThreadedExecutor {
    /// Condition-bearing sets evaluated this run.
    evaluated_sets: FixedBitSet,
    /// Systems that ran or were skipped this run.
    completed_systems: FixedBitSet,
    /// Systems that ran and whose deferred mutations are pending.
    unapplied_systems: FixedBitSet,
    /// Flush pending mutations at the end of each run.
    apply_final_deferred: bool,
}

impl Default for SingleThreadedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleThreadedExecutor {
    /// A new executor that flushes at the end of every run.
    pub const fn new() -> Self {
        Self {
            evaluated_sets: FixedBitSet::new(),
            completed_systems: FixedBitSet::new(),
            unapplied_systems: FixedBitSet::new(),
            apply_final_deferred: true,
        }
    }

    /// Systems whose deferred mutations are pending.
    pub fn unapplied_systems(&self) -> &FixedBitSet {
        &self.unapplied_systems
    }
}

impl SystemExecutor for SingleThreadedExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::SingleThreaded
    }

    fn init(&mut self, schedule: &SystemSchedule) {
        let system_count = schedule.system_ids.len();
        let set_count = schedule.set_ids.len();
        self.evaluated_sets = FixedBitSet::with_capacity(set_count);
        self.completed_systems = FixedBitSet::with_capacity(system_count);
        self.unapplied_systems = FixedBitSet::with_capacity(system_count);
    }

    fn run(
        &mut self,
        schedule: &mut SystemSchedule,
        world: &mut World,
        skip_systems: Option<&FixedBitSet>,
    ) {
        if let Some(skip_systems) = skip_systems {
            self.completed_systems.union_with(skip_systems);
        }

        for system_index in 0..schedule.systems.len() {
            let mut should_run = !self.completed_systems.contains(system_index);

            for set_index in schedule.sets_with_conditions_of_systems[system_index].ones() {
                if !should_run {
                    break;
                }
                if self.evaluated_sets.contains(set_index) {
                    continue;
                }

                let set_conditions_met =
                    evaluate_conditions(&mut schedule.set_conditions[set_index], world);
                if !set_conditions_met {
                    self.completed_systems
                        .union_with(&schedule.systems_in_sets_with_conditions[set_index]);
                }
                should_run &= set_conditions_met;
                self.evaluated_sets.insert(set_index);
            }

            if should_run {
                should_run =
                    evaluate_conditions(&mut schedule.system_conditions[system_index], world);
            }

            let system = &mut schedule.systems[system_index];
            if should_run {
                should_run = match system.validate_param(world) {
                    Ok(()) => true,
                    Err(validation) => {
                        if !validation.skipped {
                            warn!("system `{}` was skipped: {validation}", system.name());
                        }
                        false
                    }
                };
            }

            // Completed means "ran or skipped", so the system is never reconsidered this run.
            self.completed_systems.grow(system_index + 1);
            self.completed_systems.insert(system_index);

            if !should_run {
                continue;
            }

            if is_apply_deferred(system.as_ref()) {
                self.apply_deferred(schedule, world);
                schedule.systems[system_index].run(world);
                continue;
            }

            let has_deferred = system.has_deferred();
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                if system.is_exclusive() {
                    system.run(world);
                } else {
                    let world = world.as_unsafe_world_cell();
                    system.update_archetype_component_access(world);
                    // SAFETY: systems run one at a time with the only world reference, and the
                    // archetype access was refreshed just above.
                    unsafe { system.run_unsafe(world) };
                }
            }));
            if let Err(payload) = result {
                error!("system `{}` panicked", system.name());
                self.evaluated_sets.clear();
                self.completed_systems.clear();
                panic::resume_unwind(payload);
            }

            if has_deferred {
                self.unapplied_systems.grow(system_index + 1);
                self.unapplied_systems.insert(system_index);
            }
        }

        if self.apply_final_deferred {
            self.apply_deferred(schedule, world);
        }
        self.evaluated_sets.clear();
        self.completed_systems.clear();
    }

    fn set_apply_final_deferred(&mut self, apply_final_deferred: bool) {
        self.apply_final_deferred = apply_final_deferred;
    }

    fn apply_deferred(&mut self, schedule: &mut SystemSchedule, world: &mut World) {
        if self.unapplied_systems.is_clear() {
            return;
        }
        trace!(
            "applying deferred mutations of {} system(s)",
            self.unapplied_systems.count_ones(..)
        );
        for system_index in self.unapplied_systems.ones() {
            if let Some(system) = schedule.systems.get_mut(system_index) {
                system.apply_deferred(world);
            }
        }
        self.unapplied_systems.clear();
    }
}

/// Evaluate conditions in order, stopping at the first that is false or fails validation.
fn evaluate_conditions(conditions: &mut [BoxedCondition], world: &mut World) -> bool {
    conditions.iter_mut().all(|condition| {
        if let Err(validation) = condition.validate_param(world) {
            if !validation.skipped {
                warn!("condition `{}` was skipped: {validation}", condition.name());
            }
            return false;
        }
        condition.run(world)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::ecs::{
        component::Resource,
        graph::NodeId,
        system::{ApplyDeferred, BoxedSystem, Commands, FunctionSystem, System},
        world::WorldId,
    };

    #[derive(Resource, Debug, Default, PartialEq)]
    struct Counter(u32);

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn recording(name: &'static str, log: &Log) -> BoxedSystem {
        let log = Arc::clone(log);
        Box::new(FunctionSystem::parallel(name, move |_: &World| {
            log.lock().unwrap().push(name);
        }))
    }

    fn counting_condition(result: bool, calls: &Arc<AtomicUsize>) -> BoxedCondition {
        let calls = Arc::clone(calls);
        Box::new(FunctionSystem::parallel("counting", move |_: &World| {
            calls.fetch_add(1, Ordering::Relaxed);
            result
        }))
    }

    fn bits(len: usize, ones: &[usize]) -> FixedBitSet {
        let mut bits = FixedBitSet::with_capacity(len);
        ones.iter().for_each(|&i| bits.insert(i));
        bits
    }

    /// A plan with the given systems in order and no sets.
    fn plan(systems: Vec<BoxedSystem>) -> SystemSchedule {
        let count = systems.len();
        SystemSchedule {
            system_conditions: (0..count).map(|_| Vec::new()).collect(),
            system_ids: (0..count).map(NodeId::System).collect(),
            system_dependencies: vec![0; count],
            system_dependents: vec![Vec::new(); count],
            sets_with_conditions_of_systems: vec![FixedBitSet::new(); count],
            systems,
            ..SystemSchedule::new()
        }
    }

    fn initialized(mut schedule: SystemSchedule, world: &mut World) -> SystemSchedule {
        for system in &mut schedule.systems {
            system.initialize(world);
        }
        for condition in schedule
            .system_conditions
            .iter_mut()
            .chain(&mut schedule.set_conditions)
            .flatten()
        {
            condition.initialize(world);
        }
        schedule
    }

    fn deferred_increment() -> BoxedSystem {
        Box::new(FunctionSystem::deferred(
            "increment",
            |_: &World, commands: &mut Commands| {
                commands.queue(|world: &mut World| world.get_resource_or_init::<Counter>().0 += 1);
            },
        ))
    }

    #[test]
    fn runs_systems_in_plan_order() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let log = Log::default();
        let mut schedule = initialized(
            plan(vec![recording("a", &log), recording("b", &log), recording("c", &log)]),
            &mut world,
        );
        let mut executor = SingleThreadedExecutor::new();
        executor.init(&schedule);

        // When
        executor.run(&mut schedule, &mut world, None);

        // Then
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn false_set_condition_skips_members_without_running_their_conditions() {
        // Given two systems gated by one set whose condition is false
        let mut world = World::new(WorldId::new(1));
        let log = Log::default();
        let set_calls = Arc::new(AtomicUsize::new(0));
        let system_calls = Arc::new(AtomicUsize::new(0));

        let mut schedule = plan(vec![recording("a", &log), recording("b", &log)]);
        schedule.system_conditions[0].push(counting_condition(true, &system_calls));
        schedule.system_conditions[1].push(counting_condition(true, &system_calls));
        schedule.set_ids = vec![NodeId::Set(0)];
        schedule.set_conditions = vec![vec![counting_condition(false, &set_calls)]];
        schedule.sets_with_conditions_of_systems = vec![bits(1, &[0]), bits(1, &[0])];
        schedule.systems_in_sets_with_conditions = vec![bits(2, &[0, 1])];
        let mut schedule = initialized(schedule, &mut world);
        let mut executor = SingleThreadedExecutor::new();
        executor.init(&schedule);

        // When
        executor.run(&mut schedule, &mut world, None);

        // Then
        assert_eq!(set_calls.load(Ordering::Relaxed), 1);
        assert_eq!(system_calls.load(Ordering::Relaxed), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn diamond_ancestors_are_each_evaluated_once() {
        // Given sets 0 and 1 both gate systems a and b, as when two parents share a child set
        let mut world = World::new(WorldId::new(1));
        let log = Log::default();
        let outer_calls = Arc::new(AtomicUsize::new(0));
        let inner_calls = Arc::new(AtomicUsize::new(0));

        let mut schedule = plan(vec![recording("a", &log), recording("b", &log)]);
        schedule.set_ids = vec![NodeId::Set(0), NodeId::Set(1)];
        schedule.set_conditions = vec![
            vec![counting_condition(true, &outer_calls)],
            vec![counting_condition(true, &inner_calls)],
        ];
        schedule.sets_with_conditions_of_systems = vec![bits(2, &[0, 1]), bits(2, &[0, 1])];
        schedule.systems_in_sets_with_conditions = vec![bits(2, &[0, 1]), bits(2, &[0, 1])];
        let mut schedule = initialized(schedule, &mut world);
        let mut executor = SingleThreadedExecutor::new();
        executor.init(&schedule);

        // When
        executor.run(&mut schedule, &mut world, None);
        executor.run(&mut schedule, &mut world, None);

        // Then once per set per run
        assert_eq!(outer_calls.load(Ordering::Relaxed), 2);
        assert_eq!(inner_calls.load(Ordering::Relaxed), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn false_outer_set_leaves_inner_set_unevaluated() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let log = Log::default();
        let outer_calls = Arc::new(AtomicUsize::new(0));
        let inner_calls = Arc::new(AtomicUsize::new(0));

        let mut schedule = plan(vec![recording("a", &log)]);
        schedule.set_ids = vec![NodeId::Set(0), NodeId::Set(1)];
        schedule.set_conditions = vec![
            vec![counting_condition(false, &outer_calls)],
            vec![counting_condition(true, &inner_calls)],
        ];
        schedule.sets_with_conditions_of_systems = vec![bits(2, &[0, 1])];
        schedule.systems_in_sets_with_conditions = vec![bits(1, &[0]), bits(1, &[0])];
        let mut schedule = initialized(schedule, &mut world);
        let mut executor = SingleThreadedExecutor::new();
        executor.init(&schedule);

        // When
        executor.run(&mut schedule, &mut world, None);

        // Then
        assert_eq!(outer_calls.load(Ordering::Relaxed), 1);
        assert_eq!(inner_calls.load(Ordering::Relaxed), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn skip_mask_marks_systems_completed() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let log = Log::default();
        let mut schedule = initialized(
            plan(vec![recording("a", &log), recording("b", &log)]),
            &mut world,
        );
        let mut executor = SingleThreadedExecutor::new();
        executor.init(&schedule);

        // When
        executor.run(&mut schedule, &mut world, Some(&bits(2, &[0])));
        executor.run(&mut schedule, &mut world, None);

        // Then the mask only applies to the run it was given to
        assert_eq!(*log.lock().unwrap(), vec!["b", "a", "b"]);
    }

    #[test]
    fn failed_validation_skips_the_system() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let log = Log::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let needs_counter: BoxedSystem = Box::new(
            FunctionSystem::parallel("needs_counter", move |_: &World| {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .reads_resource::<Counter>(),
        );
        let mut schedule = initialized(
            plan(vec![needs_counter, recording("after", &log)]),
            &mut world,
        );
        let mut executor = SingleThreadedExecutor::new();
        executor.init(&schedule);

        // When
        executor.run(&mut schedule, &mut world, None);
        world.insert_resource(Counter(0));
        executor.run(&mut schedule, &mut world, None);

        // Then
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(*log.lock().unwrap(), vec!["after", "after"]);
    }

    #[test]
    fn sync_point_applies_earlier_deferred_mutations() {
        // Given increment, sync, reader
        let mut world = World::new(WorldId::new(1));
        let seen = Arc::new(Mutex::new(None));
        let observed = Arc::clone(&seen);
        let reader: BoxedSystem = Box::new(FunctionSystem::parallel("reader", move |world: &World| {
            *observed.lock().unwrap() = world.resource::<Counter>().map(|c| c.0);
        }));
        let mut schedule = initialized(
            plan(vec![deferred_increment(), Box::new(ApplyDeferred), reader]),
            &mut world,
        );
        let mut executor = SingleThreadedExecutor::new();
        executor.init(&schedule);

        // When
        executor.run(&mut schedule, &mut world, None);

        // Then
        assert_eq!(*seen.lock().unwrap(), Some(1));
        assert!(executor.unapplied_systems().is_clear());
    }

    #[test]
    fn deferred_state_straddles_runs_without_final_flush() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let mut schedule = initialized(plan(vec![deferred_increment()]), &mut world);
        let mut executor = SingleThreadedExecutor::new();
        executor.set_apply_final_deferred(false);
        executor.init(&schedule);

        // When
        executor.run(&mut schedule, &mut world, None);

        // Then the mutation is still pending after the run
        assert_eq!(world.resource::<Counter>(), None);
        assert_eq!(executor.unapplied_systems().ones().collect::<Vec<_>>(), vec![0]);

        // When a second run happens before any flush, both runs' commands are pending
        executor.run(&mut schedule, &mut world, None);
        assert_eq!(world.resource::<Counter>(), None);

        // Then an explicit flush applies both
        executor.apply_deferred(&mut schedule, &mut world);
        assert_eq!(world.resource::<Counter>(), Some(&Counter(2)));
        assert!(executor.unapplied_systems().is_clear());

        // And re-enabling the final flush drains pending state at the end of the next run
        executor.run(&mut schedule, &mut world, None);
        executor.set_apply_final_deferred(true);
        executor.run(&mut schedule, &mut world, None);
        assert_eq!(world.resource::<Counter>(), Some(&Counter(4)));
    }

    #[test]
    fn exclusive_systems_apply_their_own_mutations() {
        // Given
        let mut world = World::new(WorldId::new(1));
        let exclusive: BoxedSystem = Box::new(FunctionSystem::exclusive(
            "exclusive",
            |world: &mut World| world.insert_resource(Counter(9)),
        ));
        let mut schedule = initialized(plan(vec![exclusive]), &mut world);
        let mut executor = SingleThreadedExecutor::new();
        executor.set_apply_final_deferred(false);
        executor.init(&schedule);

        // When
        executor.run(&mut schedule, &mut world, None);

        // Then
        assert_eq!(world.resource::<Counter>(), Some(&Counter(9)));
        assert!(executor.unapplied_systems().is_clear());
        assert_eq!(executor.kind(), ExecutorKind::SingleThreaded);
    }

    #[test]
    fn panics_are_resumed_and_the_next_run_starts_fresh() {
        // Given a system that panics only on its first call, after a recording system
        let mut world = World::new(WorldId::new(1));
        let log = Log::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let flaky: BoxedSystem = {
            let calls = Arc::clone(&calls);
            Box::new(FunctionSystem::parallel("flaky", move |_: &World| {
                if calls.fetch_add(1, Ordering::Relaxed) == 0 {
                    panic!("boom");
                }
            }))
        };
        let mut schedule = initialized(plan(vec![recording("a", &log), flaky]), &mut world);
        let mut executor = SingleThreadedExecutor::new();
        executor.init(&schedule);

        // When
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            executor.run(&mut schedule, &mut world, None);
        }));
        executor.run(&mut schedule, &mut world, None);

        // Then
        assert!(result.is_err());
        assert_eq!(*log.lock().unwrap(), vec!["a", "a"]);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }
}
