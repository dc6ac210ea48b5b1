//! Deep set hierarchies gated by conditions.

use rusty_schedule::ecs::{
    Commands, FunctionSystem, IntoNodeConfigs, Schedule, SystemSet, World,
    schedule::{ScheduleBuildError, resource_exists},
};

use crate::{
    components::{FrameCount, Time},
    scenarios::Scenario,
};

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Level(usize);

/// The deferred systems of one level.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Writers(usize);

/// `depth` nested sets, each with a condition, and `per_level` systems in every level. Half of
/// the systems buffer a deferred mutation that the other half is ordered after, so every level
/// gets a sync point.
#[derive(Debug, Clone, Copy)]
pub struct NestedScenario {
    pub depth: usize,
    pub per_level: usize,
}

impl NestedScenario {
    pub fn new(depth: usize, per_level: usize) -> Self {
        Self { depth, per_level }
    }
}

impl Scenario for NestedScenario {
    fn name(&self) -> &'static str {
        "nested"
    }

    fn description(&self) -> &'static str {
        "nested condition-gated sets with deferred systems between levels"
    }

    fn system_count(&self) -> usize {
        self.depth * self.per_level
    }

    fn populate(&self, schedule: &mut Schedule) -> Result<(), ScheduleBuildError> {
        for level in 0..self.depth {
            let set = match level.checked_sub(1) {
                Some(parent) => Level(level).in_set(Level(parent)),
                None => Level(level).into_configs(),
            };
            schedule.configure_sets(set.run_if(|world: &World| !world.contains_resource::<Time>()))?;

            for i in 0..self.per_level {
                let name = format!("level_{level}_system_{i}");
                if i % 2 == 0 {
                    let system = FunctionSystem::deferred(name, |_: &World, commands: &mut Commands| {
                        commands.queue(|world: &mut World| {
                            world.get_resource_or_init::<FrameCount>().0 += 1;
                        });
                    });
                    schedule.add_systems(system.in_set(Level(level)).in_set(Writers(level)))?;
                } else {
                    let system = FunctionSystem::parallel(name, |_: &World| {})
                        .run_if(resource_exists::<FrameCount>());
                    schedule.add_systems(system.in_set(Level(level)).after(Writers(level)))?;
                }
            }
        }
        Ok(())
    }
}
