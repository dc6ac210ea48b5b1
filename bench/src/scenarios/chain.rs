//! A single chain of systems.

use rusty_schedule::ecs::{
    FunctionSystem, IntoNodeConfigs, Schedule, SystemSet, World, schedule::ScheduleBuildError,
};

use crate::{components::Position, scenarios::Scenario};

/// One set per link, so each system can be ordered after the previous one by label.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Link(usize);

/// `length` systems, each ordered after the previous one.
#[derive(Debug, Clone, Copy)]
pub struct ChainScenario {
    pub length: usize,
}

impl ChainScenario {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Scenario for ChainScenario {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn description(&self) -> &'static str {
        "one before/after chain writing a shared component"
    }

    fn system_count(&self) -> usize {
        self.length
    }

    fn populate(&self, schedule: &mut Schedule) -> Result<(), ScheduleBuildError> {
        for i in 0..self.length {
            let system = FunctionSystem::parallel(format!("step_{i}"), |_: &World| {})
                .writes::<Position>()
                .in_set(Link(i));
            match i.checked_sub(1) {
                Some(previous) => schedule.add_systems(system.after(Link(previous)))?,
                None => schedule.add_systems(system)?,
            };
        }
        Ok(())
    }
}
