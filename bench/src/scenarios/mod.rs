//! Schedule shapes used by the benchmarks.
//!
//! - **Chain**: one long `before`/`after` chain, the worst case for transitive reduction
//! - **Wide**: layers of unordered systems with random data access, stressing conflict
//!   detection
//! - **Nested**: deep set hierarchies with conditions on every level, stressing set flattening
//!   and condition gating

pub mod chain;
pub mod nested;
pub mod wide;

pub use chain::ChainScenario;
pub use nested::NestedScenario;
pub use wide::WideScenario;

use rusty_schedule::ecs::{
    Schedule, World, WorldId,
    schedule::{ScheduleBuildError, ScheduleLabel},
};

/// Label of every benchmark schedule.
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bench;

/// Common trait for benchmark scenarios.
pub trait Scenario {
    /// Human-readable name of the scenario.
    fn name(&self) -> &'static str;

    /// Brief description of what this scenario tests.
    fn description(&self) -> &'static str;

    /// Number of systems the scenario registers.
    fn system_count(&self) -> usize;

    /// Register the scenario's systems and sets.
    fn populate(&self, schedule: &mut Schedule) -> Result<(), ScheduleBuildError>;

    /// A fresh world and a populated, unbuilt schedule.
    fn setup(&self) -> Result<(World, Schedule), ScheduleBuildError> {
        let world = World::new(WorldId::new(0));
        let mut schedule = Schedule::new(Bench);
        self.populate(&mut schedule)?;
        Ok((world, schedule))
    }
}
