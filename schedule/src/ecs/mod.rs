pub mod access;
pub mod component;
pub mod graph;
pub mod schedule;
pub mod system;
pub(crate) mod util;
pub mod world;

pub use component::{Component, ComponentId, Resource};
pub use schedule::{IntoNodeConfigs, Schedule, ScheduleLabel, Schedules, SystemSet};
pub use system::{ApplyDeferred, Commands, FunctionSystem, System};
pub use world::{World, WorldId};
