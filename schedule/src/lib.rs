//! Scheduling core for the rusty ECS.
//!
//! The crate turns registered systems, sets and their ordering metadata into a validated,
//! flattened execution plan and runs that plan on a [`World`](ecs::World). See [`ecs::schedule`]
//! for the entry point.

extern crate self as rusty_schedule;

pub mod ecs;
