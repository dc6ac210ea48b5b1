//! Component and resource types the benchmark systems declare access to.

use rusty_schedule::ecs::{Component, Resource};

/// 3D position component.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 3D velocity component.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Health points.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Health(pub f32);

/// Frame counter advanced by deferred systems.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct FrameCount(pub u64);

/// Simulation clock.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct Time {
    pub delta: f32,
    pub elapsed: f64,
}
