//! Change ticks.
//!
//! A [`Tick`] is a wrapping `u32` stamped on resources when they change and on systems when they
//! run. Comparing two ticks only makes sense relative to a third, the current tick, because the
//! counter wraps. Ticks older than [`MAX_CHANGE_AGE`] are clamped periodically so that a very old
//! tick is never mistaken for a very new one after wrapping.

/// Number of change ticks between two passes that clamp stale ticks.
pub const CHECK_TICK_THRESHOLD: u32 = 518_400_000;

/// Maximum age a tick may reach before it is clamped.
///
/// Ticks are checked every [`CHECK_TICK_THRESHOLD`] ticks, so a tick can be up to
/// `MAX_CHANGE_AGE + CHECK_TICK_THRESHOLD` old before being clamped, which still fits in `u32`.
pub const MAX_CHANGE_AGE: u32 = u32::MAX - (2 * CHECK_TICK_THRESHOLD - 1);

/// A point in the change history of a world.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tick {
    tick: u32,
}

impl Tick {
    /// The oldest representable tick relative to the current one.
    pub const MAX: Self = Self::new(MAX_CHANGE_AGE);

    /// Construct a tick from a raw value.
    #[inline]
    pub const fn new(tick: u32) -> Self {
        Self { tick }
    }

    /// The raw value.
    #[inline]
    pub const fn get(self) -> u32 {
        self.tick
    }

    /// Overwrite the raw value.
    #[inline]
    pub fn set(&mut self, tick: u32) {
        self.tick = tick;
    }

    /// Whether this tick happened after `last_run`, as seen from `this_run`.
    #[inline]
    pub fn is_newer_than(self, last_run: Tick, this_run: Tick) -> bool {
        let ticks_since_insert = this_run.relative_to(self).tick.min(MAX_CHANGE_AGE);
        let ticks_since_system = this_run.relative_to(last_run).tick.min(MAX_CHANGE_AGE);
        ticks_since_system > ticks_since_insert
    }

    /// Wrapping difference `self - other`.
    #[inline]
    pub fn relative_to(self, other: Self) -> Self {
        Self {
            tick: self.tick.wrapping_sub(other.tick),
        }
    }

    /// Clamp this tick if it is older than [`MAX_CHANGE_AGE`] relative to `tick`.
    ///
    /// Returns whether the tick was clamped.
    #[inline]
    pub fn check_tick(&mut self, tick: Tick) -> bool {
        let age = tick.relative_to(*self);
        if age.get() > Self::MAX.get() {
            *self = tick.relative_to(Self::MAX);
            true
        } else {
            false
        }
    }
}
