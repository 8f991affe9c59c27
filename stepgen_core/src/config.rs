//! Runtime configuration for one axis.
//!
//! These are the structs the builder consumes. The TOML schema lives in
//! `stepgen_config`; `conversions` maps one onto the other.

use std::time::Duration;

use crate::fixed_point::DEFAULT_FRACTIONAL_BITS;
use crate::state::{DEFAULT_MAX_POSITION, DEFAULT_MIN_POSITION};

/// Default engine tick rate.
pub const DEFAULT_TICK_HZ: u32 = 2_000;
/// Default direction-line settle delay.
pub const DEFAULT_DIRECTION_SETTLE: Duration = Duration::from_millis(1);

/// Kinematic limits and timing for one axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionCfg {
    /// Engine tick rate the rate limits are converted against.
    pub tick_hz: u32,
    /// Fractional bits of the Q-format (1..=16).
    pub fractional_bits: u8,
    /// Velocity cap in counts/s.
    pub max_velocity: u32,
    /// Acceleration cap in counts/s².
    pub max_acceleration: u32,
    /// Delay between driving the direction line and releasing the move.
    pub direction_settle: Duration,
    /// Per-tick cap for fast moves; `None` commits them in one tick.
    pub fast_move_max_steps_per_tick: Option<u32>,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            tick_hz: DEFAULT_TICK_HZ,
            fractional_bits: DEFAULT_FRACTIONAL_BITS,
            max_velocity: 20_000,
            max_acceleration: 200_000,
            direction_settle: DEFAULT_DIRECTION_SETTLE,
            fast_move_max_steps_per_tick: None,
        }
    }
}

/// Absolute bounds for the bounded-distance stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionLimits {
    pub min: i64,
    pub max: i64,
}

impl Default for PositionLimits {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_POSITION,
            max: DEFAULT_MAX_POSITION,
        }
    }
}
