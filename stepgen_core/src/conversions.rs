//! `From` implementations bridging `stepgen_config` types to core types.

use std::time::Duration;

use crate::config::{MotionCfg, PositionLimits};
use crate::runner::DriveMode;

impl MotionCfg {
    /// Motion config for one `[[axis]]` at the workspace tick rate.
    pub fn from_axis(c: &stepgen_config::MotionCfg, tick_hz: u32) -> Self {
        Self {
            tick_hz,
            fractional_bits: c.fractional_bits,
            max_velocity: c.max_velocity,
            max_acceleration: c.max_acceleration,
            direction_settle: Duration::from_micros(c.direction_settle_us),
            fast_move_max_steps_per_tick: c.fast_move_max_steps_per_tick,
        }
    }
}

impl From<&stepgen_config::Limits> for PositionLimits {
    fn from(c: &stepgen_config::Limits) -> Self {
        Self {
            min: c.min_position,
            max: c.max_position,
        }
    }
}

impl DriveMode {
    pub fn from_config(mode: stepgen_config::RunMode, tick_hz: u32) -> Self {
        match mode {
            stepgen_config::RunMode::Paced => Self::Paced(tick_hz),
            stepgen_config::RunMode::Direct => Self::Direct,
        }
    }
}
