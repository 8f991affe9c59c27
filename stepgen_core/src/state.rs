//! Per-actuator profile state: runtime motion fields plus static limits.
//!
//! Positions are measured in the move frame: the magnitude travelled along
//! the accepted direction, scaled by `2^F`. `direction` says which way that
//! frame points in absolute coordinates.

use crate::error::ConfigError;
use crate::fixed_point::QFormat;

/// Longest accepted move, in counts.
pub const MAX_MOVE_COUNTS: u64 = 2_000_000;

/// Default absolute bounds used by the bounded-distance stop.
pub const DEFAULT_MIN_POSITION: i64 = 0;
pub const DEFAULT_MAX_POSITION: i64 = 54_400;

/// Profile state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Between moves, or waiting to pick up a freshly accepted command.
    #[default]
    Idle,
    /// Accelerating toward the half point; may clamp at the velocity limit.
    RampUp,
    /// Past the half point: constant velocity, then symmetric ramp-down.
    Cruise,
    /// Unshaped move committed in one tick (or capped per tick).
    FastMove,
    /// Bounded stop requested; kinematics computed on the next ticks.
    DecelSetup,
    /// Bounded stop in progress, re-solved against live state every tick.
    DecelRun,
}

#[derive(Debug, Clone)]
pub struct ProfileState {
    pub(crate) q: QFormat,

    pub(crate) enabled: bool,
    pub(crate) direction: bool,
    pub(crate) pending_command: u32,
    pub(crate) phase: Phase,

    pub(crate) move_position: i64,
    pub(crate) target_position: i64,
    pub(crate) half_distance: i64,
    pub(crate) velocity_ref: i64,
    pub(crate) accel_ref: i64,
    pub(crate) accel_ref_signed: i64,

    pub(crate) velocity_limit: i64,
    pub(crate) accel_limit: i64,

    pub(crate) emitted_steps: i64,
    pub(crate) absolute_position: i64,

    pub(crate) tick_now: u32,
    pub(crate) tick_ramp_end: Option<u32>,
    pub(crate) tick_phase2_start: Option<u32>,
    pub(crate) tick_ramp_down_start: u32,
    pub(crate) tick_total: u32,
    pub(crate) half_point_armed: bool,

    pub(crate) min_position: i64,
    pub(crate) max_position: i64,
    pub(crate) decel_target_distance: u32,
    pub(crate) fast_move_step_cap: Option<u32>,
}

impl Default for ProfileState {
    fn default() -> Self {
        Self::new(QFormat::default())
    }
}

impl ProfileState {
    /// Fresh, unconfigured, disabled state. Limits must be set before any
    /// move is accepted.
    pub fn new(q: QFormat) -> Self {
        Self {
            q,
            enabled: false,
            direction: true,
            pending_command: 0,
            phase: Phase::Idle,
            move_position: 0,
            target_position: 0,
            half_distance: 0,
            velocity_ref: 0,
            accel_ref: 0,
            accel_ref_signed: 0,
            velocity_limit: 0,
            accel_limit: 0,
            emitted_steps: 0,
            absolute_position: 0,
            tick_now: 0,
            tick_ramp_end: None,
            tick_phase2_start: None,
            tick_ramp_down_start: 0,
            tick_total: 0,
            half_point_armed: false,
            min_position: DEFAULT_MIN_POSITION,
            max_position: DEFAULT_MAX_POSITION,
            decel_target_distance: 0,
            fast_move_step_cap: None,
        }
    }

    pub fn q_format(&self) -> QFormat {
        self.q
    }

    /// Set velocity (per tick) and acceleration (per tick²) caps in scaled
    /// units. Values above the representable rate are clamped; zero or
    /// negative limits are rejected because no profile could make progress.
    pub fn set_motion_limits(&mut self, velocity: i64, accel: i64) -> Result<(), ConfigError> {
        if velocity <= 0 {
            return Err(ConfigError::ZeroVelocity);
        }
        if accel <= 0 {
            return Err(ConfigError::ZeroAcceleration);
        }
        let max = self.q.max_rate();
        self.velocity_limit = velocity.min(max);
        self.accel_limit = accel.min(max);
        Ok(())
    }

    /// Velocity cap from counts/s at the given tick rate.
    pub fn set_max_velocity(&mut self, counts_per_sec: u32, tick_hz: u32) -> Result<(), ConfigError> {
        if tick_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        let v = self.q.velocity_per_tick(counts_per_sec, tick_hz);
        if v <= 0 {
            return Err(ConfigError::ZeroVelocity);
        }
        self.velocity_limit = v;
        Ok(())
    }

    /// Acceleration cap from counts/s² at the given tick rate.
    pub fn set_max_accel(&mut self, counts_per_sec2: u32, tick_hz: u32) -> Result<(), ConfigError> {
        if tick_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        let a = self.q.accel_per_tick2(counts_per_sec2, tick_hz);
        if a <= 0 {
            return Err(ConfigError::ZeroAcceleration);
        }
        self.accel_limit = a;
        Ok(())
    }

    /// Absolute bounds honoured by the bounded-distance stop only.
    pub fn set_position_limits(&mut self, min: i64, max: i64) -> Result<(), ConfigError> {
        if min > max {
            return Err(ConfigError::InvertedLimits { min, max });
        }
        self.min_position = min;
        self.max_position = max;
        Ok(())
    }

    /// Per-tick cap for fast moves in counts; `None` commits the whole
    /// fast move in a single tick.
    pub fn set_fast_move_cap(&mut self, cap: Option<u32>) {
        self.fast_move_step_cap = cap.filter(|&n| n > 0);
    }

    pub fn is_configured(&self) -> bool {
        self.velocity_limit > 0 && self.accel_limit > 0
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn direction(&self) -> bool {
        self.direction
    }

    pub fn velocity_limit(&self) -> i64 {
        self.velocity_limit
    }

    pub fn accel_limit(&self) -> i64 {
        self.accel_limit
    }

    pub fn position_limits(&self) -> (i64, i64) {
        (self.min_position, self.max_position)
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            phase: self.phase,
            enabled: self.enabled,
            direction: self.direction,
            pending_command: self.pending_command,
            move_position: self.move_position,
            target_position: self.target_position,
            half_distance: self.half_distance,
            velocity_ref: self.velocity_ref,
            accel_ref: self.accel_ref,
            emitted_steps: self.emitted_steps,
            absolute_position: self.absolute_position,
            tick_now: self.tick_now,
            tick_ramp_end: self.tick_ramp_end,
            tick_phase2_start: self.tick_phase2_start,
            tick_ramp_down_start: self.tick_ramp_down_start,
            tick_total: self.tick_total,
        }
    }

    /// Zero every in-flight kinematic, accumulator and timer field.
    pub(crate) fn reset_motion(&mut self) {
        self.move_position = 0;
        self.target_position = 0;
        self.half_distance = 0;
        self.velocity_ref = 0;
        self.accel_ref = 0;
        self.emitted_steps = 0;
        self.tick_now = 0;
        self.tick_ramp_end = None;
        self.tick_phase2_start = None;
        self.tick_ramp_down_start = 0;
        self.tick_total = 0;
        self.half_point_armed = false;
    }
}

/// Copy of the observable profile fields, taken under the critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub phase: Phase,
    pub enabled: bool,
    pub direction: bool,
    pub pending_command: u32,
    pub move_position: i64,
    pub target_position: i64,
    pub half_distance: i64,
    pub velocity_ref: i64,
    pub accel_ref: i64,
    pub emitted_steps: i64,
    pub absolute_position: i64,
    pub tick_now: u32,
    pub tick_ramp_end: Option<u32>,
    pub tick_phase2_start: Option<u32>,
    pub tick_ramp_down_start: u32,
    pub tick_total: u32,
}

impl ProfileSnapshot {
    /// True when every ramp, timer and accumulator field is at rest.
    pub fn is_at_rest(&self) -> bool {
        self.move_position == 0
            && self.velocity_ref == 0
            && self.accel_ref == 0
            && self.emitted_steps == 0
            && self.tick_ramp_end.is_none()
            && self.tick_phase2_start.is_none()
            && self.tick_ramp_down_start == 0
            && self.tick_total == 0
    }
}
