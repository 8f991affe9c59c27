//! Q-format fixed-point model for the motion profile.
//!
//! Position, velocity (per tick) and acceleration (per tick²) share one
//! scale: an `i64` holding the real value times `2^F`. Scaling is done with
//! shifts only. Converting back to whole counts is an arithmetic right shift;
//! profile quantities live in the move frame and are non-negative, so the
//! shift truncates toward zero. The lost fraction is carried by the step
//! accumulator in the engine, never rounded away here.

use crate::error::ConfigError;

/// Default number of fractional bits (F).
pub const DEFAULT_FRACTIONAL_BITS: u8 = 10;
/// Largest supported F. Keeps `velocity²` inside `i64` for any clamped rate.
pub const MAX_FRACTIONAL_BITS: u8 = 16;
/// Ceiling on per-tick travel and per-tick² acceleration, in whole counts.
pub const MAX_STEPS_PER_TICK: i64 = 50;

/// Fixed-point format descriptor: how many fractional bits a scaled value carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QFormat {
    bits: u8,
}

impl Default for QFormat {
    fn default() -> Self {
        Self {
            bits: DEFAULT_FRACTIONAL_BITS,
        }
    }
}

impl QFormat {
    pub fn new(bits: u8) -> Result<Self, ConfigError> {
        if bits == 0 || bits > MAX_FRACTIONAL_BITS {
            return Err(ConfigError::FractionalBits(bits));
        }
        Ok(Self { bits })
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.bits
    }

    /// One whole count in scaled units.
    #[inline]
    pub const fn one(self) -> i64 {
        1 << self.bits
    }

    #[inline]
    pub const fn to_scaled(self, counts: i64) -> i64 {
        counts << self.bits
    }

    #[inline]
    pub const fn to_counts(self, scaled: i64) -> i64 {
        scaled >> self.bits
    }

    /// Largest representable per-tick rate (`MAX_STEPS_PER_TICK` counts).
    #[inline]
    pub const fn max_rate(self) -> i64 {
        MAX_STEPS_PER_TICK << self.bits
    }

    /// Convert counts/s at `tick_hz` into scaled units per tick, clamped to
    /// [`QFormat::max_rate`]. A zero tick rate is treated as 1 Hz.
    pub fn velocity_per_tick(self, counts_per_sec: u32, tick_hz: u32) -> i64 {
        let hz = i64::from(tick_hz.max(1));
        let q = self.to_scaled(i64::from(counts_per_sec)) / hz;
        q.min(self.max_rate())
    }

    /// Convert counts/s² at `tick_hz` into scaled units per tick², clamped
    /// to [`QFormat::max_rate`].
    pub fn accel_per_tick2(self, counts_per_sec2: u32, tick_hz: u32) -> i64 {
        let hz = i64::from(tick_hz.max(1));
        let q = self.to_scaled(i64::from(counts_per_sec2)) / (hz * hz);
        q.min(self.max_rate())
    }
}

/// Deceleration that brings `velocity` to rest over `distance` (both
/// scaled): `-(v²) / (2d)`, never weaker than -1 scaled unit so a stop
/// always makes progress.
#[inline]
pub fn stopping_accel(velocity: i64, distance: i64) -> i64 {
    debug_assert!(distance > 0, "stopping distance must be positive");
    let v2 = velocity.saturating_mul(velocity);
    let a = -(v2 / distance.saturating_mul(2).max(1));
    a.min(-1)
}

/// True when both values are nonzero and point the same way.
#[inline]
pub fn same_sign(a: i64, b: i64) -> bool {
    (a > 0 && b > 0) || (a < 0 && b < 0)
}
