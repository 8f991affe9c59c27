//! Type-state builder for [`Axis`] and the generic `build_axis` constructor.
//!
//! `build()` is only available once pins and motion limits are provided.
//! `try_build()` is always available and reports what is missing.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use stepgen_traits::{ActuatorPins, Clock, MonotonicClock};

use crate::config::{MotionCfg, PositionLimits};
use crate::controller::Axis;
use crate::error::{ConfigError, Result};
use crate::fixed_point::QFormat;
use crate::state::ProfileState;

/// Axis with boxed pins, as produced by [`AxisBuilder`].
pub type DynAxis = Axis<Box<dyn ActuatorPins + Send>>;

pub struct Missing;
pub struct Set;

pub struct AxisBuilder<P, M> {
    name: Option<String>,
    pins: Option<Box<dyn ActuatorPins + Send>>,
    motion: Option<MotionCfg>,
    limits: Option<PositionLimits>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _p: PhantomData<P>,
    _m: PhantomData<M>,
}

impl Default for AxisBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            name: None,
            pins: None,
            motion: None,
            limits: None,
            clock: None,
            _p: PhantomData,
            _m: PhantomData,
        }
    }
}

impl DynAxis {
    pub fn builder() -> AxisBuilder<Missing, Missing> {
        AxisBuilder::default()
    }
}

/// Validate configuration and assemble an axis.
///
/// Single source of truth for validation, shared by `AxisBuilder::try_build`
/// and `build_axis`.
fn validate_and_build<P: ActuatorPins>(
    name: String,
    pins: P,
    motion: &MotionCfg,
    limits: PositionLimits,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<Axis<P>> {
    if motion.tick_hz == 0 {
        return Err(ConfigError::ZeroTickRate.into());
    }
    let q = QFormat::new(motion.fractional_bits)?;

    let mut state = ProfileState::new(q);
    state.set_max_velocity(motion.max_velocity, motion.tick_hz)?;
    state.set_max_accel(motion.max_acceleration, motion.tick_hz)?;
    state.set_position_limits(limits.min, limits.max)?;
    state.set_fast_move_cap(motion.fast_move_max_steps_per_tick);

    let clock = clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));

    tracing::debug!(
        axis = %name,
        tick_hz = motion.tick_hz,
        bits = q.bits(),
        velocity_q = state.velocity_limit(),
        accel_q = state.accel_limit(),
        "axis configured"
    );

    Ok(Axis::from_parts(
        name,
        pins,
        state,
        clock,
        motion.direction_settle,
        motion.tick_hz,
    ))
}

impl<P, M> AxisBuilder<P, M> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<DynAxis> {
        let pins = self.pins.ok_or(ConfigError::Missing("actuator pins"))?;
        let motion = self.motion.ok_or(ConfigError::Missing("motion limits"))?;
        validate_and_build(
            self.name.unwrap_or_else(|| "axis".to_owned()),
            pins,
            &motion,
            self.limits.unwrap_or_default(),
            self.clock,
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_position_limits(mut self, limits: PositionLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Override only the direction settle delay of the motion config.
    pub fn with_direction_settle(mut self, settle: Duration) -> Self {
        if let Some(m) = self.motion.as_mut() {
            m.direction_settle = settle;
        } else {
            self.motion = Some(MotionCfg {
                direction_settle: settle,
                ..MotionCfg::default()
            });
        }
        self
    }
}

impl<M> AxisBuilder<Missing, M> {
    pub fn with_pins(self, pins: impl ActuatorPins + Send + 'static) -> AxisBuilder<Set, M> {
        AxisBuilder {
            name: self.name,
            pins: Some(Box::new(pins)),
            motion: self.motion,
            limits: self.limits,
            clock: self.clock,
            _p: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<P> AxisBuilder<P, Missing> {
    pub fn with_motion(self, motion: MotionCfg) -> AxisBuilder<P, Set> {
        AxisBuilder {
            name: self.name,
            pins: self.pins,
            motion: Some(match self.motion {
                // keep a settle delay set before the motion block
                Some(prev) => MotionCfg {
                    direction_settle: prev.direction_settle,
                    ..motion
                },
                None => motion,
            }),
            limits: self.limits,
            clock: self.clock,
            _p: PhantomData,
            _m: PhantomData,
        }
    }
}

impl AxisBuilder<Set, Set> {
    pub fn build(self) -> Result<DynAxis> {
        self.try_build()
    }
}

/// Statically-dispatched constructor for concrete pin types.
pub fn build_axis<P: ActuatorPins>(
    name: impl Into<String>,
    pins: P,
    motion: &MotionCfg,
    limits: PositionLimits,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<Axis<P>> {
    validate_and_build(name.into(), pins, motion, limits, clock)
}
