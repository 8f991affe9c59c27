//! Command acceptance: move, fast move, cancel and bounded stop.
//!
//! The pure operations live on [`ProfileState`] so they can be driven from a
//! test without pins or clocks. [`Axis`] wraps them with pin signaling and
//! the direction settle delay, and shares the state with the tick context
//! through a [`ProfileCell`].

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use critical_section::Mutex;
use eyre::WrapErr;
use stepgen_traits::{ActuatorPins, Clock};

use crate::error::{MoveError, Result, StepgenError};
use crate::fixed_point::QFormat;
use crate::hw_error::map_boxed;
use crate::state::{MAX_MOVE_COUNTS, Phase, ProfileSnapshot, ProfileState};

impl ProfileState {
    /// Check a move request without storing it. Returns the magnitude in
    /// counts; 0 means there is nothing to do.
    pub fn validate_move(&self, distance: i64) -> Result<u32, MoveError> {
        if self.pending_command != 0 {
            return Err(MoveError::Busy);
        }
        if !self.is_configured() {
            return Err(MoveError::NotConfigured);
        }
        let requested = distance.unsigned_abs();
        if requested > MAX_MOVE_COUNTS {
            return Err(MoveError::TooLong { requested });
        }
        u32::try_from(requested).map_err(|_| MoveError::TooLong { requested })
    }

    /// Store an ordinary profiled move. The engine picks it up on its next
    /// Idle tick.
    pub fn accept_move(&mut self, distance: i64) -> Result<(), MoveError> {
        let magnitude = self.validate_move(distance)?;
        if magnitude == 0 {
            return Ok(());
        }
        self.direction = distance >= 0;
        self.pending_command = magnitude;
        Ok(())
    }

    /// Store a move that skips the ramp entirely.
    pub fn accept_unbounded_move(&mut self, distance: i64) -> Result<(), MoveError> {
        let magnitude = self.validate_move(distance)?;
        if magnitude == 0 {
            return Ok(());
        }
        self.reset_motion();
        self.direction = distance >= 0;
        self.pending_command = magnitude;
        self.phase = Phase::FastMove;
        Ok(())
    }

    /// Abrupt stop: drop all in-flight motion and the pending command.
    pub fn cancel(&mut self) {
        self.reset_motion();
        self.accel_ref_signed = 0;
        self.pending_command = 0;
        self.phase = Phase::Idle;
    }

    /// Request a controlled stop within `distance` counts of the current
    /// position, clipped to the position limits on the next ticks.
    pub fn begin_bounded_stop(&mut self, distance: u32) -> Result<(), MoveError> {
        if self.pending_command == 0 || self.phase == Phase::FastMove {
            return Err(MoveError::NotMoving);
        }
        self.decel_target_distance = distance;
        self.half_point_armed = false;
        self.phase = Phase::DecelSetup;
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.pending_command == 0
    }

    /// Absolute position in counts since the last enable.
    pub fn current_position(&self) -> i64 {
        self.absolute_position
    }

    pub fn enable(&mut self) {
        self.absolute_position = 0;
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.cancel();
        self.enabled = false;
    }
}

/// Profile state shared between the command context and the tick context.
///
/// Every access runs inside `critical_section::with`, so the engine never
/// observes a half-applied command.
pub struct ProfileCell {
    inner: Mutex<RefCell<ProfileState>>,
}

impl ProfileCell {
    pub fn new(state: ProfileState) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(state)),
        }
    }

    /// Run `f` on the state with interrupts (or the host lock) held.
    pub fn with<R>(&self, f: impl FnOnce(&mut ProfileState) -> R) -> R {
        critical_section::with(|cs| {
            let mut state = self.inner.borrow_ref_mut(cs);
            f(&mut *state)
        })
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        self.with(|s| s.snapshot())
    }

    /// One engine tick. Returns the burst with the phase before and after.
    pub fn tick(&self) -> (i32, Phase, Phase) {
        self.with(|s| {
            let before = s.phase;
            let burst = s.calc_steps();
            (burst, before, s.phase)
        })
    }

    pub fn is_idle(&self) -> bool {
        self.with(|s| s.is_idle())
    }
}

/// One actuator: its pins, its settle delay and its share of the profile.
///
/// Mutating methods take `&mut self`, so command acceptance has a single
/// owner and the check-then-store in [`Axis::move_by`] cannot race another
/// acceptance.
pub struct Axis<P: ActuatorPins> {
    name: String,
    pins: P,
    profile: Arc<ProfileCell>,
    clock: Arc<dyn Clock + Send + Sync>,
    settle: Duration,
    tick_hz: u32,
}

impl<P: ActuatorPins> std::fmt::Debug for Axis<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Axis")
            .field("name", &self.name)
            .field("settle", &self.settle)
            .field("tick_hz", &self.tick_hz)
            .field("profile", &self.profile.snapshot())
            .finish_non_exhaustive()
    }
}

impl<P: ActuatorPins> Axis<P> {
    pub(crate) fn from_parts(
        name: String,
        pins: P,
        state: ProfileState,
        clock: Arc<dyn Clock + Send + Sync>,
        settle: Duration,
        tick_hz: u32,
    ) -> Self {
        Self {
            name,
            pins,
            profile: Arc::new(ProfileCell::new(state)),
            clock,
            settle,
            tick_hz,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tick_hz(&self) -> u32 {
        self.tick_hz
    }

    pub fn q_format(&self) -> QFormat {
        self.profile.with(|s| s.q_format())
    }

    /// Shared handle for a [`crate::TickScheduler`].
    pub fn profile(&self) -> Arc<ProfileCell> {
        Arc::clone(&self.profile)
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        self.profile.snapshot()
    }

    /// Assert the enable line and zero the absolute position.
    pub fn enable(&mut self) -> Result<()> {
        self.pins
            .set_enabled(true)
            .map_err(|e| map_boxed(&e))
            .wrap_err("asserting enable line")?;
        self.profile.with(ProfileState::enable);
        tracing::debug!(axis = %self.name, "axis enabled");
        Ok(())
    }

    /// Cancel any motion and deassert the enable line. The profile is
    /// stopped even when the pin write fails.
    pub fn disable(&mut self) -> Result<()> {
        self.profile.with(ProfileState::disable);
        if let Err(e) = self.pins.set_enabled(false) {
            let mapped = map_boxed(&e);
            tracing::warn!(axis = %self.name, error = %mapped, "failed to deassert enable line");
            return Err(mapped).wrap_err("deasserting enable line");
        }
        tracing::debug!(axis = %self.name, "axis disabled");
        Ok(())
    }

    /// Queue an ordinary profiled move of `distance` counts (sign gives the
    /// direction). The direction line is driven and allowed to settle
    /// before the command becomes visible to the engine.
    pub fn move_by(&mut self, distance: i64) -> Result<()> {
        let magnitude = self
            .profile
            .with(|s| s.validate_move(distance))
            .map_err(StepgenError::from)?;
        if magnitude == 0 {
            return Ok(());
        }
        self.drive_direction(distance >= 0)?;
        self.clock.sleep(self.settle);
        self.profile
            .with(|s| s.accept_move(distance))
            .map_err(StepgenError::from)?;
        tracing::debug!(axis = %self.name, distance, "move accepted");
        Ok(())
    }

    /// Queue a move that is committed without a ramp. No settle delay.
    pub fn move_fast(&mut self, distance: i64) -> Result<()> {
        let magnitude = self
            .profile
            .with(|s| s.validate_move(distance))
            .map_err(StepgenError::from)?;
        if magnitude == 0 {
            return Ok(());
        }
        self.drive_direction(distance >= 0)?;
        self.profile
            .with(|s| s.accept_unbounded_move(distance))
            .map_err(StepgenError::from)?;
        tracing::debug!(axis = %self.name, distance, "fast move accepted");
        Ok(())
    }

    /// Abrupt stop. Always succeeds.
    pub fn stop_move(&mut self) {
        self.profile.with(ProfileState::cancel);
        tracing::debug!(axis = %self.name, "move cancelled");
    }

    /// Controlled stop within `distance` counts, never past the position
    /// limits.
    pub fn decelerate_stop_over(&mut self, distance: u32) -> Result<()> {
        self.profile
            .with(|s| s.begin_bounded_stop(distance))
            .map_err(StepgenError::from)?;
        tracing::debug!(axis = %self.name, distance, "bounded stop requested");
        Ok(())
    }

    pub fn is_idle(&self) -> bool {
        self.profile.is_idle()
    }

    pub fn commanded_position(&self) -> i64 {
        self.profile.with(|s| s.current_position())
    }

    pub fn direction(&self) -> bool {
        self.profile.with(|s| s.direction())
    }

    pub fn read_feedback(&mut self) -> Result<bool> {
        let level = self
            .pins
            .read_feedback()
            .map_err(|e| map_boxed(&e))
            .wrap_err("reading feedback line")?;
        Ok(level)
    }

    pub fn set_max_velocity(&mut self, counts_per_sec: u32) -> Result<()> {
        let hz = self.tick_hz;
        self.profile
            .with(|s| s.set_max_velocity(counts_per_sec, hz))
            .map_err(StepgenError::from)?;
        Ok(())
    }

    pub fn set_max_acceleration(&mut self, counts_per_sec2: u32) -> Result<()> {
        let hz = self.tick_hz;
        self.profile
            .with(|s| s.set_max_accel(counts_per_sec2, hz))
            .map_err(StepgenError::from)?;
        Ok(())
    }

    pub fn set_position_limits(&mut self, min: i64, max: i64) -> Result<()> {
        self.profile
            .with(|s| s.set_position_limits(min, max))
            .map_err(StepgenError::from)?;
        Ok(())
    }

    fn drive_direction(&mut self, positive: bool) -> Result<()> {
        self.pins
            .set_direction(positive)
            .map_err(|e| map_boxed(&e))
            .wrap_err("driving direction line")
    }
}
