pub mod clock;

pub use clock::{Clock, MonotonicClock, TestClock};

/// Boxed error crossing the hardware trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Discrete lines of a single actuator: direction, enable and the
/// HLFB-style feedback input.
pub trait ActuatorPins {
    /// Assert the direction line. `true` is the positive sense.
    fn set_direction(&mut self, positive: bool) -> Result<(), BoxError>;
    fn set_enabled(&mut self, enabled: bool) -> Result<(), BoxError>;
    /// Feedback line level, already corrected for active-low wiring.
    /// Implementations without a feedback line return `Ok(false)`.
    fn read_feedback(&mut self) -> Result<bool, BoxError>;
}

/// Step output shared by several actuators (one bit per actuator).
pub trait StepEmitter {
    /// Emit one step pulse on every line whose bit is set in `mask`.
    fn pulse(&mut self, mask: u8) -> Result<(), BoxError>;
}

impl<T: ActuatorPins + ?Sized> ActuatorPins for Box<T> {
    fn set_direction(&mut self, positive: bool) -> Result<(), BoxError> {
        (**self).set_direction(positive)
    }
    fn set_enabled(&mut self, enabled: bool) -> Result<(), BoxError> {
        (**self).set_enabled(enabled)
    }
    fn read_feedback(&mut self) -> Result<bool, BoxError> {
        (**self).read_feedback()
    }
}

impl<T: StepEmitter + ?Sized> StepEmitter for Box<T> {
    fn pulse(&mut self, mask: u8) -> Result<(), BoxError> {
        (**self).pulse(mask)
    }
}
