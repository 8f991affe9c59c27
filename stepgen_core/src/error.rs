use thiserror::Error;

/// Reasons a move or stop command is refused. Nothing is queued; the caller
/// polls `is_idle()` and resubmits.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("a move is already pending")]
    Busy,
    #[error("velocity and acceleration limits are not configured")]
    NotConfigured,
    #[error("move of {requested} counts exceeds the 2000000 count ceiling")]
    TooLong { requested: u64 },
    #[error("no profiled move in flight")]
    NotMoving,
}

/// Configuration-time validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("velocity limit quantizes to zero at this tick rate")]
    ZeroVelocity,
    #[error("acceleration limit quantizes to zero at this tick rate")]
    ZeroAcceleration,
    #[error("fractional bits must be in 1..=16, got {0}")]
    FractionalBits(u8),
    #[error("tick rate must be > 0")]
    ZeroTickRate,
    #[error("position limits inverted: min {min} > max {max}")]
    InvertedLimits { min: i64, max: i64 },
    #[error("step port holds at most {0} axes")]
    TooManyAxes(usize),
    #[error("port bit {0} is out of range or already taken")]
    PortBit(u8),
    #[error("missing {0}")]
    Missing(&'static str),
}

#[derive(Debug, Error, Clone)]
pub enum StepgenError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for move to finish")]
    Timeout,
    #[error("move rejected: {0}")]
    Move(#[from] MoveError),
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("aborted by shutdown request")]
    Aborted,
}

/// Defaults to an eyre report; pure state operations name their typed error.
pub type Result<T, E = Report> = eyre::Result<T, E>;
pub use eyre::Report;
