#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Tick-driven trapezoidal step generator (hardware-agnostic).
//!
//! Given a commanded distance, the engine produces once per tick the number
//! of step pulses to emit so that an actuator accelerates, cruises and
//! decelerates onto the commanded position. Pins and the step port are
//! reached only through `stepgen_traits::ActuatorPins` and
//! `stepgen_traits::StepEmitter`.
//!
//! ## Architecture
//!
//! - **Fixed point**: Q-format scaling, rate conversions (`fixed_point`)
//! - **State**: per-axis profile state and limits (`state`)
//! - **Engine**: the per-tick step, `ProfileState::calc_steps` (`engine`)
//! - **Commands**: move / fast move / cancel / bounded stop, and the
//!   `Axis` handle with pin signaling (`controller`)
//! - **Scheduling**: multi-axis port multiplexing (`scheduler`), a paced
//!   tick thread (`ticker`) and single-move orchestration (`runner`)
//!
//! ## Concurrency
//!
//! The engine runs in the tick context and commands arrive from a normal
//! context. Both touch the state only inside `critical_section::with`
//! through a shared [`ProfileCell`].

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod engine;
pub mod error;
pub mod fixed_point;
pub mod hw_error;
pub mod mocks;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod ticker;
pub mod util;

pub use builder::{AxisBuilder, DynAxis, build_axis};
pub use config::{MotionCfg, PositionLimits};
pub use controller::{Axis, ProfileCell};
pub use engine::DECEL_SAFETY_TICKS;
pub use error::{ConfigError, MoveError, Result, StepgenError};
pub use fixed_point::{QFormat, stopping_accel};
pub use runner::{DriveMode, MoveRequest, StopAfter, run_move};
pub use scheduler::{MAX_AXES, TickReport, TickScheduler};
pub use state::{MAX_MOVE_COUNTS, Phase, ProfileSnapshot, ProfileState};
pub use status::MoveOutcome;
pub use ticker::Ticker;
