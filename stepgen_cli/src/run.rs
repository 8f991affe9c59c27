//! Command execution: config mapping, hardware assembly, moves and checks.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use eyre::{WrapErr, eyre};
use stepgen_config::{AxisCfg, Config};
use stepgen_core::{
    DriveMode, DynAxis, MotionCfg, MoveOutcome, MoveRequest, PositionLimits, StopAfter, run_move,
};
use stepgen_hardware::error::HwError;
use stepgen_hardware::util::wait_for_level;
use stepgen_traits::{ActuatorPins, MonotonicClock, StepEmitter};

use crate::cli::{LAST_TIMEOUT_MS, MoveArgs};
use crate::rt::setup_rt_once;

type Port = Box<dyn StepEmitter + Send>;

fn select_axis(cfg: &Config, index: usize) -> eyre::Result<&AxisCfg> {
    cfg.axis
        .get(index)
        .ok_or_else(|| eyre!("--axis {index} is out of range: config has {} axes", cfg.axis.len()))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_hardware(a: &AxisCfg) -> eyre::Result<(Box<dyn ActuatorPins + Send>, Port)> {
    use stepgen_hardware::gpio::{GpioPins, GpioPort};

    let pins = GpioPins::new(
        a.pins.direction,
        a.pins.enable,
        a.pins.feedback,
        a.pins.feedback_active_low,
    )
    .wrap_err_with(|| format!("open pins for axis '{}'", a.name))?;
    let port = GpioPort::new(&[(a.port_bit, a.pins.step)], Duration::from_micros(2))
        .wrap_err_with(|| format!("open step line for axis '{}'", a.name))?;
    Ok((Box::new(pins), Box::new(port)))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_hardware(a: &AxisCfg) -> eyre::Result<(Box<dyn ActuatorPins + Send>, Port)> {
    // forces the simulated feedback line low so fault paths can be exercised
    const SIM_FAULT_ENV: &str = "STEPGEN_TEST_SIM_FAULT";

    let pins = stepgen_hardware::SimulatedPins::new();
    if std::env::var_os(SIM_FAULT_ENV).is_some() {
        pins.set_fault(true);
    }
    tracing::debug!(axis = %a.name, "using simulated pins and port");
    Ok((Box::new(pins), Box::new(stepgen_hardware::SimulatedPort::new())))
}

/// Build an axis and the port its single-axis run pulses.
pub fn build_axis(cfg: &Config, a: &AxisCfg) -> eyre::Result<(DynAxis, Port)> {
    let (pins, port) = open_hardware(a)?;
    let axis = DynAxis::builder()
        .with_name(a.name.clone())
        .with_pins(pins)
        .with_motion(MotionCfg::from_axis(&a.motion, cfg.timing.tick_hz))
        .with_position_limits(PositionLimits::from(&a.limits))
        .build()
        .wrap_err_with(|| format!("building axis '{}'", a.name))?;
    Ok((axis, port))
}

/// Run one move on the selected axis and disable it afterwards, also on
/// failure.
pub fn run_move_cmd(
    cfg: &Config,
    args: &MoveArgs,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<MoveOutcome> {
    setup_rt_once(args.rt);

    let a = select_axis(cfg, args.axis)?;
    let (mut axis, port) = build_axis(cfg, a)?;

    let timeout_ms = args.timeout_ms.unwrap_or(cfg.runner.move_timeout_ms);
    let _ = LAST_TIMEOUT_MS.set(timeout_ms);
    let req = MoveRequest {
        fast: args.fast,
        port_bit: a.port_bit,
        stop_after: args
            .stop_after_ticks
            .zip(args.stop_distance)
            .map(|(ticks, distance)| StopAfter { ticks, distance }),
        timeout: Duration::from_millis(timeout_ms),
        abort: Some(shutdown),
        ..MoveRequest::new(args.distance)
    };
    let mode = if args.direct {
        DriveMode::Direct
    } else {
        DriveMode::from_config(cfg.runner.mode, cfg.timing.tick_hz)
    };

    axis.enable()?;
    let result = run_move(&mut axis, port, &req, mode, MonotonicClock::new())
        .wrap_err_with(|| format!("moving axis '{}' by {}", a.name, args.distance));
    if let Err(e) = axis.disable() {
        tracing::warn!(axis = %a.name, error = %format!("{e:#}"), "disable after move failed");
    }
    result
}

/// Enable each axis, wait for its feedback line where one is wired, then
/// disable it again. Returns the names of the axes checked.
pub fn self_check(cfg: &Config) -> eyre::Result<Vec<String>> {
    let timeout = Duration::from_millis(cfg.hardware.feedback_timeout_ms);
    let mut checked = Vec::with_capacity(cfg.axis.len());
    for a in &cfg.axis {
        let (mut axis, _port) = build_axis(cfg, a)?;
        axis.enable()?;
        let ready = if a.pins.feedback.is_some() {
            wait_for_level(
                || {
                    axis.read_feedback()
                        .map_err(|e| HwError::Gpio(format!("{e:#}")))
                },
                true,
                timeout,
                Duration::from_millis(1),
            )
        } else {
            Ok(())
        };
        let disabled = axis.disable();
        ready.wrap_err_with(|| format!("axis '{}' feedback did not assert", a.name))?;
        disabled?;
        tracing::info!(axis = %a.name, feedback = a.pins.feedback.is_some(), "axis ok");
        checked.push(a.name.clone());
    }
    Ok(checked)
}

/// Print tick statistics to stderr.
pub fn print_stats(out: &MoveOutcome, tick_hz: u32) {
    eprintln!("\n--- Stepgen Stats ---");
    eprintln!("Ticks: {} at {tick_hz} Hz", out.ticks);
    eprintln!("Travelled: {} counts", out.travelled);
    eprintln!("Peak burst: {} counts/tick", out.peak_burst);
    eprintln!("Mean rate: {:.2} counts/tick", out.mean_rate());
    eprintln!("Deadline overruns: {}", out.overruns);
    eprintln!("---------------------\n");
}
