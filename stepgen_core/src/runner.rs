//! Drive a single move to completion on one axis.
//!
//! `Direct` ticks the scheduler in the caller's loop as fast as possible,
//! which is deterministic and suited to tests and dry runs. `Paced` hands
//! the scheduler to a [`Ticker`] thread and polls the axis until it is idle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use stepgen_traits::{ActuatorPins, Clock, StepEmitter};

use crate::controller::Axis;
use crate::error::{MoveError, Result, StepgenError};
use crate::scheduler::TickScheduler;
use crate::status::MoveOutcome;
use crate::ticker::Ticker;

/// How engine ticks are produced while a move runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    /// Tick in the calling thread without pacing.
    Direct,
    /// Tick on a background thread at the given rate.
    Paced(u32),
}

/// Bounded stop injected part-way through a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopAfter {
    pub ticks: u64,
    pub distance: u32,
}

#[derive(Debug, Clone)]
pub struct MoveRequest {
    /// Signed distance in counts.
    pub distance: i64,
    /// Skip the ramp.
    pub fast: bool,
    /// Step port line the axis is pulsed on.
    pub port_bit: u8,
    pub stop_after: Option<StopAfter>,
    /// Give up, cancel the move and return `StepgenError::Timeout` after this.
    pub timeout: Duration,
    /// Set from outside (e.g. a signal handler) to cancel with `Aborted`.
    pub abort: Option<Arc<AtomicBool>>,
}

impl MoveRequest {
    pub fn new(distance: i64) -> Self {
        Self {
            distance,
            fast: false,
            port_bit: 0,
            stop_after: None,
            timeout: Duration::from_secs(30),
            abort: None,
        }
    }

    fn aborted(&self) -> bool {
        self.abort.as_ref().is_some_and(|f| f.load(Ordering::Relaxed))
    }
}

/// Accept `req` on `axis` and tick until the axis is idle again. The axis
/// must already be enabled. On timeout or abort the move is cancelled
/// before the error is returned.
pub fn run_move<P, E, C>(
    axis: &mut Axis<P>,
    port: E,
    req: &MoveRequest,
    mode: DriveMode,
    clock: C,
) -> Result<MoveOutcome>
where
    P: ActuatorPins,
    E: StepEmitter + Send + 'static,
    C: Clock + Clone + Send + Sync + 'static,
{
    let mut scheduler = TickScheduler::new(port);
    scheduler
        .attach_at(req.port_bit, axis.profile())
        .map_err(StepgenError::from)?;

    let start = axis.commanded_position();
    if req.fast {
        axis.move_fast(req.distance)?;
    } else {
        axis.move_by(req.distance)?;
    }
    tracing::info!(axis = axis.name(), distance = req.distance, fast = req.fast, ?mode, "move start");

    let outcome = match mode {
        DriveMode::Direct => run_direct(axis, &mut scheduler, req, start)?,
        DriveMode::Paced(hz) => run_paced(axis, scheduler, req, start, hz, clock)?,
    };
    tracing::info!(
        axis = axis.name(),
        position = outcome.final_position,
        ticks = outcome.ticks,
        peak = outcome.peak_burst,
        "move complete"
    );
    Ok(outcome)
}

fn inject_stop<P: ActuatorPins>(axis: &mut Axis<P>, stop: StopAfter) -> Result<()> {
    match axis.decelerate_stop_over(stop.distance) {
        Ok(()) => Ok(()),
        Err(e) if is_not_moving(&e) => {
            tracing::debug!("move finished before the bounded stop was due");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn is_not_moving(e: &eyre::Report) -> bool {
    matches!(
        e.downcast_ref::<StepgenError>(),
        Some(StepgenError::Move(MoveError::NotMoving))
    )
}

fn abandon<P: ActuatorPins>(axis: &mut Axis<P>, err: StepgenError) -> eyre::Report {
    axis.stop_move();
    tracing::error!(axis = axis.name(), error = %err, "move abandoned");
    eyre::Report::new(err)
}

fn outcome(start: i64, end: i64, ticks: u64, peak_burst: i32, overruns: u64) -> MoveOutcome {
    MoveOutcome {
        final_position: end,
        travelled: end.abs_diff(start),
        ticks,
        peak_burst,
        overruns,
    }
}

fn run_direct<P: ActuatorPins, E: StepEmitter>(
    axis: &mut Axis<P>,
    scheduler: &mut TickScheduler<E>,
    req: &MoveRequest,
    start: i64,
) -> Result<MoveOutcome> {
    let budget = crate::util::ticks_in_ms(
        u64::try_from(req.timeout.as_millis()).unwrap_or(u64::MAX),
        axis.tick_hz(),
    );
    let mut ticks = 0u64;
    let mut peak = 0i32;

    while !axis.is_idle() {
        if req.aborted() {
            return Err(abandon(axis, StepgenError::Aborted));
        }
        if ticks >= budget {
            return Err(abandon(axis, StepgenError::Timeout));
        }
        if let Some(stop) = req.stop_after.filter(|s| s.ticks == ticks) {
            inject_stop(axis, stop)?;
        }
        let report = scheduler.tick()?;
        ticks += 1;
        peak = peak.max(report.burst(usize::from(req.port_bit)));
    }
    Ok(outcome(start, axis.commanded_position(), ticks, peak, 0))
}

fn run_paced<P, E, C>(
    axis: &mut Axis<P>,
    scheduler: TickScheduler<E>,
    req: &MoveRequest,
    start: i64,
    hz: u32,
    clock: C,
) -> Result<MoveOutcome>
where
    P: ActuatorPins,
    E: StepEmitter + Send + 'static,
    C: Clock + Clone + Send + Sync + 'static,
{
    let poll = Duration::from_micros(crate::util::period_us(hz));
    let epoch = clock.now();
    let ticker = Ticker::spawn(scheduler, hz, clock.clone());
    let mut stop_pending = req.stop_after;
    let mut peak = 0i32;

    while !axis.is_idle() {
        if req.aborted() {
            return Err(abandon(axis, StepgenError::Aborted));
        }
        if ticker.failed() {
            return Err(abandon(
                axis,
                StepgenError::Hardware("tick thread stopped".into()),
            ));
        }
        if clock.now().saturating_duration_since(epoch) >= req.timeout {
            return Err(abandon(axis, StepgenError::Timeout));
        }
        if let Some(stop) = stop_pending.filter(|s| ticker.ticks() >= s.ticks) {
            inject_stop(axis, stop)?;
            stop_pending = None;
        }
        if let Some(report) = ticker.latest() {
            peak = peak.max(report.burst(usize::from(req.port_bit)));
        }
        clock.sleep(poll);
    }

    let ticks = ticker.ticks();
    let overruns = ticker.overruns();
    drop(ticker.stop());
    Ok(outcome(start, axis.commanded_position(), ticks, peak, overruns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DynAxis;
    use crate::config::MotionCfg;
    use crate::error::ConfigError;
    use crate::mocks::{CountingPort, NoopPins};
    use stepgen_traits::TestClock;

    fn axis() -> DynAxis {
        // 100 000 counts/s and 20 000 000 counts/s² at 2 kHz:
        // 50 counts/tick, 5 counts/tick²
        let mut a = DynAxis::builder()
            .with_pins(NoopPins)
            .with_motion(MotionCfg {
                max_velocity: 100_000,
                max_acceleration: 20_000_000,
                ..MotionCfg::default()
            })
            .with_clock(Arc::new(TestClock::new()))
            .build()
            .unwrap();
        a.enable().unwrap();
        a
    }

    #[test]
    fn direct_move_reports_exact_ticks() {
        let mut a = axis();
        let port = CountingPort::new();
        let out = run_move(
            &mut a,
            port.clone(),
            &MoveRequest::new(2000),
            DriveMode::Direct,
            TestClock::new(),
        )
        .unwrap();
        assert_eq!(out.final_position, 2000);
        assert_eq!(out.travelled, 2000);
        assert_eq!(out.ticks, 46);
        assert_eq!(out.peak_burst, 50);
        assert_eq!(port.pulses(0), 2000);
    }

    #[test]
    fn pulses_land_on_the_requested_port_bit() {
        let mut a = axis();
        let port = CountingPort::new();
        let req = MoveRequest {
            port_bit: 3,
            ..MoveRequest::new(2000)
        };
        let out = run_move(&mut a, port.clone(), &req, DriveMode::Direct, TestClock::new()).unwrap();
        assert_eq!(port.pulses(3), 2000);
        assert_eq!(port.pulses(0), 0);
        assert_eq!(out.peak_burst, 50);
    }

    #[test]
    fn out_of_range_port_bit_is_rejected_before_moving() {
        let mut a = axis();
        let req = MoveRequest {
            port_bit: 8,
            ..MoveRequest::new(2000)
        };
        let err = run_move(&mut a, CountingPort::new(), &req, DriveMode::Direct, TestClock::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StepgenError>(),
            Some(StepgenError::Config(ConfigError::PortBit(8)))
        ));
        assert!(a.is_idle());
        assert_eq!(a.commanded_position(), 0);
    }

    #[test]
    fn direct_timeout_cancels_the_move() {
        let mut a = axis();
        let req = MoveRequest {
            timeout: Duration::from_millis(5),
            ..MoveRequest::new(2000)
        };
        let err = run_move(&mut a, CountingPort::new(), &req, DriveMode::Direct, TestClock::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StepgenError>(),
            Some(StepgenError::Timeout)
        ));
        assert!(a.is_idle());
    }

    #[test]
    fn paced_move_completes() {
        let mut a = axis();
        let out = run_move(
            &mut a,
            CountingPort::new(),
            &MoveRequest::new(-300),
            DriveMode::Paced(2_000),
            TestClock::new(),
        )
        .unwrap();
        assert_eq!(out.final_position, -300);
        assert!(out.ticks >= 12);
    }
}
