//! Tick scheduler: steps every attached axis once per tick and multiplexes
//! the bursts onto one shared step port.

use std::sync::Arc;

use eyre::WrapErr;
use stepgen_traits::StepEmitter;

use crate::controller::ProfileCell;
use crate::error::{ConfigError, Result};
use crate::hw_error::map_boxed;
use crate::state::Phase;

/// Lines on the step port.
pub const MAX_AXES: usize = 8;

/// What one tick produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Burst per attached axis, indexed by port bit.
    pub bursts: [i32; MAX_AXES],
    /// Number of attached axes.
    pub axes: usize,
    /// Port writes issued this tick (the largest burst).
    pub pulses: u32,
}

impl TickReport {
    pub fn burst(&self, bit: usize) -> i32 {
        self.bursts.get(bit).copied().unwrap_or(0)
    }
}

pub struct TickScheduler<E: StepEmitter> {
    /// Indexed by port bit.
    axes: [Option<Arc<ProfileCell>>; MAX_AXES],
    port: E,
    ticks: u64,
}

impl<E: StepEmitter> TickScheduler<E> {
    pub fn new(port: E) -> Self {
        Self {
            axes: Default::default(),
            port,
            ticks: 0,
        }
    }

    /// Attach an axis on the lowest free port bit and return that bit.
    pub fn attach(&mut self, profile: Arc<ProfileCell>) -> Result<usize, ConfigError> {
        let bit = self
            .axes
            .iter()
            .position(Option::is_none)
            .ok_or(ConfigError::TooManyAxes(MAX_AXES))?;
        self.axes[bit] = Some(profile);
        Ok(bit)
    }

    /// Attach an axis on a specific port bit.
    pub fn attach_at(&mut self, bit: u8, profile: Arc<ProfileCell>) -> Result<(), ConfigError> {
        let slot = self
            .axes
            .get_mut(usize::from(bit))
            .filter(|slot| slot.is_none())
            .ok_or(ConfigError::PortBit(bit))?;
        *slot = Some(profile);
        Ok(())
    }

    pub fn axes(&self) -> usize {
        self.axes.iter().flatten().count()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn port(&self) -> &E {
        &self.port
    }

    /// True when no attached axis has a command outstanding.
    pub fn all_idle(&self) -> bool {
        self.axes.iter().flatten().all(|a| a.is_idle())
    }

    /// Run one tick: step every axis, then emit `max(burst)` port writes,
    /// the i-th write carrying a bit for every axis whose burst exceeds i.
    pub fn tick(&mut self) -> Result<TickReport> {
        self.ticks += 1;
        let mut report = TickReport {
            axes: self.axes(),
            ..TickReport::default()
        };
        let mut transitions = [None::<(Phase, Phase)>; MAX_AXES];

        for (bit, axis) in self.axes.iter().enumerate() {
            let Some(axis) = axis else { continue };
            let (burst, before, after) = axis.tick();
            report.bursts[bit] = burst;
            if before != after {
                transitions[bit] = Some((before, after));
            }
        }

        let pulses = report.bursts.iter().copied().max().unwrap_or(0).max(0);
        report.pulses = pulses.unsigned_abs();
        for i in 0..pulses {
            let mask = report
                .bursts
                .iter()
                .enumerate()
                .filter(|&(_, &b)| b > i)
                .fold(0u8, |m, (bit, _)| m | (1 << bit));
            self.port
                .pulse(mask)
                .map_err(|e| map_boxed(&e))
                .wrap_err_with(|| format!("step port write {i} of {pulses}"))?;
        }

        for (bit, t) in transitions.iter().enumerate() {
            if let Some((from, to)) = t {
                tracing::debug!(bit, ?from, ?to, tick = self.ticks, "phase transition");
            }
        }
        tracing::trace!(tick = self.ticks, pulses, bursts = ?report.bursts, "tick");
        Ok(report)
    }
}
