//! Pin and step-port backends.
//!
//! The simulated backends are always available and share their state
//! through `Arc`s so a test can inspect what the engine drove. The `gpio`
//! module (feature `hardware`, Linux only) drives real lines via `rppal`.
pub mod error;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use stepgen_traits::{ActuatorPins, BoxError, StepEmitter};

#[derive(Debug, Default)]
struct Lines {
    direction: AtomicBool,
    enabled: AtomicBool,
    /// Feedback forced low regardless of enable state.
    fault: AtomicBool,
    direction_changes: AtomicU32,
}

/// Simulated actuator lines. Feedback reads high while enabled, like an
/// HLFB output with no fault.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPins {
    lines: Arc<Lines>,
}

impl SimulatedPins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direction(&self) -> bool {
        self.lines.direction.load(Ordering::Relaxed)
    }

    pub fn enabled(&self) -> bool {
        self.lines.enabled.load(Ordering::Relaxed)
    }

    pub fn direction_changes(&self) -> u32 {
        self.lines.direction_changes.load(Ordering::Relaxed)
    }

    /// Hold the feedback line deasserted, as a faulted drive would.
    pub fn set_fault(&self, fault: bool) {
        self.lines.fault.store(fault, Ordering::Relaxed);
    }
}

impl ActuatorPins for SimulatedPins {
    fn set_direction(&mut self, positive: bool) -> Result<(), BoxError> {
        if self.lines.direction.swap(positive, Ordering::Relaxed) != positive {
            self.lines.direction_changes.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(positive, "direction (simulated)");
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), BoxError> {
        self.lines.enabled.store(enabled, Ordering::Relaxed);
        tracing::debug!(enabled, "enable line (simulated)");
        Ok(())
    }

    fn read_feedback(&mut self) -> Result<bool, BoxError> {
        Ok(self.enabled() && !self.lines.fault.load(Ordering::Relaxed))
    }
}

/// Simulated step port counting pulses per line.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPort {
    pulses: Arc<[AtomicU64; 8]>,
    writes: Arc<AtomicU64>,
}

impl SimulatedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulses(&self, bit: u8) -> u64 {
        self.pulses
            .get(usize::from(bit))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Port writes issued, one per multiplexed pulse slot.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl StepEmitter for SimulatedPort {
    fn pulse(&mut self, mask: u8) -> Result<(), BoxError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        for (bit, count) in self.pulses.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_pins_track_lines() {
        let mut pins = SimulatedPins::new();
        let probe = pins.clone();
        assert!(!pins.read_feedback().unwrap());
        pins.set_enabled(true).unwrap();
        assert!(pins.read_feedback().unwrap());
        pins.set_direction(true).unwrap();
        pins.set_direction(true).unwrap();
        pins.set_direction(false).unwrap();
        assert_eq!(probe.direction_changes(), 2);
        probe.set_fault(true);
        assert!(!pins.read_feedback().unwrap());
    }

    #[test]
    fn simulated_port_counts_per_bit() {
        let mut port = SimulatedPort::new();
        let probe = port.clone();
        port.pulse(0b1000_0001).unwrap();
        port.pulse(0b0000_0001).unwrap();
        assert_eq!(probe.pulses(0), 2);
        assert_eq!(probe.pulses(7), 1);
        assert_eq!(probe.pulses(3), 0);
        assert_eq!(probe.writes(), 2);
    }
}
