//! Test and helper doubles for stepgen_core.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use stepgen_traits::{ActuatorPins, BoxError, StepEmitter};

/// Pins that accept every write and report a low feedback line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPins;

impl ActuatorPins for NoopPins {
    fn set_direction(&mut self, _positive: bool) -> Result<(), BoxError> {
        Ok(())
    }

    fn set_enabled(&mut self, _enabled: bool) -> Result<(), BoxError> {
        Ok(())
    }

    fn read_feedback(&mut self) -> Result<bool, BoxError> {
        Ok(false)
    }
}

/// Step port that only counts pulses per line. Clones share the counters.
#[derive(Debug, Clone, Default)]
pub struct CountingPort {
    lines: Arc<[AtomicU64; 8]>,
}

impl CountingPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulses(&self, bit: usize) -> u64 {
        self.lines.get(bit).map_or(0, |c| c.load(Ordering::Relaxed))
    }
}

impl StepEmitter for CountingPort {
    fn pulse(&mut self, mask: u8) -> Result<(), BoxError> {
        for (bit, line) in self.lines.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                line.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}
