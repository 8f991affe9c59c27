//! Raspberry Pi GPIO backend via `rppal`.

use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, OutputPin};
use stepgen_traits::{ActuatorPins, BoxError, StepEmitter};

use crate::error::{HwError, Result};

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// Direction, optional enable and optional feedback lines of one drive.
pub struct GpioPins {
    direction: OutputPin,
    enable: Option<OutputPin>,
    feedback: Option<InputPin>,
    feedback_active_low: bool,
}

impl GpioPins {
    pub fn new(
        direction: u8,
        enable: Option<u8>,
        feedback: Option<u8>,
        feedback_active_low: bool,
    ) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let direction = gpio.get(direction).map_err(gpio_err)?.into_output_low();
        let enable = enable
            .map(|p| gpio.get(p).map(|pin| pin.into_output_low()))
            .transpose()
            .map_err(gpio_err)?;
        let feedback = feedback
            .map(|p| gpio.get(p).map(|pin| pin.into_input_pullup()))
            .transpose()
            .map_err(gpio_err)?;
        Ok(Self {
            direction,
            enable,
            feedback,
            feedback_active_low,
        })
    }
}

impl ActuatorPins for GpioPins {
    fn set_direction(&mut self, positive: bool) -> std::result::Result<(), BoxError> {
        if positive {
            self.direction.set_high();
        } else {
            self.direction.set_low();
        }
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) -> std::result::Result<(), BoxError> {
        if let Some(pin) = self.enable.as_mut() {
            if enabled {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
        Ok(())
    }

    fn read_feedback(&mut self) -> std::result::Result<bool, BoxError> {
        Ok(self
            .feedback
            .as_ref()
            .is_some_and(|pin| pin.is_low() == self.feedback_active_low))
    }
}

/// Step lines of up to eight drives, one per port bit.
pub struct GpioPort {
    lines: Vec<(u8, OutputPin)>,
    pulse_width: Duration,
}

impl GpioPort {
    /// `lines` maps port bits to BCM pin numbers.
    pub fn new(lines: &[(u8, u8)], pulse_width: Duration) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut out: Vec<(u8, OutputPin)> = Vec::with_capacity(lines.len());
        for &(bit, pin) in lines {
            if bit >= 8 || out.iter().any(|(b, _)| *b == bit) {
                return Err(HwError::PortBit(bit));
            }
            out.push((bit, gpio.get(pin).map_err(gpio_err)?.into_output_low()));
        }
        tracing::debug!(lines = out.len(), ?pulse_width, "gpio step port ready");
        Ok(Self {
            lines: out,
            pulse_width,
        })
    }
}

impl StepEmitter for GpioPort {
    fn pulse(&mut self, mask: u8) -> std::result::Result<(), BoxError> {
        for (bit, pin) in &mut self.lines {
            if mask & (1 << *bit) != 0 {
                pin.set_high();
            }
        }
        std::thread::sleep(self.pulse_width);
        for (_, pin) in &mut self.lines {
            pin.set_low();
        }
        std::thread::sleep(self.pulse_width);
        Ok(())
    }
}
