#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! TOML config schema for the step generator.
//!
//! `Config` and its sections are deserialized with serde and checked by
//! [`Config::validate`]. Runtime types live in `stepgen_core`; this crate
//! only knows the on-disk shape.
use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

/// Step port width: one bit per axis.
pub const PORT_BITS: u8 = 8;
/// Largest accepted Q-format fractional bit count.
pub const MAX_FRACTIONAL_BITS: u8 = 16;
/// Upper bound on a sane tick rate.
pub const MAX_TICK_HZ: u32 = 100_000;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Engine tick rate in Hz.
    pub tick_hz: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self { tick_hz: 2_000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    pub step: u8,
    pub direction: u8,
    pub enable: Option<u8>,
    /// HLFB-style feedback input.
    pub feedback: Option<u8>,
    /// Feedback is asserted when the line reads low.
    #[serde(default = "default_true")]
    pub feedback_active_low: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MotionCfg {
    pub fractional_bits: u8,
    /// counts / s
    pub max_velocity: u32,
    /// counts / s^2
    pub max_acceleration: u32,
    pub direction_settle_us: u64,
    /// Spread fast moves over ticks at this many counts per tick.
    pub fast_move_max_steps_per_tick: Option<u32>,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            fractional_bits: 10,
            max_velocity: 20_000,
            max_acceleration: 200_000,
            direction_settle_us: 1_000,
            fast_move_max_steps_per_tick: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Limits {
    pub min_position: i64,
    pub max_position: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_position: 0,
            max_position: 54_400,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AxisCfg {
    pub name: String,
    /// Bit on the shared step port (0..=7).
    pub port_bit: u8,
    pub pins: Pins,
    #[serde(default)]
    pub motion: MotionCfg,
    #[serde(default)]
    pub limits: Limits,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Background tick thread at `timing.tick_hz`.
    #[default]
    Paced,
    /// Unpaced ticks in the calling thread.
    Direct,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    pub mode: RunMode,
    /// Cancel a move that has not finished after this long.
    pub move_timeout_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            mode: RunMode::Paced,
            move_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// How long self-check waits for the feedback line after enabling.
    pub feedback_timeout_ms: u64,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            feedback_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub axis: Vec<AxisCfg>,
    #[serde(default)]
    pub runner: RunnerCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub hardware: Hardware,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    use eyre::WrapErr;
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = load_toml(&text).wrap_err_with(|| format!("parsing config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn axis_by_name(&self, name: &str) -> Option<&AxisCfg> {
        self.axis.iter().find(|a| a.name == name)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Timing
        if self.timing.tick_hz == 0 {
            eyre::bail!("timing.tick_hz must be > 0");
        }
        if self.timing.tick_hz > MAX_TICK_HZ {
            eyre::bail!("timing.tick_hz must be <= {MAX_TICK_HZ}");
        }

        // Axes
        if self.axis.is_empty() {
            eyre::bail!("at least one [[axis]] is required");
        }
        if self.axis.len() > usize::from(PORT_BITS) {
            eyre::bail!("at most {PORT_BITS} axes share one step port, got {}", self.axis.len());
        }
        let mut names = HashSet::new();
        let mut bits = HashSet::new();
        for a in &self.axis {
            validate_axis(a, self.timing.tick_hz)?;
            if !names.insert(a.name.as_str()) {
                eyre::bail!("axis name '{}' is used twice", a.name);
            }
            if !bits.insert(a.port_bit) {
                eyre::bail!("port_bit {} is used by more than one axis", a.port_bit);
            }
        }

        // Runner
        if self.runner.move_timeout_ms == 0 {
            eyre::bail!("runner.move_timeout_ms must be >= 1");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        // Hardware
        if self.hardware.feedback_timeout_ms == 0 {
            eyre::bail!("hardware.feedback_timeout_ms must be >= 1");
        }
        Ok(())
    }
}

fn validate_axis(a: &AxisCfg, tick_hz: u32) -> eyre::Result<()> {
    let name = &a.name;
    if name.trim().is_empty() {
        eyre::bail!("axis.name must not be empty");
    }
    if a.port_bit >= PORT_BITS {
        eyre::bail!("axis '{name}': port_bit must be in 0..{PORT_BITS}");
    }
    let m = &a.motion;
    if m.fractional_bits == 0 || m.fractional_bits > MAX_FRACTIONAL_BITS {
        eyre::bail!("axis '{name}': motion.fractional_bits must be in 1..={MAX_FRACTIONAL_BITS}");
    }
    let hz = u64::from(tick_hz);
    let scale = 1u64 << m.fractional_bits;
    if u64::from(m.max_velocity) * scale / hz == 0 {
        eyre::bail!("axis '{name}': motion.max_velocity is below one scaled unit per tick");
    }
    if u64::from(m.max_acceleration) * scale / (hz * hz) == 0 {
        eyre::bail!("axis '{name}': motion.max_acceleration is below one scaled unit per tick^2");
    }
    if m.fast_move_max_steps_per_tick == Some(0) {
        eyre::bail!("axis '{name}': motion.fast_move_max_steps_per_tick must be >= 1 when set");
    }
    if a.limits.min_position > a.limits.max_position {
        eyre::bail!("axis '{name}': limits.min_position must be <= limits.max_position");
    }
    Ok(())
}
