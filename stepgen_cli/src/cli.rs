//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Move timeout in effect for the current run (for JSON error details).
pub static LAST_TIMEOUT_MS: OnceLock<u64> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "stepgen", version, about = "Trapezoidal step generator CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/stepgen.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        #[cfg(target_os = "linux")]
        {
            return RtLock::Current;
        }
        #[allow(unreachable_code)]
        RtLock::None
    }
}

/// Real-time knobs shared by the move command.
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority and calls mlockall to keep the tick thread's pages resident. Requires CAP_SYS_NICE / CAP_IPC_LOCK or root; failures are reported as warnings and the move still runs."
    )]
    pub rt: bool,
    /// SCHED_FIFO priority when --rt is enabled (clamped to the system range)
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt: none, current, or all
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
}

/// Arguments of the `move` command.
#[derive(clap::Args, Debug, Clone)]
pub struct MoveArgs {
    /// Signed distance in counts
    #[arg(long, allow_hyphen_values = true)]
    pub distance: i64,
    /// Index of the [[axis]] entry to drive
    #[arg(long, default_value_t = 0)]
    pub axis: usize,
    /// Commit the move without a ramp
    #[arg(long, action = ArgAction::SetTrue)]
    pub fast: bool,
    /// Tick in the calling thread as fast as possible (no ticker thread)
    #[arg(long, action = ArgAction::SetTrue)]
    pub direct: bool,
    /// Inject a bounded stop after this many ticks
    #[arg(long, value_name = "TICKS", requires = "stop_distance")]
    pub stop_after_ticks: Option<u64>,
    /// Distance in counts for the bounded stop
    #[arg(long, value_name = "COUNTS", requires = "stop_after_ticks")]
    pub stop_distance: Option<u32>,
    /// Override runner.move_timeout_ms
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
    #[command(flatten)]
    pub rt: RtArgs,
    /// Print tick statistics to stderr
    #[arg(long, action = ArgAction::SetTrue)]
    pub stats: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one move on one axis and report where it ended
    Move(MoveArgs),
    /// Enable and disable every axis, checking feedback where wired
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
