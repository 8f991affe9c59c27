//! Human-readable error descriptions and structured JSON error formatting.

use stepgen_core::error::{ConfigError, MoveError, StepgenError};
use stepgen_hardware::error::HwError;

use crate::cli::LAST_TIMEOUT_MS;

/// Exit code for a clean run.
pub const EXIT_OK: i32 = 0;
/// Aborted by Ctrl-C.
pub const EXIT_ABORTED: i32 = 2;
/// Move or feedback timed out.
pub const EXIT_TIMEOUT: i32 = 3;
/// Move rejected by the engine.
pub const EXIT_REJECTED: i32 = 4;
/// Pin or port failure.
pub const EXIT_HARDWARE: i32 = 5;
/// Anything else, including configuration errors.
pub const EXIT_OTHER: i32 = 1;

fn stepgen_error(err: &eyre::Report) -> Option<&StepgenError> {
    err.chain().find_map(|e| e.downcast_ref::<StepgenError>())
}

fn config_error(err: &eyre::Report) -> Option<&ConfigError> {
    err.chain().find_map(|e| e.downcast_ref::<ConfigError>())
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(se) = stepgen_error(err) {
        return match se {
            StepgenError::Timeout => "What happened: The operation timed out.\nLikely causes: The move needs longer than runner.move_timeout_ms at the configured rates, or a drive never asserted its feedback line.\nHow to fix: Raise --timeout-ms / runner.move_timeout_ms or hardware.feedback_timeout_ms, and check the drive's HLFB wiring.".to_string(),
            StepgenError::Aborted => "What happened: The move was aborted.\nLikely causes: Ctrl-C or a termination signal during the move.\nHow to fix: Re-run the move; the axis was stopped in place and its position is no longer known to the drive.".to_string(),
            StepgenError::Move(MoveError::Busy) => "What happened: The axis is still moving.\nLikely causes: A new move was commanded before the previous one completed.\nHow to fix: Wait for the axis to go idle or stop it first.".to_string(),
            StepgenError::Move(MoveError::NotConfigured) => "What happened: The axis has no velocity or acceleration limit.\nLikely causes: Limits were never set on the axis.\nHow to fix: Set axis.motion.max_velocity and max_acceleration in the config.".to_string(),
            StepgenError::Move(MoveError::TooLong { requested }) => format!(
                "What happened: Move of {requested} counts is longer than the engine accepts.\nLikely causes: A distance in the wrong unit or a missing sign.\nHow to fix: Split the move into pieces of at most {} counts.",
                stepgen_core::MAX_MOVE_COUNTS
            ),
            StepgenError::Move(MoveError::NotMoving) => "What happened: A bounded stop was requested with no move in flight.\nLikely causes: The move already finished before the stop was due.\nHow to fix: Use a smaller --stop-after-ticks.".to_string(),
            StepgenError::Config(c) => config_text(c),
            StepgenError::Hardware(msg) | StepgenError::HardwareFault(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Wrong pin numbers, missing GPIO permissions, or a faulted drive.\nHow to fix: Check [axis.pins] in the config and that the process can access GPIO."
            ),
        };
    }

    if let Some(c) = config_error(err) {
        return config_text(c);
    }

    if let Some(hw) = err.chain().find_map(|e| e.downcast_ref::<HwError>()) {
        return match hw {
            HwError::FeedbackTimeout => "What happened: Drive feedback did not assert in time.\nLikely causes: Drive unpowered, faulted, or the HLFB line is miswired.\nHow to fix: Check drive power and the feedback pin, or raise hardware.feedback_timeout_ms.".to_string(),
            other => format!(
                "What happened: Hardware error ({other}).\nLikely causes: Wrong pin numbers or insufficient GPIO permissions.\nHow to fix: Check [axis.pins] in the config."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("reading config") {
        return format!(
            "What happened: Could not read the config file.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass an existing TOML file with --config. Original: {msg}"
        );
    }

    if ["parsing config", "must", "invalid", "required", "used twice", "used by more"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Missing [[axis]] entries or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn config_text(c: &ConfigError) -> String {
    format!(
        "What happened: Invalid configuration ({c}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
    )
}

/// Stable name for the error class, used in JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    match stepgen_error(err) {
        Some(StepgenError::Timeout) => "Timeout",
        Some(StepgenError::Aborted) => "Aborted",
        Some(StepgenError::Move(_)) => "MoveRejected",
        Some(StepgenError::Config(_)) => "Config",
        Some(StepgenError::Hardware(_) | StepgenError::HardwareFault(_)) => "Hardware",
        None if config_error(err).is_some() => "Config",
        None => match err.chain().find_map(|e| e.downcast_ref::<HwError>()) {
            Some(HwError::FeedbackTimeout) => "Timeout",
            Some(_) => "Hardware",
            None => "Error",
        },
    }
}

/// Map the error class to a stable exit code.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Timeout" => EXIT_TIMEOUT,
        "Aborted" => EXIT_ABORTED,
        "MoveRejected" => EXIT_REJECTED,
        "Hardware" => EXIT_HARDWARE,
        _ => EXIT_OTHER,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = reason_name(err);
    let msg = humanize(err);
    match (reason, LAST_TIMEOUT_MS.get()) {
        ("Timeout", Some(ms)) => {
            json!({ "reason": reason, "details": { "move_timeout_ms": ms }, "message": msg })
        }
        _ => json!({ "reason": reason, "message": msg }),
    }
    .to_string()
}
