//! Human-readable error descriptions and structured JSON error formatting.

use shade_core::error::{ActionTableError, CalibrationError, ErrorKind};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ce) = err.downcast_ref::<CalibrationError>() {
        return match ce {
            CalibrationError::CommandFailed { .. } => format!(
                "What happened: {ce}.\nLikely causes: The device dropped off the bus or refused the request.\nHow to fix: Check the device is reachable, then start a new calibration."
            ),
            CalibrationError::StallTimeout { .. } => format!(
                "What happened: {ce}.\nLikely causes: The position keeps reporting changes, or the move takes longer than allowed.\nHow to fix: Check for obstructions; raise calibration.move_timeout_ms or stall.window_ms if the shade is very long."
            ),
            CalibrationError::InvalidStepsReading { .. } => format!(
                "What happened: {ce}.\nLikely causes: The close run did not start at the top limit, so the device did not measure travel.\nHow to fix: Re-run calibration from the start."
            ),
            CalibrationError::TotalTimeoutExceeded { .. } => format!(
                "What happened: {ce}.\nLikely causes: Slow actuator or long settle delays.\nHow to fix: Raise calibration.total_timeout_ms or lower calibration.settle_ms."
            ),
            CalibrationError::AlreadyInProgress { .. } => format!(
                "What happened: {ce}.\nHow to fix: Wait for the running calibration to finish."
            ),
        };
    }

    if let Some(ae) = err.downcast_ref::<ActionTableError>() {
        return format!(
            "What happened: {ae}.\nLikely causes: The bytes are not an action table (expected to start with 48 41).\nHow to fix: Pass the raw attribute value, e.g. --hex \"48 41 01 00 ...\"."
        );
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("invalid configuration") || lower.contains("parse config") {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid ({cause}).\nHow to fix: Edit the TOML config and try again."
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

/// Stable exit codes per calibration failure kind; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<CalibrationError>().map(CalibrationError::kind) {
        Some(ErrorKind::CommandFailed) => 3,
        Some(ErrorKind::StallTimeout) => 4,
        Some(ErrorKind::InvalidStepsReading) => 5,
        Some(ErrorKind::TotalTimeoutExceeded) => 6,
        Some(ErrorKind::AlreadyInProgress) => 7,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(ce) = err.downcast_ref::<CalibrationError>() {
        return json!({
            "outcome": "failure",
            "reason": ce.kind().as_str(),
            "error": ce.to_string(),
            "message": humanize(err),
        })
        .to_string();
    }

    json!({ "outcome": "failure", "reason": "error", "message": humanize(err) }).to_string()
}
