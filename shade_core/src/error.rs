use std::time::Duration;

use thiserror::Error;

use crate::calibration::CalibrationPhase;

/// Errors from decoding a device's action table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionTableError {
    /// Malformed header; fatal to the whole parse.
    #[error("action table format error: {0}")]
    Format(String),
    /// Malformed single entry; the parser skips it and carries on.
    #[error("action entry {index} at offset {offset}: {reason}")]
    EntryDecode {
        index: usize,
        offset: usize,
        reason: String,
    },
}

/// The stall detector gave up before the position settled.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no stall within {elapsed:?} (last position {last_position:?})")]
pub struct StallTimeout {
    pub last_position: Option<u8>,
    pub elapsed: Duration,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("{phase}: {operation} failed: {reason}")]
    CommandFailed {
        phase: CalibrationPhase,
        operation: String,
        reason: String,
    },
    #[error("{phase}: motor did not stall within {elapsed:?} (last position {last_position:?})")]
    StallTimeout {
        phase: CalibrationPhase,
        last_position: Option<u8>,
        elapsed: Duration,
    },
    #[error("invalid total steps reading: {}", describe_steps(.value))]
    InvalidStepsReading { value: Option<u16> },
    #[error("calibration exceeded {limit:?} during {phase} (elapsed {elapsed:?})")]
    TotalTimeoutExceeded {
        phase: CalibrationPhase,
        elapsed: Duration,
        limit: Duration,
    },
    #[error("calibration already in progress for device {device}")]
    AlreadyInProgress { device: String },
}

fn describe_steps(value: &Option<u16>) -> String {
    match value {
        None => "attribute missing".to_string(),
        Some(v) => format!("0x{v:04X} (unset)"),
    }
}

/// Stable, machine-readable name of a calibration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CommandFailed,
    StallTimeout,
    InvalidStepsReading,
    TotalTimeoutExceeded,
    AlreadyInProgress,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CommandFailed => "command_failed",
            ErrorKind::StallTimeout => "stall_timeout",
            ErrorKind::InvalidStepsReading => "invalid_steps_reading",
            ErrorKind::TotalTimeoutExceeded => "total_timeout_exceeded",
            ErrorKind::AlreadyInProgress => "already_in_progress",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CalibrationError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            CalibrationError::CommandFailed { .. } => ErrorKind::CommandFailed,
            CalibrationError::StallTimeout { .. } => ErrorKind::StallTimeout,
            CalibrationError::InvalidStepsReading { .. } => ErrorKind::InvalidStepsReading,
            CalibrationError::TotalTimeoutExceeded { .. } => ErrorKind::TotalTimeoutExceeded,
            CalibrationError::AlreadyInProgress { .. } => ErrorKind::AlreadyInProgress,
        }
    }

    pub(crate) fn stall(phase: CalibrationPhase, t: StallTimeout) -> Self {
        CalibrationError::StallTimeout {
            phase,
            last_position: t.last_position,
            elapsed: t.elapsed,
        }
    }
}
