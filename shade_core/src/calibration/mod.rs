//! Calibration orchestrator.
//!
//! Drives an actuator through five strictly sequential phases:
//!
//! ```text
//! EnteringMode -> FindingTop -> FindingBottom -> Verifying -> Finalizing -> Done
//!       \_____________\______________\______________\____________\_____> Failed
//! ```
//!
//! Stall detection is the only feedback signal. A failure in any phase aborts
//! the whole session; before the error is returned the orchestrator makes one
//! best-effort attempt to take the device out of calibration mode. The
//! per-device lock taken at the start is released on every exit path.

mod phases;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shade_traits::clock::{Clock, MonotonicClock};
use shade_traits::{DeviceCommandPort, PositionFeed, ShadeType};

use crate::config::CalibrationCfg;
use crate::error::{CalibrationError, ErrorKind};
use crate::session::{DeviceId, SessionGuard, SessionManager};
use phases::PhaseCtx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibrationPhase {
    EnteringMode,
    FindingTop,
    FindingBottom,
    Verifying,
    Finalizing,
    Done,
    Failed,
}

impl CalibrationPhase {
    pub const fn name(self) -> &'static str {
        match self {
            CalibrationPhase::EnteringMode => "entering_mode",
            CalibrationPhase::FindingTop => "finding_top",
            CalibrationPhase::FindingBottom => "finding_bottom",
            CalibrationPhase::Verifying => "verifying",
            CalibrationPhase::Finalizing => "finalizing",
            CalibrationPhase::Done => "done",
            CalibrationPhase::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, CalibrationPhase::Done | CalibrationPhase::Failed)
    }
}

impl fmt::Display for CalibrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Timing of one completed (or failed) phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseRecord {
    pub phase: CalibrationPhase,
    pub duration: Duration,
}

/// One in-flight calibration attempt.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    pub device_id: DeviceId,
    pub shade_type: ShadeType,
    pub phase: CalibrationPhase,
    pub started_at: Instant,
    /// Set once the bottom limit has been found.
    pub total_steps: Option<u16>,
    pub history: Vec<PhaseRecord>,
}

impl CalibrationSession {
    fn new(device_id: DeviceId, shade_type: ShadeType, started_at: Instant) -> Self {
        Self {
            device_id,
            shade_type,
            phase: CalibrationPhase::EnteringMode,
            started_at,
            total_steps: None,
            history: Vec::with_capacity(5),
        }
    }
}

/// Result of a successful calibration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationReport {
    pub total_steps: u16,
    pub top_position: u8,
    pub bottom_position: u8,
    pub verified_position: u8,
    pub elapsed: Duration,
    pub history: Vec<PhaseRecord>,
}

/// Structured outcome for the service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationOutcome {
    Success { total_steps: u16 },
    Failure { kind: ErrorKind, message: String },
}

impl CalibrationOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, CalibrationOutcome::Success { .. })
    }
}

impl From<Result<CalibrationReport, CalibrationError>> for CalibrationOutcome {
    fn from(r: Result<CalibrationReport, CalibrationError>) -> Self {
        match r {
            Ok(report) => CalibrationOutcome::Success {
                total_steps: report.total_steps,
            },
            Err(e) => CalibrationOutcome::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

pub struct Calibrator {
    cfg: CalibrationCfg,
    sessions: Arc<SessionManager>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl fmt::Debug for Calibrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Calibrator")
            .field("cfg", &self.cfg)
            .field("active_sessions", &self.sessions.active_count())
            .finish_non_exhaustive()
    }
}

impl Calibrator {
    pub fn new(cfg: CalibrationCfg, sessions: Arc<SessionManager>) -> Self {
        Self {
            cfg,
            sessions,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Replace the clock (tests inject a simulated one).
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn cfg(&self) -> &CalibrationCfg {
        &self.cfg
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Calibrate and fold the result into a structured outcome.
    pub fn calibrate<D>(
        &self,
        device: &mut D,
        device_id: &DeviceId,
        shade_type: ShadeType,
    ) -> CalibrationOutcome
    where
        D: DeviceCommandPort + PositionFeed + ?Sized,
    {
        self.run(device, device_id, shade_type).into()
    }

    /// Run one full calibration session.
    ///
    /// Fails immediately with `AlreadyInProgress` (touching nothing) when the
    /// device already has an active session.
    pub fn run<D>(
        &self,
        device: &mut D,
        device_id: &DeviceId,
        shade_type: ShadeType,
    ) -> Result<CalibrationReport, CalibrationError>
    where
        D: DeviceCommandPort + PositionFeed + ?Sized,
    {
        let started_at = self.clock.now();
        let guard = self
            .sessions
            .try_acquire(device_id, shade_type, started_at)
            .inspect_err(|e| tracing::warn!(device = %device_id, error = %e, "calibration rejected"))?;
        let mut session = CalibrationSession::new(device_id.clone(), shade_type, started_at);
        tracing::info!(device = %device_id, %shade_type, "calibration start");

        match self.run_phases(device, &mut session, &guard) {
            Ok(report) => {
                session.phase = CalibrationPhase::Done;
                guard.set_phase(CalibrationPhase::Done);
                tracing::info!(
                    device = %device_id,
                    total_steps = report.total_steps,
                    elapsed_ms = self.clock.ms_since(started_at),
                    "calibration complete"
                );
                Ok(report)
            }
            Err(e) => {
                let failed_in = session.phase;
                tracing::error!(device = %device_id, phase = %failed_in, error = %e, "calibration aborted");
                phases::exit_mode_best_effort(device, failed_in);
                session.phase = CalibrationPhase::Failed;
                guard.set_phase(CalibrationPhase::Failed);
                Err(e)
            }
        }
        // `guard` drops here and releases the device.
    }

    fn run_phases<D>(
        &self,
        device: &mut D,
        session: &mut CalibrationSession,
        guard: &SessionGuard,
    ) -> Result<CalibrationReport, CalibrationError>
    where
        D: DeviceCommandPort + PositionFeed + ?Sized,
    {
        let ctx = PhaseCtx {
            cfg: &self.cfg,
            clock: &*self.clock,
        };
        let shade_type = session.shade_type;

        let began = self.begin(session, guard, CalibrationPhase::EnteringMode);
        phases::enter_mode(device, shade_type, &ctx)?;
        self.end(session, began)?;

        let began = self.begin(session, guard, CalibrationPhase::FindingTop);
        let top_position = phases::find_top(device, &ctx)?;
        self.end(session, began)?;

        let began = self.begin(session, guard, CalibrationPhase::FindingBottom);
        let (bottom_position, total_steps) = phases::find_bottom(device, &ctx)?;
        session.total_steps = Some(total_steps);
        self.end(session, began)?;

        let began = self.begin(session, guard, CalibrationPhase::Verifying);
        let verified_position = phases::verify(device, &ctx)?;
        if verified_position != top_position {
            tracing::warn!(
                top_position,
                verified_position,
                "verification stalled at a different position than the first top run"
            );
        }
        self.end(session, began)?;

        let began = self.begin(session, guard, CalibrationPhase::Finalizing);
        phases::finalize(device, shade_type, &ctx)?;
        self.end(session, began)?;

        Ok(CalibrationReport {
            total_steps,
            top_position,
            bottom_position,
            verified_position,
            elapsed: self.clock.elapsed_since(session.started_at),
            history: session.history.clone(),
        })
    }

    fn begin(
        &self,
        session: &mut CalibrationSession,
        guard: &SessionGuard,
        phase: CalibrationPhase,
    ) -> Instant {
        session.phase = phase;
        guard.set_phase(phase);
        tracing::info!(device = %session.device_id, %phase, "phase start");
        self.clock.now()
    }

    /// Record the phase and enforce the session-wide timeout.
    fn end(&self, session: &mut CalibrationSession, began: Instant) -> Result<(), CalibrationError> {
        let phase = session.phase;
        session.history.push(PhaseRecord {
            phase,
            duration: self.clock.elapsed_since(began),
        });
        let elapsed = self.clock.elapsed_since(session.started_at);
        if elapsed > self.cfg.total_timeout {
            return Err(CalibrationError::TotalTimeoutExceeded {
                phase,
                elapsed,
                limit: self.cfg.total_timeout,
            });
        }
        Ok(())
    }
}
