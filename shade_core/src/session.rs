//! Per-device mutual exclusion for calibration sessions.
//!
//! `SessionManager` is constructed once per process and shared (behind an
//! `Arc`) by every caller that may calibrate. A device can have at most one
//! active session; `try_acquire` never blocks or queues.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use shade_traits::ShadeType;

use crate::calibration::CalibrationPhase;
use crate::error::CalibrationError;

/// Identifier of a physical device on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What the manager knows about an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSession {
    pub shade_type: ShadeType,
    pub phase: CalibrationPhase,
    pub started_at: Instant,
    token: u64,
}

#[derive(Debug, Default)]
pub struct SessionManager {
    active: Mutex<HashMap<DeviceId, ActiveSession>>,
    finished: Mutex<HashMap<DeviceId, CalibrationPhase>>,
    next_token: AtomicU64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DeviceId, ActiveSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `device` for a new session, or fail immediately with
    /// `AlreadyInProgress` if another session holds it.
    pub fn try_acquire(
        self: &Arc<Self>,
        device: &DeviceId,
        shade_type: ShadeType,
        started_at: Instant,
    ) -> Result<SessionGuard, CalibrationError> {
        let mut active = self.lock();
        if active.contains_key(device) {
            return Err(CalibrationError::AlreadyInProgress {
                device: device.to_string(),
            });
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        active.insert(
            device.clone(),
            ActiveSession {
                shade_type,
                phase: CalibrationPhase::EnteringMode,
                started_at,
                token,
            },
        );
        tracing::trace!(device = %device, "session lock acquired");
        Ok(SessionGuard {
            manager: Arc::clone(self),
            device: device.clone(),
            token,
        })
    }

    /// Drop whatever claim is held on `device`. Returns whether a session was active.
    pub fn release(&self, device: &DeviceId) -> bool {
        let released = self.lock().remove(device).is_some();
        if released {
            tracing::trace!(device = %device, "session lock released");
        }
        released
    }

    /// Release only the claim identified by `token`; a newer session for the
    /// same device is left alone.
    fn release_token(&self, device: &DeviceId, token: u64) {
        let removed = {
            let mut active = self.lock();
            let owned = active.get(device).is_some_and(|s| s.token == token);
            if owned { active.remove(device) } else { None }
        };
        if let Some(s) = removed {
            // A guard dropped mid-phase (e.g. while unwinding) ends the session as failed.
            let phase = if s.phase.is_terminal() {
                s.phase
            } else {
                tracing::warn!(device = %device, phase = %s.phase, "session ended before a terminal phase");
                CalibrationPhase::Failed
            };
            self.finished
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(device.clone(), phase);
            tracing::trace!(device = %device, %phase, "session lock released");
        }
    }

    /// Phase the most recently finished session for `device` ended in.
    pub fn last_phase(&self, device: &DeviceId) -> Option<CalibrationPhase> {
        self.finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device)
            .copied()
    }

    pub fn is_active(&self, device: &DeviceId) -> bool {
        self.lock().contains_key(device)
    }

    pub fn phase_of(&self, device: &DeviceId) -> Option<CalibrationPhase> {
        self.lock().get(device).map(|s| s.phase)
    }

    pub fn session(&self, device: &DeviceId) -> Option<ActiveSession> {
        self.lock().get(device).copied()
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn set_phase(&self, device: &DeviceId, token: u64, phase: CalibrationPhase) {
        if let Some(s) = self.lock().get_mut(device)
            && s.token == token
        {
            s.phase = phase;
        }
    }
}

/// Proof of exclusive access to one device; releases the claim on drop.
#[derive(Debug)]
pub struct SessionGuard {
    manager: Arc<SessionManager>,
    device: DeviceId,
    token: u64,
}

impl SessionGuard {
    pub(crate) fn set_phase(&self, phase: CalibrationPhase) {
        self.manager.set_phase(&self.device, self.token, phase);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.manager.release_token(&self.device, self.token);
    }
}
