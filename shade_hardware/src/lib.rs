//! Simulated window-covering actuator.
//!
//! `SimulatedCover` implements the device-bus traits against an in-memory
//! model: the lift position walks toward the commanded limit by a fixed
//! amount on every position poll and stops there, which is exactly what a
//! stall detector needs to see. Faults can be injected per instance.
pub mod error;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shade_traits::protocol::{
    ATTR_CALIBRATION_MODE, ATTR_TOTAL_STEPS, CALIBRATION_MODE_ENTER, TOTAL_STEPS_UNSET,
};
use shade_traits::{
    AttributeId, CoverCommand, DeviceCommandPort, ManufacturerCode, PortError, PositionFeed,
};

pub use error::HwError;

/// Static behaviour of the simulated actuator.
#[derive(Debug, Clone, Copy)]
pub struct SimSettings {
    pub total_steps: u16,
    pub start_position: u8,
    pub step_per_poll: u8,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            total_steps: 1_800,
            start_position: 50,
            step_per_poll: 5,
        }
    }
}

/// Injected failures.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Reject this command.
    pub fail_command: Option<CoverCommand>,
    /// Reject writes to this attribute.
    pub fail_write: Option<AttributeId>,
    /// Report an unknown position for this many polls.
    pub unknown_polls: u32,
    /// Keep the position changing forever.
    pub never_stall: bool,
    /// Report the unset sentinel for total steps regardless of motion.
    pub unset_total_steps: bool,
    /// Every attribute read times out.
    pub fail_reads: bool,
    /// Commands and writes never reach the device.
    pub link_down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Idle,
    Opening,
    Closing,
}

/// One observable interaction with the simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Command(CoverCommand),
    Write {
        attribute: AttributeId,
        value: u16,
        manufacturer: Option<ManufacturerCode>,
    },
    Read(AttributeId),
}

#[derive(Debug)]
struct SimState {
    settings: SimSettings,
    faults: Faults,
    position: u8,
    motion: Motion,
    calibration_mode: bool,
    /// Set once a closing run started at the top limit while in calibration mode.
    measuring: bool,
    measured_steps: Option<u16>,
    attributes: HashMap<AttributeId, u16>,
    events: Vec<SimEvent>,
    jitter: bool,
}

impl SimState {
    fn advance(&mut self) {
        let step = self.settings.step_per_poll;
        match self.motion {
            Motion::Idle => {}
            Motion::Opening => self.position = self.position.saturating_add(step).min(100),
            Motion::Closing => {
                self.position = self.position.saturating_sub(step);
                if self.position == 0 && self.measuring {
                    self.measuring = false;
                    self.measured_steps = Some(self.settings.total_steps);
                    tracing::debug!(steps = self.settings.total_steps, "sim: limit-to-limit run measured");
                }
            }
        }
    }
}

/// Cloneable handle; clones share the same simulated device.
#[derive(Debug, Clone)]
pub struct SimulatedCover {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedCover {
    fn default() -> Self {
        Self::new(SimSettings::default())
    }
}

impl SimulatedCover {
    pub fn new(settings: SimSettings) -> Self {
        Self::with_faults(settings, Faults::default())
    }

    pub fn with_faults(settings: SimSettings, faults: Faults) -> Self {
        let state = SimState {
            settings,
            faults,
            position: settings.start_position.min(100),
            motion: Motion::Idle,
            calibration_mode: false,
            measuring: false,
            measured_steps: None,
            attributes: HashMap::new(),
            events: Vec::new(),
            jitter: false,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the injected faults.
    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    pub fn position(&self) -> u8 {
        self.lock().position
    }

    pub fn in_calibration_mode(&self) -> bool {
        self.lock().calibration_mode
    }

    /// Last value written to `attribute`, if any.
    pub fn attribute(&self, attribute: AttributeId) -> Option<u16> {
        self.lock().attributes.get(&attribute).copied()
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().events.clone()
    }

    pub fn commands(&self) -> Vec<CoverCommand> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Command(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    /// `(attribute, value)` for every write, in order.
    pub fn writes(&self) -> Vec<(AttributeId, u16)> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Write {
                    attribute, value, ..
                } => Some((*attribute, *value)),
                _ => None,
            })
            .collect()
    }
}

fn link_down() -> PortError {
    Box::new(HwError::Transport("link down".to_owned()))
}

impl DeviceCommandPort for SimulatedCover {
    fn send_command(&mut self, command: CoverCommand) -> Result<(), PortError> {
        let mut st = self.lock();
        st.events.push(SimEvent::Command(command));
        if st.faults.link_down {
            return Err(link_down());
        }
        if st.faults.fail_command == Some(command) {
            return Err(Box::new(HwError::CommandRejected(command)));
        }
        match command {
            CoverCommand::UpOpen => {
                st.motion = Motion::Opening;
                st.measuring = false;
            }
            CoverCommand::DownClose => {
                st.motion = Motion::Closing;
                st.measuring = st.calibration_mode && st.position == 100;
            }
            CoverCommand::Stop => st.motion = Motion::Idle,
        }
        tracing::trace!(%command, position = st.position, "sim: command");
        Ok(())
    }

    fn read_attribute(
        &mut self,
        attribute: AttributeId,
        _manufacturer: Option<ManufacturerCode>,
    ) -> Result<Option<u16>, PortError> {
        let mut st = self.lock();
        st.events.push(SimEvent::Read(attribute));
        if st.faults.fail_reads {
            return Err(Box::new(HwError::Timeout));
        }
        if attribute == ATTR_TOTAL_STEPS {
            if st.faults.unset_total_steps {
                return Ok(Some(TOTAL_STEPS_UNSET));
            }
            return Ok(Some(st.measured_steps.unwrap_or(TOTAL_STEPS_UNSET)));
        }
        Ok(st.attributes.get(&attribute).copied())
    }

    fn write_attribute(
        &mut self,
        attribute: AttributeId,
        value: u16,
        manufacturer: Option<ManufacturerCode>,
    ) -> Result<(), PortError> {
        let mut st = self.lock();
        st.events.push(SimEvent::Write {
            attribute,
            value,
            manufacturer,
        });
        if st.faults.link_down {
            return Err(link_down());
        }
        if st.faults.fail_write == Some(attribute) {
            return Err(Box::new(HwError::WriteRejected(attribute)));
        }
        if attribute == ATTR_CALIBRATION_MODE {
            st.calibration_mode = value & CALIBRATION_MODE_ENTER != 0;
            if st.calibration_mode {
                st.measured_steps = None;
            }
        }
        st.attributes.insert(attribute, value);
        Ok(())
    }
}

impl PositionFeed for SimulatedCover {
    fn current_position(&mut self) -> Option<u8> {
        let mut st = self.lock();
        if st.faults.unknown_polls > 0 {
            st.faults.unknown_polls -= 1;
            return None;
        }
        if st.faults.never_stall {
            st.jitter = !st.jitter;
            st.position = if st.jitter {
                st.position.saturating_add(1).min(100)
            } else {
                st.position.saturating_sub(1)
            };
            return Some(st.position);
        }
        st.advance();
        Some(st.position)
    }
}
