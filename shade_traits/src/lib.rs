//! Boundary traits between the calibration/input core and the device bus.
//!
//! The transport layer implements [`DeviceCommandPort`] and [`PositionFeed`];
//! the core only ever talks to a device through these.
pub mod clock;
pub mod protocol;

pub use clock::{Clock, MonotonicClock};
pub use protocol::{DeviceModel, ShadeType, UnknownVariant};

use std::fmt;

/// Error type carried across the device-bus boundary.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Window-covering commands the calibration sequence issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverCommand {
    /// Move to the fully open (top) limit.
    UpOpen,
    /// Move to the fully closed (bottom) limit.
    DownClose,
    Stop,
}

impl CoverCommand {
    pub const fn name(self) -> &'static str {
        match self {
            CoverCommand::UpOpen => "up_open",
            CoverCommand::DownClose => "down_close",
            CoverCommand::Stop => "stop",
        }
    }
}

impl fmt::Display for CoverCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute identifier within the window-covering cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId(pub u16);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Manufacturer code qualifying a manufacturer-specific attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManufacturerCode(pub u16);

/// Command and attribute access to one device.
///
/// Every call may fail with a transport error.
pub trait DeviceCommandPort {
    fn send_command(&mut self, command: CoverCommand) -> Result<(), PortError>;

    /// Read an attribute; `Ok(None)` means the device does not report it.
    fn read_attribute(
        &mut self,
        attribute: AttributeId,
        manufacturer: Option<ManufacturerCode>,
    ) -> Result<Option<u16>, PortError>;

    fn write_attribute(
        &mut self,
        attribute: AttributeId,
        value: u16,
        manufacturer: Option<ManufacturerCode>,
    ) -> Result<(), PortError>;
}

impl<T: DeviceCommandPort + ?Sized> DeviceCommandPort for Box<T> {
    fn send_command(&mut self, command: CoverCommand) -> Result<(), PortError> {
        (**self).send_command(command)
    }

    fn read_attribute(
        &mut self,
        attribute: AttributeId,
        manufacturer: Option<ManufacturerCode>,
    ) -> Result<Option<u16>, PortError> {
        (**self).read_attribute(attribute, manufacturer)
    }

    fn write_attribute(
        &mut self,
        attribute: AttributeId,
        value: u16,
        manufacturer: Option<ManufacturerCode>,
    ) -> Result<(), PortError> {
        (**self).write_attribute(attribute, value, manufacturer)
    }
}

/// Live lift position of a covering, 0 (closed) to 100 (open).
pub trait PositionFeed {
    /// `None` when the position is momentarily unavailable.
    fn current_position(&mut self) -> Option<u8>;
}

impl<F> PositionFeed for F
where
    F: FnMut() -> Option<u8>,
{
    fn current_position(&mut self) -> Option<u8> {
        self()
    }
}
