//! Device-bus constants and the finite device vocabularies.
//!
//! String names coming from configuration or the command line are turned into
//! [`ShadeType`] / [`DeviceModel`] here and rejected if unknown; nothing past
//! this boundary dispatches on strings.

use std::fmt;
use std::str::FromStr;

use crate::{AttributeId, ManufacturerCode};

/// Manufacturer code qualifying every manufacturer-specific attribute below.
pub const MANUFACTURER_CODE: ManufacturerCode = ManufacturerCode(0x10F2);

/// Operating mode bitmap (standard attribute, no manufacturer code).
pub const ATTR_CALIBRATION_MODE: AttributeId = AttributeId(0x0017);
/// Window covering type the actuator drives (manufacturer-specific).
pub const ATTR_CONFIGURED_MODE: AttributeId = AttributeId(0x0000);
/// Steps spent tilting before the covering starts lifting (manufacturer-specific).
pub const ATTR_TILT_TRANSITION_STEPS: AttributeId = AttributeId(0x1001);
/// Steps measured between the two physical limits (manufacturer-specific).
pub const ATTR_TOTAL_STEPS: AttributeId = AttributeId(0x1002);

pub const CALIBRATION_MODE_ENTER: u16 = 0x02;
pub const CALIBRATION_MODE_EXIT: u16 = 0x00;

/// Value the device reports for total steps until a limit-to-limit run completed.
pub const TOTAL_STEPS_UNSET: u16 = 0xFFFF;

pub const CONFIGURED_MODE_LIFT_ONLY: u16 = 0x00;
pub const CONFIGURED_MODE_LIFT_AND_TILT: u16 = 0x08;

/// Tilt-transition steps written for slat-type coverings.
pub const DEFAULT_TILT_TRANSITION_STEPS: u16 = 100;

/// Returned when a name does not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Physical covering driven by the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadeType {
    Roller,
    Cellular,
    Vertical,
    Venetian,
    ExteriorVenetian,
}

impl ShadeType {
    pub const ALL: [ShadeType; 5] = [
        ShadeType::Roller,
        ShadeType::Cellular,
        ShadeType::Vertical,
        ShadeType::Venetian,
        ShadeType::ExteriorVenetian,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ShadeType::Roller => "roller",
            ShadeType::Cellular => "cellular",
            ShadeType::Vertical => "vertical",
            ShadeType::Venetian => "venetian",
            ShadeType::ExteriorVenetian => "exterior_venetian",
        }
    }

    /// Slat-type coverings tilt before they lift.
    pub const fn supports_tilt(self) -> bool {
        matches!(self, ShadeType::Venetian | ShadeType::ExteriorVenetian)
    }

    /// Value for [`ATTR_CONFIGURED_MODE`].
    pub const fn configured_mode(self) -> u16 {
        if self.supports_tilt() {
            CONFIGURED_MODE_LIFT_AND_TILT
        } else {
            CONFIGURED_MODE_LIFT_ONLY
        }
    }
}

impl fmt::Display for ShadeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShadeType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "shade type",
                value: s.to_string(),
            })
    }
}

/// Input-capable device models and their endpoint layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceModel {
    J1,
    S1,
    S2,
    D1,
    C4,
}

impl DeviceModel {
    pub const ALL: [DeviceModel; 5] = [
        DeviceModel::J1,
        DeviceModel::S1,
        DeviceModel::S2,
        DeviceModel::D1,
        DeviceModel::C4,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            DeviceModel::J1 => "j1",
            DeviceModel::S1 => "s1",
            DeviceModel::S2 => "s2",
            DeviceModel::D1 => "d1",
            DeviceModel::C4 => "c4",
        }
    }

    /// First endpoint that emits commands on behalf of a physical input.
    pub const fn first_controller_endpoint(self) -> u8 {
        match self {
            DeviceModel::J1 | DeviceModel::S1 | DeviceModel::D1 => 2,
            DeviceModel::S2 => 3,
            DeviceModel::C4 => 1,
        }
    }

    pub const fn input_count(self) -> u8 {
        match self {
            DeviceModel::C4 => 4,
            DeviceModel::J1 | DeviceModel::S1 | DeviceModel::S2 | DeviceModel::D1 => 2,
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceModel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "device model",
                value: s.to_string(),
            })
    }
}
