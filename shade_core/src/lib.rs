#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Shade calibration and input-action engine (hardware-agnostic).
//!
//! All device access goes through `shade_traits::DeviceCommandPort` and
//! `shade_traits::PositionFeed`; time goes through `shade_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Stall detection**: position polling until the value holds (`stall`)
//! - **Calibration**: five-phase limit discovery with cleanup on failure (`calibration`)
//! - **Sessions**: one calibration per device at a time (`session`)
//! - **Actions**: action-table decoding, reverse lookup and input correlation (`actions`)
//! - **Configuration**: runtime config structs (`config`) built from `shade_config` (`conversions`)

pub mod actions;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod port_error;
pub mod session;
pub mod stall;

pub use actions::{
    ActionRegistry, Attribution, CommandSignature, InputAction, InputCorrelator, InputEvent,
    InputState, PressType,
};
pub use calibration::{
    CalibrationOutcome, CalibrationPhase, CalibrationReport, CalibrationSession, Calibrator,
    PhaseRecord,
};
pub use config::{CalibrationCfg, CorrelatorCfg, StallCfg};
pub use error::{ActionTableError, CalibrationError, ErrorKind, StallTimeout};
pub use session::{ActiveSession, DeviceId, SessionGuard, SessionManager};
pub use shade_traits::protocol;
pub use shade_traits::{Clock, MonotonicClock, ShadeType};
pub use stall::wait_for_stall;
