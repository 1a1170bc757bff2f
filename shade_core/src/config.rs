//! Runtime configuration for the calibration engine and input correlator.
//!
//! These are the structs the core works with; the TOML-deserialized schema
//! lives in `shade_config` and converts into these (see `conversions`).

use std::time::Duration;

use shade_traits::protocol::DEFAULT_TILT_TRANSITION_STEPS;

/// Stall detection: the position must hold for `window`, sampled every `poll_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallCfg {
    pub window: Duration,
    pub poll_interval: Duration,
}

impl Default for StallCfg {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Calibration timing and the values written while finalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationCfg {
    /// Pause after attribute writes and stop commands.
    pub settle_delay: Duration,
    /// Ceiling for a single move-and-stall wait.
    pub move_timeout: Duration,
    /// Ceiling for the whole session, checked after every phase.
    pub total_timeout: Duration,
    /// Written to tilt-capable shades; lift-only shades always get 0.
    pub tilt_transition_steps: u16,
    pub stall: StallCfg,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            move_timeout: Duration::from_secs(120),
            total_timeout: Duration::from_secs(300),
            tilt_transition_steps: DEFAULT_TILT_TRANSITION_STEPS,
            stall: StallCfg::default(),
        }
    }
}

/// Input correlation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelatorCfg {
    /// Endpoint of input 0; used for heuristic attribution of unmatched commands.
    pub first_endpoint: u8,
    /// Capacity of the event channel; events beyond it are dropped, never waited on.
    pub channel_capacity: usize,
}

impl Default for CorrelatorCfg {
    fn default() -> Self {
        Self {
            first_endpoint: 2,
            channel_capacity: 64,
        }
    }
}
