#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the calibration and input-correlation tooling.
//!
//! - `Config` and its sections are deserialized from TOML; every section is
//!   optional and falls back to the defaults below.
//! - `Config::validate` rejects combinations the calibration loop cannot run with.
use std::path::Path;

use eyre::WrapErr;
use serde::Deserialize;
use shade_traits::DeviceModel;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationToml {
    /// Pause after each attribute write / stop so the actuator can settle (ms)
    pub settle_ms: u64,
    /// Per-move ceiling while waiting for the motor to stall (ms)
    pub move_timeout_ms: u64,
    /// Ceiling for the whole five-phase session (ms)
    pub total_timeout_ms: u64,
    /// Steps written to tilt-capable shades in the finalizing phase
    pub tilt_transition_steps: u16,
}

impl Default for CalibrationToml {
    fn default() -> Self {
        Self {
            settle_ms: 1_000,
            move_timeout_ms: 120_000,
            total_timeout_ms: 300_000,
            tilt_transition_steps: shade_traits::protocol::DEFAULT_TILT_TRANSITION_STEPS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StallToml {
    /// Position must stay unchanged this long to count as a stall (ms)
    pub window_ms: u64,
    /// Position polling interval (ms)
    pub poll_ms: u64,
}

impl Default for StallToml {
    fn default() -> Self {
        Self {
            window_ms: 3_000,
            poll_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorrelatorToml {
    /// Device model name ("j1", "s1", "s2", "d1", "c4"); selects the first controller endpoint
    pub model: Option<String>,
    /// Explicit first controller endpoint; wins over `model`
    pub first_endpoint: Option<u8>,
    /// Capacity of the resolved-event channel
    pub channel_capacity: usize,
}

impl Default for CorrelatorToml {
    fn default() -> Self {
        Self {
            model: None,
            first_endpoint: None,
            channel_capacity: 64,
        }
    }
}

impl CorrelatorToml {
    /// Parsed model, if one is configured.
    pub fn device_model(&self) -> eyre::Result<Option<DeviceModel>> {
        self.model
            .as_deref()
            .map(|m| m.parse::<DeviceModel>())
            .transpose()
            .wrap_err("correlator.model")
    }

    /// Endpoint subtracted from an unmatched command's endpoint to guess the input.
    pub fn resolved_first_endpoint(&self) -> eyre::Result<u8> {
        if let Some(ep) = self.first_endpoint {
            return Ok(ep);
        }
        let model = self.device_model()?.unwrap_or(DeviceModel::J1);
        Ok(model.first_controller_endpoint())
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulatorToml {
    /// Steps the simulated actuator reports after a full close run
    pub total_steps: u16,
    /// Initial lift position (0..=100)
    pub start_position: u8,
    /// Position change per poll while moving
    pub step_per_poll: u8,
}

impl Default for SimulatorToml {
    fn default() -> Self {
        Self {
            total_steps: 1_800,
            start_position: 50,
            step_per_poll: 5,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub calibration: CalibrationToml,
    pub stall: StallToml,
    pub correlator: CorrelatorToml,
    pub logging: Logging,
    pub simulator: SimulatorToml,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = load_toml(&text).wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Stall detection
        if self.stall.poll_ms == 0 {
            eyre::bail!("stall.poll_ms must be > 0");
        }
        if self.stall.window_ms < self.stall.poll_ms {
            eyre::bail!("stall.window_ms must be >= stall.poll_ms");
        }

        // Calibration
        if self.calibration.move_timeout_ms <= self.stall.window_ms {
            eyre::bail!("calibration.move_timeout_ms must be > stall.window_ms");
        }
        if self.calibration.total_timeout_ms < self.calibration.move_timeout_ms {
            eyre::bail!("calibration.total_timeout_ms must be >= calibration.move_timeout_ms");
        }
        if self.calibration.settle_ms > 60 * 1000 {
            eyre::bail!("calibration.settle_ms is unreasonably large (>1min)");
        }
        if self.calibration.tilt_transition_steps == 0 {
            eyre::bail!("calibration.tilt_transition_steps must be >= 1");
        }

        // Correlator
        if self.correlator.channel_capacity == 0 {
            eyre::bail!("correlator.channel_capacity must be >= 1");
        }
        self.correlator.device_model()?;

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Simulator
        if self.simulator.start_position > 100 {
            eyre::bail!("simulator.start_position must be in [0, 100]");
        }
        if self.simulator.step_per_poll == 0 {
            eyre::bail!("simulator.step_per_poll must be >= 1");
        }
        if self.simulator.total_steps == shade_traits::protocol::TOTAL_STEPS_UNSET {
            eyre::bail!("simulator.total_steps must not be the unset sentinel 0xFFFF");
        }
        Ok(())
    }
}
