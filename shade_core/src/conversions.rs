//! `From` implementations bridging `shade_config` types to `shade_core` types.

use std::time::Duration;

use crate::config::{CalibrationCfg, CorrelatorCfg, StallCfg};

// ── StallCfg ─────────────────────────────────────────────────────────────────

impl From<&shade_config::StallToml> for StallCfg {
    fn from(c: &shade_config::StallToml) -> Self {
        Self {
            window: Duration::from_millis(c.window_ms),
            poll_interval: Duration::from_millis(c.poll_ms),
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&shade_config::Config> for CalibrationCfg {
    fn from(c: &shade_config::Config) -> Self {
        Self {
            settle_delay: Duration::from_millis(c.calibration.settle_ms),
            move_timeout: Duration::from_millis(c.calibration.move_timeout_ms),
            total_timeout: Duration::from_millis(c.calibration.total_timeout_ms),
            tilt_transition_steps: c.calibration.tilt_transition_steps,
            stall: (&c.stall).into(),
        }
    }
}

// ── CorrelatorCfg ────────────────────────────────────────────────────────────

impl TryFrom<&shade_config::CorrelatorToml> for CorrelatorCfg {
    type Error = shade_traits::UnknownVariant;

    fn try_from(c: &shade_config::CorrelatorToml) -> Result<Self, Self::Error> {
        let first_endpoint = match (c.first_endpoint, c.model.as_deref()) {
            (Some(ep), _) => ep,
            (None, Some(name)) => name
                .parse::<shade_traits::DeviceModel>()?
                .first_controller_endpoint(),
            (None, None) => CorrelatorCfg::default().first_endpoint,
        };
        Ok(Self {
            first_endpoint,
            channel_capacity: c.channel_capacity.max(1),
        })
    }
}
