//! `calibrate` and `self-check` against the simulated actuator.

use std::sync::Arc;

use eyre::WrapErr;
use serde_json::json;
use shade_core::{CalibrationCfg, Calibrator, DeviceId, SessionManager, ShadeType};
use shade_hardware::{Faults, SimSettings, SimulatedCover};
use shade_traits::{CoverCommand, DeviceCommandPort, DeviceModel, PositionFeed};

use crate::cli::SimFault;

fn sim_settings(cfg: &shade_config::Config) -> SimSettings {
    SimSettings {
        total_steps: cfg.simulator.total_steps,
        start_position: cfg.simulator.start_position,
        step_per_poll: cfg.simulator.step_per_poll,
    }
}

fn faults(fault: Option<SimFault>) -> Faults {
    let mut f = Faults::default();
    match fault {
        Some(SimFault::UnsetSteps) => f.unset_total_steps = true,
        Some(SimFault::NeverStall) => f.never_stall = true,
        Some(SimFault::RejectOpen) => f.fail_command = Some(CoverCommand::UpOpen),
        Some(SimFault::ReadTimeout) => f.fail_reads = true,
        Some(SimFault::LinkDown) => f.link_down = true,
        None => {}
    }
    f
}

pub fn run_calibrate(
    cfg: &shade_config::Config,
    device: &str,
    shade_type: &str,
    fault: Option<SimFault>,
    json: bool,
) -> eyre::Result<()> {
    let shade_type: ShadeType = shade_type.parse().wrap_err("--shade-type")?;
    let device_id = DeviceId::new(device);
    let cal_cfg = CalibrationCfg::from(cfg);
    let calibrator = Calibrator::new(cal_cfg, Arc::new(SessionManager::new()));
    let mut sim = SimulatedCover::with_faults(sim_settings(cfg), faults(fault));

    let report = calibrator.run(&mut sim, &device_id, shade_type)?;
    let elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX);

    if json {
        let phases: Vec<_> = report
            .history
            .iter()
            .map(|r| {
                json!({
                    "phase": r.phase.name(),
                    "ms": u64::try_from(r.duration.as_millis()).unwrap_or(u64::MAX),
                })
            })
            .collect();
        println!(
            "{}",
            json!({
                "outcome": "success",
                "device": device_id.as_str(),
                "shade_type": shade_type.name(),
                "total_steps": report.total_steps,
                "top_position": report.top_position,
                "bottom_position": report.bottom_position,
                "elapsed_ms": elapsed_ms,
                "phases": phases,
            })
        );
    } else {
        println!(
            "calibration complete: device={device_id} shade_type={shade_type} total_steps={} elapsed_ms={elapsed_ms}",
            report.total_steps
        );
        for r in &report.history {
            println!("  {:<15} {:>8} ms", r.phase.name(), r.duration.as_millis());
        }
    }
    Ok(())
}

/// Config already loaded and validated by the caller; drive the simulator
/// to the top and back and decode the built-in sample table.
pub fn run_self_check(cfg: &shade_config::Config, json: bool) -> eyre::Result<()> {
    let mut sim = SimulatedCover::new(sim_settings(cfg));
    let polls = usize::from(100 / cfg.simulator.step_per_poll.max(1)) + 2;

    sim.send_command(CoverCommand::UpOpen)
        .map_err(|e| eyre::eyre!("simulator rejected open: {e}"))?;
    let top = (0..polls).filter_map(|_| sim.current_position()).last();
    sim.send_command(CoverCommand::DownClose)
        .map_err(|e| eyre::eyre!("simulator rejected close: {e}"))?;
    let bottom = (0..polls).filter_map(|_| sim.current_position()).last();
    if top != Some(100) || bottom != Some(0) {
        eyre::bail!("simulator round trip failed: top={top:?} bottom={bottom:?}");
    }

    let sample = [0x48, 0x41, 0x01, 0x00, 0x07, 0x00, 0x07, 0x02, 0x06, 0x00, 0x02, 0x00];
    let decoded = shade_core::actions::parse(&sample)?;
    if decoded.len() != 1 {
        eyre::bail!("action table decoder returned {} actions, expected 1", decoded.len());
    }

    let endpoint = cfg.correlator.resolved_first_endpoint()?;
    let model = cfg.correlator.device_model()?.unwrap_or(DeviceModel::J1);
    let inputs = model.input_count();
    if json {
        println!(
            "{}",
            json!({ "ok": true, "model": model.name(), "first_endpoint": endpoint, "inputs": inputs })
        );
    } else {
        println!("ok (model {model}, first controller endpoint {endpoint}, {inputs} inputs)");
    }
    Ok(())
}
