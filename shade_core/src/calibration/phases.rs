//! The five calibration phases.
//!
//! Each phase is a plain function returning a tagged result; the orchestrator
//! decides what happens next. Phases only talk to the device through the
//! bus traits and only wait through the injected clock.

use shade_traits::clock::Clock;
use shade_traits::protocol::{
    ATTR_CALIBRATION_MODE, ATTR_CONFIGURED_MODE, ATTR_TILT_TRANSITION_STEPS, ATTR_TOTAL_STEPS,
    CALIBRATION_MODE_ENTER, CALIBRATION_MODE_EXIT, MANUFACTURER_CODE, TOTAL_STEPS_UNSET,
};
use shade_traits::{
    AttributeId, CoverCommand, DeviceCommandPort, ManufacturerCode, PortError, PositionFeed,
    ShadeType,
};

use super::CalibrationPhase;
use crate::config::CalibrationCfg;
use crate::error::CalibrationError;
use crate::port_error::describe_port_error;
use crate::stall::wait_for_stall;

pub(super) struct PhaseCtx<'a, C: Clock + ?Sized> {
    pub cfg: &'a CalibrationCfg,
    pub clock: &'a C,
}

impl<C: Clock + ?Sized> PhaseCtx<'_, C> {
    fn settle(&self) {
        self.clock.sleep(self.cfg.settle_delay);
    }
}

fn command_failed(phase: CalibrationPhase, operation: String, e: &PortError) -> CalibrationError {
    CalibrationError::CommandFailed {
        phase,
        operation,
        reason: describe_port_error(&**e),
    }
}

fn write<D>(
    device: &mut D,
    phase: CalibrationPhase,
    attribute: AttributeId,
    value: u16,
    manufacturer: Option<ManufacturerCode>,
) -> Result<(), CalibrationError>
where
    D: DeviceCommandPort + ?Sized,
{
    device
        .write_attribute(attribute, value, manufacturer)
        .map_err(|e| command_failed(phase, format!("write attribute {attribute}={value}"), &e))
}

/// Phase 1: enter calibration mode and tell the actuator what it drives.
pub(super) fn enter_mode<D, C>(
    device: &mut D,
    shade_type: ShadeType,
    ctx: &PhaseCtx<'_, C>,
) -> Result<(), CalibrationError>
where
    D: DeviceCommandPort + ?Sized,
    C: Clock + ?Sized,
{
    let phase = CalibrationPhase::EnteringMode;
    write(device, phase, ATTR_CALIBRATION_MODE, CALIBRATION_MODE_ENTER, None)?;
    ctx.settle();
    write(
        device,
        phase,
        ATTR_CONFIGURED_MODE,
        shade_type.configured_mode(),
        Some(MANUFACTURER_CODE),
    )?;
    ctx.settle();
    Ok(())
}

/// Drive toward a limit, wait for the stall, then stop and settle.
///
/// Returns the stalled position. A failed stop is logged only: the motor has
/// already halted at the limit.
pub(super) fn run_to_limit<D, C>(
    device: &mut D,
    phase: CalibrationPhase,
    command: CoverCommand,
    ctx: &PhaseCtx<'_, C>,
) -> Result<u8, CalibrationError>
where
    D: DeviceCommandPort + PositionFeed + ?Sized,
    C: Clock + ?Sized,
{
    device
        .send_command(command)
        .map_err(|e| command_failed(phase, format!("command {command}"), &e))?;

    let stalled = wait_for_stall(device, &ctx.cfg.stall, ctx.cfg.move_timeout, ctx.clock);

    if let Err(e) = device.send_command(CoverCommand::Stop) {
        tracing::warn!(%phase, error = %describe_port_error(&*e), "stop command failed");
    }

    match stalled {
        Ok(position) => {
            tracing::info!(%phase, position, "limit reached");
            ctx.settle();
            Ok(position)
        }
        Err(t) => Err(CalibrationError::stall(phase, t)),
    }
}

/// Phase 2: find the top limit.
pub(super) fn find_top<D, C>(device: &mut D, ctx: &PhaseCtx<'_, C>) -> Result<u8, CalibrationError>
where
    D: DeviceCommandPort + PositionFeed + ?Sized,
    C: Clock + ?Sized,
{
    run_to_limit(
        device,
        CalibrationPhase::FindingTop,
        CoverCommand::UpOpen,
        ctx,
    )
}

/// Phase 3: find the bottom limit and read the step count the device measured.
pub(super) fn find_bottom<D, C>(
    device: &mut D,
    ctx: &PhaseCtx<'_, C>,
) -> Result<(u8, u16), CalibrationError>
where
    D: DeviceCommandPort + PositionFeed + ?Sized,
    C: Clock + ?Sized,
{
    let phase = CalibrationPhase::FindingBottom;
    let position = run_to_limit(device, phase, CoverCommand::DownClose, ctx)?;
    let reading = device
        .read_attribute(ATTR_TOTAL_STEPS, Some(MANUFACTURER_CODE))
        .map_err(|e| command_failed(phase, format!("read attribute {ATTR_TOTAL_STEPS}"), &e))?;
    match reading {
        Some(steps) if steps != TOTAL_STEPS_UNSET => {
            tracing::info!(steps, "total steps measured");
            Ok((position, steps))
        }
        value => Err(CalibrationError::InvalidStepsReading { value }),
    }
}

/// Phase 4: return to the top to confirm the device reproduces it.
pub(super) fn verify<D, C>(device: &mut D, ctx: &PhaseCtx<'_, C>) -> Result<u8, CalibrationError>
where
    D: DeviceCommandPort + PositionFeed + ?Sized,
    C: Clock + ?Sized,
{
    run_to_limit(device, CalibrationPhase::Verifying, CoverCommand::UpOpen, ctx)
}

/// Phase 5: persist tilt configuration and leave calibration mode.
pub(super) fn finalize<D, C>(
    device: &mut D,
    shade_type: ShadeType,
    ctx: &PhaseCtx<'_, C>,
) -> Result<(), CalibrationError>
where
    D: DeviceCommandPort + ?Sized,
    C: Clock + ?Sized,
{
    let phase = CalibrationPhase::Finalizing;
    let tilt_steps = if shade_type.supports_tilt() {
        ctx.cfg.tilt_transition_steps
    } else {
        0
    };
    write(
        device,
        phase,
        ATTR_TILT_TRANSITION_STEPS,
        tilt_steps,
        Some(MANUFACTURER_CODE),
    )?;
    ctx.settle();
    write(device, phase, ATTR_CALIBRATION_MODE, CALIBRATION_MODE_EXIT, None)
}

/// One attempt to leave calibration mode after a failure.
pub(super) fn exit_mode_best_effort<D>(device: &mut D, failed_in: CalibrationPhase)
where
    D: DeviceCommandPort + ?Sized,
{
    match device.write_attribute(ATTR_CALIBRATION_MODE, CALIBRATION_MODE_EXIT, None) {
        Ok(()) => tracing::info!(phase = %failed_in, "calibration mode exited after failure"),
        Err(e) => tracing::error!(
            phase = %failed_in,
            error = %describe_port_error(&*e),
            "cleanup: could not exit calibration mode"
        ),
    }
}
