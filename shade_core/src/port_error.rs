//! Reason text for `CalibrationError::CommandFailed`.
//!
//! Bus errors arrive as opaque `PortError`s. With the `hardware-errors`
//! feature the simulator's `HwError` is recognised by type; anything else is
//! classified from its message.

/// Describe a bus error. Timeouts are always labelled `bus timeout`.
pub fn describe_port_error(e: &(dyn std::error::Error + 'static)) -> String {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<shade_hardware::HwError>() {
            return match hw {
                shade_hardware::HwError::Timeout => "bus timeout".to_string(),
                shade_hardware::HwError::CommandRejected(_)
                | shade_hardware::HwError::WriteRejected(_) => format!("device rejected: {hw}"),
                shade_hardware::HwError::Transport(msg) => format!("transport error: {msg}"),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        format!("bus timeout: {s}")
    } else {
        s
    }
}
