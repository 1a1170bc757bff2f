//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "shadecal", version, about = "Shade actuator calibration and input decoding")]
pub struct Cli {
    /// Path to config TOML [default: etc/shade_config.toml if present, else built-in defaults]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and print results as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Failure to inject into the simulated actuator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SimFault {
    /// Total steps always reads as unset
    UnsetSteps,
    /// Position never settles
    NeverStall,
    /// The device rejects the open command
    RejectOpen,
    /// Every attribute read times out
    ReadTimeout,
    /// Commands and writes never reach the device
    LinkDown,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calibrate the simulated actuator's travel limits
    Calibrate {
        /// Device identifier used for the per-device session lock
        #[arg(long, default_value = "sim-0")]
        device: String,
        /// Covering type (roller, cellular, vertical, venetian, exterior_venetian)
        #[arg(long = "shade-type", value_name = "TYPE", default_value = "roller")]
        shade_type: String,
        /// Inject a simulator fault
        #[arg(long, value_enum, value_name = "FAULT")]
        fault: Option<SimFault>,
    },
    /// Decode an action table and print one line per action
    Decode {
        /// Table bytes as hex; spaces, ':' and '-' separators are allowed
        #[arg(long, value_name = "HEX")]
        hex: String,
    },
    /// Attribute one observed bus command to an input
    Correlate {
        /// Action table bytes as hex
        #[arg(long, value_name = "HEX")]
        hex: String,
        /// Source endpoint of the observed command
        #[arg(long)]
        endpoint: u8,
        /// Cluster id (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = crate::actions::parse_u16)]
        cluster: u16,
        /// Command id (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = crate::actions::parse_u8)]
        command: u8,
        /// Command payload as hex
        #[arg(long, value_name = "HEX", default_value = "")]
        payload: String,
        /// Device model; overrides correlator.model from the config
        #[arg(long)]
        model: Option<String>,
    },
    /// Quick health check (config + simulator round trip)
    SelfCheck,
}
