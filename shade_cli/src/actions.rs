//! `decode` and `correlate`: action tables given as hex on the command line.

use std::sync::Arc;

use eyre::WrapErr;
use serde_json::json;
use shade_core::{ActionRegistry, CorrelatorCfg, InputAction, InputCorrelator, InputEvent};

/// Parse hex bytes. Whitespace, ':' and '-' separate bytes and an optional
/// `0x` prefix per token is accepted.
pub fn parse_hex(s: &str) -> eyre::Result<Vec<u8>> {
    let mut digits = String::with_capacity(s.len());
    for token in s.split(|c: char| c.is_whitespace() || c == ':' || c == '-' || c == ',') {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        digits.push_str(token);
    }
    if !digits.is_ascii() {
        eyre::bail!("hex input contains non-ASCII characters");
    }
    if digits.len() % 2 != 0 {
        eyre::bail!("hex input has an odd number of digits ({})", digits.len());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .wrap_err_with(|| format!("invalid hex byte '{}'", &digits[i..i + 2]))
        })
        .collect()
}

fn parse_int(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("'{s}': {e}"))
}

pub fn parse_u16(s: &str) -> Result<u16, String> {
    u16::try_from(parse_int(s)?).map_err(|_| format!("'{s}' does not fit in 16 bits"))
}

pub fn parse_u8(s: &str) -> Result<u8, String> {
    u8::try_from(parse_int(s)?).map_err(|_| format!("'{s}' does not fit in 8 bits"))
}

fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn action_json(a: &InputAction) -> serde_json::Value {
    json!({
        "input": a.input_number,
        "options": a.input_options,
        "press_type": a.press_type.name(),
        "initial_state": a.initial_state.name(),
        "final_state": a.final_state.name(),
        "has_alternate": a.has_alternate,
        "is_alternate": a.is_alternate,
        "endpoint": a.source_endpoint,
        "cluster_id": a.cluster_id,
        "command_id": a.command_id,
        "payload": hex_string(&a.command_payload),
    })
}

pub fn run_decode(hex: &str, json: bool) -> eyre::Result<()> {
    let raw = parse_hex(hex).wrap_err("--hex")?;
    let actions = shade_core::actions::parse(&raw)?;
    tracing::info!(bytes = raw.len(), actions = actions.len(), "action table decoded");
    for a in &actions {
        if json {
            println!("{}", action_json(a));
        } else {
            let alt = match (a.has_alternate, a.is_alternate) {
                (_, true) => " alternate",
                (true, false) => " canonical",
                _ => "",
            };
            println!(
                "input={} press={} ({} -> {}) {}{alt}",
                a.input_number,
                a.press_type,
                a.initial_state,
                a.final_state,
                a.command_signature()
            );
        }
    }
    Ok(())
}

/// One observed bus command plus the table to resolve it against.
pub struct ObservedCommand<'a> {
    pub table_hex: &'a str,
    pub endpoint: u8,
    pub cluster: u16,
    pub command: u8,
    pub payload_hex: &'a str,
    pub model: Option<&'a str>,
}

fn event_json(ev: &InputEvent) -> serde_json::Value {
    json!({
        "input": ev.input_number,
        "press_type": ev.press_type.name(),
        "attribution": ev.attribution.name(),
        "endpoint": ev.endpoint,
        "cluster_id": ev.cluster_id,
        "command_id": ev.command_id,
        "payload": hex_string(&ev.payload),
    })
}

pub fn run_correlate(
    cfg: &shade_config::Config,
    observed: &ObservedCommand<'_>,
    json: bool,
) -> eyre::Result<()> {
    let mut correlator_toml = cfg.correlator.clone();
    if let Some(model) = observed.model {
        correlator_toml.model = Some(model.to_string());
        correlator_toml.first_endpoint = None;
    }
    let correlator_cfg = CorrelatorCfg::try_from(&correlator_toml).wrap_err("--model")?;

    let table = parse_hex(observed.table_hex).wrap_err("--hex")?;
    let payload = parse_hex(observed.payload_hex).wrap_err("--payload")?;
    let registry = Arc::new(ActionRegistry::new());
    let registered = registry.register_raw(&table)?;
    tracing::info!(actions = registered, first_endpoint = correlator_cfg.first_endpoint, "registry loaded");

    let (correlator, rx) = InputCorrelator::new(registry, &correlator_cfg);
    correlator.on_observed_command(observed.endpoint, observed.cluster, observed.command, &payload);
    let event = rx
        .try_recv()
        .map_err(|e| eyre::eyre!("no input event emitted: {e}"))?;

    if json {
        println!("{}", event_json(&event));
    } else {
        println!(
            "input={} press={} attribution={}",
            event.input_number, event.press_type, event.attribution
        );
    }
    Ok(())
}
