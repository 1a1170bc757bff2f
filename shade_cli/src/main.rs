#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `shadecal`: drive calibration against the simulator and decode action tables.

mod actions;
mod calibrate;
mod cli;
mod error_fmt;

use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

const DEFAULT_CONFIG: &str = "etc/shade_config.toml";

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    // Held until exit so the non-blocking file writer flushes.
    let mut file_guard = None;
    let code = match run(cli, &mut file_guard) {
        Ok(()) => 0,
        Err(e) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            exit_code_for_error(&e)
        }
    };
    drop(file_guard);
    std::process::exit(code);
}

fn run(cli: Cli, file_guard: &mut Option<WorkerGuard>) -> eyre::Result<()> {
    let default_path = Path::new(DEFAULT_CONFIG);
    let cfg = match cli.config.as_deref() {
        Some(path) => shade_config::load_file(path)?,
        None if default_path.exists() => shade_config::load_file(default_path)?,
        None => shade_config::Config::default(),
    };
    *file_guard = init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "configuration loaded");

    match cli.cmd {
        Commands::Calibrate {
            device,
            shade_type,
            fault,
        } => calibrate::run_calibrate(&cfg, &device, &shade_type, fault, cli.json),
        Commands::Decode { hex } => actions::run_decode(&hex, cli.json),
        Commands::Correlate {
            hex,
            endpoint,
            cluster,
            command,
            payload,
            model,
        } => actions::run_correlate(
            &cfg,
            &actions::ObservedCommand {
                table_hex: &hex,
                endpoint,
                cluster,
                command,
                payload_hex: &payload,
                model: model.as_deref(),
            },
            cli.json,
        ),
        Commands::SelfCheck => calibrate::run_self_check(&cfg, cli.json),
    }
}

/// Console layer (pretty or JSON on stderr) plus an optional file sink.
///
/// Filter precedence: `RUST_LOG`, then `--log-level`, then `[logging].level`.
fn init_tracing(
    json: bool,
    cli_level: Option<&str>,
    logging: &shade_config::Logging,
) -> eyre::Result<Option<WorkerGuard>> {
    let level = cli_level
        .or(logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let pretty = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });

    let mut guard = None;
    let file_layer = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file '{file}' has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, worker) = tracing_appender::non_blocking(appender);
            guard = Some(worker);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(guard)
}
