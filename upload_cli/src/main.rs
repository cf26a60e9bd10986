//! Command line driver for an upload control: builds a control from settings,
//! adds files from disk and prints the resulting state as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use upload_core::{
    collect_files, format_size, total_size, ControlSettings, FileHandle, ValidationError,
};

/// Build an upload control from settings and report what it makes of the given files
#[derive(Parser, Debug)]
#[command(name = "upload", version, about)]
struct Args {
    /// Settings file (defaults to ./upload.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Files or directories to add; directories are walked recursively
    #[arg(value_name = "PATH", required_unless_present = "print_config")]
    paths: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let settings = match &args.config {
        Some(path) => ControlSettings::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load settings from {}: {}", path.display(), e))?,
        None => ControlSettings::load()
            .map_err(|e| anyhow::anyhow!("Failed to load settings: {}", e))?,
    };
    info!("Settings loaded successfully");

    if args.print_config {
        print!("{}", settings.to_toml().context("Failed to render settings")?);
        return Ok(ExitCode::SUCCESS);
    }

    let mut control = settings.build_control().context("Failed to build upload control")?;

    let discarded: Arc<Mutex<Vec<ValidationError>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = discarded.clone();
    control.discarded_value_changes().subscribe(move |batch: &Vec<ValidationError>| {
        for error in batch {
            if let Some(file) = &error.file {
                warn!("Discarded {}", file.name());
            }
        }
        sink.lock().extend(batch.iter().cloned());
    });
    control.status_changes().subscribe(|status| info!("Control status: {:?}", status));

    let mut files: Vec<FileHandle> = Vec::new();
    for path in &args.paths {
        let collected = collect_files(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.extend(collected);
    }

    info!("Adding {} files", files.len());
    control.add_files(files);

    let discarded = discarded.lock().clone();
    let report = json!({
        "status": control.status(),
        "size": control.size(),
        "total_size": format_size(total_size(control.files())),
        "accept": control.accept(),
        "files": control.files(),
        "errors": control.get_error(),
        "discarded": discarded,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if control.invalid() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let default_level = if cfg!(debug_assertions) {
                "debug"
            } else {
                "info"
            };

            format!(
                "{}={},upload_core={}",
                env!("CARGO_CRATE_NAME").replace('-', "_"),
                default_level,
                default_level
            ).into()
        });

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
