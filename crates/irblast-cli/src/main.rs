//! Command-line interface for controlling IR-blaster appliances.

mod config;
mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use irblast_devices::{Appliance, DeviceRegistry, HttpTransport};

use crate::config::AppConfig;
use crate::shell::Operation;

/// Control appliances through a network IR blaster.
#[derive(Parser, Debug)]
#[command(name = "irblast")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to $IRBLAST_CONFIG, then ./config.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
///
/// Reported state lives only as long as the process, so one-shot commands
/// start from "off" at level 0. Use `shell` to drive devices over time.
#[derive(Subcommand, Debug)]
enum Command {
    /// List configured devices.
    List,
    /// Validate the configuration file and exit.
    Check,
    /// Switch a device on or off.
    Power {
        /// Device name.
        device: String,
        /// Target power state.
        #[arg(value_enum)]
        state: PowerState,
    },
    /// Send the toggle signal (or flip a switch device).
    Toggle {
        /// Device name.
        device: String,
    },
    /// Move a fan to a level in percent.
    Level {
        /// Device name.
        device: String,
        /// Target level, 0-100.
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Show the reported state of a device.
    Status {
        /// Device name.
        device: String,
    },
    /// Read `<device> <operation>` lines from stdin.
    Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PowerState {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let path = config::resolve_path(args.config);
    let app_config = AppConfig::load(&path)?;
    tracing::info!(
        path = %path.display(),
        devices = app_config.devices.len(),
        "Loaded configuration"
    );

    if let Command::Check = args.command {
        println!(
            "{}: {} devices OK",
            path.display(),
            app_config.devices.len()
        );
        return Ok(());
    }

    let registry = DeviceRegistry::from_configs(&app_config.devices, Arc::new(HttpTransport::new()))
        .context("Failed to start devices")?;

    match args.command {
        Command::List => {
            for device in registry.iter() {
                println!("{}", shell::describe(device));
            }
            Ok(())
        }
        Command::Power { device, state } => {
            let on = matches!(state, PowerState::On);
            run_once(&registry, &device, Operation::Power(on)).await
        }
        Command::Toggle { device } => run_once(&registry, &device, Operation::Toggle).await,
        Command::Level { device, percent } => {
            run_once(&registry, &device, Operation::Level(percent)).await
        }
        Command::Status { device } => run_once(&registry, &device, Operation::Status).await,
        Command::Shell => shell::run(&registry).await,
        Command::Check => Ok(()),
    }
}

async fn run_once(registry: &DeviceRegistry, name: &str, operation: Operation) -> Result<()> {
    let device = registry.require(name)?;
    let summary = shell::execute(device, operation)
        .await
        .with_context(|| format!("{} failed", device.name()))?;
    println!("{}", summary);
    Ok(())
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var("IRBLAST_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if verbose { "irblast=debug" } else { "irblast=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(default_level).add_directive(tracing::Level::WARN.into())
    });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}
