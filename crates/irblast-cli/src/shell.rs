//! Device operations shared by the one-shot commands and the interactive shell.

use anyhow::{bail, Context, Result};
use irblast_devices::{Appliance, DeviceHandle, DeviceRegistry, DeviceShape};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::debug;

/// One operation on a named device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Power(bool),
    Toggle,
    Level(u8),
    Status,
}

/// Parse `<device> on|off|toggle|level <percent>|status`.
///
/// Device names may contain spaces; the operation is read from the end.
pub fn parse_line(line: &str) -> Result<(String, Operation)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (name, operation) = match tokens.as_slice() {
        [name @ .., "level", percent] if !name.is_empty() => {
            let percent: u8 = percent
                .trim_end_matches('%')
                .parse()
                .with_context(|| format!("Invalid level '{}'", percent))?;
            (name, Operation::Level(percent))
        }
        [name @ .., verb] if !name.is_empty() => {
            let operation = match verb.to_ascii_lowercase().as_str() {
                "on" => Operation::Power(true),
                "off" => Operation::Power(false),
                "toggle" => Operation::Toggle,
                "status" => Operation::Status,
                other => bail!("Unknown operation '{}'", other),
            };
            (name, operation)
        }
        _ => bail!("Expected '<device> on|off|toggle|level <percent>|status'"),
    };
    Ok((name.join(" "), operation))
}

/// Run `operation` against `device` and describe the result.
pub async fn execute(device: &DeviceHandle, operation: Operation) -> Result<String> {
    match operation {
        Operation::Power(on) => device.set_power(on).await?,
        Operation::Toggle => {
            // A toggle device only ever sends the toggle signal.
            let target = matches!(device.shape(), DeviceShape::Toggle { .. }) || !device.power();
            device.set_power(target).await?
        }
        Operation::Level(percent) => device.set_level(percent).await?,
        Operation::Status => {}
    }
    Ok(describe(device))
}

/// One-line summary of a device's reported state.
pub fn describe(device: &DeviceHandle) -> String {
    let state = device.state();
    let power = if state.power { "on" } else { "off" };
    match device.shape() {
        DeviceShape::SwitchWithLevel { .. } => format!(
            "{} ({}): {}, level {}%",
            device.name(),
            device.shape().kind(),
            power,
            state.level
        ),
        shape => format!("{} ({}): {}", device.name(), shape.kind(), power),
    }
}

/// Read operations from stdin until EOF, running each one as it arrives.
///
/// Lines are not serialized: a command typed while a previous one is still
/// transmitting reaches the device immediately and may be rejected as busy.
pub async fn run(registry: &DeviceRegistry) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut running = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "list" => {
                for device in registry.iter() {
                    println!("{}", describe(device));
                }
                continue;
            }
            _ => {}
        }

        let (name, operation) = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        let device = match registry.require(&name) {
            Ok(device) => device.clone(),
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        debug!(device = %name, ?operation, "Shell command");
        running.spawn(async move {
            match execute(&device, operation).await {
                Ok(summary) => println!("{}", summary),
                Err(e) => eprintln!("{}: {}", device.name(), e),
            }
        });
    }

    while running.join_next().await.is_some() {}
    Ok(())
}
