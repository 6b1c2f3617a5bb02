// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use fieldnode_config::{ConfigLoader, FieldnodeConfig};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to check a configuration file.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let config = ConfigLoader::new().load(config_path)?;
    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("configuration is valid: {}", config_path.display());
            println!();
            println!("summary:");
            println!("  node id:   {}", config.node.id);
            println!("  devices:   {}", config.devices.len());
            println!("  registers: {}", config.registers.len());
            println!(
                "  modbus:    {}",
                server_summary(config.modbus.enabled, config.modbus.port)
            );
            println!(
                "  query:     {}",
                server_summary(config.query.enabled, config.query.port)
            );

            if !warnings.is_empty() {
                println!();
                println!("warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "node_id": config.node.id,
                    "device_count": config.devices.len(),
                    "register_count": config.registers.len(),
                    "modbus_enabled": config.modbus.enabled,
                    "modbus_port": config.modbus.port,
                    "query_enabled": config.query.enabled,
                    "query_port": config.query.port,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output)
                    .unwrap_or_else(|_| "(serialization error)".to_string())
            );
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

fn server_summary(enabled: bool, port: u16) -> String {
    if enabled {
        format!("enabled (port {port})")
    } else {
        "disabled".to_string()
    }
}

/// Collects non-fatal findings a deployment should know about.
fn collect_warnings(config: &FieldnodeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.devices.is_empty() {
        warnings.push("no devices configured".to_string());
    }
    if config.registers.is_empty() && config.modbus.enabled {
        warnings.push(
            "no registers mapped; the modbus server will answer only exceptions".to_string(),
        );
    }
    if !config.modbus.enabled && !config.query.enabled {
        warnings.push("both network front-ends are disabled".to_string());
    }
    for device in &config.devices {
        if !config.registers.iter().any(|r| r.device == device.name) {
            warnings.push(format!(
                "device '{}' is not mapped to any register",
                device.name
            ));
        }
    }

    warnings
}

// =============================================================================
// Tests
// =============================================================================
