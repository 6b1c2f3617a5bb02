// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldnode-config
//!
//! Configuration management for the fieldnode controller firmware.
//!
//! The schema describes the whole controller: node identity, the device
//! list (inputs, relays, probes), the register map binding devices to
//! Modbus addresses, and the two network front-ends. Configuration is
//! loaded once at startup and validated eagerly — the firmware fails fast
//! on a bad file rather than discovering problems on the wire.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fieldnode_config::load_config;
//!
//! let config = load_config("fieldnode.yaml").unwrap();
//! println!("node: {}", config.node.id);
//! println!("devices: {}", config.devices.len());
//! ```
//!
//! ## Formats and overrides
//!
//! YAML, TOML, and JSON files are selected by extension. Raw content may
//! reference environment variables as `${VAR}` or `${VAR:default}`, and
//! scalar settings accept `FIELDNODE_`-prefixed overrides
//! (`FIELDNODE_MODBUS_PORT=1502`).

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader};
pub use schema::{
    DeviceConfig, DriverConfig, FieldnodeConfig, InputDriverConfig, ModbusConfig, NodeConfig,
    ProbeDriverConfig, QueryConfig, RegisterConfig, RelayDriverConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
