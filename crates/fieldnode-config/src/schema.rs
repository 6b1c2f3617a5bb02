// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions.
//!
//! # Schema Structure
//!
//! ```text
//! FieldnodeConfig
//! ├── node: NodeConfig
//! ├── devices: Vec<DeviceConfig>
//! ├── registers: Vec<RegisterConfig>
//! ├── modbus: ModbusConfig
//! └── query: QueryConfig
//! ```
//!
//! Every level carries its own `validate()`; the top-level validation also
//! cross-checks register entries against the device list so a dangling
//! device reference or a colliding address fails at load time, not on the
//! wire.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Default input debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Default probe conversion poll interval in milliseconds.
pub const DEFAULT_READ_INTERVAL_MS: u64 = 5000;

/// Default probe conversion settling wait in milliseconds.
pub const DEFAULT_CONVERSION_WAIT_MS: u64 = 750;

/// Default probe fault retry backoff in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 30_000;

/// Default Modbus TCP port.
pub const DEFAULT_MODBUS_PORT: u16 = 502;

/// Default query server port.
pub const DEFAULT_QUERY_PORT: u16 = 8080;

/// Default number of Modbus connection slots.
pub const DEFAULT_MODBUS_SLOTS: u64 = 2;

/// Default per-slot request body capacity in bytes.
pub const DEFAULT_BODY_CAPACITY: u64 = 64;

/// Default per-slot response capacity in bytes.
pub const DEFAULT_RESPONSE_CAPACITY: u64 = 256;

/// Default query request line capacity in bytes.
pub const DEFAULT_REQUEST_CAPACITY: u64 = 128;

/// Default idle deadline for a bound connection in milliseconds.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 10_000;

/// Maximum interval accepted anywhere (1 hour), in milliseconds.
pub const MAX_INTERVAL_MS: u64 = 3_600_000;

/// Maximum number of Modbus connection slots.
pub const MAX_MODBUS_SLOTS: u64 = 64;

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration for one fieldnode controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldnodeConfig {
    /// Controller identification.
    pub node: NodeConfig,

    /// Device configurations.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    /// Register map entries binding devices to Modbus addresses.
    #[serde(default)]
    pub registers: Vec<RegisterConfig>,

    /// Modbus TCP server settings.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Query server settings.
    #[serde(default)]
    pub query: QueryConfig,
}

impl FieldnodeConfig {
    /// Validates the entire configuration.
    ///
    /// Checks each section, rejects duplicate device names, and
    /// cross-validates the register map: every entry must reference a
    /// configured device, and no two entries may share an address within
    /// one address space.
    pub fn validate(&self) -> ConfigResult<()> {
        self.node.validate()?;

        let mut names = std::collections::HashSet::new();
        for device in &self.devices {
            if !names.insert(&device.name) {
                return Err(ConfigError::duplicate_device_name(&device.name));
            }
            device.validate()?;
        }

        let mut bit_addresses = std::collections::HashSet::new();
        let mut word_addresses = std::collections::HashSet::new();
        for register in &self.registers {
            register.validate()?;
            let device = self
                .devices
                .iter()
                .find(|d| d.name == register.device)
                .ok_or_else(|| ConfigError::UnknownDevice {
                    device: register.device.clone(),
                    address: register.address,
                })?;
            let (space, seen) = if device.driver.is_bit_point() {
                ("bit", &mut bit_addresses)
            } else {
                ("word", &mut word_addresses)
            };
            if !seen.insert(register.address) {
                return Err(ConfigError::DuplicateAddress {
                    space,
                    address: register.address,
                });
            }
        }

        self.modbus.validate()?;
        self.query.validate()?;

        if self.modbus.enabled && self.query.enabled && self.modbus.port == self.query.port {
            return Err(ConfigError::validation(
                "query.port",
                format!("collides with modbus.port {}", self.modbus.port),
            ));
        }

        Ok(())
    }

    /// Returns a device configuration by name.
    pub fn get_device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.name == name)
    }
}

impl Default for FieldnodeConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            devices: Vec::new(),
            registers: Vec::new(),
            modbus: ModbusConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

// =============================================================================
// Node Configuration
// =============================================================================

/// Controller identification and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Unique controller identifier.
    pub id: String,

    /// Human-readable controller name.
    #[serde(default = "default_node_name")]
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,

    /// Installation location.
    #[serde(default)]
    pub location: Option<String>,
}

fn default_node_name() -> String {
    "fieldnode controller".to_string()
}

impl NodeConfig {
    /// Validates the node configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.id.is_empty() {
            return Err(ConfigError::validation("node.id", "cannot be empty"));
        }
        if self.id.len() > 64 {
            return Err(ConfigError::validation(
                "node.id",
                "cannot exceed 64 characters",
            ));
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: "fieldnode-01".to_string(),
            name: default_node_name(),
            description: None,
            location: None,
        }
    }
}

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for one device point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Unique device name; also the query server's URL segment.
    pub name: String,

    /// Driver selection and driver-specific settings.
    pub driver: DriverConfig,
}

impl DeviceConfig {
    /// Validates the device configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.is_empty() {
            return Err(ConfigError::validation("device.name", "cannot be empty"));
        }
        if self.name.contains('/') || self.name.contains(char::is_whitespace) {
            return Err(ConfigError::validation(
                format!("devices.{}.name", self.name),
                "must not contain '/' or whitespace",
            ));
        }
        self.driver.validate(&self.name)
    }
}

/// Driver-specific configuration, tagged by driver type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverConfig {
    /// Debounced binary input.
    Input(InputDriverConfig),

    /// Relay output.
    Relay(RelayDriverConfig),

    /// Temperature probe.
    Probe(ProbeDriverConfig),
}

impl DriverConfig {
    /// Validates the driver configuration.
    pub fn validate(&self, device_name: &str) -> ConfigResult<()> {
        match self {
            DriverConfig::Input(config) => config.validate(device_name),
            DriverConfig::Relay(_) => Ok(()),
            DriverConfig::Probe(config) => config.validate(device_name),
        }
    }

    /// Returns `true` for drivers addressed in the bit space (boolean
    /// points); `false` for word-space drivers.
    pub fn is_bit_point(&self) -> bool {
        matches!(self, DriverConfig::Input(_) | DriverConfig::Relay(_))
    }

    /// The driver type name.
    pub fn driver_type(&self) -> &'static str {
        match self {
            DriverConfig::Input(_) => "input",
            DriverConfig::Relay(_) => "relay",
            DriverConfig::Probe(_) => "probe",
        }
    }
}

/// Settings for a debounced binary input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDriverConfig {
    /// Debounce interval in milliseconds.
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

fn default_debounce() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl InputDriverConfig {
    /// Validates the input driver settings.
    pub fn validate(&self, device_name: &str) -> ConfigResult<()> {
        if self.debounce_ms == 0 || self.debounce_ms > MAX_INTERVAL_MS {
            return Err(ConfigError::out_of_range(
                format!("devices.{device_name}.debounce_ms"),
                self.debounce_ms,
                1,
                MAX_INTERVAL_MS,
            ));
        }
        Ok(())
    }

    /// The debounce interval as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for InputDriverConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// Settings for a relay output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayDriverConfig {
    /// Refuse writes through the network front-ends.
    #[serde(default)]
    pub read_only: bool,
}

/// Settings for a temperature probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeDriverConfig {
    /// Interval between conversions in milliseconds.
    #[serde(default = "default_read_interval")]
    pub read_interval_ms: u64,

    /// Conversion settling wait in milliseconds.
    #[serde(default = "default_conversion_wait")]
    pub conversion_wait_ms: u64,

    /// Backoff after a bus fault in milliseconds.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_read_interval() -> u64 {
    DEFAULT_READ_INTERVAL_MS
}

fn default_conversion_wait() -> u64 {
    DEFAULT_CONVERSION_WAIT_MS
}

fn default_retry_backoff() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

impl ProbeDriverConfig {
    /// Validates the probe driver settings.
    pub fn validate(&self, device_name: &str) -> ConfigResult<()> {
        let checks = [
            ("read_interval_ms", self.read_interval_ms),
            ("conversion_wait_ms", self.conversion_wait_ms),
            ("retry_backoff_ms", self.retry_backoff_ms),
        ];
        for (field, value) in checks {
            if value == 0 || value > MAX_INTERVAL_MS {
                return Err(ConfigError::out_of_range(
                    format!("devices.{device_name}.{field}"),
                    value,
                    1,
                    MAX_INTERVAL_MS,
                ));
            }
        }
        Ok(())
    }

    /// The conversion poll interval as a [`Duration`].
    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms)
    }

    /// The conversion settling wait as a [`Duration`].
    pub fn conversion_wait(&self) -> Duration {
        Duration::from_millis(self.conversion_wait_ms)
    }

    /// The fault retry backoff as a [`Duration`].
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for ProbeDriverConfig {
    fn default() -> Self {
        Self {
            read_interval_ms: DEFAULT_READ_INTERVAL_MS,
            conversion_wait_ms: DEFAULT_CONVERSION_WAIT_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

// =============================================================================
// Register Map Configuration
// =============================================================================

/// One register map entry.
///
/// The address space is implied by the referenced device's driver: inputs
/// and relays map into the bit space, probes into the word space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterConfig {
    /// Name of the configured device this entry binds.
    pub device: String,

    /// Address within the implied space.
    pub address: u16,

    /// Scaling multiplier applied before truncation to a 16-bit word.
    #[serde(default = "default_multiplier")]
    pub multiplier: f32,
}

fn default_multiplier() -> f32 {
    1.0
}

impl RegisterConfig {
    /// Validates one register entry in isolation.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.device.is_empty() {
            return Err(ConfigError::validation(
                "registers.device",
                format!("entry at address {} names no device", self.address),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier == 0.0 {
            return Err(ConfigError::validation(
                "registers.multiplier",
                format!(
                    "entry at address {} must be finite and non-zero",
                    self.address
                ),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Modbus Server Configuration
// =============================================================================

/// Modbus TCP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModbusConfig {
    /// Whether the Modbus server runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Listen address.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Listen port.
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Number of concurrently serviced connections.
    #[serde(default = "default_slots")]
    pub slots: u64,

    /// Per-slot request body capacity in bytes.
    #[serde(default = "default_body_capacity")]
    pub body_capacity: u64,

    /// Per-slot response capacity in bytes.
    #[serde(default = "default_response_capacity")]
    pub response_capacity: u64,

    /// Idle deadline for a bound connection in milliseconds; 0 disables.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_modbus_port() -> u16 {
    DEFAULT_MODBUS_PORT
}

fn default_slots() -> u64 {
    DEFAULT_MODBUS_SLOTS
}

fn default_body_capacity() -> u64 {
    DEFAULT_BODY_CAPACITY
}

fn default_response_capacity() -> u64 {
    DEFAULT_RESPONSE_CAPACITY
}

fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT_MS
}

impl ModbusConfig {
    /// Validates the Modbus server settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::validation("modbus.port", "cannot be zero"));
        }
        if self.slots == 0 || self.slots > MAX_MODBUS_SLOTS {
            return Err(ConfigError::out_of_range(
                "modbus.slots",
                self.slots,
                1,
                MAX_MODBUS_SLOTS,
            ));
        }
        if self.body_capacity < 8 || self.body_capacity > 1024 {
            return Err(ConfigError::out_of_range(
                "modbus.body_capacity",
                self.body_capacity,
                8,
                1024,
            ));
        }
        if self.response_capacity < 16 || self.response_capacity > 4096 {
            return Err(ConfigError::out_of_range(
                "modbus.response_capacity",
                self.response_capacity,
                16,
                4096,
            ));
        }
        if self.idle_timeout_ms > MAX_INTERVAL_MS {
            return Err(ConfigError::out_of_range(
                "modbus.idle_timeout_ms",
                self.idle_timeout_ms,
                0,
                MAX_INTERVAL_MS,
            ));
        }
        Ok(())
    }

    /// The idle deadline as a [`Duration`]; zero disables it.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
            port: DEFAULT_MODBUS_PORT,
            slots: DEFAULT_MODBUS_SLOTS,
            body_capacity: DEFAULT_BODY_CAPACITY,
            response_capacity: DEFAULT_RESPONSE_CAPACITY,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
        }
    }
}

// =============================================================================
// Query Server Configuration
// =============================================================================

/// Query server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Whether the query server runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Listen address.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Listen port.
    #[serde(default = "default_query_port")]
    pub port: u16,

    /// Request line capacity in bytes.
    #[serde(default = "default_request_capacity")]
    pub request_capacity: u64,

    /// Idle deadline for a connected client in milliseconds; 0 disables.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
}

fn default_query_port() -> u16 {
    DEFAULT_QUERY_PORT
}

fn default_request_capacity() -> u64 {
    DEFAULT_REQUEST_CAPACITY
}

impl QueryConfig {
    /// Validates the query server settings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::validation("query.port", "cannot be zero"));
        }
        if self.request_capacity < 32 || self.request_capacity > 4096 {
            return Err(ConfigError::out_of_range(
                "query.request_capacity",
                self.request_capacity,
                32,
                4096,
            ));
        }
        if self.idle_timeout_ms > MAX_INTERVAL_MS {
            return Err(ConfigError::out_of_range(
                "query.idle_timeout_ms",
                self.idle_timeout_ms,
                0,
                MAX_INTERVAL_MS,
            ));
        }
        Ok(())
    }

    /// The idle deadline as a [`Duration`]; zero disables it.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
            port: DEFAULT_QUERY_PORT,
            request_capacity: DEFAULT_REQUEST_CAPACITY,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> FieldnodeConfig {
        FieldnodeConfig {
            node: NodeConfig {
                id: "node-1".into(),
                ..NodeConfig::default()
            },
            devices: vec![
                DeviceConfig {
                    name: "relay_1".into(),
                    driver: DriverConfig::Relay(RelayDriverConfig::default()),
                },
                DeviceConfig {
                    name: "input_1".into(),
                    driver: DriverConfig::Input(InputDriverConfig::default()),
                },
                DeviceConfig {
                    name: "sensor_1".into(),
                    driver: DriverConfig::Probe(ProbeDriverConfig::default()),
                },
            ],
            registers: vec![
                RegisterConfig {
                    device: "relay_1".into(),
                    address: 0,
                    multiplier: 1.0,
                },
                RegisterConfig {
                    device: "input_1".into(),
                    address: 1,
                    multiplier: 1.0,
                },
                RegisterConfig {
                    device: "sensor_1".into(),
                    address: 0,
                    multiplier: 10.0,
                },
            ],
            modbus: ModbusConfig::default(),
            query: QueryConfig::default(),
        }
    }

    #[test]
    fn test_sample_config_validates() {
        sample_config().validate().unwrap();
    }

    #[test]
    fn test_empty_node_id_rejected() {
        let mut config = sample_config();
        config.node.id.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_duplicate_device_name_rejected() {
        let mut config = sample_config();
        config.devices.push(DeviceConfig {
            name: "relay_1".into(),
            driver: DriverConfig::Relay(RelayDriverConfig::default()),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateDeviceName { .. })
        ));
    }

    #[test]
    fn test_unknown_register_device_rejected() {
        let mut config = sample_config();
        config.registers.push(RegisterConfig {
            device: "ghost".into(),
            address: 9,
            multiplier: 1.0,
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownDevice { address: 9, .. })
        ));
    }

    #[test]
    fn test_same_address_in_both_spaces_allowed() {
        // relay_1 (bit) and sensor_1 (word) both sit at address 0 already.
        sample_config().validate().unwrap();
    }

    #[test]
    fn test_duplicate_bit_address_rejected() {
        let mut config = sample_config();
        config.registers.push(RegisterConfig {
            device: "input_1".into(),
            address: 0,
            multiplier: 1.0,
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateAddress {
                space: "bit",
                address: 0
            })
        ));
    }

    #[test]
    fn test_port_collision_rejected() {
        let mut config = sample_config();
        config.query.port = config.modbus.port;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_slot_range_enforced() {
        let mut config = sample_config();
        config.modbus.slots = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
        config.modbus.slots = MAX_MODBUS_SLOTS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_zero_multiplier_rejected() {
        let mut config = sample_config();
        config.registers[2].multiplier = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_driver_type_names() {
        let config = sample_config();
        assert_eq!(config.devices[0].driver.driver_type(), "relay");
        assert_eq!(config.devices[1].driver.driver_type(), "input");
        assert_eq!(config.devices[2].driver.driver_type(), "probe");
        assert!(config.devices[0].driver.is_bit_point());
        assert!(!config.devices[2].driver.is_bit_point());
    }

    #[test]
    fn test_defaults() {
        let modbus = ModbusConfig::default();
        assert!(modbus.enabled);
        assert_eq!(modbus.port, 502);
        assert_eq!(modbus.slots, 2);
        assert_eq!(modbus.idle_timeout(), Duration::from_secs(10));

        let probe = ProbeDriverConfig::default();
        assert_eq!(probe.read_interval(), Duration::from_secs(5));
        assert_eq!(probe.conversion_wait(), Duration::from_millis(750));
        assert_eq!(probe.retry_backoff(), Duration::from_secs(30));
    }
}
