// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Controller wiring and the cooperative polling loop.
//!
//! The configuration describes the node; this module turns it into running
//! parts — the owned device set over simulated pins, the validated register
//! table, and the two network front-ends — and composes their `advance()`
//! steps into one bounded tick. The outer loop in the `run` command calls
//! [`Controller::advance_once`] forever and sleeps briefly when a whole
//! pass was idle.

use std::time::Instant;

use tracing::info;

use fieldnode_config::{DriverConfig, FieldnodeConfig};
use fieldnode_core::transport::Listener;
use fieldnode_device::hal::sim::{
    SimInput, SimInputHandle, SimOutput, SimOutputHandle, SimProbe, SimProbeHandle,
};
use fieldnode_device::{
    DebouncedInput, Device, DeviceSet, DiagLed, RelayOutput, TemperatureProbe,
};
use fieldnode_modbus::{ModbusServer, PoolConfig, RegisterEntry, RegisterTable};
use fieldnode_query::{QueryConfig as QueryServerConfig, QueryServer};

use crate::error::{BinError, BinResult};

// =============================================================================
// Simulated bench
// =============================================================================

/// The host-side handles of every simulated pin, by device name.
///
/// The firmware is process-hosted: these handles are the "hardware" side of
/// the HAL seam, used by tests (and any embedding host) to drive input
/// levels and observe relay and LED lines.
#[derive(Debug, Default)]
pub struct SimBench {
    /// Input line handles.
    pub inputs: Vec<(String, SimInputHandle)>,
    /// Relay line handles.
    pub relays: Vec<(String, SimOutputHandle)>,
    /// Probe bus handles.
    pub probes: Vec<(String, SimProbeHandle)>,
}

// =============================================================================
// Construction from configuration
// =============================================================================

/// Builds the owned device set from the configuration.
///
/// Devices are created in configuration order, so handles are stable for
/// the process lifetime.
pub fn build_devices(config: &FieldnodeConfig) -> (DeviceSet, SimBench) {
    let mut devices = DeviceSet::new();
    let mut bench = SimBench::default();

    for device in &config.devices {
        match &device.driver {
            DriverConfig::Input(settings) => {
                let (pin, handle) = SimInput::new();
                bench.inputs.push((device.name.clone(), handle));
                devices.insert(Device::Input(
                    DebouncedInput::new(&device.name, Box::new(pin))
                        .with_debounce(settings.debounce()),
                ));
            }
            DriverConfig::Relay(settings) => {
                let (pin, handle) = SimOutput::new();
                bench.relays.push((device.name.clone(), handle));
                devices.insert(Device::Relay(
                    RelayOutput::new(&device.name, Box::new(pin))
                        .with_read_only(settings.read_only),
                ));
            }
            DriverConfig::Probe(settings) => {
                let (bus, handle) = SimProbe::new(0.0);
                bench.probes.push((device.name.clone(), handle));
                devices.insert(Device::Probe(
                    TemperatureProbe::new(&device.name, Box::new(bus))
                        .with_read_interval(settings.read_interval())
                        .with_conversion_wait(settings.conversion_wait())
                        .with_retry_backoff(settings.retry_backoff()),
                ));
            }
        }
    }

    (devices, bench)
}

/// Builds the validated register table from the configuration.
///
/// # Errors
///
/// [`BinError::Configuration`] for a register naming no built device, and
/// [`BinError::Table`] for anything table validation rejects.
pub fn build_table(config: &FieldnodeConfig, devices: &DeviceSet) -> BinResult<RegisterTable> {
    let mut entries = Vec::with_capacity(config.registers.len());
    for register in &config.registers {
        let handle = devices.handle_by_name(&register.device).ok_or_else(|| {
            BinError::config(format!(
                "register at address {} names unknown device '{}'",
                register.address, register.device
            ))
        })?;
        let kind = devices
            .get(handle)
            .ok_or_else(|| BinError::config("device handle out of range"))?
            .kind();
        entries.push(
            RegisterEntry::new(handle, kind, register.address)
                .with_multiplier(register.multiplier),
        );
    }
    Ok(RegisterTable::new(entries, devices)?)
}

/// Maps the Modbus settings to the pool's sizing.
pub fn pool_config(settings: &fieldnode_config::ModbusConfig) -> PoolConfig {
    PoolConfig {
        slots: settings.slots as usize,
        body_capacity: settings.body_capacity as usize,
        response_capacity: settings.response_capacity as usize,
        idle_timeout: settings.idle_timeout(),
    }
}

/// Maps the query settings to the query server's sizing.
pub fn query_config(settings: &fieldnode_config::QueryConfig) -> QueryServerConfig {
    QueryServerConfig {
        request_capacity: settings.request_capacity as usize,
        idle_timeout: settings.idle_timeout(),
    }
}

// =============================================================================
// Controller
// =============================================================================

/// The assembled controller: devices, register table, front-ends, and the
/// activity indicator, advanced together one bounded tick at a time.
pub struct Controller<M: Listener, Q: Listener> {
    devices: DeviceSet,
    table: RegisterTable,
    modbus: Option<ModbusServer<M>>,
    query: Option<QueryServer<Q>>,
    diag: DiagLed,
}

impl<M: Listener, Q: Listener> Controller<M, Q> {
    /// Assembles a controller from already-built parts.
    pub fn new(
        devices: DeviceSet,
        table: RegisterTable,
        modbus: Option<ModbusServer<M>>,
        query: Option<QueryServer<Q>>,
        diag: DiagLed,
    ) -> Self {
        info!(
            devices = devices.len(),
            registers = table.len(),
            modbus = modbus.is_some(),
            query = query.is_some(),
            "controller assembled"
        );
        Self {
            devices,
            table,
            modbus,
            query,
            diag,
        }
    }

    /// The owned device set.
    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    /// Advances every subsystem once, in fixed order.
    ///
    /// Pulses the activity LED when any subsystem did work. Returns `true`
    /// if the tick was not idle, for the caller's backoff decision.
    pub fn advance_once(&mut self, now: Instant) -> bool {
        let mut busy = false;

        if let Some(modbus) = self.modbus.as_mut() {
            busy |= modbus.advance(&self.table, &mut self.devices, now);
        }
        if let Some(query) = self.query.as_mut() {
            busy |= query.advance(&mut self.devices, now);
        }
        busy |= self.devices.advance_all(now);

        if busy {
            self.diag.pulse(now);
        }
        busy | self.diag.advance(now)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fieldnode_config::{
        ConfigFormat, DeviceConfig, InputDriverConfig, NodeConfig, ProbeDriverConfig,
        RegisterConfig, RelayDriverConfig,
    };
    use fieldnode_core::transport::mem::MemListener;
    use fieldnode_core::types::{Value, ValueKind};
    use fieldnode_modbus::AddressSpace;
    use std::time::Duration;

    fn sample_config() -> FieldnodeConfig {
        FieldnodeConfig {
            node: NodeConfig {
                id: "test-node".into(),
                ..NodeConfig::default()
            },
            devices: vec![
                DeviceConfig {
                    name: "relay_1".into(),
                    driver: DriverConfig::Relay(RelayDriverConfig::default()),
                },
                DeviceConfig {
                    name: "input_1".into(),
                    driver: DriverConfig::Input(InputDriverConfig { debounce_ms: 5 }),
                },
                DeviceConfig {
                    name: "sensor_1".into(),
                    driver: DriverConfig::Probe(ProbeDriverConfig {
                        read_interval_ms: 10,
                        conversion_wait_ms: 1,
                        retry_backoff_ms: 1000,
                    }),
                },
            ],
            registers: vec![
                RegisterConfig {
                    device: "relay_1".into(),
                    address: 0,
                    multiplier: 1.0,
                },
                RegisterConfig {
                    device: "sensor_1".into(),
                    address: 0,
                    multiplier: 10.0,
                },
            ],
            ..FieldnodeConfig::default()
        }
    }

    #[test]
    fn test_build_devices_in_config_order() {
        let (devices, bench) = build_devices(&sample_config());
        assert_eq!(devices.len(), 3);
        assert_eq!(bench.relays.len(), 1);
        assert_eq!(bench.inputs.len(), 1);
        assert_eq!(bench.probes.len(), 1);
        assert_eq!(bench.relays[0].0, "relay_1");

        let relay = devices.handle_by_name("relay_1").unwrap();
        assert_eq!(devices.get(relay).unwrap().kind(), ValueKind::Bool);
        let probe = devices.handle_by_name("sensor_1").unwrap();
        assert_eq!(devices.get(probe).unwrap().kind(), ValueKind::Float);
    }

    #[test]
    fn test_build_table_maps_spaces_by_driver() {
        let config = sample_config();
        let (devices, _bench) = build_devices(&config);
        let table = build_table(&config, &devices).unwrap();

        let bit = table.lookup(AddressSpace::Bit, 0).unwrap();
        assert_eq!(bit.kind, ValueKind::Bool);
        let word = table.lookup(AddressSpace::Word, 0).unwrap();
        assert_eq!(word.kind, ValueKind::Float);
        assert_eq!(word.multiplier, 10.0);
    }

    #[test]
    fn test_build_table_unknown_device() {
        let mut config = sample_config();
        config.registers.push(RegisterConfig {
            device: "ghost".into(),
            address: 7,
            multiplier: 1.0,
        });
        let (devices, _bench) = build_devices(&config);
        let err = build_table(&config, &devices).unwrap_err();
        assert!(matches!(err, BinError::Configuration(_)));
    }

    #[test]
    fn test_config_sizes_flow_into_pool() {
        let mut config = sample_config();
        config.modbus.slots = 5;
        config.modbus.idle_timeout_ms = 0;
        let pool = pool_config(&config.modbus);
        assert_eq!(pool.slots, 5);
        assert!(pool.idle_timeout.is_zero());

        let query = query_config(&config.query);
        assert_eq!(query.request_capacity, 128);
    }

    #[test]
    fn test_controller_serves_both_front_ends() {
        let config = sample_config();
        let (devices, bench) = build_devices(&config);
        let table = build_table(&config, &devices).unwrap();

        let mut modbus_listener = MemListener::new();
        let modbus_peer = modbus_listener.connect();
        // Write Single Coil: relay_1 at bit address 0 -> on.
        modbus_peer.send(&[
            0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x00, 0xFF, 0x00,
        ]);

        let mut query_listener = MemListener::new();
        let query_peer = query_listener.connect();
        query_peer.send(b"GET / HTTP/1.1\r\n\r\n");

        let (led_pin, led) = SimOutput::new();
        let mut controller = Controller::new(
            devices,
            table,
            Some(ModbusServer::new(
                modbus_listener,
                pool_config(&config.modbus),
            )),
            Some(QueryServer::new(query_listener, query_config(&config.query))),
            DiagLed::new(Box::new(led_pin)),
        );

        let now = Instant::now();
        for _ in 0..20 {
            controller.advance_once(now);
        }

        // Modbus response echoed, relay driven, query answered, LED pulsed.
        assert_eq!(
            modbus_peer.take_received(),
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x00, 0xFF, 0x00]
        );
        assert!(bench.relays[0].1.is_active());
        let response = String::from_utf8(query_peer.take_received()).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("\"relay_1\":true"));
        assert!(led.is_active());

        let relay = controller.devices().handle_by_name("relay_1").unwrap();
        assert_eq!(
            controller.devices().get(relay).unwrap().read(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_idle_controller_reports_idle() {
        // Only a relay: no periodic device work to keep the loop busy.
        let mut config = sample_config();
        config.devices.truncate(1);
        config.registers.truncate(1);
        let (devices, _bench) = build_devices(&config);
        let table = build_table(&config, &devices).unwrap();
        let (led_pin, _led) = SimOutput::new();
        let mut controller: Controller<MemListener, MemListener> = Controller::new(
            devices,
            table,
            Some(ModbusServer::new(MemListener::new(), PoolConfig::default())),
            None,
            DiagLed::new(Box::new(led_pin)),
        );

        let t0 = Instant::now();
        // Startup ticks do work (server start message, LED pulse/expiry).
        for _ in 0..5 {
            controller.advance_once(t0);
        }
        controller.advance_once(t0 + Duration::from_secs(1));
        // With nothing connected and no device activity due, a pass is idle.
        assert!(!controller.advance_once(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn test_yaml_round_trip_through_runtime() {
        let yaml = r#"
node:
  id: rt-node
devices:
  - name: relay_1
    driver:
      type: relay
registers:
  - device: relay_1
    address: 4
"#;
        let config = fieldnode_config::load_config_str(yaml, ConfigFormat::Yaml).unwrap();
        let (devices, _bench) = build_devices(&config);
        let table = build_table(&config, &devices).unwrap();
        assert!(table.lookup(AddressSpace::Bit, 4).is_some());
    }
}
