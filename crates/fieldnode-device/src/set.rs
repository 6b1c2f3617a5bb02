// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The closed device set.
//!
//! [`Device`] is the closed set of device kinds the controller knows about;
//! the capability surface (read / write / kind / advance) dispatches by
//! pattern matching. [`DeviceSet`] owns every device for the process
//! lifetime, and the protocol front-ends hold [`DeviceHandle`] indices into
//! it — handles stay valid because the set is built once and never
//! reconfigured at runtime.

use std::time::Instant;

use fieldnode_core::types::{Value, ValueKind, WriteOutcome};

use crate::input::DebouncedInput;
use crate::output::RelayOutput;
use crate::probe::TemperatureProbe;

// =============================================================================
// Device
// =============================================================================

/// One addressable device point.
#[derive(Debug)]
pub enum Device {
    /// Debounced binary input (read-only boolean).
    Input(DebouncedInput),
    /// Relay output (writable boolean).
    Relay(RelayOutput),
    /// Temperature probe (read-only float).
    Probe(TemperatureProbe),
}

impl Device {
    /// The configured device name.
    pub fn name(&self) -> &str {
        match self {
            Device::Input(d) => d.name(),
            Device::Relay(d) => d.name(),
            Device::Probe(d) => d.name(),
        }
    }

    /// The declared value kind. Immutable for the device's lifetime.
    pub fn kind(&self) -> ValueKind {
        match self {
            Device::Input(_) | Device::Relay(_) => ValueKind::Bool,
            Device::Probe(_) => ValueKind::Float,
        }
    }

    /// Reads the current value. Never blocks.
    pub fn read(&self) -> Value {
        match self {
            Device::Input(d) => Value::Bool(d.is_active()),
            Device::Relay(d) => Value::Bool(d.is_energized()),
            Device::Probe(d) => Value::Float(d.celsius()),
        }
    }

    /// Attempts to write a value.
    pub fn write(&mut self, value: Value) -> WriteOutcome {
        match self {
            Device::Input(_) => WriteOutcome::NotSupported,
            Device::Relay(d) => d.write(value),
            Device::Probe(_) => WriteOutcome::NotSupported,
        }
    }

    /// Advances the device's own state machine. Returns `true` if it did
    /// work this tick.
    pub fn advance(&mut self, now: Instant) -> bool {
        match self {
            Device::Input(d) => d.advance(now),
            Device::Relay(_) => false,
            Device::Probe(d) => d.advance(now),
        }
    }

    /// Serializes the current value for the query front-end.
    ///
    /// A probe without a usable reading serializes as null.
    pub fn value_json(&self) -> serde_json::Value {
        match self {
            Device::Input(d) => serde_json::Value::Bool(d.is_active()),
            Device::Relay(d) => serde_json::Value::Bool(d.is_energized()),
            Device::Probe(d) => {
                if d.has_reading() {
                    serde_json::json!(d.celsius())
                } else {
                    serde_json::Value::Null
                }
            }
        }
    }
}

// =============================================================================
// DeviceSet
// =============================================================================

/// A stable index into a [`DeviceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(usize);

impl DeviceHandle {
    /// The raw index.
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The owned collection of every device on the controller.
///
/// Built once at startup; devices are never added or removed afterwards,
/// which is what makes [`DeviceHandle`] safe to store in the register table.
#[derive(Debug, Default)]
pub struct DeviceSet {
    devices: Vec<Device>,
}

impl DeviceSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device and returns its stable handle.
    pub fn insert(&mut self, device: Device) -> DeviceHandle {
        self.devices.push(device);
        DeviceHandle(self.devices.len() - 1)
    }

    /// Number of devices in the set.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if the set holds no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Looks up a device by handle.
    pub fn get(&self, handle: DeviceHandle) -> Option<&Device> {
        self.devices.get(handle.0)
    }

    /// Looks up a device mutably by handle.
    pub fn get_mut(&mut self, handle: DeviceHandle) -> Option<&mut Device> {
        self.devices.get_mut(handle.0)
    }

    /// Finds a device handle by configured name.
    pub fn handle_by_name(&self, name: &str) -> Option<DeviceHandle> {
        self.devices
            .iter()
            .position(|d| d.name() == name)
            .map(DeviceHandle)
    }

    /// Iterates over the devices in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    /// Advances every device once, in insertion order.
    ///
    /// Returns `true` if any device did work.
    pub fn advance_all(&mut self, now: Instant) -> bool {
        let mut busy = false;
        for device in &mut self.devices {
            busy |= device.advance(now);
        }
        busy
    }
}

// =============================================================================
// Value parsing
// =============================================================================

/// Parses a textual value for a device of the given kind.
///
/// Booleans accept `1`/`0`, `true`/`false` and `on`/`off` (case-insensitive),
/// matching what field tooling tends to send. Returns `None` when the text
/// does not parse as the requested kind.
pub fn parse_value(kind: ValueKind, text: &str) -> Option<Value> {
    match kind {
        ValueKind::Bool => match text.to_ascii_lowercase().as_str() {
            "1" | "true" | "on" => Some(Value::Bool(true)),
            "0" | "false" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        ValueKind::Int => text.parse::<i32>().ok().map(Value::Int),
        ValueKind::Float => text.parse::<f32>().ok().map(Value::Float),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::{SimInput, SimOutput, SimProbe};
    use std::time::Duration;

    fn sample_set() -> DeviceSet {
        let mut set = DeviceSet::new();
        let (pin, _) = SimInput::new();
        set.insert(Device::Input(DebouncedInput::new("input_1", Box::new(pin))));
        let (pin, _) = SimOutput::new();
        set.insert(Device::Relay(RelayOutput::new("relay_1", Box::new(pin))));
        let (bus, _) = SimProbe::new(23.4);
        set.insert(Device::Probe(TemperatureProbe::new("sensor_1", Box::new(bus))));
        set
    }

    #[test]
    fn test_handles_are_stable_and_named() {
        let set = sample_set();
        assert_eq!(set.len(), 3);
        let relay = set.handle_by_name("relay_1").unwrap();
        assert_eq!(set.get(relay).unwrap().name(), "relay_1");
        assert!(set.handle_by_name("missing").is_none());
    }

    #[test]
    fn test_kinds_and_write_dispatch() {
        let mut set = sample_set();
        let input = set.handle_by_name("input_1").unwrap();
        let relay = set.handle_by_name("relay_1").unwrap();
        let probe = set.handle_by_name("sensor_1").unwrap();

        assert_eq!(set.get(input).unwrap().kind(), ValueKind::Bool);
        assert_eq!(set.get(probe).unwrap().kind(), ValueKind::Float);

        assert_eq!(
            set.get_mut(input).unwrap().write(Value::Bool(true)),
            WriteOutcome::NotSupported
        );
        assert_eq!(
            set.get_mut(probe).unwrap().write(Value::Float(1.0)),
            WriteOutcome::NotSupported
        );
        assert_eq!(
            set.get_mut(relay).unwrap().write(Value::Bool(true)),
            WriteOutcome::Accepted
        );
        assert_eq!(set.get(relay).unwrap().read(), Value::Bool(true));
    }

    #[test]
    fn test_probe_serializes_null_until_reading() {
        let mut set = sample_set();
        let probe = set.handle_by_name("sensor_1").unwrap();
        assert_eq!(set.get(probe).unwrap().value_json(), serde_json::Value::Null);

        // Drive the probe through one conversion cycle.
        let t0 = Instant::now();
        if let Device::Probe(p) = set.get_mut(probe).unwrap() {
            p.advance(t0 + Duration::from_secs(6));
            p.advance(t0 + Duration::from_secs(7));
        }
        assert_eq!(set.get(probe).unwrap().value_json(), serde_json::json!(23.4f32));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(ValueKind::Bool, "ON"), Some(Value::Bool(true)));
        assert_eq!(parse_value(ValueKind::Bool, "0"), Some(Value::Bool(false)));
        assert_eq!(parse_value(ValueKind::Bool, "maybe"), None);
        assert_eq!(parse_value(ValueKind::Int, "-12"), Some(Value::Int(-12)));
        assert_eq!(parse_value(ValueKind::Int, "1.5"), None);
        assert_eq!(parse_value(ValueKind::Float, "23.4"), Some(Value::Float(23.4)));
    }
}
