// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shared fixtures for the Modbus server integration tests.

use std::time::{Duration, Instant};

use fieldnode_core::types::ValueKind;
use fieldnode_device::hal::sim::{
    SimInput, SimInputHandle, SimOutput, SimOutputHandle, SimProbe, SimProbeHandle,
};
use fieldnode_device::{DebouncedInput, Device, DeviceSet, RelayOutput, TemperatureProbe};
use fieldnode_modbus::{RegisterEntry, RegisterTable};

/// Handles into the simulated field wiring.
pub struct Rig {
    pub devices: DeviceSet,
    pub table: RegisterTable,
    pub probe1: SimProbeHandle,
    pub relay1: SimOutputHandle,
    pub input1: SimInputHandle,
}

/// Builds the reference controller wiring: two temperature probes in the
/// word space with x10 scaling, three relays and an input in the bit space.
pub fn rig() -> Rig {
    let mut devices = DeviceSet::new();

    let (bus, probe1) = SimProbe::new(23.4);
    let sensor1 = devices.insert(Device::Probe(fast_probe("sensor_1", bus)));
    let (bus, _probe2) = SimProbe::new(19.0);
    let sensor2 = devices.insert(Device::Probe(fast_probe("sensor_2", bus)));

    let (pin, relay1) = SimOutput::new();
    let r1 = devices.insert(Device::Relay(RelayOutput::new("relay_1", Box::new(pin))));
    let (pin, _) = SimOutput::new();
    let r2 = devices.insert(Device::Relay(RelayOutput::new("relay_2", Box::new(pin))));
    let (pin, _) = SimOutput::new();
    let r3 = devices.insert(Device::Relay(RelayOutput::new("relay_3", Box::new(pin))));

    let (pin, input1) = SimInput::new();
    let i1 = devices.insert(Device::Input(
        DebouncedInput::new("input_1", Box::new(pin)).with_debounce(Duration::from_millis(1)),
    ));
    let mut entries = vec![
        RegisterEntry::new(sensor1, ValueKind::Float, 0).with_multiplier(10.0),
        RegisterEntry::new(sensor2, ValueKind::Float, 1).with_multiplier(10.0),
        RegisterEntry::new(r1, ValueKind::Bool, 0),
        RegisterEntry::new(r2, ValueKind::Bool, 1),
        RegisterEntry::new(r3, ValueKind::Bool, 2),
        RegisterEntry::new(i1, ValueKind::Bool, 3),
    ];
    // Inputs 2..4 complete the reference bit space at addresses 4..=6.
    for (n, address) in [(2, 4u16), (3, 5), (4, 6)] {
        let (pin, _) = SimInput::new();
        let handle = devices.insert(Device::Input(
            DebouncedInput::new(format!("input_{n}"), Box::new(pin))
                .with_debounce(Duration::from_millis(1)),
        ));
        entries.push(RegisterEntry::new(handle, ValueKind::Bool, address));
    }

    // Collect one reading on each probe so the word space is live.
    let t0 = Instant::now();
    devices.advance_all(t0 + Duration::from_millis(10));
    devices.advance_all(t0 + Duration::from_millis(20));

    let table = RegisterTable::new(entries, &devices).expect("reference table is valid");

    Rig {
        devices,
        table,
        probe1,
        relay1,
        input1,
    }
}

/// Builds a device set with `count` inputs mapped densely from bit
/// address 0, for byte-count assertions over wider spans.
pub fn bit_rig(count: u16) -> (DeviceSet, RegisterTable) {
    let mut devices = DeviceSet::new();
    let mut entries = Vec::new();
    for address in 0..count {
        let (pin, _) = SimInput::new();
        let handle = devices.insert(Device::Input(DebouncedInput::new(
            format!("input_{address}"),
            Box::new(pin),
        )));
        entries.push(RegisterEntry::new(handle, ValueKind::Bool, address));
    }
    let table = RegisterTable::new(entries, &devices).expect("dense table is valid");
    (devices, table)
}

fn fast_probe(name: &str, bus: SimProbe) -> TemperatureProbe {
    TemperatureProbe::new(name, Box::new(bus))
        .with_read_interval(Duration::from_millis(1))
        .with_conversion_wait(Duration::from_millis(0))
}

/// Frames a PDU into a Modbus TCP request.
pub fn frame(transaction_id: u16, unit_id: u8, pdu: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(7 + pdu.len());
    out.extend_from_slice(&transaction_id.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
    out.push(unit_id);
    out.extend_from_slice(pdu);
    out
}
