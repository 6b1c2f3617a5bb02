// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Function-code dispatch and exception mapping.
//!
//! The codec is pure request/response logic: given a PDU (function code +
//! payload), it consults the register table and device set and encodes the
//! response PDU — or an exception PDU with bit 7 of the function-code byte
//! set. It never touches the transport and never blocks; device reads and
//! writes are immediate by contract.
//!
//! Capacity is checked before anything is written into the output buffer,
//! so a response that cannot fit fails cleanly with exception 0x04 instead
//! of corrupting a partially written frame.

use tracing::{debug, trace};

use fieldnode_core::buffer::FixedBuf;
use fieldnode_core::error::BufferError;
use fieldnode_core::types::{Value, WriteOutcome};
use fieldnode_device::DeviceSet;

use crate::pack::{be_u16, coil_byte_count, pack_bits, register_byte_count, scale_to_word};
use crate::table::{AddressSpace, RegisterTable};

/// Bit 7 of the function-code byte marks an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Highest coil/discrete-input quantity accepted in one read.
pub const MAX_BIT_QUANTITY: u16 = 2000;

/// Highest register quantity accepted in one read.
pub const MAX_WORD_QUANTITY: u16 = 125;

/// Coil value bytes for "on" in Write Single Coil.
pub const COIL_ON: u16 = 0xFF00;

/// Coil value bytes for "off" in Write Single Coil.
pub const COIL_OFF: u16 = 0x0000;

// =============================================================================
// Function and exception codes
// =============================================================================

/// The function codes this server implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    /// 0x01: read coils from the bit space.
    ReadCoils = 0x01,
    /// 0x02: read discrete inputs from the bit space.
    ReadDiscreteInputs = 0x02,
    /// 0x03: read holding registers from the word space.
    ReadHoldingRegisters = 0x03,
    /// 0x04: read input registers from the word space.
    ReadInputRegisters = 0x04,
    /// 0x05: write a single coil in the bit space.
    WriteSingleCoil = 0x05,
}

impl FunctionCode {
    /// Decodes a function-code byte. `None` for unsupported codes.
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(FunctionCode::ReadCoils),
            0x02 => Some(FunctionCode::ReadDiscreteInputs),
            0x03 => Some(FunctionCode::ReadHoldingRegisters),
            0x04 => Some(FunctionCode::ReadInputRegisters),
            0x05 => Some(FunctionCode::WriteSingleCoil),
            _ => None,
        }
    }

    /// The wire byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// The address space this function operates on.
    pub const fn space(&self) -> AddressSpace {
        match self {
            FunctionCode::ReadCoils
            | FunctionCode::ReadDiscreteInputs
            | FunctionCode::WriteSingleCoil => AddressSpace::Bit,
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
                AddressSpace::Word
            }
        }
    }
}

/// Modbus exception codes surfaced by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionCode {
    /// 0x01: unsupported function, or a write to a point that takes none.
    IllegalFunction = 0x01,
    /// 0x02: an address in the request is not mapped in the matching space.
    IllegalDataAddress = 0x02,
    /// 0x03: malformed payload or unacceptable value.
    IllegalDataValue = 0x03,
    /// 0x04: device failure, or a response that cannot fit the buffer.
    SlaveDeviceFailure = 0x04,
}

impl ExceptionCode {
    /// The wire byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }
}

// =============================================================================
// Request processing
// =============================================================================

/// Processes one request PDU, appending the response PDU to `out`.
///
/// Protocol-level problems (unknown address, bad value, unsupported
/// function, response too large) are encoded as exception PDUs and still
/// return `Ok`.
///
/// # Errors
///
/// Returns [`BufferError`] only when even the two-byte exception PDU does
/// not fit `out` — the caller sized the response buffer below the framing
/// minimum, and the connection should be dropped.
pub fn process(
    pdu: &[u8],
    table: &RegisterTable,
    devices: &mut DeviceSet,
    out: &mut FixedBuf,
) -> Result<(), BufferError> {
    let mark = out.len();

    let (fc_byte, payload) = match pdu.split_first() {
        Some((fc, rest)) => (*fc, rest),
        // An empty PDU has no function code to echo.
        None => return write_exception(out, mark, 0, ExceptionCode::IllegalDataValue),
    };

    let outcome = match FunctionCode::from_u8(fc_byte) {
        Some(fc) => {
            trace!(function = ?fc, payload_len = payload.len(), "dispatching request");
            dispatch(fc, payload, table, devices, out)
        }
        None => Err(ExceptionCode::IllegalFunction),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(code) => {
            debug!(
                function = fc_byte,
                exception = code.as_u8(),
                "request answered with exception"
            );
            write_exception(out, mark, fc_byte, code)
        }
    }
}

fn write_exception(
    out: &mut FixedBuf,
    mark: usize,
    fc_byte: u8,
    code: ExceptionCode,
) -> Result<(), BufferError> {
    out.truncate(mark);
    out.push(fc_byte | EXCEPTION_FLAG)?;
    out.push(code.as_u8())?;
    Ok(())
}

fn dispatch(
    fc: FunctionCode,
    payload: &[u8],
    table: &RegisterTable,
    devices: &mut DeviceSet,
    out: &mut FixedBuf,
) -> Result<(), ExceptionCode> {
    match fc {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
            read_bits(fc, payload, table, devices, out)
        }
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
            read_words(fc, payload, table, devices, out)
        }
        FunctionCode::WriteSingleCoil => write_single_coil(fc, payload, table, devices, out),
    }
}

/// Read Coils / Read Discrete Inputs: pack `quantity` booleans LSB-first,
/// first address into bit 0 of byte 0.
fn read_bits(
    fc: FunctionCode,
    payload: &[u8],
    table: &RegisterTable,
    devices: &DeviceSet,
    out: &mut FixedBuf,
) -> Result<(), ExceptionCode> {
    if payload.len() != 4 {
        return Err(ExceptionCode::IllegalDataValue);
    }
    let start = be_u16(&payload[0..2]);
    let quantity = be_u16(&payload[2..4]);
    if quantity == 0 || quantity > MAX_BIT_QUANTITY {
        return Err(ExceptionCode::IllegalDataValue);
    }

    let byte_count = coil_byte_count(quantity);
    if 2 + byte_count > out.remaining() {
        return Err(ExceptionCode::SlaveDeviceFailure);
    }

    let mut bits = Vec::with_capacity(quantity as usize);
    for offset in 0..quantity {
        let address = start
            .checked_add(offset)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        let entry = table
            .lookup(AddressSpace::Bit, address)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        let device = devices
            .get(entry.device)
            .ok_or(ExceptionCode::SlaveDeviceFailure)?;
        bits.push(device.read().as_bool().unwrap_or(false));
    }

    // Capacity was checked up front; a failure here cannot happen.
    out.push(fc.as_u8())
        .and_then(|_| out.push(byte_count as u8))
        .and_then(|_| pack_bits(&bits, out))
        .map_err(|_| ExceptionCode::SlaveDeviceFailure)
}

/// Read Holding/Input Registers: one scaled big-endian word per address.
fn read_words(
    fc: FunctionCode,
    payload: &[u8],
    table: &RegisterTable,
    devices: &DeviceSet,
    out: &mut FixedBuf,
) -> Result<(), ExceptionCode> {
    if payload.len() != 4 {
        return Err(ExceptionCode::IllegalDataValue);
    }
    let start = be_u16(&payload[0..2]);
    let quantity = be_u16(&payload[2..4]);
    if quantity == 0 || quantity > MAX_WORD_QUANTITY {
        return Err(ExceptionCode::IllegalDataValue);
    }

    let byte_count = register_byte_count(quantity);
    if 2 + byte_count > out.remaining() {
        return Err(ExceptionCode::SlaveDeviceFailure);
    }

    let mut words = Vec::with_capacity(quantity as usize);
    for offset in 0..quantity {
        let address = start
            .checked_add(offset)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        let entry = table
            .lookup(AddressSpace::Word, address)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        let device = devices
            .get(entry.device)
            .ok_or(ExceptionCode::SlaveDeviceFailure)?;
        words.push(scale_to_word(device.read(), entry.multiplier));
    }

    out.push(fc.as_u8())
        .and_then(|_| out.push(byte_count as u8))
        .map_err(|_| ExceptionCode::SlaveDeviceFailure)?;
    for word in words {
        out.put_u16_be(word)
            .map_err(|_| ExceptionCode::SlaveDeviceFailure)?;
    }
    Ok(())
}

/// Write Single Coil: 0xFF00 energizes, 0x0000 de-energizes, anything else
/// is a value error. The response echoes the request payload.
fn write_single_coil(
    fc: FunctionCode,
    payload: &[u8],
    table: &RegisterTable,
    devices: &mut DeviceSet,
    out: &mut FixedBuf,
) -> Result<(), ExceptionCode> {
    if payload.len() != 4 {
        return Err(ExceptionCode::IllegalDataValue);
    }
    let address = be_u16(&payload[0..2]);
    let raw = be_u16(&payload[2..4]);
    let on = match raw {
        COIL_ON => true,
        COIL_OFF => false,
        _ => return Err(ExceptionCode::IllegalDataValue),
    };

    let entry = table
        .lookup(AddressSpace::Bit, address)
        .ok_or(ExceptionCode::IllegalDataAddress)?;

    // The echo is 5 bytes; reject before the device is touched.
    if 1 + payload.len() > out.remaining() {
        return Err(ExceptionCode::SlaveDeviceFailure);
    }

    let device = devices
        .get_mut(entry.device)
        .ok_or(ExceptionCode::SlaveDeviceFailure)?;

    match device.write(Value::Bool(on)) {
        WriteOutcome::Accepted => {
            debug!(address, on, "coil written");
            out.push(fc.as_u8())
                .and_then(|_| out.extend_from_slice(payload))
                .map_err(|_| ExceptionCode::SlaveDeviceFailure)
        }
        WriteOutcome::NotSupported => Err(ExceptionCode::IllegalFunction),
        WriteOutcome::ReadOnly | WriteOutcome::InvalidValue => {
            Err(ExceptionCode::IllegalDataValue)
        }
        WriteOutcome::Failed => Err(ExceptionCode::SlaveDeviceFailure),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RegisterEntry;
    use fieldnode_core::types::ValueKind;
    use fieldnode_device::hal::sim::{SimInput, SimInputHandle, SimOutput, SimProbe};
    use fieldnode_device::{DebouncedInput, Device, RelayOutput, TemperatureProbe};
    use std::time::{Duration, Instant};

    struct Fixture {
        devices: DeviceSet,
        table: RegisterTable,
        input_handle: SimInputHandle,
    }

    /// Mirrors the reference wiring: two float probes in the word space
    /// (x10 scaling), three relays and one input in the bit space.
    fn fixture() -> Fixture {
        let mut devices = DeviceSet::new();

        let (bus, probe_handle) = SimProbe::new(23.4);
        let sensor1 = devices.insert(Device::Probe(
            TemperatureProbe::new("sensor_1", Box::new(bus))
                .with_read_interval(Duration::from_millis(1))
                .with_conversion_wait(Duration::from_millis(0)),
        ));
        let (bus, _) = SimProbe::new(-2.5);
        let sensor2 = devices.insert(Device::Probe(
            TemperatureProbe::new("sensor_2", Box::new(bus))
                .with_read_interval(Duration::from_millis(1))
                .with_conversion_wait(Duration::from_millis(0)),
        ));

        // Collect one reading on each probe.
        let t0 = Instant::now();
        devices.advance_all(t0 + Duration::from_millis(10));
        devices.advance_all(t0 + Duration::from_millis(20));
        let _ = probe_handle;

        let (pin, _) = SimOutput::new();
        let relay1 = devices.insert(Device::Relay(RelayOutput::new("relay_1", Box::new(pin))));
        let (pin, _) = SimOutput::new();
        let relay2 = devices.insert(Device::Relay(RelayOutput::new("relay_2", Box::new(pin))));
        let (pin, _) = SimOutput::new();
        let relay3 = devices.insert(Device::Relay(RelayOutput::new("relay_3", Box::new(pin))));
        let (pin, input_handle) = SimInput::new();
        let input1 = devices.insert(Device::Input(
            DebouncedInput::new("input_1", Box::new(pin)).with_debounce(Duration::from_millis(1)),
        ));

        let table = RegisterTable::new(
            vec![
                RegisterEntry::new(sensor1, ValueKind::Float, 0).with_multiplier(10.0),
                RegisterEntry::new(sensor2, ValueKind::Float, 1).with_multiplier(10.0),
                RegisterEntry::new(relay1, ValueKind::Bool, 0),
                RegisterEntry::new(relay2, ValueKind::Bool, 1),
                RegisterEntry::new(relay3, ValueKind::Bool, 2),
                RegisterEntry::new(input1, ValueKind::Bool, 3),
            ],
            &devices,
        )
        .unwrap();

        Fixture {
            devices,
            table,
            input_handle,
        }
    }

    fn run(fx: &mut Fixture, pdu: &[u8]) -> Vec<u8> {
        let mut out = FixedBuf::with_capacity(249);
        process(pdu, &fx.table, &mut fx.devices, &mut out).unwrap();
        out.as_slice().to_vec()
    }

    #[test]
    fn test_read_holding_registers_scales_and_truncates() {
        let mut fx = fixture();
        // Address 0, quantity 1: 23.4 x 10 truncates to 234 = 0x00EA.
        let resp = run(&mut fx, &[0x03, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(resp, vec![0x03, 0x02, 0x00, 0xEA]);
    }

    #[test]
    fn test_read_input_registers_negative_word() {
        let mut fx = fixture();
        // -2.5 x 10 truncates to -25, transmitted as 0xFFE7.
        let resp = run(&mut fx, &[0x04, 0x00, 0x01, 0x00, 0x01]);
        assert_eq!(resp, vec![0x04, 0x02, 0xFF, 0xE7]);
    }

    #[test]
    fn test_read_registers_span() {
        let mut fx = fixture();
        let resp = run(&mut fx, &[0x03, 0x00, 0x00, 0x00, 0x02]);
        assert_eq!(resp, vec![0x03, 0x04, 0x00, 0xEA, 0xFF, 0xE7]);
    }

    #[test]
    fn test_read_coils_packs_lsb_first() {
        let mut fx = fixture();
        // Energize relay_2 (bit address 1) and activate input_1 (address 3).
        let relay2 = fx.devices.handle_by_name("relay_2").unwrap();
        fx.devices
            .get_mut(relay2)
            .unwrap()
            .write(Value::Bool(true));
        fx.input_handle.set_level(true);
        let t0 = Instant::now();
        fx.devices.advance_all(t0 + Duration::from_millis(10));
        fx.devices.advance_all(t0 + Duration::from_millis(20));

        let resp = run(&mut fx, &[0x01, 0x00, 0x00, 0x00, 0x04]);
        // Addresses 0..3 -> bits 0..3: relay_2 = bit 1, input_1 = bit 3.
        assert_eq!(resp, vec![0x01, 0x01, 0b0000_1010]);
    }

    #[test]
    fn test_byte_count_rounds_up() {
        let mut fx = fixture();
        // Map seven more inputs so addresses 0..9 all exist in the bit space.
        let mut devices = std::mem::take(&mut fx.devices);
        let mut entries: Vec<RegisterEntry> = fx.table.iter().copied().collect();
        for i in 0..6 {
            let (pin, _) = SimInput::new();
            let h = devices.insert(Device::Input(DebouncedInput::new(
                format!("extra_{i}"),
                Box::new(pin),
            )));
            entries.push(RegisterEntry::new(h, ValueKind::Bool, 4 + i as u16));
        }
        let table = RegisterTable::new(entries, &devices).unwrap();

        let mut out = FixedBuf::with_capacity(249);
        process(&[0x02, 0x00, 0x00, 0x00, 0x0A], &table, &mut devices, &mut out).unwrap();
        let resp = out.as_slice();
        assert_eq!(resp[0], 0x02);
        assert_eq!(resp[1], 2); // ceil(10 / 8)
        assert_eq!(resp.len(), 4);
    }

    #[test]
    fn test_absent_address_is_illegal_data_address() {
        let mut fx = fixture();
        let resp = run(&mut fx, &[0x01, 0x00, 0x63, 0x00, 0x01]);
        assert_eq!(resp, vec![0x81, 0x02]);

        // A word address only mapped in the bit space is absent too.
        let resp = run(&mut fx, &[0x03, 0x00, 0x02, 0x00, 0x01]);
        assert_eq!(resp, vec![0x83, 0x02]);
    }

    #[test]
    fn test_write_single_coil() {
        let mut fx = fixture();
        let relay1 = fx.devices.handle_by_name("relay_1").unwrap();

        let resp = run(&mut fx, &[0x05, 0x00, 0x00, 0xFF, 0x00]);
        assert_eq!(resp, vec![0x05, 0x00, 0x00, 0xFF, 0x00]);
        assert_eq!(fx.devices.get(relay1).unwrap().read(), Value::Bool(true));

        let resp = run(&mut fx, &[0x05, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(resp, vec![0x05, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(fx.devices.get(relay1).unwrap().read(), Value::Bool(false));
    }

    #[test]
    fn test_write_single_coil_bad_value() {
        let mut fx = fixture();
        let relay1 = fx.devices.handle_by_name("relay_1").unwrap();
        let resp = run(&mut fx, &[0x05, 0x00, 0x00, 0xFF, 0x01]);
        assert_eq!(resp, vec![0x85, 0x03]);
        // The relay was not touched.
        assert_eq!(fx.devices.get(relay1).unwrap().read(), Value::Bool(false));
    }

    #[test]
    fn test_write_to_read_only_point() {
        let mut fx = fixture();
        // input_1 at bit address 3 takes no writes.
        let resp = run(&mut fx, &[0x05, 0x00, 0x03, 0xFF, 0x00]);
        assert_eq!(resp, vec![0x85, 0x01]);
    }

    #[test]
    fn test_unsupported_function_code() {
        let mut fx = fixture();
        let resp = run(&mut fx, &[0x10, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x01]);
        assert_eq!(resp, vec![0x90, 0x01]);
    }

    #[test]
    fn test_malformed_payloads() {
        let mut fx = fixture();
        assert_eq!(run(&mut fx, &[0x03, 0x00]), vec![0x83, 0x03]);
        assert_eq!(run(&mut fx, &[0x05, 0x00, 0x00, 0xFF]), vec![0x85, 0x03]);
        assert_eq!(run(&mut fx, &[]), vec![0x80, 0x03]);
        // Quantity zero reads nothing meaningful.
        assert_eq!(run(&mut fx, &[0x01, 0x00, 0x00, 0x00, 0x00]), vec![0x81, 0x03]);
    }

    #[test]
    fn test_capacity_checked_before_writing() {
        let mut fx = fixture();
        let mut out = FixedBuf::with_capacity(3);
        // Response would need 4 bytes; nothing must be written before the
        // capacity check fails.
        process(
            &[0x03, 0x00, 0x00, 0x00, 0x01],
            &fx.table,
            &mut fx.devices,
            &mut out,
        )
        .unwrap();
        assert_eq!(out.as_slice(), &[0x83, 0x04]);
    }

    #[test]
    fn test_oversized_quantity_is_value_error() {
        let mut fx = fixture();
        // 2001 coils exceeds the protocol limit outright.
        let resp = run(&mut fx, &[0x01, 0x00, 0x00, 0x07, 0xD1]);
        assert_eq!(resp, vec![0x81, 0x03]);
        let resp = run(&mut fx, &[0x03, 0x00, 0x00, 0x00, 0x7E]);
        assert_eq!(resp, vec![0x83, 0x03]);
    }
}
