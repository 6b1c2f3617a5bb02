// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register table and address-space model.
//!
//! The table binds device points to Modbus addresses in two disjoint
//! address spaces: the bit space (coils and discrete inputs, boolean
//! points) and the word space (holding and input registers, scalar points).
//! It is built once at startup and validated eagerly — a duplicate address
//! within a space, a dangling device handle, or a kind/space mismatch is a
//! configuration fault, not something to discover on the wire.

use std::fmt;

use thiserror::Error;

use fieldnode_core::types::ValueKind;
use fieldnode_device::{DeviceHandle, DeviceSet};

// =============================================================================
// AddressSpace
// =============================================================================

/// One of the two disjoint Modbus address spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    /// Coils and discrete inputs: one address, one bit.
    Bit,
    /// Holding and input registers: one address, one 16-bit word.
    Word,
}

impl AddressSpace {
    /// The space a value kind is carried in.
    pub const fn for_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => AddressSpace::Bit,
            ValueKind::Int | ValueKind::Float => AddressSpace::Word,
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpace::Bit => write!(f, "bit"),
            AddressSpace::Word => write!(f, "word"),
        }
    }
}

// =============================================================================
// RegisterEntry
// =============================================================================

/// One binding of a device point to a Modbus address.
#[derive(Debug, Clone, Copy)]
pub struct RegisterEntry {
    /// The bound device.
    pub device: DeviceHandle,
    /// The declared value kind; must match the device's own kind.
    pub kind: ValueKind,
    /// Start address within the space implied by `kind`.
    pub address: u16,
    /// Word/bit count. Reserved for multi-register values; always 1.
    pub quantity: u16,
    /// Scaling multiplier applied before truncation to a word.
    pub multiplier: f32,
}

impl RegisterEntry {
    /// Creates an entry with quantity 1 and multiplier 1.0.
    pub fn new(device: DeviceHandle, kind: ValueKind, address: u16) -> Self {
        Self {
            device,
            kind,
            address,
            quantity: 1,
            multiplier: 1.0,
        }
    }

    /// Overrides the scaling multiplier.
    pub fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// The address space this entry lives in.
    pub fn space(&self) -> AddressSpace {
        AddressSpace::for_kind(self.kind)
    }
}

// =============================================================================
// TableError
// =============================================================================

/// A register table that cannot be constructed.
#[derive(Debug, Error)]
pub enum TableError {
    /// Two entries share one (space, address) pair.
    #[error("duplicate {space} address {address}")]
    DuplicateAddress {
        /// The address space of the collision.
        space: AddressSpace,
        /// The colliding address.
        address: u16,
    },

    /// An entry references a handle outside the device set.
    #[error("{space} address {address} references an unknown device")]
    UnknownDevice {
        /// The address space of the entry.
        space: AddressSpace,
        /// The entry's address.
        address: u16,
    },

    /// The entry kind disagrees with the device's declared kind.
    #[error("{space} address {address} declares {declared} but device '{device}' is {actual}")]
    KindMismatch {
        /// The address space of the entry.
        space: AddressSpace,
        /// The entry's address.
        address: u16,
        /// Kind declared by the entry.
        declared: ValueKind,
        /// Kind the device actually has.
        actual: ValueKind,
        /// The device name.
        device: String,
    },

    /// Multi-word entries are not supported.
    #[error("{space} address {address} declares quantity {quantity}; only 1 is supported")]
    UnsupportedQuantity {
        /// The address space of the entry.
        space: AddressSpace,
        /// The entry's address.
        address: u16,
        /// The rejected quantity.
        quantity: u16,
    },
}

// =============================================================================
// RegisterTable
// =============================================================================

/// The fixed, validated address map.
#[derive(Debug)]
pub struct RegisterTable {
    entries: Vec<RegisterEntry>,
}

impl RegisterTable {
    /// Builds and validates the table against the device set.
    ///
    /// # Errors
    ///
    /// Fails fast on duplicate (space, address) pairs, dangling handles,
    /// kind mismatches, and quantities other than 1.
    pub fn new(entries: Vec<RegisterEntry>, devices: &DeviceSet) -> Result<Self, TableError> {
        for (i, entry) in entries.iter().enumerate() {
            let space = entry.space();

            if entry.quantity != 1 {
                return Err(TableError::UnsupportedQuantity {
                    space,
                    address: entry.address,
                    quantity: entry.quantity,
                });
            }

            let device = devices.get(entry.device).ok_or(TableError::UnknownDevice {
                space,
                address: entry.address,
            })?;

            if device.kind() != entry.kind {
                return Err(TableError::KindMismatch {
                    space,
                    address: entry.address,
                    declared: entry.kind,
                    actual: device.kind(),
                    device: device.name().to_string(),
                });
            }

            for earlier in &entries[..i] {
                if earlier.space() == space && earlier.address == entry.address {
                    return Err(TableError::DuplicateAddress {
                        space,
                        address: entry.address,
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Looks up the entry for an address within a space.
    ///
    /// Linear scan in construction order; the table is small and fixed, and
    /// validation guarantees at most one match.
    pub fn lookup(&self, space: AddressSpace, address: u16) -> Option<&RegisterEntry> {
        self.entries
            .iter()
            .find(|e| e.space() == space && e.address == address)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in construction order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisterEntry> {
        self.entries.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fieldnode_device::hal::sim::{SimInput, SimOutput, SimProbe};
    use fieldnode_device::{DebouncedInput, Device, RelayOutput, TemperatureProbe};

    fn devices() -> (DeviceSet, DeviceHandle, DeviceHandle, DeviceHandle) {
        let mut set = DeviceSet::new();
        let (pin, _) = SimProbe::new(23.4);
        let probe = set.insert(Device::Probe(TemperatureProbe::new("sensor_1", Box::new(pin))));
        let (pin, _) = SimOutput::new();
        let relay = set.insert(Device::Relay(RelayOutput::new("relay_1", Box::new(pin))));
        let (pin, _) = SimInput::new();
        let input = set.insert(Device::Input(DebouncedInput::new("input_1", Box::new(pin))));
        (set, probe, relay, input)
    }

    #[test]
    fn test_lookup_scoped_by_space() {
        let (set, probe, relay, input) = devices();
        let table = RegisterTable::new(
            vec![
                RegisterEntry::new(probe, ValueKind::Float, 0).with_multiplier(10.0),
                // Same numeric address in the other space: no collision.
                RegisterEntry::new(relay, ValueKind::Bool, 0),
                RegisterEntry::new(input, ValueKind::Bool, 3),
            ],
            &set,
        )
        .unwrap();

        let word = table.lookup(AddressSpace::Word, 0).unwrap();
        assert_eq!(word.device, probe);
        assert_eq!(word.multiplier, 10.0);

        let bit = table.lookup(AddressSpace::Bit, 0).unwrap();
        assert_eq!(bit.device, relay);

        assert!(table.lookup(AddressSpace::Word, 3).is_none());
        assert!(table.lookup(AddressSpace::Bit, 7).is_none());
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let (set, _probe, relay, input) = devices();
        let err = RegisterTable::new(
            vec![
                RegisterEntry::new(relay, ValueKind::Bool, 4),
                RegisterEntry::new(input, ValueKind::Bool, 4),
            ],
            &set,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TableError::DuplicateAddress {
                space: AddressSpace::Bit,
                address: 4
            }
        ));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let (set, probe, _relay, _input) = devices();
        let err = RegisterTable::new(
            vec![RegisterEntry::new(probe, ValueKind::Bool, 0)],
            &set,
        )
        .unwrap_err();
        assert!(matches!(err, TableError::KindMismatch { .. }));
    }

    #[test]
    fn test_unknown_device_rejected() {
        let (set, ..) = devices();
        let mut other = DeviceSet::new();
        let (pin, _) = SimOutput::new();
        let foreign = other.insert(Device::Relay(RelayOutput::new("x", Box::new(pin))));
        // A handle from a larger set has no meaning here once out of range.
        let _ = foreign;
        let dangling = {
            let mut big = DeviceSet::new();
            for i in 0..10 {
                let (pin, _) = SimOutput::new();
                big.insert(Device::Relay(RelayOutput::new(format!("r{i}"), Box::new(pin))));
            }
            big.handle_by_name("r9").unwrap()
        };
        let err = RegisterTable::new(
            vec![RegisterEntry::new(dangling, ValueKind::Bool, 0)],
            &set,
        )
        .unwrap_err();
        assert!(matches!(err, TableError::UnknownDevice { .. }));
    }

    #[test]
    fn test_multi_word_quantity_rejected() {
        let (set, probe, ..) = devices();
        let mut entry = RegisterEntry::new(probe, ValueKind::Float, 0);
        entry.quantity = 2;
        let err = RegisterTable::new(vec![entry], &set).unwrap_err();
        assert!(matches!(err, TableError::UnsupportedQuantity { quantity: 2, .. }));
    }
}
