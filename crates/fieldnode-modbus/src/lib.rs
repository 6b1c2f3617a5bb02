// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldnode-modbus
//!
//! The Modbus TCP server of the fieldnode controller.
//!
//! The server serves multiple concurrent connections from a single
//! non-blocking execution thread:
//!
//! - **Frame**: MBAP header encode/decode
//! - **Table**: the register table mapping (address space, address) pairs to
//!   device points, validated once at startup
//! - **Codec**: pure decode/dispatch/encode of function codes with Modbus
//!   exception mapping
//! - **Slot**: the per-connection receive/process/send state machine over
//!   bounds-checked fixed buffers
//! - **Server**: the connection pool — a fixed slot array fed by one
//!   listener, advanced once per tick in fixed index order
//!
//! Supported functions: Read Coils (0x01), Read Discrete Inputs (0x02),
//! Read Holding Registers (0x03), Read Input Registers (0x04), and Write
//! Single Coil (0x05). Everything else answers exception 0x01.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod frame;
pub mod pack;
pub mod server;
pub mod slot;
pub mod table;

pub use codec::{ExceptionCode, FunctionCode};
pub use frame::MbapHeader;
pub use server::{ModbusServer, PoolConfig};
pub use slot::{ConnectionSlot, SlotState};
pub use table::{AddressSpace, RegisterEntry, RegisterTable, TableError};
