// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! MBAP framing.
//!
//! Every Modbus TCP frame starts with the 7-byte MBAP header: transaction
//! id, protocol id (always 0), length, unit id. The length field counts the
//! unit id plus the PDU, so a frame's body is `length - 1` bytes.

/// Length of the MBAP header in bytes.
pub const MBAP_LEN: usize = 7;

/// The only valid protocol identifier.
pub const PROTOCOL_ID: u16 = 0;

/// Default Modbus TCP port.
pub const DEFAULT_PORT: u16 = 502;

/// A decoded MBAP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    /// Transaction identifier, echoed into the response.
    pub transaction_id: u16,
    /// Protocol identifier; anything but 0 is malformed framing.
    pub protocol_id: u16,
    /// Number of following bytes including the unit id.
    pub length: u16,
    /// Unit identifier, echoed into the response.
    pub unit_id: u8,
}

impl MbapHeader {
    /// Decodes a header from exactly 7 bytes.
    pub fn decode(bytes: &[u8; MBAP_LEN]) -> Self {
        Self {
            transaction_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            protocol_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            length: u16::from_be_bytes([bytes[4], bytes[5]]),
            unit_id: bytes[6],
        }
    }

    /// Encodes the header into 7 bytes.
    pub fn encode(&self) -> [u8; MBAP_LEN] {
        let tid = self.transaction_id.to_be_bytes();
        let pid = self.protocol_id.to_be_bytes();
        let len = self.length.to_be_bytes();
        [tid[0], tid[1], pid[0], pid[1], len[0], len[1], self.unit_id]
    }

    /// The PDU length declared by this header.
    ///
    /// `None` when the length field is 0 — such a frame does not even carry
    /// the unit id it claims to include and cannot be framed.
    pub fn body_len(&self) -> Option<usize> {
        (self.length as usize).checked_sub(1)
    }

    /// Returns `true` if the protocol id marks valid Modbus framing.
    pub fn protocol_ok(&self) -> bool {
        self.protocol_id == PROTOCOL_ID
    }

    /// Builds the response header for this request with the given PDU
    /// length: transaction and unit ids echoed, protocol id fixed to 0.
    pub fn response(&self, payload_len: usize) -> Self {
        Self {
            transaction_id: self.transaction_id,
            protocol_id: PROTOCOL_ID,
            length: (payload_len + 1) as u16,
            unit_id: self.unit_id,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
