// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types shared across fieldnode components.
//!
//! Transport faults are recovered locally by the connection state machines
//! (release the slot, never surface to the peer), so these types exist for
//! logging and for the few call sites that need to distinguish a closed
//! connection from an I/O failure.

use thiserror::Error;

// =============================================================================
// TransportError
// =============================================================================

/// A fault on a network connection or listener.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// An I/O error on the underlying socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Returns `true` if this fault is an orderly close rather than an
    /// unexpected I/O failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

// =============================================================================
// BufferError
// =============================================================================

/// A rejected write into a fixed-capacity buffer.
///
/// Fixed buffers never grow and never overrun: a write past capacity is
/// reported here and the caller decides how to fail (for the Modbus slot
/// machine, by closing the offending connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer full: capacity {capacity}, write of {requested} more bytes rejected")]
pub struct BufferError {
    /// Total capacity of the buffer.
    pub capacity: usize,
    /// Number of bytes the rejected write would have added.
    pub requested: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Closed;
        assert!(err.is_closed());
        assert_eq!(err.to_string(), "connection closed by peer");

        let io = TransportError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));
        assert!(!io.is_closed());
    }

    #[test]
    fn test_buffer_error_display() {
        let err = BufferError {
            capacity: 64,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "buffer full: capacity 64, write of 3 more bytes rejected"
        );
    }
}
