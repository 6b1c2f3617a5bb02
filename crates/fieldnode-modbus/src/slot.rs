// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-connection request/response state machine.
//!
//! A slot owns the receive and response buffers for one connection and
//! drives exactly one request/response cycle at a time:
//!
//! ```text
//! Unassigned -> ReceivingHeader -> ReceivingBody -> Processing -> Sending -> Unassigned
//! ```
//!
//! Every step is one bounded, non-blocking unit of work. Transport faults
//! release the slot without a response; protocol faults answer an exception
//! PDU through the codec. A request body that exceeds the fixed body buffer
//! closes the connection defensively — buffers never grow and never
//! overrun.

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use fieldnode_core::buffer::FixedBuf;
use fieldnode_core::transport::{ConnId, Connection};
use fieldnode_device::DeviceSet;

use crate::codec;
use crate::frame::{MbapHeader, MBAP_LEN};
use crate::table::RegisterTable;

/// The lifecycle states of a connection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Idle, eligible for assignment by the pool.
    Unassigned,
    /// Accumulating the 7-byte MBAP header.
    ReceivingHeader,
    /// Accumulating the declared PDU bytes.
    ReceivingBody,
    /// Running the codec on the completed request.
    Processing,
    /// Flushing the response buffer to the peer.
    Sending,
}

/// One unit of the connection pool.
pub struct ConnectionSlot<C: Connection> {
    state: SlotState,
    header: FixedBuf,
    body: FixedBuf,
    response: FixedBuf,
    body_len: usize,
    sent: usize,
    conn: Option<C>,
    last_activity: Instant,
    idle_timeout: Duration,
}

impl<C: Connection> ConnectionSlot<C> {
    /// Creates an unassigned slot with the given buffer capacities.
    ///
    /// `idle_timeout` of zero disables the idle deadline.
    pub fn new(body_capacity: usize, response_capacity: usize, idle_timeout: Duration) -> Self {
        // The response buffer must at least hold a framed exception PDU.
        let response_capacity = response_capacity.max(MBAP_LEN + 2);
        Self {
            state: SlotState::Unassigned,
            header: FixedBuf::with_capacity(MBAP_LEN),
            body: FixedBuf::with_capacity(body_capacity),
            response: FixedBuf::with_capacity(response_capacity),
            body_len: 0,
            sent: 0,
            conn: None,
            last_activity: Instant::now(),
            idle_timeout,
        }
    }

    /// The current state.
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Returns `true` if the slot can take a new connection.
    pub fn is_unassigned(&self) -> bool {
        self.state == SlotState::Unassigned
    }

    /// Returns `true` if the slot currently owns the connection `id`.
    pub fn is_bound_to(&self, id: ConnId) -> bool {
        self.conn.as_ref().is_some_and(|c| c.id() == id)
    }

    /// Binds a new connection and starts a receive cycle.
    ///
    /// # Errors
    ///
    /// Hands the connection back if the slot is occupied.
    pub fn bind(&mut self, conn: C, now: Instant) -> Result<(), C> {
        if !self.is_unassigned() {
            return Err(conn);
        }
        trace!(conn = %conn.id(), "slot bound");
        self.header.clear();
        self.body.clear();
        self.response.clear();
        self.body_len = 0;
        self.sent = 0;
        self.conn = Some(conn);
        self.last_activity = now;
        self.state = SlotState::ReceivingHeader;
        Ok(())
    }

    /// Advances the state machine by one bounded step.
    ///
    /// Returns `true` if the slot did work this tick.
    pub fn advance(
        &mut self,
        table: &RegisterTable,
        devices: &mut DeviceSet,
        now: Instant,
    ) -> bool {
        if self.state == SlotState::Unassigned {
            return false;
        }

        // Per-state connectivity check: a dropped peer releases the slot
        // immediately, discarding any partial request.
        if self.conn.as_ref().is_none_or(|c| !c.is_connected()) {
            debug!("peer gone, releasing slot");
            self.release();
            return true;
        }

        if !self.idle_timeout.is_zero()
            && now.duration_since(self.last_activity) > self.idle_timeout
        {
            warn!(state = ?self.state, "idle deadline exceeded, releasing slot");
            self.release();
            return true;
        }

        match self.state {
            SlotState::Unassigned => false,
            SlotState::ReceivingHeader => self.advance_receive_header(now),
            SlotState::ReceivingBody => self.advance_receive_body(now),
            SlotState::Processing => self.advance_processing(table, devices),
            SlotState::Sending => self.advance_sending(now),
        }
    }

    fn advance_receive_header(&mut self, now: Instant) -> bool {
        let conn = match self.conn.as_mut() {
            Some(c) => c,
            None => return false,
        };
        let needed = MBAP_LEN - self.header.len();
        match self.header.fill_from(needed, |tail| conn.try_read(tail)) {
            Ok(0) => false,
            Ok(_) => {
                self.last_activity = now;
                if self.header.len() == MBAP_LEN {
                    self.on_header_complete();
                }
                true
            }
            Err(e) => {
                debug!(error = %e, "read failed while receiving header");
                self.release();
                true
            }
        }
    }

    fn on_header_complete(&mut self) {
        let mut raw = [0u8; MBAP_LEN];
        raw.copy_from_slice(self.header.as_slice());
        let header = MbapHeader::decode(&raw);

        let body_len = match header.body_len() {
            Some(len) => len,
            None => {
                // Length 0 does not even cover the unit id: unframeable.
                warn!(length = header.length, "unframeable length field, closing");
                self.release();
                return;
            }
        };

        if body_len > self.body.capacity() {
            // Oversized PDU: reject defensively instead of overrunning.
            warn!(
                body_len,
                capacity = self.body.capacity(),
                "request body exceeds buffer, closing"
            );
            self.release();
            return;
        }

        self.body_len = body_len;
        self.state = if body_len == 0 {
            SlotState::Processing
        } else {
            SlotState::ReceivingBody
        };
    }

    fn advance_receive_body(&mut self, now: Instant) -> bool {
        let conn = match self.conn.as_mut() {
            Some(c) => c,
            None => return false,
        };
        let needed = self.body_len - self.body.len();
        match self.body.fill_from(needed, |tail| conn.try_read(tail)) {
            Ok(0) => false,
            Ok(_) => {
                self.last_activity = now;
                if self.body.len() == self.body_len {
                    self.state = SlotState::Processing;
                }
                true
            }
            Err(e) => {
                debug!(error = %e, "read failed while receiving body");
                self.release();
                true
            }
        }
    }

    fn advance_processing(&mut self, table: &RegisterTable, devices: &mut DeviceSet) -> bool {
        let mut raw = [0u8; MBAP_LEN];
        raw.copy_from_slice(self.header.as_slice());
        let header = MbapHeader::decode(&raw);

        if !header.protocol_ok() {
            // Malformed framing is dropped silently, never answered.
            debug!(protocol_id = header.protocol_id, "non-zero protocol id, dropping request");
            self.release();
            return true;
        }

        self.response.clear();
        // Echo header with a length placeholder, patched after encoding.
        let prelude = header.response(0).encode();
        let encoded = self
            .response
            .extend_from_slice(&prelude)
            .and_then(|_| {
                codec::process(self.body.as_slice(), table, devices, &mut self.response)
            });

        match encoded {
            Ok(()) => {
                let payload_len = self.response.len() - MBAP_LEN;
                self.response.patch_u16_be(4, (payload_len + 1) as u16);
                self.sent = 0;
                self.state = SlotState::Sending;
            }
            Err(e) => {
                // Response buffer below the framing minimum: cannot answer.
                warn!(error = %e, "response buffer too small to frame, closing");
                self.release();
            }
        }
        true
    }

    fn advance_sending(&mut self, now: Instant) -> bool {
        let conn = match self.conn.as_mut() {
            Some(c) => c,
            None => return false,
        };
        let pending = &self.response.as_slice()[self.sent..];
        match conn.try_write(pending) {
            Ok(0) => false,
            Ok(n) => {
                self.sent += n;
                self.last_activity = now;
                if self.sent == self.response.len() {
                    trace!(bytes = self.sent, "response flushed");
                    self.release();
                }
                true
            }
            Err(e) => {
                debug!(error = %e, "write failed while sending response");
                self.release();
                true
            }
        }
    }

    /// Closes the connection (if any) and returns the slot to `Unassigned`.
    fn release(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        self.header.clear();
        self.body.clear();
        self.response.clear();
        self.body_len = 0;
        self.sent = 0;
        self.state = SlotState::Unassigned;
    }
}

// =============================================================================
// Tests
// =============================================================================
