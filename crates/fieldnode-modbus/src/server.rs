// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The connection pool.
//!
//! The pool owns the transport listener and a fixed array of connection
//! slots sized by configuration. Each tick it admits at most one pending
//! connection — refusing a connection identity that is already bound to a
//! slot — and advances every slot once, in fixed index order. Nothing is
//! queued inside the pool: while all slots are busy the listener is simply
//! not polled, leaving backpressure to the transport backlog.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use fieldnode_core::transport::{Connection, Listener};
use fieldnode_device::DeviceSet;

use crate::slot::ConnectionSlot;
use crate::table::RegisterTable;

// =============================================================================
// PoolConfig
// =============================================================================

/// Sizing and policy for the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of concurrently serviced connections.
    pub slots: usize,
    /// Capacity of each slot's request body buffer.
    pub body_capacity: usize,
    /// Capacity of each slot's response buffer (header + PDU).
    pub response_capacity: usize,
    /// Idle deadline for a bound connection; zero disables it.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            slots: 2,
            body_capacity: 64,
            response_capacity: 256,
            idle_timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// ModbusServer
// =============================================================================

/// The Modbus TCP server: one listener feeding a fixed pool of slots.
pub struct ModbusServer<L: Listener> {
    listener: L,
    slots: Vec<ConnectionSlot<L::Conn>>,
    started: bool,
}

impl<L: Listener> ModbusServer<L> {
    /// Creates the pool over an already-bound listener.
    ///
    /// The slot array is sized once from `config` and never resized.
    pub fn new(listener: L, config: PoolConfig) -> Self {
        let slots = (0..config.slots.max(1))
            .map(|_| {
                ConnectionSlot::new(
                    config.body_capacity,
                    config.response_capacity,
                    config.idle_timeout,
                )
            })
            .collect();
        Self {
            listener,
            slots,
            started: false,
        }
    }

    /// Number of slots in the pool.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently serving a connection.
    pub fn active_connections(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_unassigned()).count()
    }

    /// Advances the server by one tick.
    ///
    /// Polls the listener for at most one new connection, then advances
    /// every slot once in index order. Returns `true` if any work was done.
    pub fn advance(
        &mut self,
        table: &RegisterTable,
        devices: &mut DeviceSet,
        now: Instant,
    ) -> bool {
        let mut busy = false;

        if !self.started {
            info!(slots = self.slots.len(), "modbus server started");
            self.started = true;
            busy = true;
        }

        // Only take a connection off the backlog when a slot can hold it.
        if self.slots.iter().any(|s| s.is_unassigned()) {
            match self.listener.poll_accept() {
                Ok(Some(conn)) => {
                    busy = true;
                    self.admit(conn, now);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "listener poll failed"),
            }
        }

        for slot in &mut self.slots {
            busy |= slot.advance(table, devices, now);
        }

        busy
    }

    fn admit(&mut self, mut conn: L::Conn, now: Instant) {
        let id = conn.id();

        // A connection identity may only ever be bound to one slot.
        if self.slots.iter().any(|s| s.is_bound_to(id)) {
            warn!(conn = %id, "connection already bound to a slot, refusing");
            conn.close();
            return;
        }

        for slot in &mut self.slots {
            match slot.bind(conn, now) {
                Ok(()) => {
                    debug!(conn = %id, "connection admitted");
                    return;
                }
                Err(back) => conn = back,
            }
        }

        // Every slot raced to occupied between the check and here.
        debug!(conn = %id, "no free slot, dropping connection");
        conn.close();
    }
}

// =============================================================================
// Tests
// =============================================================================
