// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Relay output driver.

use fieldnode_core::types::{Value, WriteOutcome};
use tracing::debug;

use crate::hal::OutputPin;

/// A latched relay output.
///
/// Writes drive the pin immediately; there is no periodic work. A relay can
/// be configured read-only, in which case writes are rejected without
/// touching the pin.
pub struct RelayOutput {
    name: String,
    pin: Box<dyn OutputPin>,
    state: bool,
    read_only: bool,
}

impl RelayOutput {
    /// Creates a relay over `pin`, initially de-energized.
    pub fn new(name: impl Into<String>, mut pin: Box<dyn OutputPin>) -> Self {
        pin.set_active(false);
        Self {
            name: name.into(),
            pin,
            state: false,
            read_only: false,
        }
    }

    /// Marks the relay read-only (writes report [`WriteOutcome::ReadOnly`]).
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// The configured device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last latched state.
    pub fn is_energized(&self) -> bool {
        self.state
    }

    /// Attempts to drive the relay.
    pub fn write(&mut self, value: Value) -> WriteOutcome {
        if self.read_only {
            return WriteOutcome::ReadOnly;
        }
        match value {
            Value::Bool(on) => {
                self.state = on;
                self.pin.set_active(on);
                debug!(relay = %self.name, energized = on, "relay switched");
                WriteOutcome::Accepted
            }
            _ => WriteOutcome::InvalidValue,
        }
    }
}

impl std::fmt::Debug for RelayOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayOutput")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
