// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Debounced binary input driver.
//!
//! Mechanical contacts bounce; the driver only reports a level change after
//! the line has left its previous stable level for the debounce interval.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::hal::InputPin;

/// Default debounce interval.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputState {
    Off,
    DebounceOn,
    On,
    DebounceOff,
}

/// A debounced digital input.
///
/// State machine: `Off → DebounceOn → On → DebounceOff → Off`. The input
/// reads as active from the first confirmed activation until the
/// deactivation is confirmed, so a contact mid-release still reads active.
pub struct DebouncedInput {
    name: String,
    pin: Box<dyn InputPin>,
    state: InputState,
    since: Instant,
    debounce: Duration,
}

impl DebouncedInput {
    /// Creates an input over `pin` with the default debounce interval.
    pub fn new(name: impl Into<String>, pin: Box<dyn InputPin>) -> Self {
        Self {
            name: name.into(),
            pin,
            state: InputState::Off,
            since: Instant::now(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Overrides the debounce interval.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// The configured device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the debounced level.
    pub fn is_active(&self) -> bool {
        matches!(self.state, InputState::On | InputState::DebounceOff)
    }

    /// Advances the debounce state machine. Returns `true` if it did work.
    pub fn advance(&mut self, now: Instant) -> bool {
        let level = self.pin.is_active();

        match self.state {
            InputState::Off => {
                if level {
                    self.state = InputState::DebounceOn;
                    self.since = now;
                    true
                } else {
                    false
                }
            }
            InputState::DebounceOn => {
                if now.duration_since(self.since) > self.debounce {
                    trace!(input = %self.name, "active");
                    self.state = InputState::On;
                    true
                } else {
                    false
                }
            }
            InputState::On => {
                if !level {
                    self.state = InputState::DebounceOff;
                    self.since = now;
                    true
                } else {
                    false
                }
            }
            InputState::DebounceOff => {
                if now.duration_since(self.since) > self.debounce {
                    trace!(input = %self.name, "inactive");
                    self.state = InputState::Off;
                    true
                } else {
                    false
                }
            }
        }
    }
}

impl std::fmt::Debug for DebouncedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedInput")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
