// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Diagnostic activity indicator.
//!
//! The main loop pulses the LED whenever any subsystem did work, giving a
//! visible heartbeat; the indicator turns itself off after the blink
//! interval.

use std::time::{Duration, Instant};

use crate::hal::OutputPin;

/// Default blink duration.
pub const DEFAULT_BLINK: Duration = Duration::from_millis(100);

/// An activity LED.
pub struct DiagLed {
    pin: Box<dyn OutputPin>,
    lit: bool,
    since: Instant,
    blink: Duration,
}

impl DiagLed {
    /// Creates the indicator over `pin`, initially dark.
    pub fn new(mut pin: Box<dyn OutputPin>) -> Self {
        pin.set_active(false);
        Self {
            pin,
            lit: false,
            since: Instant::now(),
            blink: DEFAULT_BLINK,
        }
    }

    /// Overrides the blink duration.
    pub fn with_blink(mut self, blink: Duration) -> Self {
        self.blink = blink;
        self
    }

    /// Returns `true` while the LED is lit.
    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Lights the LED and restarts the blink timer.
    pub fn pulse(&mut self, now: Instant) {
        self.pin.set_active(true);
        self.lit = true;
        self.since = now;
    }

    /// Turns the LED off once the blink interval has elapsed.
    pub fn advance(&mut self, now: Instant) -> bool {
        if self.lit && now.duration_since(self.since) > self.blink {
            self.pin.set_active(false);
            self.lit = false;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for DiagLed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagLed")
            .field("lit", &self.lit)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
