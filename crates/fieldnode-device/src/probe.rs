// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Temperature probe polling driver.
//!
//! One-wire transducers convert on request and need a settling time before
//! the result can be collected, so the driver runs a small state machine:
//! start a conversion every poll interval, collect after the conversion
//! wait, and back off for a while after a bus fault before retrying.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::hal::ProbeBus;

/// Default interval between conversions.
pub const DEFAULT_READ_INTERVAL: Duration = Duration::from_secs(5);

/// Default wait for a conversion to settle.
pub const DEFAULT_CONVERSION_WAIT: Duration = Duration::from_millis(750);

/// Default backoff after a bus fault.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeState {
    Idle,
    /// Conversion running, waiting to collect.
    Pending,
    Fault,
}

/// A polled temperature probe.
pub struct TemperatureProbe {
    name: String,
    bus: Box<dyn ProbeBus>,
    state: ProbeState,
    celsius: f32,
    /// False until the first collection succeeds, and again after a fault.
    have_reading: bool,
    ts: Instant,
    read_interval: Duration,
    conversion_wait: Duration,
    retry_backoff: Duration,
}

impl TemperatureProbe {
    /// Creates a probe over `bus` with the default timing.
    pub fn new(name: impl Into<String>, bus: Box<dyn ProbeBus>) -> Self {
        Self {
            name: name.into(),
            bus,
            state: ProbeState::Idle,
            celsius: 0.0,
            have_reading: false,
            ts: Instant::now(),
            read_interval: DEFAULT_READ_INTERVAL,
            conversion_wait: DEFAULT_CONVERSION_WAIT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Overrides the conversion poll interval.
    pub fn with_read_interval(mut self, interval: Duration) -> Self {
        self.read_interval = interval;
        self
    }

    /// Overrides the conversion settling wait.
    pub fn with_conversion_wait(mut self, wait: Duration) -> Self {
        self.conversion_wait = wait;
        self
    }

    /// Overrides the fault retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// The configured device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once a reading has been collected and the bus has not
    /// faulted since. While `false`, the probe serializes as null.
    pub fn has_reading(&self) -> bool {
        self.have_reading
    }

    /// The last collected temperature in degrees Celsius.
    ///
    /// Stays at the previous reading (initially 0.0) while no fresh value
    /// is available; check [`has_reading`](Self::has_reading) first where
    /// the distinction matters.
    pub fn celsius(&self) -> f32 {
        self.celsius
    }

    /// Advances the polling state machine. Returns `true` if it did work.
    pub fn advance(&mut self, now: Instant) -> bool {
        match self.state {
            ProbeState::Idle => {
                if now.duration_since(self.ts) > self.read_interval {
                    self.bus.start_conversion();
                    self.state = ProbeState::Pending;
                    self.ts = now;
                    true
                } else {
                    false
                }
            }
            ProbeState::Pending => {
                if now.duration_since(self.ts) > self.conversion_wait {
                    match self.bus.read_celsius() {
                        Some(t) => {
                            debug!(probe = %self.name, celsius = t, "reading collected");
                            self.celsius = t;
                            self.have_reading = true;
                            self.state = ProbeState::Idle;
                        }
                        None => {
                            warn!(probe = %self.name, "bus fault, backing off");
                            self.have_reading = false;
                            self.state = ProbeState::Fault;
                        }
                    }
                    self.ts = now;
                    true
                } else {
                    false
                }
            }
            ProbeState::Fault => {
                if now.duration_since(self.ts) > self.retry_backoff {
                    self.bus.reset();
                    self.state = ProbeState::Idle;
                    self.ts = now;
                    true
                } else {
                    false
                }
            }
        }
    }
}

impl std::fmt::Debug for TemperatureProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemperatureProbe")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("celsius", &self.celsius)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
