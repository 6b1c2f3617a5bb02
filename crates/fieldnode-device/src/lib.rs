// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldnode-device
//!
//! The device capability layer of the fieldnode controller.
//!
//! Every addressable point on the controller is one variant of the closed
//! [`Device`] enum — a debounced binary input, a relay output, or a
//! temperature probe — behind one capability surface: non-blocking `read`,
//! `write` with an explicit outcome, an immutable value kind, and a bounded
//! `advance` step that drives the driver's own state machine.
//!
//! Devices are owned by a [`DeviceSet`] built once at startup; protocol
//! front-ends refer to them through stable [`DeviceHandle`] indices, never
//! through references that could dangle across reconfiguration.
//!
//! The pin-level seam is the [`hal`] module: `InputPin`, `OutputPin` and
//! `ProbeBus` traits with process-hosted simulated implementations. A port
//! to a real board replaces `hal::sim` and nothing else.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod diag;
pub mod hal;
pub mod input;
pub mod output;
pub mod probe;
pub mod set;

pub use diag::DiagLed;
pub use input::DebouncedInput;
pub use output::RelayOutput;
pub use probe::TemperatureProbe;
pub use set::{parse_value, Device, DeviceHandle, DeviceSet};
