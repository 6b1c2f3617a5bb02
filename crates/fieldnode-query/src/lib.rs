// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldnode-query
//!
//! The line-oriented HTTP/JSON query front-end of the fieldnode controller.
//!
//! This is deliberately not a web framework: one connection at a time, one
//! bounded request buffer, a GET line parsed up to the first carriage
//! return, and a JSON body answered with `Connection: close`. It exists so
//! field technicians can poke the controller with `curl`:
//!
//! - `GET /` — every device value as one JSON object
//! - `GET /<device>/<value>` — write an actuator (`/relay_1/on`)
//!
//! The server shares the cooperative `advance()` contract of the Modbus
//! pool and never blocks.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod server;

pub use server::{QueryConfig, QueryServer};
