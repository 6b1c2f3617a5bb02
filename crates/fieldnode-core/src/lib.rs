// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldnode-core
//!
//! Shared foundations for the fieldnode controller firmware.
//!
//! This crate provides the building blocks used by every other fieldnode
//! component:
//!
//! - **Types**: the closed value model (`Value`, `ValueKind`, `WriteOutcome`)
//! - **Buffer**: `FixedBuf`, a bounds-checked fixed-capacity byte buffer
//! - **Transport**: non-blocking listener/connection abstraction with a
//!   std TCP implementation and an in-memory implementation for tests
//! - **Error**: transport and buffer error types
//!
//! Everything here is single-threaded and cooperative by design: no
//! operation blocks, and components expose a bounded `advance()` step that
//! an outer driver composes into the firmware main loop.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod error;
pub mod transport;
pub mod types;

pub use buffer::FixedBuf;
pub use error::{BufferError, TransportError};
pub use transport::{ConnId, Connection, Listener};
pub use types::{Value, ValueKind, WriteOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
