// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldnode-bin
//!
//! The `fieldnode` binary: CLI parsing, logging initialization, and the
//! wiring that turns a configuration file into a running controller.
//!
//! ## Usage
//!
//! ```bash
//! # Start the controller (default command)
//! fieldnode
//!
//! # Start with a custom config
//! fieldnode -c /etc/fieldnode/node.yaml
//!
//! # Validate configuration
//! fieldnode validate
//!
//! # Show version
//! fieldnode version
//! ```
//!
//! The `run` command builds the device set and register table once, binds
//! the Modbus and query listeners, and then drives every subsystem's
//! `advance()` step from one cooperative loop — no threads, no async
//! runtime, a short sleep whenever a whole pass was idle.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{build_devices, build_table, Controller, SimBench};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
