// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the fieldnode binary.

use thiserror::Error;

/// Result type alias for fieldnode-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the fieldnode binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Initialization error.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Config loading/validation error.
    #[error("config error: {0}")]
    Config(#[from] fieldnode_config::ConfigError),

    /// Register table construction error.
    #[error("register table error: {0}")]
    Table(#[from] fieldnode_modbus::TableError),

    /// Transport error (socket binding, listener fault).
    #[error("transport error: {0}")]
    Transport(#[from] fieldnode_core::TransportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) | Self::Table(_) => 1,
            Self::Initialization(_) => 2,
            Self::Transport(_) => 3,
            Self::Io(_) => 4,
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error and its cause chain to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with its code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BinError::config("bad file");
        assert_eq!(err.to_string(), "configuration error: bad file");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::config("x").exit_code(), 1);
        assert_eq!(BinError::init("x").exit_code(), 2);
        let transport = BinError::from(fieldnode_core::TransportError::Closed);
        assert_eq!(transport.exit_code(), 3);
        let io = BinError::from(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert_eq!(io.exit_code(), 4);
    }

    #[test]
    fn test_config_error_converts() {
        let err: BinError = fieldnode_config::ConfigError::validation("node.id", "empty").into();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().starts_with("config error:"));
    }
}
