// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse the configuration file.
    #[error("failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Parser error message.
        message: String,
    },

    /// A field failed validation.
    #[error("validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// A numeric field is outside its accepted range.
    #[error("value out of range for '{field}': {value} (expected {min}..={max})")]
    OutOfRange {
        /// The field name.
        field: String,
        /// The offending value.
        value: u64,
        /// Minimum accepted value.
        min: u64,
        /// Maximum accepted value.
        max: u64,
    },

    /// Two devices share one name.
    #[error("duplicate device name: {name}")]
    DuplicateDeviceName {
        /// The duplicated name.
        name: String,
    },

    /// A register entry references a device that is not configured.
    #[error("register at address {address} references unknown device '{device}'")]
    UnknownDevice {
        /// The referenced device name.
        device: String,
        /// The register's address.
        address: u16,
    },

    /// Two register entries collide in one address space.
    #[error("duplicate {space} address {address}")]
    DuplicateAddress {
        /// The address space of the collision ("bit" or "word").
        space: &'static str,
        /// The colliding address.
        address: u16,
    },

    /// File I/O error.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file does not exist.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The file extension maps to no supported format.
    #[error("unsupported config format: {format}")]
    UnsupportedFormat {
        /// The unrecognized extension.
        format: String,
    },

    /// An environment override carries an unparsable value.
    #[error("invalid environment override '{name}': {message}")]
    InvalidEnvVar {
        /// The environment variable name.
        name: String,
        /// Error message.
        message: String,
    },

    /// Serialization/deserialization error without file context.
    #[error("serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an out-of-range error.
    pub fn out_of_range(field: impl Into<String>, value: u64, min: u64, max: u64) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value,
            min,
            max,
        }
    }

    /// Creates a duplicate device name error.
    pub fn duplicate_device_name(name: impl Into<String>) -> Self {
        Self::DuplicateDeviceName { name: name.into() }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file-not-found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an invalid environment override error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let err = ConfigError::validation("node.id", "cannot be empty");
        assert_eq!(
            err.to_string(),
            "validation failed for 'node.id': cannot be empty"
        );

        let err = ConfigError::out_of_range("modbus.slots", 0, 1, 64);
        assert_eq!(
            err.to_string(),
            "value out of range for 'modbus.slots': 0 (expected 1..=64)"
        );

        let err = ConfigError::DuplicateAddress {
            space: "bit",
            address: 4,
        };
        assert_eq!(err.to_string(), "duplicate bit address 4");
    }
}
