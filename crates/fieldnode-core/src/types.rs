// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for fieldnode.
//!
//! The value model is deliberately closed: every addressable point on the
//! controller reads and writes one of three kinds (boolean, integer,
//! floating-point). Protocol front-ends dispatch on `ValueKind` by pattern
//! matching rather than through trait objects.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Value
// =============================================================================

/// A value read from or written to a device point.
///
/// # Examples
///
/// ```
/// use fieldnode_core::types::Value;
///
/// let temp = Value::Float(23.4);
/// assert_eq!(temp.as_f32(), Some(23.4));
///
/// let relay = Value::Bool(true);
/// assert_eq!(relay.as_bool(), Some(true));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Boolean value (inputs, relays, coils).
    Bool(bool),

    /// Signed integer value.
    Int(i32),

    /// 32-bit floating point value (analog measurements).
    Float(f32),
}

impl Value {
    /// Returns the kind tag of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
        }
    }

    /// Returns the boolean payload, if this is a `Bool`.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    #[inline]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the float payload, if this is a `Float`.
    #[inline]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as `f64` regardless of kind.
    ///
    /// Booleans map to 0.0 / 1.0. Used by the register scaling path, which
    /// applies a multiplier before truncating to a 16-bit word.
    #[inline]
    pub fn as_scalar(&self) -> f64 {
        match self {
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f as f64,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

// =============================================================================
// ValueKind
// =============================================================================

/// The declared value kind of a device point.
///
/// Declared once at construction and immutable afterwards. The register
/// table uses the kind to scope addresses to the bit or word address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Single-bit boolean point.
    Bool,
    /// Integer point, transmitted as one 16-bit word.
    Int,
    /// Floating-point point, transmitted as one 16-bit word after scaling.
    Float,
}

impl ValueKind {
    /// Returns `true` for kinds carried in the bit address space.
    #[inline]
    pub const fn is_bit(&self) -> bool {
        matches!(self, ValueKind::Bool)
    }

    /// Returns `true` for kinds carried in the word address space.
    #[inline]
    pub const fn is_word(&self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::Float)
    }

    /// Returns the short name for this kind.
    pub const fn name(&self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// WriteOutcome
// =============================================================================

/// The outcome of a device write attempt.
///
/// Device writes never fail by panicking or blocking; every attempt reports
/// one of these outcomes, which the protocol front-ends map to their own
/// error surfaces (Modbus exception codes, HTTP status codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was accepted and applied.
    Accepted,
    /// The device does not support writes at all.
    NotSupported,
    /// The device is read-only in its current configuration.
    ReadOnly,
    /// The value kind or payload was not acceptable for this device.
    InvalidValue,
    /// The write failed for another reason.
    Failed,
}

impl WriteOutcome {
    /// Returns `true` if the write was applied.
    #[inline]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, WriteOutcome::Accepted)
    }
}

// =============================================================================
// Tests
// =============================================================================
