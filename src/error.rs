// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Error types for blockbase operations.
//!
//! Provides structured error handling with detailed context for debugging.

use std::fmt;

/// Standard Result type for all blockbase operations.
pub type BlockResult<T> = Result<T, BlockError>;

/// Error types for blockbase operations.
#[derive(Debug, Clone)]
pub enum BlockError {
    /// I/O error during file operations.
    IoError { operation: String, reason: String },

    /// Node block failed to decode (impossible count, truncated block).
    CorruptedNode { addr: i64, reason: String },

    /// File header failed to decode on open.
    CorruptedHeader { path: String, reason: String },

    /// Block size too small to hold an order-3 node.
    InvalidBlockSize { size: u32, min: u32 },

    /// Range search called with low > high.
    InvalidRange { low: i32, high: i32 },

    /// Invalid field-length vector at table creation.
    InvalidSchema { reason: String },

    /// Row field rejected (wrong arity or value too long).
    InvalidField { index: usize, reason: String },
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError { operation, reason } => {
                write!(f, "I/O error during '{}': {}", operation, reason)
            }
            Self::CorruptedNode { addr, reason } => {
                write!(f, "Corrupted node at offset {}: {}", addr, reason)
            }
            Self::CorruptedHeader { path, reason } => {
                write!(f, "Corrupted header in '{}': {}", path, reason)
            }
            Self::InvalidBlockSize { size, min } => {
                write!(f, "Invalid block size: {} (minimum: {})", size, min)
            }
            Self::InvalidRange { low, high } => {
                write!(f, "Invalid range: low {} exceeds high {}", low, high)
            }
            Self::InvalidSchema { reason } => {
                write!(f, "Invalid schema: {}", reason)
            }
            Self::InvalidField { index, reason } => {
                write!(f, "Invalid field {}: {}", index, reason)
            }
        }
    }
}

impl std::error::Error for BlockError {}

// Convenience conversion from std::io::Error
impl From<std::io::Error> for BlockError {
    fn from(err: std::io::Error) -> Self {
        BlockError::IoError {
            operation: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}
