// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Error types for bkv operations.
//!
//! Provides structured error handling with detailed context for debugging.

use std::fmt;

/// Standard Result type for all bkv operations.
pub type BkvResult<T> = Result<T, BkvError>;

/// Error types for bkv operations.
#[derive(Debug, Clone)]
pub enum BkvError {
    /// Invalid branching factor passed to `Order::new`.
    InvalidOrder { order: u16, min: u16 },

    /// `range(start, end)` called with `start > end`.
    InvalidRange,

    /// `bulk_insert` called with mismatched key/value slice lengths.
    MismatchedBulkLengths { keys: usize, values: usize },

    /// Secondary index registered under a name that is already taken.
    IndexAlreadyExists { name: String },

    /// Operation referenced a secondary index name that does not exist.
    IndexNotFound { name: String },

    /// Insert/update would violate a unique secondary index constraint.
    UniqueConstraintViolation { index: String, reason: String },

    /// Update targeted a primary key that is not present in the store.
    NotFound { key: String },

    /// WAL file header failed magic/version validation on open.
    WalCorrupt { path: String, reason: String },

    /// I/O error during WAL file operations.
    Io { operation: String, reason: String },
}

impl fmt::Display for BkvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOrder { order, min } => {
                write!(f, "invalid branching factor: {} (minimum: {})", order, min)
            }
            Self::InvalidRange => {
                write!(f, "invalid range: start key is greater than end key")
            }
            Self::MismatchedBulkLengths { keys, values } => {
                write!(
                    f,
                    "bulk_insert received {} keys but {} values",
                    keys, values
                )
            }
            Self::IndexAlreadyExists { name } => {
                write!(f, "secondary index '{}' already exists", name)
            }
            Self::IndexNotFound { name } => {
                write!(f, "secondary index '{}' not found", name)
            }
            Self::UniqueConstraintViolation { index, reason } => {
                write!(f, "unique constraint on index '{}' violated: {}", index, reason)
            }
            Self::NotFound { key } => {
                write!(f, "key '{}' not found", key)
            }
            Self::WalCorrupt { path, reason } => {
                write!(f, "WAL file '{}' is corrupt: {}", path, reason)
            }
            Self::Io { operation, reason } => {
                write!(f, "I/O error during '{}': {}", operation, reason)
            }
        }
    }
}

impl std::error::Error for BkvError {}

impl From<std::io::Error> for BkvError {
    fn from(err: std::io::Error) -> Self {
        BkvError::Io {
            operation: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}
