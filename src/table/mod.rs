// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-schema row table over a B+Tree key index.
//!
//! Rows live in fixed-size slots in a row file; key uniqueness, lookups
//! and range ordering are enforced by a sibling B+Tree index file. Freed
//! row slots recycle through a free list threaded through the slots
//! themselves, head mirrored in the row-file header.
//!
//! ## Example Usage
//!
//! ```rust
//! use blockbase::table::RowTable;
//!
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("users.rows");
//!
//! // Two fields: a 10-character name, a 20-character email
//! let mut table = RowTable::create(&path, &[10, 20], 600)?;
//! table.insert(1, &["ada", "ada@example.com"])?;
//!
//! let fields = table.search(1)?.unwrap();
//! assert_eq!(fields, vec!["ada".to_string(), "ada@example.com".to_string()]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod schema;
mod table;

#[cfg(test)]
mod table_test;

// Re-export public API
pub use schema::TableSchema;
pub use table::RowTable;
