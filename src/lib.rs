// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! blockbase - disk-backed B+Tree index with a fixed-schema row table.
//!
//! A block-oriented on-disk B+Tree maps 32-bit keys to 64-bit addresses;
//! a thin row table built on top of it stores fixed-schema records and
//! uses the tree to enforce key uniqueness and to accelerate equality and
//! range lookups.
//!
//! ## Features
//!
//! - **Self-Balancing Index**: splits on overflow, borrow/merge repair on
//!   underflow, root transitions in both directions
//! - **Range Queries**: sibling-linked leaves scanned in ascending order
//! - **Space Recycling**: freed node blocks and row slots thread onto
//!   free lists that survive reopen
//! - **Fixed Binary Format**: big-endian throughout; a file written on
//!   one platform opens on any other
//!
//! ## Quick Start
//!
//! ```rust
//! use blockbase::table::RowTable;
//!
//! let dir = tempfile::tempdir()?;
//! let mut table = RowTable::create(dir.path().join("users.rows"), &[12, 24], 600)?;
//!
//! table.insert(1, &["ada", "ada@example.com"])?;
//! table.insert(2, &["grace", "grace@example.com"])?;
//!
//! let row = table.search(1)?.unwrap();
//! assert_eq!(row[0], "ada");
//!
//! // Range results carry the key in front of the fields
//! let rows = table.range_search(1, 2)?;
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows[0][0], "1");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! blockbase is organised into modules:
//!
//! - **btree**: the B+Tree engine - node codec, free list, search,
//!   insertion with split propagation, deletion with underflow repair
//! - **table**: the row table - fixed-schema slots, slot recycling,
//!   delegation to the tree for all key decisions
//! - **error**: structured error types shared across the crate
//!
//! Neither structure is crash-safe or safe for concurrent access; a file
//! belongs to exactly one instance at a time.

pub mod btree;
pub mod error;
pub mod table;

// Re-export commonly used types
pub use btree::{BTreeIndex, BlockAddr, Key, Order, RangeScan, NONE_ADDR};
pub use error::{BlockError, BlockResult};
pub use table::{RowTable, TableSchema};
