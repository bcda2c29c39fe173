// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! B+Tree on-disk index engine.
//!
//! Block-oriented persistent index mapping 32-bit keys to 64-bit row
//! addresses, with mmap-based file access.
//!
//! ## Features
//!
//! - **On-Disk Persistence**: one backing file, 20-byte header plus
//!   fixed-size node blocks, big-endian throughout
//! - **Self-Balancing**: splits on overflow, borrow/merge repair on
//!   underflow, root transitions in both directions
//! - **Range Queries**: sibling-linked leaves scanned in ascending order
//! - **Block Recycling**: freed node blocks thread onto a free list whose
//!   head lives in the header and survives reopen
//!
//! ## Example Usage
//!
//! ```rust
//! use blockbase::btree::BTreeIndex;
//!
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("index.btree");
//!
//! let mut tree = BTreeIndex::create(&path, 600)?; // order 50
//! tree.insert(7, 2048)?;
//! tree.insert(9, 4096)?;
//!
//! assert_eq!(tree.search(7)?, 2048);
//! assert_eq!(tree.range_search(0, 100)?, vec![2048, 4096]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod iter;
mod node;
mod tree;
mod types;


// Re-export public API
pub use iter::RangeScan;
pub use node::{BranchNode, LeafNode, Node};
pub use tree::BTreeIndex;
pub use types::{BlockAddr, Key, Order, HEADER_SIZE, MIN_BLOCK_SIZE, MIN_ORDER, NONE_ADDR};
