// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Core types for the B+Tree index backend.
//!
//! Defines key/address aliases, the file header layout constants, and the
//! `Order` capacity parameter derived from a caller-supplied block size.

use crate::error::{BlockError, BlockResult};

/// Key type stored in the tree: 32-bit signed, big-endian on disk.
pub type Key = i32;

/// Block address type: byte offset into the backing file, 64-bit signed.
///
/// A node's identity is its file offset. Offset zero can never hold a node
/// (the first bytes of the file are the header), so zero doubles as the
/// none-address sentinel.
pub type BlockAddr = i64;

/// Sentinel address denoting "no node" / "no sibling" / "no row".
pub const NONE_ADDR: BlockAddr = 0;

/// Size of the tree file header in bytes.
///
/// ## Layout
/// ```text
/// Offset | Size | Field
/// -------|------|---------------------
/// 0      | 8    | root address
/// 8      | 8    | free-list head
/// 16     | 4    | block size
/// ```
/// Node blocks follow from byte 20, unaligned, at `20 + k * block_size`.
pub const HEADER_SIZE: u64 = 20;

/// Bytes of node record consumed per unit of order.
///
/// Each additional unit of order buys one 4-byte key slot and one 8-byte
/// child slot; the derivation `order = block_size / 12` follows.
pub const BYTES_PER_ORDER: u32 = 12;

/// Minimum supported order.
///
/// Order 2 would make leaf capacity (`order - 1`) equal the non-root
/// minimum, leaving splits nothing to distribute.
pub const MIN_ORDER: u32 = 3;

/// Minimum block size (the block that yields [`MIN_ORDER`]).
pub const MIN_BLOCK_SIZE: u32 = MIN_ORDER * BYTES_PER_ORDER;

/// B+Tree order (capacity parameter) derived from a block size.
///
/// The order is the maximum number of children a branch node may hold.
/// Leaves hold up to `order - 1` entries; branches hold up to `order - 1`
/// separator keys. The non-root occupancy floor derives from the same
/// parameter.
///
/// ## Example
/// ```rust
/// use blockbase::btree::Order;
///
/// let order = Order::from_block_size(60)?; // order 5
/// assert_eq!(order.value(), 5);
/// assert_eq!(order.max_keys(), 4);
/// assert_eq!(order.min_keys(), 2);
/// # Ok::<(), blockbase::BlockError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order(u32);

impl Order {
    /// Derive the order from a block size.
    ///
    /// ## Input
    /// - `block_size`: bytes available per node block
    ///
    /// ## Output
    /// - `Ok(Order)`: `block_size / 12`, at least order 3
    /// - `Err(BlockError::InvalidBlockSize)`: block too small
    ///
    /// The node record needs 4 bytes for the count, `(order - 1) * 4` for
    /// keys and `order * 8` for child slots, so `12 * order` bytes always
    /// fit the block the order was derived from.
    pub fn from_block_size(block_size: u32) -> BlockResult<Self> {
        let order = block_size / BYTES_PER_ORDER;
        if order < MIN_ORDER {
            return Err(BlockError::InvalidBlockSize {
                size: block_size,
                min: MIN_BLOCK_SIZE,
            });
        }
        Ok(Self(order))
    }

    /// Raw order value.
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Maximum keys per node (`order - 1`), leaf entries and branch
    /// separators alike.
    pub fn max_keys(&self) -> usize {
        (self.0 - 1) as usize
    }

    /// Minimum keys for a non-root node: `ceil(order / 2) - 1`.
    ///
    /// The root is exempt; it may hold fewer, but never zero unless the
    /// tree is empty.
    pub fn min_keys(&self) -> usize {
        ((self.0 + 1) / 2 - 1) as usize
    }

    /// Maximum children per branch (`order`); also the number of 64-bit
    /// slots in the node record.
    pub fn max_children(&self) -> usize {
        self.0 as usize
    }

    /// Serialised node record size: count + keys + child slots.
    ///
    /// `4 + 4 * (order - 1) + 8 * order` collapses to `12 * order`.
    pub fn node_bytes(&self) -> usize {
        (BYTES_PER_ORDER * self.0) as usize
    }
}
