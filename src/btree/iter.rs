// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Range scan iterator for B+Tree leaf traversal.
//!
//! Implements range queries by walking the linked list of leaf nodes.
//! Avoids tree traversal after finding the start position by following
//! sibling pointers.
//!
//! ## Algorithm
//!
//! 1. Caller descends to the leaf that would contain the low bound
//! 2. Skip leading keys below the low bound
//! 3. Yield entries until a key exceeds the high bound
//! 4. Follow the sibling pointer and repeat until the none-address
//!
//! ## Performance
//!
//! - Initialisation: O(log n) descent, paid by the caller
//! - Per item: O(1) amortised (sequential block reads)
//! - Total: O(log n + k) where k = result count

use crate::btree::node::{LeafNode, Node};
use crate::btree::tree::BTreeIndex;
use crate::btree::types::{BlockAddr, Key, NONE_ADDR};
use crate::error::{BlockError, BlockResult};

/// Iterator over `(key, address)` pairs in `[low, high]`, ascending.
///
/// Yields `Result`-wrapped items: a decode failure or a sibling pointer
/// that targets a branch surfaces as an `Err` item and ends the scan,
/// rather than silently truncating the result.
///
/// ## Lifetime
/// Borrows the tree for the whole traversal; the tree cannot be mutated
/// while a scan is live.
pub struct RangeScan<'a> {
    /// Tree being scanned (node reads go through it).
    tree: &'a BTreeIndex,

    /// Leaf currently being drained (`None` once the chain ends).
    leaf: Option<LeafNode>,

    /// Cursor into the current leaf's keys.
    pos: usize,

    /// Inclusive upper bound; the scan stops at the first key above it.
    high: Key,

    /// Whether the scan has terminated.
    done: bool,
}

impl<'a> RangeScan<'a> {
    /// Scan starting inside `leaf`, skipping keys below `low`.
    ///
    /// Only the first leaf needs skipping; every later leaf in the chain
    /// holds strictly greater keys.
    pub(crate) fn new(tree: &'a BTreeIndex, leaf: LeafNode, low: Key, high: Key) -> Self {
        let pos = leaf.keys.partition_point(|&k| k < low);
        Self {
            tree,
            leaf: Some(leaf),
            pos,
            high,
            done: false,
        }
    }

    /// Scan over an empty tree: yields nothing.
    pub(crate) fn empty(tree: &'a BTreeIndex) -> Self {
        Self {
            tree,
            leaf: None,
            pos: 0,
            high: 0,
            done: true,
        }
    }

    /// Load the sibling leaf, or report the end of the chain.
    fn advance(&mut self, next: BlockAddr) -> Option<BlockResult<(Key, BlockAddr)>> {
        if next == NONE_ADDR {
            self.done = true;
            self.leaf = None;
            return None;
        }
        match self.tree.read_node(next) {
            Ok(Node::Leaf(leaf)) => {
                self.leaf = Some(leaf);
                self.pos = 0;
                None
            }
            Ok(Node::Branch(_)) => {
                self.done = true;
                Some(Err(BlockError::CorruptedNode {
                    addr: next,
                    reason: "sibling pointer targets a branch".to_string(),
                }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<'a> Iterator for RangeScan<'a> {
    type Item = BlockResult<(Key, BlockAddr)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let leaf = self.leaf.as_ref()?;

            if self.pos < leaf.key_count() {
                let key = leaf.keys[self.pos];
                if key > self.high {
                    self.done = true;
                    return None;
                }
                let addr = leaf.rows[self.pos];
                self.pos += 1;
                return Some(Ok((key, addr)));
            }

            let next = leaf.next;
            if let Some(err) = self.advance(next) {
                return Some(err);
            }
            if self.done {
                return None;
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // Determining the count would require scanning the range
        (0, None)
    }
}

impl<'a> std::fmt::Debug for RangeScan<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeScan")
            .field("pos", &self.pos)
            .field("high", &self.high)
            .field("done", &self.done)
            .finish()
    }
}
