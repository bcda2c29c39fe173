// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! B+Tree index engine with mmap-based persistence.
//!
//! Main index structure mapping 32-bit keys to 64-bit row addresses.
//! One backing file holds a 20-byte header followed by fixed-size node
//! blocks; freed blocks are recycled through a free list threaded through
//! the blocks themselves.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │ BTreeIndex                                      │
//! ├─────────────────────────────────────────────────┤
//! │ - path: index.btree                             │
//! │ - file: File handle                             │
//! │ - mmap: MmapMut (whole file)                    │
//! │ - root: BlockAddr (0 = empty tree)              │
//! │ - free_head: BlockAddr (0 = no free blocks)     │
//! │ - order: Order (block_size / 12)                │
//! └─────────────────────────────────────────────────┘
//!              │ mmap I/O
//!              ▼
//! ┌──────────────────────────────────────────────┐
//! │ index.btree                                  │
//! │ [header 20B][block][block][block]...         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! - **Point lookup**: O(log n) descent + binary search in the leaf
//! - **Range scan**: O(log n + k) descent + sequential sibling walk
//! - **Insert**: O(log n) with upward split propagation
//! - **Remove**: O(log n) with upward borrow/merge repair
//!
//! ## Example Usage
//!
//! ```rust
//! use blockbase::btree::BTreeIndex;
//!
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("index.btree");
//!
//! let mut tree = BTreeIndex::create(&path, 60)?; // order 5
//! assert!(tree.insert(42, 1000)?);
//! assert!(!tree.insert(42, 2000)?); // duplicate, unchanged
//! assert_eq!(tree.search(42)?, 1000);
//! assert_eq!(tree.remove(42)?, 1000);
//! tree.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::btree::iter::RangeScan;
use crate::btree::node::{BranchNode, LeafNode, Node};
use crate::btree::types::{BlockAddr, Key, Order, HEADER_SIZE, NONE_ADDR};
use crate::error::{BlockError, BlockResult};
use memmap2::MmapMut;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// One visited branch on the descent path.
///
/// The engine never stores parent pointers on disk; split propagation and
/// underflow repair consult this in-memory stack instead.
pub(crate) struct PathEntry {
    pub addr: BlockAddr,
    pub branch: BranchNode,
    pub child_idx: usize,
}

/// Disk-backed B+Tree index over `(i32 key, i64 address)` pairs.
///
/// ## File Layout
/// Bytes `[0, 8)` root address, `[8, 16)` free-list head, `[16, 20)` block
/// size; node blocks follow from byte 20. All integers big-endian.
///
/// ## Thread Safety
/// Not thread-safe; a file is owned by exactly one instance. Concurrent
/// instances over the same file are unsupported.
///
/// ## Resource Lifetime
/// The file handle is held from construction until [`close`](Self::close)
/// (or drop); node images are transient per operation, there is no cache.
pub struct BTreeIndex {
    /// Path to the index file.
    path: PathBuf,

    /// File handle, kept for growth via `set_len`.
    file: File,

    /// Memory-mapped file, remapped after growth.
    mmap: MmapMut,

    /// Root node address ([`NONE_ADDR`] for an empty tree).
    root: BlockAddr,

    /// Free-list head ([`NONE_ADDR`] when no block is free).
    free_head: BlockAddr,

    /// Block size from the header.
    block_size: u32,

    /// Capacity parameter derived from the block size.
    order: Order,
}

impl std::fmt::Debug for BTreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTreeIndex")
            .field("path", &self.path)
            .field("root", &self.root)
            .field("free_head", &self.free_head)
            .field("order", &self.order)
            .finish()
    }
}

impl BTreeIndex {
    /// Create a fresh index file, replacing any existing file at the path.
    ///
    /// ## Input
    /// - `path`: index file location
    /// - `block_size`: bytes per node block; must yield order ≥ 3
    ///
    /// ## Output
    /// - `Ok(BTreeIndex)`: empty tree, header written
    /// - `Err(BlockError::InvalidBlockSize)`: block size below the floor
    /// - `Err(BlockError::IoError)`: underlying file failure
    ///
    /// ## Side Effects
    /// - Deletes a pre-existing file at `path`
    pub fn create<P: AsRef<Path>>(path: P, block_size: u32) -> BlockResult<Self> {
        let path = path.as_ref().to_path_buf();
        let order = Order::from_block_size(block_size)?;

        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| BlockError::IoError {
                operation: "create_index".to_string(),
                reason: e.to_string(),
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| BlockError::IoError {
                operation: "create_index".to_string(),
                reason: e.to_string(),
            })?;

        file.set_len(HEADER_SIZE).map_err(|e| BlockError::IoError {
            operation: "init_index_size".to_string(),
            reason: e.to_string(),
        })?;

        let mut mmap = unsafe {
            MmapMut::map_mut(&file).map_err(|e| BlockError::IoError {
                operation: "mmap_index".to_string(),
                reason: e.to_string(),
            })?
        };

        mmap[0..8].copy_from_slice(&NONE_ADDR.to_be_bytes());
        mmap[8..16].copy_from_slice(&NONE_ADDR.to_be_bytes());
        mmap[16..20].copy_from_slice(&block_size.to_be_bytes());

        let tree = Self {
            path,
            file,
            mmap,
            root: NONE_ADDR,
            free_head: NONE_ADDR,
            block_size,
            order,
        };
        tree.flush("create_index")?;

        Ok(tree)
    }

    /// Open an existing index file and read its header.
    ///
    /// ## Output
    /// - `Ok(BTreeIndex)`: root, free list and order restored
    /// - `Err(BlockError::CorruptedHeader)`: file too short or the stored
    ///   block size is impossible
    /// - `Err(BlockError::IoError)`: underlying file failure
    pub fn open<P: AsRef<Path>>(path: P) -> BlockResult<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| BlockError::IoError {
                operation: "open_index".to_string(),
                reason: e.to_string(),
            })?;

        let len = file
            .metadata()
            .map_err(|e| BlockError::IoError {
                operation: "open_index".to_string(),
                reason: e.to_string(),
            })?
            .len();
        if len < HEADER_SIZE {
            return Err(BlockError::CorruptedHeader {
                path: path.display().to_string(),
                reason: format!("file is {} bytes, header needs {}", len, HEADER_SIZE),
            });
        }

        let mmap = unsafe {
            MmapMut::map_mut(&file).map_err(|e| BlockError::IoError {
                operation: "mmap_index".to_string(),
                reason: e.to_string(),
            })?
        };

        let root = read_addr(&mmap, 0);
        let free_head = read_addr(&mmap, 8);
        let block_size = u32::from_be_bytes([mmap[16], mmap[17], mmap[18], mmap[19]]);

        let order =
            Order::from_block_size(block_size).map_err(|_| BlockError::CorruptedHeader {
                path: path.display().to_string(),
                reason: format!("stored block size {} is below the minimum", block_size),
            })?;

        Ok(Self {
            path,
            file,
            mmap,
            root,
            free_head,
            block_size,
            order,
        })
    }

    /// Capacity parameter of this tree.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Block size from the header.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Whether the tree holds no keys.
    pub fn is_empty(&self) -> bool {
        self.root == NONE_ADDR
    }

    /// Current root address, for white-box inspection.
    pub(crate) fn root_addr(&self) -> BlockAddr {
        self.root
    }

    /// Current free-list head, for white-box inspection.
    pub(crate) fn free_head_addr(&self) -> BlockAddr {
        self.free_head
    }

    /// Equality lookup.
    ///
    /// ## Output
    /// - `Ok(addr)`: the address bound to `key`
    /// - `Ok(NONE_ADDR)`: key absent
    /// - `Err(BlockError)`: I/O or corruption
    pub fn search(&self, key: Key) -> BlockResult<BlockAddr> {
        if self.root == NONE_ADDR {
            return Ok(NONE_ADDR);
        }
        let (_, leaf, _) = self.descend(key)?;
        Ok(leaf.find_row(key).unwrap_or(NONE_ADDR))
    }

    /// Lazy scan over `[low, high]`, ascending.
    ///
    /// Builds the descent path for `low` once, then walks the sibling
    /// chain. Items are `Result`-wrapped so corruption mid-scan surfaces
    /// to the caller instead of silently truncating the result.
    pub fn scan(&self, low: Key, high: Key) -> BlockResult<RangeScan<'_>> {
        if low > high {
            return Err(BlockError::InvalidRange { low, high });
        }
        if self.root == NONE_ADDR {
            return Ok(RangeScan::empty(self));
        }
        let (_, leaf, _) = self.descend(low)?;
        Ok(RangeScan::new(self, leaf, low, high))
    }

    /// Collect the addresses for every key in `[low, high]`, ascending.
    ///
    /// ## Output
    /// - `Ok(addresses)`: possibly empty
    /// - `Err(BlockError::InvalidRange)`: `low > high`
    /// - `Err(BlockError)`: I/O or corruption
    pub fn range_search(&self, low: Key, high: Key) -> BlockResult<Vec<BlockAddr>> {
        self.scan(low, high)?
            .map(|item| item.map(|(_, addr)| addr))
            .collect()
    }

    /// Insert a key bound to a row address.
    ///
    /// ## Output
    /// - `Ok(true)`: inserted
    /// - `Ok(false)`: key already present; the tree is unchanged
    /// - `Err(BlockError)`: I/O or corruption
    ///
    /// ## Algorithm
    /// Bootstrap a single-leaf root for an empty tree; otherwise descend,
    /// insert into the leaf and, when it overflows, split it and propagate
    /// the promoted key upward, splitting branches as needed. A split that
    /// consumes the root installs a fresh one-key branch above it.
    pub fn insert(&mut self, key: Key, addr: BlockAddr) -> BlockResult<bool> {
        if self.root == NONE_ADDR {
            let mut leaf = LeafNode::new();
            leaf.insert(key, addr);
            let at = self.acquire_block()?;
            self.write_node(at, &Node::Leaf(leaf))?;
            self.set_root(at);
            self.flush("insert")?;
            return Ok(true);
        }

        let (leaf_addr, mut leaf, mut path) = self.descend(key)?;

        if leaf.find_row(key).is_some() {
            return Ok(false);
        }

        leaf.insert(key, addr);
        if leaf.key_count() <= self.order.max_keys() {
            self.write_node(leaf_addr, &Node::Leaf(leaf))?;
            self.flush("insert")?;
            return Ok(true);
        }

        // Leaf overflow: split, then carry the promoted key upward.
        let (mut promoted, right) = leaf.split();
        let mut right_addr = self.acquire_block()?;
        leaf.next = right_addr;
        self.write_node(leaf_addr, &Node::Leaf(leaf))?;
        self.write_node(right_addr, &Node::Leaf(right))?;
        let mut left_addr = leaf_addr;

        loop {
            match path.pop() {
                None => {
                    // The split consumed the old root; grow a level.
                    let mut new_root = BranchNode::new();
                    new_root.children.push(left_addr);
                    new_root.insert_key(promoted, right_addr);
                    let root_addr = self.acquire_block()?;
                    self.write_node(root_addr, &Node::Branch(new_root))?;
                    self.set_root(root_addr);
                    break;
                }
                Some(PathEntry {
                    addr: parent_addr,
                    branch: mut parent,
                    ..
                }) => {
                    parent.insert_key(promoted, right_addr);
                    if parent.key_count() <= self.order.max_keys() {
                        self.write_node(parent_addr, &Node::Branch(parent))?;
                        break;
                    }
                    let (up, right_branch) = parent.split();
                    let new_right = self.acquire_block()?;
                    self.write_node(parent_addr, &Node::Branch(parent))?;
                    self.write_node(new_right, &Node::Branch(right_branch))?;
                    promoted = up;
                    left_addr = parent_addr;
                    right_addr = new_right;
                }
            }
        }

        self.flush("insert")?;
        Ok(true)
    }

    /// Remove a key.
    ///
    /// ## Output
    /// - `Ok(addr)`: the address the key was bound to
    /// - `Ok(NONE_ADDR)`: key absent; the tree is unchanged
    /// - `Err(BlockError)`: I/O or corruption
    ///
    /// ## Algorithm
    /// Delete from the leaf. An emptied root leaf returns its block to the
    /// free list and the tree becomes empty. A non-root leaf that drops
    /// below `min_keys` is repaired by borrowing from a richer sibling or
    /// merging with one, propagating upward; a root branch left with a
    /// single child is replaced by that child.
    pub fn remove(&mut self, key: Key) -> BlockResult<BlockAddr> {
        if self.root == NONE_ADDR {
            return Ok(NONE_ADDR);
        }

        let (leaf_addr, mut leaf, path) = self.descend(key)?;
        let removed = match leaf.remove(key) {
            Some(addr) => addr,
            None => return Ok(NONE_ADDR),
        };

        if leaf_addr == self.root {
            if leaf.key_count() == 0 {
                self.release_block(leaf_addr);
                self.set_root(NONE_ADDR);
            } else {
                self.write_node(leaf_addr, &Node::Leaf(leaf))?;
            }
            self.flush("remove")?;
            return Ok(removed);
        }

        let underflowed = leaf.key_count() < self.order.min_keys();
        let leaf_node = Node::Leaf(leaf);
        self.write_node(leaf_addr, &leaf_node)?;
        if underflowed {
            self.repair_underflow(leaf_addr, leaf_node, path)?;
        }

        self.flush("remove")?;
        Ok(removed)
    }

    /// Flush the mapping and release the file handle.
    ///
    /// Consuming `self` makes use-after-close unrepresentable; dropping
    /// the instance without calling this flushes on a best-effort basis.
    pub fn close(self) -> BlockResult<()> {
        self.flush("close_index")
    }

    // ------------------------------------------------------------------
    // Descent
    // ------------------------------------------------------------------

    /// Walk from the root to the leaf that would contain `key`, recording
    /// every visited branch and the child index taken.
    pub(crate) fn descend(&self, key: Key) -> BlockResult<(BlockAddr, LeafNode, Vec<PathEntry>)> {
        let mut addr = self.root;
        let mut path = Vec::new();

        loop {
            match self.read_node(addr)? {
                Node::Leaf(leaf) => return Ok((addr, leaf, path)),
                Node::Branch(branch) => {
                    let child_idx = branch.find_child(key);
                    let child = branch.children[child_idx];
                    path.push(PathEntry {
                        addr,
                        branch,
                        child_idx,
                    });
                    addr = child;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Underflow repair
    // ------------------------------------------------------------------

    /// Restore the occupancy floor after a deletion, walking the recorded
    /// path upward until a borrow succeeds, a parent stays within bounds,
    /// or the root is replaced.
    fn repair_underflow(
        &mut self,
        mut child_addr: BlockAddr,
        mut child: Node,
        mut path: Vec<PathEntry>,
    ) -> BlockResult<()> {
        let min = self.order.min_keys();

        while let Some(PathEntry {
            addr: parent_addr,
            branch: mut parent,
            child_idx: i,
        }) = path.pop()
        {
            // A richer left sibling donates and repair stops here.
            if i > 0 {
                let left_addr = parent.children[i - 1];
                let mut left = self.read_node(left_addr)?;
                if left.key_count() > min {
                    borrow_from_left(&mut parent, i, &mut left, &mut child, left_addr)?;
                    self.write_node(left_addr, &left)?;
                    self.write_node(child_addr, &child)?;
                    self.write_node(parent_addr, &Node::Branch(parent))?;
                    return Ok(());
                }
            }

            // Otherwise a richer right sibling.
            if i < parent.keys.len() {
                let right_addr = parent.children[i + 1];
                let mut right = self.read_node(right_addr)?;
                if right.key_count() > min {
                    borrow_from_right(&mut parent, i, &mut child, &mut right, right_addr)?;
                    self.write_node(child_addr, &child)?;
                    self.write_node(right_addr, &right)?;
                    self.write_node(parent_addr, &Node::Branch(parent))?;
                    return Ok(());
                }
            }

            // No donor: merge. The right-hand node always folds into the
            // left-hand one and its block goes back to the free list.
            let survivor = if i > 0 {
                let left_addr = parent.children[i - 1];
                let mut left = self.read_node(left_addr)?;
                let separator = parent.keys.remove(i - 1);
                parent.children.remove(i);
                merge_nodes(&mut left, separator, child, child_addr)?;
                self.release_block(child_addr);
                self.write_node(left_addr, &left)?;
                left_addr
            } else {
                let right_addr = parent.children[i + 1];
                let right = self.read_node(right_addr)?;
                let separator = parent.keys.remove(i);
                parent.children.remove(i + 1);
                merge_nodes(&mut child, separator, right, right_addr)?;
                self.release_block(right_addr);
                self.write_node(child_addr, &child)?;
                child_addr
            };

            if parent_addr == self.root {
                if parent.key_count() == 0 {
                    // Root branch down to a single child: drop a level.
                    self.release_block(parent_addr);
                    self.set_root(survivor);
                } else {
                    self.write_node(parent_addr, &Node::Branch(parent))?;
                }
                return Ok(());
            }

            let parent_node = Node::Branch(parent);
            self.write_node(parent_addr, &parent_node)?;
            if parent_node.key_count() >= min {
                return Ok(());
            }

            child_addr = parent_addr;
            child = parent_node;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Block I/O and free list
    // ------------------------------------------------------------------

    /// Decode the node stored at a block address.
    pub(crate) fn read_node(&self, addr: BlockAddr) -> BlockResult<Node> {
        let offset = self.checked_offset(addr)?;
        Node::decode(
            &self.mmap[offset..offset + self.block_size as usize],
            self.order,
            addr,
        )
    }

    /// Encode a node into its block. Trailing block bytes keep whatever
    /// they held; readers never consume them.
    fn write_node(&mut self, addr: BlockAddr, node: &Node) -> BlockResult<()> {
        let offset = self.checked_offset(addr)?;
        let bytes = node.encode(self.order);
        self.mmap[offset..offset + bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    /// Bounds- and alignment-check a block address.
    fn checked_offset(&self, addr: BlockAddr) -> BlockResult<usize> {
        let bs = self.block_size as u64;
        let len = self.mmap.len() as u64;
        if addr < HEADER_SIZE as BlockAddr {
            return Err(BlockError::CorruptedNode {
                addr,
                reason: "address inside the file header".to_string(),
            });
        }
        let offset = addr as u64;
        if offset + bs > len {
            return Err(BlockError::CorruptedNode {
                addr,
                reason: format!("block ends past the file ({} bytes)", len),
            });
        }
        if (offset - HEADER_SIZE) % bs != 0 {
            return Err(BlockError::CorruptedNode {
                addr,
                reason: "address not on a block boundary".to_string(),
            });
        }
        Ok(offset as usize)
    }

    /// Hand out a block: pop the free list, or grow the file by exactly
    /// one block so the file length stays the append frontier.
    fn acquire_block(&mut self) -> BlockResult<BlockAddr> {
        if self.free_head != NONE_ADDR {
            let popped = self.free_head;
            let offset = self.checked_offset(popped)?;
            let forward = read_addr(&self.mmap, offset);
            self.set_free_head(forward);
            return Ok(popped);
        }

        let addr = self.mmap.len() as BlockAddr;
        let new_len = self.mmap.len() as u64 + self.block_size as u64;
        self.file
            .set_len(new_len)
            .map_err(|e| BlockError::IoError {
                operation: "grow_index".to_string(),
                reason: e.to_string(),
            })?;
        self.mmap = unsafe {
            MmapMut::map_mut(&self.file).map_err(|e| BlockError::IoError {
                operation: "remap_index".to_string(),
                reason: e.to_string(),
            })?
        };
        Ok(addr)
    }

    /// Return a block to the free list: its leading 8 bytes become the
    /// forward pointer to the previous head, and it becomes the head.
    fn release_block(&mut self, addr: BlockAddr) {
        let offset = addr as usize;
        let forward = self.free_head;
        self.mmap[offset..offset + 8].copy_from_slice(&forward.to_be_bytes());
        self.set_free_head(addr);
    }

    /// Update the root, mirroring it in the header.
    fn set_root(&mut self, addr: BlockAddr) {
        self.root = addr;
        self.mmap[0..8].copy_from_slice(&addr.to_be_bytes());
    }

    /// Update the free-list head, mirroring it in the header.
    fn set_free_head(&mut self, addr: BlockAddr) {
        self.free_head = addr;
        self.mmap[8..16].copy_from_slice(&addr.to_be_bytes());
    }

    fn flush(&self, operation: &str) -> BlockResult<()> {
        self.mmap.flush().map_err(|e| BlockError::IoError {
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Traverse the whole file and verify the structural invariants.
    ///
    /// Checks, in order: per-node occupancy bounds (non-root floor, global
    /// ceiling), strict key ordering, the separator-equals-right-minimum
    /// relation, uniform leaf depth, the sibling chain visiting every key
    /// ascending exactly once, and the free-list/live-block partition of
    /// the allocated range.
    ///
    /// Intended for tests and diagnostics; cost is a full file walk.
    pub fn validate(&self) -> BlockResult<()> {
        let mut live = HashSet::new();
        let mut leaves = Vec::new();

        if self.root != NONE_ADDR {
            self.check_subtree(self.root, true, &mut live, &mut leaves)?;
        }

        // The sibling chain must mirror the in-order leaf sequence and
        // carry strictly ascending keys throughout.
        let mut expected = leaves.iter();
        let mut chain = leaves.first().copied().unwrap_or(NONE_ADDR);
        let mut last_key: Option<Key> = None;
        while chain != NONE_ADDR {
            match expected.next() {
                Some(&at) if at == chain => {}
                _ => {
                    return Err(BlockError::CorruptedNode {
                        addr: chain,
                        reason: "sibling chain diverges from tree order".to_string(),
                    })
                }
            }
            let leaf = match self.read_node(chain)? {
                Node::Leaf(leaf) => leaf,
                Node::Branch(_) => {
                    return Err(BlockError::CorruptedNode {
                        addr: chain,
                        reason: "sibling chain entered a branch".to_string(),
                    })
                }
            };
            for &key in &leaf.keys {
                if let Some(prev) = last_key {
                    if key <= prev {
                        return Err(BlockError::CorruptedNode {
                            addr: chain,
                            reason: format!("key {} not above predecessor {}", key, prev),
                        });
                    }
                }
                last_key = Some(key);
            }
            chain = leaf.next;
        }
        if expected.next().is_some() {
            return Err(BlockError::CorruptedNode {
                addr: NONE_ADDR,
                reason: "sibling chain terminates before the last leaf".to_string(),
            });
        }

        // Free blocks and live blocks partition the allocated range.
        let mut free = HashSet::new();
        let mut head = self.free_head;
        while head != NONE_ADDR {
            if !free.insert(head) {
                return Err(BlockError::CorruptedNode {
                    addr: head,
                    reason: "free-list cycle".to_string(),
                });
            }
            let offset = self.checked_offset(head)?;
            head = read_addr(&self.mmap, offset);
        }
        let bs = self.block_size as u64;
        let mut at = HEADER_SIZE;
        while at < self.mmap.len() as u64 {
            let addr = at as BlockAddr;
            match (live.contains(&addr), free.contains(&addr)) {
                (true, true) => {
                    return Err(BlockError::CorruptedNode {
                        addr,
                        reason: "block is both live and free".to_string(),
                    })
                }
                (false, false) => {
                    return Err(BlockError::CorruptedNode {
                        addr,
                        reason: "block is neither live nor free".to_string(),
                    })
                }
                _ => {}
            }
            at += bs;
        }

        Ok(())
    }

    /// Recursive invariant check; returns `(subtree minimum, leaf depth)`
    /// and appends leaf addresses in tree order.
    fn check_subtree(
        &self,
        addr: BlockAddr,
        is_root: bool,
        live: &mut HashSet<BlockAddr>,
        leaves: &mut Vec<BlockAddr>,
    ) -> BlockResult<(Key, usize)> {
        if !live.insert(addr) {
            return Err(BlockError::CorruptedNode {
                addr,
                reason: "node reachable twice".to_string(),
            });
        }

        let node = self.read_node(addr)?;
        let count = node.key_count();
        if count > self.order.max_keys() {
            return Err(BlockError::CorruptedNode {
                addr,
                reason: format!("{} keys exceed capacity {}", count, self.order.max_keys()),
            });
        }
        if !is_root && count < self.order.min_keys() {
            return Err(BlockError::CorruptedNode {
                addr,
                reason: format!("{} keys below floor {}", count, self.order.min_keys()),
            });
        }
        if is_root && count == 0 {
            return Err(BlockError::CorruptedNode {
                addr,
                reason: "non-empty tree with an empty root".to_string(),
            });
        }

        match node {
            Node::Leaf(leaf) => {
                for pair in leaf.keys.windows(2) {
                    if pair[0] >= pair[1] {
                        return Err(BlockError::CorruptedNode {
                            addr,
                            reason: format!("keys {} and {} out of order", pair[0], pair[1]),
                        });
                    }
                }
                leaves.push(addr);
                Ok((leaf.keys[0], 0))
            }
            Node::Branch(branch) => {
                for pair in branch.keys.windows(2) {
                    if pair[0] >= pair[1] {
                        return Err(BlockError::CorruptedNode {
                            addr,
                            reason: format!("separators {} and {} out of order", pair[0], pair[1]),
                        });
                    }
                }
                let mut depth = None;
                let mut subtree_min = None;
                for (i, &child) in branch.children.iter().enumerate() {
                    let (child_min, child_depth) =
                        self.check_subtree(child, false, live, leaves)?;
                    match depth {
                        None => depth = Some(child_depth),
                        Some(d) if d != child_depth => {
                            return Err(BlockError::CorruptedNode {
                                addr: child,
                                reason: "leaves at unequal depth".to_string(),
                            })
                        }
                        Some(_) => {}
                    }
                    if i == 0 {
                        subtree_min = Some(child_min);
                    } else if branch.keys[i - 1] != child_min {
                        // Right-biased separators: each separator is the
                        // minimum of the subtree to its right.
                        return Err(BlockError::CorruptedNode {
                            addr,
                            reason: format!(
                                "separator {} does not match right subtree minimum {}",
                                branch.keys[i - 1],
                                child_min
                            ),
                        });
                    }
                }
                Ok((subtree_min.unwrap(), depth.unwrap() + 1))
            }
        }
    }
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        // Best-effort flush; close() is the checked path.
        let _ = self.mmap.flush();
    }
}

/// Read a big-endian address at a byte offset.
fn read_addr(bytes: &[u8], offset: usize) -> BlockAddr {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    BlockAddr::from_be_bytes(raw)
}

/// Move one entry from a richer left sibling into the underfull node.
///
/// Leaf case: the donor's last entry becomes the receiver's first, and the
/// separator between the two updates to the receiver's new first key.
/// Branch case: the separator descends into the receiver, the donor's last
/// key ascends to replace it, and the donor's last child migrates across.
fn borrow_from_left(
    parent: &mut BranchNode,
    child_idx: usize,
    left: &mut Node,
    child: &mut Node,
    left_addr: BlockAddr,
) -> BlockResult<()> {
    match (left, child) {
        (Node::Leaf(donor), Node::Leaf(receiver)) => {
            let key = donor.keys.pop().unwrap();
            let row = donor.rows.pop().unwrap();
            receiver.keys.insert(0, key);
            receiver.rows.insert(0, row);
            parent.keys[child_idx - 1] = receiver.keys[0];
            Ok(())
        }
        (Node::Branch(donor), Node::Branch(receiver)) => {
            let descending = parent.keys[child_idx - 1];
            receiver.keys.insert(0, descending);
            parent.keys[child_idx - 1] = donor.keys.pop().unwrap();
            receiver.children.insert(0, donor.children.pop().unwrap());
            Ok(())
        }
        _ => Err(BlockError::CorruptedNode {
            addr: left_addr,
            reason: "sibling variant differs from node variant".to_string(),
        }),
    }
}

/// Move one entry from a richer right sibling into the underfull node.
///
/// Mirror image of [`borrow_from_left`]; after a leaf borrow the parent
/// separator updates to the donor's new first key, the donor now being
/// the right-hand node of the pair.
fn borrow_from_right(
    parent: &mut BranchNode,
    child_idx: usize,
    child: &mut Node,
    right: &mut Node,
    right_addr: BlockAddr,
) -> BlockResult<()> {
    match (child, right) {
        (Node::Leaf(receiver), Node::Leaf(donor)) => {
            let key = donor.keys.remove(0);
            let row = donor.rows.remove(0);
            receiver.keys.push(key);
            receiver.rows.push(row);
            parent.keys[child_idx] = donor.keys[0];
            Ok(())
        }
        (Node::Branch(receiver), Node::Branch(donor)) => {
            let descending = parent.keys[child_idx];
            receiver.keys.push(descending);
            parent.keys[child_idx] = donor.keys.remove(0);
            receiver.children.push(donor.children.remove(0));
            Ok(())
        }
        _ => Err(BlockError::CorruptedNode {
            addr: right_addr,
            reason: "sibling variant differs from node variant".to_string(),
        }),
    }
}

/// Fold the right-hand node into the left-hand one.
///
/// Leaves concatenate and drop the separator (leaf separators are
/// duplicates); branches take the separator down between the two key runs.
fn merge_nodes(
    left: &mut Node,
    separator: Key,
    right: Node,
    right_addr: BlockAddr,
) -> BlockResult<()> {
    match (left, right) {
        (Node::Leaf(left), Node::Leaf(right)) => {
            left.merge_right(right);
            Ok(())
        }
        (Node::Branch(left), Node::Branch(right)) => {
            left.merge_right(separator, right);
            Ok(())
        }
        _ => Err(BlockError::CorruptedNode {
            addr: right_addr,
            reason: "merge partners differ in variant".to_string(),
        }),
    }
}
