// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-schema row table backed by a B+Tree index.
//!
//! A table is a pair of files: the row file (fixed-size record slots
//! behind a schema header) and a sibling `.btree` index mapping each key
//! to its row slot address. The table itself stays thin — presence tests,
//! lookups and ordering all delegate to the tree; the table's only
//! sophistication is free-list recycling of row slots, mirroring the
//! tree's block recycling.
//!
//! ## File Pairing
//!
//! ```text
//! users.rows    row slots:  [header][slot][slot][slot]...
//! users.btree   index:      key -> slot address
//! ```
//!
//! ## Slot Lifecycle
//!
//! A slot is acquired from the row free list (or the end of the file),
//! written, and later freed by overwriting its leading 8 bytes with a
//! forward pointer to the previous free head. Insert peeks the allocator
//! before asking the tree, so the address the tree records and the slot
//! the row lands in always agree.

use crate::btree::{BTreeIndex, BlockAddr, Key, NONE_ADDR};
use crate::error::{BlockError, BlockResult};
use crate::table::schema::TableSchema;
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Disk-backed table of `(key, fields)` rows with unique keys.
///
/// ## Thread Safety
/// Not thread-safe; both backing files are owned exclusively by this
/// instance.
pub struct RowTable {
    /// Path to the row file.
    path: PathBuf,

    /// Row file handle, kept for growth via `set_len`.
    file: File,

    /// Memory-mapped row file, remapped after growth.
    mmap: MmapMut,

    /// Field layout, persisted in the row-file header.
    schema: TableSchema,

    /// Row free-list head ([`NONE_ADDR`] when no slot is free).
    free_head: BlockAddr,

    /// Key index over the sibling `.btree` file.
    index: BTreeIndex,
}

impl std::fmt::Debug for RowTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowTable")
            .field("path", &self.path)
            .field("schema", &self.schema)
            .field("free_head", &self.free_head)
            .finish()
    }
}

impl RowTable {
    /// Create a fresh table, replacing any existing files.
    ///
    /// ## Input
    /// - `path`: row file location; the index lands beside it with the
    ///   `.btree` extension
    /// - `field_lengths`: declared character length per field
    /// - `block_size`: node block size for the index file
    ///
    /// ## Output
    /// - `Ok(RowTable)`: empty table, both headers written
    /// - `Err(BlockError::InvalidSchema)`: unusable field lengths, or a
    ///   path that would collide with its own index file
    /// - `Err(BlockError::InvalidBlockSize)`: index block size too small
    /// - `Err(BlockError::IoError)`: underlying file failure
    pub fn create<P: AsRef<Path>>(
        path: P,
        field_lengths: &[u32],
        block_size: u32,
    ) -> BlockResult<Self> {
        let path = path.as_ref().to_path_buf();
        let schema = TableSchema::new(field_lengths)?;
        let index_path = Self::index_path(&path)?;

        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| BlockError::IoError {
                operation: "create_table".to_string(),
                reason: e.to_string(),
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| BlockError::IoError {
                operation: "create_table".to_string(),
                reason: e.to_string(),
            })?;

        file.set_len(schema.header_size())
            .map_err(|e| BlockError::IoError {
                operation: "init_table_size".to_string(),
                reason: e.to_string(),
            })?;

        let mut mmap = unsafe {
            MmapMut::map_mut(&file).map_err(|e| BlockError::IoError {
                operation: "mmap_table".to_string(),
                reason: e.to_string(),
            })?
        };

        let header = schema.encode_header(NONE_ADDR);
        mmap[..header.len()].copy_from_slice(&header);

        let index = BTreeIndex::create(index_path, block_size)?;

        let table = Self {
            path,
            file,
            mmap,
            schema,
            free_head: NONE_ADDR,
            index,
        };
        table.flush("create_table")?;

        Ok(table)
    }

    /// Open an existing table and its index.
    ///
    /// ## Output
    /// - `Ok(RowTable)`: schema and both free lists restored
    /// - `Err(BlockError::CorruptedHeader)`: unreadable row-file header
    /// - `Err(BlockError::IoError)`: either file missing or unreadable
    pub fn open<P: AsRef<Path>>(path: P) -> BlockResult<Self> {
        let path = path.as_ref().to_path_buf();
        let index_path = Self::index_path(&path)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| BlockError::IoError {
                operation: "open_table".to_string(),
                reason: e.to_string(),
            })?;

        let mmap = unsafe {
            MmapMut::map_mut(&file).map_err(|e| BlockError::IoError {
                operation: "mmap_table".to_string(),
                reason: e.to_string(),
            })?
        };

        let (schema, free_head) =
            TableSchema::decode_header(&mmap, &path.display().to_string())?;

        let index = BTreeIndex::open(index_path)?;

        Ok(Self {
            path,
            file,
            mmap,
            schema,
            free_head,
            index,
        })
    }

    /// The table's field layout.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Insert a row.
    ///
    /// ## Input
    /// - `key`: unique row key
    /// - `fields`: one value per declared field, each within its length
    ///
    /// ## Output
    /// - `Ok(true)`: row written
    /// - `Ok(false)`: key already present; nothing changed
    /// - `Err(BlockError::InvalidField)`: wrong arity or overlong value
    /// - `Err(BlockError)`: I/O or corruption
    ///
    /// ## Algorithm
    /// The fields are validated and encoded first, then the allocator is
    /// *peeked* for the slot the row would land in and the tree records
    /// `(key, slot)`. Only when the tree accepts is the allocation
    /// committed — peek and commit must hand out the same address.
    pub fn insert(&mut self, key: Key, fields: &[&str]) -> BlockResult<bool> {
        let encoded = self.schema.encode_fields(fields)?;

        let slot = self.peek_slot();
        if !self.index.insert(key, slot)? {
            return Ok(false);
        }
        let addr = self.take_slot()?;
        debug_assert_eq!(addr, slot);

        let offset = self.slot_offset(addr)?;
        self.mmap[offset..offset + 4].copy_from_slice(&key.to_be_bytes());
        self.mmap[offset + 4..offset + 4 + encoded.len()].copy_from_slice(&encoded);

        self.flush("insert_row")?;
        Ok(true)
    }

    /// Remove a row by key.
    ///
    /// ## Output
    /// - `Ok(true)`: key removed; its slot joined the free list
    /// - `Ok(false)`: key absent
    /// - `Err(BlockError)`: I/O or corruption
    pub fn remove(&mut self, key: Key) -> BlockResult<bool> {
        let addr = self.index.remove(key)?;
        if addr == NONE_ADDR {
            return Ok(false);
        }
        self.release_slot(addr)?;
        self.flush("remove_row")?;
        Ok(true)
    }

    /// Look up a row's fields by key.
    ///
    /// ## Output
    /// - `Ok(Some(fields))`: padding-stripped field values, in order
    /// - `Ok(None)`: key absent
    /// - `Err(BlockError)`: I/O or corruption
    pub fn search(&self, key: Key) -> BlockResult<Option<Vec<String>>> {
        let addr = self.index.search(key)?;
        if addr == NONE_ADDR {
            return Ok(None);
        }
        let offset = self.slot_offset(addr)?;
        let data = &self.mmap[offset + 4..offset + self.schema.row_size() as usize];
        Ok(Some(self.schema.decode_fields(data)?))
    }

    /// Collect every row with key in `[low, high]`, ascending.
    ///
    /// Each result row carries its key, rendered as a string, prepended
    /// to the field values.
    ///
    /// ## Output
    /// - `Ok(rows)`: possibly empty
    /// - `Err(BlockError::InvalidRange)`: `low > high`
    /// - `Err(BlockError)`: I/O or corruption
    pub fn range_search(&self, low: Key, high: Key) -> BlockResult<Vec<Vec<String>>> {
        let mut rows = Vec::new();
        for addr in self.index.range_search(low, high)? {
            let offset = self.slot_offset(addr)?;
            let key = Key::from_be_bytes([
                self.mmap[offset],
                self.mmap[offset + 1],
                self.mmap[offset + 2],
                self.mmap[offset + 3],
            ]);
            let data = &self.mmap[offset + 4..offset + self.schema.row_size() as usize];
            let mut row = vec![key.to_string()];
            row.extend(self.schema.decode_fields(data)?);
            rows.push(row);
        }
        Ok(rows)
    }

    /// Flush both files and release their handles.
    pub fn close(self) -> BlockResult<()> {
        self.flush("close_table")?;
        self.index.close()
    }

    // ------------------------------------------------------------------
    // Slot allocation
    // ------------------------------------------------------------------

    /// Address the next allocation will return, without committing it.
    fn peek_slot(&self) -> BlockAddr {
        if self.free_head != NONE_ADDR {
            self.free_head
        } else {
            self.mmap.len() as BlockAddr
        }
    }

    /// Commit the allocation peeked by [`peek_slot`](Self::peek_slot).
    fn take_slot(&mut self) -> BlockResult<BlockAddr> {
        if self.free_head != NONE_ADDR {
            let popped = self.free_head;
            let offset = self.slot_offset(popped)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&self.mmap[offset..offset + 8]);
            self.set_free_head(BlockAddr::from_be_bytes(raw));
            return Ok(popped);
        }

        let addr = self.mmap.len() as BlockAddr;
        let new_len = self.mmap.len() as u64 + self.schema.row_size();
        self.file
            .set_len(new_len)
            .map_err(|e| BlockError::IoError {
                operation: "grow_table".to_string(),
                reason: e.to_string(),
            })?;
        self.mmap = unsafe {
            MmapMut::map_mut(&self.file).map_err(|e| BlockError::IoError {
                operation: "remap_table".to_string(),
                reason: e.to_string(),
            })?
        };
        Ok(addr)
    }

    /// Thread a freed slot onto the free list: its leading 8 bytes become
    /// the forward pointer to the previous head.
    fn release_slot(&mut self, addr: BlockAddr) -> BlockResult<()> {
        let offset = self.slot_offset(addr)?;
        let forward = self.free_head;
        self.mmap[offset..offset + 8].copy_from_slice(&forward.to_be_bytes());
        self.set_free_head(addr);
        Ok(())
    }

    /// Update the free-list head, mirroring it in the header at the
    /// schema-derived offset.
    fn set_free_head(&mut self, addr: BlockAddr) {
        self.free_head = addr;
        let off = self.schema.free_head_offset();
        self.mmap[off..off + 8].copy_from_slice(&addr.to_be_bytes());
    }

    /// Bounds- and alignment-check a slot address.
    fn slot_offset(&self, addr: BlockAddr) -> BlockResult<usize> {
        let header = self.schema.header_size();
        let row = self.schema.row_size();
        let len = self.mmap.len() as u64;
        if addr < header as BlockAddr {
            return Err(BlockError::CorruptedNode {
                addr,
                reason: "row address inside the table header".to_string(),
            });
        }
        let offset = addr as u64;
        if offset + row > len {
            return Err(BlockError::CorruptedNode {
                addr,
                reason: format!("row ends past the file ({} bytes)", len),
            });
        }
        if (offset - header) % row != 0 {
            return Err(BlockError::CorruptedNode {
                addr,
                reason: "address not on a row boundary".to_string(),
            });
        }
        Ok(offset as usize)
    }

    fn flush(&self, operation: &str) -> BlockResult<()> {
        self.mmap.flush().map_err(|e| BlockError::IoError {
            operation: operation.to_string(),
            reason: e.to_string(),
        })
    }

    /// Derive the index path; the pair must not collide.
    fn index_path(path: &Path) -> BlockResult<PathBuf> {
        let index_path = path.with_extension("btree");
        if index_path == path {
            return Err(BlockError::InvalidSchema {
                reason: "table path must not carry the .btree extension".to_string(),
            });
        }
        Ok(index_path)
    }
}
