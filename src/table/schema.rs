// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Row-file schema: field lengths, slot layout, and character encoding.
//!
//! A table's schema is the ordered list of per-field character lengths
//! declared at creation and persisted in the row-file header. Everything
//! the table needs to know about byte layout derives from it:
//!
//! ```text
//! Header:  [0, 4)           field count
//!          [4, 4 + 4n)      per-field lengths
//!          [4 + 4n, 12+4n)  row free-list head
//! Slot:    [0, 4)           key
//!          [4, 4 + 2*Σlen)  fields, 16-bit big-endian characters
//! ```
//!
//! Fields shorter than their declared length are null-padded; the first
//! null terminates the logical string on read.

use crate::btree::BlockAddr;
use crate::error::{BlockError, BlockResult};

/// Fixed schema of a row table.
///
/// Immutable once created; the header codec round-trips it through the
/// row file so reopening a table recovers the exact slot layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Declared character length of each field, in order.
    field_lengths: Vec<u32>,
}

impl TableSchema {
    /// Validate and build a schema from declared field lengths.
    ///
    /// ## Output
    /// - `Ok(TableSchema)`: usable schema
    /// - `Err(BlockError::InvalidSchema)`: no fields, a zero-length
    ///   field, or a combined length too small for slot recycling
    ///
    /// A freed slot stores an 8-byte forward pointer over its leading
    /// bytes, so the slot (4-byte key + character data) must be at least
    /// 8 bytes: combined field length ≥ 2 characters.
    pub fn new(field_lengths: &[u32]) -> BlockResult<Self> {
        if field_lengths.is_empty() {
            return Err(BlockError::InvalidSchema {
                reason: "a table needs at least one field".to_string(),
            });
        }
        if let Some(idx) = field_lengths.iter().position(|&len| len == 0) {
            return Err(BlockError::InvalidSchema {
                reason: format!("field {} has zero length", idx),
            });
        }
        let total: u64 = field_lengths.iter().map(|&len| len as u64).sum();
        if total < 2 {
            return Err(BlockError::InvalidSchema {
                reason: "combined field length must be at least 2 characters".to_string(),
            });
        }
        Ok(Self {
            field_lengths: field_lengths.to_vec(),
        })
    }

    /// Number of fields (the header's `field count`).
    pub fn field_count(&self) -> usize {
        self.field_lengths.len()
    }

    /// Declared per-field lengths.
    pub fn field_lengths(&self) -> &[u32] {
        &self.field_lengths
    }

    /// Byte offset of the row free-list head inside the header.
    ///
    /// Computed from the layout — `4 + 4 * field_count` — never
    /// hard-coded, since it moves with the schema width.
    pub fn free_head_offset(&self) -> usize {
        4 + 4 * self.field_count()
    }

    /// Total header size: field count, lengths, free-list head.
    pub fn header_size(&self) -> u64 {
        self.free_head_offset() as u64 + 8
    }

    /// Fixed size of one row slot: 4-byte key plus character data.
    pub fn row_size(&self) -> u64 {
        4 + 2 * self.field_lengths.iter().map(|&len| u64::from(len)).sum::<u64>()
    }

    /// Serialise the header with the given free-list head.
    pub fn encode_header(&self, free_head: BlockAddr) -> Vec<u8> {
        let mut buf = vec![0u8; self.header_size() as usize];
        buf[0..4].copy_from_slice(&(self.field_count() as i32).to_be_bytes());
        for (i, &len) in self.field_lengths.iter().enumerate() {
            let off = 4 + 4 * i;
            buf[off..off + 4].copy_from_slice(&(len as i32).to_be_bytes());
        }
        let off = self.free_head_offset();
        buf[off..off + 8].copy_from_slice(&free_head.to_be_bytes());
        buf
    }

    /// Deserialise a header, returning the schema and the free-list head.
    ///
    /// ## Output
    /// - `Ok((schema, free_head))`
    /// - `Err(BlockError::CorruptedHeader)`: truncated header or an
    ///   impossible field count / length
    pub fn decode_header(bytes: &[u8], path: &str) -> BlockResult<(TableSchema, BlockAddr)> {
        if bytes.len() < 4 {
            return Err(BlockError::CorruptedHeader {
                path: path.to_string(),
                reason: format!("file is {} bytes, field count needs 4", bytes.len()),
            });
        }
        let count = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if count <= 0 {
            return Err(BlockError::CorruptedHeader {
                path: path.to_string(),
                reason: format!("impossible field count {}", count),
            });
        }
        let count = count as usize;
        let needed = 12 + 4 * count;
        if bytes.len() < needed {
            return Err(BlockError::CorruptedHeader {
                path: path.to_string(),
                reason: format!("file is {} bytes, header needs {}", bytes.len(), needed),
            });
        }

        let mut field_lengths = Vec::with_capacity(count);
        for i in 0..count {
            let off = 4 + 4 * i;
            let len = i32::from_be_bytes([
                bytes[off],
                bytes[off + 1],
                bytes[off + 2],
                bytes[off + 3],
            ]);
            if len <= 0 {
                return Err(BlockError::CorruptedHeader {
                    path: path.to_string(),
                    reason: format!("field {} has impossible length {}", i, len),
                });
            }
            field_lengths.push(len as u32);
        }

        let schema = TableSchema::new(&field_lengths).map_err(|e| BlockError::CorruptedHeader {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let off = schema.free_head_offset();
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[off..off + 8]);
        let free_head = BlockAddr::from_be_bytes(raw);

        Ok((schema, free_head))
    }

    /// Serialise a row's fields into their fixed character region.
    ///
    /// ## Output
    /// - `Ok(bytes)`: `2 * Σlen` bytes, each field null-padded to its
    ///   declared length, 16-bit big-endian units
    /// - `Err(BlockError::InvalidField)`: wrong field count, or a value
    ///   longer than its declared length (values are never truncated —
    ///   cutting could split a surrogate pair)
    pub fn encode_fields(&self, fields: &[&str]) -> BlockResult<Vec<u8>> {
        if fields.len() != self.field_count() {
            return Err(BlockError::InvalidField {
                index: fields.len().min(self.field_count()),
                reason: format!(
                    "expected {} fields, got {}",
                    self.field_count(),
                    fields.len()
                ),
            });
        }

        let mut buf = Vec::with_capacity(self.row_size() as usize - 4);
        for (i, (field, &declared)) in fields.iter().zip(&self.field_lengths).enumerate() {
            let units: Vec<u16> = field.encode_utf16().collect();
            if units.len() > declared as usize {
                return Err(BlockError::InvalidField {
                    index: i,
                    reason: format!(
                        "{} characters exceed declared length {}",
                        units.len(),
                        declared
                    ),
                });
            }
            for unit in &units {
                buf.extend_from_slice(&unit.to_be_bytes());
            }
            for _ in units.len()..declared as usize {
                buf.extend_from_slice(&0u16.to_be_bytes());
            }
        }
        Ok(buf)
    }

    /// Deserialise a row's character region, stripping null padding.
    ///
    /// Each field reads up to its declared length; the first null unit
    /// terminates the logical string.
    pub fn decode_fields(&self, bytes: &[u8]) -> BlockResult<Vec<String>> {
        let mut fields = Vec::with_capacity(self.field_count());
        let mut off = 0;
        for (i, &declared) in self.field_lengths.iter().enumerate() {
            let mut units = Vec::new();
            for _ in 0..declared {
                let unit = u16::from_be_bytes([bytes[off], bytes[off + 1]]);
                off += 2;
                if unit == 0 {
                    // Padding starts here; skip the rest of the field
                    off += 2 * (declared as usize - units.len() - 1);
                    break;
                }
                units.push(unit);
            }
            let field = String::from_utf16(&units).map_err(|e| BlockError::InvalidField {
                index: i,
                reason: format!("stored characters are not valid UTF-16: {}", e),
            })?;
            fields.push(field);
        }
        Ok(fields)
    }
}
