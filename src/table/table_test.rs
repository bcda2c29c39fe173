// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the row table and its schema codec.
//!
//! Uses tempfile for test isolation (no interference between tests).

#[cfg(test)]
mod tests {
    use crate::error::BlockError;
    use crate::table::{RowTable, TableSchema};
    use tempfile::TempDir;

    const BLOCK: u32 = 60;

    fn table_at(dir: &TempDir) -> RowTable {
        RowTable::create(dir.path().join("t.rows"), &[8, 16], BLOCK).unwrap()
    }

    fn fields(a: &str, b: &str) -> Vec<String> {
        vec![a.to_string(), b.to_string()]
    }

    // ========================================================================
    // Schema
    // ========================================================================

    #[test]
    fn test_schema_layout_arithmetic() {
        let schema = TableSchema::new(&[8, 16]).unwrap();
        assert_eq!(schema.field_count(), 2);
        // Free head sits after the count and two lengths
        assert_eq!(schema.free_head_offset(), 12);
        assert_eq!(schema.header_size(), 20);
        // 4-byte key + 2 * (8 + 16) characters
        assert_eq!(schema.row_size(), 52);
    }

    #[test]
    fn test_schema_rejects_unusable_layouts() {
        assert!(TableSchema::new(&[]).is_err());
        assert!(TableSchema::new(&[5, 0, 5]).is_err());
        // One 1-character field leaves a 6-byte slot, too small for the
        // 8-byte forward pointer of a freed slot
        assert!(TableSchema::new(&[1]).is_err());
        assert!(TableSchema::new(&[2]).is_ok());
    }

    #[test]
    fn test_schema_header_round_trip() {
        let schema = TableSchema::new(&[3, 25, 7]).unwrap();
        let header = schema.encode_header(1234);
        let (decoded, free_head) = TableSchema::decode_header(&header, "t.rows").unwrap();
        assert_eq!(decoded, schema);
        assert_eq!(free_head, 1234);
    }

    #[test]
    fn test_schema_field_padding_round_trip() {
        let schema = TableSchema::new(&[8, 4]).unwrap();
        let encoded = schema.encode_fields(&["abc", "wxyz"]).unwrap();
        assert_eq!(encoded.len(), 2 * (8 + 4));

        // "abc" null-padded to 8 units
        assert_eq!(&encoded[0..2], &(b'a' as u16).to_be_bytes());
        assert_eq!(&encoded[6..8], &0u16.to_be_bytes());

        let decoded = schema.decode_fields(&encoded).unwrap();
        assert_eq!(decoded, vec!["abc".to_string(), "wxyz".to_string()]);
    }

    #[test]
    fn test_schema_rejects_wrong_arity_and_overflow() {
        let schema = TableSchema::new(&[4, 4]).unwrap();
        assert!(matches!(
            schema.encode_fields(&["only one"]),
            Err(BlockError::InvalidField { .. })
        ));
        assert!(matches!(
            schema.encode_fields(&["fits", "toolong!!"]),
            Err(BlockError::InvalidField { index: 1, .. })
        ));
    }

    #[test]
    fn test_schema_full_width_field_needs_no_terminator() {
        let schema = TableSchema::new(&[4, 4]).unwrap();
        let encoded = schema.encode_fields(&["full", "x"]).unwrap();
        let decoded = schema.decode_fields(&encoded).unwrap();
        assert_eq!(decoded, vec!["full".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_schema_non_ascii_fields() {
        let schema = TableSchema::new(&[8, 8]).unwrap();
        let encoded = schema.encode_fields(&["grün", "日本語"]).unwrap();
        let decoded = schema.decode_fields(&encoded).unwrap();
        assert_eq!(decoded, vec!["grün".to_string(), "日本語".to_string()]);
    }

    // ========================================================================
    // Table operations
    // ========================================================================

    #[test]
    fn test_insert_search_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut table = table_at(&dir);

        assert!(table.insert(7, &["ada", "lovelace"]).unwrap());
        assert_eq!(table.search(7).unwrap(), Some(fields("ada", "lovelace")));
        assert_eq!(table.search(8).unwrap(), None);
    }

    #[test]
    fn test_duplicate_insert_rejected_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.rows");
        let mut table = RowTable::create(&path, &[8, 16], BLOCK).unwrap();

        assert!(table.insert(7, &["ada", "lovelace"]).unwrap());
        let len = std::fs::metadata(&path).unwrap().len();

        // Second insert is refused and must not burn a slot
        assert!(!table.insert(7, &["grace", "hopper"]).unwrap());
        assert_eq!(table.search(7).unwrap(), Some(fields("ada", "lovelace")));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
    }

    #[test]
    fn test_remove_then_search_misses() {
        let dir = TempDir::new().unwrap();
        let mut table = table_at(&dir);

        table.insert(7, &["ada", "lovelace"]).unwrap();
        assert!(table.remove(7).unwrap());
        assert_eq!(table.search(7).unwrap(), None);
        assert!(!table.remove(7).unwrap());
    }

    #[test]
    fn test_removed_slot_is_recycled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.rows");
        let mut table = RowTable::create(&path, &[8, 16], BLOCK).unwrap();

        table.insert(1, &["a", "b"]).unwrap();
        table.insert(2, &["c", "d"]).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();

        // Freeing a slot and inserting again reuses it in place
        table.remove(1).unwrap();
        table.insert(3, &["e", "f"]).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);

        assert_eq!(table.search(2).unwrap(), Some(fields("c", "d")));
        assert_eq!(table.search(3).unwrap(), Some(fields("e", "f")));
    }

    #[test]
    fn test_slot_recycling_is_lifo() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.rows");
        let mut table = RowTable::create(&path, &[8, 16], BLOCK).unwrap();

        for key in 1..=4 {
            table.insert(key, &["x", "y"]).unwrap();
        }
        table.remove(2).unwrap();
        table.remove(3).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();

        // Two free slots absorb two inserts without growth
        table.insert(8, &["h", "i"]).unwrap();
        table.insert(9, &["j", "k"]).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
    }

    #[test]
    fn test_range_search_prepends_key() {
        let dir = TempDir::new().unwrap();
        let mut table = table_at(&dir);

        table.insert(30, &["thirty", ""]).unwrap();
        table.insert(10, &["ten", ""]).unwrap();
        table.insert(20, &["twenty", ""]).unwrap();

        let rows = table.range_search(10, 25).unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["10".to_string(), "ten".to_string(), "".to_string()],
                vec!["20".to_string(), "twenty".to_string(), "".to_string()],
            ]
        );
    }

    #[test]
    fn test_range_search_rejects_inverted_bounds() {
        let dir = TempDir::new().unwrap();
        let table = table_at(&dir);
        assert!(table.range_search(10, 5).is_err());
    }

    #[test]
    fn test_many_rows_with_splits_behind_the_scenes() {
        let dir = TempDir::new().unwrap();
        let mut table = table_at(&dir);

        // Enough keys to take the order-5 index through repeated splits
        for key in 1..=100 {
            assert!(table.insert(key, &["k", "v"]).unwrap());
        }
        for key in 1..=100 {
            assert!(table.search(key).unwrap().is_some());
        }

        let rows = table.range_search(1, 100).unwrap();
        assert_eq!(rows.len(), 100);
        assert_eq!(rows[0][0], "1");
        assert_eq!(rows[99][0], "100");
    }

    #[test]
    fn test_insert_validates_before_touching_anything() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.rows");
        let mut table = RowTable::create(&path, &[4, 4], BLOCK).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();

        assert!(table.insert(1, &["way too long", "x"]).is_err());
        assert!(table.insert(1, &["x"]).is_err());

        // The key must not have been recorded in the index either
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
        assert_eq!(table.search(1).unwrap(), None);
        assert!(table.insert(1, &["ok", "ok"]).unwrap());
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[test]
    fn test_create_pairs_rows_with_index_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.rows");
        let _table = RowTable::create(&path, &[8, 16], BLOCK).unwrap();

        assert!(path.exists());
        assert!(dir.path().join("t.btree").exists());
    }

    #[test]
    fn test_create_rejects_btree_extension() {
        let dir = TempDir::new().unwrap();
        assert!(RowTable::create(dir.path().join("t.btree"), &[8, 16], BLOCK).is_err());
    }

    #[test]
    fn test_reopen_preserves_rows_and_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.rows");

        let mut table = RowTable::create(&path, &[8, 16], BLOCK).unwrap();
        for key in 1..=30 {
            table.insert(key, &["name", "value"]).unwrap();
        }
        table.remove(15).unwrap();
        table.close().unwrap();

        let mut table = RowTable::open(&path).unwrap();
        assert_eq!(table.schema().field_lengths(), &[8, 16]);
        assert_eq!(table.search(1).unwrap(), Some(fields("name", "value")));
        assert_eq!(table.search(15).unwrap(), None);

        // The freed slot survived the reopen and gets reused
        let len = std::fs::metadata(&path).unwrap().len();
        table.insert(99, &["new", "row"]).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
    }

    #[test]
    fn test_open_missing_table_fails() {
        let dir = TempDir::new().unwrap();
        assert!(RowTable::open(dir.path().join("absent.rows")).is_err());
    }
}
