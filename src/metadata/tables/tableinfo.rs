//! Row counts and the index widths derived from them.
//!
//! [`TableInfo`] is shared by the reader and the writer. It answers, for every column kind, whether
//! the column is stored with 2 or 4 bytes:
//!
//! - heap indices follow the `heap_sizes` flags of the `#~` header;
//! - a plain table index is wide once the target table has more than `0xFFFF` rows;
//! - a coded index is wide once any member table has more rows than the bits left next to the
//!   tag can address (`rows > 0xFFFF >> tag_bits`), per ECMA-335 II.24.2.6.

use bitflags::bitflags;
use strum::EnumCount;

use crate::{
    metadata::{
        tables::{CodedIndexType, ColumnKind, TableId},
        token::Token,
    },
    Result,
};

bitflags! {
    /// The `heap_sizes` byte of the `#~` header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HeapSizes: u8 {
        /// `#Strings` offsets are 4 bytes wide
        const LARGE_STRINGS = 0x01;
        /// `#GUID` indices are 4 bytes wide
        const LARGE_GUIDS = 0x02;
        /// `#Blob` offsets are 4 bytes wide
        const LARGE_BLOBS = 0x04;
        /// Set by compilers on delta metadata; the heaps may contain padding
        const PADDING = 0x20;
        /// An extra `u32` follows the row counts
        const EXTRA_DATA = 0x40;
    }
}

/// Row counts of all tables plus the heap width flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableInfo {
    rows: [u32; TableId::COUNT],
    heap_sizes: HeapSizes,
}

impl TableInfo {
    /// Create the width information from per-table row counts (indexed by table number) and
    /// the heap width flags.
    #[must_use]
    pub fn new(rows: [u32; TableId::COUNT], heap_sizes: HeapSizes) -> Self {
        TableInfo { rows, heap_sizes }
    }

    #[cfg(test)]
    pub(crate) fn new_test(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut rows = [0; TableId::COUNT];
        for (table, count) in valid_tables {
            rows[*table as usize] = *count;
        }

        let mut heap_sizes = HeapSizes::empty();
        heap_sizes.set(HeapSizes::LARGE_STRINGS, large_str);
        heap_sizes.set(HeapSizes::LARGE_BLOBS, large_blob);
        heap_sizes.set(HeapSizes::LARGE_GUIDS, large_guid);

        TableInfo { rows, heap_sizes }
    }

    /// Row count of `table`
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize]
    }

    /// Whether `table` is present, i.e. has at least one row
    #[must_use]
    pub fn is_present(&self, table: TableId) -> bool {
        self.rows(table) > 0
    }

    /// The heap width flags
    #[must_use]
    pub fn heap_sizes(&self) -> HeapSizes {
        self.heap_sizes
    }

    /// True iff the row ids of `table` do not fit into the `16 - bits` bits left next to a tag.
    #[must_use]
    pub fn is_large(&self, table: TableId, bits: u8) -> bool {
        self.rows(table) > (0xFFFF_u32 >> bits)
    }

    /// Sum of the row counts of all member tables of `coded_index`
    #[must_use]
    pub fn coded_index_rows(&self, coded_index: CodedIndexType) -> u64 {
        coded_index
            .tables()
            .map(|table| u64::from(self.rows(table)))
            .sum()
    }

    /// True iff `coded_index` columns need 4 bytes
    #[must_use]
    pub fn coded_index_is_large(&self, coded_index: CodedIndexType) -> bool {
        coded_index
            .tables()
            .any(|table| self.is_large(table, coded_index.bits()))
    }

    /// Width in bytes of a plain index into `table`
    #[must_use]
    pub fn table_index_bytes(&self, table: TableId) -> usize {
        if self.is_large(table, 0) {
            4
        } else {
            2
        }
    }

    /// Width in bytes of a `coded_index` column
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index: CodedIndexType) -> usize {
        if self.coded_index_is_large(coded_index) {
            4
        } else {
            2
        }
    }

    /// Width in bytes of a `#Strings` offset
    #[must_use]
    pub fn str_bytes(&self) -> usize {
        if self.heap_sizes.contains(HeapSizes::LARGE_STRINGS) {
            4
        } else {
            2
        }
    }

    /// Width in bytes of a `#GUID` index
    #[must_use]
    pub fn guid_bytes(&self) -> usize {
        if self.heap_sizes.contains(HeapSizes::LARGE_GUIDS) {
            4
        } else {
            2
        }
    }

    /// Width in bytes of a `#Blob` offset
    #[must_use]
    pub fn blob_bytes(&self) -> usize {
        if self.heap_sizes.contains(HeapSizes::LARGE_BLOBS) {
            4
        } else {
            2
        }
    }

    /// Width in bytes of a column of `kind`
    #[must_use]
    pub fn column_bytes(&self, kind: ColumnKind) -> usize {
        match kind {
            ColumnKind::U8 => 1,
            ColumnKind::U16 => 2,
            ColumnKind::U32 | ColumnKind::Rva => 4,
            ColumnKind::String => self.str_bytes(),
            ColumnKind::Guid => self.guid_bytes(),
            ColumnKind::Blob => self.blob_bytes(),
            ColumnKind::Table(table) => self.table_index_bytes(table),
            ColumnKind::Coded(coded_index) => self.coded_index_bytes(coded_index),
        }
    }

    /// Size in bytes of one row of `table`
    #[must_use]
    pub fn row_size(&self, table: TableId) -> usize {
        table
            .columns()
            .iter()
            .map(|def| self.column_bytes(def.kind))
            .sum()
    }

    /// Decode a coded index and check that its target table is present.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for null values, invalid tags and tags naming a table
    /// without rows.
    pub fn decode_coded_index(&self, value: u32, coded_index: CodedIndexType) -> Result<Token> {
        let token = coded_index.decode(value)?;
        match token.table_id() {
            Some(table) if self.is_present(table) => Ok(token),
            _ => Err(malformed_error!(
                "{:?} coded index 0x{:x} refers to {}, which is not present",
                coded_index,
                value,
                token
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn width_boundary_per_tag_bits() {
        for coded_index in CodedIndexType::iter() {
            let bits = coded_index.bits();
            let capacity = 0xFFFF_u32 >> bits;
            let Some(table) = coded_index.tables().next() else {
                continue;
            };

            let at_capacity = TableInfo::new_test(&[(table, capacity)], false, false, false);
            assert_eq!(at_capacity.coded_index_bytes(coded_index), 2, "{coded_index:?}");

            let over = TableInfo::new_test(&[(table, capacity + 1)], false, false, false);
            assert_eq!(over.coded_index_bytes(coded_index), 4, "{coded_index:?}");
        }
    }

    #[test]
    fn plain_index_boundary() {
        let at = TableInfo::new_test(&[(TableId::Field, 0xFFFF)], false, false, false);
        assert_eq!(at.table_index_bytes(TableId::Field), 2);
        assert!(!at.is_large(TableId::Field, 0));
        // The same table is already too big for a 2-bit tag
        assert!(at.is_large(TableId::Field, 2));

        let over = TableInfo::new_test(&[(TableId::Field, 0x1_0000)], false, false, false);
        assert_eq!(over.table_index_bytes(TableId::Field), 4);
    }

    #[test]
    fn group_width_uses_member_rows() {
        // Two members each below the 2-bit capacity: their sum exceeds 0x3FFF but not 0xFFFF
        let info = TableInfo::new_test(
            &[(TableId::TypeDef, 0x3FFF), (TableId::TypeRef, 0x3FFF)],
            false,
            false,
            false,
        );
        assert_eq!(info.coded_index_rows(CodedIndexType::TypeDefOrRef), 0x7FFE);
        assert_eq!(info.coded_index_bytes(CodedIndexType::TypeDefOrRef), 2);
    }

    #[test]
    fn heap_widths() {
        let info = TableInfo::new(
            [0; TableId::COUNT],
            HeapSizes::LARGE_STRINGS | HeapSizes::LARGE_BLOBS,
        );
        assert_eq!(info.str_bytes(), 4);
        assert_eq!(info.guid_bytes(), 2);
        assert_eq!(info.blob_bytes(), 4);
        assert_eq!(info.row_size(TableId::Module), 2 + 4 + 2 + 2 + 2);
    }

    #[test]
    fn decode_requires_present_table() {
        let info = TableInfo::new_test(&[(TableId::TypeRef, 4)], false, false, false);
        let coded = (4 << 2) | 1;
        assert_eq!(
            info.decode_coded_index(coded, CodedIndexType::TypeDefOrRef)
                .unwrap(),
            Token::from_parts(TableId::TypeRef, 4)
        );

        // TypeSpec tag, but no TypeSpec rows
        assert!(info
            .decode_coded_index((1 << 2) | 2, CodedIndexType::TypeDefOrRef)
            .is_err());
        assert!(info
            .decode_coded_index(0, CodedIndexType::TypeDefOrRef)
            .is_err());
    }
}
