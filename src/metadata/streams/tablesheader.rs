//! The `#~` tables stream: header, row counts and row data.
//!
//! [`TablesStream::read`] decodes a complete stream into a [`TableStore`];
//! [`TablesStream::write`] is its inverse and serializes a store with the widths its row counts
//! and the heap flags dictate.
//!
//! # Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0      | 4    | Reserved, 0 |
//! | 4      | 1    | `MajorVersion` |
//! | 5      | 1    | `MinorVersion` |
//! | 6      | 1    | `HeapSizes` |
//! | 7      | 1    | Reserved, 1 |
//! | 8      | 8    | `Valid` |
//! | 16     | 8    | `Sorted` |
//! | 24     | 4n   | Row count of each present table, ascending table number |
//! | ...    | 4    | Extra data, only if `HeapSizes` has bit 0x40 set |
//! | ...    |      | Rows of each present table, same order |
//!
//! ## Reference
//! * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.6

use log::{debug, warn};
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    config::ReadOptions,
    file::io::{read_le_at, write_le_at},
    metadata::{
        tables::{ColumnKind, HeapSizes, MetadataRow, TableId, TableInfo, TableStore},
        token::Token,
    },
    utils::align_to,
    Error::OutOfBounds,
    Result,
};

/// Size of the fixed part of the header
const HEADER_SIZE: usize = 24;

/// A decoded `#~` stream
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::{
///     streams::TablesStream,
///     tables::{ColumnValue, HeapSizes, MetadataRow, TableId, TableStore},
/// };
///
/// let mut store = TableStore::new();
/// store.push(TableId::ModuleRef, MetadataRow::from([ColumnValue::U32(1)]))?;
///
/// let bytes = TablesStream::write(&store, HeapSizes::empty(), 2, 0)?;
/// let stream = TablesStream::read(&bytes)?;
/// assert_eq!(stream.tables, store);
/// assert_eq!(stream.row_count(TableId::ModuleRef), 1);
/// # Ok::<(), dotemit::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablesStream {
    /// Major version of table schemata, shall be 2
    pub major_version: u8,
    /// Minor version of table schemata, shall be 0
    pub minor_version: u8,
    /// Heap index width flags
    pub heap_sizes: HeapSizes,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// The extra `u32` following the row counts, when `heap_sizes` announces it
    pub extra_data: Option<u32>,
    /// Row counts and derived index widths
    pub info: TableInfo,
    /// The decoded rows
    pub tables: TableStore,
}

impl TablesStream {
    /// Decode a `#~` stream with the default [`ReadOptions`]
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncated input and [`crate::Error::Malformed`]
    /// on invalid headers and references
    pub fn read(data: &[u8]) -> Result<TablesStream> {
        Self::read_with(data, &ReadOptions::default())
    }

    /// Decode a `#~` stream
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncated input and [`crate::Error::Malformed`]
    /// on invalid headers and references
    pub fn read_with(data: &[u8], options: &ReadOptions) -> Result<TablesStream> {
        if data.len() < HEADER_SIZE {
            return Err(OutOfBounds);
        }

        let mut offset = 4;
        let major_version = read_le_at::<u8>(data, &mut offset)?;
        let minor_version = read_le_at::<u8>(data, &mut offset)?;
        let heap_sizes = HeapSizes::from_bits_retain(read_le_at::<u8>(data, &mut offset)?);
        offset += 1;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        if valid >> TableId::COUNT != 0 {
            return Err(malformed_error!(
                "Valid mask 0x{:016x} names tables beyond 0x{:02x}",
                valid,
                TableId::COUNT - 1
            ));
        }

        let mut rows = [0u32; TableId::COUNT];
        for table in TableId::iter().filter(|table| valid & table.mask() != 0) {
            rows[table as usize] = read_le_at::<u32>(data, &mut offset)?;
            if rows[table as usize] > 0x00FF_FFFF {
                return Err(malformed_error!(
                    "{} claims {} rows, more than a token can address",
                    table,
                    rows[table as usize]
                ));
            }
        }

        let extra_data = if heap_sizes.contains(HeapSizes::EXTRA_DATA) {
            Some(read_le_at::<u32>(data, &mut offset)?)
        } else {
            None
        };

        let info = TableInfo::new(rows, heap_sizes);
        debug!(
            "#~ v{}.{}: {} tables, heap sizes {:?}, sorted 0x{:016x}",
            major_version,
            minor_version,
            valid.count_ones(),
            heap_sizes,
            sorted
        );

        let mut tables = TableStore::new();
        for table in TableId::iter().filter(|table| info.is_present(*table)) {
            let needed = info
                .row_size(table)
                .checked_mul(info.rows(table) as usize)
                .ok_or(OutOfBounds)?;
            if offset.checked_add(needed).map_or(true, |end| end > data.len()) {
                return Err(OutOfBounds);
            }

            for index in 0..info.rows(table) {
                let row = MetadataRow::read(table, data, &mut offset, &info)?;
                check_references(table, index, &row, &info, options)?;
                tables.push(table, row)?;
            }

            let flagged_sorted = sorted & table.mask() != 0 && table.sort_key().is_some();
            if flagged_sorted && !tables.is_in_key_order(table) {
                if options.reject_unsorted {
                    return Err(malformed_error!(
                        "{} is flagged sorted but is not in key order",
                        table
                    ));
                }
                warn!("{table} is flagged sorted but is not in key order");
            }
        }

        Ok(TablesStream {
            major_version,
            minor_version,
            heap_sizes,
            valid,
            sorted,
            extra_data,
            info,
            tables,
        })
    }

    /// Serialize `tables` as a `#~` stream, padded to 4 bytes.
    ///
    /// The `sorted` mask has a bit for every present table that has a primary key and whose rows
    /// are in key order.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a row still holds inline data or a value does not
    /// fit its column
    pub fn write(
        tables: &TableStore,
        heap_sizes: HeapSizes,
        major_version: u8,
        minor_version: u8,
    ) -> Result<Vec<u8>> {
        let heap_sizes = heap_sizes - HeapSizes::EXTRA_DATA;
        let info = tables.table_info(heap_sizes);
        let valid = tables.valid_mask();
        let sorted = tables
            .iter_present()
            .filter(|table| tables.is_in_key_order(*table))
            .fold(0_u64, |mask, table| mask | table.mask());

        let present: Vec<TableId> = tables.iter_present().collect();
        let rows_size: usize = present
            .iter()
            .map(|table| info.row_size(*table) * info.rows(*table) as usize)
            .sum();
        let size = HEADER_SIZE + present.len() * 4 + rows_size;

        let mut data = vec![0u8; align_to(size, 4)];
        let mut offset = 4;
        write_le_at(&mut data, &mut offset, major_version)?;
        write_le_at(&mut data, &mut offset, minor_version)?;
        write_le_at(&mut data, &mut offset, heap_sizes.bits())?;
        write_le_at(&mut data, &mut offset, 1_u8)?;
        write_le_at(&mut data, &mut offset, valid)?;
        write_le_at(&mut data, &mut offset, sorted)?;

        for table in &present {
            write_le_at(&mut data, &mut offset, info.rows(*table))?;
        }

        for table in &present {
            for row in tables.rows(*table) {
                row.write(*table, &mut data, &mut offset, &info)?;
            }
        }

        debug!(
            "wrote #~: {} tables, {} bytes, sorted 0x{:016x}",
            present.len(),
            data.len(),
            sorted
        );
        Ok(data)
    }

    /// Number of present tables
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Row count of `table`
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// Whether `table` has rows
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.valid & table.mask() != 0
    }

    /// Present tables in ascending table number
    pub fn present_tables(&self) -> impl Iterator<Item = TableId> + '_ {
        TableId::iter().filter(|table| self.has_table(*table))
    }

    /// Rows of `table` paired with their tokens
    pub fn rows_with_tokens(
        &self,
        table: TableId,
    ) -> impl Iterator<Item = (Token, &MetadataRow)> + '_ {
        self.tables
            .rows(table)
            .iter()
            .zip(1_u32..)
            .map(move |(row, rid)| (Token::from_parts(table, rid), row))
    }
}

/// Validate the index columns of a decoded row.
fn check_references(
    table: TableId,
    index: u32,
    row: &MetadataRow,
    info: &TableInfo,
    options: &ReadOptions,
) -> Result<()> {
    for (column, def) in table.columns().iter().enumerate() {
        let value = row.value(column);
        match def.kind {
            ColumnKind::Coded(coded_index) if value != 0 => {
                let token = info
                    .decode_coded_index(value, coded_index)
                    .map_err(|error| {
                        malformed_error!(
                            "{} row {} column {}: {}",
                            table,
                            index + 1,
                            def.name,
                            error
                        )
                    })?;

                if options.validate_rids {
                    let target_rows = token
                        .table_id()
                        .map_or(0, |target| info.rows(target));
                    if token.row() > target_rows {
                        return Err(malformed_error!(
                            "{} row {} column {}: {} is past the last row",
                            table,
                            index + 1,
                            def.name,
                            token
                        ));
                    }
                }
            }
            ColumnKind::Table(target) if options.validate_rids => {
                let limit = if table.is_list_column(column) {
                    info.rows(target) + 1
                } else {
                    info.rows(target)
                };
                if value > limit {
                    return Err(malformed_error!(
                        "{} row {} column {}: row {} of {} is past the last row",
                        table,
                        index + 1,
                        def.name,
                        value,
                        target
                    ));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::metadata::tables::{CodedIndexType, ColumnValue};

    fn type_ref(scope: u32, name: u32) -> MetadataRow {
        MetadataRow::from([
            ColumnValue::U32(scope),
            ColumnValue::U32(name),
            ColumnValue::U32(0),
        ])
    }

    fn module() -> MetadataRow {
        MetadataRow::from([
            ColumnValue::U16(0),
            ColumnValue::U32(1),
            ColumnValue::U32(1),
            ColumnValue::U32(0),
            ColumnValue::U32(0),
        ])
    }

    fn sample_store() -> TableStore {
        let mut store = TableStore::new();
        store.push(TableId::Module, module()).unwrap();
        store
            .push(TableId::AssemblyRef, MetadataRow::from([
                ColumnValue::U16(4),
                ColumnValue::U16(0),
                ColumnValue::U16(0),
                ColumnValue::U16(0),
                ColumnValue::U32(0),
                ColumnValue::U32(0),
                ColumnValue::U32(5),
                ColumnValue::U32(0),
                ColumnValue::U32(0),
            ]))
            .unwrap();
        let scope = CodedIndexType::ResolutionScope
            .encode(Token::from_parts(TableId::AssemblyRef, 1))
            .unwrap();
        store.push(TableId::TypeRef, type_ref(scope, 10)).unwrap();
        store.push(TableId::TypeRef, type_ref(scope, 20)).unwrap();
        store
    }

    fn heap_value(rng: &mut StdRng, large: bool) -> u32 {
        if large {
            rng.random()
        } else {
            u32::from(rng.random::<u16>())
        }
    }

    /// Rows whose references all stay inside `counts`, with heap offsets sized by `heap_sizes`
    fn random_store(
        rng: &mut StdRng,
        counts: &[u32; TableId::COUNT],
        heap_sizes: HeapSizes,
    ) -> TableStore {
        let mut store = TableStore::new();
        for table in TableId::iter() {
            for _ in 0..counts[table as usize] {
                let columns = table
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(column, def)| match def.kind {
                        ColumnKind::U8 => ColumnValue::U8(rng.random()),
                        ColumnKind::U16 => ColumnValue::U16(rng.random()),
                        ColumnKind::U32 | ColumnKind::Rva => ColumnValue::U32(rng.random()),
                        ColumnKind::String => ColumnValue::U32(heap_value(
                            rng,
                            heap_sizes.contains(HeapSizes::LARGE_STRINGS),
                        )),
                        ColumnKind::Guid => ColumnValue::U32(heap_value(
                            rng,
                            heap_sizes.contains(HeapSizes::LARGE_GUIDS),
                        )),
                        ColumnKind::Blob => ColumnValue::U32(heap_value(
                            rng,
                            heap_sizes.contains(HeapSizes::LARGE_BLOBS),
                        )),
                        ColumnKind::Table(target) => {
                            let rows = counts[target as usize];
                            if table.is_list_column(column) {
                                ColumnValue::U32(rng.random_range(1..=rows + 1))
                            } else {
                                ColumnValue::U32(rng.random_range(0..=rows))
                            }
                        }
                        ColumnKind::Coded(coded_index) => {
                            let present: Vec<TableId> = coded_index
                                .tables()
                                .filter(|member| counts[*member as usize] > 0)
                                .collect();
                            if present.is_empty() || rng.random_ratio(1, 8) {
                                ColumnValue::U32(0)
                            } else {
                                let member = present[rng.random_range(0..present.len())];
                                let rid = rng.random_range(1..=counts[member as usize]);
                                ColumnValue::U32(
                                    coded_index
                                        .encode(Token::from_parts(member, rid))
                                        .unwrap(),
                                )
                            }
                        }
                    })
                    .collect();
                store.push(table, MetadataRow::new(columns)).unwrap();
            }
        }
        store
    }

    #[test]
    fn header_layout() {
        let store = sample_store();
        let data = TablesStream::write(&store, HeapSizes::empty(), 2, 0).unwrap();

        assert_eq!(&data[0..4], &[0, 0, 0, 0]);
        assert_eq!(data[4], 2);
        assert_eq!(data[5], 0);
        assert_eq!(data[6], 0);
        assert_eq!(data[7], 1);

        let valid = u64::from_le_bytes(data[8..16].try_into().unwrap());
        assert_eq!(
            valid,
            TableId::Module.mask() | TableId::TypeRef.mask() | TableId::AssemblyRef.mask()
        );
        // Row counts in ascending table order
        assert_eq!(&data[24..28], &1u32.to_le_bytes());
        assert_eq!(&data[28..32], &2u32.to_le_bytes());
        assert_eq!(&data[32..36], &1u32.to_le_bytes());
        assert_eq!(data.len() % 4, 0);
    }

    #[test]
    fn round_trip() {
        let store = sample_store();
        let data = TablesStream::write(&store, HeapSizes::LARGE_STRINGS, 2, 0).unwrap();
        let stream = TablesStream::read(&data).unwrap();

        assert_eq!(stream.tables, store);
        assert_eq!(stream.heap_sizes, HeapSizes::LARGE_STRINGS);
        assert_eq!(stream.table_count(), 3);
        assert_eq!(stream.extra_data, None);

        let tokens: Vec<_> = stream
            .rows_with_tokens(TableId::TypeRef)
            .map(|(token, _)| token)
            .collect();
        assert_eq!(tokens, [Token::new(0x0100_0001), Token::new(0x0100_0002)]);
    }

    #[test]
    fn sorted_bits_reflect_order() {
        let mut store = TableStore::new();
        store.push(TableId::Module, module()).unwrap();
        for (nested, enclosing) in [(3, 1), (2, 1)] {
            store
                .push(
                    TableId::NestedClass,
                    MetadataRow::from([ColumnValue::U32(nested), ColumnValue::U32(enclosing)]),
                )
                .unwrap();
        }
        for _ in 0..3 {
            store
                .push(TableId::TypeDef, MetadataRow::from([
                    ColumnValue::U32(0),
                    ColumnValue::U32(0),
                    ColumnValue::U32(0),
                    ColumnValue::U32(0),
                    ColumnValue::U32(1),
                    ColumnValue::U32(1),
                ]))
                .unwrap();
        }

        let data = TablesStream::write(&store, HeapSizes::empty(), 2, 0).unwrap();
        let stream = TablesStream::read(&data).unwrap();
        assert_eq!(stream.sorted & TableId::NestedClass.mask(), 0);

        store.sort(TableId::NestedClass).unwrap();
        let data = TablesStream::write(&store, HeapSizes::empty(), 2, 0).unwrap();
        let stream = TablesStream::read_with(&data, &ReadOptions::strict()).unwrap();
        assert_ne!(stream.sorted & TableId::NestedClass.mask(), 0);
    }

    #[test]
    fn unsorted_flag_rejected_in_strict_mode() {
        let mut store = TableStore::new();
        for _ in 0..3 {
            store
                .push(TableId::TypeDef, MetadataRow::from([
                    ColumnValue::U32(0),
                    ColumnValue::U32(0),
                    ColumnValue::U32(0),
                    ColumnValue::U32(0),
                    ColumnValue::U32(1),
                    ColumnValue::U32(1),
                ]))
                .unwrap();
        }
        for nested in [3, 2] {
            store
                .push(
                    TableId::NestedClass,
                    MetadataRow::from([ColumnValue::U32(nested), ColumnValue::U32(1)]),
                )
                .unwrap();
        }

        let mut data = TablesStream::write(&store, HeapSizes::empty(), 2, 0).unwrap();
        // Claim the NestedClass table is sorted
        let sorted = TableId::NestedClass.mask().to_le_bytes();
        data[16..24].copy_from_slice(&sorted);

        assert!(TablesStream::read(&data).is_ok());
        assert!(TablesStream::read_with(&data, &ReadOptions::strict()).is_err());
    }

    #[test]
    fn invalid_coded_index() {
        let mut store = TableStore::new();
        // ResolutionScope tag 2 is AssemblyRef, which has no rows
        store.push(TableId::TypeRef, type_ref((1 << 2) | 2, 0)).unwrap();
        let data = TablesStream::write(&store, HeapSizes::empty(), 2, 0).unwrap();
        assert!(matches!(
            TablesStream::read(&data),
            Err(crate::Error::Malformed { .. })
        ));

        // Null scopes are accepted
        let mut store = TableStore::new();
        store.push(TableId::TypeRef, type_ref(0, 0)).unwrap();
        let data = TablesStream::write(&store, HeapSizes::empty(), 2, 0).unwrap();
        assert!(TablesStream::read(&data).is_ok());
    }

    #[test]
    fn rid_past_end() {
        let mut store = sample_store();
        let scope = CodedIndexType::ResolutionScope
            .encode(Token::from_parts(TableId::AssemblyRef, 9))
            .unwrap();
        store.push(TableId::TypeRef, type_ref(scope, 0)).unwrap();
        let data = TablesStream::write(&store, HeapSizes::empty(), 2, 0).unwrap();

        assert!(TablesStream::read(&data).is_err());
        assert!(TablesStream::read_with(&data, &ReadOptions::lenient()).is_ok());
    }

    #[test]
    fn invalid_headers() {
        assert!(matches!(TablesStream::read(&[0u8; 4]), Err(OutOfBounds)));

        let mut data = vec![0u8; 32];
        data[8..16].copy_from_slice(&(1u64 << 0x2D).to_le_bytes());
        assert!(TablesStream::read(&data).is_err());

        // One row claimed, no row data
        let mut data = vec![0u8; 28];
        data[8..16].copy_from_slice(&TableId::ModuleRef.mask().to_le_bytes());
        data[24..28].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(TablesStream::read(&data), Err(OutOfBounds)));
    }

    #[test]
    fn extra_data() {
        let mut data = vec![0u8; 24];
        data[6] = HeapSizes::EXTRA_DATA.bits();
        data[8..16].copy_from_slice(&TableId::ModuleRef.mask().to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        data.extend_from_slice(&[0x07, 0x00]);

        let stream = TablesStream::read(&data).unwrap();
        assert_eq!(stream.extra_data, Some(0xDEAD_BEEF));
        assert_eq!(stream.tables.rows(TableId::ModuleRef)[0].value(0), 7);
    }

    #[test]
    fn random_streams_round_trip() {
        for seed in 0..24_u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let heap_sizes = HeapSizes::from_bits_truncate((seed % 8) as u8);
            let mut counts = [0u32; TableId::COUNT];
            for count in &mut counts {
                *count = rng.random_range(1..=6);
            }

            let store = random_store(&mut rng, &counts, heap_sizes);
            let data = TablesStream::write(&store, heap_sizes, 2, 0).unwrap();
            let stream = TablesStream::read_with(&data, &ReadOptions::strict()).unwrap();

            assert_eq!(stream.tables, store, "seed {seed}");
            assert_eq!(stream.heap_sizes, heap_sizes);
            assert_eq!(stream.table_count(), 45);
            for table in TableId::iter() {
                assert_eq!(stream.row_count(table), counts[table as usize]);
            }
        }
    }

    #[test]
    fn coded_index_width_threshold_round_trip() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for coded_index in CodedIndexType::iter() {
            let Some(member) = coded_index.tables().next() else {
                continue;
            };
            let Some(owner) = TableId::iter().find(|table| {
                table
                    .columns()
                    .iter()
                    .any(|def| def.kind == ColumnKind::Coded(coded_index))
            }) else {
                continue;
            };
            let capacity = 0xFFFF_u32 >> coded_index.bits();

            for (rows, width) in [(capacity, 2), (capacity + 1, 4)] {
                let mut counts = [0u32; TableId::COUNT];
                counts[member as usize] = rows;
                counts[owner as usize] = counts[owner as usize].max(1);

                let store = random_store(&mut rng, &counts, HeapSizes::empty());
                let data = TablesStream::write(&store, HeapSizes::empty(), 2, 0).unwrap();
                let stream = TablesStream::read_with(&data, &ReadOptions::strict()).unwrap();

                assert_eq!(
                    stream.info.coded_index_bytes(coded_index),
                    width,
                    "{coded_index:?} with {rows} {member} rows"
                );
                assert_eq!(stream.tables, store, "{coded_index:?} with {rows} rows");
            }
        }
    }
}
