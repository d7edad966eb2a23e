//! Generic metadata rows.
//!
//! Every table shares one row type: an ordered list of [`ColumnValue`]s whose arity and kinds
//! follow [`TableId::columns`]. Equality and hashing are structural, which is what reference-row
//! deduplication in the build context keys on.

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::tables::{ColumnKind, TableId, TableInfo},
    Result,
};

/// The value of a single column.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnValue {
    /// 1-byte constant
    U8(u8),
    /// 2-byte constant
    U16(u16),
    /// 4-byte constant, heap offset, row id or coded index
    U32(u32),
    /// Inline data (a method body or field initial value) waiting for an RVA
    Raw(Vec<u8>),
}

impl ColumnValue {
    /// The numeric value of the column, or `None` for inline data
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ColumnValue::U8(value) => Some(u32::from(*value)),
            ColumnValue::U16(value) => Some(u32::from(*value)),
            ColumnValue::U32(value) => Some(*value),
            ColumnValue::Raw(_) => None,
        }
    }

    /// Whether this value may be stored in a column of `kind`
    #[must_use]
    pub fn accepts(&self, kind: ColumnKind) -> bool {
        match (self, kind) {
            (ColumnValue::U8(_), ColumnKind::U8)
            | (ColumnValue::U16(_), ColumnKind::U16)
            | (ColumnValue::U32(_) | ColumnValue::Raw(_), ColumnKind::Rva) => true,
            (ColumnValue::U32(_), kind) => kind == ColumnKind::U32 || kind.is_index(),
            _ => false,
        }
    }
}

/// One row of a metadata table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct MetadataRow {
    columns: Vec<ColumnValue>,
}

impl<const N: usize> From<[ColumnValue; N]> for MetadataRow {
    fn from(columns: [ColumnValue; N]) -> Self {
        MetadataRow {
            columns: columns.into(),
        }
    }
}

impl MetadataRow {
    /// Create a row from its column values
    #[must_use]
    pub fn new(columns: Vec<ColumnValue>) -> Self {
        MetadataRow { columns }
    }

    /// All column values
    #[must_use]
    pub fn columns(&self) -> &[ColumnValue] {
        &self.columns
    }

    /// Number of columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the row has no columns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The value of column `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ColumnValue> {
        self.columns.get(index)
    }

    /// The numeric value of column `index`; 0 for missing or inline columns
    #[must_use]
    pub fn value(&self, index: usize) -> u32 {
        self.columns
            .get(index)
            .and_then(ColumnValue::as_u32)
            .unwrap_or(0)
    }

    pub(crate) fn set(&mut self, index: usize, value: ColumnValue) -> Option<ColumnValue> {
        self.columns
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, value))
    }

    /// Check arity and column kinds against the schema of `table`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] describing the first mismatch.
    pub fn validate(&self, table: TableId) -> Result<()> {
        let schema = table.columns();
        if schema.len() != self.columns.len() {
            return Err(malformed_error!(
                "{} rows have {} columns, got {}",
                table,
                schema.len(),
                self.columns.len()
            ));
        }

        for (def, value) in schema.iter().zip(&self.columns) {
            if !value.accepts(def.kind) {
                return Err(malformed_error!(
                    "{}.{} can not hold {:?}",
                    table,
                    def.name,
                    value
                ));
            }
        }

        Ok(())
    }

    /// Decode one row of `table` at `offset`, using the widths in `info`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row is truncated.
    pub fn read(table: TableId, data: &[u8], offset: &mut usize, info: &TableInfo) -> Result<Self> {
        let columns = table
            .columns()
            .iter()
            .map(|def| {
                Ok(match def.kind {
                    ColumnKind::U8 => ColumnValue::U8(read_le_at::<u8>(data, offset)?),
                    ColumnKind::U16 => ColumnValue::U16(read_le_at::<u16>(data, offset)?),
                    ColumnKind::U32 | ColumnKind::Rva => {
                        ColumnValue::U32(read_le_at::<u32>(data, offset)?)
                    }
                    kind => ColumnValue::U32(read_le_at_dyn(
                        data,
                        offset,
                        info.column_bytes(kind) == 4,
                    )?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MetadataRow { columns })
    }

    /// Encode this row of `table` at `offset`, using the widths in `info`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a column still holds inline data or a value does not
    /// fit its column width, and [`crate::Error::OutOfBounds`] if `data` is too short.
    pub fn write(
        &self,
        table: TableId,
        data: &mut [u8],
        offset: &mut usize,
        info: &TableInfo,
    ) -> Result<()> {
        for (def, value) in table.columns().iter().zip(&self.columns) {
            match (def.kind, value) {
                (ColumnKind::U8, ColumnValue::U8(value)) => write_le_at(data, offset, *value)?,
                (ColumnKind::U16, ColumnValue::U16(value)) => write_le_at(data, offset, *value)?,
                (ColumnKind::U32 | ColumnKind::Rva, ColumnValue::U32(value)) => {
                    write_le_at(data, offset, *value)?;
                }
                (kind, ColumnValue::U32(value)) if kind.is_index() => {
                    write_le_at_dyn(data, offset, *value, info.column_bytes(kind) == 4)?;
                }
                (_, value) => {
                    return Err(malformed_error!(
                        "{}.{} can not be serialized from {:?}",
                        table,
                        def.name,
                        value
                    ))
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::TableInfo;

    fn typedef_row() -> MetadataRow {
        MetadataRow::from([
            ColumnValue::U32(0x0010_0001),
            ColumnValue::U32(0x20),
            ColumnValue::U32(0x10),
            ColumnValue::U32((2 << 2) | 1),
            ColumnValue::U32(1),
            ColumnValue::U32(3),
        ])
    }

    #[test]
    fn validate_schema() {
        assert!(typedef_row().validate(TableId::TypeDef).is_ok());
        assert!(typedef_row().validate(TableId::TypeRef).is_err());

        let bad = MetadataRow::from([
            ColumnValue::U32(0),
            ColumnValue::U32(0),
            ColumnValue::U32(0),
        ]);
        assert!(bad.validate(TableId::Field).is_err());

        let body = MetadataRow::from([
            ColumnValue::Raw(vec![0x2A]),
            ColumnValue::U16(0),
            ColumnValue::U16(0),
            ColumnValue::U32(0),
            ColumnValue::U32(0),
            ColumnValue::U32(1),
        ]);
        assert!(body.validate(TableId::MethodDef).is_ok());
    }

    #[test]
    fn small_widths() {
        let info = TableInfo::new_test(&[(TableId::TypeDef, 1)], false, false, false);

        let row = typedef_row();
        let size = info.row_size(TableId::TypeDef);
        assert_eq!(size, 4 + 2 + 2 + 2 + 2 + 2);

        let mut data = vec![0u8; size];
        let mut offset = 0;
        row.write(TableId::TypeDef, &mut data, &mut offset, &info).unwrap();
        assert_eq!(offset, size);

        #[rustfmt::skip]
        let expected = [
            0x01, 0x00, 0x10, 0x00,
            0x20, 0x00,
            0x10, 0x00,
            0x09, 0x00,
            0x01, 0x00,
            0x03, 0x00,
        ];
        assert_eq!(data, expected);

        let mut offset = 0;
        let read = MetadataRow::read(TableId::TypeDef, &data, &mut offset, &info).unwrap();
        assert_eq!(read, row);
    }

    #[test]
    fn large_widths() {
        let info = TableInfo::new_test(&[(TableId::Field, 0x1_0000)], true, false, false);

        let size = info.row_size(TableId::TypeDef);
        assert_eq!(size, 4 + 4 + 4 + 2 + 4 + 2);

        let row = typedef_row();
        let mut data = vec![0u8; size];
        let mut offset = 0;
        row.write(TableId::TypeDef, &mut data, &mut offset, &info).unwrap();

        let mut offset = 0;
        let read = MetadataRow::read(TableId::TypeDef, &data, &mut offset, &info).unwrap();
        assert_eq!(read, row);
    }

    #[test]
    fn raw_columns_are_not_serializable() {
        let info = TableInfo::new_test(&[], false, false, false);
        let row = MetadataRow::from([ColumnValue::Raw(vec![1, 2, 3]), ColumnValue::U32(1)]);
        let mut data = vec![0u8; info.row_size(TableId::FieldRVA)];
        let mut offset = 0;
        assert!(row
            .write(TableId::FieldRVA, &mut data, &mut offset, &info)
            .is_err());
    }

    #[test]
    fn truncated_read() {
        let info = TableInfo::new_test(&[], false, false, false);
        let data = [0u8; 3];
        let mut offset = 0;
        assert!(matches!(
            MetadataRow::read(TableId::Field, &data, &mut offset, &info),
            Err(crate::Error::OutOfBounds)
        ));
    }
}
