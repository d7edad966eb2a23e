//! The row arena shared by the reader and the writer.
//!
//! One growable row list per table kind. Rows are addressed through [`RowHandle`]s, which stay
//! valid while the store grows; the writer's finalize pass uses them to fill in columns of rows
//! appended during the stub pass.

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    metadata::{
        tables::{ColumnValue, MetadataRow, TableId, TableInfo},
        token::Token,
    },
    Error, Result,
};

/// A stable reference to a row in a [`TableStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowHandle {
    /// Table holding the row
    pub table: TableId,
    /// 0-based position of the row
    pub index: usize,
}

impl RowHandle {
    /// 1-based row id
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the row id does not fit into a token.
    pub fn rid(&self) -> Result<u32> {
        u32::try_from(self.index + 1)
            .ok()
            .filter(|rid| *rid <= 0x00FF_FFFF)
            .ok_or_else(|| malformed_error!("{} has more rows than a token can address", self.table))
    }

    /// The metadata token of the row
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the row id does not fit into a token.
    pub fn token(&self) -> Result<Token> {
        Ok(Token::from_parts(self.table, self.rid()?))
    }
}

/// Rows of all 45 tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableStore {
    tables: Vec<Vec<MetadataRow>>,
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        TableStore {
            tables: vec![Vec::new(); TableId::COUNT],
        }
    }

    /// Append `row` to `table` after validating it against the table's schema.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the row does not match the schema.
    pub fn push(&mut self, table: TableId, row: MetadataRow) -> Result<RowHandle> {
        row.validate(table)?;

        let rows = &mut self.tables[table as usize];
        rows.push(row);
        Ok(RowHandle {
            table,
            index: rows.len() - 1,
        })
    }

    /// The row behind `handle`
    #[must_use]
    pub fn get(&self, handle: RowHandle) -> Option<&MetadataRow> {
        self.tables[handle.table as usize].get(handle.index)
    }

    /// Mutable access to the row behind `handle`
    #[must_use]
    pub fn get_mut(&mut self, handle: RowHandle) -> Option<&mut MetadataRow> {
        self.tables[handle.table as usize].get_mut(handle.index)
    }

    /// The row behind `token`
    #[must_use]
    pub fn get_by_token(&self, token: Token) -> Option<&MetadataRow> {
        let table = token.table_id()?;
        let index = usize::try_from(token.row()).ok()?.checked_sub(1)?;
        self.tables[table as usize].get(index)
    }

    /// Replace column `column` of the row behind `handle`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the handle is dangling or the value does not fit
    /// the column's kind.
    pub fn set_column(&mut self, handle: RowHandle, column: usize, value: ColumnValue) -> Result<()> {
        let Some(def) = handle.table.columns().get(column) else {
            return Err(malformed_error!(
                "{} has no column {}",
                handle.table,
                column
            ));
        };
        if !value.accepts(def.kind) {
            return Err(malformed_error!(
                "{}.{} can not hold {:?}",
                handle.table,
                def.name,
                value
            ));
        }

        match self.get_mut(handle) {
            Some(row) => {
                row.set(column, value);
                Ok(())
            }
            None => Err(malformed_error!(
                "{} has no row {}",
                handle.table,
                handle.index + 1
            )),
        }
    }

    /// All rows of `table`
    #[must_use]
    pub fn rows(&self, table: TableId) -> &[MetadataRow] {
        &self.tables[table as usize]
    }

    /// Mutable access to the rows of `table`, for in-place transformations that keep the
    /// row count
    pub(crate) fn rows_mut(&mut self, table: TableId) -> &mut [MetadataRow] {
        &mut self.tables[table as usize]
    }

    /// Number of rows in `table`
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        u32::try_from(self.tables[table as usize].len()).unwrap_or(u32::MAX)
    }

    /// Per-table row counts, indexed by table number
    #[must_use]
    pub fn row_counts(&self) -> [u32; TableId::COUNT] {
        let mut counts = [0; TableId::COUNT];
        for table in TableId::iter() {
            counts[table as usize] = self.row_count(table);
        }
        counts
    }

    /// Bit mask of all tables with at least one row
    #[must_use]
    pub fn valid_mask(&self) -> u64 {
        self.iter_present().fold(0, |mask, table| mask | table.mask())
    }

    /// Tables with at least one row, in ascending table number
    pub fn iter_present(&self) -> impl Iterator<Item = TableId> + '_ {
        TableId::iter().filter(|table| !self.tables[*table as usize].is_empty())
    }

    /// Row counts and the heap width flags bundled for width computation
    #[must_use]
    pub fn table_info(&self, heap_sizes: crate::metadata::tables::HeapSizes) -> TableInfo {
        TableInfo::new(self.row_counts(), heap_sizes)
    }

    /// Whether the rows of `table` are ordered by its primary key
    #[must_use]
    pub fn is_in_key_order(&self, table: TableId) -> bool {
        match table.sort_key() {
            Some(key) => self.tables[table as usize]
                .windows(2)
                .all(|pair| pair[0].value(key) <= pair[1].value(key)),
            None => false,
        }
    }

    /// Stable sort of `table` by its primary key column.
    ///
    /// Only valid for tables no other row or token map points into.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the table has no primary key.
    pub fn sort(&mut self, table: TableId) -> Result<()> {
        let Some(key) = table.sort_key() else {
            return Err(Error::Precondition(format!("{table} has no sort key")));
        };

        self.tables[table as usize].sort_by_key(|row| row.value(key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested(nested: u32, enclosing: u32) -> MetadataRow {
        MetadataRow::from([ColumnValue::U32(nested), ColumnValue::U32(enclosing)])
    }

    #[test]
    fn push_and_update() {
        let mut store = TableStore::new();
        let first = store.push(TableId::NestedClass, nested(3, 1)).unwrap();
        let second = store.push(TableId::NestedClass, nested(2, 1)).unwrap();

        assert_eq!(first.token().unwrap(), Token::new(0x2900_0001));
        assert_eq!(second.rid().unwrap(), 2);
        assert_eq!(store.row_count(TableId::NestedClass), 2);
        assert_eq!(store.valid_mask(), TableId::NestedClass.mask());

        store.set_column(first, 1, ColumnValue::U32(7)).unwrap();
        assert_eq!(store.get(first).unwrap().value(1), 7);
        assert_eq!(
            store.get_by_token(Token::new(0x2900_0001)).unwrap().value(1),
            7
        );
        assert!(store.get_by_token(Token::new(0x2900_0000)).is_none());

        assert!(store.set_column(first, 1, ColumnValue::U8(1)).is_err());
        assert!(store.set_column(first, 2, ColumnValue::U32(1)).is_err());
    }

    #[test]
    fn push_validates() {
        let mut store = TableStore::new();
        assert!(store
            .push(TableId::NestedClass, MetadataRow::from([ColumnValue::U32(1)]))
            .is_err());
        assert_eq!(store.row_count(TableId::NestedClass), 0);
    }

    #[test]
    fn stable_sort() {
        let mut store = TableStore::new();
        store.push(TableId::NestedClass, nested(3, 1)).unwrap();
        store.push(TableId::NestedClass, nested(2, 1)).unwrap();
        store.push(TableId::NestedClass, nested(2, 5)).unwrap();
        assert!(!store.is_in_key_order(TableId::NestedClass));

        store.sort(TableId::NestedClass).unwrap();
        assert!(store.is_in_key_order(TableId::NestedClass));
        assert_eq!(
            store.rows(TableId::NestedClass),
            &[nested(2, 1), nested(2, 5), nested(3, 1)]
        );

        assert!(store.sort(TableId::TypeDef).is_err());
    }
}
