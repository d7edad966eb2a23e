//! Row storage, token assignment and deduplication for the tables under construction.
//!
//! The [`TableStreamBuffer`] owns the rows the build context emits. It hands out tokens in row
//! order, collapses structurally equal reference rows into one, remembers which model record
//! produced which token and queues blob columns whose content can only be encoded once every
//! definition has a token.

use std::collections::{HashMap, VecDeque};

use log::{debug, trace};

use crate::{
    builder::layout::SegmentLayout,
    metadata::{
        streams::TablesStream,
        tables::{ColumnValue, HeapSizes, MetadataRow, RowHandle, TableId, TableStore},
        token::Token,
    },
    model::{
        AssemblyRefHandle, ExportedTypeHandle, FieldDefHandle, FileHandle, MemberRefHandle,
        MethodDefHandle, MethodSpecHandle, ModuleRefHandle, StandAloneSigHandle, TypeDefHandle,
        TypeRefHandle, TypeSpecHandle,
    },
    Result,
};

/// Sorted tables no token or other row points into; safe to reorder at the end.
const SORTED_AT_FINISH: [TableId; 10] = [
    TableId::Constant,
    TableId::CustomAttribute,
    TableId::FieldMarshal,
    TableId::ClassLayout,
    TableId::FieldLayout,
    TableId::MethodSemantics,
    TableId::MethodImpl,
    TableId::ImplMap,
    TableId::FieldRVA,
    TableId::NestedClass,
];

/// The model record a token was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum MemberKey {
    Module,
    Assembly,
    TypeDef(TypeDefHandle),
    Field(FieldDefHandle),
    Method(MethodDefHandle),
    Param(MethodDefHandle, usize),
    TypeRef(TypeRefHandle),
    TypeSpec(TypeSpecHandle),
    MemberRef(MemberRefHandle),
    MethodSpec(MethodSpecHandle),
    AssemblyRef(AssemblyRefHandle),
    ModuleRef(ModuleRefHandle),
    File(FileHandle),
    ExportedType(ExportedTypeHandle),
    StandAloneSig(StandAloneSigHandle),
}

/// A signature blob that is encoded when the buffer is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingBlob {
    Field(FieldDefHandle),
    Method(MethodDefHandle),
    Property { owner: TypeDefHandle, index: usize },
    StandAloneSig(StandAloneSigHandle),
}

/// A blob column waiting for its content
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fixup {
    pub row: RowHandle,
    pub column: usize,
    pub blob: PendingBlob,
}

/// The `#~` stream under construction.
#[derive(Debug, Default)]
pub struct TableStreamBuffer {
    store: TableStore,
    members: HashMap<MemberKey, Token>,
    references: HashMap<(TableId, MetadataRow), Token>,
    fixups: VecDeque<Fixup>,
    hits: usize,
}

impl TableStreamBuffer {
    /// Create a buffer without rows
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The rows emitted so far
    #[must_use]
    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// Number of reference rows that collapsed into an existing row
    #[must_use]
    pub fn dedup_hits(&self) -> usize {
        self.hits
    }

    /// Row id the next row of `table` will get
    pub(crate) fn next_rid(&self, table: TableId) -> u32 {
        self.store.row_count(table) + 1
    }

    pub(crate) fn push(&mut self, table: TableId, row: MetadataRow) -> Result<RowHandle> {
        let handle = self.store.push(table, row)?;
        trace!("{} row {}", table, handle.index + 1);
        Ok(handle)
    }

    pub(crate) fn push_token(&mut self, table: TableId, row: MetadataRow) -> Result<Token> {
        self.push(table, row)?.token()
    }

    pub(crate) fn member(&self, key: MemberKey) -> Option<Token> {
        self.members.get(&key).copied()
    }

    pub(crate) fn bind(&mut self, key: MemberKey, token: Token) {
        self.members.insert(key, token);
    }

    /// Token of the reference row equal to `row`, appending it if no such row exists yet.
    ///
    /// The boolean is true when a new row was appended.
    pub(crate) fn intern_reference(
        &mut self,
        key: MemberKey,
        table: TableId,
        row: MetadataRow,
    ) -> Result<(Token, bool)> {
        let entry = (table, row);
        if let Some(token) = self.references.get(&entry) {
            let token = *token;
            self.hits += 1;
            trace!("{key:?} shares {token}");
            self.bind(key, token);
            return Ok((token, false));
        }

        let (table, row) = entry;
        let token = self.push_token(table, row.clone())?;
        self.references.insert((table, row), token);
        self.bind(key, token);
        Ok((token, true))
    }

    pub(crate) fn set_column(&mut self, handle: RowHandle, column: usize, value: ColumnValue) -> Result<()> {
        self.store.set_column(handle, column, value)
    }

    pub(crate) fn defer_blob(&mut self, row: RowHandle, column: usize, blob: PendingBlob) {
        self.fixups.push_back(Fixup { row, column, blob });
    }

    pub(crate) fn next_fixup(&mut self) -> Option<Fixup> {
        self.fixups.pop_front()
    }

    /// Hand every inline `RVA` column to `layout` and store the returned RVA.
    pub(crate) fn place_segments(&mut self, layout: &mut dyn SegmentLayout) -> Result<()> {
        let mut placed = 0usize;

        for (index, row) in self.store.rows_mut(TableId::MethodDef).iter_mut().enumerate() {
            if let Some(ColumnValue::Raw(body)) = row.get(0) {
                let token = RowHandle {
                    table: TableId::MethodDef,
                    index,
                }
                .token()?;
                let rva = layout.place_method_body(token, body)?;
                row.set(0, ColumnValue::U32(rva));
                placed += 1;
            }
        }

        for row in self.store.rows_mut(TableId::FieldRVA) {
            if let Some(ColumnValue::Raw(data)) = row.get(0) {
                let token = Token::from_parts(TableId::Field, row.value(1));
                let rva = layout.place_field_data(token, data)?;
                row.set(0, ColumnValue::U32(rva));
                placed += 1;
            }
        }

        debug!("placed {placed} segments");
        Ok(())
    }

    /// Order the sorted tables nothing points into by their primary key
    pub(crate) fn sort(&mut self) -> Result<()> {
        for table in SORTED_AT_FINISH {
            self.store.sort(table)?;
        }
        Ok(())
    }

    /// Serialize the `#~` stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a row still holds inline data or a value does not
    /// fit its column.
    pub fn serialize(&self, heap_sizes: HeapSizes, major_version: u8, minor_version: u8) -> Result<Vec<u8>> {
        TablesStream::write(&self.store, heap_sizes, major_version, minor_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::SequentialLayout, model::ModuleImage};

    fn module_ref(name: u32) -> MetadataRow {
        MetadataRow::from([ColumnValue::U32(name)])
    }

    #[test]
    fn references_collapse() {
        let mut image = ModuleImage::new("Test.dll");
        let first = image.add_module_ref(crate::model::ModuleReference::new("a.dll"));
        let second = image.add_module_ref(crate::model::ModuleReference::new("a.dll"));

        let mut buffer = TableStreamBuffer::new();
        let (token, created) = buffer
            .intern_reference(MemberKey::ModuleRef(first), TableId::ModuleRef, module_ref(7))
            .unwrap();
        let (again, created_again) = buffer
            .intern_reference(MemberKey::ModuleRef(second), TableId::ModuleRef, module_ref(7))
            .unwrap();

        assert!(created);
        assert!(!created_again);
        assert_eq!(token, again);
        assert_eq!(token, Token::new(0x1A00_0001));
        assert_eq!(buffer.member(MemberKey::ModuleRef(second)), Some(token));
        assert_eq!(buffer.dedup_hits(), 1);
        assert_eq!(buffer.next_rid(TableId::ModuleRef), 2);
    }

    #[test]
    fn segments_get_rvas() {
        let mut buffer = TableStreamBuffer::new();
        buffer
            .push(
                TableId::MethodDef,
                MetadataRow::from([
                    ColumnValue::Raw(vec![0x0A, 0x2A]),
                    ColumnValue::U16(0),
                    ColumnValue::U16(0),
                    ColumnValue::U32(0),
                    ColumnValue::U32(0),
                    ColumnValue::U32(1),
                ]),
            )
            .unwrap();
        buffer
            .push(
                TableId::FieldRVA,
                MetadataRow::from([ColumnValue::Raw(vec![1, 2, 3, 4]), ColumnValue::U32(1)]),
            )
            .unwrap();

        let mut layout = SequentialLayout::new(0x2000);
        buffer.place_segments(&mut layout).unwrap();

        assert_eq!(buffer.store().rows(TableId::MethodDef)[0].value(0), 0x2000);
        assert_eq!(buffer.store().rows(TableId::FieldRVA)[0].value(0), 0x2008);
        assert!(buffer.serialize(HeapSizes::empty(), 2, 0).is_ok());
    }

    #[test]
    fn sorting() {
        let mut buffer = TableStreamBuffer::new();
        for (nested, enclosing) in [(3, 1), (2, 1)] {
            buffer
                .push(
                    TableId::NestedClass,
                    MetadataRow::from([ColumnValue::U32(nested), ColumnValue::U32(enclosing)]),
                )
                .unwrap();
        }
        assert!(!buffer.store().is_in_key_order(TableId::NestedClass));

        buffer.sort().unwrap();
        assert!(buffer.store().is_in_key_order(TableId::NestedClass));
    }
}
