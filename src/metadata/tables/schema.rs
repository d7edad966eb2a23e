//! Column layout of every metadata table (ECMA-335 II.22).
//!
//! A row's on-disk width is not fixed: heap indices, plain table indices and coded indices take
//! 2 or 4 bytes depending on heap sizes and row counts. The schema therefore names the *kind*
//! of each column and [`crate::metadata::tables::TableInfo`] turns kinds into widths.

use crate::metadata::tables::{CodedIndexType, TableId};

/// The kind of value a column holds, which determines how its width is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// 1-byte constant
    U8,
    /// 2-byte constant
    U16,
    /// 4-byte constant
    U32,
    /// 4-byte RVA; may hold inline data until the segment layout places it
    Rva,
    /// Offset into `#Strings`
    String,
    /// 1-based index into `#GUID`
    Guid,
    /// Offset into `#Blob`
    Blob,
    /// Row id of another table
    Table(TableId),
    /// Coded index over a table group
    Coded(CodedIndexType),
}

impl ColumnKind {
    /// Whether the column references a heap, a table or a coded index group
    #[must_use]
    pub fn is_index(&self) -> bool {
        !matches!(
            self,
            ColumnKind::U8 | ColumnKind::U16 | ColumnKind::U32 | ColumnKind::Rva
        )
    }
}

/// A named column of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name as used by ECMA-335
    pub name: &'static str,
    /// Kind of the column
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind }
}

/// A `'static` column list; `col` calls are only promoted inside a const item
macro_rules! columns {
    ($($def:expr),* $(,)?) => {{
        const COLUMNS: &[ColumnDef] = &[$($def),*];
        COLUMNS
    }};
}

use ColumnKind::{Blob, Coded, Guid, Rva, String, Table, U16, U32, U8};

impl TableId {
    /// The columns of this table in on-disk order.
    #[must_use]
    pub fn columns(self) -> &'static [ColumnDef] {
        match self {
            TableId::Module => columns![
                col("Generation", U16),
                col("Name", String),
                col("Mvid", Guid),
                col("EncId", Guid),
                col("EncBaseId", Guid),
            ],
            TableId::TypeRef => columns![
                col("ResolutionScope", Coded(CodedIndexType::ResolutionScope)),
                col("TypeName", String),
                col("TypeNamespace", String),
            ],
            TableId::TypeDef => columns![
                col("Flags", U32),
                col("TypeName", String),
                col("TypeNamespace", String),
                col("Extends", Coded(CodedIndexType::TypeDefOrRef)),
                col("FieldList", Table(TableId::Field)),
                col("MethodList", Table(TableId::MethodDef)),
            ],
            TableId::FieldPtr => columns![col("Field", Table(TableId::Field))],
            TableId::Field => columns![
                col("Flags", U16),
                col("Name", String),
                col("Signature", Blob),
            ],
            TableId::MethodPtr => columns![col("Method", Table(TableId::MethodDef))],
            TableId::MethodDef => columns![
                col("RVA", Rva),
                col("ImplFlags", U16),
                col("Flags", U16),
                col("Name", String),
                col("Signature", Blob),
                col("ParamList", Table(TableId::Param)),
            ],
            TableId::ParamPtr => columns![col("Param", Table(TableId::Param))],
            TableId::Param => columns![
                col("Flags", U16),
                col("Sequence", U16),
                col("Name", String),
            ],
            TableId::InterfaceImpl => columns![
                col("Class", Table(TableId::TypeDef)),
                col("Interface", Coded(CodedIndexType::TypeDefOrRef)),
            ],
            TableId::MemberRef => columns![
                col("Class", Coded(CodedIndexType::MemberRefParent)),
                col("Name", String),
                col("Signature", Blob),
            ],
            TableId::Constant => columns![
                col("Type", U8),
                col("Padding", U8),
                col("Parent", Coded(CodedIndexType::HasConstant)),
                col("Value", Blob),
            ],
            TableId::CustomAttribute => columns![
                col("Parent", Coded(CodedIndexType::HasCustomAttribute)),
                col("Type", Coded(CodedIndexType::CustomAttributeType)),
                col("Value", Blob),
            ],
            TableId::FieldMarshal => columns![
                col("Parent", Coded(CodedIndexType::HasFieldMarshal)),
                col("NativeType", Blob),
            ],
            TableId::DeclSecurity => columns![
                col("Action", U16),
                col("Parent", Coded(CodedIndexType::HasDeclSecurity)),
                col("PermissionSet", Blob),
            ],
            TableId::ClassLayout => columns![
                col("PackingSize", U16),
                col("ClassSize", U32),
                col("Parent", Table(TableId::TypeDef)),
            ],
            TableId::FieldLayout => columns![
                col("Offset", U32),
                col("Field", Table(TableId::Field)),
            ],
            TableId::StandAloneSig => columns![col("Signature", Blob)],
            TableId::EventMap => columns![
                col("Parent", Table(TableId::TypeDef)),
                col("EventList", Table(TableId::Event)),
            ],
            TableId::EventPtr => columns![col("Event", Table(TableId::Event))],
            TableId::Event => columns![
                col("EventFlags", U16),
                col("Name", String),
                col("EventType", Coded(CodedIndexType::TypeDefOrRef)),
            ],
            TableId::PropertyMap => columns![
                col("Parent", Table(TableId::TypeDef)),
                col("PropertyList", Table(TableId::Property)),
            ],
            TableId::PropertyPtr => columns![col("Property", Table(TableId::Property))],
            TableId::Property => columns![
                col("Flags", U16),
                col("Name", String),
                col("Type", Blob),
            ],
            TableId::MethodSemantics => columns![
                col("Semantics", U16),
                col("Method", Table(TableId::MethodDef)),
                col("Association", Coded(CodedIndexType::HasSemantics)),
            ],
            TableId::MethodImpl => columns![
                col("Class", Table(TableId::TypeDef)),
                col("MethodBody", Coded(CodedIndexType::MethodDefOrRef)),
                col("MethodDeclaration", Coded(CodedIndexType::MethodDefOrRef)),
            ],
            TableId::ModuleRef => columns![col("Name", String)],
            TableId::TypeSpec => columns![col("Signature", Blob)],
            TableId::ImplMap => columns![
                col("MappingFlags", U16),
                col("MemberForwarded", Coded(CodedIndexType::MemberForwarded)),
                col("ImportName", String),
                col("ImportScope", Table(TableId::ModuleRef)),
            ],
            TableId::FieldRVA => columns![col("RVA", Rva), col("Field", Table(TableId::Field))],
            TableId::EncLog => columns![col("Token", U32), col("FuncCode", U32)],
            TableId::EncMap => columns![col("Token", U32)],
            TableId::Assembly => columns![
                col("HashAlgId", U32),
                col("MajorVersion", U16),
                col("MinorVersion", U16),
                col("BuildNumber", U16),
                col("RevisionNumber", U16),
                col("Flags", U32),
                col("PublicKey", Blob),
                col("Name", String),
                col("Culture", String),
            ],
            TableId::AssemblyProcessor => columns![col("Processor", U32)],
            TableId::AssemblyOS => columns![
                col("OSPlatformId", U32),
                col("OSMajorVersion", U32),
                col("OSMinorVersion", U32),
            ],
            TableId::AssemblyRef => columns![
                col("MajorVersion", U16),
                col("MinorVersion", U16),
                col("BuildNumber", U16),
                col("RevisionNumber", U16),
                col("Flags", U32),
                col("PublicKeyOrToken", Blob),
                col("Name", String),
                col("Culture", String),
                col("HashValue", Blob),
            ],
            TableId::AssemblyRefProcessor => columns![
                col("Processor", U32),
                col("AssemblyRef", Table(TableId::AssemblyRef)),
            ],
            TableId::AssemblyRefOS => columns![
                col("OSPlatformId", U32),
                col("OSMajorVersion", U32),
                col("OSMinorVersion", U32),
                col("AssemblyRef", Table(TableId::AssemblyRef)),
            ],
            TableId::File => columns![
                col("Flags", U32),
                col("Name", String),
                col("HashValue", Blob),
            ],
            TableId::ExportedType => columns![
                col("Flags", U32),
                col("TypeDefId", U32),
                col("TypeName", String),
                col("TypeNamespace", String),
                col("Implementation", Coded(CodedIndexType::Implementation)),
            ],
            TableId::ManifestResource => columns![
                col("Offset", U32),
                col("Flags", U32),
                col("Name", String),
                col("Implementation", Coded(CodedIndexType::Implementation)),
            ],
            TableId::NestedClass => columns![
                col("NestedClass", Table(TableId::TypeDef)),
                col("EnclosingClass", Table(TableId::TypeDef)),
            ],
            TableId::GenericParam => columns![
                col("Number", U16),
                col("Flags", U16),
                col("Owner", Coded(CodedIndexType::TypeOrMethodDef)),
                col("Name", String),
            ],
            TableId::MethodSpec => columns![
                col("Method", Coded(CodedIndexType::MethodDefOrRef)),
                col("Instantiation", Blob),
            ],
            TableId::GenericParamConstraint => columns![
                col("Owner", Table(TableId::GenericParam)),
                col("Constraint", Coded(CodedIndexType::TypeDefOrRef)),
            ],
        }
    }

    /// Primary key column of the tables ECMA-335 requires to be sorted.
    #[must_use]
    pub fn sort_key(self) -> Option<usize> {
        match self {
            TableId::InterfaceImpl
            | TableId::CustomAttribute
            | TableId::FieldMarshal
            | TableId::MethodImpl
            | TableId::NestedClass
            | TableId::GenericParamConstraint => Some(0),
            TableId::DeclSecurity | TableId::FieldLayout | TableId::ImplMap | TableId::FieldRVA => {
                Some(1)
            }
            TableId::Constant
            | TableId::ClassLayout
            | TableId::MethodSemantics
            | TableId::GenericParam => Some(2),
            _ => None,
        }
    }

    /// Whether any column of this table is a run list (`FieldList`, `MethodList`, ...).
    ///
    /// Run list values may point one past the last row of the target table to describe an
    /// empty run at the end.
    #[must_use]
    pub fn is_list_column(self, column: usize) -> bool {
        matches!(
            (self, column),
            (TableId::TypeDef, 4 | 5)
                | (TableId::MethodDef, 5)
                | (TableId::EventMap, 1)
                | (TableId::PropertyMap, 1)
        )
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_table_has_columns() {
        for table in TableId::iter() {
            assert!(!table.columns().is_empty(), "{table}");
        }
        assert_eq!(TableId::Assembly.columns().len(), 9);
        assert_eq!(TableId::AssemblyRef.columns().len(), 9);
    }

    #[test]
    fn ptr_tables_point_to_targets() {
        assert_eq!(TableId::ParamPtr.columns()[0].kind, Table(TableId::Param));
        assert_eq!(TableId::FieldPtr.columns()[0].kind, Table(TableId::Field));
        assert_eq!(TableId::MethodPtr.columns()[0].kind, Table(TableId::MethodDef));
        assert_eq!(TableId::EventPtr.columns()[0].kind, Table(TableId::Event));
        assert_eq!(TableId::PropertyPtr.columns()[0].kind, Table(TableId::Property));
    }

    #[test]
    fn sort_keys() {
        for table in TableId::iter() {
            assert_eq!(table.sort_key().is_some(), table.is_sorted_table(), "{table}");
        }
        assert_eq!(TableId::MethodSemantics.sort_key(), Some(2));
        assert_eq!(TableId::DeclSecurity.sort_key(), Some(1));
        assert_eq!(
            TableId::Constant.columns()[2].kind,
            Coded(CodedIndexType::HasConstant)
        );
    }
}
