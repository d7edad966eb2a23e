//! The ECMA-335 metadata tables.
//!
//! Tables are described by a static schema ([`TableId::columns`]) instead of one type per table:
//! every row is a [`MetadataRow`] of [`ColumnValue`]s, and the width of each column on disk is
//! computed by [`TableInfo`] from row counts and heap flags. The same schema drives the reader
//! ([`crate::metadata::streams::TablesStream::read`]) and the writer
//! ([`crate::metadata::streams::TablesStream::write`]).
//!
//! # Key Components
//!
//! - [`TableId`] - the 45 table kinds
//! - [`CodedIndexType`] - the 13 coded index groups with their tag layout
//! - [`TableInfo`] / [`HeapSizes`] - index width decisions
//! - [`TableStore`] / [`RowHandle`] - the row arena

mod codedindex;
mod row;
mod schema;
mod store;
mod tableid;
mod tableinfo;

pub use codedindex::CodedIndexType;
pub use row::{ColumnValue, MetadataRow};
pub use schema::{ColumnDef, ColumnKind};
pub use store::{RowHandle, TableStore};
pub use tableid::TableId;
pub use tableinfo::{HeapSizes, TableInfo};
