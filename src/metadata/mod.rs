//! ECMA-335 metadata: tokens, the table schema, stream readers and the metadata root.
//!
//! Everything here is format level and shared by both directions. The reader side decodes an
//! existing metadata blob into a [`view::MetadataView`]; the writer side in [`crate::builder`]
//! produces the same structures from an object model.
//!
//! # Key Components
//!
//! - [`token`] - Metadata tokens, `(table << 24) | rid`
//! - [`tables`] - Table kinds, the column schema, coded indices, index widths and the row arena
//! - [`streams`] - `#~`, `#Strings`, `#US`, `#GUID` and `#Blob`
//! - [`root`] - The `BSJB` metadata root and its stream directory
//! - [`view`] - Root, tables and heaps of a blob in one value
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 22 - Metadata Logical Format: Tables
//! - ECMA-335 6th Edition, Partition II, Section 24 - Metadata Physical Layout

pub mod root;
pub mod streams;
pub mod tables;
pub mod token;
pub mod view;
