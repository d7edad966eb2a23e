//! Metadata streams for .NET assemblies.
//!
//! Readers for the five standard streams of ECMA-335 metadata:
//!
//! ## String Heaps
//! - **`#Strings`** - UTF-8 identifier strings heap containing type names, member names, etc.
//!   The first entry is always the empty string.
//! - **`#US`** - UTF-16 user string heap containing the string literals of IL code.
//!   Each entry includes a length prefix and a terminal flag byte.
//!
//! ## Binary Data
//! - **`#Blob`** - Binary heap containing signatures, custom attribute data, and other
//!   variable-length binary structures referenced by metadata tables.
//! - **`#GUID`** - Sequence of 128-bit GUIDs used for module identity.
//!
//! ## Metadata Tables
//! - **`#~`** - The compressed metadata tables, decoded by [`TablesStream`].
//!
//! Heaps are read-only views over the input; new heaps are only ever produced by the build
//! context in [`crate::builder`].
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 24.2.2 - Stream Headers
//! - ECMA-335 6th Edition, Partition II, Section 22 - Metadata Tables

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablesheader;
mod userstrings;

pub use blob::{Blob, BlobIterator};
pub use guid::Guid;
pub use streamheader::{StreamHeader, STREAM_NAMES};
pub use strings::{Strings, StringsIterator};
pub use tablesheader::TablesStream;
pub use userstrings::{UserString, UserStrings, UserStringsIterator};
