// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//! # dotemit
//!
//! [![Crates.io](https://img.shields.io/crates/v/dotemit.svg)](https://crates.io/crates/dotemit)
//! [![Documentation](https://docs.rs/dotemit/badge.svg)](https://docs.rs/dotemit)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/dotemit/blob/main/LICENSE-APACHE)
//!
//! Construction and resolution of ECMA-335 metadata. `dotemit` turns an in-memory model of a
//! .NET module into the five metadata streams (`#~`, `#Strings`, `#US`, `#GUID`, `#Blob`),
//! assigning tokens, encoding coded indices and deduplicating heap entries and reference rows
//! on the way. The same table codec reads existing metadata back, so every image the builder
//! emits can be inspected with [`metadata::view::MetadataView`].
//!
//! ## Features
//!
//! - **Model** - handle based arenas for definitions and references ([`model::ModuleImage`])
//! - **Heaps** - interning `#Strings`, `#Blob`, `#GUID` and `#US` buffers
//! - **Tables** - schema driven row codec for all ECMA-335 and Portable PDB tables
//! - **Two-phase emission** - types may refer to each other in any order
//! - **Layout hook** - method bodies and field data are placed through [`builder::SegmentLayout`]
//! - **Reader** - PE files via `goblin`, raw metadata via [`metadata::view::MetadataView`]
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! dotemit = "0.1"
//! ```
//!
//! ### Building metadata
//!
//! ```rust
//! use dotemit::prelude::*;
//!
//! let mut image = ModuleImage::new("Hello.dll");
//! let corlib = image.add_assembly_ref(AssemblyReference::new("mscorlib", Version::new(4, 0, 0, 0)));
//! let object = image.add_type_ref(TypeReference::new(
//!     ResolutionScope::AssemblyRef(corlib),
//!     "System",
//!     "Object",
//! ));
//! let program = image.add_type(TypeDefinition::new(
//!     "Hello",
//!     "Program",
//!     TypeAttributes::PUBLIC,
//!     Some(TypeDefOrRef::Reference(object)),
//! ));
//!
//! let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
//! buffer.build()?;
//! assert_eq!(buffer.token_of(program)?, Token::new(0x0200_0002));
//!
//! let streams = buffer.finish(&mut SequentialLayout::new(0x2050))?;
//! let view = MetadataView::from_bytes(&streams.metadata)?;
//! assert_eq!(view.tables.row_count(TableId::TypeDef), 2);
//! # Ok::<(), dotemit::Error>(())
//! ```
//!
//! ### Reading metadata from a PE file
//!
//! ```rust,no_run
//! use dotemit::{metadata::view::MetadataView, File};
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("tests/samples/crafted_2.exe"))?;
//! let view = MetadataView::from_bytes(file.metadata()?)?;
//! println!("{} tables", view.tables.table_count());
//! # Ok::<(), dotemit::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`model`] - the module image: definitions, references, signatures and attribute flags
//! - [`builder`] - heap buffers, the table stream buffer and the build context
//! - [`metadata`] - tokens, the table schema and codec, heap readers and the metadata root
//! - [`file`] - PE parsing and byte-level I/O
//! - [`config`] - [`ReadOptions`] and [`BuildOptions`]
//! - [`Error`] and [`Result`] - error handling
//!
//! ## Standards Compliance
//!
//! Table layouts, coded index encodings and heap formats follow the **ECMA-335 specification**
//! (6th edition), Partition II, sections 22 and 24.
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result):
//!
//! ```rust
//! use dotemit::{builder::{MetadataBuffer, SequentialLayout}, model::ModuleImage, BuildOptions, Error};
//!
//! let image = ModuleImage::new("Empty.dll");
//! let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
//! buffer.finish(&mut SequentialLayout::new(0x2000))?;
//!
//! match buffer.user_string_token("too late") {
//!     Err(Error::BufferFinished) => println!("buffer is locked"),
//!     other => println!("unexpected: {other:?}"),
//! }
//! # Ok::<(), dotemit::Error>(())
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

pub mod builder;
pub mod config;
pub mod file;
pub mod metadata;
pub mod model;
pub mod prelude;
pub mod utils;

/// `dotemit` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotemit` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Reader and writer configuration.
pub use config::{BuildOptions, ReadOptions};

/// Low-level file and memory parsing utilities.
pub use file::{parser::Parser, File};
