//! Construction of ECMA-335 metadata from a [`crate::model::ModuleImage`].
//!
//! The entry point is [`MetadataBuffer`]: it borrows an image, emits every record into a
//! [`TableStreamBuffer`] and the four heap buffers, and serializes the result into a
//! [`MetadataStreams`] value once [`MetadataBuffer::finish`] is called.
//!
//! # Architecture
//!
//! - **Heaps** ([`StringHeapBuffer`], [`BlobHeapBuffer`], [`GuidHeapBuffer`],
//!   [`UserStringHeapBuffer`]) intern values and hand out stable offsets
//! - **Tables** ([`TableStreamBuffer`]) store rows, assign tokens and collapse equal reference
//!   rows
//! - **Emission** runs in two passes so that mutually referencing types resolve
//! - **Layout** ([`SegmentLayout`]) places method bodies and field data and reports their RVAs
//!
//! # Examples
//!
//! ```rust
//! use dotemit::builder::{MetadataBuffer, SequentialLayout};
//! use dotemit::metadata::view::MetadataView;
//! use dotemit::metadata::tables::TableId;
//! use dotemit::model::*;
//! use dotemit::BuildOptions;
//!
//! let mut image = ModuleImage::new("Lib.dll");
//! let corlib = image.add_assembly_ref(AssemblyReference::new("mscorlib", Version::new(4, 0, 0, 0)));
//! let object = image.add_type_ref(TypeReference::new(
//!     ResolutionScope::AssemblyRef(corlib),
//!     "System",
//!     "Object",
//! ));
//! image.add_type(TypeDefinition::new(
//!     "Lib",
//!     "Widget",
//!     TypeAttributes::PUBLIC,
//!     Some(TypeDefOrRef::Reference(object)),
//! ));
//!
//! let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
//! let mut layout = SequentialLayout::new(0x2000);
//! let streams = buffer.finish(&mut layout)?;
//!
//! let view = MetadataView::from_bytes(&streams.metadata)?;
//! assert_eq!(view.tables.row_count(TableId::TypeDef), 2);
//! assert_eq!(view.tables.row_count(TableId::TypeRef), 1);
//! # Ok::<(), dotemit::Error>(())
//! ```

mod buffer;
mod emit;
mod heaps;
mod layout;
mod resolve;
mod tablebuffer;

pub use buffer::{MetadataBuffer, MetadataStreams};
pub use heaps::{BlobHeapBuffer, GuidHeapBuffer, HeapBuffer, StringHeapBuffer, UserStringHeapBuffer};
pub use layout::{SegmentLayout, SequentialLayout};
pub use resolve::MetadataMember;
pub use tablebuffer::TableStreamBuffer;
