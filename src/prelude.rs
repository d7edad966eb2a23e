//! # dotemit Prelude
//!
//! Re-exports of the types most programs need to build or inspect metadata. Import it with
//! `use dotemit::prelude::*;`.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotemit operations
pub use crate::Error;

/// The result type used throughout dotemit
pub use crate::Result;

/// Reader and writer configuration
pub use crate::{BuildOptions, ReadOptions};

// ================================================================================================
// Building
// ================================================================================================

/// The build context and its collaborators
pub use crate::builder::{
    HeapBuffer, MetadataBuffer, MetadataMember, MetadataStreams, SegmentLayout, SequentialLayout,
};

/// The module model
pub use crate::model::*;

// ================================================================================================
// Reading
// ================================================================================================

/// Metadata tokens
pub use crate::metadata::token::Token;

/// Table identifiers and the coded index kinds
pub use crate::metadata::tables::{CodedIndexType, HeapSizes, TableId};

/// Parsed metadata
pub use crate::metadata::view::MetadataView;

/// Metadata root constants
pub use crate::metadata::root::CIL_HEADER_MAGIC;

/// Low-level file parsing utilities
pub use crate::{File, Parser};
