//! Growable, deduplicating metadata heaps.
//!
//! Each buffer hands out the offset (or 1-based index for `#GUID`) of a value the moment it is
//! interned; interning equal content twice returns the first offset. Offset 0 is reserved in
//! every heap and stands for the empty value.
//!
//! # Key Components
//!
//! - [`StringHeapBuffer`] - `#Strings`, NUL-terminated UTF-8
//! - [`BlobHeapBuffer`] - `#Blob`, length-prefixed bytes
//! - [`GuidHeapBuffer`] - `#GUID`, 16-byte records
//! - [`UserStringHeapBuffer`] - `#US`, length-prefixed UTF-16 with a trailing flag byte

mod blob;
mod guid;
mod strings;
mod userstrings;

pub use blob::BlobHeapBuffer;
pub use guid::GuidHeapBuffer;
pub use strings::StringHeapBuffer;
pub use userstrings::UserStringHeapBuffer;

use crate::utils::align_to;

/// Common surface of the four heap buffers
pub trait HeapBuffer {
    /// Stream name the heap is stored under
    fn name(&self) -> &'static str;

    /// Current size in bytes, before padding
    fn len(&self) -> usize;

    /// Returns true if nothing but the reserved entry was interned
    fn is_empty(&self) -> bool;

    /// Number of `intern` calls answered from an existing entry
    fn dedup_hits(&self) -> usize;

    /// Raw heap content
    fn data(&self) -> &[u8];

    /// Heap content padded to a 4-byte boundary, ready to become a stream
    fn serialize(&self) -> Vec<u8> {
        let mut out = self.data().to_vec();
        out.resize(align_to(out.len(), 4), 0);
        out
    }

    /// Whether indices into this heap need 4 bytes
    fn is_large(&self) -> bool {
        self.len() > 0xFFFF
    }
}
