//! Placement of method bodies and field data.
//!
//! Rows of `MethodDef` and `FieldRVA` carry their bytes inline until
//! [`crate::builder::MetadataBuffer::finish`] asks a [`SegmentLayout`] where they go. The layout
//! decides the final RVA; the metadata only records it.

use crate::{metadata::token::Token, utils::{align_to, to_u32}, Result};

/// Decides the RVA of the data behind `RVA` columns.
pub trait SegmentLayout {
    /// Place the encoded body of `method` and return its RVA.
    ///
    /// # Errors
    /// Implementations report placement failures, such as running out of address space.
    fn place_method_body(&mut self, method: Token, body: &[u8]) -> Result<u32>;

    /// Place the initial value of `field` and return its RVA.
    ///
    /// # Errors
    /// Implementations report placement failures, such as running out of address space.
    fn place_field_data(&mut self, field: Token, data: &[u8]) -> Result<u32>;
}

/// Packs every segment into one contiguous section starting at a fixed RVA.
///
/// Method bodies are aligned to 4 bytes, field data to 8.
///
/// # Examples
///
/// ```rust
/// use dotemit::builder::{SegmentLayout, SequentialLayout};
/// use dotemit::metadata::token::Token;
///
/// let mut layout = SequentialLayout::new(0x2050);
/// assert_eq!(layout.place_method_body(Token::new(0x0600_0001), &[0x2A, 0x00])?, 0x2050);
/// assert_eq!(layout.place_field_data(Token::new(0x0400_0001), &[1, 2, 3, 4])?, 0x2058);
/// assert_eq!(layout.data().len(), 12);
/// # Ok::<(), dotemit::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequentialLayout {
    base_rva: u32,
    data: Vec<u8>,
}

impl SequentialLayout {
    /// A layout whose first byte lives at `base_rva`
    #[must_use]
    pub fn new(base_rva: u32) -> Self {
        SequentialLayout {
            base_rva,
            data: Vec::new(),
        }
    }

    /// RVA of the first byte
    #[must_use]
    pub fn base_rva(&self) -> u32 {
        self.base_rva
    }

    /// The packed section content
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the packed section content
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn place(&mut self, bytes: &[u8], alignment: usize) -> Result<u32> {
        self.data.resize(align_to(self.data.len(), alignment), 0);
        let offset = to_u32(self.data.len())?;
        self.data.extend_from_slice(bytes);

        self.base_rva
            .checked_add(offset)
            .ok_or_else(|| malformed_error!("Segment at offset 0x{:x} overflows the RVA space", offset))
    }
}

impl SegmentLayout for SequentialLayout {
    fn place_method_body(&mut self, _method: Token, body: &[u8]) -> Result<u32> {
        self.place(body, 4)
    }

    fn place_field_data(&mut self, _field: Token, data: &[u8]) -> Result<u32> {
        self.place(data, 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment() {
        let mut layout = SequentialLayout::new(0x1000);
        let first = layout.place_method_body(Token::new(0x0600_0001), &[0x2A]).unwrap();
        let second = layout.place_method_body(Token::new(0x0600_0002), &[0x16, 0x2A]).unwrap();
        let data = layout.place_field_data(Token::new(0x0400_0001), &[0xFF; 3]).unwrap();

        assert_eq!(first, 0x1000);
        assert_eq!(second, 0x1004);
        assert_eq!(data, 0x1008);
        assert_eq!(layout.base_rva(), 0x1000);
        assert_eq!(layout.into_data().len(), 11);
    }

    #[test]
    fn overflow() {
        let mut layout = SequentialLayout::new(u32::MAX);
        assert!(layout.place_method_body(Token::new(0x0600_0001), &[0x2A]).is_ok());
        assert!(layout.place_method_body(Token::new(0x0600_0002), &[0x2A]).is_err());
    }
}
