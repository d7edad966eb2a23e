//! GUID Heap (`#GUID`) reader
//!
//! The heap is a plain array of 16-byte GUIDs addressed by a 1-based index; index 0 means
//! "no GUID". The writing side lives in [`crate::builder::GuidHeapBuffer`].
//!
//! # Reference
//! - [ECMA-335 II.24.2.5](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{Error::OutOfBounds, Result};

/// '#GUID' is a heap, which contains a sequence of 128-bit GUIDs
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::streams::Guid;
/// let data = [0xAAu8; 16];
/// let guids = Guid::from(&data)?;
/// assert_eq!(guids.get(1)?, uguid::guid!("AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA"));
/// # Ok::<(), dotemit::Error>(())
/// ```
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Create a `Guid` view over `data`
    ///
    /// # Errors
    /// Returns an error if the data is not a whole number of GUIDs
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "#GUID heap size {} is not a multiple of 16",
                data.len()
            ));
        }

        Ok(Guid { data })
    }

    /// The GUID at the 1-based `index`
    ///
    /// # Errors
    /// Returns an error if the index is 0 or past the last entry
    pub fn get(&self, index: usize) -> Result<uguid::Guid> {
        let start = index
            .checked_sub(1)
            .and_then(|slot| slot.checked_mul(16))
            .ok_or(OutOfBounds)?;
        let end = start.checked_add(16).ok_or(OutOfBounds)?;
        let Some(bytes) = self.data.get(start..end) else {
            return Err(OutOfBounds);
        };

        let mut buffer = [0u8; 16];
        buffer.copy_from_slice(bytes);
        Ok(uguid::Guid::from_bytes(buffer))
    }

    /// Number of GUIDs in the heap
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.len() / 16
    }

    /// Iterate over all entries as `(index, guid)`
    pub fn iter(&self) -> impl Iterator<Item = (usize, uguid::Guid)> + '_ {
        self.data.chunks_exact(16).enumerate().map(|(slot, bytes)| {
            let mut buffer = [0u8; 16];
            buffer.copy_from_slice(bytes);
            (slot + 1, uguid::Guid::from_bytes(buffer))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data : [u8; 48] = [
            /* 1 - 0;16   */  0x8e, 0x90, 0x37, 0xd4, 0xe6, 0x65, 0x7c, 0x48, 0x97, 0x35, 0x7b, 0xdf, 0xf6, 0x99, 0xbe, 0xa5,
            /* 2 - 16;32  */  0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
            /* 3 - 32;48  */  0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let guids = Guid::from(&data).unwrap();

        assert_eq!(
            guids.get(1).unwrap(),
            uguid::guid!("d437908e-65e6-487c-9735-7bdff699bea5")
        );
        assert_eq!(
            guids.get(2).unwrap(),
            uguid::guid!("AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA")
        );
        assert_eq!(guids.get(3).unwrap(), uguid::Guid::ZERO);
        assert_eq!(guids.count(), 3);
        assert_eq!(guids.iter().count(), 3);

        assert!(guids.get(0).is_err());
        assert!(guids.get(4).is_err());
    }

    #[test]
    fn index_overflow() {
        let guids = Guid::from(&[0u8; 16]).unwrap();
        assert!(matches!(guids.get(usize::MAX), Err(OutOfBounds)));
        assert!(matches!(guids.get(usize::MAX / 16 + 2), Err(OutOfBounds)));
    }

    #[test]
    fn truncated() {
        assert!(Guid::from(&[0u8; 15]).is_err());
        assert!(Guid::from(&[]).is_ok());
    }
}
