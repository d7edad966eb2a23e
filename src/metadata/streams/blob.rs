//! Blob Heap (`#Blob`) reader
//!
//! Read-only, zero-copy access to the binary heap holding signatures, custom attribute values,
//! marshalling descriptors and public keys. The writing side lives in
//! [`crate::builder::BlobHeapBuffer`].
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// '#Blob' stores length prefixed byte sequences. The prefix is a compressed unsigned integer:
///
/// * `0bbbbbbb` - the entry holds `bbbbbbb` bytes
/// * `10bbbbbb x` - the entry holds `(bbbbbb << 8) + x` bytes
/// * `110bbbbb x y z` - the entry holds `(bbbbb << 24) + (x << 16) + (y << 8) + z` bytes
///
/// Offset 0 is the empty blob.
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::streams::Blob;
/// let data = &[0u8, 0x03, 0x41, 0x42, 0x43];
/// let blob = Blob::from(data)?;
/// assert_eq!(blob.get(1)?, &[0x41, 0x42, 0x43]);
/// # Ok::<(), dotemit::Error>(())
/// ```
pub struct Blob<'a> {
    data: &'a [u8],
}

impl<'a> Blob<'a> {
    /// Create a `Blob` view over `data`
    ///
    /// # Errors
    /// Returns an error if the data is empty or doesn't start with the empty blob
    pub fn from(data: &'a [u8]) -> Result<Blob<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Invalid memory for #Blob heap"));
        }

        Ok(Blob { data })
    }

    /// The entry starting at `index`
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or the length prefix runs past the heap
    pub fn get(&self, index: usize) -> Result<&'a [u8]> {
        Ok(self.entry(index)?.1)
    }

    /// Length prefix size and payload of the entry at `index`
    fn entry(&self, index: usize) -> Result<(usize, &'a [u8])> {
        let Some(tail) = self.data.get(index..) else {
            return Err(OutOfBounds);
        };

        let mut parser = Parser::new(tail);
        let len = parser.read_compressed_uint()? as usize;
        let prefix = parser.pos();
        let payload = parser.read_bytes(len)?;

        Ok((prefix, payload))
    }

    /// Size of the heap in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false for a valid heap
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over all entries as `(offset, payload)`, starting after the empty blob at
    /// offset 0.
    ///
    /// Zero-length entries in the padding at the end of the heap are skipped.
    #[must_use]
    pub fn iter(&self) -> BlobIterator<'_> {
        BlobIterator {
            blob: self,
            position: 1,
        }
    }
}

impl<'a> IntoIterator for &'a Blob<'a> {
    type Item = Result<(usize, &'a [u8])>;
    type IntoIter = BlobIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a `#Blob` heap
pub struct BlobIterator<'a> {
    blob: &'a Blob<'a>,
    position: usize,
}

impl<'a> Iterator for BlobIterator<'a> {
    type Item = Result<(usize, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.blob.data.get(self.position) == Some(&0) {
            self.position += 1;
        }
        if self.position >= self.blob.data.len() {
            return None;
        }

        let start = self.position;
        match self.blob.entry(start) {
            Ok((prefix, payload)) => {
                self.position += prefix + payload.len();
                Some(Ok((start, payload)))
            }
            Err(error) => {
                self.position = self.blob.data.len();
                Some(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = {
            let mut data = vec![0xCC; 66100];
            /* i - 0    - always empty          */ data[0]          = 0b_00000000_u8;

            /* i - 1    - len 10                */ data[1]          = 0b_00001010_u8;
            /* i - 1    - len 10                */ data[2..12]      .copy_from_slice(&[0x0A; 10]);

            /* i - 12   - len 5                 */ data[12]         = 0b_00000101_u8;
            /* i - 12   - len 5                 */ data[13..18]     .copy_from_slice(&[0xAB; 5]);

            /* i - 18   - len 257               */ data[18]         = 0b_10000001_u8;
            /* i - 18   - len 257               */ data[19]         = 0b_00000001_u8;
            /* i - 18   - len 257               */ data[20..277]    .copy_from_slice(&[0xBA; 257]);

            /* i - 277  - len 65793             */ data[277]        = 0b_11000000_u8;
            /* i - 277  - len 65793             */ data[278]        = 0b_00000001_u8;
            /* i - 277  - len 65793             */ data[279]        = 0b_00000001_u8;
            /* i - 277  - len 65793             */ data[280]        = 0b_00000001_u8;
            /* i - 277  - len 65793             */ data[281..66074] .copy_from_slice(&[0xBB; 65793]);

            data
        };

        let blob = Blob::from(&data).unwrap();

        assert_eq!(blob.get(0).unwrap(), &[] as &[u8]);
        assert_eq!(blob.get(1).unwrap(), &[0x0A; 10]);
        assert_eq!(blob.get(12).unwrap(), &[0xAB; 5]);
        assert_eq!(blob.get(18).unwrap().len(), 257);
        assert_eq!(blob.get(277).unwrap().len(), 65793);

        // 0xCC announces a 4-byte prefix whose length runs past the heap
        assert!(blob.get(66074).is_err());
        assert!(matches!(blob.get(70000), Err(crate::Error::OutOfBounds)));
    }

    #[test]
    fn iterate() {
        let data = [0x00, 0x02, 0x01, 0x02, 0x01, 0xFF, 0x00, 0x00];
        let blob = Blob::from(&data).unwrap();

        let entries: Vec<_> = blob.iter().map(|entry| entry.unwrap()).collect();
        assert_eq!(entries, [(1, &[0x01, 0x02][..]), (4, &[0xFF][..])]);
    }

    #[test]
    fn invalid() {
        assert!(Blob::from(&[]).is_err());
        assert!(Blob::from(&[0x01]).is_err());

        let blob = Blob::from(&[0x00, 0x05, 0x01]).unwrap();
        assert!(blob.get(1).is_err());
        assert_eq!(blob.iter().filter(Result::is_err).count(), 1);
    }
}
