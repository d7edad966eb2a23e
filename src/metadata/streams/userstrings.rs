//! User String Heap (`#US`) reader
//!
//! Holds the string literals loaded by `ldstr`. Every entry is a compressed length followed by
//! UTF-16LE code units and a trailing flag byte, which is counted in the length. The writing side
//! lives in [`crate::builder::UserStringHeapBuffer`].
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use widestring::U16String;

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// A decoded `#US` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserString {
    /// The UTF-16 code units
    pub value: U16String,
    /// The trailing flag byte: 1 if the string needs more than 8-bit handling
    pub flag: u8,
}

/// The `UserStrings` object provides access to the '#US' heap.
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::streams::UserStrings;
/// let data = &[0u8, 0x03, 0x41, 0x00, 0x00];
/// let us = UserStrings::from(data)?;
/// assert_eq!(us.get(1)?.value.to_string_lossy(), "A");
/// # Ok::<(), dotemit::Error>(())
/// ```
pub struct UserStrings<'a> {
    data: &'a [u8],
}

impl<'a> UserStrings<'a> {
    /// Create a `UserStrings` view over `data`
    ///
    /// # Errors
    /// Returns an error if the heap is empty or doesn't start with the empty entry
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Invalid memory for #US heap"));
        }

        Ok(UserStrings { data })
    }

    /// The entry starting at `index`
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or the entry is truncated
    pub fn get(&self, index: usize) -> Result<UserString> {
        Ok(self.entry(index)?.1)
    }

    fn entry(&self, index: usize) -> Result<(usize, UserString)> {
        let Some(tail) = self.data.get(index..) else {
            return Err(OutOfBounds);
        };

        let mut parser = Parser::new(tail);
        let len = parser.read_compressed_uint()? as usize;
        let payload = parser.read_bytes(len)?;

        let (units, flag) = match payload.split_last() {
            Some((flag, units)) if units.len() % 2 == 0 => (units, *flag),
            Some(_) => {
                return Err(malformed_error!(
                    "Invalid string data length at index - {}",
                    index
                ))
            }
            None => (payload, 0),
        };

        let value = units
            .chunks_exact(2)
            .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
            .collect::<Vec<_>>();

        Ok((
            parser.pos(),
            UserString {
                value: U16String::from_vec(value),
                flag,
            },
        ))
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

    /// Iterate over all entries as `(offset, entry)`, skipping the empty entry at offset 0
    #[must_use]
    pub fn iter(&self) -> UserStringsIterator<'_> {
        UserStringsIterator {
            heap: self,
            position: 1,
        }
    }
}

/// Iterator over the entries of a `#US` heap
pub struct UserStringsIterator<'a> {
    heap: &'a UserStrings<'a>,
    position: usize,
}

impl Iterator for UserStringsIterator<'_> {
    type Item = Result<(usize, UserString)>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.heap.data.get(self.position) == Some(&0) {
            self.position += 1;
        }
        if self.position >= self.heap.data.len() {
            return None;
        }

        let start = self.position;
        match self.heap.entry(start) {
            Ok((consumed, entry)) => {
                self.position += consumed;
                Some(Ok((start, entry)))
            }
            Err(error) => {
                self.position = self.heap.data.len();
                Some(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use widestring::u16str;

    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data: [u8; 32] = [
            0x00, 0x1b, 0x48, 0x00, 0x65, 0x00, 0x6c, 0x00, 0x6c, 0x00, 0x6f, 0x00, 0x2c, 0x00, 0x20, 0x00, 0x57, 0x00, 0x6f, 0x00, 0x72, 0x00, 0x6c, 0x00, 0x64, 0x00, 0x21, 0x00, 0x00, 0x00, 0x00, 0x00
        ];

        let us_str = UserStrings::from(&data).unwrap();

        let entry = us_str.get(1).unwrap();
        assert_eq!(entry.value.as_ustr(), u16str!("Hello, World!"));
        assert_eq!(entry.flag, 0);

        let all: Vec<_> = us_str.iter().map(|entry| entry.unwrap().0).collect();
        assert_eq!(all, [1]);
    }

    #[test]
    fn invalid() {
        assert!(UserStrings::from(&[]).is_err());
        assert!(UserStrings::from(&[0x22, 0x01, 0x00]).is_err());

        let us_str = UserStrings::from(&[0x00, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]).unwrap();
        assert!(us_str.get(1).is_err());

        // Even payload means the flag byte is missing
        let us_str = UserStrings::from(&[0x00, 0x02, 0x41, 0x00]).unwrap();
        assert!(us_str.get(1).is_err());
    }
}
