//! String Heap (`#Strings`) reader
//!
//! Read-only, zero-copy access to the UTF-8 identifier heap referenced by `String` columns.
//! The writing side lives in [`crate::builder::StringHeapBuffer`].
//!
//! # Reference
//! - [ECMA-335 II.24.2.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::{ffi::CStr, str};

use crate::{Error::OutOfBounds, Result};

/// '#Strings' holds the identifiers referenced from the metadata tables: type names, member
/// names, namespaces, ...
///
/// Offset 0 is always the empty string.
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::streams::Strings;
/// let data = &[0u8, b'H', b'e', b'l', b'l', b'o', 0u8];
/// let strings = Strings::from(data)?;
/// assert_eq!(strings.get(1)?, "Hello");
/// assert_eq!(strings.get(3)?, "llo");
/// # Ok::<(), dotemit::Error>(())
/// ```
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Create a `Strings` view over `data`
    ///
    /// # Errors
    /// Returns an error if the heap is empty or does not start with the empty string
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings { data })
    }

    /// The string starting at `index`.
    ///
    /// Offsets may point into the middle of an entry; the tail of the entry is returned.
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds, the string is unterminated or it is not
    /// valid UTF-8
    pub fn get(&self, index: usize) -> Result<&'a str> {
        let Some(tail) = self.data.get(index..) else {
            return Err(OutOfBounds);
        };

        CStr::from_bytes_until_nul(tail)
            .ok()
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| malformed_error!("Invalid string at index - {}", index))
    }

    /// Size of the heap in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false, a valid heap holds at least the empty string
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over all entries as `(offset, value)`, skipping the empty string at offset 0
    /// and trailing padding.
    #[must_use]
    pub fn iter(&self) -> StringsIterator<'_> {
        StringsIterator {
            strings: self,
            position: 1,
        }
    }
}

impl<'a> IntoIterator for &'a Strings<'a> {
    type Item = Result<(usize, &'a str)>;
    type IntoIter = StringsIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a `#Strings` heap
pub struct StringsIterator<'a> {
    strings: &'a Strings<'a>,
    position: usize,
}

impl<'a> Iterator for StringsIterator<'a> {
    type Item = Result<(usize, &'a str)>;

    fn next(&mut self) -> Option<Self::Item> {
        // Padding after the last entry is all zero bytes
        while self.strings.data.get(self.position) == Some(&0) {
            self.position += 1;
        }
        if self.position >= self.strings.data.len() {
            return None;
        }

        let start = self.position;
        match self.strings.get(start) {
            Ok(value) => {
                self.position += value.len() + 1;
                Some(Ok((start, value)))
            }
            Err(error) => {
                self.position = self.strings.data.len();
                Some(Err(error))
            }
        }
    }
}
