use std::collections::HashMap;

use log::trace;

use crate::{
    builder::heaps::HeapBuffer,
    utils::{to_u32, write_compressed_uint, MAX_COMPRESSED_UINT},
    Error, Result,
};

/// Whether a UTF-16 unit forces the trailing flag byte to 1 (ECMA-335 II.24.2.4)
fn needs_special_handling(unit: u16) -> bool {
    match unit {
        0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D | 0x7F => true,
        _ => unit > 0xFF,
    }
}

/// The `#US` heap under construction.
///
/// Entries are a compressed byte length (UTF-16 bytes plus one), the UTF-16LE code units and a
/// flag byte that is 1 when any unit needs more than 8-bit handling.
///
/// # Examples
///
/// ```rust
/// use dotemit::builder::{HeapBuffer, UserStringHeapBuffer};
///
/// let mut heap = UserStringHeapBuffer::new();
/// assert_eq!(heap.intern("Hi")?, 1);
/// assert_eq!(heap.data(), &[0x00, 0x05, b'H', 0x00, b'i', 0x00, 0x00]);
/// # Ok::<(), dotemit::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct UserStringHeapBuffer {
    data: Vec<u8>,
    offsets: HashMap<String, u32>,
    hits: usize,
}

impl Default for UserStringHeapBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStringHeapBuffer {
    /// Create a heap holding only the reserved entry
    #[must_use]
    pub fn new() -> Self {
        UserStringHeapBuffer {
            data: vec![0],
            offsets: HashMap::new(),
            hits: 0,
        }
    }

    /// Offset of the literal `value`, appending it on first use.
    ///
    /// The empty literal gets its own entry; only the reserved offset 0 means "no string".
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the encoded entry is too long for a compressed
    /// length.
    pub fn intern(&mut self, value: &str) -> Result<u32> {
        if let Some(offset) = self.offsets.get(value) {
            self.hits += 1;
            return Ok(*offset);
        }

        let units: Vec<u16> = value.encode_utf16().collect();
        let length = to_u32(units.len() * 2 + 1)?;
        if length > MAX_COMPRESSED_UINT {
            return Err(Error::Precondition(format!(
                "User string of {} characters exceeds the compressed length range",
                units.len()
            )));
        }

        let offset = to_u32(self.data.len())?;
        write_compressed_uint(length, &mut self.data)?;
        for unit in &units {
            self.data.extend_from_slice(&unit.to_le_bytes());
        }
        self.data
            .push(u8::from(units.iter().any(|unit| needs_special_handling(*unit))));

        self.offsets.insert(value.to_string(), offset);
        trace!("#US 0x{offset:x} = {value:?}");
        Ok(offset)
    }
}

impl HeapBuffer for UserStringHeapBuffer {
    fn name(&self) -> &'static str {
        "#US"
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    fn dedup_hits(&self) -> usize {
        self.hits
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::streams::UserStrings;

    #[test]
    fn flag_byte() {
        let mut heap = UserStringHeapBuffer::new();
        let plain = heap.intern("abc").unwrap();
        let quoted = heap.intern("it's").unwrap();
        let wide = heap.intern("\u{263A}").unwrap();

        let flag = |offset: u32, units: usize| heap.data()[offset as usize + 1 + units * 2];
        assert_eq!(flag(plain, 3), 0);
        assert_eq!(flag(quoted, 4), 1);
        assert_eq!(flag(wide, 1), 1);
    }

    #[test]
    fn reads_back() {
        let mut heap = UserStringHeapBuffer::new();
        let empty = heap.intern("").unwrap();
        let hello = heap.intern("Hello, World!").unwrap();
        assert_eq!(heap.intern("Hello, World!").unwrap(), hello);
        assert_eq!(heap.dedup_hits(), 1);
        assert_eq!(empty, 1);
        assert_eq!(heap.data()[1], 0x01);

        let data = heap.serialize();
        let strings = UserStrings::from(&data).unwrap();
        assert_eq!(
            strings.get(hello as usize).unwrap().value.to_string_lossy(),
            "Hello, World!"
        );
    }
}
