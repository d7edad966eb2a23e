use std::collections::HashMap;

use log::trace;

use crate::{builder::heaps::HeapBuffer, utils::to_u32, Error, Result};

/// The `#Strings` heap under construction.
///
/// # Examples
///
/// ```rust
/// use dotemit::builder::{HeapBuffer, StringHeapBuffer};
///
/// let mut strings = StringHeapBuffer::new();
/// let first = strings.intern("Object")?;
/// assert_eq!(first, 1);
/// assert_eq!(strings.intern("Object")?, first);
/// assert_eq!(strings.intern("")?, 0);
/// assert_eq!(strings.data(), b"\0Object\0");
/// # Ok::<(), dotemit::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct StringHeapBuffer {
    data: Vec<u8>,
    offsets: HashMap<String, u32>,
    hits: usize,
}

impl Default for StringHeapBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl StringHeapBuffer {
    /// Create a heap holding only the empty string
    #[must_use]
    pub fn new() -> Self {
        StringHeapBuffer {
            data: vec![0],
            offsets: HashMap::new(),
            hits: 0,
        }
    }

    /// Offset of `value`, appending it on first use. The empty string is offset 0.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `value` contains a NUL character, and
    /// [`crate::Error::Malformed`] once the heap outgrows 32-bit offsets.
    pub fn intern(&mut self, value: &str) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if value.contains('\0') {
            return Err(Error::Precondition(format!(
                "Identifier {value:?} contains a NUL character"
            )));
        }
        if let Some(offset) = self.offsets.get(value) {
            self.hits += 1;
            return Ok(*offset);
        }

        let offset = to_u32(self.data.len())?;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.offsets.insert(value.to_string(), offset);
        trace!("#Strings 0x{offset:x} = {value:?}");
        Ok(offset)
    }

    /// Offset of an optional identifier; `None` is offset 0
    ///
    /// # Errors
    /// See [`StringHeapBuffer::intern`].
    pub fn intern_opt(&mut self, value: Option<&str>) -> Result<u32> {
        value.map_or(Ok(0), |value| self.intern(value))
    }
}

impl HeapBuffer for StringHeapBuffer {
    fn name(&self) -> &'static str {
        "#Strings"
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
