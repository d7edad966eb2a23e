use std::collections::HashMap;

use crate::{builder::heaps::HeapBuffer, utils::to_u32, Result};

/// The `#GUID` heap under construction.
///
/// Indices are 1-based; index 0 and [`uguid::Guid::ZERO`] both mean "no GUID".
#[derive(Debug, Clone, Default)]
pub struct GuidHeapBuffer {
    data: Vec<u8>,
    indices: HashMap<uguid::Guid, u32>,
    hits: usize,
}

impl GuidHeapBuffer {
    /// Create an empty heap
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `value`, appending it on first use.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] once the heap outgrows 32-bit indices.
    pub fn intern(&mut self, value: uguid::Guid) -> Result<u32> {
        if value == uguid::Guid::ZERO {
            return Ok(0);
        }
        if let Some(index) = self.indices.get(&value) {
            self.hits += 1;
            return Ok(*index);
        }

        self.data.extend_from_slice(&value.to_bytes());
        let index = to_u32(self.data.len() / 16)?;
        self.indices.insert(value, index);
        Ok(index)
    }

    /// Index of an optional GUID; `None` is index 0
    ///
    /// # Errors
    /// See [`GuidHeapBuffer::intern`].
    pub fn intern_opt(&mut self, value: Option<uguid::Guid>) -> Result<u32> {
        value.map_or(Ok(0), |value| self.intern(value))
    }
}

impl HeapBuffer for GuidHeapBuffer {
    fn name(&self) -> &'static str {
        "#GUID"
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn dedup_hits(&self) -> usize {
        self.hits
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}
