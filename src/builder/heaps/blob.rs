use std::collections::HashMap;

use log::trace;

use crate::{
    builder::heaps::HeapBuffer,
    utils::{to_u32, write_compressed_uint, MAX_COMPRESSED_UINT},
    Error, Result,
};

/// The `#Blob` heap under construction.
///
/// Entries are stored as a compressed length followed by the bytes. The empty blob is offset 0.
#[derive(Debug, Clone)]
pub struct BlobHeapBuffer {
    data: Vec<u8>,
    offsets: HashMap<Vec<u8>, u32>,
    hits: usize,
}

impl Default for BlobHeapBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobHeapBuffer {
    /// Create a heap holding only the empty blob
    #[must_use]
    pub fn new() -> Self {
        BlobHeapBuffer {
            data: vec![0],
            offsets: HashMap::new(),
            hits: 0,
        }
    }

    /// Offset of `value`, appending it on first use.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if `value` is longer than a compressed length can
    /// describe.
    pub fn intern(&mut self, value: &[u8]) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if let Some(offset) = self.offsets.get(value) {
            self.hits += 1;
            return Ok(*offset);
        }

        let length = to_u32(value.len())?;
        if length > MAX_COMPRESSED_UINT {
            return Err(Error::Precondition(format!(
                "Blob of {length} bytes exceeds the compressed length range"
            )));
        }

        let offset = to_u32(self.data.len())?;
        write_compressed_uint(length, &mut self.data)?;
        self.data.extend_from_slice(value);
        self.offsets.insert(value.to_vec(), offset);
        trace!("#Blob 0x{offset:x} = {length} bytes");
        Ok(offset)
    }

    /// Offset of an optional blob; `None` is offset 0
    ///
    /// # Errors
    /// See [`BlobHeapBuffer::intern`].
    pub fn intern_opt(&mut self, value: Option<&[u8]>) -> Result<u32> {
        value.map_or(Ok(0), |value| self.intern(value))
    }
}

impl HeapBuffer for BlobHeapBuffer {
    fn name(&self) -> &'static str {
        "#Blob"
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
    use crate::metadata::streams::Blob;

    #[test]
    fn interning() {
        let mut heap = BlobHeapBuffer::new();
        let first = heap.intern(&[0x06, 0x08]).unwrap();
        let second = heap.intern(&[0x20, 0x00, 0x01]).unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 4);
        assert_eq!(heap.intern(&[0x06, 0x08]).unwrap(), first);
        assert_eq!(heap.intern(&[]).unwrap(), 0);
        assert_eq!(heap.intern_opt(None).unwrap(), 0);

        let data = heap.serialize();
        let blobs = Blob::from(&data).unwrap();
        assert_eq!(blobs.get(second as usize).unwrap(), &[0x20, 0x00, 0x01]);
    }

    #[test]
    fn long_entries() {
        let mut heap = BlobHeapBuffer::new();
        let payload = vec![0xAB; 0x80];
        let offset = heap.intern(&payload).unwrap();

        assert_eq!(&heap.data()[1..3], &[0x80, 0x80]);
        assert_eq!(heap.len(), 3 + 0x80);
        assert_eq!(
            Blob::from(heap.data()).unwrap().get(offset as usize).unwrap(),
            payload.as_slice()
        );
    }
}
