//! Stream Header for .NET Metadata Streams
//!
//! Each entry of the metadata root's stream directory names one stream and gives its offset
//! (relative to the root) and size.
//!
//! # Reference
//! - [ECMA-335 II.24.2.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::read_le_at,
    utils::align_to,
    Error::OutOfBounds,
    Result,
};

/// Names this crate recognises in a stream directory. `#-` is the unoptimized tables stream.
pub const STREAM_NAMES: [&str; 6] = ["#~", "#-", "#Strings", "#US", "#GUID", "#Blob"];

/// A stream header provides the name, position and length of a table stream or heap. The size of
/// the header itself depends on its name, which is NUL terminated and padded to 4 bytes.
///
/// # Examples
///
/// ```rust
/// use dotemit::metadata::streams::StreamHeader;
/// let data = [0x6C, 0, 0, 0, 0xA4, 0x45, 0, 0, 0x23, 0x7E, 0, 0];
/// let header = StreamHeader::from(&data)?;
/// assert_eq!(header.name, "#~");
/// assert_eq!(header.encoded_size(), 12);
/// # Ok::<(), dotemit::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream, relative to the metadata root
    pub offset: u32,
    /// Size of this stream in bytes, shall be a multiple of 4
    pub size: u32,
    /// Name of the stream, at most 32 characters including the terminator
    pub name: String,
}

impl StreamHeader {
    /// Parse a stream header from the start of `data`
    ///
    /// # Errors
    /// Returns an error if the data is too short, the name is unterminated or not a known stream
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        let mut offset = 0;
        let stream_offset = read_le_at::<u32>(data, &mut offset)?;
        let size = read_le_at::<u32>(data, &mut offset)?;

        let name_area = data.get(8..).ok_or(OutOfBounds)?;
        let name_area = &name_area[..name_area.len().min(32)];
        let Some(name_len) = name_area.iter().position(|byte| *byte == 0) else {
            return Err(malformed_error!("Unterminated stream header name"));
        };

        let name = std::str::from_utf8(&name_area[..name_len])
            .map_err(|_| malformed_error!("Stream header name is not ASCII"))?;
        if !STREAM_NAMES.contains(&name) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: stream_offset,
            size,
            name: name.to_string(),
        })
    }

    /// Bytes this header occupies in the stream directory
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        8 + align_to(self.name.len() + 1, 4)
    }

    /// Append the encoded header to `out`
    ///
    /// # Errors
    /// Returns an error if the name does not fit the 32 byte limit
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.name.len() >= 32 {
            return Err(malformed_error!("Stream name too long - {}", self.name));
        }

        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        let padding = self.encoded_size() - 8 - self.name.len();
        out.resize(out.len() + padding, 0);
        Ok(())
    }
}
