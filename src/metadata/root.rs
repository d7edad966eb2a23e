//! Metadata root header and stream directory.
//!
//! The metadata root is the entry point of every metadata blob: a signature, the runtime version
//! string, and a directory locating the `#~`, `#Strings`, `#US`, `#GUID` and `#Blob` streams.
//! [`MetadataRoot::read`] parses it, [`MetadataRoot::write`] lays out a root followed by the
//! given streams.
//!
//! # Example
//!
//! ```rust
//! use dotemit::metadata::root::MetadataRoot;
//!
//! let bytes = MetadataRoot::write("v4.0.30319", &[("#~", &[0u8; 24][..])])?;
//! let root = MetadataRoot::read(&bytes)?;
//! assert_eq!(root.version, "v4.0.30319");
//! assert_eq!(root.stream_headers[0].name, "#~");
//! assert_eq!(root.stream_headers[0].size, 24);
//! # Ok::<(), dotemit::Error>(())
//! ```
//!
//! # References
//!
//! - [ECMA-335 II.24.2.1: Metadata root](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::read_le_at,
    metadata::streams::StreamHeader,
    utils::{align_to, to_u32},
    Error::OutOfBounds,
    Result,
};

/// The magic value starting every metadata root ('BSJB')
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The metadata root header with its stream directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRoot {
    /// Magic signature for physical metadata: 0x424A5342
    pub signature: u32,
    /// `MajorVersion`, 1
    pub major_version: u16,
    /// `MinorVersion`, 1
    pub minor_version: u16,
    /// Always 0
    pub reserved: u32,
    /// Number of bytes allocated to hold the version string, a multiple of 4
    pub length: u32,
    /// The version string without its padding
    pub version: String,
    /// Reserved, always 0
    pub flags: u16,
    /// The stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl MetadataRoot {
    /// Parse a metadata root from the start of `data`.
    ///
    /// Every stream must lie inside `data`.
    ///
    /// # Errors
    /// Returns an error if the data is too short, the signature is invalid, or the stream
    /// directory is malformed.
    pub fn read(data: &[u8]) -> Result<MetadataRoot> {
        let mut offset = 0;
        let signature = read_le_at::<u32>(data, &mut offset)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - 0x{:08x}",
                signature
            ));
        }

        let major_version = read_le_at::<u16>(data, &mut offset)?;
        let minor_version = read_le_at::<u16>(data, &mut offset)?;
        let reserved = read_le_at::<u32>(data, &mut offset)?;
        let length = read_le_at::<u32>(data, &mut offset)?;

        let version_end = offset
            .checked_add(length as usize)
            .ok_or_else(|| malformed_error!("Version string length overflow - {}", length))?;
        let version_bytes = data.get(offset..version_end).ok_or(OutOfBounds)?;
        let version_len = version_bytes
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(version_bytes.len());
        let version = std::str::from_utf8(&version_bytes[..version_len])
            .map_err(|_| malformed_error!("Version string is not UTF-8"))?
            .to_string();
        offset = version_end;

        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 || stream_count > 6 {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers: Vec<StreamHeader> = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            let header = StreamHeader::from(data.get(offset..).ok_or(OutOfBounds)?)?;

            let end = header.offset.checked_add(header.size).ok_or_else(|| {
                malformed_error!(
                    "Stream offset and size cause integer overflow - {} + {}",
                    header.offset,
                    header.size
                )
            })?;
            if end as usize > data.len() {
                return Err(OutOfBounds);
            }
            if stream_headers.iter().any(|known| known.name == header.name) {
                return Err(malformed_error!("Duplicate stream - {}", header.name));
            }

            offset += header.encoded_size();
            stream_headers.push(header);
        }

        Ok(MetadataRoot {
            signature,
            major_version,
            minor_version,
            reserved,
            length,
            version,
            flags,
            stream_headers,
        })
    }

    /// The directory entry of the stream called `name`
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }

    /// Lay out a metadata root followed by `streams`, each padded to 4 bytes.
    ///
    /// # Errors
    /// Returns an error if the version string is longer than 255 bytes or the result exceeds
    /// the 32-bit offset range.
    pub fn write(version: &str, streams: &[(&str, &[u8])]) -> Result<Vec<u8>> {
        // Includes the terminator
        let length = align_to(version.len() + 1, 4);
        if length > 256 {
            return Err(malformed_error!("Version string too long - {}", version));
        }

        let mut headers: Vec<StreamHeader> = streams
            .iter()
            .map(|(name, data)| {
                Ok(StreamHeader {
                    offset: 0,
                    size: to_u32(align_to(data.len(), 4))?,
                    name: (*name).to_string(),
                })
            })
            .collect::<Result<_>>()?;

        let directory_size: usize = headers.iter().map(StreamHeader::encoded_size).sum();
        let mut position = 16 + length + 4 + directory_size;
        for header in &mut headers {
            header.offset = to_u32(position)?;
            position += header.size as usize;
        }

        let mut out = Vec::with_capacity(position);
        out.extend_from_slice(&CIL_HEADER_MAGIC.to_le_bytes());
        out.extend_from_slice(&1_u16.to_le_bytes());
        out.extend_from_slice(&1_u16.to_le_bytes());
        out.extend_from_slice(&0_u32.to_le_bytes());
        out.extend_from_slice(&to_u32(length)?.to_le_bytes());
        out.extend_from_slice(version.as_bytes());
        out.resize(16 + length, 0);
        out.extend_from_slice(&0_u16.to_le_bytes());
        out.extend_from_slice(
            &u16::try_from(headers.len())
                .map_err(|_| malformed_error!("Too many streams"))?
                .to_le_bytes(),
        );
        for header in &headers {
            header.write(&mut out)?;
        }

        for (header, (_, data)) in headers.iter().zip(streams) {
            out.extend_from_slice(data);
            out.resize(header.offset as usize + header.size as usize, 0);
        }

        Ok(out)
    }
}
