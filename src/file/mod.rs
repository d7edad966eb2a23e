//! PE file access and metadata location.
//!
//! The metadata engine works on plain byte slices. This module is the thin layer that gets those
//! bytes out of a .NET executable: it parses the PE image with `goblin`, follows the CLR runtime
//! header to the metadata root and hands out the slice.
//!
//! # Key Components
//!
//! - [`crate::file::File`] - A parsed PE image with .NET specific accessors
//! - [`crate::file::Backend`] - Trait for the data source (memory-mapped file or memory buffer)
//! - [`crate::file::parser::Parser`] - Cursor over metadata bytes
//! - [`crate::file::io`] - Little-endian read and write helpers
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotemit::{File, metadata::view::MetadataView};
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("tests/samples/hello.dll"))?;
//! let view = MetadataView::from_bytes(file.metadata()?)?;
//! println!("{} tables present", view.tables.table_count());
//! # Ok::<(), dotemit::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use goblin::pe::{section_table::SectionTable, PE};
use log::debug;
use ouroboros::self_referencing;

use crate::{
    file::io::read_le_at,
    Error::{Empty, GoblinErr, OutOfBounds},
    Result,
};
use memory::Memory;
use physical::Physical;

/// Source of the raw bytes of a [`File`].
pub trait Backend: Send + Sync {
    /// Bounds checked sub-slice of the data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range leaves the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset.checked_add(len).ok_or(OutOfBounds)?;
        self.data().get(offset..end).ok_or(OutOfBounds)
    }

    /// The complete data
    fn data(&self) -> &[u8];

    /// Size of the data in bytes
    fn len(&self) -> usize {
        self.data().len()
    }
}

#[self_referencing]
/// A loaded PE image carrying .NET metadata.
///
/// Loading fails unless the optional header has a CLR runtime header directory.
///
/// # Examples
///
/// ```rust,no_run
/// use dotemit::File;
///
/// let data = std::fs::read("tests/samples/hello.dll")?;
/// let file = File::from_mem(data)?;
/// let (clr_rva, clr_size) = file.clr()?;
/// println!("CLR header at RVA 0x{:x}, {} bytes", clr_rva, clr_size);
/// # Ok::<(), dotemit::Error>(())
/// ```
pub struct File {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Memory-map and parse the PE file at `file`.
    ///
    /// # Errors
    /// Returns an error if the file can not be read, is empty, is no PE image or has no CLR
    /// runtime header.
    pub fn from_file(file: &Path) -> Result<File> {
        Self::load(Physical::new(file)?)
    }

    /// Parse a PE image held in memory.
    ///
    /// # Errors
    /// Returns an error if the buffer is empty, is no PE image or has no CLR runtime header.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Self::load(Memory::new(data))
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        File::try_new(Box::new(data), |data| {
            let pe = PE::parse(data.data()).map_err(GoblinErr)?;
            let has_clr = pe.header.optional_header.as_ref().is_some_and(|optional| {
                optional
                    .data_directories
                    .get_clr_runtime_header()
                    .is_some()
            });
            if has_clr {
                Ok(pe)
            } else {
                Err(malformed_error!(
                    "File does not have a CLR runtime header directory"
                ))
            }
        })
    }

    /// Size of the image in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns true if the image has no bytes; never the case for a loaded file
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw bytes of the image
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.borrow_data().data()
    }

    /// Bounds checked sub-slice of the image
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range leaves the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.borrow_data().data_slice(offset, len)
    }

    /// Number of sections
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.with_pe(|pe| pe.sections.len())
    }

    /// Names of all sections, in header order
    #[must_use]
    pub fn section_names(&self) -> Vec<String> {
        self.with_pe(|pe| {
            pe.sections
                .iter()
                .map(|section| {
                    String::from_utf8_lossy(&section.name)
                        .trim_end_matches('\0')
                        .to_string()
                })
                .collect()
        })
    }

    /// RVA and size of the CLR runtime header
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the directory is missing.
    pub fn clr(&self) -> Result<(usize, usize)> {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .as_ref()
                .and_then(|optional| optional.data_directories.get_clr_runtime_header().copied())
                .map(|clr| (clr.virtual_address as usize, clr.size as usize))
                .ok_or_else(|| malformed_error!("File does not have a CLR runtime header"))
        })
    }

    /// Translate a relative virtual address into a file offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section contains `rva`.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva = u32::try_from(rva)
            .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

        self.with_pe(|pe| {
            pe.sections
                .iter()
                .find(|section| section_contains(section, rva))
                .map(|section| {
                    (rva - section.virtual_address) as usize + section.pointer_to_raw_data as usize
                })
                .ok_or_else(|| malformed_error!("RVA could not be converted to offset - {}", rva))
        })
    }

    /// The metadata root and its streams, located through the CLR runtime header.
    ///
    /// # Errors
    /// Returns an error if the CLR header or the metadata directory it names lies outside the
    /// image, and [`crate::Error::OutOfBounds`] if the metadata leaves its section.
    pub fn metadata(&self) -> Result<&[u8]> {
        let (clr_rva, clr_size) = self.clr()?;
        if clr_size < 16 {
            return Err(malformed_error!("CLR runtime header too small - {}", clr_size));
        }

        let clr = self.data_slice(self.rva_to_offset(clr_rva)?, clr_size)?;
        let mut offset = 8;
        let metadata_rva = read_le_at::<u32>(clr, &mut offset)?;
        let metadata_size = read_le_at::<u32>(clr, &mut offset)?;
        debug!("metadata at RVA 0x{metadata_rva:x}, {metadata_size} bytes");

        // The directory must stay inside the raw data of the section holding it
        let offset = self.rva_to_offset(metadata_rva as usize)?;
        let section_end = self.with_pe(|pe| {
            pe.sections
                .iter()
                .find(|section| section_contains(section, metadata_rva))
                .map(|section| {
                    section.pointer_to_raw_data as usize + section.size_of_raw_data as usize
                })
        });
        match (section_end, offset.checked_add(metadata_size as usize)) {
            (Some(section_end), Some(end)) if end <= section_end => {
                self.data_slice(offset, metadata_size as usize)
            }
            _ => Err(OutOfBounds),
        }
    }
}

fn section_contains(section: &SectionTable, rva: u32) -> bool {
    let size = section.virtual_size.max(section.size_of_raw_data);
    section.virtual_address <= rva
        && section
            .virtual_address
            .checked_add(size)
            .is_some_and(|end| rva < end)
}
