//! Read-only view of a complete metadata blob.

use log::debug;

use crate::{
    config::ReadOptions,
    metadata::{
        root::MetadataRoot,
        streams::{Blob, Guid, Strings, TablesStream, UserStrings},
    },
    Result,
};

/// The metadata root, the decoded `#~` stream and zero-copy views of the four heaps.
///
/// Missing heaps are `None`; a `#~` (or unoptimized `#-`) stream is required.
///
/// # Examples
///
/// ```rust,no_run
/// use dotemit::metadata::{tables::TableId, view::MetadataView};
///
/// # fn example(metadata: &[u8]) -> dotemit::Result<()> {
/// let view = MetadataView::from_bytes(metadata)?;
/// for (token, row) in view.tables.rows_with_tokens(TableId::TypeDef) {
///     let name = view.string(row.value(1))?;
///     println!("{token}: {name}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct MetadataView<'a> {
    /// The root header and stream directory
    pub root: MetadataRoot,
    /// The decoded tables
    pub tables: TablesStream,
    /// `#Strings`
    pub strings: Option<Strings<'a>>,
    /// `#US`
    pub user_strings: Option<UserStrings<'a>>,
    /// `#GUID`
    pub guids: Option<Guid<'a>>,
    /// `#Blob`
    pub blobs: Option<Blob<'a>>,
}

impl<'a> MetadataView<'a> {
    /// Parse `data` with the default [`ReadOptions`]
    ///
    /// # Errors
    /// Returns an error if the root, a heap header or the tables stream is invalid
    pub fn from_bytes(data: &'a [u8]) -> Result<MetadataView<'a>> {
        Self::from_bytes_with(data, &ReadOptions::default())
    }

    /// Parse `data`
    ///
    /// # Errors
    /// Returns an error if the root, a heap header or the tables stream is invalid
    pub fn from_bytes_with(data: &'a [u8], options: &ReadOptions) -> Result<MetadataView<'a>> {
        let root = MetadataRoot::read(data)?;

        let stream_data = |name: &str| -> Option<&'a [u8]> {
            root.stream(name).and_then(|header| {
                let start = header.offset as usize;
                data.get(start..start + header.size as usize)
            })
        };

        let Some(tables_data) = stream_data("#~").or_else(|| stream_data("#-")) else {
            return Err(malformed_error!("Metadata has no tables stream"));
        };
        let tables = TablesStream::read_with(tables_data, options)?;

        let strings = stream_data("#Strings").map(Strings::from).transpose()?;
        let user_strings = stream_data("#US").map(UserStrings::from).transpose()?;
        let guids = stream_data("#GUID").map(Guid::from).transpose()?;
        let blobs = stream_data("#Blob").map(Blob::from).transpose()?;

        debug!(
            "metadata {}: {} streams, {} tables",
            root.version,
            root.stream_headers.len(),
            tables.table_count()
        );

        Ok(MetadataView {
            root,
            tables,
            strings,
            user_strings,
            guids,
            blobs,
        })
    }

    /// The `#Strings` entry at `offset`; offset 0 is the empty string even without a heap
    ///
    /// # Errors
    /// Returns an error if the heap is missing or the offset is invalid
    pub fn string(&self, offset: u32) -> Result<&'a str> {
        match (&self.strings, offset) {
            (_, 0) => Ok(""),
            (Some(strings), offset) => strings.get(offset as usize),
            (None, _) => Err(malformed_error!("Metadata has no #Strings heap")),
        }
    }

    /// The `#Blob` entry at `offset`; offset 0 is the empty blob even without a heap
    ///
    /// # Errors
    /// Returns an error if the heap is missing or the offset is invalid
    pub fn blob(&self, offset: u32) -> Result<&'a [u8]> {
        match (&self.blobs, offset) {
            (_, 0) => Ok(&[]),
            (Some(blobs), offset) => blobs.get(offset as usize),
            (None, _) => Err(malformed_error!("Metadata has no #Blob heap")),
        }
    }

    /// The `#GUID` entry at `index`; index 0 is the nil GUID
    ///
    /// # Errors
    /// Returns an error if the heap is missing or the index is invalid
    pub fn guid(&self, index: u32) -> Result<uguid::Guid> {
        match (&self.guids, index) {
            (_, 0) => Ok(uguid::Guid::ZERO),
            (Some(guids), index) => guids.get(index as usize),
            (None, _) => Err(malformed_error!("Metadata has no #GUID heap")),
        }
    }
}
