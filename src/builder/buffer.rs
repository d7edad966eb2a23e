//! The build context that turns a [`ModuleImage`] into metadata streams.

use std::collections::HashSet;

use log::{debug, info};

use crate::{
    builder::{
        heaps::{BlobHeapBuffer, GuidHeapBuffer, HeapBuffer, StringHeapBuffer, UserStringHeapBuffer},
        layout::SegmentLayout,
        tablebuffer::{MemberKey, PendingBlob, TableStreamBuffer},
    },
    config::BuildOptions,
    metadata::{
        root::MetadataRoot,
        tables::{ColumnValue, HeapSizes, RowHandle},
        token::Token,
    },
    model::{
        GenericParameter, ModuleImage, SecurityDeclaration, StandAloneSignature, TypeDefOrRef,
    },
    Error, Result,
};

/// Everything [`MetadataBuffer::finish`] produces.
///
/// All fields are owned; nothing refers back into the buffer or the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataStreams {
    /// The complete metadata blob: root, stream directory and the five streams
    pub metadata: Vec<u8>,
    /// The `#~` stream
    pub tables: Vec<u8>,
    /// The `#Strings` heap, padded
    pub strings: Vec<u8>,
    /// The `#US` heap, padded
    pub user_strings: Vec<u8>,
    /// The `#GUID` heap
    pub guids: Vec<u8>,
    /// The `#Blob` heap, padded
    pub blobs: Vec<u8>,
    /// The managed resources segment; each embedded resource is a `u32` length and its data
    pub resources: Vec<u8>,
    /// Heap width flags written into the `#~` header
    pub heap_sizes: HeapSizes,
}

/// Build context for one [`ModuleImage`].
///
/// The buffer owns the four heap buffers and the [`TableStreamBuffer`]. [`MetadataBuffer::build`]
/// emits every record of the image; the token accessors let collaborators (an IL encoder, a PE
/// writer) look up or create tokens; [`MetadataBuffer::finish`] resolves the pending signatures,
/// places method bodies and field data and serializes the streams. After `finish` every
/// mutating call fails with [`Error::BufferFinished`].
///
/// # Examples
///
/// ```rust
/// use dotemit::builder::{MetadataBuffer, SequentialLayout};
/// use dotemit::model::*;
/// use dotemit::BuildOptions;
///
/// let mut image = ModuleImage::new("Hello.dll");
/// let program = image.add_type(TypeDefinition::new("Hello", "Program", TypeAttributes::PUBLIC, None));
///
/// let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
/// buffer.build()?;
/// assert_eq!(buffer.token_of(program)?.value(), 0x0200_0002);
///
/// let streams = buffer.finish(&mut SequentialLayout::new(0x2000))?;
/// assert_eq!(&streams.metadata[..4], b"BSJB");
/// assert!(buffer.user_string_token("late").is_err());
/// # Ok::<(), dotemit::Error>(())
/// ```
pub struct MetadataBuffer<'a> {
    pub(crate) image: &'a ModuleImage,
    pub(crate) options: BuildOptions,
    pub(crate) strings: StringHeapBuffer,
    pub(crate) blobs: BlobHeapBuffer,
    pub(crate) guids: GuidHeapBuffer,
    pub(crate) user_strings: UserStringHeapBuffer,
    pub(crate) tables: TableStreamBuffer,
    pub(crate) resources: Vec<u8>,
    /// Generic parameters waiting for the owner-ordered emission, keyed by coded owner
    pub(crate) generic_params: Vec<(u32, &'a GenericParameter)>,
    /// Security declarations waiting for the parent-ordered emission, keyed by coded parent
    pub(crate) security: Vec<(u32, &'a SecurityDeclaration)>,
    pub(crate) resolving: HashSet<MemberKey>,
    pub(crate) built: bool,
    finished: bool,
}

impl<'a> MetadataBuffer<'a> {
    /// Create an empty build context for `image`
    #[must_use]
    pub fn new(image: &'a ModuleImage, options: BuildOptions) -> Self {
        MetadataBuffer {
            image,
            options,
            strings: StringHeapBuffer::new(),
            blobs: BlobHeapBuffer::new(),
            guids: GuidHeapBuffer::new(),
            user_strings: UserStringHeapBuffer::new(),
            tables: TableStreamBuffer::new(),
            resources: Vec::new(),
            generic_params: Vec::new(),
            security: Vec::new(),
            resolving: HashSet::new(),
            built: false,
            finished: false,
        }
    }

    /// The image being built
    #[must_use]
    pub fn image(&self) -> &'a ModuleImage {
        self.image
    }

    /// The options of this build
    #[must_use]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// The table stream under construction
    #[must_use]
    pub fn tables(&self) -> &TableStreamBuffer {
        &self.tables
    }

    /// The `#Strings` heap under construction
    #[must_use]
    pub fn strings(&self) -> &StringHeapBuffer {
        &self.strings
    }

    /// The `#Blob` heap under construction
    #[must_use]
    pub fn blobs(&self) -> &BlobHeapBuffer {
        &self.blobs
    }

    /// The `#GUID` heap under construction
    #[must_use]
    pub fn guids(&self) -> &GuidHeapBuffer {
        &self.guids
    }

    /// The `#US` heap under construction
    #[must_use]
    pub fn user_strings(&self) -> &UserStringHeapBuffer {
        &self.user_strings
    }

    /// Whether [`MetadataBuffer::finish`] has run
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.finished {
            Err(Error::BufferFinished)
        } else {
            Ok(())
        }
    }

    /// Resolve every pending signature, place the inline segments with `layout` and serialize
    /// the metadata. Runs [`MetadataBuffer::build`] first if it has not run yet.
    ///
    /// The buffer is locked afterwards, also when this call fails.
    ///
    /// # Errors
    /// Returns [`Error::BufferFinished`] on a second call, and any error of the build, of
    /// signature resolution or of the layout.
    pub fn finish(&mut self, layout: &mut dyn SegmentLayout) -> Result<MetadataStreams> {
        self.ensure_open()?;
        let result = self.finish_streams(layout);
        self.finished = true;
        result
    }

    fn finish_streams(&mut self, layout: &mut dyn SegmentLayout) -> Result<MetadataStreams> {
        if !self.built {
            self.build()?;
        }

        let mut resolved = 0usize;
        while let Some(fixup) = self.tables.next_fixup() {
            let blob = self.encode_pending(fixup.blob)?;
            let offset = self.blobs.intern(&blob)?;
            self.tables
                .set_column(fixup.row, fixup.column, ColumnValue::U32(offset))?;
            resolved += 1;
        }
        debug!("resolved {resolved} pending signatures");

        self.tables.place_segments(layout)?;
        if self.options.sort_tables {
            self.tables.sort()?;
        }

        let heap_sizes = self.heap_sizes();
        let tables = self.tables.serialize(
            heap_sizes,
            self.options.tables_major_version,
            self.options.tables_minor_version,
        )?;
        let strings = self.strings.serialize();
        let user_strings = self.user_strings.serialize();
        let guids = self.guids.serialize();
        let blobs = self.blobs.serialize();

        let metadata = MetadataRoot::write(
            &self.options.version,
            &[
                ("#~", tables.as_slice()),
                (self.strings.name(), strings.as_slice()),
                (self.user_strings.name(), user_strings.as_slice()),
                (self.guids.name(), guids.as_slice()),
                (self.blobs.name(), blobs.as_slice()),
            ],
        )?;

        info!(
            "metadata of {}: {} bytes, {} tables, {} deduplicated rows, {} deduplicated heap entries",
            self.image.module.name,
            metadata.len(),
            self.tables.store().iter_present().count(),
            self.tables.dedup_hits(),
            self.strings.dedup_hits()
                + self.blobs.dedup_hits()
                + self.guids.dedup_hits()
                + self.user_strings.dedup_hits()
        );

        Ok(MetadataStreams {
            metadata,
            tables,
            strings,
            user_strings,
            guids,
            blobs,
            resources: std::mem::take(&mut self.resources),
            heap_sizes,
        })
    }

    fn heap_sizes(&self) -> HeapSizes {
        let large = self.options.large_heaps;
        let mut heap_sizes = HeapSizes::empty();
        if large || self.strings.is_large() {
            heap_sizes |= HeapSizes::LARGE_STRINGS;
        }
        if large || self.guids.is_large() {
            heap_sizes |= HeapSizes::LARGE_GUIDS;
        }
        if large || self.blobs.is_large() {
            heap_sizes |= HeapSizes::LARGE_BLOBS;
        }
        heap_sizes
    }

    fn encode_pending(&mut self, pending: PendingBlob) -> Result<Vec<u8>> {
        let image = self.image;
        let mut resolve = |ty: &TypeDefOrRef| -> Result<Token> { self.type_token(*ty) };

        match pending {
            PendingBlob::Field(handle) => image.field(handle)?.signature.to_blob(&mut resolve),
            PendingBlob::Method(handle) => image.method(handle)?.signature.to_blob(&mut resolve),
            PendingBlob::Property { owner, index } => image
                .type_def(owner)?
                .properties
                .get(index)
                .ok_or_else(|| Error::Precondition(format!("{owner} has no property {index}")))?
                .signature
                .to_blob(&mut resolve),
            PendingBlob::StandAloneSig(handle) => match image.standalone_sig(handle)? {
                StandAloneSignature::Locals(signature) => signature.to_blob(&mut resolve),
                StandAloneSignature::Method(signature) => signature.to_blob(&mut resolve),
            },
        }
    }
}

/// The row a token of this buffer was issued for
pub(crate) fn row_of(token: Token) -> Result<RowHandle> {
    let table = token
        .table_id()
        .ok_or_else(|| malformed_error!("{} does not name a table", token))?;
    let index = usize::try_from(token.row())
        .ok()
        .and_then(|rid| rid.checked_sub(1))
        .ok_or_else(|| malformed_error!("{} has no row id", token))?;
    Ok(RowHandle { table, index })
}
