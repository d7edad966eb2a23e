//! Finishing a buffer: pending signatures, segment placement, heap widths and the lock that
//! follows.

use dotemit::{metadata::streams::TablesStream, prelude::*};

/// Records every placement and answers with consecutive fake RVAs.
#[derive(Default)]
struct RecordingLayout {
    methods: Vec<(Token, Vec<u8>)>,
    fields: Vec<(Token, Vec<u8>)>,
}

impl SegmentLayout for RecordingLayout {
    fn place_method_body(&mut self, method: Token, body: &[u8]) -> Result<u32> {
        self.methods.push((method, body.to_vec()));
        Ok(0x1000 * u32::try_from(self.methods.len()).unwrap_or(0))
    }

    fn place_field_data(&mut self, field: Token, data: &[u8]) -> Result<u32> {
        self.fields.push((field, data.to_vec()));
        Ok(0x8000)
    }
}

/// Fails on the first method body.
struct FullLayout;

impl SegmentLayout for FullLayout {
    fn place_method_body(&mut self, method: Token, _body: &[u8]) -> Result<u32> {
        Err(Error::Precondition(format!("no room for {method}")))
    }

    fn place_field_data(&mut self, field: Token, _data: &[u8]) -> Result<u32> {
        Err(Error::Precondition(format!("no room for {field}")))
    }
}

fn image_with_bodies() -> Result<ModuleImage> {
    let mut image = ModuleImage::new("Bodies.dll");
    let ty = image.add_type(TypeDefinition::new("B", "Bodies", TypeAttributes::PUBLIC, None));
    for (name, body) in [("First", vec![0x0A, 0x2A]), ("Second", vec![0x0E, 0x00, 0x2A])] {
        let mut method = MethodDefinition::new(
            name,
            MethodAttributes::PUBLIC | MethodAttributes::STATIC,
            MethodSignature::new(TypeSig::Void, vec![]),
        );
        method.body = Some(body);
        image.add_method(ty, method)?;
    }
    let mut data = FieldDefinition::new(
        "Data",
        FieldAttributes::STATIC | FieldAttributes::HAS_FIELD_RVA,
        FieldSignature::new(TypeSig::I8),
    );
    data.initial_value = Some(vec![0xFF; 8]);
    image.add_field(ty, data)?;
    Ok(image)
}

/// The layout sees every body with its token and its RVAs end up in the rows.
#[test]
fn segments_go_through_the_layout() -> Result<()> {
    let image = image_with_bodies()?;
    let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
    let mut layout = RecordingLayout::default();
    let streams = buffer.finish(&mut layout)?;

    assert_eq!(
        layout.methods,
        [
            (Token::new(0x0600_0001), vec![0x0A, 0x2A]),
            (Token::new(0x0600_0002), vec![0x0E, 0x00, 0x2A]),
        ]
    );
    assert_eq!(layout.fields, [(Token::new(0x0400_0001), vec![0xFF; 8])]);

    let view = MetadataView::from_bytes(&streams.metadata)?;
    let methods = view.tables.tables.rows(TableId::MethodDef);
    assert_eq!((methods[0].value(0), methods[1].value(0)), (0x1000, 0x2000));
    assert_eq!(view.tables.tables.rows(TableId::FieldRVA)[0].value(0), 0x8000);
    Ok(())
}

/// A failing finish still locks the buffer.
#[test]
fn failed_finish_locks() -> Result<()> {
    let image = image_with_bodies()?;
    let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());

    assert!(matches!(buffer.finish(&mut FullLayout), Err(Error::Precondition(_))));
    assert!(buffer.is_finished());
    assert!(matches!(
        buffer.finish(&mut SequentialLayout::new(0x2000)),
        Err(Error::BufferFinished)
    ));
    Ok(())
}

/// Every mutating entry point refuses to work on a finished buffer; reads stay available.
#[test]
fn finished_buffer_is_locked() -> Result<()> {
    let mut image = ModuleImage::new("Locked.dll");
    let ty = image.add_type(TypeDefinition::new("L", "Locked", TypeAttributes::PUBLIC, None));
    let corlib = image.add_assembly_ref(AssemblyReference::new("mscorlib", Version::new(4, 0, 0, 0)));
    let sig = image.add_standalone_sig(StandAloneSignature::Locals(LocalVariablesSignature {
        locals: vec![TypeSig::I4],
    }));

    let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
    let hello = buffer.user_string_token("Hello")?;
    buffer.finish(&mut SequentialLayout::new(0x2000))?;

    assert!(matches!(buffer.build(), Err(Error::BufferFinished)));
    assert!(matches!(buffer.user_string_token("Hello"), Err(Error::BufferFinished)));
    assert!(matches!(buffer.token_of(ty), Err(Error::BufferFinished)));
    assert!(matches!(buffer.token_of(corlib), Err(Error::BufferFinished)));
    assert!(matches!(buffer.standalone_sig_token(sig), Err(Error::BufferFinished)));
    assert!(matches!(
        buffer.type_token(TypeDefOrRef::Definition(ty)),
        Err(Error::BufferFinished)
    ));

    assert_eq!(hello, Token::new(0x7000_0001));
    assert_eq!(buffer.tables().store().row_count(TableId::TypeDef), 2);
    assert!(buffer.strings().len() > 1);
    Ok(())
}

/// Literal tokens are `#US` offsets tagged 0x70; equal literals share one entry.
#[test]
fn user_string_tokens() -> Result<()> {
    let image = ModuleImage::new("Strings.dll");
    let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());

    let hello = buffer.user_string_token("Hello")?;
    let again = buffer.user_string_token("Hello")?;
    let empty = buffer.user_string_token("")?;
    let accent = buffer.user_string_token("café\u{7F}")?;

    assert_eq!(hello, again);
    assert_eq!(hello.table(), 0x70);
    assert_eq!(hello.row(), 1);
    // "Hello": length byte, 10 bytes of UTF-16, flag byte
    assert_eq!(empty.row(), 1 + 1 + 11);
    assert_ne!(accent, empty);
    assert_eq!(buffer.user_strings().dedup_hits(), 1);

    let streams = buffer.finish(&mut SequentialLayout::new(0x2000))?;
    let view = MetadataView::from_bytes(&streams.metadata)?;
    let heap = view.user_strings.ok_or(Error::Empty)?;

    let hello = heap.get(hello.row() as usize)?;
    assert_eq!(hello.value.to_string_lossy(), "Hello");
    assert_eq!(hello.flag, 0);
    assert_eq!(heap.get(empty.row() as usize)?.value.len(), 0);

    let accent = heap.get(accent.row() as usize)?;
    assert_eq!(accent.value.to_string_lossy(), "café\u{7F}");
    assert_eq!(accent.flag, 1);
    Ok(())
}

/// A signature created on demand can reference a definition; its blob is written once every
/// definition has a token.
#[test]
fn standalone_signatures_resolve_late() -> Result<()> {
    let mut image = ModuleImage::new("Locals.dll");
    let ty = image.add_type(TypeDefinition::new("L", "Local", TypeAttributes::PUBLIC, None));
    let locals = image.add_standalone_sig(StandAloneSignature::Locals(LocalVariablesSignature {
        locals: vec![TypeSig::Class(TypeDefOrRef::Definition(ty)), TypeSig::I4],
    }));
    let calli = image.add_standalone_sig(StandAloneSignature::Method(MethodSignature::new(
        TypeSig::I4,
        vec![TypeSig::I4],
    )));

    let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
    assert_eq!(buffer.standalone_sig_token(calli)?, Token::new(0x1100_0001));
    buffer.build()?;
    assert_eq!(buffer.token_of(locals)?, Token::new(0x1100_0002));
    assert_eq!(buffer.token_of(calli)?, Token::new(0x1100_0001));

    let streams = buffer.finish(&mut SequentialLayout::new(0x2000))?;
    let view = MetadataView::from_bytes(&streams.metadata)?;
    let rows = view.tables.tables.rows(TableId::StandAloneSig);

    assert_eq!(view.blob(rows[0].value(0))?, [0x00, 0x01, ELEMENT_TYPE::I4, ELEMENT_TYPE::I4]);
    assert_eq!(
        view.blob(rows[1].value(0))?,
        [0x07, 0x02, ELEMENT_TYPE::CLASS, 2 << 2, ELEMENT_TYPE::I4]
    );
    Ok(())
}

/// Resolving a reference whose encoding needs another reference interns both blobs, the
/// inner one first, and neither row is duplicated by the later build pass.
#[test]
fn nested_blobs_reach_a_fixed_point() -> Result<()> {
    let mut image = ModuleImage::new("Nested.dll");
    let corlib = image.add_assembly_ref(AssemblyReference::new("mscorlib", Version::new(4, 0, 0, 0)));
    let dictionary = image.add_type_ref(TypeReference::new(
        ResolutionScope::AssemblyRef(corlib),
        "System.Collections.Generic",
        "Dictionary`2",
    ));
    let list = image.add_type_ref(TypeReference::new(
        ResolutionScope::AssemblyRef(corlib),
        "System.Collections.Generic",
        "List`1",
    ));
    let list_of_string = image.add_type_spec(TypeSpecification::new(TypeSig::GenericInst {
        generic: TypeDefOrRef::Reference(list),
        value_type: false,
        arguments: vec![TypeSig::String],
    }));
    let map = image.add_type_spec(TypeSpecification::new(TypeSig::GenericInst {
        generic: TypeDefOrRef::Reference(dictionary),
        value_type: false,
        arguments: vec![TypeSig::String, TypeSig::Class(TypeDefOrRef::Specification(list_of_string))],
    }));
    let ctor = image.add_member_ref(MemberReference::method(
        MemberRefParent::Type(TypeDefOrRef::Specification(map)),
        ".ctor",
        MethodSignature::new(TypeSig::Void, vec![]).instance(),
    ));

    let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
    assert_eq!(buffer.token_of(ctor)?, Token::new(0x0A00_0001));
    assert_eq!(buffer.token_of(list_of_string)?, Token::new(0x1B00_0001));
    assert_eq!(buffer.token_of(map)?, Token::new(0x1B00_0002));

    let streams = buffer.finish(&mut SequentialLayout::new(0x2000))?;
    let view = MetadataView::from_bytes(&streams.metadata)?;
    let tables = &view.tables.tables;
    assert_eq!(view.tables.row_count(TableId::TypeSpec), 2);
    assert_eq!(view.tables.row_count(TableId::MemberRef), 1);
    assert_eq!(view.tables.row_count(TableId::TypeRef), 2);

    let specs = tables.rows(TableId::TypeSpec);
    assert!(specs[0].value(0) < specs[1].value(0));
    assert_eq!(
        view.blob(specs[1].value(0))?,
        [
            ELEMENT_TYPE::GENERICINST,
            ELEMENT_TYPE::CLASS,
            (1 << 2) | 1,
            2,
            ELEMENT_TYPE::STRING,
            ELEMENT_TYPE::CLASS,
            (1 << 2) | 2,
        ]
    );

    // Interning the same content again must hand out the same offsets
    let heap = view.blobs.as_ref().ok_or(Error::Empty)?;
    let blobs = heap
        .iter()
        .map(|entry| entry.map(|(_, blob)| blob))
        .collect::<Result<Vec<_>>>()?;
    let mut unique = blobs.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), blobs.len());
    Ok(())
}

/// Forcing large heaps widens every heap column.
#[test]
fn large_heaps_option() -> Result<()> {
    let mut image = ModuleImage::new("Wide.dll");
    image.add_type(TypeDefinition::new("W", "Wide", TypeAttributes::PUBLIC, None));

    let small = {
        let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
        buffer.finish(&mut SequentialLayout::new(0x2000))?
    };
    let wide = {
        let mut buffer = MetadataBuffer::new(&image, BuildOptions::default().with_large_heaps(true));
        buffer.finish(&mut SequentialLayout::new(0x2000))?
    };

    assert_eq!(small.heap_sizes, HeapSizes::empty());
    assert_eq!(
        wide.heap_sizes,
        HeapSizes::LARGE_STRINGS | HeapSizes::LARGE_GUIDS | HeapSizes::LARGE_BLOBS
    );

    let small_tables = TablesStream::read(&small.tables)?;
    let wide_tables = TablesStream::read(&wide.tables)?;
    assert_eq!(small_tables.info.str_bytes(), 2);
    assert_eq!(wide_tables.info.str_bytes(), 4);
    assert_eq!(wide_tables.info.blob_bytes(), 4);
    assert_eq!(wide_tables.info.guid_bytes(), 4);
    // Module row: generation, name, mvid, encid, encbaseid
    assert_eq!(wide_tables.info.row_size(TableId::Module), 2 + 4 * 4);
    assert_eq!(small_tables.row_count(TableId::TypeDef), wide_tables.row_count(TableId::TypeDef));
    Ok(())
}

/// A heap past 0xFFFF bytes switches its index width on its own.
#[test]
fn heap_width_follows_size() -> Result<()> {
    let mut image = ModuleImage::new("Big.dll");
    let ty = image.add_type(TypeDefinition::new("B", "Big", TypeAttributes::PUBLIC, None));
    let mut field = FieldDefinition::new(
        "Blob",
        FieldAttributes::STATIC | FieldAttributes::LITERAL,
        FieldSignature::new(TypeSig::String),
    );
    field.constant = Some(Constant::string(&"x".repeat(0x8000)));
    image.add_field(ty, field)?;

    let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
    let streams = buffer.finish(&mut SequentialLayout::new(0x2000))?;

    assert_eq!(streams.heap_sizes, HeapSizes::LARGE_BLOBS);
    let view = MetadataView::from_bytes(&streams.metadata)?;
    assert_eq!(view.tables.info.blob_bytes(), 4);
    assert_eq!(view.tables.info.str_bytes(), 2);

    let constant = &view.tables.tables.rows(TableId::Constant)[0];
    assert_eq!(view.blob(constant.value(3))?.len(), 0x10000);
    Ok(())
}

/// 0x3FFF type references still fit a 2-byte `TypeDefOrRef` column; one more widens it.
#[test]
fn coded_index_width_boundary() -> Result<()> {
    let width = |count: usize| -> Result<(usize, usize)> {
        let mut image = ModuleImage::new("Refs.dll");
        let corlib = image.add_assembly_ref(AssemblyReference::new("mscorlib", Version::new(4, 0, 0, 0)));
        for index in 0..count {
            image.add_type_ref(TypeReference::new(
                ResolutionScope::AssemblyRef(corlib),
                "N",
                format!("T{index}"),
            ));
        }
        let mut buffer = MetadataBuffer::new(&image, BuildOptions::default());
        let streams = buffer.finish(&mut SequentialLayout::new(0x2000))?;
        let view = MetadataView::from_bytes(&streams.metadata)?;
        Ok((
            view.tables.info.coded_index_bytes(CodedIndexType::TypeDefOrRef),
            view.tables.info.coded_index_bytes(CodedIndexType::MemberRefParent),
        ))
    };

    // TypeDefOrRef spends 2 tag bits, MemberRefParent 3
    assert_eq!(width(0x0FFF)?, (2, 2));
    assert_eq!(width(0x2000)?, (2, 4));
    assert_eq!(width(0x3FFF)?, (2, 4));
    assert_eq!(width(0x4000)?, (4, 4));
    Ok(())
}
