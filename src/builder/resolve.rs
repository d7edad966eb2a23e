//! Token resolution for the records of a [`ModuleImage`](crate::model::ModuleImage).
//!
//! Definitions receive their tokens while [`MetadataBuffer::build`] runs and are only looked up
//! here. Reference records are turned into rows on first use: the candidate row is built from
//! freshly interned heap offsets and eagerly encoded signature blobs and then collapsed with an
//! equal row of the same table, if there is one.

use std::fmt;

use crate::{
    builder::{
        tablebuffer::{MemberKey, PendingBlob},
        MetadataBuffer,
    },
    metadata::{
        tables::{CodedIndexType, ColumnValue, MetadataRow, TableId},
        token::Token,
    },
    model::{
        AssemblyRefHandle, CustomAttribute, ExportedTypeHandle, FieldDefHandle, FileHandle,
        Implementation, MemberRefHandle, MemberRefParent, MemberRefSignature, MethodDefHandle,
        MethodDefOrRef, MethodSpecHandle, ModuleRefHandle, ResolutionScope, StandAloneSigHandle,
        TypeDefHandle, TypeDefOrRef, TypeRefHandle, TypeResolver, TypeSpecHandle,
    },
    Error, Result,
};

use ColumnValue::{U16, U32};

/// Records [`MetadataBuffer::token_of`] can issue or look up tokens for.
pub trait MetadataMember: Copy + fmt::Debug {
    /// The token of this record, creating its row if it is a reference not seen before.
    ///
    /// # Errors
    /// See [`MetadataBuffer::token_of`].
    fn resolve(self, buffer: &mut MetadataBuffer<'_>) -> Result<Token>;
}

macro_rules! member {
    ($handle:ty, |$member:ident, $buffer:ident| $body:expr) => {
        impl MetadataMember for $handle {
            fn resolve(self, $buffer: &mut MetadataBuffer<'_>) -> Result<Token> {
                let $member = self;
                $body
            }
        }
    };
}

member!(TypeDefHandle, |handle, buffer| buffer.type_def_token(handle));
member!(FieldDefHandle, |handle, buffer| buffer.field_token(handle));
member!(MethodDefHandle, |handle, buffer| buffer.method_def_token(handle));
member!(TypeRefHandle, |handle, buffer| buffer.type_ref_token(handle));
member!(TypeSpecHandle, |handle, buffer| buffer.type_spec_token(handle));
member!(MemberRefHandle, |handle, buffer| buffer.member_ref_token(handle));
member!(MethodSpecHandle, |handle, buffer| buffer.method_spec_token(handle));
member!(AssemblyRefHandle, |handle, buffer| buffer.assembly_ref_token(handle));
member!(ModuleRefHandle, |handle, buffer| buffer.module_ref_token(handle));
member!(FileHandle, |handle, buffer| buffer.file_token(handle));
member!(ExportedTypeHandle, |handle, buffer| buffer.exported_type_token(handle));
member!(StandAloneSigHandle, |handle, buffer| buffer.standalone_sig_token(handle));
member!(TypeDefOrRef, |ty, buffer| buffer.type_token(ty));
member!(MethodDefOrRef, |method, buffer| buffer.method_token(method));

impl MetadataBuffer<'_> {
    /// The token of `member`.
    ///
    /// Definitions must have been emitted by [`MetadataBuffer::build`]; references get a row on
    /// first use.
    ///
    /// # Errors
    /// - [`Error::BufferFinished`] after [`MetadataBuffer::finish`]
    /// - [`Error::MemberNotImported`] for a handle of another image
    /// - [`Error::Precondition`] for a definition that was not emitted yet
    pub fn token_of<M: MetadataMember>(&mut self, member: M) -> Result<Token> {
        self.ensure_open()?;
        member.resolve(self)
    }

    /// The token of a type usable in a `TypeDefOrRef` column.
    ///
    /// # Errors
    /// See [`MetadataBuffer::token_of`].
    pub fn type_token(&mut self, ty: TypeDefOrRef) -> Result<Token> {
        self.ensure_open()?;
        match ty {
            TypeDefOrRef::Definition(handle) => self.type_def_token(handle),
            TypeDefOrRef::Reference(handle) => self.type_ref_token(handle),
            TypeDefOrRef::Specification(handle) => self.type_spec_token(handle),
        }
    }

    /// The token of a method definition or method reference.
    ///
    /// # Errors
    /// See [`MetadataBuffer::token_of`].
    pub fn method_token(&mut self, method: MethodDefOrRef) -> Result<Token> {
        self.ensure_open()?;
        match method {
            MethodDefOrRef::Definition(handle) => self.method_def_token(handle),
            MethodDefOrRef::Reference(handle) => self.member_ref_token(handle),
        }
    }

    /// The token of a member reference, creating the `MemberRef` row on first use.
    ///
    /// # Errors
    /// See [`MetadataBuffer::token_of`].
    pub fn member_ref_token(&mut self, handle: MemberRefHandle) -> Result<Token> {
        self.ensure_open()?;
        let image = self.image;
        let reference = image.member_ref(handle)?;
        let key = MemberKey::MemberRef(handle);
        if let Some(token) = self.tables.member(key) {
            return Ok(token);
        }

        self.guarded(key, |buffer| {
            let parent = match reference.parent {
                MemberRefParent::Type(ty) => buffer.type_token(ty)?,
                MemberRefParent::Method(method) => buffer.method_def_token(method)?,
                MemberRefParent::ModuleRef(module) => buffer.module_ref_token(module)?,
            };
            let signature = match &reference.signature {
                MemberRefSignature::Field(signature) => {
                    buffer.signature_blob(|resolve| signature.to_blob(resolve))?
                }
                MemberRefSignature::Method(signature) => {
                    buffer.signature_blob(|resolve| signature.to_blob(resolve))?
                }
            };

            let row = MetadataRow::from([
                U32(CodedIndexType::MemberRefParent.encode(parent)?),
                U32(buffer.strings.intern(&reference.name)?),
                U32(signature),
            ]);
            buffer.intern_reference(key, TableId::MemberRef, row, &reference.custom_attributes)
        })
    }

    /// The token of a generic method instantiation, creating the `MethodSpec` row on first use.
    ///
    /// # Errors
    /// See [`MetadataBuffer::token_of`].
    pub fn method_spec_token(&mut self, handle: MethodSpecHandle) -> Result<Token> {
        self.ensure_open()?;
        let image = self.image;
        let specification = image.method_spec(handle)?;
        let key = MemberKey::MethodSpec(handle);
        if let Some(token) = self.tables.member(key) {
            return Ok(token);
        }

        self.guarded(key, |buffer| {
            let method = buffer.method_token(specification.method)?;
            let instantiation =
                buffer.signature_blob(|resolve| specification.instantiation.to_blob(resolve))?;

            let row = MetadataRow::from([
                U32(CodedIndexType::MethodDefOrRef.encode(method)?),
                U32(instantiation),
            ]);
            buffer.intern_reference(
                key,
                TableId::MethodSpec,
                row,
                &specification.custom_attributes,
            )
        })
    }

    /// The token of a standalone signature.
    ///
    /// The row is created on first use; its blob is encoded when the buffer finishes.
    ///
    /// # Errors
    /// See [`MetadataBuffer::token_of`].
    pub fn standalone_sig_token(&mut self, handle: StandAloneSigHandle) -> Result<Token> {
        self.ensure_open()?;
        self.image.standalone_sig(handle)?;
        let key = MemberKey::StandAloneSig(handle);
        if let Some(token) = self.tables.member(key) {
            return Ok(token);
        }

        let row = self
            .tables
            .push(TableId::StandAloneSig, MetadataRow::from([U32(0)]))?;
        let token = row.token()?;
        self.tables.bind(key, token);
        self.tables
            .defer_blob(row, 0, PendingBlob::StandAloneSig(handle));
        Ok(token)
    }

    /// The `ldstr` token of the string literal `value`.
    ///
    /// # Errors
    /// Returns [`Error::BufferFinished`] after [`MetadataBuffer::finish`], and
    /// [`Error::Precondition`] once the `#US` heap outgrows the 24-bit token range.
    pub fn user_string_token(&mut self, value: &str) -> Result<Token> {
        self.ensure_open()?;
        let offset = self.user_strings.intern(value)?;
        if offset > 0x00FF_FFFF {
            return Err(Error::Precondition(format!(
                "#US offset 0x{offset:x} does not fit into a token"
            )));
        }
        Ok(Token::new(0x7000_0000 | offset))
    }

    pub(crate) fn type_def_token(&self, handle: TypeDefHandle) -> Result<Token> {
        self.image.type_def(handle)?;
        self.definition(MemberKey::TypeDef(handle), &handle)
    }

    pub(crate) fn field_token(&self, handle: FieldDefHandle) -> Result<Token> {
        self.image.field(handle)?;
        self.definition(MemberKey::Field(handle), &handle)
    }

    pub(crate) fn method_def_token(&self, handle: MethodDefHandle) -> Result<Token> {
        self.image.method(handle)?;
        self.definition(MemberKey::Method(handle), &handle)
    }

    fn definition(&self, key: MemberKey, handle: &dyn fmt::Display) -> Result<Token> {
        self.tables.member(key).ok_or_else(|| {
            Error::Precondition(format!("{handle} has not been emitted yet; build first"))
        })
    }

    pub(crate) fn type_ref_token(&mut self, handle: TypeRefHandle) -> Result<Token> {
        let image = self.image;
        let reference = image.type_ref(handle)?;
        let key = MemberKey::TypeRef(handle);
        if let Some(token) = self.tables.member(key) {
            return Ok(token);
        }

        self.guarded(key, |buffer| {
            let scope = match reference.scope {
                ResolutionScope::Module => buffer
                    .tables
                    .member(MemberKey::Module)
                    .ok_or_else(|| Error::Precondition("The module row was not emitted yet".into()))?,
                ResolutionScope::ModuleRef(module) => buffer.module_ref_token(module)?,
                ResolutionScope::AssemblyRef(assembly) => buffer.assembly_ref_token(assembly)?,
                ResolutionScope::TypeRef(enclosing) => buffer.type_ref_token(enclosing)?,
            };

            let row = MetadataRow::from([
                U32(CodedIndexType::ResolutionScope.encode(scope)?),
                U32(buffer.strings.intern(&reference.name)?),
                U32(buffer.strings.intern(&reference.namespace)?),
            ]);
            buffer.intern_reference(key, TableId::TypeRef, row, &reference.custom_attributes)
        })
    }

    pub(crate) fn type_spec_token(&mut self, handle: TypeSpecHandle) -> Result<Token> {
        let image = self.image;
        let specification = image.type_spec(handle)?;
        let key = MemberKey::TypeSpec(handle);
        if let Some(token) = self.tables.member(key) {
            return Ok(token);
        }

        self.guarded(key, |buffer| {
            let signature =
                buffer.signature_blob(|resolve| specification.signature.to_blob(resolve))?;
            let row = MetadataRow::from([U32(signature)]);
            buffer.intern_reference(key, TableId::TypeSpec, row, &specification.custom_attributes)
        })
    }

    pub(crate) fn assembly_ref_token(&mut self, handle: AssemblyRefHandle) -> Result<Token> {
        let image = self.image;
        let reference = image.assembly_ref(handle)?;
        let key = MemberKey::AssemblyRef(handle);
        if let Some(token) = self.tables.member(key) {
            return Ok(token);
        }

        let version = reference.version;
        let row = MetadataRow::from([
            U16(version.major),
            U16(version.minor),
            U16(version.build),
            U16(version.revision),
            U32(reference.flags.bits()),
            U32(self.blobs.intern_opt(reference.public_key_or_token.as_deref())?),
            U32(self.strings.intern(&reference.name)?),
            U32(self.culture(reference.culture.as_deref())?),
            U32(self.blobs.intern_opt(reference.hash_value.as_deref())?),
        ]);

        let (token, created) = self.tables.intern_reference(key, TableId::AssemblyRef, row)?;
        if created {
            for processor in &reference.processors {
                self.tables.push(
                    TableId::AssemblyRefProcessor,
                    MetadataRow::from([U32(*processor), U32(token.row())]),
                )?;
            }
            for os in &reference.operating_systems {
                self.tables.push(
                    TableId::AssemblyRefOS,
                    MetadataRow::from([
                        U32(os.platform_id),
                        U32(os.major_version),
                        U32(os.minor_version),
                        U32(token.row()),
                    ]),
                )?;
            }
        }
        self.emit_custom_attributes(token, &reference.custom_attributes)?;
        Ok(token)
    }

    pub(crate) fn module_ref_token(&mut self, handle: ModuleRefHandle) -> Result<Token> {
        let image = self.image;
        let reference = image.module_ref(handle)?;
        let key = MemberKey::ModuleRef(handle);
        if let Some(token) = self.tables.member(key) {
            return Ok(token);
        }

        let row = MetadataRow::from([U32(self.strings.intern(&reference.name)?)]);
        self.intern_reference(key, TableId::ModuleRef, row, &reference.custom_attributes)
    }

    pub(crate) fn file_token(&mut self, handle: FileHandle) -> Result<Token> {
        let image = self.image;
        let file = image.file(handle)?;
        let key = MemberKey::File(handle);
        if let Some(token) = self.tables.member(key) {
            return Ok(token);
        }

        let row = MetadataRow::from([
            U32(file.flags.bits()),
            U32(self.strings.intern(&file.name)?),
            U32(self.blobs.intern_opt(file.hash_value.as_deref())?),
        ]);
        let token = self.tables.push_token(TableId::File, row)?;
        self.tables.bind(key, token);
        self.emit_custom_attributes(token, &file.custom_attributes)?;
        Ok(token)
    }

    pub(crate) fn exported_type_token(&mut self, handle: ExportedTypeHandle) -> Result<Token> {
        let image = self.image;
        let exported = image.exported_type(handle)?;
        let key = MemberKey::ExportedType(handle);
        if let Some(token) = self.tables.member(key) {
            return Ok(token);
        }

        self.guarded(key, |buffer| {
            let implementation = buffer.implementation_token(exported.implementation)?;
            let row = MetadataRow::from([
                U32(exported.flags.bits()),
                U32(exported.type_def_id),
                U32(buffer.strings.intern(&exported.name)?),
                U32(buffer.strings.intern(&exported.namespace)?),
                U32(CodedIndexType::Implementation.encode(implementation)?),
            ]);
            let token = buffer.tables.push_token(TableId::ExportedType, row)?;
            buffer.tables.bind(key, token);
            buffer.emit_custom_attributes(token, &exported.custom_attributes)?;
            Ok(token)
        })
    }

    pub(crate) fn implementation_token(&mut self, implementation: Implementation) -> Result<Token> {
        match implementation {
            Implementation::File(file) => self.file_token(file),
            Implementation::AssemblyRef(assembly) => self.assembly_ref_token(assembly),
            Implementation::ExportedType(exported) => self.exported_type_token(exported),
        }
    }

    /// Collapse `row` into an equal row of `table` or append it. Only the record that creates
    /// the row attaches its attributes.
    fn intern_reference(
        &mut self,
        key: MemberKey,
        table: TableId,
        row: MetadataRow,
        custom_attributes: &[CustomAttribute],
    ) -> Result<Token> {
        let (token, inserted) = self.tables.intern_reference(key, table, row)?;
        if inserted {
            self.emit_custom_attributes(token, custom_attributes)?;
        }
        Ok(token)
    }

    /// Encode a signature with this buffer resolving its types, and intern the result
    pub(crate) fn signature_blob(
        &mut self,
        encode: impl FnOnce(&mut TypeResolver<'_>) -> Result<Vec<u8>>,
    ) -> Result<u32> {
        let blob = encode(&mut |ty: &TypeDefOrRef| self.type_token(*ty))?;
        self.blobs.intern(&blob)
    }

    /// `#Strings` offset of a culture name; neutral maps to 0
    pub(crate) fn culture(&mut self, culture: Option<&str>) -> Result<u32> {
        match culture {
            None => Ok(0),
            Some(name) if name.eq_ignore_ascii_case("neutral") => Ok(0),
            Some(name) => self.strings.intern(name),
        }
    }

    /// Run `resolve` with `key` marked as in progress, so that a reference reaching itself
    /// through its own scope or signature is reported instead of recursing forever
    fn guarded(
        &mut self,
        key: MemberKey,
        resolve: impl FnOnce(&mut Self) -> Result<Token>,
    ) -> Result<Token> {
        if !self.resolving.insert(key) {
            return Err(Error::Precondition(format!("{key:?} refers to itself")));
        }
        let result = resolve(self);
        self.resolving.remove(&key);
        result
    }
}
