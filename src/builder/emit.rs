//! Emission of the definition rows.
//!
//! Types are emitted in two passes. The stub pass appends the `TypeDef`, `Field`, `MethodDef`
//! and `Param` rows of every type with placeholder columns, so that each definition owns a token
//! before anything refers to it. The finalize pass then fills in base types and writes all rows
//! that point at definitions: constants, layouts, marshalling, P/Invoke maps, nested classes,
//! interfaces, overrides, properties, events and custom attributes. Generic parameters and
//! security declarations are collected and appended last, ordered by their owner.

use log::debug;

use crate::{
    builder::{
        buffer::row_of,
        tablebuffer::{MemberKey, PendingBlob},
        MetadataBuffer,
    },
    metadata::{
        tables::{CodedIndexType, ColumnValue, MetadataRow, TableId},
        token::Token,
    },
    model::{
        AssemblyDefinition, AssemblyFlags, Constant, CustomAttribute, EventDefinition,
        FieldDefHandle, GenericParameter, Implementation, ManifestResource, MethodDefHandle,
        MethodSemanticsAttributes, PInvokeMap, PropertyDefinition, SecurityDeclaration,
        TypeDefHandle, TypeDefinition,
    },
    utils::{align_to, to_u32},
    Error, Result,
};

use ColumnValue::{Raw, U16, U32, U8};

impl<'a> MetadataBuffer<'a> {
    /// Emit every record of the image.
    ///
    /// Runs the module row, the two type passes, module attributes, the assembly manifest,
    /// all references of the image, files, exported types and manifest resources, then the
    /// owner-ordered generic parameters and security declarations. Signature blobs of
    /// definitions stay pending until [`MetadataBuffer::finish`].
    ///
    /// # Errors
    /// Returns [`Error::BufferFinished`] after `finish`, [`Error::Precondition`] on a second
    /// call and any resolution error of the records.
    pub fn build(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.built {
            return Err(Error::Precondition("The metadata was already built".into()));
        }
        self.built = true;

        let image = self.image;
        let module = self.emit_module()?;

        for (handle, ty) in image.types() {
            self.emit_type_stub(handle, ty)?;
        }
        for (handle, ty) in image.types() {
            self.finalize_type(handle, ty)?;
        }
        self.emit_custom_attributes(module, &image.module.custom_attributes)?;

        if let Some(assembly) = &image.assembly {
            self.emit_assembly(assembly)?;
        }

        for (handle, _) in image.assembly_refs() {
            self.assembly_ref_token(handle)?;
        }
        for (handle, _) in image.module_refs() {
            self.module_ref_token(handle)?;
        }
        for (handle, _) in image.type_refs() {
            self.type_ref_token(handle)?;
        }
        for (handle, _) in image.type_specs() {
            self.type_spec_token(handle)?;
        }
        for (handle, _) in image.member_refs() {
            self.member_ref_token(handle)?;
        }
        for (handle, _) in image.method_specs() {
            self.method_spec_token(handle)?;
        }
        for (handle, _) in image.standalone_sigs() {
            self.standalone_sig_token(handle)?;
        }
        for (handle, _) in image.files() {
            self.file_token(handle)?;
        }
        for (handle, _) in image.exported_types() {
            self.exported_type_token(handle)?;
        }
        for resource in &image.resources {
            self.emit_resource(resource)?;
        }

        self.flush_generic_params()?;
        self.flush_security()?;

        debug!(
            "built {}: {} types, {} fields, {} methods, {} reference rows shared",
            image.module.name,
            self.tables.store().row_count(TableId::TypeDef),
            self.tables.store().row_count(TableId::Field),
            self.tables.store().row_count(TableId::MethodDef),
            self.tables.dedup_hits()
        );
        Ok(())
    }

    fn emit_module(&mut self) -> Result<Token> {
        let image = self.image;
        let module = &image.module;
        let row = MetadataRow::from([
            U16(module.generation),
            U32(self.strings.intern(&module.name)?),
            U32(self.guids.intern(module.mvid)?),
            U32(self.guids.intern_opt(module.enc_id)?),
            U32(self.guids.intern_opt(module.enc_base_id)?),
        ]);
        let token = self.tables.push_token(TableId::Module, row)?;
        self.tables.bind(MemberKey::Module, token);
        Ok(token)
    }

    fn emit_type_stub(&mut self, handle: TypeDefHandle, ty: &'a TypeDefinition) -> Result<()> {
        let row = MetadataRow::from([
            U32(ty.attributes.bits()),
            U32(self.strings.intern(&ty.name)?),
            U32(self.strings.intern(&ty.namespace)?),
            U32(0),
            U32(self.tables.next_rid(TableId::Field)),
            U32(self.tables.next_rid(TableId::MethodDef)),
        ]);
        let token = self.tables.push_token(TableId::TypeDef, row)?;
        self.tables.bind(MemberKey::TypeDef(handle), token);

        let image = self.image;
        for field in ty.fields() {
            let definition = image.field(*field)?;
            let row = MetadataRow::from([
                U16(definition.attributes.bits()),
                U32(self.strings.intern(&definition.name)?),
                U32(0),
            ]);
            let token = self.tables.push_token(TableId::Field, row)?;
            self.tables.bind(MemberKey::Field(*field), token);
        }

        for method in ty.methods() {
            let definition = image.method(*method)?;
            let row = MetadataRow::from([
                definition.body.clone().map_or(U32(0), Raw),
                U16(definition.impl_attributes.bits()),
                U16(definition.attributes.bits()),
                U32(self.strings.intern(&definition.name)?),
                U32(0),
                U32(self.tables.next_rid(TableId::Param)),
            ]);
            let token = self.tables.push_token(TableId::MethodDef, row)?;
            self.tables.bind(MemberKey::Method(*method), token);

            for (index, parameter) in definition.parameters.iter().enumerate() {
                let row = MetadataRow::from([
                    U16(parameter.attributes.bits()),
                    U16(parameter.sequence),
                    U32(self.strings.intern_opt(parameter.name.as_deref())?),
                ]);
                let token = self.tables.push_token(TableId::Param, row)?;
                self.tables.bind(MemberKey::Param(*method, index), token);
            }
        }

        Ok(())
    }

    fn finalize_type(&mut self, handle: TypeDefHandle, ty: &'a TypeDefinition) -> Result<()> {
        let token = self.type_def_token(handle)?;

        if let Some(base) = ty.base_type {
            let base = self.type_token(base)?;
            self.tables.set_column(
                row_of(token)?,
                3,
                U32(CodedIndexType::TypeDefOrRef.encode(base)?),
            )?;
        }

        for field in ty.fields() {
            self.finalize_field(*field)?;
        }
        for method in ty.methods() {
            self.finalize_method(*method)?;
        }

        if let Some(enclosing) = ty.declaring_type {
            let enclosing = self.type_def_token(enclosing)?;
            self.tables.push(
                TableId::NestedClass,
                MetadataRow::from([U32(token.row()), U32(enclosing.row())]),
            )?;
        }

        for interface in &ty.interfaces {
            let implemented = self.type_token(interface.interface)?;
            let row = MetadataRow::from([
                U32(token.row()),
                U32(CodedIndexType::TypeDefOrRef.encode(implemented)?),
            ]);
            let implementation = self.tables.push_token(TableId::InterfaceImpl, row)?;
            self.emit_custom_attributes(implementation, &interface.custom_attributes)?;
        }

        for method_impl in &ty.method_impls {
            let body = self.method_token(method_impl.body)?;
            let declaration = self.method_token(method_impl.declaration)?;
            self.tables.push(
                TableId::MethodImpl,
                MetadataRow::from([
                    U32(token.row()),
                    U32(CodedIndexType::MethodDefOrRef.encode(body)?),
                    U32(CodedIndexType::MethodDefOrRef.encode(declaration)?),
                ]),
            )?;
        }

        if let Some(layout) = ty.class_layout {
            self.tables.push(
                TableId::ClassLayout,
                MetadataRow::from([
                    U16(layout.packing_size),
                    U32(layout.class_size),
                    U32(token.row()),
                ]),
            )?;
        }

        if !ty.properties.is_empty() {
            self.tables.push(
                TableId::PropertyMap,
                MetadataRow::from([U32(token.row()), U32(self.tables.next_rid(TableId::Property))]),
            )?;
            for (index, property) in ty.properties.iter().enumerate() {
                self.emit_property(handle, index, property)?;
            }
        }

        if !ty.events.is_empty() {
            self.tables.push(
                TableId::EventMap,
                MetadataRow::from([U32(token.row()), U32(self.tables.next_rid(TableId::Event))]),
            )?;
            for event in &ty.events {
                self.emit_event(event)?;
            }
        }

        let owner = CodedIndexType::TypeOrMethodDef.encode(token)?;
        self.generic_params
            .extend(ty.generic_parameters.iter().map(|parameter| (owner, parameter)));

        self.emit_custom_attributes(token, &ty.custom_attributes)?;
        self.queue_security(token, &ty.security_declarations)
    }

    fn finalize_field(&mut self, handle: FieldDefHandle) -> Result<()> {
        let image = self.image;
        let field = image.field(handle)?;
        let token = self.field_token(handle)?;
        self.tables
            .defer_blob(row_of(token)?, 2, PendingBlob::Field(handle));

        if let Some(constant) = &field.constant {
            self.emit_constant(token, constant)?;
        }
        if let Some(offset) = field.offset {
            self.tables.push(
                TableId::FieldLayout,
                MetadataRow::from([U32(offset), U32(token.row())]),
            )?;
        }
        if let Some(marshal) = &field.marshal {
            self.emit_marshal(token, marshal)?;
        }
        if let Some(data) = &field.initial_value {
            self.tables.push(
                TableId::FieldRVA,
                MetadataRow::from([Raw(data.clone()), U32(token.row())]),
            )?;
        }
        if let Some(pinvoke) = &field.pinvoke {
            self.emit_impl_map(token, pinvoke)?;
        }

        self.emit_custom_attributes(token, &field.custom_attributes)
    }

    fn finalize_method(&mut self, handle: MethodDefHandle) -> Result<()> {
        let image = self.image;
        let method = image.method(handle)?;
        let token = self.method_def_token(handle)?;
        self.tables
            .defer_blob(row_of(token)?, 4, PendingBlob::Method(handle));

        for (index, parameter) in method.parameters.iter().enumerate() {
            let parameter_token = self
                .tables
                .member(MemberKey::Param(handle, index))
                .ok_or_else(|| {
                    Error::Precondition(format!("Parameter {index} of {handle} was not emitted"))
                })?;

            if let Some(constant) = &parameter.constant {
                self.emit_constant(parameter_token, constant)?;
            }
            if let Some(marshal) = &parameter.marshal {
                self.emit_marshal(parameter_token, marshal)?;
            }
            self.emit_custom_attributes(parameter_token, &parameter.custom_attributes)?;
        }

        if let Some(pinvoke) = &method.pinvoke {
            self.emit_impl_map(token, pinvoke)?;
        }

        let owner = CodedIndexType::TypeOrMethodDef.encode(token)?;
        self.generic_params
            .extend(method.generic_parameters.iter().map(|parameter| (owner, parameter)));

        self.emit_custom_attributes(token, &method.custom_attributes)?;
        self.queue_security(token, &method.security_declarations)
    }

    fn emit_property(
        &mut self,
        owner: TypeDefHandle,
        index: usize,
        property: &'a PropertyDefinition,
    ) -> Result<()> {
        let row = self.tables.push(
            TableId::Property,
            MetadataRow::from([
                U16(property.attributes.bits()),
                U32(self.strings.intern(&property.name)?),
                U32(0),
            ]),
        )?;
        self.tables
            .defer_blob(row, 2, PendingBlob::Property { owner, index });
        let token = row.token()?;

        if let Some(getter) = property.getter {
            self.emit_semantics(token, getter, MethodSemanticsAttributes::GETTER)?;
        }
        if let Some(setter) = property.setter {
            self.emit_semantics(token, setter, MethodSemanticsAttributes::SETTER)?;
        }
        for other in &property.others {
            self.emit_semantics(token, *other, MethodSemanticsAttributes::OTHER)?;
        }
        if let Some(constant) = &property.constant {
            self.emit_constant(token, constant)?;
        }

        self.emit_custom_attributes(token, &property.custom_attributes)
    }

    fn emit_event(&mut self, event: &'a EventDefinition) -> Result<()> {
        let event_type = self.type_token(event.event_type)?;
        let token = self.tables.push_token(
            TableId::Event,
            MetadataRow::from([
                U16(event.attributes.bits()),
                U32(self.strings.intern(&event.name)?),
                U32(CodedIndexType::TypeDefOrRef.encode(event_type)?),
            ]),
        )?;

        if let Some(add) = event.add {
            self.emit_semantics(token, add, MethodSemanticsAttributes::ADD_ON)?;
        }
        if let Some(remove) = event.remove {
            self.emit_semantics(token, remove, MethodSemanticsAttributes::REMOVE_ON)?;
        }
        if let Some(fire) = event.fire {
            self.emit_semantics(token, fire, MethodSemanticsAttributes::FIRE)?;
        }
        for other in &event.others {
            self.emit_semantics(token, *other, MethodSemanticsAttributes::OTHER)?;
        }

        self.emit_custom_attributes(token, &event.custom_attributes)
    }

    fn emit_semantics(
        &mut self,
        association: Token,
        method: MethodDefHandle,
        semantics: MethodSemanticsAttributes,
    ) -> Result<()> {
        let method = self.method_def_token(method)?;
        self.tables.push(
            TableId::MethodSemantics,
            MetadataRow::from([
                U16(semantics.bits()),
                U32(method.row()),
                U32(CodedIndexType::HasSemantics.encode(association)?),
            ]),
        )?;
        Ok(())
    }

    fn emit_constant(&mut self, parent: Token, constant: &Constant) -> Result<()> {
        let row = MetadataRow::from([
            U8(constant.element_type),
            U8(0),
            U32(CodedIndexType::HasConstant.encode(parent)?),
            U32(self.blobs.intern(&constant.value)?),
        ]);
        self.tables.push(TableId::Constant, row)?;
        Ok(())
    }

    fn emit_marshal(&mut self, parent: Token, descriptor: &[u8]) -> Result<()> {
        let row = MetadataRow::from([
            U32(CodedIndexType::HasFieldMarshal.encode(parent)?),
            U32(self.blobs.intern(descriptor)?),
        ]);
        self.tables.push(TableId::FieldMarshal, row)?;
        Ok(())
    }

    fn emit_impl_map(&mut self, member: Token, pinvoke: &PInvokeMap) -> Result<()> {
        let scope = self.module_ref_token(pinvoke.scope)?;
        let row = MetadataRow::from([
            U16(pinvoke.attributes.bits()),
            U32(CodedIndexType::MemberForwarded.encode(member)?),
            U32(self.strings.intern(&pinvoke.import_name)?),
            U32(scope.row()),
        ]);
        self.tables.push(TableId::ImplMap, row)?;
        Ok(())
    }

    /// Append one `CustomAttribute` row per attribute of `parent`
    pub(crate) fn emit_custom_attributes(
        &mut self,
        parent: Token,
        attributes: &[CustomAttribute],
    ) -> Result<()> {
        if attributes.is_empty() {
            return Ok(());
        }

        let coded_parent = CodedIndexType::HasCustomAttribute.encode(parent)?;
        for attribute in attributes {
            let constructor = self.method_token(attribute.constructor)?;
            let row = MetadataRow::from([
                U32(coded_parent),
                U32(CodedIndexType::CustomAttributeType.encode(constructor)?),
                U32(self.blobs.intern(&attribute.value)?),
            ]);
            self.tables.push(TableId::CustomAttribute, row)?;
        }
        Ok(())
    }

    fn queue_security(&mut self, parent: Token, declarations: &'a [SecurityDeclaration]) -> Result<()> {
        if declarations.is_empty() {
            return Ok(());
        }

        let parent = CodedIndexType::HasDeclSecurity.encode(parent)?;
        self.security
            .extend(declarations.iter().map(|declaration| (parent, declaration)));
        Ok(())
    }

    fn emit_assembly(&mut self, assembly: &'a AssemblyDefinition) -> Result<()> {
        let mut flags = assembly.flags;
        flags.set(AssemblyFlags::PUBLIC_KEY, assembly.public_key.is_some());

        let version = assembly.version;
        let row = MetadataRow::from([
            U32(assembly.hash_algorithm.id()),
            U16(version.major),
            U16(version.minor),
            U16(version.build),
            U16(version.revision),
            U32(flags.bits()),
            U32(self.blobs.intern_opt(assembly.public_key.as_deref())?),
            U32(self.strings.intern(&assembly.name)?),
            U32(self.culture(assembly.culture.as_deref())?),
        ]);
        let token = self.tables.push_token(TableId::Assembly, row)?;
        self.tables.bind(MemberKey::Assembly, token);

        for processor in &assembly.processors {
            self.tables
                .push(TableId::AssemblyProcessor, MetadataRow::from([U32(*processor)]))?;
        }
        for os in &assembly.operating_systems {
            self.tables.push(
                TableId::AssemblyOS,
                MetadataRow::from([
                    U32(os.platform_id),
                    U32(os.major_version),
                    U32(os.minor_version),
                ]),
            )?;
        }

        self.emit_custom_attributes(token, &assembly.custom_attributes)?;
        self.queue_security(token, &assembly.security_declarations)
    }

    fn emit_resource(&mut self, resource: &'a ManifestResource) -> Result<()> {
        let (offset, implementation) = match resource.implementation {
            None => (self.embed_resource(&resource.data)?, 0),
            Some(Implementation::ExportedType(exported)) => {
                self.image.exported_type(exported)?;
                return Err(Error::UnsupportedReference {
                    coded_index: CodedIndexType::Implementation,
                    token: self
                        .tables
                        .member(MemberKey::ExportedType(exported))
                        .unwrap_or_default(),
                });
            }
            Some(implementation) => {
                let token = self.implementation_token(implementation)?;
                (resource.offset, CodedIndexType::Implementation.encode(token)?)
            }
        };

        let row = MetadataRow::from([
            U32(offset),
            U32(resource.flags.bits()),
            U32(self.strings.intern(&resource.name)?),
            U32(implementation),
        ]);
        let token = self.tables.push_token(TableId::ManifestResource, row)?;
        self.emit_custom_attributes(token, &resource.custom_attributes)
    }

    /// Append `data` to the resources segment and return its offset
    fn embed_resource(&mut self, data: &[u8]) -> Result<u32> {
        let offset = to_u32(self.resources.len())?;
        self.resources
            .extend_from_slice(&to_u32(data.len())?.to_le_bytes());
        self.resources.extend_from_slice(data);
        self.resources.resize(align_to(self.resources.len(), 8), 0);
        Ok(offset)
    }

    fn flush_generic_params(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.generic_params);
        if self.options.sort_tables {
            pending.sort_by_key(|(owner, parameter)| (*owner, parameter.number));
        }

        for (owner, parameter) in pending {
            self.emit_generic_param(owner, parameter)?;
        }
        Ok(())
    }

    fn emit_generic_param(&mut self, owner: u32, parameter: &'a GenericParameter) -> Result<()> {
        let token = self.tables.push_token(
            TableId::GenericParam,
            MetadataRow::from([
                U16(parameter.number),
                U16(parameter.attributes.bits()),
                U32(owner),
                U32(self.strings.intern(&parameter.name)?),
            ]),
        )?;

        for constraint in &parameter.constraints {
            let constraint = self.type_token(*constraint)?;
            self.tables.push(
                TableId::GenericParamConstraint,
                MetadataRow::from([
                    U32(token.row()),
                    U32(CodedIndexType::TypeDefOrRef.encode(constraint)?),
                ]),
            )?;
        }

        self.emit_custom_attributes(token, &parameter.custom_attributes)
    }

    fn flush_security(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.security);
        if self.options.sort_tables {
            pending.sort_by_key(|(parent, _)| *parent);
        }

        for (parent, declaration) in pending {
            let token = self.tables.push_token(
                TableId::DeclSecurity,
                MetadataRow::from([
                    U16(declaration.action),
                    U32(parent),
                    U32(self.blobs.intern(&declaration.permission_set)?),
                ]),
            )?;
            self.emit_custom_attributes(token, &declaration.custom_attributes)?;
        }
        Ok(())
    }
}
