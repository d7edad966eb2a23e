//! The arena-backed module image.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    model::{
        AssemblyDefinition, AssemblyReference, ExportedType, FieldDefinition, FileReference,
        ManifestResource, MemberReference, MethodDefinition, MethodSpecification, ModuleDefinition,
        ModuleReference, StandAloneSignature, TypeAttributes, TypeDefinition, TypeReference,
        TypeSpecification,
    },
    Error, Result,
};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`ModuleImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u64);

impl ImageId {
    pub(crate) fn next() -> Self {
        ImageId(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image{}", self.0)
    }
}

define_handle!(TypeDefHandle, "A type defined in the image");
define_handle!(FieldDefHandle, "A field defined in the image");
define_handle!(MethodDefHandle, "A method defined in the image");
define_handle!(TypeRefHandle, "A type reference of the image");
define_handle!(TypeSpecHandle, "A type specification of the image");
define_handle!(MemberRefHandle, "A member reference of the image");
define_handle!(MethodSpecHandle, "A generic method instantiation of the image");
define_handle!(AssemblyRefHandle, "An assembly reference of the image");
define_handle!(ModuleRefHandle, "A module reference of the image");
define_handle!(FileHandle, "A file of the assembly manifest");
define_handle!(ExportedTypeHandle, "An exported type of the assembly manifest");
define_handle!(StandAloneSigHandle, "A standalone signature of the image");

macro_rules! arena {
    ($arena:ident, $handle:ident, $record:ty, $add:ident, $get:ident, $get_mut:ident, $iter:ident, $what:literal) => {
        #[doc = concat!("Add ", $what, " and return its handle")]
        pub fn $add(&mut self, record: $record) -> $handle {
            self.$arena.push(record);
            $handle {
                image: self.id,
                index: self.$arena.len() - 1,
            }
        }

        #[doc = concat!("The ", $what, " behind `handle`")]
        ///
        /// # Errors
        /// Returns [`crate::Error::MemberNotImported`] for a handle of another image.
        pub fn $get(&self, handle: $handle) -> Result<&$record> {
            self.check(handle.image, &handle)?;
            self.$arena
                .get(handle.index)
                .ok_or_else(|| Error::Precondition(format!("{handle} is dangling")))
        }

        #[doc = concat!("Mutable access to the ", $what, " behind `handle`")]
        ///
        /// # Errors
        /// Returns [`crate::Error::MemberNotImported`] for a handle of another image.
        pub fn $get_mut(&mut self, handle: $handle) -> Result<&mut $record> {
            self.check(handle.image, &handle)?;
            self.$arena
                .get_mut(handle.index)
                .ok_or_else(|| Error::Precondition(format!("{handle} is dangling")))
        }

        #[doc = concat!("Every ", $what, " with its handle, in insertion order")]
        pub fn $iter(&self) -> impl Iterator<Item = ($handle, &$record)> + '_ {
            let image = self.id;
            self.$arena
                .iter()
                .enumerate()
                .map(move |(index, record)| ($handle { image, index }, record))
        }
    };
}

/// A .NET module under construction: the input of [`crate::builder::MetadataBuffer`].
///
/// Records live in per-kind arenas and reference each other through typed handles. Every
/// handle remembers the image that created it, so mixing handles of two images is detected
/// when the metadata is built.
///
/// A new image already contains the `<Module>` type that holds global members.
///
/// # Examples
///
/// ```rust
/// use dotemit::model::*;
///
/// let mut image = ModuleImage::new("Hello.dll");
/// let corlib = image.add_assembly_ref(AssemblyReference::new("mscorlib", Version::new(4, 0, 0, 0)));
/// let object = image.add_type_ref(TypeReference::new(
///     ResolutionScope::AssemblyRef(corlib),
///     "System",
///     "Object",
/// ));
///
/// let program = image.add_type(TypeDefinition::new(
///     "Hello",
///     "Program",
///     TypeAttributes::PUBLIC,
///     Some(TypeDefOrRef::Reference(object)),
/// ));
/// image.add_method(
///     program,
///     MethodDefinition::new(
///         "Main",
///         MethodAttributes::PUBLIC | MethodAttributes::STATIC,
///         MethodSignature::new(TypeSig::Void, vec![]),
///     ),
/// )?;
/// assert_eq!(image.type_count(), 2);
/// # Ok::<(), dotemit::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ModuleImage {
    id: ImageId,
    /// The module record
    pub module: ModuleDefinition,
    /// The assembly manifest, `None` for a netmodule
    pub assembly: Option<AssemblyDefinition>,
    /// Manifest resources
    pub resources: Vec<ManifestResource>,
    types: Vec<TypeDefinition>,
    fields: Vec<FieldDefinition>,
    methods: Vec<MethodDefinition>,
    type_refs: Vec<TypeReference>,
    type_specs: Vec<TypeSpecification>,
    member_refs: Vec<MemberReference>,
    method_specs: Vec<MethodSpecification>,
    assembly_refs: Vec<AssemblyReference>,
    module_refs: Vec<ModuleReference>,
    files: Vec<FileReference>,
    exported_types: Vec<ExportedType>,
    standalone_sigs: Vec<StandAloneSignature>,
}

impl ModuleImage {
    /// Create an image for the module `name`, holding only the `<Module>` type
    pub fn new(name: impl Into<String>) -> Self {
        let mut image = ModuleImage {
            id: ImageId::next(),
            module: ModuleDefinition {
                name: name.into(),
                mvid: uguid::Guid::ZERO,
                enc_id: None,
                enc_base_id: None,
                generation: 0,
                custom_attributes: Vec::new(),
            },
            assembly: None,
            resources: Vec::new(),
            types: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            type_refs: Vec::new(),
            type_specs: Vec::new(),
            member_refs: Vec::new(),
            method_specs: Vec::new(),
            assembly_refs: Vec::new(),
            module_refs: Vec::new(),
            files: Vec::new(),
            exported_types: Vec::new(),
            standalone_sigs: Vec::new(),
        };
        image.add_type(TypeDefinition::new(
            "",
            "<Module>",
            TypeAttributes::empty(),
            None,
        ));
        image
    }

    /// Identity of this image
    #[must_use]
    pub fn id(&self) -> ImageId {
        self.id
    }

    /// The `<Module>` type
    #[must_use]
    pub fn module_type(&self) -> TypeDefHandle {
        TypeDefHandle {
            image: self.id,
            index: 0,
        }
    }

    fn check(&self, image: ImageId, handle: &dyn fmt::Display) -> Result<()> {
        if image == self.id {
            Ok(())
        } else {
            Err(Error::MemberNotImported {
                member: handle.to_string(),
            })
        }
    }

    arena!(types, TypeDefHandle, TypeDefinition, add_type, type_def, type_def_mut, types, "a type definition");
    arena!(type_refs, TypeRefHandle, TypeReference, add_type_ref, type_ref, type_ref_mut, type_refs, "a type reference");
    arena!(type_specs, TypeSpecHandle, TypeSpecification, add_type_spec, type_spec, type_spec_mut, type_specs, "a type specification");
    arena!(member_refs, MemberRefHandle, MemberReference, add_member_ref, member_ref, member_ref_mut, member_refs, "a member reference");
    arena!(method_specs, MethodSpecHandle, MethodSpecification, add_method_spec, method_spec, method_spec_mut, method_specs, "a method specification");
    arena!(assembly_refs, AssemblyRefHandle, AssemblyReference, add_assembly_ref, assembly_ref, assembly_ref_mut, assembly_refs, "an assembly reference");
    arena!(module_refs, ModuleRefHandle, ModuleReference, add_module_ref, module_ref, module_ref_mut, module_refs, "a module reference");
    arena!(files, FileHandle, FileReference, add_file, file, file_mut, files, "a file reference");
    arena!(exported_types, ExportedTypeHandle, ExportedType, add_exported_type, exported_type, exported_type_mut, exported_types, "an exported type");
    arena!(standalone_sigs, StandAloneSigHandle, StandAloneSignature, add_standalone_sig, standalone_sig, standalone_sig_mut, standalone_sigs, "a standalone signature");

    /// Add `field` to the type `owner`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotImported`] if `owner` belongs to another image.
    pub fn add_field(&mut self, owner: TypeDefHandle, mut field: FieldDefinition) -> Result<FieldDefHandle> {
        self.type_def(owner)?;

        field.declaring_type = Some(owner);
        self.fields.push(field);
        let handle = FieldDefHandle {
            image: self.id,
            index: self.fields.len() - 1,
        };
        self.type_def_mut(owner)?.fields.push(handle);
        Ok(handle)
    }

    /// Add `method` to the type `owner`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotImported`] if `owner` belongs to another image.
    pub fn add_method(
        &mut self,
        owner: TypeDefHandle,
        mut method: MethodDefinition,
    ) -> Result<MethodDefHandle> {
        self.type_def(owner)?;

        method.declaring_type = Some(owner);
        self.methods.push(method);
        let handle = MethodDefHandle {
            image: self.id,
            index: self.methods.len() - 1,
        };
        self.type_def_mut(owner)?.methods.push(handle);
        Ok(handle)
    }

    /// The field behind `handle`
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotImported`] for a handle of another image.
    pub fn field(&self, handle: FieldDefHandle) -> Result<&FieldDefinition> {
        self.check(handle.image, &handle)?;
        self.fields
            .get(handle.index)
            .ok_or_else(|| Error::Precondition(format!("{handle} is dangling")))
    }

    /// Mutable access to the field behind `handle`
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotImported`] for a handle of another image.
    pub fn field_mut(&mut self, handle: FieldDefHandle) -> Result<&mut FieldDefinition> {
        self.check(handle.image, &handle)?;
        self.fields
            .get_mut(handle.index)
            .ok_or_else(|| Error::Precondition(format!("{handle} is dangling")))
    }

    /// The method behind `handle`
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotImported`] for a handle of another image.
    pub fn method(&self, handle: MethodDefHandle) -> Result<&MethodDefinition> {
        self.check(handle.image, &handle)?;
        self.methods
            .get(handle.index)
            .ok_or_else(|| Error::Precondition(format!("{handle} is dangling")))
    }

    /// Mutable access to the method behind `handle`
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotImported`] for a handle of another image.
    pub fn method_mut(&mut self, handle: MethodDefHandle) -> Result<&mut MethodDefinition> {
        self.check(handle.image, &handle)?;
        self.methods
            .get_mut(handle.index)
            .ok_or_else(|| Error::Precondition(format!("{handle} is dangling")))
    }

    /// Number of types, `<Module>` included
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldAttributes, FieldSignature, TypeSig};

    #[test]
    fn module_type_first() {
        let image = ModuleImage::new("Test.dll");
        let (handle, module) = image.types().next().unwrap();
        assert_eq!(handle, image.module_type());
        assert_eq!(module.name, "<Module>");
    }

    #[test]
    fn members_belong_to_owner() {
        let mut image = ModuleImage::new("Test.dll");
        let ty = image.add_type(TypeDefinition::new("N", "A", TypeAttributes::PUBLIC, None));
        let field = image
            .add_field(
                ty,
                FieldDefinition::new("x", FieldAttributes::PUBLIC, FieldSignature::new(TypeSig::I4)),
            )
            .unwrap();

        assert_eq!(image.type_def(ty).unwrap().fields(), &[field]);
        assert_eq!(image.field(field).unwrap().declaring_type(), Some(ty));
    }

    #[test]
    fn foreign_handles() {
        let mut first = ModuleImage::new("First.dll");
        let second = ModuleImage::new("Second.dll");
        let ty = first.add_type(TypeDefinition::new("N", "A", TypeAttributes::PUBLIC, None));

        assert_ne!(first.id(), second.id());
        assert!(matches!(
            second.type_def(ty),
            Err(Error::MemberNotImported { .. })
        ));

        let mut second = second;
        let field = FieldDefinition::new("x", FieldAttributes::PUBLIC, FieldSignature::new(TypeSig::I4));
        assert!(matches!(
            second.add_field(ty, field),
            Err(Error::MemberNotImported { .. })
        ));
    }
}
