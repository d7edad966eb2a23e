//! Reference records and the closed reference variants of coded index columns.
//!
//! Every coded column the build context fills from the object model is one of the enums below.
//! Resolution is a plain `match`: each variant maps to exactly one table, so a value that does
//! not fit its column can not be constructed.

use sha1::{Digest, Sha1};

use crate::model::{
    AssemblyFlags, AssemblyHashAlgorithm, AssemblyRefHandle, CustomAttribute, ExportedTypeHandle,
    FieldSignature, FileAttributes, FileHandle, LocalVariablesSignature, MemberRefHandle,
    MethodDefHandle, MethodSignature, MethodSpecSignature, ModuleRefHandle, TypeAttributes,
    TypeDefHandle, TypeRefHandle, TypeSig, TypeSpecHandle,
};

/// A type usable as base type, interface, constraint or inside a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDefOrRef {
    /// A type defined in the image
    Definition(TypeDefHandle),
    /// A type defined elsewhere
    Reference(TypeRefHandle),
    /// A constructed type
    Specification(TypeSpecHandle),
}

/// The scope a [`TypeReference`] is resolved in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionScope {
    /// The module being built
    Module,
    /// Another module of the same assembly
    ModuleRef(ModuleRefHandle),
    /// Another assembly
    AssemblyRef(AssemblyRefHandle),
    /// The enclosing type of a nested type reference
    TypeRef(TypeRefHandle),
}

/// The owner of a [`MemberReference`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRefParent {
    /// A type
    Type(TypeDefOrRef),
    /// A vararg method definition, for call site signatures
    Method(MethodDefHandle),
    /// A global member of another module
    ModuleRef(ModuleRefHandle),
}

/// A method definition or a reference to a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodDefOrRef {
    /// A method defined in the image
    Definition(MethodDefHandle),
    /// A method referenced through `MemberRef`
    Reference(MemberRefHandle),
}

/// Where an exported type or manifest resource lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Implementation {
    /// Another file of this assembly
    File(FileHandle),
    /// Another assembly
    AssemblyRef(AssemblyRefHandle),
    /// The enclosing exported type
    ExportedType(ExportedTypeHandle),
}

/// Assembly version quadruple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Version {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl Version {
    /// Create a version
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Version {
            major,
            minor,
            build,
            revision,
        }
    }
}

/// An `AssemblyOS` / `AssemblyRefOS` record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OperatingSystem {
    /// Platform id
    pub platform_id: u32,
    /// Major version
    pub major_version: u32,
    /// Minor version
    pub minor_version: u32,
}

/// Reference to a type defined in another module or assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReference {
    /// Where the type is resolved
    pub scope: ResolutionScope,
    /// Namespace, empty for nested types
    pub namespace: String,
    /// Name
    pub name: String,
    /// Attributes applied to the reference
    pub custom_attributes: Vec<CustomAttribute>,
}

impl TypeReference {
    /// Create a reference to `namespace.name` in `scope`
    pub fn new(scope: ResolutionScope, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeReference {
            scope,
            namespace: namespace.into(),
            name: name.into(),
            custom_attributes: Vec::new(),
        }
    }
}

/// A constructed type (`TypeSpec`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpecification {
    /// The type signature
    pub signature: TypeSig,
    /// Attributes applied to the specification
    pub custom_attributes: Vec<CustomAttribute>,
}

impl TypeSpecification {
    /// Create a specification of `signature`
    #[must_use]
    pub fn new(signature: TypeSig) -> Self {
        TypeSpecification {
            signature,
            custom_attributes: Vec::new(),
        }
    }
}

/// Signature of a [`MemberReference`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRefSignature {
    /// Reference to a field
    Field(FieldSignature),
    /// Reference to a method
    Method(MethodSignature),
}

/// Reference to a field or method of another type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberReference {
    /// Owner of the member
    pub parent: MemberRefParent,
    /// Member name
    pub name: String,
    /// Member signature
    pub signature: MemberRefSignature,
    /// Attributes applied to the reference
    pub custom_attributes: Vec<CustomAttribute>,
}

impl MemberReference {
    /// Reference a method
    pub fn method(parent: MemberRefParent, name: impl Into<String>, signature: MethodSignature) -> Self {
        MemberReference {
            parent,
            name: name.into(),
            signature: MemberRefSignature::Method(signature),
            custom_attributes: Vec::new(),
        }
    }

    /// Reference a field
    pub fn field(parent: MemberRefParent, name: impl Into<String>, signature: FieldSignature) -> Self {
        MemberReference {
            parent,
            name: name.into(),
            signature: MemberRefSignature::Field(signature),
            custom_attributes: Vec::new(),
        }
    }
}

/// Instantiation of a generic method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpecification {
    /// The generic method
    pub method: MethodDefOrRef,
    /// The type arguments
    pub instantiation: MethodSpecSignature,
    /// Attributes applied to the specification
    pub custom_attributes: Vec<CustomAttribute>,
}

/// Reference to another assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReference {
    /// Simple name
    pub name: String,
    /// Version
    pub version: Version,
    /// Flags; [`AssemblyFlags::PUBLIC_KEY`] when the full key is stored
    pub flags: AssemblyFlags,
    /// Public key or public key token
    pub public_key_or_token: Option<Vec<u8>>,
    /// Culture, `None` for neutral
    pub culture: Option<String>,
    /// Hash of the referenced assembly
    pub hash_value: Option<Vec<u8>>,
    /// `AssemblyRefProcessor` records
    pub processors: Vec<u32>,
    /// `AssemblyRefOS` records
    pub operating_systems: Vec<OperatingSystem>,
    /// Attributes applied to the reference
    pub custom_attributes: Vec<CustomAttribute>,
}

impl AssemblyReference {
    /// Reference `name` at `version` without a strong name
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        AssemblyReference {
            name: name.into(),
            version,
            flags: AssemblyFlags::empty(),
            public_key_or_token: None,
            culture: None,
            hash_value: None,
            processors: Vec::new(),
            operating_systems: Vec::new(),
            custom_attributes: Vec::new(),
        }
    }

    /// Store the token of `public_key` as the strong name of the reference
    #[must_use]
    pub fn with_public_key(mut self, public_key: &[u8]) -> Self {
        self.public_key_or_token = Some(public_key_token(public_key).to_vec());
        self.flags.remove(AssemblyFlags::PUBLIC_KEY);
        self
    }

    /// Store an already computed public key token
    #[must_use]
    pub fn with_public_key_token(mut self, token: [u8; 8]) -> Self {
        self.public_key_or_token = Some(token.to_vec());
        self.flags.remove(AssemblyFlags::PUBLIC_KEY);
        self
    }
}

/// The public key token of `public_key`: the last 8 bytes of its SHA-1 hash, reversed.
///
/// # Examples
///
/// ```rust
/// use dotemit::model::public_key_token;
///
/// // The ECMA standard public key
/// let key = [0u8, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];
/// assert_eq!(public_key_token(&key), [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89]);
/// ```
#[must_use]
pub fn public_key_token(public_key: &[u8]) -> [u8; 8] {
    let hash = Sha1::digest(public_key);
    let mut token = [0u8; 8];
    for (slot, byte) in token.iter_mut().zip(hash.iter().rev()) {
        *slot = *byte;
    }
    token
}

/// Reference to another module of the same assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    /// File name of the module
    pub name: String,
    /// Attributes applied to the reference
    pub custom_attributes: Vec<CustomAttribute>,
}

impl ModuleReference {
    /// Reference the module `name`
    pub fn new(name: impl Into<String>) -> Self {
        ModuleReference {
            name: name.into(),
            custom_attributes: Vec::new(),
        }
    }
}

/// Another file of a multi-file assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    /// Flags
    pub flags: FileAttributes,
    /// File name
    pub name: String,
    /// Hash of the file contents
    pub hash_value: Option<Vec<u8>>,
    /// Attributes applied to the reference
    pub custom_attributes: Vec<CustomAttribute>,
}

impl FileReference {
    /// Reference the file `name` without a hash
    pub fn new(name: impl Into<String>, flags: FileAttributes) -> Self {
        FileReference {
            flags,
            name: name.into(),
            hash_value: None,
            custom_attributes: Vec::new(),
        }
    }

    /// Hash `contents` with `algorithm` and store the result
    #[must_use]
    pub fn with_contents(mut self, contents: &[u8], algorithm: AssemblyHashAlgorithm) -> Self {
        self.hash_value = match algorithm {
            AssemblyHashAlgorithm::None => None,
            AssemblyHashAlgorithm::Md5 => Some(md5::Md5::digest(contents).to_vec()),
            AssemblyHashAlgorithm::Sha1 => Some(Sha1::digest(contents).to_vec()),
        };
        self
    }
}

/// A type exported by this assembly but defined in another file or assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedType {
    /// Flags; [`TypeAttributes::FORWARDER`] for type forwarders
    pub flags: TypeAttributes,
    /// `TypeDef` row id hint in the defining module, 0 if unknown
    pub type_def_id: u32,
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
    /// Where the type lives
    pub implementation: Implementation,
    /// Attributes applied to the exported type
    pub custom_attributes: Vec<CustomAttribute>,
}

/// A resource of the assembly manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestResource {
    /// Resource name
    pub name: String,
    /// Visibility flags
    pub flags: crate::model::ManifestResourceAttributes,
    /// `None` for data embedded in this image, otherwise the file or assembly holding it
    pub implementation: Option<Implementation>,
    /// Embedded data; ignored for external resources
    pub data: Vec<u8>,
    /// Offset inside the external file; ignored for embedded resources
    pub offset: u32,
    /// Attributes applied to the resource
    pub custom_attributes: Vec<CustomAttribute>,
}

impl ManifestResource {
    /// A resource embedded in this image
    pub fn embedded(
        name: impl Into<String>,
        flags: crate::model::ManifestResourceAttributes,
        data: Vec<u8>,
    ) -> Self {
        ManifestResource {
            name: name.into(),
            flags,
            implementation: None,
            data,
            offset: 0,
            custom_attributes: Vec::new(),
        }
    }

    /// A resource stored at `offset` of another file or assembly
    pub fn linked(
        name: impl Into<String>,
        flags: crate::model::ManifestResourceAttributes,
        implementation: Implementation,
        offset: u32,
    ) -> Self {
        ManifestResource {
            name: name.into(),
            flags,
            implementation: Some(implementation),
            data: Vec::new(),
            offset,
            custom_attributes: Vec::new(),
        }
    }
}

/// Signature of a `StandAloneSig` row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StandAloneSignature {
    /// Locals of a method body
    Locals(LocalVariablesSignature),
    /// Call site signature of `calli`
    Method(MethodSignature),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_tokens() {
        let key = [0u8, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];
        let reference = AssemblyReference::new("mscorlib", Version::new(4, 0, 0, 0))
            .with_public_key(&key);

        assert_eq!(
            reference.public_key_or_token.as_deref(),
            Some(&[0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89][..])
        );
        assert!(!reference.flags.contains(AssemblyFlags::PUBLIC_KEY));
    }

    #[test]
    fn file_hashes() {
        let sha1 = FileReference::new("a.netmodule", FileAttributes::empty())
            .with_contents(b"abc", AssemblyHashAlgorithm::Sha1);
        assert_eq!(
            sha1.hash_value.as_deref().map(<[u8]>::len),
            Some(20)
        );
        assert_eq!(sha1.hash_value.unwrap()[..4], [0xa9, 0x99, 0x3e, 0x36]);

        let md5 = FileReference::new("a.netmodule", FileAttributes::empty())
            .with_contents(b"abc", AssemblyHashAlgorithm::Md5);
        assert_eq!(md5.hash_value.unwrap()[..4], [0x90, 0x01, 0x50, 0x98]);

        let none = FileReference::new("data.bin", FileAttributes::CONTAINS_NO_METADATA)
            .with_contents(b"abc", AssemblyHashAlgorithm::None);
        assert!(none.hash_value.is_none());
    }
}
