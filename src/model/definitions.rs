//! Definition records of the module being built.

use crate::model::{
    AssemblyFlags, AssemblyHashAlgorithm, EventAttributes, FieldAttributes, FieldDefHandle,
    FieldSignature, GenericParamAttributes, MethodAttributes, MethodDefHandle, MethodDefOrRef,
    MethodImplAttributes, MethodSignature, ModuleRefHandle, OperatingSystem, PInvokeAttributes,
    ParamAttributes, PropertyAttributes, PropertySignature, TypeAttributes, TypeDefHandle,
    TypeDefOrRef, Version, ELEMENT_TYPE,
};

/// A custom attribute applied to its owning record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAttribute {
    /// The attribute constructor
    pub constructor: MethodDefOrRef,
    /// Encoded attribute value blob (prolog, fixed and named arguments)
    pub value: Vec<u8>,
}

/// A declarative security entry (`DeclSecurity`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDeclaration {
    /// Security action code
    pub action: u16,
    /// Encoded permission set blob
    pub permission_set: Vec<u8>,
    /// Attributes applied to the declaration
    pub custom_attributes: Vec<CustomAttribute>,
}

/// A default value (`Constant` row)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    /// Element type of the value, one of the [`ELEMENT_TYPE`] primitives or `CLASS` for null
    pub element_type: u8,
    /// Little-endian value bytes
    pub value: Vec<u8>,
}

impl Constant {
    /// A 32-bit integer constant
    #[must_use]
    pub fn i4(value: i32) -> Self {
        Constant {
            element_type: ELEMENT_TYPE::I4,
            value: value.to_le_bytes().to_vec(),
        }
    }

    /// A boolean constant
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Constant {
            element_type: ELEMENT_TYPE::BOOLEAN,
            value: vec![u8::from(value)],
        }
    }

    /// A string constant, stored as UTF-16LE
    #[must_use]
    pub fn string(value: &str) -> Self {
        Constant {
            element_type: ELEMENT_TYPE::STRING,
            value: value.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        }
    }

    /// The null reference
    #[must_use]
    pub fn null() -> Self {
        Constant {
            element_type: ELEMENT_TYPE::CLASS_NULL,
            value: vec![0; 4],
        }
    }
}

/// P/Invoke information of a method or field (`ImplMap` row)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PInvokeMap {
    /// Marshalling and calling convention flags
    pub attributes: PInvokeAttributes,
    /// Name of the native export
    pub import_name: String,
    /// Native module holding the export
    pub scope: ModuleRefHandle,
}

/// A generic parameter of a type or method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParameter {
    /// Position in the owner's parameter list
    pub number: u16,
    /// Variance and constraint flags
    pub attributes: GenericParamAttributes,
    /// Name
    pub name: String,
    /// Type constraints
    pub constraints: Vec<TypeDefOrRef>,
    /// Attributes applied to the parameter
    pub custom_attributes: Vec<CustomAttribute>,
}

impl GenericParameter {
    /// An unconstrained parameter
    pub fn new(number: u16, name: impl Into<String>) -> Self {
        GenericParameter {
            number,
            attributes: GenericParamAttributes::empty(),
            name: name.into(),
            constraints: Vec::new(),
            custom_attributes: Vec::new(),
        }
    }
}

/// The module record of the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDefinition {
    /// Module file name
    pub name: String,
    /// Module version id
    pub mvid: uguid::Guid,
    /// Edit-and-continue id
    pub enc_id: Option<uguid::Guid>,
    /// Edit-and-continue base id
    pub enc_base_id: Option<uguid::Guid>,
    /// Edit-and-continue generation
    pub generation: u16,
    /// Attributes applied to the module
    pub custom_attributes: Vec<CustomAttribute>,
}

/// The assembly manifest of the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyDefinition {
    /// Simple name
    pub name: String,
    /// Version
    pub version: Version,
    /// Flags
    pub flags: AssemblyFlags,
    /// Hash algorithm of the `File` hashes
    pub hash_algorithm: AssemblyHashAlgorithm,
    /// Full public key of a strong named assembly
    pub public_key: Option<Vec<u8>>,
    /// Culture, `None` for neutral
    pub culture: Option<String>,
    /// `AssemblyProcessor` records
    pub processors: Vec<u32>,
    /// `AssemblyOS` records
    pub operating_systems: Vec<OperatingSystem>,
    /// Attributes applied to the assembly
    pub custom_attributes: Vec<CustomAttribute>,
    /// Declarative security of the assembly
    pub security_declarations: Vec<SecurityDeclaration>,
}

impl AssemblyDefinition {
    /// A neutral, unsigned assembly
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        AssemblyDefinition {
            name: name.into(),
            version,
            flags: AssemblyFlags::empty(),
            hash_algorithm: AssemblyHashAlgorithm::Sha1,
            public_key: None,
            culture: None,
            processors: Vec::new(),
            operating_systems: Vec::new(),
            custom_attributes: Vec::new(),
            security_declarations: Vec::new(),
        }
    }
}

/// An implemented interface (`InterfaceImpl` row)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceImplementation {
    /// The interface
    pub interface: TypeDefOrRef,
    /// Attributes applied to the implementation
    pub custom_attributes: Vec<CustomAttribute>,
}

/// An explicit override (`MethodImpl` row)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodImplementation {
    /// The implementing method
    pub body: MethodDefOrRef,
    /// The implemented declaration
    pub declaration: MethodDefOrRef,
}

/// Explicit layout of a type (`ClassLayout` row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassLayout {
    /// Field alignment
    pub packing_size: u16,
    /// Total size in bytes
    pub class_size: u32,
}

/// A property of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefinition {
    /// Flags
    pub attributes: PropertyAttributes,
    /// Name
    pub name: String,
    /// Signature
    pub signature: PropertySignature,
    /// Default value
    pub constant: Option<Constant>,
    /// Getter method
    pub getter: Option<MethodDefHandle>,
    /// Setter method
    pub setter: Option<MethodDefHandle>,
    /// Other accessor methods
    pub others: Vec<MethodDefHandle>,
    /// Attributes applied to the property
    pub custom_attributes: Vec<CustomAttribute>,
}

/// An event of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDefinition {
    /// Flags
    pub attributes: EventAttributes,
    /// Name
    pub name: String,
    /// Delegate type of the event
    pub event_type: TypeDefOrRef,
    /// `add_` method
    pub add: Option<MethodDefHandle>,
    /// `remove_` method
    pub remove: Option<MethodDefHandle>,
    /// `raise_` method
    pub fire: Option<MethodDefHandle>,
    /// Other accessor methods
    pub others: Vec<MethodDefHandle>,
    /// Attributes applied to the event
    pub custom_attributes: Vec<CustomAttribute>,
}

/// A parameter of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDefinition {
    /// Flags
    pub attributes: ParamAttributes,
    /// 1-based position; 0 describes the return value
    pub sequence: u16,
    /// Name
    pub name: Option<String>,
    /// Default value
    pub constant: Option<Constant>,
    /// Marshalling descriptor blob
    pub marshal: Option<Vec<u8>>,
    /// Attributes applied to the parameter
    pub custom_attributes: Vec<CustomAttribute>,
}

impl ParameterDefinition {
    /// A plain parameter at `sequence`
    pub fn new(sequence: u16, name: impl Into<String>) -> Self {
        ParameterDefinition {
            attributes: ParamAttributes::empty(),
            sequence,
            name: Some(name.into()),
            constant: None,
            marshal: None,
            custom_attributes: Vec::new(),
        }
    }
}

/// A field of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Flags
    pub attributes: FieldAttributes,
    /// Name
    pub name: String,
    /// Signature
    pub signature: FieldSignature,
    /// Default value
    pub constant: Option<Constant>,
    /// Explicit offset in the declaring type
    pub offset: Option<u32>,
    /// Marshalling descriptor blob
    pub marshal: Option<Vec<u8>>,
    /// Data the field is mapped to, placed by the segment layout
    pub initial_value: Option<Vec<u8>>,
    /// P/Invoke information
    pub pinvoke: Option<PInvokeMap>,
    /// Attributes applied to the field
    pub custom_attributes: Vec<CustomAttribute>,
    pub(crate) declaring_type: Option<TypeDefHandle>,
}

impl FieldDefinition {
    /// A field without extras
    pub fn new(name: impl Into<String>, attributes: FieldAttributes, signature: FieldSignature) -> Self {
        FieldDefinition {
            attributes,
            name: name.into(),
            signature,
            constant: None,
            offset: None,
            marshal: None,
            initial_value: None,
            pinvoke: None,
            custom_attributes: Vec::new(),
            declaring_type: None,
        }
    }

    /// The type the field was added to
    #[must_use]
    pub fn declaring_type(&self) -> Option<TypeDefHandle> {
        self.declaring_type
    }
}

/// A method of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefinition {
    /// Flags
    pub attributes: MethodAttributes,
    /// Implementation flags
    pub impl_attributes: MethodImplAttributes,
    /// Name
    pub name: String,
    /// Signature
    pub signature: MethodSignature,
    /// Parameter records, in sequence order
    pub parameters: Vec<ParameterDefinition>,
    /// Encoded method body, placed by the segment layout; `None` for abstract and extern methods
    pub body: Option<Vec<u8>>,
    /// P/Invoke information
    pub pinvoke: Option<PInvokeMap>,
    /// Generic parameters
    pub generic_parameters: Vec<GenericParameter>,
    /// Attributes applied to the method
    pub custom_attributes: Vec<CustomAttribute>,
    /// Declarative security of the method
    pub security_declarations: Vec<SecurityDeclaration>,
    pub(crate) declaring_type: Option<TypeDefHandle>,
}

impl MethodDefinition {
    /// A method without body or extras
    pub fn new(name: impl Into<String>, attributes: MethodAttributes, signature: MethodSignature) -> Self {
        MethodDefinition {
            attributes,
            impl_attributes: MethodImplAttributes::empty(),
            name: name.into(),
            signature,
            parameters: Vec::new(),
            body: None,
            pinvoke: None,
            generic_parameters: Vec::new(),
            custom_attributes: Vec::new(),
            security_declarations: Vec::new(),
            declaring_type: None,
        }
    }

    /// The type the method was added to
    #[must_use]
    pub fn declaring_type(&self) -> Option<TypeDefHandle> {
        self.declaring_type
    }
}

/// A type of the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// Flags
    pub attributes: TypeAttributes,
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
    /// Base type; `None` for interfaces, `System.Object` and `<Module>`
    pub base_type: Option<TypeDefOrRef>,
    /// Enclosing type of a nested type
    pub declaring_type: Option<TypeDefHandle>,
    /// Implemented interfaces
    pub interfaces: Vec<InterfaceImplementation>,
    /// Explicit overrides
    pub method_impls: Vec<MethodImplementation>,
    /// Explicit layout
    pub class_layout: Option<ClassLayout>,
    /// Properties
    pub properties: Vec<PropertyDefinition>,
    /// Events
    pub events: Vec<EventDefinition>,
    /// Generic parameters
    pub generic_parameters: Vec<GenericParameter>,
    /// Attributes applied to the type
    pub custom_attributes: Vec<CustomAttribute>,
    /// Declarative security of the type
    pub security_declarations: Vec<SecurityDeclaration>,
    pub(crate) fields: Vec<FieldDefHandle>,
    pub(crate) methods: Vec<MethodDefHandle>,
}

impl TypeDefinition {
    /// A type without members
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        attributes: TypeAttributes,
        base_type: Option<TypeDefOrRef>,
    ) -> Self {
        TypeDefinition {
            attributes,
            namespace: namespace.into(),
            name: name.into(),
            base_type,
            declaring_type: None,
            interfaces: Vec::new(),
            method_impls: Vec::new(),
            class_layout: None,
            properties: Vec::new(),
            events: Vec::new(),
            generic_parameters: Vec::new(),
            custom_attributes: Vec::new(),
            security_declarations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Fields, in declaration order
    #[must_use]
    pub fn fields(&self) -> &[FieldDefHandle] {
        &self.fields
    }

    /// Methods, in declaration order
    #[must_use]
    pub fn methods(&self) -> &[MethodDefHandle] {
        &self.methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants() {
        assert_eq!(Constant::i4(-2).value, [0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(Constant::string("Hi").value, [b'H', 0, b'i', 0]);
        assert_eq!(Constant::boolean(true).element_type, ELEMENT_TYPE::BOOLEAN);
        assert_eq!(Constant::null().value, [0, 0, 0, 0]);
    }
}
