//! Attribute flag sets of the definition and reference records (ECMA-335 II.23.1).

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of a `TypeDef` or `ExportedType` row
    pub struct TypeAttributes: u32 {
        /// Visible outside the assembly
        const PUBLIC = 0x0000_0001;
        /// Nested, visible everywhere the enclosing type is
        const NESTED_PUBLIC = 0x0000_0002;
        /// Nested, private to the enclosing type
        const NESTED_PRIVATE = 0x0000_0003;
        /// Nested, family access
        const NESTED_FAMILY = 0x0000_0004;
        /// Nested, assembly access
        const NESTED_ASSEMBLY = 0x0000_0005;
        /// Nested, family and assembly access
        const NESTED_FAM_AND_ASSEM = 0x0000_0006;
        /// Nested, family or assembly access
        const NESTED_FAM_OR_ASSEM = 0x0000_0007;
        /// Fields are laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Field layout is supplied explicitly
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type can not be derived from
        const SEALED = 0x0000_0100;
        /// Name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Type is imported
        const IMPORT = 0x0000_1000;
        /// Type is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Strings are marshalled as UTF-16
        const UNICODE_CLASS = 0x0001_0000;
        /// Strings are marshalled platform dependent
        const AUTO_CLASS = 0x0002_0000;
        /// Type initializer may run before the first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x0000_0800;
        /// Type has security associated with it
        const HAS_SECURITY = 0x0004_0000;
        /// Exported type forwards to another assembly
        const FORWARDER = 0x0020_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of a `Field` row
    pub struct FieldAttributes: u16 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEMBLY = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in the assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone
        const PUBLIC = 0x0006;
        /// Defined on the type, not per instance
        const STATIC = 0x0010;
        /// Only initialized, never written after init
        const INIT_ONLY = 0x0020;
        /// Value is a compile time constant
        const LITERAL = 0x0040;
        /// Not serialized when the type is remoted
        const NOT_SERIALIZED = 0x0080;
        /// Name is special
        const SPECIAL_NAME = 0x0200;
        /// Implementation is forwarded through P/Invoke
        const PINVOKE_IMPL = 0x2000;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x0400;
        /// Field has marshalling information
        const HAS_FIELD_MARSHAL = 0x1000;
        /// Field has a default value
        const HAS_DEFAULT = 0x8000;
        /// Field has an RVA
        const HAS_FIELD_RVA = 0x0100;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of a `MethodDef` row
    pub struct MethodAttributes: u16 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEMBLY = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in the assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone
        const PUBLIC = 0x0006;
        /// Defined on the type, not per instance
        const STATIC = 0x0010;
        /// Can not be overridden
        const FINAL = 0x0020;
        /// Virtual method
        const VIRTUAL = 0x0040;
        /// Method hides by name and signature
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new vtable slot
        const NEW_SLOT = 0x0100;
        /// Overridable only if accessible
        const STRICT = 0x0200;
        /// Method has no implementation
        const ABSTRACT = 0x0400;
        /// Name is special
        const SPECIAL_NAME = 0x0800;
        /// Implementation is forwarded through P/Invoke
        const PINVOKE_IMPL = 0x2000;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x1000;
        /// Method has security associated with it
        const HAS_SECURITY = 0x4000;
        /// Method calls another method containing security code
        const REQUIRE_SEC_OBJECT = 0x8000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Implementation flags of a `MethodDef` row
    pub struct MethodImplAttributes: u16 {
        /// Implementation is native code
        const NATIVE = 0x0001;
        /// Implementation is OPTIL
        const OPTIL = 0x0002;
        /// Implementation is provided by the runtime
        const RUNTIME = 0x0003;
        /// Implementation is unmanaged
        const UNMANAGED = 0x0004;
        /// Method is not inlined
        const NO_INLINING = 0x0008;
        /// Method is defined elsewhere
        const FORWARD_REF = 0x0010;
        /// Method is single threaded through the body
        const SYNCHRONIZED = 0x0020;
        /// Method is not optimized
        const NO_OPTIMIZATION = 0x0040;
        /// Signature is exported exactly as declared
        const PRESERVE_SIG = 0x0080;
        /// Method is implemented by the runtime
        const INTERNAL_CALL = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of a `Param` row
    pub struct ParamAttributes: u16 {
        /// Input parameter
        const IN = 0x0001;
        /// Output parameter
        const OUT = 0x0002;
        /// Optional parameter
        const OPTIONAL = 0x0010;
        /// Parameter has a default value
        const HAS_DEFAULT = 0x1000;
        /// Parameter has marshalling information
        const HAS_FIELD_MARSHAL = 0x2000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of a `Property` row
    pub struct PropertyAttributes: u16 {
        /// Name is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x0400;
        /// Property has a default value
        const HAS_DEFAULT = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of an `Event` row
    pub struct EventAttributes: u16 {
        /// Name is special
        const SPECIAL_NAME = 0x0200;
        /// Runtime should check the name encoding
        const RT_SPECIAL_NAME = 0x0400;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of a `GenericParam` row
    pub struct GenericParamAttributes: u16 {
        /// Covariant type parameter
        const COVARIANT = 0x0001;
        /// Contravariant type parameter
        const CONTRAVARIANT = 0x0002;
        /// Argument must be a reference type
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        /// Argument must be a non-nullable value type
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        /// Argument must have a public default constructor
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of an `Assembly` or `AssemblyRef` row
    pub struct AssemblyFlags: u32 {
        /// The blob holds the full public key, not its token
        const PUBLIC_KEY = 0x0001;
        /// The assembly can be retargeted at runtime
        const RETARGETABLE = 0x0100;
        /// JIT tracking is disabled
        const DISABLE_JIT_COMPILE_OPTIMIZER = 0x4000;
        /// JIT tracking is enabled
        const ENABLE_JIT_COMPILE_TRACKING = 0x8000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of a `ManifestResource` row
    pub struct ManifestResourceAttributes: u32 {
        /// The resource is exported from the assembly
        const PUBLIC = 0x0001;
        /// The resource is private to the assembly
        const PRIVATE = 0x0002;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of a `File` row
    pub struct FileAttributes: u32 {
        /// The file is a resource or other non-metadata file
        const CONTAINS_NO_METADATA = 0x0001;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Roles of a method in a `MethodSemantics` row
    pub struct MethodSemanticsAttributes: u16 {
        /// Property setter
        const SETTER = 0x0001;
        /// Property getter
        const GETTER = 0x0002;
        /// Other property or event method
        const OTHER = 0x0004;
        /// Event add method
        const ADD_ON = 0x0008;
        /// Event remove method
        const REMOVE_ON = 0x0010;
        /// Event raise method
        const FIRE = 0x0020;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags of an `ImplMap` row
    pub struct PInvokeAttributes: u16 {
        /// Use the member name as specified
        const NO_MANGLE = 0x0001;
        /// Marshal strings as ANSI
        const CHAR_SET_ANSI = 0x0002;
        /// Marshal strings as UTF-16
        const CHAR_SET_UNICODE = 0x0004;
        /// Marshal strings platform dependent
        const CHAR_SET_AUTO = 0x0006;
        /// Call `SetLastError` after the call
        const SUPPORTS_LAST_ERROR = 0x0040;
        /// Platform default calling convention
        const CALL_CONV_WINAPI = 0x0100;
        /// `cdecl` calling convention
        const CALL_CONV_CDECL = 0x0200;
        /// `stdcall` calling convention
        const CALL_CONV_STDCALL = 0x0300;
        /// `thiscall` calling convention
        const CALL_CONV_THISCALL = 0x0400;
        /// `fastcall` calling convention
        const CALL_CONV_FASTCALL = 0x0500;
    }
}

/// Hash algorithm of an assembly's file hashes (`AssemblyHashAlgorithm`, II.23.1.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AssemblyHashAlgorithm {
    /// No hashing
    None,
    /// MD5
    Md5,
    /// SHA-1
    #[default]
    Sha1,
}

impl AssemblyHashAlgorithm {
    /// The `HashAlgId` value stored in the `Assembly` row
    #[must_use]
    pub fn id(self) -> u32 {
        match self {
            AssemblyHashAlgorithm::None => 0,
            AssemblyHashAlgorithm::Md5 => 0x8003,
            AssemblyHashAlgorithm::Sha1 => 0x8004,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values() {
        let flags = TypeAttributes::PUBLIC | TypeAttributes::SEALED | TypeAttributes::BEFORE_FIELD_INIT;
        assert_eq!(flags.bits(), 0x0010_0101);

        let method = MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::HIDE_BY_SIG;
        assert_eq!(method.bits(), 0x0096);

        assert_eq!(AssemblyHashAlgorithm::default().id(), 0x8004);
        assert_eq!(AssemblyHashAlgorithm::Md5.id(), 0x8003);
    }
}
