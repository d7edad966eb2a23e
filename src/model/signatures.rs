//! Signature values and their blob encoding (ECMA-335 II.23.2).
//!
//! Signatures reference types through [`TypeDefOrRef`] values. Turning those into the
//! `TypeDefOrRefOrSpecEncoded` integers of the blob needs the tokens the build context assigns,
//! so every encoder takes a resolver callback. The callback may add rows and intern further
//! blobs (a `TypeSpec` nested in a generic instantiation, for example).
//!
//! Only encoding is provided.
//!
//! # Examples
//!
//! ```rust
//! use dotemit::model::{MethodSignature, TypeSig};
//! use dotemit::metadata::token::Token;
//!
//! let signature = MethodSignature::new(TypeSig::Void, vec![TypeSig::I4, TypeSig::String]);
//! let blob = signature.to_blob(&mut |_| Ok(Token::NULL))?;
//! assert_eq!(blob, [0x00, 0x02, 0x01, 0x08, 0x0E]);
//! # Ok::<(), dotemit::Error>(())
//! ```

use crate::{
    metadata::{tables::CodedIndexType, token::Token},
    model::TypeDefOrRef,
    utils::{write_compressed_int, write_compressed_uint},
    Result,
};

/// Callback resolving a type reference inside a signature to its token.
pub type TypeResolver<'r> = dyn FnMut(&TypeDefOrRef) -> Result<Token> + 'r;

#[allow(non_snake_case, dead_code, missing_docs)]
/// Element type bytes of signatures and constants
pub mod ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    // Followed by type
    pub const PTR: u8 = 0x0f;
    // Followed by type
    pub const BYREF: u8 = 0x10;
    // Followed by TypeDefOrRefOrSpecEncoded
    pub const VALUETYPE: u8 = 0x11;
    // Followed by TypeDefOrRefOrSpecEncoded
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    // type rank boundsCount bound1 … loCount lo1 …
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1b;
    pub const OBJECT: u8 = 0x1c;
    pub const SZARRAY: u8 = 0x1d;
    pub const MVAR: u8 = 0x1e;
    pub const CMOD_REQD: u8 = 0x1f;
    pub const CMOD_OPT: u8 = 0x20;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
    // Null reference constant
    pub const CLASS_NULL: u8 = 0x12;
}

#[allow(non_snake_case, dead_code, missing_docs)]
/// Leading bytes of the signature kinds
pub mod CALLING_CONVENTION {
    pub const DEFAULT: u8 = 0x00;
    pub const C: u8 = 0x01;
    pub const STDCALL: u8 = 0x02;
    pub const THISCALL: u8 = 0x03;
    pub const FASTCALL: u8 = 0x04;
    pub const VARARG: u8 = 0x05;
    pub const FIELD: u8 = 0x06;
    pub const LOCAL_SIG: u8 = 0x07;
    pub const PROPERTY: u8 = 0x08;
    pub const GENERICINST: u8 = 0x0a;
    pub const GENERIC: u8 = 0x10;
    pub const HASTHIS: u8 = 0x20;
    pub const EXPLICITTHIS: u8 = 0x40;
}

/// A type inside a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// void
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// System.String
    String,
    /// signed integer, sized to the executing platform
    I,
    /// unsigned integer, sized to the executing platform
    U,
    /// System.Object
    Object,
    /// System.TypedReference
    TypedByRef,
    /// Unmanaged pointer
    Ptr(Box<TypeSig>),
    /// Managed reference
    ByRef(Box<TypeSig>),
    /// Pinned local
    Pinned(Box<TypeSig>),
    /// Value type
    ValueType(TypeDefOrRef),
    /// Reference type
    Class(TypeDefOrRef),
    /// Generic parameter of the enclosing type
    Var(u32),
    /// Generic parameter of the enclosing method
    MVar(u32),
    /// Single dimension array with lower bound 0
    SzArray(Box<TypeSig>),
    /// General array
    Array {
        /// Element type
        element: Box<TypeSig>,
        /// Number of dimensions
        rank: u32,
        /// Sizes of the leading dimensions
        sizes: Vec<u32>,
        /// Lower bounds of the leading dimensions
        lower_bounds: Vec<i32>,
    },
    /// Instantiation of a generic type
    GenericInst {
        /// The generic type definition or reference
        generic: TypeDefOrRef,
        /// Whether the generic type is a value type
        value_type: bool,
        /// Type arguments
        arguments: Vec<TypeSig>,
    },
    /// A type with a custom modifier
    Modified {
        /// `modreq` when true, `modopt` otherwise
        required: bool,
        /// The modifier type
        modifier: TypeDefOrRef,
        /// The modified type
        inner: Box<TypeSig>,
    },
    /// Function pointer
    FnPtr(Box<MethodSignature>),
}

fn write_type_token(ty: &TypeDefOrRef, out: &mut Vec<u8>, resolve: &mut TypeResolver) -> Result<()> {
    let token = resolve(ty)?;
    write_compressed_uint(CodedIndexType::TypeDefOrRef.encode(token)?, out)
}

fn write_count(count: usize, out: &mut Vec<u8>) -> Result<()> {
    let count = u32::try_from(count)
        .map_err(|_| crate::Error::Precondition(format!("signature list too long - {count}")))?;
    write_compressed_uint(count, out)
}

impl TypeSig {
    /// Append the encoding of this type to `out`.
    ///
    /// # Errors
    /// Returns an error if a referenced type can not be resolved or encoded.
    pub fn encode(&self, out: &mut Vec<u8>, resolve: &mut TypeResolver) -> Result<()> {
        match self {
            TypeSig::Void => out.push(ELEMENT_TYPE::VOID),
            TypeSig::Boolean => out.push(ELEMENT_TYPE::BOOLEAN),
            TypeSig::Char => out.push(ELEMENT_TYPE::CHAR),
            TypeSig::I1 => out.push(ELEMENT_TYPE::I1),
            TypeSig::U1 => out.push(ELEMENT_TYPE::U1),
            TypeSig::I2 => out.push(ELEMENT_TYPE::I2),
            TypeSig::U2 => out.push(ELEMENT_TYPE::U2),
            TypeSig::I4 => out.push(ELEMENT_TYPE::I4),
            TypeSig::U4 => out.push(ELEMENT_TYPE::U4),
            TypeSig::I8 => out.push(ELEMENT_TYPE::I8),
            TypeSig::U8 => out.push(ELEMENT_TYPE::U8),
            TypeSig::R4 => out.push(ELEMENT_TYPE::R4),
            TypeSig::R8 => out.push(ELEMENT_TYPE::R8),
            TypeSig::String => out.push(ELEMENT_TYPE::STRING),
            TypeSig::I => out.push(ELEMENT_TYPE::I),
            TypeSig::U => out.push(ELEMENT_TYPE::U),
            TypeSig::Object => out.push(ELEMENT_TYPE::OBJECT),
            TypeSig::TypedByRef => out.push(ELEMENT_TYPE::TYPEDBYREF),
            TypeSig::Ptr(inner) => {
                out.push(ELEMENT_TYPE::PTR);
                inner.encode(out, resolve)?;
            }
            TypeSig::ByRef(inner) => {
                out.push(ELEMENT_TYPE::BYREF);
                inner.encode(out, resolve)?;
            }
            TypeSig::Pinned(inner) => {
                out.push(ELEMENT_TYPE::PINNED);
                inner.encode(out, resolve)?;
            }
            TypeSig::SzArray(inner) => {
                out.push(ELEMENT_TYPE::SZARRAY);
                inner.encode(out, resolve)?;
            }
            TypeSig::ValueType(ty) => {
                out.push(ELEMENT_TYPE::VALUETYPE);
                write_type_token(ty, out, resolve)?;
            }
            TypeSig::Class(ty) => {
                out.push(ELEMENT_TYPE::CLASS);
                write_type_token(ty, out, resolve)?;
            }
            TypeSig::Var(number) => {
                out.push(ELEMENT_TYPE::VAR);
                write_compressed_uint(*number, out)?;
            }
            TypeSig::MVar(number) => {
                out.push(ELEMENT_TYPE::MVAR);
                write_compressed_uint(*number, out)?;
            }
            TypeSig::Array {
                element,
                rank,
                sizes,
                lower_bounds,
            } => {
                out.push(ELEMENT_TYPE::ARRAY);
                element.encode(out, resolve)?;
                write_compressed_uint(*rank, out)?;
                write_count(sizes.len(), out)?;
                for size in sizes {
                    write_compressed_uint(*size, out)?;
                }
                write_count(lower_bounds.len(), out)?;
                for bound in lower_bounds {
                    write_compressed_int(*bound, out)?;
                }
            }
            TypeSig::GenericInst {
                generic,
                value_type,
                arguments,
            } => {
                out.push(ELEMENT_TYPE::GENERICINST);
                out.push(if *value_type {
                    ELEMENT_TYPE::VALUETYPE
                } else {
                    ELEMENT_TYPE::CLASS
                });
                write_type_token(generic, out, resolve)?;
                write_count(arguments.len(), out)?;
                for argument in arguments {
                    argument.encode(out, resolve)?;
                }
            }
            TypeSig::Modified {
                required,
                modifier,
                inner,
            } => {
                out.push(if *required {
                    ELEMENT_TYPE::CMOD_REQD
                } else {
                    ELEMENT_TYPE::CMOD_OPT
                });
                write_type_token(modifier, out, resolve)?;
                inner.encode(out, resolve)?;
            }
            TypeSig::FnPtr(method) => {
                out.push(ELEMENT_TYPE::FNPTR);
                method.encode(out, resolve)?;
            }
        }

        Ok(())
    }

    /// Encode this type as a standalone `TypeSpec` blob.
    ///
    /// # Errors
    /// Returns an error if a referenced type can not be resolved or encoded.
    pub fn to_blob(&self, resolve: &mut TypeResolver) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut out, resolve)?;
        Ok(out)
    }
}

/// Signature of a field (`FieldSig`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSignature {
    /// Type of the field
    pub field_type: TypeSig,
}

impl FieldSignature {
    /// Create a field signature of `field_type`
    #[must_use]
    pub fn new(field_type: TypeSig) -> Self {
        FieldSignature { field_type }
    }

    /// Encode into a blob.
    ///
    /// # Errors
    /// Returns an error if a referenced type can not be resolved or encoded.
    pub fn to_blob(&self, resolve: &mut TypeResolver) -> Result<Vec<u8>> {
        let mut out = vec![CALLING_CONVENTION::FIELD];
        self.field_type.encode(&mut out, resolve)?;
        Ok(out)
    }
}

/// Signature of a method definition, method reference or function pointer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// One of the non-flag values of [`CALLING_CONVENTION`]
    pub calling_convention: u8,
    /// Instance method
    pub has_this: bool,
    /// The `this` parameter is listed explicitly
    pub explicit_this: bool,
    /// Number of generic parameters; 0 for non-generic methods
    pub generic_param_count: u32,
    /// Return type
    pub return_type: TypeSig,
    /// Declared parameters
    pub params: Vec<TypeSig>,
    /// Extra arguments of a vararg call site, emitted after the sentinel
    pub varargs: Vec<TypeSig>,
}

impl MethodSignature {
    /// A static, non-generic method with the default calling convention
    #[must_use]
    pub fn new(return_type: TypeSig, params: Vec<TypeSig>) -> Self {
        MethodSignature {
            calling_convention: CALLING_CONVENTION::DEFAULT,
            has_this: false,
            explicit_this: false,
            generic_param_count: 0,
            return_type,
            params,
            varargs: Vec::new(),
        }
    }

    /// Same signature as an instance method
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.has_this = true;
        self
    }

    /// Same signature with `count` generic parameters
    #[must_use]
    pub fn generic(mut self, count: u32) -> Self {
        self.generic_param_count = count;
        self
    }

    /// Append the encoding of this signature to `out`.
    ///
    /// # Errors
    /// Returns an error if a referenced type can not be resolved or encoded.
    pub fn encode(&self, out: &mut Vec<u8>, resolve: &mut TypeResolver) -> Result<()> {
        let mut leading = self.calling_convention & 0x0F;
        if self.has_this {
            leading |= CALLING_CONVENTION::HASTHIS;
        }
        if self.explicit_this {
            leading |= CALLING_CONVENTION::EXPLICITTHIS;
        }
        if self.generic_param_count > 0 {
            leading |= CALLING_CONVENTION::GENERIC;
        }
        out.push(leading);

        if self.generic_param_count > 0 {
            write_compressed_uint(self.generic_param_count, out)?;
        }
        write_count(self.params.len() + self.varargs.len(), out)?;
        self.return_type.encode(out, resolve)?;
        for param in &self.params {
            param.encode(out, resolve)?;
        }
        if !self.varargs.is_empty() {
            out.push(ELEMENT_TYPE::SENTINEL);
            for param in &self.varargs {
                param.encode(out, resolve)?;
            }
        }

        Ok(())
    }

    /// Encode into a blob.
    ///
    /// # Errors
    /// Returns an error if a referenced type can not be resolved or encoded.
    pub fn to_blob(&self, resolve: &mut TypeResolver) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut out, resolve)?;
        Ok(out)
    }
}

/// Signature of a property (`PropertySig`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertySignature {
    /// Instance property
    pub has_this: bool,
    /// Type of the property
    pub property_type: TypeSig,
    /// Index parameters
    pub params: Vec<TypeSig>,
}

impl PropertySignature {
    /// Encode into a blob.
    ///
    /// # Errors
    /// Returns an error if a referenced type can not be resolved or encoded.
    pub fn to_blob(&self, resolve: &mut TypeResolver) -> Result<Vec<u8>> {
        let mut out = vec![if self.has_this {
            CALLING_CONVENTION::PROPERTY | CALLING_CONVENTION::HASTHIS
        } else {
            CALLING_CONVENTION::PROPERTY
        }];
        write_count(self.params.len(), &mut out)?;
        self.property_type.encode(&mut out, resolve)?;
        for param in &self.params {
            param.encode(&mut out, resolve)?;
        }
        Ok(out)
    }
}

/// Local variable list of a method body (`LocalVarSig`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LocalVariablesSignature {
    /// Types of the locals, [`TypeSig::Pinned`] for pinned ones
    pub locals: Vec<TypeSig>,
}

impl LocalVariablesSignature {
    /// Encode into a blob.
    ///
    /// # Errors
    /// Returns an error if a referenced type can not be resolved or encoded.
    pub fn to_blob(&self, resolve: &mut TypeResolver) -> Result<Vec<u8>> {
        let mut out = vec![CALLING_CONVENTION::LOCAL_SIG];
        write_count(self.locals.len(), &mut out)?;
        for local in &self.locals {
            local.encode(&mut out, resolve)?;
        }
        Ok(out)
    }
}

/// Generic arguments of a method instantiation (`MethodSpec`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSpecSignature {
    /// The type arguments
    pub arguments: Vec<TypeSig>,
}

impl MethodSpecSignature {
    /// Encode into a blob.
    ///
    /// # Errors
    /// Returns an error if a referenced type can not be resolved or encoded.
    pub fn to_blob(&self, resolve: &mut TypeResolver) -> Result<Vec<u8>> {
        let mut out = vec![CALLING_CONVENTION::GENERICINST];
        write_count(self.arguments.len(), &mut out)?;
        for argument in &self.arguments {
            argument.encode(&mut out, resolve)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::tables::TableId,
        model::{ImageId, TypeRefHandle},
    };

    fn type_ref(index: usize) -> TypeDefOrRef {
        TypeDefOrRef::Reference(TypeRefHandle {
            image: ImageId::next(),
            index,
        })
    }

    fn resolve_refs(ty: &TypeDefOrRef) -> Result<Token> {
        match ty {
            TypeDefOrRef::Reference(handle) => {
                Ok(Token::from_parts(TableId::TypeRef, handle.index() as u32 + 1))
            }
            _ => Ok(Token::from_parts(TableId::TypeDef, 1)),
        }
    }

    #[test]
    fn field_signature() {
        let signature = FieldSignature::new(TypeSig::SzArray(Box::new(TypeSig::Class(type_ref(2)))));
        let blob = signature.to_blob(&mut resolve_refs).unwrap();
        // TypeRef rid 3 -> (3 << 2) | 1
        assert_eq!(blob, [0x06, 0x1D, 0x12, 0x0D]);
    }

    #[test]
    fn method_signature_flags() {
        let signature = MethodSignature::new(TypeSig::MVar(0), vec![TypeSig::MVar(0)])
            .instance()
            .generic(1);
        let blob = signature.to_blob(&mut resolve_refs).unwrap();
        assert_eq!(blob, [0x30, 0x01, 0x01, 0x1E, 0x00, 0x1E, 0x00]);

        let mut vararg = MethodSignature::new(TypeSig::Void, vec![TypeSig::String]);
        vararg.calling_convention = CALLING_CONVENTION::VARARG;
        vararg.varargs.push(TypeSig::I4);
        let blob = vararg.to_blob(&mut resolve_refs).unwrap();
        assert_eq!(blob, [0x05, 0x02, 0x01, 0x0E, 0x41, 0x08]);
    }

    #[test]
    fn generic_instance_and_array() {
        let list = TypeSig::GenericInst {
            generic: type_ref(0),
            value_type: false,
            arguments: vec![TypeSig::I4],
        };
        let blob = list.to_blob(&mut resolve_refs).unwrap();
        assert_eq!(blob, [0x15, 0x12, 0x05, 0x01, 0x08]);

        let matrix = TypeSig::Array {
            element: Box::new(TypeSig::R8),
            rank: 2,
            sizes: vec![3],
            lower_bounds: vec![0, -1],
        };
        let blob = matrix.to_blob(&mut resolve_refs).unwrap();
        assert_eq!(blob, [0x14, 0x0D, 0x02, 0x01, 0x03, 0x02, 0x00, 0x7F]);
    }

    #[test]
    fn modifiers_and_pointers() {
        let cases = [
            (
                TypeSig::Modified {
                    required: true,
                    modifier: type_ref(0),
                    inner: Box::new(TypeSig::I4),
                },
                vec![0x1F, 0x05, 0x08],
            ),
            (
                TypeSig::Modified {
                    required: false,
                    modifier: type_ref(0),
                    inner: Box::new(TypeSig::TypedByRef),
                },
                vec![0x20, 0x05, 0x16],
            ),
            (
                TypeSig::FnPtr(Box::new(MethodSignature::new(TypeSig::Void, vec![TypeSig::I4]))),
                vec![0x1B, 0x00, 0x01, 0x01, 0x08],
            ),
            (
                TypeSig::Ptr(Box::new(TypeSig::ByRef(Box::new(TypeSig::U)))),
                vec![0x0F, 0x10, 0x19],
            ),
        ];

        for (signature, expected) in cases {
            assert_eq!(signature.to_blob(&mut resolve_refs).unwrap(), expected);
        }
    }

    #[test]
    fn property_locals_and_spec() {
        let property = PropertySignature {
            has_this: true,
            property_type: TypeSig::I4,
            params: vec![TypeSig::String],
        };
        assert_eq!(
            property.to_blob(&mut resolve_refs).unwrap(),
            [0x28, 0x01, 0x08, 0x0E]
        );

        let locals = LocalVariablesSignature {
            locals: vec![TypeSig::Pinned(Box::new(TypeSig::ByRef(Box::new(TypeSig::U1))))],
        };
        assert_eq!(
            locals.to_blob(&mut resolve_refs).unwrap(),
            [0x07, 0x01, 0x45, 0x10, 0x05]
        );

        let spec = MethodSpecSignature {
            arguments: vec![TypeSig::Object, TypeSig::Char],
        };
        assert_eq!(
            spec.to_blob(&mut resolve_refs).unwrap(),
            [0x0A, 0x02, 0x1C, 0x03]
        );
    }

    #[test]
    fn unresolvable_type() {
        let signature = FieldSignature::new(TypeSig::Class(type_ref(0)));
        let result = signature.to_blob(&mut |_| Ok(Token::from_parts(TableId::MemberRef, 1)));
        assert!(matches!(
            result,
            Err(crate::Error::UnsupportedReference { .. })
        ));
    }
}
