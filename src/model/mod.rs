//! Object model of a module under construction.
//!
//! The model is what [`crate::builder::MetadataBuffer`] turns into metadata tables. It is
//! deliberately thin: records carry flags, names, signature values and the encoded blobs (custom
//! attribute values, marshal descriptors, permission sets, method bodies) that other layers
//! produce. Semantic checks beyond handle ownership are not performed.
//!
//! # Key Components
//!
//! - [`ModuleImage`] - Arena owner and handle factory
//! - [`TypeDefOrRef`], [`ResolutionScope`], [`MemberRefParent`], [`MethodDefOrRef`],
//!   [`Implementation`] - The closed variants of coded index columns
//! - [`TypeSig`] and the signature records - Encoded into blobs at build time
//! - [`attributes`] - Flag types of the definition rows

pub mod attributes;
mod definitions;
mod image;
mod references;
pub mod signatures;

pub use attributes::{
    AssemblyFlags, AssemblyHashAlgorithm, EventAttributes, FieldAttributes, FileAttributes,
    GenericParamAttributes, ManifestResourceAttributes, MethodAttributes, MethodImplAttributes,
    MethodSemanticsAttributes, PInvokeAttributes, ParamAttributes, PropertyAttributes,
    TypeAttributes,
};
pub use definitions::{
    AssemblyDefinition, ClassLayout, Constant, CustomAttribute, EventDefinition, FieldDefinition,
    GenericParameter, InterfaceImplementation, MethodDefinition, MethodImplementation,
    ModuleDefinition, PInvokeMap, ParameterDefinition, PropertyDefinition, SecurityDeclaration,
    TypeDefinition,
};
pub use image::{
    AssemblyRefHandle, ExportedTypeHandle, FieldDefHandle, FileHandle, ImageId, MemberRefHandle,
    MethodDefHandle, MethodSpecHandle, ModuleImage, ModuleRefHandle, StandAloneSigHandle,
    TypeDefHandle, TypeRefHandle, TypeSpecHandle,
};
pub use references::{
    public_key_token, AssemblyReference, ExportedType, FileReference, Implementation,
    ManifestResource, MemberRefParent, MemberRefSignature, MemberReference, MethodDefOrRef,
    MethodSpecification, ModuleReference, OperatingSystem, ResolutionScope, StandAloneSignature,
    TypeDefOrRef, TypeReference, TypeSpecification, Version,
};
pub use signatures::{
    FieldSignature, LocalVariablesSignature, MethodSignature, MethodSpecSignature,
    PropertySignature, TypeResolver, TypeSig, CALLING_CONVENTION, ELEMENT_TYPE,
};
