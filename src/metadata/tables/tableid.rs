use strum::{Display, EnumCount, EnumIter, EnumString, FromRepr};

/// Identifiers for the 45 metadata tables defined in ECMA-335 Partition II, Section 22.
///
/// The discriminant of every variant is the table's number, which is also the high byte of
/// the tokens pointing into it and the bit position in the `valid`/`sorted` masks of the
/// `#~` header. All numbers from `0x00` to `0x2C` are assigned, including the `*Ptr`
/// indirection tables of unoptimized (`#-`) metadata and the edit-and-continue tables.
///
/// ## Table Categories
///
/// ### Core Type System
/// - **`Module`**, **`TypeRef`**, **`TypeDef`**, **`Field`**, **`MethodDef`**, **`Param`**
///
/// ### Type Relationships
/// - **`InterfaceImpl`**, **`NestedClass`**, **`ClassLayout`**, **`FieldLayout`**
///
/// ### Member References and Implementations
/// - **`MemberRef`**, **`MethodImpl`**, **`MethodSemantics`**, **`MethodSpec`**
///
/// ### Metadata and Attributes
/// - **`CustomAttribute`**, **`Constant`**, **`FieldMarshal`**, **`DeclSecurity`**
///
/// ### Signatures and Generics
/// - **`StandAloneSig`**, **`TypeSpec`**, **`GenericParam`**, **`GenericParamConstraint`**
///
/// ### Events and Properties
/// - **`Event`**, **`EventMap`**, **`Property`**, **`PropertyMap`**
///
/// ### Assembly Information
/// - **`Assembly`**, **`AssemblyRef`** and their processor/OS side tables
///
/// ### Files, Resources and Interop
/// - **`File`**, **`ExportedType`**, **`ManifestResource`**, **`ImplMap`**, **`FieldRVA`**,
///   **`ModuleRef`**
///
/// ### Indirection and Edit-and-Continue
/// - **`FieldPtr`**, **`MethodPtr`**, **`ParamPtr`**, **`EventPtr`**, **`PropertyPtr`**,
///   **`EncLog`**, **`EncMap`**
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, EnumIter, EnumCount, FromRepr,
    Display, EnumString,
)]
#[repr(u8)]
pub enum TableId {
    /// `Module` table (0x00) - The single row describing the current module.
    Module = 0x00,
    /// `TypeRef` table (0x01) - References to types defined elsewhere.
    TypeRef = 0x01,
    /// `TypeDef` table (0x02) - Types defined in this module.
    TypeDef = 0x02,
    /// `FieldPtr` table (0x03) - Field indirection for unoptimized metadata.
    FieldPtr = 0x03,
    /// `Field` table (0x04) - Field definitions.
    Field = 0x04,
    /// `MethodPtr` table (0x05) - Method indirection for unoptimized metadata.
    MethodPtr = 0x05,
    /// `MethodDef` table (0x06) - Method definitions.
    MethodDef = 0x06,
    /// `ParamPtr` table (0x07) - Parameter indirection for unoptimized metadata.
    ParamPtr = 0x07,
    /// `Param` table (0x08) - Parameter definitions.
    Param = 0x08,
    /// `InterfaceImpl` table (0x09) - Interfaces implemented by types.
    InterfaceImpl = 0x09,
    /// `MemberRef` table (0x0A) - References to fields and methods.
    MemberRef = 0x0A,
    /// `Constant` table (0x0B) - Default values of fields, parameters and properties.
    Constant = 0x0B,
    /// `CustomAttribute` table (0x0C) - Custom attribute applications.
    CustomAttribute = 0x0C,
    /// `FieldMarshal` table (0x0D) - Interop marshalling descriptors.
    FieldMarshal = 0x0D,
    /// `DeclSecurity` table (0x0E) - Declarative security permission sets.
    DeclSecurity = 0x0E,
    /// `ClassLayout` table (0x0F) - Explicit packing and size of types.
    ClassLayout = 0x0F,
    /// `FieldLayout` table (0x10) - Explicit field offsets.
    FieldLayout = 0x10,
    /// `StandAloneSig` table (0x11) - Local variable and call-site signatures.
    StandAloneSig = 0x11,
    /// `EventMap` table (0x12) - Maps types to their event runs.
    EventMap = 0x12,
    /// `EventPtr` table (0x13) - Event indirection for unoptimized metadata.
    EventPtr = 0x13,
    /// `Event` table (0x14) - Event definitions.
    Event = 0x14,
    /// `PropertyMap` table (0x15) - Maps types to their property runs.
    PropertyMap = 0x15,
    /// `PropertyPtr` table (0x16) - Property indirection for unoptimized metadata.
    PropertyPtr = 0x16,
    /// `Property` table (0x17) - Property definitions.
    Property = 0x17,
    /// `MethodSemantics` table (0x18) - Accessor methods of properties and events.
    MethodSemantics = 0x18,
    /// `MethodImpl` table (0x19) - Explicit method overrides.
    MethodImpl = 0x19,
    /// `ModuleRef` table (0x1A) - References to other modules.
    ModuleRef = 0x1A,
    /// `TypeSpec` table (0x1B) - Constructed types described by a signature.
    TypeSpec = 0x1B,
    /// `ImplMap` table (0x1C) - P/Invoke forwarding information.
    ImplMap = 0x1C,
    /// `FieldRVA` table (0x1D) - Initial data of fields.
    FieldRVA = 0x1D,
    /// `EncLog` table (0x1E) - Edit-and-continue log.
    EncLog = 0x1E,
    /// `EncMap` table (0x1F) - Edit-and-continue token map.
    EncMap = 0x1F,
    /// `Assembly` table (0x20) - The assembly manifest.
    Assembly = 0x20,
    /// `AssemblyProcessor` table (0x21) - Unused processor record.
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` table (0x22) - Unused operating system record.
    AssemblyOS = 0x22,
    /// `AssemblyRef` table (0x23) - Referenced assemblies.
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` table (0x24) - Unused processor record of a reference.
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` table (0x25) - Unused operating system record of a reference.
    AssemblyRefOS = 0x25,
    /// `File` table (0x26) - Other files of a multi-file assembly.
    File = 0x26,
    /// `ExportedType` table (0x27) - Types exported from other modules or forwarded.
    ExportedType = 0x27,
    /// `ManifestResource` table (0x28) - Embedded and linked resources.
    ManifestResource = 0x28,
    /// `NestedClass` table (0x29) - Nesting relationships between types.
    NestedClass = 0x29,
    /// `GenericParam` table (0x2A) - Generic parameters of types and methods.
    GenericParam = 0x2A,
    /// `MethodSpec` table (0x2B) - Generic method instantiations.
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` table (0x2C) - Constraints on generic parameters.
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Bit of this table in the `valid` and `sorted` masks
    #[must_use]
    pub fn mask(self) -> u64 {
        1_u64 << (self as u8)
    }

    /// Tables that ECMA-335 II.22 requires to be sorted by their primary key column.
    pub const SORTED: [TableId; 14] = [
        TableId::InterfaceImpl,
        TableId::Constant,
        TableId::CustomAttribute,
        TableId::FieldMarshal,
        TableId::DeclSecurity,
        TableId::ClassLayout,
        TableId::FieldLayout,
        TableId::MethodSemantics,
        TableId::MethodImpl,
        TableId::ImplMap,
        TableId::FieldRVA,
        TableId::NestedClass,
        TableId::GenericParam,
        TableId::GenericParamConstraint,
    ];

    /// Whether the table must be kept sorted by its primary key
    #[must_use]
    pub fn is_sorted_table(self) -> bool {
        Self::SORTED.contains(&self)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::{EnumCount, IntoEnumIterator};

    use super::*;

    #[test]
    fn dense_numbering() {
        assert_eq!(TableId::COUNT, 45);
        for (expected, table) in TableId::iter().enumerate() {
            assert_eq!(table as usize, expected);
            assert_eq!(TableId::from_repr(expected as u8), Some(table));
        }
        assert_eq!(TableId::from_repr(0x2D), None);
    }

    #[test]
    fn names() {
        assert_eq!(TableId::from_str("TypeDef").unwrap(), TableId::TypeDef);
        assert_eq!(TableId::MethodDef.to_string(), "MethodDef");
        assert!(TableId::from_str("Document").is_err());
    }

    #[test]
    fn masks() {
        assert_eq!(TableId::Module.mask(), 1);
        assert_eq!(TableId::GenericParamConstraint.mask(), 1 << 0x2C);
        assert!(TableId::NestedClass.is_sorted_table());
        assert!(!TableId::TypeDef.is_sorted_table());
    }
}
