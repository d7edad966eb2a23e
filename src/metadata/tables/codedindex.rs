//! # Coded Index Groups
//!
//! Coded indices combine a table tag and a row id into one integer: the low `bits` bits hold
//! the position of the referenced table inside its group, the remaining bits the row id. The
//! group membership is fixed by ECMA-335 II.24.2.6 and modelled here as a static table, shared
//! by the reader and the writer.
//!
//! Whether a coded index column is stored with 2 or 4 bytes depends on the row counts of the
//! member tables; that decision lives in [`crate::metadata::tables::TableInfo`].
//!
//! ## References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Section II.24.2.6

use strum::{EnumCount, EnumIter};

use crate::{
    metadata::{tables::TableId, token::Token},
    Error, Result,
};

/// The 13 coded index groups of ECMA-335.
///
/// ## Encoding Scheme
///
/// `coded = (rid << bits) | slot` where `slot` is the table's position in
/// [`CodedIndexType::slots`] and `bits = ceil(log2(slot count))`.
///
/// ## Examples
///
/// ```rust
/// use dotemit::metadata::{tables::{CodedIndexType, TableId}, token::Token};
///
/// let token = Token::from_parts(TableId::TypeRef, 3);
/// let coded = CodedIndexType::TypeDefOrRef.encode(token)?;
/// assert_eq!(coded, (3 << 2) | 1);
/// assert_eq!(CodedIndexType::TypeDefOrRef.decode(coded)?, token);
/// # Ok::<(), dotemit::Error>(())
/// ```
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CodedIndexType {
    /// `TypeDef`, `TypeRef` or `TypeSpec`.
    TypeDefOrRef,
    /// `Field`, `Param` or `Property` - owners of a `Constant` row.
    HasConstant,
    /// Any of the 22 tables a custom attribute can be attached to.
    HasCustomAttribute,
    /// `Field` or `Param` - owners of a `FieldMarshal` row.
    HasFieldMarshal,
    /// `TypeDef`, `MethodDef` or `Assembly` - owners of a `DeclSecurity` row.
    HasDeclSecurity,
    /// `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef` or `TypeSpec` - parents of member references.
    MemberRefParent,
    /// `Event` or `Property` - associations of `MethodSemantics` rows.
    HasSemantics,
    /// `MethodDef` or `MemberRef`.
    MethodDefOrRef,
    /// `Field` or `MethodDef` - members forwarded through `ImplMap`.
    MemberForwarded,
    /// `File`, `AssemblyRef` or `ExportedType` - where an exported type or resource lives.
    Implementation,
    /// `MethodDef` or `MemberRef` in slots 2 and 3; slots 0, 1 and 4 are reserved.
    CustomAttributeType,
    /// `Module`, `ModuleRef`, `AssemblyRef` or `TypeRef` - scope of a type reference.
    ResolutionScope,
    /// `TypeDef` or `MethodDef` - owners of generic parameters.
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// The slots of the group in encoding order; `None` marks a reserved slot.
    #[must_use]
    pub fn slots(&self) -> &'static [Option<TableId>] {
        match self {
            CodedIndexType::TypeDefOrRef => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasConstant => &[
                Some(TableId::Field),
                Some(TableId::Param),
                Some(TableId::Property),
            ],
            CodedIndexType::HasCustomAttribute => &[
                Some(TableId::MethodDef),
                Some(TableId::Field),
                Some(TableId::TypeRef),
                Some(TableId::TypeDef),
                Some(TableId::Param),
                Some(TableId::InterfaceImpl),
                Some(TableId::MemberRef),
                Some(TableId::Module),
                // Labelled 'Permission' in the standard, which names the DeclSecurity table
                Some(TableId::DeclSecurity),
                Some(TableId::Property),
                Some(TableId::Event),
                Some(TableId::StandAloneSig),
                Some(TableId::ModuleRef),
                Some(TableId::TypeSpec),
                Some(TableId::Assembly),
                Some(TableId::AssemblyRef),
                Some(TableId::File),
                Some(TableId::ExportedType),
                Some(TableId::ManifestResource),
                Some(TableId::GenericParam),
                Some(TableId::GenericParamConstraint),
                Some(TableId::MethodSpec),
            ],
            CodedIndexType::HasFieldMarshal => &[Some(TableId::Field), Some(TableId::Param)],
            CodedIndexType::HasDeclSecurity => &[
                Some(TableId::TypeDef),
                Some(TableId::MethodDef),
                Some(TableId::Assembly),
            ],
            CodedIndexType::MemberRefParent => &[
                Some(TableId::TypeDef),
                Some(TableId::TypeRef),
                Some(TableId::ModuleRef),
                Some(TableId::MethodDef),
                Some(TableId::TypeSpec),
            ],
            CodedIndexType::HasSemantics => &[Some(TableId::Event), Some(TableId::Property)],
            CodedIndexType::MethodDefOrRef => {
                &[Some(TableId::MethodDef), Some(TableId::MemberRef)]
            }
            CodedIndexType::MemberForwarded => &[Some(TableId::Field), Some(TableId::MethodDef)],
            CodedIndexType::Implementation => &[
                Some(TableId::File),
                Some(TableId::AssemblyRef),
                Some(TableId::ExportedType),
            ],
            CodedIndexType::CustomAttributeType => &[
                None,
                None,
                Some(TableId::MethodDef),
                Some(TableId::MemberRef),
                None,
            ],
            CodedIndexType::ResolutionScope => &[
                Some(TableId::Module),
                Some(TableId::ModuleRef),
                Some(TableId::AssemblyRef),
                Some(TableId::TypeRef),
            ],
            CodedIndexType::TypeOrMethodDef => &[Some(TableId::TypeDef), Some(TableId::MethodDef)],
        }
    }

    /// Width of the tag in bits
    #[must_use]
    pub fn bits(&self) -> u8 {
        match self {
            CodedIndexType::HasFieldMarshal
            | CodedIndexType::HasSemantics
            | CodedIndexType::MethodDefOrRef
            | CodedIndexType::MemberForwarded
            | CodedIndexType::TypeOrMethodDef => 1,
            CodedIndexType::TypeDefOrRef
            | CodedIndexType::HasConstant
            | CodedIndexType::HasDeclSecurity
            | CodedIndexType::Implementation
            | CodedIndexType::ResolutionScope => 2,
            CodedIndexType::MemberRefParent | CodedIndexType::CustomAttributeType => 3,
            CodedIndexType::HasCustomAttribute => 5,
        }
    }

    /// The member tables of the group, without reserved slots
    pub fn tables(&self) -> impl Iterator<Item = TableId> {
        self.slots().iter().filter_map(|slot| *slot)
    }

    /// Position of `table` inside the group
    #[must_use]
    pub fn position(&self, table: TableId) -> Option<u32> {
        self.slots()
            .iter()
            .position(|slot| *slot == Some(table))
            .and_then(|position| u32::try_from(position).ok())
    }

    /// Encode a token as a coded index of this group.
    ///
    /// The null token encodes to 0.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedReference`] if the token's table is not a member of the
    /// group, and [`crate::Error::Malformed`] if the row id does not fit next to the tag.
    pub fn encode(&self, token: Token) -> Result<u32> {
        if token.is_null() {
            return Ok(0);
        }

        let slot = token
            .table_id()
            .and_then(|table| self.position(table))
            .ok_or(Error::UnsupportedReference {
                coded_index: *self,
                token,
            })?;

        let rid = token.row();
        if rid == 0 {
            return Err(malformed_error!("{} has no row id", token));
        }
        if rid.leading_zeros() < u32::from(self.bits()) {
            return Err(malformed_error!(
                "Row {} of {} does not fit a {:?} coded index",
                rid,
                token,
                self
            ));
        }

        Ok((rid << self.bits()) | slot)
    }

    /// Decode a coded index of this group into a token.
    ///
    /// This only checks the encoding itself; [`crate::metadata::tables::TableInfo::decode_coded_index`]
    /// additionally checks that the target table is present in the image.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for the value 0, for a zero row id and for tags
    /// outside the group or pointing to a reserved slot.
    pub fn decode(&self, coded: u32) -> Result<Token> {
        if coded == 0 {
            return Err(malformed_error!("Null {:?} coded index can not be decoded", self));
        }

        let tag = coded & ((1 << self.bits()) - 1);
        let rid = coded >> self.bits();
        if rid == 0 {
            return Err(malformed_error!(
                "{:?} coded index 0x{:x} points to row 0",
                self,
                coded
            ));
        }

        match self.slots().get(tag as usize) {
            Some(Some(table)) => Ok(Token::from_parts(*table, rid)),
            Some(None) => Err(malformed_error!(
                "{:?} coded index 0x{:x} uses reserved tag {}",
                self,
                coded,
                tag
            )),
            None => Err(malformed_error!(
                "{:?} coded index 0x{:x} has out of range tag {}",
                self,
                coded,
                tag
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn bits_cover_slots() {
        for group in CodedIndexType::iter() {
            let slots = group.slots().len();
            assert!(slots <= 1 << group.bits(), "{group:?}");
            assert!(slots > 1 << (group.bits() - 1), "{group:?}");
        }
    }

    #[test]
    fn group_sizes() {
        assert_eq!(CodedIndexType::HasCustomAttribute.tables().count(), 22);
        assert_eq!(CodedIndexType::CustomAttributeType.tables().count(), 2);
        assert_eq!(CodedIndexType::MemberRefParent.tables().count(), 5);
        assert_eq!(CodedIndexType::ResolutionScope.tables().count(), 4);
    }

    #[test]
    fn bijection() {
        for group in CodedIndexType::iter() {
            for table in group.tables() {
                for rid in [1, 2, 0x7FF, 0xFFFF, 0x7_FFFF] {
                    let token = Token::from_parts(table, rid);
                    let coded = group.encode(token).unwrap();
                    assert_eq!(group.decode(coded).unwrap(), token, "{group:?} {token:?}");
                }
            }
        }
    }

    #[test]
    fn known_values() {
        let ctor = Token::from_parts(TableId::MemberRef, 7);
        assert_eq!(
            CodedIndexType::CustomAttributeType.encode(ctor).unwrap(),
            (7 << 3) | 3
        );

        let perm = Token::from_parts(TableId::DeclSecurity, 1);
        assert_eq!(
            CodedIndexType::HasCustomAttribute.encode(perm).unwrap(),
            (1 << 5) | 8
        );
    }

    #[test]
    fn null_and_foreign() {
        assert_eq!(CodedIndexType::TypeDefOrRef.encode(Token::NULL).unwrap(), 0);
        assert!(CodedIndexType::TypeDefOrRef.decode(0).is_err());
        assert!(CodedIndexType::TypeDefOrRef.decode(1).is_err());

        let field = Token::from_parts(TableId::Field, 1);
        assert!(matches!(
            CodedIndexType::TypeDefOrRef.encode(field),
            Err(Error::UnsupportedReference {
                coded_index: CodedIndexType::TypeDefOrRef,
                ..
            })
        ));

        let user_string = Token::new(0x7000_0001);
        assert!(CodedIndexType::HasCustomAttribute.encode(user_string).is_err());
    }

    #[test]
    fn invalid_tags() {
        // Tag 3 does not exist in TypeDefOrRef
        assert!(CodedIndexType::TypeDefOrRef.decode((1 << 2) | 3).is_err());
        // Tags 0, 1 and 4 are reserved in CustomAttributeType
        for tag in [0, 1, 4] {
            assert!(CodedIndexType::CustomAttributeType
                .decode((1 << 3) | tag)
                .is_err());
        }
        // Tags 5..=7 are beyond the CustomAttributeType slots
        assert!(CodedIndexType::CustomAttributeType
            .decode((1 << 3) | 6)
            .is_err());
    }

    #[test]
    fn oversized_rid() {
        let token = Token::from_parts(TableId::MethodDef, 0x00FF_FFFF);
        assert!(CodedIndexType::HasCustomAttribute.encode(token).is_ok());
        assert!(CodedIndexType::TypeOrMethodDef.encode(token).is_ok());
    }
}
