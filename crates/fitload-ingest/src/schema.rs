//! Schema descriptor model
//!
//! Immutable description of a message's field/subfield/component/enum
//! structure, as handed in by the upstream decoder. The same
//! classification ([`SlotType`]) applies at every nesting level, so a
//! field and its subfields can never diverge in how their types render.

use crate::message::RawValue;
use serde::{Deserialize, Serialize};

/// In-band marker left in the output wherever a descriptor could not be
/// resolved; the anomaly stays visible downstream instead of being dropped.
pub const SENTINEL: &str = "additional processing required";

/// Primitive wire type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseType {
    /// Format code (struct-style pack character)
    pub fmt: String,

    /// Wire identifier byte
    pub identifier: u8,

    /// Type name, e.g. `uint16`
    pub name: String,

    /// Size in bytes
    pub size: u8,

    /// Numeric type id
    pub type_num: u8,
}

/// Key of an enum mapping entry
///
/// Source mappings may key on integers; the full projection coerces every
/// key to a string for stored-document compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumKey {
    Num(i64),
    Text(String),
}

impl std::fmt::Display for EnumKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnumKey::Num(n) => write!(f, "{}", n),
            EnumKey::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Named field type: a plain alias or an enum mapping over a base type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldType {
    /// Type name, e.g. `sport`
    pub name: String,

    /// Underlying primitive type
    pub base_type: BaseType,

    /// Raw code -> label table, when the type is an enum
    pub enum_map: Option<Vec<(EnumKey, String)>>,
}

impl FieldType {
    /// Whether this named type carries an enum mapping
    pub fn is_enum(&self) -> bool {
        self.enum_map.is_some()
    }
}

/// Classified type of a field, subfield, or component slot
///
/// `Other` is the schema-mismatch arm: a descriptor kind the classifier
/// cannot resolve, carrying whatever tag the decoder reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlotType {
    Base(BaseType),
    Named(FieldType),
    Other(String),
}

/// Bit-packed sub-value within a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentField {
    pub name: String,
    pub bit_offset: u16,
    pub bits: u8,
    pub def_num: u8,
    pub field_type: Option<String>,
    pub offset: Option<f64>,
    pub scale: Option<f64>,
    pub units: Option<String>,
}

/// Field whose already-decoded value selects a subfield interpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceField {
    pub def_num: u8,
    pub name: String,
    pub raw_value: RawValue,
    pub value: RawValue,
}

/// Alternate interpretation of a field slot, selected by a reference field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubField {
    pub name: String,
    pub slot: SlotType,
    pub field_type: Option<String>,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub units: Option<String>,
    pub components: Option<Vec<ComponentField>>,
    pub def_num: u8,
    pub base_type: BaseType,
    pub ref_fields: Vec<ReferenceField>,
}

/// Descriptor for one field of a message type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub slot: SlotType,
    pub field_type: Option<String>,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub units: Option<String>,
    pub components: Option<Vec<ComponentField>>,
    pub subfields: Option<Vec<SubField>>,
    pub def_num: u8,
    pub base_type: BaseType,
}

/// The descriptor a decoded value was bound to: a field, or the subfield
/// interpretation a reference field selected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldBinding {
    Field(Field),
    SubField(SubField),
}

/// Message-type descriptor with its field dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageType {
    pub name: String,
    pub mesg_num: u16,
    pub fields: Vec<Field>,
}

/// One declared field of a definition message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub def_num: u8,
    pub name: String,
    pub size: u8,
    pub is_dev: bool,
    pub base_type: BaseType,
    pub slot: SlotType,
    pub field: Option<FieldBinding>,
}

impl FieldDefinition {
    /// Subfields of the bound field descriptor, when any are declared
    ///
    /// An empty declared list counts as absent.
    pub fn subfields(&self) -> Option<&[SubField]> {
        match &self.field {
            Some(FieldBinding::Field(field)) => {
                field.subfields.as_deref().filter(|s| !s.is_empty())
            },
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;

    /// A uint8-style base type usable across module tests
    pub(crate) fn base_type(name: &str) -> BaseType {
        BaseType {
            fmt: "B".to_string(),
            identifier: 2,
            name: name.to_string(),
            size: 1,
            type_num: 2,
        }
    }

    /// A named enum type with integer keys
    pub(crate) fn sport_enum() -> FieldType {
        FieldType {
            name: "sport".to_string(),
            base_type: base_type("enum"),
            enum_map: Some(vec![
                (EnumKey::Num(1), "run".to_string()),
                (EnumKey::Num(2), "bike".to_string()),
            ]),
        }
    }

    #[test]
    fn test_enum_key_display() {
        assert_eq!(EnumKey::Num(1).to_string(), "1");
        assert_eq!(EnumKey::Text("on".into()).to_string(), "on");
    }

    #[test]
    fn test_field_type_is_enum() {
        assert!(sport_enum().is_enum());

        let alias = FieldType {
            name: "date_time".to_string(),
            base_type: base_type("uint32"),
            enum_map: None,
        };
        assert!(!alias.is_enum());
    }

    #[test]
    fn test_field_definition_subfields_only_from_field_binding() {
        let mut field = Field {
            name: "event".to_string(),
            slot: SlotType::Base(base_type("uint8")),
            field_type: None,
            scale: None,
            offset: None,
            units: None,
            components: None,
            subfields: None,
            def_num: 0,
            base_type: base_type("uint8"),
        };

        let def = FieldDefinition {
            def_num: 0,
            name: "event".to_string(),
            size: 1,
            is_dev: false,
            base_type: base_type("uint8"),
            slot: SlotType::Base(base_type("uint8")),
            field: Some(FieldBinding::Field(field.clone())),
        };
        assert!(def.subfields().is_none());

        field.subfields = Some(vec![SubField {
            name: "gear_change_data".to_string(),
            slot: SlotType::Base(base_type("uint32")),
            field_type: None,
            scale: None,
            offset: None,
            units: None,
            components: None,
            def_num: 0,
            base_type: base_type("uint32"),
            ref_fields: Vec::new(),
        }]);
        let def = FieldDefinition {
            field: Some(FieldBinding::Field(field)),
            ..def
        };
        assert_eq!(def.subfields().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_subfield_list_counts_as_absent() {
        let field = Field {
            name: "event".to_string(),
            slot: SlotType::Base(base_type("uint8")),
            field_type: None,
            scale: None,
            offset: None,
            units: None,
            components: None,
            subfields: Some(Vec::new()),
            def_num: 0,
            base_type: base_type("uint8"),
        };
        let def = FieldDefinition {
            def_num: 0,
            name: "event".to_string(),
            size: 1,
            is_dev: false,
            base_type: base_type("uint8"),
            slot: SlotType::Base(base_type("uint8")),
            field: Some(FieldBinding::Field(field)),
        };
        assert!(def.subfields().is_none());
    }
}
