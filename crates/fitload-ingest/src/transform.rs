//! Schema-aware projection engine
//!
//! Produces both output shapes for one decoded message: the lossless
//! hierarchical *full* tree that mirrors the source schema, and the
//! single-level *flat* record whose keys and values are safe for a
//! document store.
//!
//! One recursive renderer walks the descriptor model, parameterized by
//! [`Scope`], so the two shapes are derived from the same traversal and
//! cannot drift apart. Pure function of (message, schema): no side effects
//! beyond log entries for schema mismatches.

use crate::message::{
    CrcMessage, DataMessage, DefinitionMessage, FieldValue, HeaderMessage, Message, RawValue,
    UnknownFrame,
};
use crate::normalize::normalize;
use crate::schema::{
    BaseType, ComponentField, EnumKey, Field, FieldBinding, FieldDefinition, FieldType,
    MessageType, ReferenceField, SlotType, SubField, SENTINEL,
};
use serde_json::{json, Map, Value};
use tracing::error;

/// Projection scope: the full tree keeps every known descriptor level,
/// the db scope keeps only what a flat store-safe record needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Full,
    Db,
}

/// Both projections of one message
#[derive(Debug, Clone)]
pub struct Projection {
    /// Single-level store-safe mapping
    pub flat: Map<String, Value>,

    /// Order-preserving hierarchical tree
    pub full: Map<String, Value>,
}

/// Project one decoded message into its flat and full shapes
pub fn project(message: &Message) -> Projection {
    match message {
        Message::Header(header) => {
            // The header shape is already flat; reuse it verbatim
            let rendered = render_header(header);
            Projection {
                flat: rendered.clone(),
                full: rendered,
            }
        },
        Message::Definition(definition) => Projection {
            flat: definition_flat(definition),
            full: definition_full(definition),
        },
        Message::Data(data) => Projection {
            flat: data_flat(data),
            full: data_full(data),
        },
        Message::Crc(crc) => Projection {
            flat: crc_flat(crc),
            full: crc_full(crc),
        },
        Message::Unknown(frame) => {
            let rendered = render_unknown(frame);
            Projection {
                flat: rendered.clone(),
                full: rendered,
            }
        },
    }
}

/// Unwrap a `json!` object literal into its map
fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ============================================================================
// Descriptor rendering
// ============================================================================

fn render_base_type(base: &BaseType) -> Value {
    json!({
        "fmt": base.fmt,
        "identifier": base.identifier,
        "name": base.name,
        "size": base.size,
        "type_num": base.type_num,
    })
}

/// Enum mapping with every key coerced to a string; the document store
/// rejects non-string keys.
fn render_enum(entries: &[(EnumKey, String)]) -> Value {
    let mut map = Map::new();
    for (key, label) in entries {
        map.insert(key.to_string(), json!(label));
    }
    Value::Object(map)
}

fn render_field_type(field_type: &FieldType) -> Value {
    match &field_type.enum_map {
        Some(entries) => json!({
            "name": field_type.name,
            "baseType": render_base_type(&field_type.base_type),
            "enum": render_enum(entries),
        }),
        None => json!({
            "name": field_type.name,
            "baseType": render_base_type(&field_type.base_type),
        }),
    }
}

/// Render a classified slot type in full detail
///
/// The unresolved arm is a schema mismatch: logged, and rendered as the
/// sentinel marker rather than omitted.
fn render_slot(slot: &SlotType) -> Value {
    match slot {
        SlotType::Base(base) => render_base_type(base),
        SlotType::Named(field_type) => render_field_type(field_type),
        SlotType::Other(tag) => {
            error!(kind = %tag, "Unhandled descriptor kind while rendering slot type");
            json!(SENTINEL)
        },
    }
}

/// Reduced type label for the flat projection
fn slot_type_label(slot: &SlotType) -> String {
    match slot {
        SlotType::Base(base) => base.name.clone(),
        SlotType::Named(field_type) if field_type.is_enum() => "enum".to_string(),
        SlotType::Named(field_type) => field_type.name.clone(),
        SlotType::Other(tag) => {
            error!(kind = %tag, "Unhandled descriptor kind while labeling slot type");
            "other".to_string()
        },
    }
}

fn render_component(component: &ComponentField) -> Value {
    json!({
        "name": component.name,
        "bit_offset": component.bit_offset,
        "bits": component.bits,
        "def_num": component.def_num,
        "field_type": component.field_type,
        "offset": component.offset,
        "scale": component.scale,
        "units": component.units,
    })
}

fn render_components(components: Option<&Vec<ComponentField>>) -> Value {
    match components {
        Some(list) => Value::Array(list.iter().map(render_component).collect()),
        None => Value::Null,
    }
}

fn render_reference_field(reference: &ReferenceField) -> Value {
    json!({
        "def_num": reference.def_num,
        "name": reference.name,
        "raw_value": reference.raw_value.to_json(),
        "value": normalize(&reference.value, &reference.name),
    })
}

fn render_subfield(subfield: &SubField, scope: Scope) -> Value {
    match scope {
        Scope::Full => json!({
            "name": subfield.name,
            "type": render_slot(&subfield.slot),
            "field_type": subfield.field_type,
            "scale": subfield.scale,
            "offset": subfield.offset,
            "units": subfield.units,
            "components": render_components(subfield.components.as_ref()),
            "def_num": subfield.def_num,
            "base_type": render_base_type(&subfield.base_type),
            "ref_fields": subfield.ref_fields.iter().map(render_reference_field).collect::<Vec<_>>(),
        }),
        Scope::Db => json!({
            "name": subfield.name,
            "field_type": subfield.field_type,
            "def_num": subfield.def_num,
        }),
    }
}

fn render_subfields(subfields: Option<&Vec<SubField>>, scope: Scope) -> Value {
    match subfields {
        Some(list) => Value::Array(list.iter().map(|s| render_subfield(s, scope)).collect()),
        None => Value::Null,
    }
}

fn render_field(field: &Field) -> Value {
    json!({
        "name": field.name,
        "type": render_slot(&field.slot),
        "field_type": field.field_type,
        "scale": field.scale,
        "offset": field.offset,
        "units": field.units,
        "components": render_components(field.components.as_ref()),
        "subfields": render_subfields(field.subfields.as_ref(), Scope::Full),
        "def_num": field.def_num,
        "base_type": render_base_type(&field.base_type),
    })
}

fn render_field_binding(binding: &FieldBinding) -> Value {
    match binding {
        FieldBinding::Field(field) => render_field(field),
        FieldBinding::SubField(subfield) => render_subfield(subfield, Scope::Full),
    }
}

fn render_message_type(mesg_type: Option<&MessageType>) -> Value {
    match mesg_type {
        Some(mt) => json!({
            "name": mt.name,
            "mesg_num": mt.mesg_num,
            "fields": mt.fields.iter().map(render_field).collect::<Vec<_>>(),
        }),
        None => Value::Null,
    }
}

fn render_field_definition(def: &FieldDefinition) -> Value {
    json!({
        "base_type": render_base_type(&def.base_type),
        "def_num": def.def_num,
        "field": def.field.as_ref().map(render_field_binding).unwrap_or(Value::Null),
        "is_dev": def.is_dev,
        "name": def.name,
        "size": def.size,
        "type": render_slot(&def.slot),
    })
}

fn render_field_definitions(defs: &[FieldDefinition]) -> Value {
    Value::Array(defs.iter().map(render_field_definition).collect())
}

/// Developer field definitions are not decoded upstream; a non-empty list
/// renders the sentinel so the gap stays visible.
fn render_dev_field_defs(defs: &[Value]) -> Value {
    if defs.is_empty() {
        Value::Null
    } else {
        error!("Developer field definitions present but not decoded");
        json!(SENTINEL)
    }
}

/// Definition message as it appears nested inside a data message's tree
fn render_definition_nested(definition: &DefinitionMessage) -> Value {
    json!({
        "is_developer_data": definition.info.is_developer_data,
        "local_mesg_num": definition.info.local_mesg_num,
        "time_offset": definition.info.time_offset,
        "mesg_type": render_message_type(definition.mesg_type.as_ref()),
        "global_mesg_num": definition.info.global_mesg_num,
        "endian": definition.endian,
        "field_defs": render_field_definitions(&definition.field_defs),
        "dev_field_defs": render_dev_field_defs(&definition.dev_field_defs),
        "chunk": definition.info.chunk.render(),
    })
}

// ============================================================================
// Per-message projections
// ============================================================================

fn definition_full(definition: &DefinitionMessage) -> Map<String, Value> {
    obj(json!({
        "message_type": "FitDefinitionMessage",
        "all_field_defs": render_field_definitions(&definition.all_field_defs),
        "chunk": definition.info.chunk.render(),
        "dev_field_def": render_dev_field_defs(&definition.dev_field_defs),
        "endian": definition.endian,
        "field_defs": render_field_definitions(&definition.field_defs),
        "frame_type": definition.info.frame_type,
        "global_mesg_num": definition.info.global_mesg_num,
        "isDeveloperData": definition.info.is_developer_data,
        "local_mesg_num": definition.info.local_mesg_num,
        "mesg_type": render_message_type(definition.mesg_type.as_ref()),
        "timeOffset": definition.info.time_offset,
        "name": definition.info.name,
        "time_offset": definition.info.time_offset,
    }))
}

/// Reduced definition shape for the flat projection
///
/// One `field-name -> type-name` entry per declared field. Where the
/// field's meaning depends on a reference field, the reduced subfield set
/// replaces the single type entry: that is the only place the flat
/// projection recurses one extra level, because the concrete meaning is
/// genuinely ambiguous without it.
fn definition_flat(definition: &DefinitionMessage) -> Map<String, Value> {
    let mut map = obj(json!({
        "message_type": "FitDefinitionMessage",
        "message_frame_type": definition.info.frame_type,
        "message_global_mesg_num": definition.info.global_mesg_num,
        "message_local_mesg_num": definition.info.local_mesg_num,
        "message_name": definition.info.name,
        "message_time_offset": definition.info.time_offset,
    }));

    for def in &definition.field_defs {
        let entry = match (&def.slot, def.subfields()) {
            (SlotType::Named(_), Some(subfields)) => Value::Array(
                subfields
                    .iter()
                    .map(|s| render_subfield(s, Scope::Db))
                    .collect(),
            ),
            (slot, _) => json!(slot_type_label(slot)),
        };
        map.insert(def.name.clone(), entry);
    }

    map
}

fn render_field_value_full(field_value: &FieldValue) -> Value {
    json!({
        "def_num": field_value.def_num,
        "name": field_value.name,
        "units": field_value.units,
        "value": normalize(&field_value.value, &field_value.name),
        "type": render_slot(&field_value.slot),
        "field": field_value.field.as_ref().map(render_field_binding).unwrap_or(Value::Null),
    })
}

fn data_full(data: &DataMessage) -> Map<String, Value> {
    obj(json!({
        "message_type": "FitDataMessage",
        "chunk": data.info.chunk.render(),
        "defMessage": render_definition_nested(&data.def_mesg),
        "fields": data.fields.iter().map(render_field_value_full).collect::<Vec<_>>(),
        "frame_type": data.info.frame_type,
        "global_mesg_num": data.info.global_mesg_num,
        "isDeveloperData": data.info.is_developer_data,
        "local_mesg_num": data.info.local_mesg_num,
        "name": data.info.name,
        "timeOffset": data.info.time_offset,
    }))
}

fn data_flat(data: &DataMessage) -> Map<String, Value> {
    let mut map = obj(json!({
        "message_type": "FitDataMessage",
        "message_chunk": data.info.chunk.render(),
        "message_frame_type": data.info.frame_type,
        "message_global_mesg_num": data.info.global_mesg_num,
        "message_isDeveloperData": data.info.is_developer_data,
        "message_local_mesg_num": data.info.local_mesg_num,
        "message_name": data.info.name,
        "message_timeOffset": data.info.time_offset,
    }));

    for field_value in &data.fields {
        flatten_field_value(field_value, &mut map);
    }

    map
}

/// Flatten one field value into the db record
///
/// A tuple value named `x` with N elements becomes keys `x_1 .. x_N`, each
/// normalized under its suffixed name.
fn flatten_field_value(field_value: &FieldValue, map: &mut Map<String, Value>) {
    match &field_value.value {
        RawValue::Tuple(values) => {
            for (index, value) in values.iter().enumerate() {
                let key = format!("{}_{}", field_value.name, index + 1);
                let normalized = normalize(value, &key);
                map.insert(key, normalized);
            }
        },
        value => {
            map.insert(
                field_value.name.clone(),
                normalize(value, &field_value.name),
            );
        },
    }
}

fn render_header(header: &HeaderMessage) -> Map<String, Value> {
    obj(json!({
        "message_type": "FitHeader",
        "message_size": header.header_size,
        "message_protoVersion": header.proto_ver,
        "message_profileVersion": header.profile_ver,
        "message_bodySize": header.body_size,
        "message_header_size": header.header_size,
        "message_crc": header.crc,
        "message_crcMatched": header.crc_matched,
        "message_chunk": header.chunk.render(),
    }))
}

fn crc_flat(crc: &CrcMessage) -> Map<String, Value> {
    obj(json!({
        "message_type": "FitCRC",
        "message_frame_type": crc.frame_type,
        "matched": crc.matched,
    }))
}

fn crc_full(crc: &CrcMessage) -> Map<String, Value> {
    obj(json!({
        "message_type": "FitCRC",
        "chunk": crc.chunk.render(),
        "crc": crc.crc,
        "frame_type": crc.frame_type,
        "matched": crc.matched,
    }))
}

fn render_unknown(_frame: &UnknownFrame) -> Map<String, Value> {
    obj(json!({ "message_type": "Unknown" }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::message::{Chunk, FrameInfo, RawValue};
    use crate::schema::tests::{base_type, sport_enum};

    fn frame_info(name: &str) -> FrameInfo {
        FrameInfo {
            chunk: Chunk { offset: 14, size: 6 },
            frame_type: "data_message".to_string(),
            global_mesg_num: 20,
            local_mesg_num: 0,
            time_offset: None,
            is_developer_data: false,
            name: name.to_string(),
        }
    }

    fn empty_definition(name: &str) -> DefinitionMessage {
        DefinitionMessage {
            info: FrameInfo {
                frame_type: "definition_message".to_string(),
                ..frame_info(name)
            },
            endian: "little".to_string(),
            mesg_type: None,
            field_defs: Vec::new(),
            all_field_defs: Vec::new(),
            dev_field_defs: Vec::new(),
        }
    }

    fn field_value(name: &str, value: RawValue) -> FieldValue {
        FieldValue {
            name: name.to_string(),
            def_num: Some(3),
            units: None,
            value,
            slot: SlotType::Base(base_type("uint8")),
            field: None,
        }
    }

    fn data_message(fields: Vec<FieldValue>) -> DataMessage {
        DataMessage {
            info: frame_info("record"),
            def_mesg: Box::new(empty_definition("record")),
            fields,
        }
    }

    #[test]
    fn test_enum_mapping_renders_with_string_keys() {
        let rendered = render_field_type(&sport_enum());
        assert_eq!(
            rendered["enum"],
            json!({ "1": "run", "2": "bike" })
        );
    }

    #[test]
    fn test_tuple_values_expand_into_suffixed_flat_keys() {
        let data = data_message(vec![field_value(
            "x",
            RawValue::Tuple(vec![RawValue::UInt(7), RawValue::UInt(8), RawValue::None]),
        )]);
        let flat = data_flat(&data);

        assert_eq!(flat["x_1"], json!(7));
        assert_eq!(flat["x_2"], json!(8));
        assert_eq!(flat["x_3"], Value::Null);
        assert!(!flat.contains_key("x"));
    }

    #[test]
    fn test_tuple_values_stay_single_nodes_in_full_tree() {
        let data = data_message(vec![field_value(
            "x",
            RawValue::Tuple(vec![RawValue::UInt(7), RawValue::UInt(8)]),
        )]);
        let full = data_full(&data);

        assert_eq!(full["fields"][0]["name"], json!("x"));
        assert_eq!(full["fields"][0]["value"], json!([7, 8]));
    }

    #[test]
    fn test_flat_data_record_keeps_no_schema_metadata() {
        let data = data_message(vec![field_value("heart_rate", RawValue::UInt(150))]);
        let flat = data_flat(&data);

        assert_eq!(flat["message_type"], json!("FitDataMessage"));
        assert_eq!(flat["message_name"], json!("record"));
        assert_eq!(flat["heart_rate"], json!(150));
        assert!(!flat.contains_key("defMessage"));
        assert!(!flat.contains_key("fields"));
    }

    #[test]
    fn test_unresolved_descriptor_kind_labels_as_other() {
        let slot = SlotType::Other("mystery".to_string());
        assert_eq!(slot_type_label(&slot), "other");
        assert_eq!(render_slot(&slot), json!(SENTINEL));
    }

    #[test]
    fn test_definition_flat_maps_field_names_to_type_labels() {
        let mut definition = empty_definition("session");
        definition.field_defs = vec![
            FieldDefinition {
                def_num: 0,
                name: "sport".to_string(),
                size: 1,
                is_dev: false,
                base_type: base_type("enum"),
                slot: SlotType::Named(sport_enum()),
                field: None,
            },
            FieldDefinition {
                def_num: 1,
                name: "heart_rate".to_string(),
                size: 1,
                is_dev: false,
                base_type: base_type("uint8"),
                slot: SlotType::Base(base_type("uint8")),
                field: None,
            },
        ];

        let flat = definition_flat(&definition);
        assert_eq!(flat["sport"], json!("enum"));
        assert_eq!(flat["heart_rate"], json!("uint8"));
        assert_eq!(flat["message_name"], json!("session"));
    }

    #[test]
    fn test_definition_flat_recurses_into_subfields() {
        let subfield = SubField {
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
        };
        let field = Field {
            name: "data".to_string(),
            slot: SlotType::Named(sport_enum()),
            field_type: None,
            scale: None,
            offset: None,
            units: None,
            components: None,
            subfields: Some(vec![subfield]),
            def_num: 0,
            base_type: base_type("uint32"),
        };

        let mut definition = empty_definition("event");
        definition.field_defs = vec![FieldDefinition {
            def_num: 0,
            name: "data".to_string(),
            size: 4,
            is_dev: false,
            base_type: base_type("uint32"),
            slot: SlotType::Named(sport_enum()),
            field: Some(FieldBinding::Field(field)),
        }];

        let flat = definition_flat(&definition);
        assert_eq!(
            flat["data"],
            json!([{ "name": "gear_change_data", "field_type": null, "def_num": 0 }])
        );
    }

    #[test]
    fn test_definition_flat_falls_back_on_empty_subfield_lists() {
        let field = Field {
            name: "data".to_string(),
            slot: SlotType::Named(sport_enum()),
            field_type: None,
            scale: None,
            offset: None,
            units: None,
            components: None,
            subfields: Some(Vec::new()),
            def_num: 0,
            base_type: base_type("uint32"),
        };

        let mut definition = empty_definition("event");
        definition.field_defs = vec![FieldDefinition {
            def_num: 0,
            name: "data".to_string(),
            size: 4,
            is_dev: false,
            base_type: base_type("uint32"),
            slot: SlotType::Named(sport_enum()),
            field: Some(FieldBinding::Field(field)),
        }];

        let flat = definition_flat(&definition);
        assert_eq!(flat["data"], json!("enum"));
    }

    #[test]
    fn test_header_projections_are_identical() {
        let header = HeaderMessage {
            header_size: 14,
            proto_ver: 2.0,
            profile_ver: 21.94,
            body_size: 190_633,
            crc: 0x12AB,
            crc_matched: true,
            chunk: Chunk { offset: 0, size: 14 },
        };
        let projection = project(&Message::Header(header));

        assert_eq!(projection.flat, projection.full);
        assert_eq!(projection.flat["message_type"], json!("FitHeader"));
        assert_eq!(projection.flat["message_size"], json!(14));
        assert_eq!(projection.flat["message_crcMatched"], json!(true));
    }

    #[test]
    fn test_crc_flat_drops_diagnostic_bytes() {
        let crc = CrcMessage {
            chunk: Chunk { offset: 190_647, size: 2 },
            crc: 0x55AA,
            frame_type: "crc".to_string(),
            matched: true,
        };
        let projection = project(&Message::Crc(crc));

        assert_eq!(
            Value::Object(projection.flat),
            json!({
                "message_type": "FitCRC",
                "message_frame_type": "crc",
                "matched": true,
            })
        );
        assert_eq!(projection.full["chunk"], json!({ "offset": 190_647, "size": 2 }));
        assert_eq!(projection.full["crc"], json!(0x55AA));
    }

    #[test]
    fn test_unknown_frame_projects_placeholder() {
        let projection = project(&Message::Unknown(UnknownFrame { frame_type: None }));
        assert_eq!(projection.flat["message_type"], json!("Unknown"));
        assert_eq!(projection.full["message_type"], json!("Unknown"));
    }

    #[test]
    fn test_full_field_values_are_annotated_with_schema() {
        let mut fv = field_value("sport", RawValue::UInt(1));
        fv.slot = SlotType::Named(sport_enum());
        let full = data_full(&data_message(vec![fv]));

        assert_eq!(full["fields"][0]["type"]["name"], json!("sport"));
        assert_eq!(full["fields"][0]["type"]["enum"]["1"], json!("run"));
    }

    #[test]
    fn test_dev_field_defs_render_sentinel_when_present() {
        assert_eq!(render_dev_field_defs(&[]), Value::Null);
        assert_eq!(render_dev_field_defs(&[json!({"x": 1})]), json!(SENTINEL));
    }
}
