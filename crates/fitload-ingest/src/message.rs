//! Decoded message model
//!
//! One [`Message`] is one decoded frame handed over by the upstream
//! decoder. The Unknown arm is a first-class variant: an unrecognized
//! frame still produces a placeholder record so record-id continuity is
//! preserved.

use crate::schema::{FieldBinding, FieldDefinition, MessageType, SlotType};
use chrono::{DateTime, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Raw byte window of a frame within the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Byte offset of the frame in the file
    pub offset: u64,

    /// Length of the frame in bytes
    pub size: u64,
}

impl Chunk {
    /// Render as a JSON node for either projection
    pub fn render(&self) -> Value {
        json!({ "offset": self.offset, "size": self.size })
    }
}

/// One decoded leaf value
///
/// Multi-valued fields arrive as `Tuple`; the flat projection expands them
/// into index-suffixed keys while the full projection keeps the tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    None,
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<FixedOffset>),
    Time(NaiveTime),
    Tuple(Vec<RawValue>),
}

impl RawValue {
    /// Pass-through JSON rendering, with no field-aware normalization
    pub fn to_json(&self) -> Value {
        match self {
            RawValue::None => Value::Null,
            RawValue::Bool(b) => json!(b),
            RawValue::UInt(n) => json!(n),
            RawValue::Int(n) => json!(n),
            RawValue::Float(f) => json!(f),
            RawValue::Text(s) => json!(s),
            RawValue::Bytes(b) => json!(b),
            RawValue::DateTime(dt) => json!(dt.format("%Y-%m-%d %H:%M:%S %z").to_string()),
            RawValue::Time(t) => json!(t.format("%H:%M:%S").to_string()),
            RawValue::Tuple(values) => {
                Value::Array(values.iter().map(RawValue::to_json).collect())
            },
        }
    }
}

/// One decoded field of a data message, with its resolved schema node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldValue {
    /// Field name as resolved at decode time
    pub name: String,

    /// Definition number, if the field was declared
    pub def_num: Option<u8>,

    /// Unit string, if any
    pub units: Option<String>,

    /// Decoded value (scalar or tuple)
    pub value: RawValue,

    /// Resolved slot type (base type, named field type, or unresolved)
    pub slot: SlotType,

    /// The field or subfield descriptor this value was decoded against
    pub field: Option<FieldBinding>,
}

/// Attributes shared by every framed message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Raw byte window in the source file
    pub chunk: Chunk,

    /// Frame type tag from the wire
    pub frame_type: String,

    /// Global message-type number
    pub global_mesg_num: u16,

    /// Local message-type number
    pub local_mesg_num: u8,

    /// Compressed-timestamp offset, when present
    pub time_offset: Option<u8>,

    /// Whether the frame carries developer data
    pub is_developer_data: bool,

    /// Resolved message name
    pub name: String,
}

/// File header frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderMessage {
    pub header_size: u8,
    pub proto_ver: f64,
    pub profile_ver: f64,
    pub body_size: u64,
    pub crc: u16,
    pub crc_matched: bool,
    pub chunk: Chunk,
}

/// Definition frame: declares the layout for subsequent data frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionMessage {
    pub info: FrameInfo,

    /// Byte order of the declared fields
    pub endian: String,

    /// Message-type descriptor with its full field dictionary
    pub mesg_type: Option<MessageType>,

    /// Declared field definitions
    pub field_defs: Vec<FieldDefinition>,

    /// Every field definition known for the message type
    pub all_field_defs: Vec<FieldDefinition>,

    /// Developer field definitions; decoding these is not implemented
    /// upstream, so a non-empty list renders the sentinel marker
    pub dev_field_defs: Vec<Value>,
}

/// Data frame: field values per a previously seen definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataMessage {
    pub info: FrameInfo,

    /// The definition message this frame was decoded against
    pub def_mesg: Box<DefinitionMessage>,

    /// Decoded field values, in stream order
    pub fields: Vec<FieldValue>,
}

/// Trailing CRC frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrcMessage {
    pub chunk: Chunk,
    pub crc: u16,
    pub frame_type: String,
    pub matched: bool,
}

/// Frame the decoder could not classify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownFrame {
    /// Raw frame-type tag, kept for the log entry
    pub frame_type: Option<String>,
}

/// One decoded unit from the activity log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame")]
pub enum Message {
    Header(HeaderMessage),
    Definition(DefinitionMessage),
    Data(DataMessage),
    Crc(CrcMessage),
    Unknown(UnknownFrame),
}

impl Message {
    /// The persisted `message_type` discriminator for this variant
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Header(_) => MessageKind::FitHeader,
            Message::Definition(_) => MessageKind::FitDefinitionMessage,
            Message::Data(_) => MessageKind::FitDataMessage,
            Message::Crc(_) => MessageKind::FitCrc,
            Message::Unknown(_) => MessageKind::Unknown,
        }
    }
}

/// Persisted message-type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    FitHeader,
    FitDefinitionMessage,
    FitDataMessage,
    FitCrc,
    Unknown,
}

impl MessageKind {
    /// Stored-document spelling of the tag
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::FitHeader => "FitHeader",
            MessageKind::FitDefinitionMessage => "FitDefinitionMessage",
            MessageKind::FitDataMessage => "FitDataMessage",
            MessageKind::FitCrc => "FitCRC",
            MessageKind::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The unit of output: one projected document plus its identity tags
///
/// A record is produced once, handed to exactly one sink call, and never
/// retained afterward.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    /// Activity identifier derived from the file name
    pub activity_id: String,

    /// 1-based sequence number within the file
    pub record_id: u32,

    /// Message-type discriminator
    pub kind: MessageKind,

    /// Projected document, already tagged with identity keys
    pub document: Map<String, Value>,
}
