//! Value normalization
//!
//! Pure mapping from a raw decoded value (plus its field name) to a
//! store-safe semantic value. Knows nothing about the surrounding
//! message type.

use crate::message::RawValue;
use serde_json::{json, Value};

/// Semicircle-to-degree divisor for position fields
pub const SEMICIRCLES_PER_DEGREE: f64 = 11_930_465.0;

/// Normalize one decoded value for storage
///
/// Rules, in priority order:
/// - date-valued -> `"YYYY-MM-DD HH:MM:SS +ZZZZ"`
/// - time-valued -> `"HH:MM:SS"`
/// - `position_lat` / `position_long` -> degrees as floating point, or the
///   literal string `"None"` when the raw value is absent
/// - everything else passes through unchanged
pub fn normalize(value: &RawValue, field_name: &str) -> Value {
    match value {
        RawValue::DateTime(dt) => json!(dt.format("%Y-%m-%d %H:%M:%S %z").to_string()),
        RawValue::Time(t) => json!(t.format("%H:%M:%S").to_string()),
        _ if field_name == "position_lat" || field_name == "position_long" => {
            match semicircles(value) {
                Some(raw) => json!(raw / SEMICIRCLES_PER_DEGREE),
                None => json!("None"),
            }
        },
        other => other.to_json(),
    }
}

/// Numeric reading of a position value, if one is present
fn semicircles(value: &RawValue) -> Option<f64> {
    match value {
        RawValue::UInt(n) => Some(*n as f64),
        RawValue::Int(n) => Some(*n as f64),
        RawValue::Float(f) => Some(*f),
        _ => None,
    }
}
