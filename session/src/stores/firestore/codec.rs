//! Conversion between plain JSON and Firestore typed values.
//!
//! | JSON | Firestore |
//! |---|---|
//! | `null` | `nullValue` |
//! | bool | `booleanValue` |
//! | integer | `integerValue` (decimal string) |
//! | float | `doubleValue` |
//! | string | `stringValue` |
//! | array | `arrayValue.values` |
//! | object | `mapValue.fields` |
//!
//! Decoding additionally accepts `timestampValue`, `referenceValue` and
//! `bytesValue` (as strings) and `geoPointValue` (as an object).

use crate::error::{Result, SessionError};
use crate::state::Document;
use serde_json::{json, Map, Value};

/// Encode a JSON value as a Firestore value.
#[must_use]
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        },
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// Encode document fields as a Firestore `fields` map.
#[must_use]
pub fn encode_fields(fields: &Document) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

/// Decode a Firestore value.
///
/// # Errors
///
/// Returns [`SessionError::Serialization`] for unknown or malformed values.
pub fn decode_value(value: &Value) -> Result<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|object| object.iter().next()) else {
        return Err(malformed("value", value));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner.as_bool().map(Value::Bool).ok_or_else(|| malformed(kind, inner)),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).map_err(|_| malformed(kind, inner)),
            Value::Number(n) if n.is_i64() => Ok(inner.clone()),
            _ => Err(malformed(kind, inner)),
        },
        "doubleValue" => match inner {
            Value::Number(_) => Ok(inner.clone()),
            // NaN and infinities arrive as strings and have no JSON form.
            Value::String(_) => Ok(Value::Null),
            _ => Err(malformed(kind, inner)),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| malformed(kind, inner)),
        "geoPointValue" => Ok(json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        })),
        "arrayValue" => match inner.get("values") {
            None => Ok(Value::Array(Vec::new())),
            Some(Value::Array(items)) => items.iter().map(decode_value).collect::<Result<_>>().map(Value::Array),
            Some(other) => Err(malformed(kind, other)),
        },
        "mapValue" => match inner.get("fields") {
            None => Ok(Value::Object(Map::new())),
            Some(fields) => decode_fields(fields).map(Value::Object),
        },
        _ => Err(malformed(kind, inner)),
    }
}

/// Decode a Firestore `fields` map.
///
/// # Errors
///
/// Returns [`SessionError::Serialization`] if any field is malformed.
pub fn decode_fields(fields: &Value) -> Result<Document> {
    let Some(fields) = fields.as_object() else {
        return Err(malformed("fields", fields));
    };
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

/// Decode a Firestore document resource into `(id, fields)`.
///
/// # Errors
///
/// Returns [`SessionError::Serialization`] if the resource has no name or
/// malformed fields.
pub fn decode_document(document: &Value) -> Result<(String, Document)> {
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("document", document))?;
    let id = name.rsplit('/').next().unwrap_or(name).to_string();

    let fields = match document.get("fields") {
        Some(fields) => decode_fields(fields)?,
        None => Document::new(),
    };
    Ok((id, fields))
}

/// Field path in Firestore syntax, backtick-quoting names that are not
/// plain identifiers.
#[must_use]
pub fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn malformed(kind: &str, value: &Value) -> SessionError {
    SessionError::Serialization(format!("malformed Firestore {kind}: {value}"))
}
