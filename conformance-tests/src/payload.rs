//! Second decode pass over successful results
//!
//! Station wraps its resource and tool payloads as JSON text inside the
//! result envelope (`contents[0].text` for resources, `content[0].text` for
//! tools). Those texts are decoded again here; the layering is part of the
//! wire behavior being checked and is never flattened.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PayloadError;

/// Read-only, URI-addressed entity advertised by `resources/list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Resource URI
    pub uri: String,
    /// Human-readable name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// State-mutating operation advertised by `tools/list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default)]
    pub description: String,
}

/// Decoded text of a `tools/call` result
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    /// Structured payload decoded from the text content
    Structured(Value),
    /// The tool flagged `isError`; its text is an error message, not JSON
    Failed(String),
}

/// Counted entity sequence from a collection resource
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    /// Declared count
    pub total_count: u64,
    /// Entity records
    pub items: Vec<Value>,
}

/// Parse `result.resources` from a `resources/list` result
pub fn resource_list(result: &Value) -> Result<Vec<ResourceDescriptor>, PayloadError> {
    descriptor_list(result, "resources")
}

/// Parse `result.tools` from a `tools/list` result
pub fn tool_list(result: &Value) -> Result<Vec<ToolDescriptor>, PayloadError> {
    descriptor_list(result, "tools")
}

fn descriptor_list<T: for<'de> Deserialize<'de>>(
    result: &Value,
    field: &str,
) -> Result<Vec<T>, PayloadError> {
    let list = result
        .get(field)
        .filter(|v| v.is_array())
        .ok_or_else(|| PayloadError::missing(field))?;

    serde_json::from_value(list.clone()).map_err(|e| {
        PayloadError::shape(format!("'{}' entries are not valid descriptors: {}", field, e))
    })
}

/// Decode `contents[0].text` of a `resources/read` result
pub fn resource_text(result: &Value) -> Result<Value, PayloadError> {
    nested_json(first_text(result, "contents")?, "contents[0].text")
}

/// Decode `content[0].text` of a `tools/call` result
pub fn tool_text(result: &Value) -> Result<ToolPayload, PayloadError> {
    let text = first_text(result, "content")?;

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        return Ok(ToolPayload::Failed(text.to_string()));
    }

    nested_json(text, "content[0].text").map(ToolPayload::Structured)
}

fn first_text<'a>(result: &'a Value, field: &str) -> Result<&'a str, PayloadError> {
    let first = result
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| PayloadError::missing(field))?
        .first()
        .ok_or_else(|| PayloadError::shape(format!("'{}' is empty", field)))?;

    first
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| PayloadError::missing(format!("{}[0].text", field)))
}

fn nested_json(text: &str, field: &str) -> Result<Value, PayloadError> {
    serde_json::from_str(text).map_err(|e| PayloadError::NestedJson {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

/// Read a counted sequence and check the count against its length
///
/// A `null` sequence counts as empty.
pub fn counted(
    payload: &Value,
    count_field: &str,
    items_field: &str,
) -> Result<Collection, PayloadError> {
    let total_count = payload
        .get(count_field)
        .and_then(Value::as_u64)
        .ok_or_else(|| PayloadError::missing(count_field))?;

    let items = match payload.get(items_field) {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) => Vec::new(),
        _ => return Err(PayloadError::missing(items_field)),
    };

    if total_count != items.len() as u64 {
        return Err(PayloadError::CountMismatch {
            count_field: count_field.to_string(),
            items_field: items_field.to_string(),
            declared: total_count,
            actual: items.len(),
        });
    }

    Ok(Collection { total_count, items })
}

/// Integer at a JSON pointer (e.g. `/agent/id`)
pub fn integer_at(payload: &Value, pointer: &str) -> Result<i64, PayloadError> {
    payload
        .pointer(pointer)
        .and_then(Value::as_i64)
        .ok_or_else(|| PayloadError::missing(pointer))
}

/// String at a JSON pointer
pub fn string_at<'a>(payload: &'a Value, pointer: &str) -> Result<&'a str, PayloadError> {
    payload
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| PayloadError::missing(pointer))
}
