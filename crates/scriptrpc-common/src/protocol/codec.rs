//! JSON message codec
//!
//! Structured messages cross the script boundary as JSON text. Handlers see
//! typed Rust values; this module is the only place that turns one into the
//! other.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

use super::error::{BridgeError, Result};

/// Decodes caller-supplied JSON text into a typed request message.
pub fn decode_message<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| BridgeError::Decode(e.to_string()))
}

/// Encodes a typed response message into its structured JSON form.
pub fn encode_message<T: Serialize>(message: &T) -> Result<JsonValue> {
    serde_json::to_value(message).map_err(|e| BridgeError::Encode(e.to_string()))
}

/// Serializes a handler reply to the text handed back to the script.
///
/// Only JSON objects count as structured messages. Anything else is an
/// encode error, even when the handler itself reported success.
pub fn encode_reply(reply: &JsonValue) -> Result<String> {
    if !reply.is_object() {
        return Err(BridgeError::Encode(format!(
            "output is not a structured message (got {})",
            json_kind(reply)
        )));
    }

    serde_json::to_string(reply).map_err(|e| BridgeError::Encode(e.to_string()))
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
