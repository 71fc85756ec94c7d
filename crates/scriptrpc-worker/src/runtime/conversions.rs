//! JSON <-> JavaScript Value Conversions
//!
//! Bidirectional conversion between `serde_json::Value` and Boa's `JsValue`,
//! used wherever a value crosses the script boundary:
//!
//! - Turning a bound method's argument into the raw JSON text a handler decodes
//! - Turning a handler's encoded reply back into a script value
//! - Stringifying script results for the caller
//!
//! # Type Mapping
//!
//! | JSON Type | JavaScript Type |
//! |-----------|-----------------|
//! | null | null |
//! | boolean | Boolean |
//! | number | Number |
//! | string | String |
//! | array | Array |
//! | object | Object |
//!
//! # JavaScript to JSON
//!
//! Script values are serialized by the realm's own `JSON.stringify`, captured
//! in a [`JsonStringify`] before any script runs, so `toJSON`, enumerability
//! and primitive wrappers behave exactly as they do inside a script. A value
//! `JSON.stringify` maps to `undefined` (a bare `undefined`, function or
//! symbol) becomes `null`. Cycles and BigInt values are errors.

use boa_engine::{
    object::{builtins::JsArray, JsObject},
    value::JsValue,
    Context, JsString,
};
use boa_gc::{Finalize, Trace};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// A value could not be carried across the script boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConversionError(String);

pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

/// Convert serde_json::Value to Boa JsValue.
///
/// # Errors
///
/// Returns a [`ConversionError`] if creating an array element or object
/// property fails inside the engine.
pub fn json_to_js_value(json: &JsonValue, ctx: &mut Context) -> ConversionResult<JsValue> {
    match json {
        JsonValue::Null => Ok(JsValue::null()),
        JsonValue::Bool(b) => Ok(JsValue::new(*b)),
        JsonValue::Number(n) => n
            .as_f64()
            .map(JsValue::new)
            .ok_or_else(|| ConversionError(format!("number {n} is out of range"))),
        JsonValue::String(s) => Ok(JsValue::new(JsString::from(s.as_str()))),
        JsonValue::Array(arr) => {
            let js_array = JsArray::new(ctx);
            for (i, v) in arr.iter().enumerate() {
                let js_value = json_to_js_value(v, ctx)?;
                js_array
                    .push(js_value, ctx)
                    .map_err(|e| ConversionError(format!("failed to push array element {i}: {e}")))?;
            }
            Ok(js_array.into())
        }
        JsonValue::Object(obj) => {
            let js_obj = JsObject::with_object_proto(ctx.intrinsics());
            for (key, value) in obj {
                let js_value = json_to_js_value(value, ctx)?;
                js_obj
                    .create_data_property_or_throw(JsString::from(key.as_str()), js_value, ctx)
                    .map_err(|e| ConversionError(format!("failed to set property '{key}': {e}")))?;
            }
            Ok(js_obj.into())
        }
    }
}

/// The realm's original `JSON.stringify` function.
///
/// Captured once when the context is built, so a script reassigning
/// `JSON.stringify` cannot change how its values leave the engine.
#[derive(Debug, Clone, Trace, Finalize)]
pub struct JsonStringify {
    function: JsObject,
}

impl JsonStringify {
    /// Looks up `JSON.stringify` on the context's intrinsic `JSON` object.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] if the property is missing or not an
    /// object.
    pub fn capture(ctx: &mut Context) -> ConversionResult<Self> {
        let json = ctx.intrinsics().objects().json();
        let function = json
            .get(JsString::from("stringify"), ctx)
            .map_err(|e| ConversionError(format!("failed to read JSON.stringify: {e}")))?
            .as_callable()
            .ok_or_else(|| ConversionError("JSON.stringify is not callable".into()))?;
        Ok(Self { function })
    }

    /// JSON text of `value`, with `null` for values `JSON.stringify` maps to
    /// `undefined`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] for cyclic structures, BigInt values, or
    /// when a `toJSON` method or getter throws.
    pub fn text(&self, value: &JsValue, ctx: &mut Context) -> ConversionResult<String> {
        let result = self
            .function
            .call(&JsValue::undefined(), &[value.clone()], ctx)
            .map_err(|e| ConversionError(e.to_string()))?;
        Ok(result
            .as_string()
            .map_or_else(|| "null".to_string(), |s| s.to_std_string_escaped()))
    }

    /// Converts `value` to a `serde_json::Value` by way of its JSON text.
    ///
    /// # Errors
    ///
    /// Same as [`text`](Self::text).
    pub fn to_json(&self, value: &JsValue, ctx: &mut Context) -> ConversionResult<JsonValue> {
        let text = self.text(value, ctx)?;
        serde_json::from_str(&text).map_err(|e| ConversionError(format!("invalid JSON text: {e}")))
    }
}
