//! Normalization of model-supplied tool arguments.
//!
//! Models hand arguments over as a JSON-encoded string, as an object, or not
//! at all. Every shape is reduced to a single [`ToolArguments`] map before a
//! tool sees it:
//!
//! - `null` or a blank string becomes an empty map
//! - a string is parsed as JSON and must yield an object
//! - an object is used as-is
//! - anything else is rejected

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Named arguments passed to a tool.
pub type ToolArguments = Map<String, Value>;

pub fn normalize_arguments(raw: &Value) -> Result<ToolArguments, String> {
    match raw {
        Value::Null => Ok(ToolArguments::new()),
        Value::Object(map) => Ok(map.clone()),
        Value::String(s) if s.trim().is_empty() => Ok(ToolArguments::new()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(Value::Null) => Ok(ToolArguments::new()),
            Ok(other) => Err(format!("expected a JSON object, got {}", kind(&other))),
            Err(e) => Err(e.to_string()),
        },
        other => Err(format!("expected a JSON object, got {}", kind(other))),
    }
}

/// Deserialize normalized arguments into a typed parameter struct.
pub fn parse_args<T: DeserializeOwned>(args: ToolArguments) -> anyhow::Result<T> {
    Ok(serde_json::from_value(Value::Object(args))?)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
