//! Request parameters: a JSON object mapping field names to values.

use courier_core::error::CourierError;
use serde::Serialize;
use serde_json::{Map, Value};

pub type Params = Map<String, Value>;

/// Serialize anything object-shaped (a `json!` literal, a struct) into params.
pub fn to_params<P: Serialize>(params: P) -> Result<Params, CourierError> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Params::new()),
        other => Err(CourierError::Parse(format!(
            "parameters must be an object, got {other}"
        ))),
    }
}

/// Loose truthiness for flag parameters such as `base64`.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "false" && s != "0",
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Render a parameter as a multipart text field. `None` for nulls.
pub fn form_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
