//! Serialization contract shared by all components
//!
//! A component persists as `{"type": <type name>, "init_parameters": {...}}`.
//! The init parameters hold only plain data: callbacks appear by registered
//! name and credentials by redacted reference.

use serde_json::{Map, Value};

use crate::callback::CallbackRegistry;
use crate::error::CoreError;
use crate::types::ComponentInfo;

/// A pipeline component that can be persisted and restored
pub trait Component: Sized {
    /// Fully qualified type name written to the `type` key
    const TYPE_NAME: &'static str;

    /// Serialize the construction parameters
    fn to_dict(&self) -> Result<Value, CoreError>;

    /// Rebuild a component, resolving callback names through `registry`
    fn from_dict(data: Value, registry: &CallbackRegistry) -> Result<Self, CoreError>;

    /// Identity attached to anything the component emits
    fn component_info(&self) -> ComponentInfo {
        ComponentInfo::new(Self::TYPE_NAME)
    }
}

/// Wrap init parameters in the component envelope
pub fn default_to_dict(type_name: &str, init_parameters: Map<String, Value>) -> Value {
    serde_json::json!({
        "type": type_name,
        "init_parameters": init_parameters,
    })
}

/// Unwrap the component envelope, checking the type name
pub fn default_from_dict(type_name: &str, data: Value) -> Result<Map<String, Value>, CoreError> {
    let Value::Object(mut envelope) = data else {
        return Err(CoreError::deserialization("component data must be an object"));
    };

    match envelope.get("type").and_then(Value::as_str) {
        Some(found) if found == type_name => {}
        Some(found) => {
            return Err(CoreError::deserialization(format!(
                "class `{found}` cannot be deserialized as `{type_name}`"
            )));
        }
        None => return Err(CoreError::deserialization("missing `type` in component data")),
    }

    match envelope.remove("init_parameters") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(params)) => Ok(params),
        Some(_) => Err(CoreError::deserialization("`init_parameters` must be an object")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_round_trip() {
        let mut params = Map::new();
        params.insert("k".to_owned(), json!(1));

        let data = default_to_dict("demo::Thing", params.clone());
        assert_eq!(data, json!({"type": "demo::Thing", "init_parameters": {"k": 1}}));
        assert_eq!(default_from_dict("demo::Thing", data).unwrap(), params);
    }

    #[test]
    fn missing_init_parameters_default_to_empty() {
        let params = default_from_dict("demo::Thing", json!({"type": "demo::Thing"})).unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn mismatched_type_is_rejected() {
        let err = default_from_dict("demo::Thing", json!({"type": "demo::Other", "init_parameters": {}})).unwrap_err();
        assert!(err.to_string().contains("demo::Other"));

        assert!(default_from_dict("demo::Thing", json!([])).is_err());
        assert!(default_from_dict("demo::Thing", json!({"init_parameters": {}})).is_err());
    }
}
