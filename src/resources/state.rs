//! Accessors for JSON resource state.
//!
//! Optional string getters follow the "set and non-zero" convention of the
//! host: an empty string reads as absent.

use serde_json::{Map, Value};

use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;

/// Borrow the state as an object.
pub fn object_mut(state: &mut Value) -> Result<&mut Map<String, Value>, ProviderError> {
    state
        .as_object_mut()
        .ok_or_else(|| ProviderError::Validation("resource state must be an object".into()))
}

/// A non-empty string attribute.
pub fn string(state: &Value, key: &str) -> Option<String> {
    state
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A string attribute that must be present.
pub fn required_string(state: &Value, key: &str) -> Result<String, ProviderError> {
    string(state, key)
        .ok_or_else(|| ProviderError::Validation(format!("Missing required attribute '{}'", key)))
}

/// The resource ID.
pub fn id(state: &Value) -> Result<String, ProviderError> {
    string(state, "id")
        .ok_or_else(|| ProviderError::InvalidRequest("resource state has no id".into()))
}

/// A boolean attribute. Accepts `"true"`/`"false"` strings.
pub fn boolean(state: &Value, key: &str) -> Option<bool> {
    match state.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// An integer attribute. Accepts numeric strings.
pub fn integer(state: &Value, key: &str) -> Option<i64> {
    match state.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// A list of strings; non-string elements are skipped.
pub fn string_list(state: &Value, key: &str) -> Vec<String> {
    state
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A single nested block, given either as an object or as a one-element list.
pub fn block<'a>(state: &'a Value, key: &str) -> Option<&'a Value> {
    match state.get(key)? {
        obj @ Value::Object(_) => Some(obj),
        Value::Array(items) => items.first().filter(|v| v.is_object()),
        _ => None,
    }
}

/// Append an error diagnostic for each missing required attribute.
pub fn check_required(config: &Value, keys: &[&str], diagnostics: &mut Vec<Diagnostic>) {
    for key in keys {
        let present = match config.get(*key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };
        if !present {
            diagnostics.push(
                Diagnostic::error(format!("Missing required attribute '{}'", key))
                    .with_attribute(*key),
            );
        }
    }
}

/// Insert `value`, or null when absent.
pub fn set_opt<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    map.insert(key.to_string(), value.map_or(Value::Null, Into::into));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_treats_empty_as_absent() {
        let state = json!({"name": "rule", "description": "", "count": 3});
        assert_eq!(string(&state, "name").as_deref(), Some("rule"));
        assert_eq!(string(&state, "description"), None);
        assert_eq!(string(&state, "count"), None);
        assert_eq!(string(&state, "missing"), None);
    }

    #[test]
    fn test_required_string_error() {
        let err = required_string(&json!({}), "tenant_name").unwrap_err();
        assert_eq!(err.message(), "Missing required attribute 'tenant_name'");
    }

    #[test]
    fn test_scalar_coercions() {
        let state = json!({"a": true, "b": "false", "n": 4, "s": "12", "x": "nope"});
        assert_eq!(boolean(&state, "a"), Some(true));
        assert_eq!(boolean(&state, "b"), Some(false));
        assert_eq!(boolean(&state, "x"), None);
        assert_eq!(integer(&state, "n"), Some(4));
        assert_eq!(integer(&state, "s"), Some(12));
        assert_eq!(integer(&state, "x"), None);
    }

    #[test]
    fn test_string_list() {
        let state = json!({"tags": ["a", 1, "b"], "other": "c"});
        assert_eq!(string_list(&state, "tags"), vec!["a", "b"]);
        assert!(string_list(&state, "other").is_empty());
        assert!(string_list(&state, "missing").is_empty());
    }

    #[test]
    fn test_block_accepts_object_or_list() {
        let as_list = json!({"text_replacement": [{"type": "hash"}]});
        let as_object = json!({"text_replacement": {"type": "hash"}});
        let empty = json!({"text_replacement": []});

        assert_eq!(block(&as_list, "text_replacement").unwrap()["type"], "hash");
        assert_eq!(block(&as_object, "text_replacement").unwrap()["type"], "hash");
        assert!(block(&empty, "text_replacement").is_none());
    }

    #[test]
    fn test_check_required() {
        let mut diagnostics = Vec::new();
        check_required(
            &json!({"enabled": false, "name": "", "policy": null}),
            &["enabled", "name", "policy", "severity"],
            &mut diagnostics,
        );
        let attrs: Vec<_> = diagnostics
            .iter()
            .map(|d| d.attribute.as_deref().unwrap())
            .collect();
        assert_eq!(attrs, vec!["name", "policy", "severity"]);
    }

    #[test]
    fn test_object_mut_rejects_non_objects() {
        let mut state = json!([1, 2]);
        assert!(object_mut(&mut state).is_err());

        let mut state = json!({});
        object_mut(&mut state)
            .unwrap()
            .insert("id".into(), json!("x"));
        assert_eq!(id(&state).unwrap(), "x");
    }
}
