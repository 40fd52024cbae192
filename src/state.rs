//! Typed access to the JSON state map exchanged with the engine.
//!
//! Every resource handler reads its configured attributes from a [`State`] and
//! writes the remote object's fields back into one. Absent, `null`, and (for
//! strings) empty values are all treated as "not set", which is how the engine
//! encodes unset optional attributes.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::ProviderError;

/// A resource's attribute map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State(Map<String, Value>);

impl State {
    /// An empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value. `null` becomes an empty state; anything other than an
    /// object is rejected.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(ProviderError::InvalidRequest(format!(
                "expected state to be a JSON object, got {other}"
            ))),
        }
    }

    /// The underlying JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Raw value of `key`, if set to something other than `null`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// The `id` attribute.
    pub fn id(&self) -> Result<&str, ProviderError> {
        self.str("id")
            .ok_or_else(|| ProviderError::InvalidRequest("state has no id".to_string()))
    }

    /// Non-empty string value of `key`.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Non-empty string value of `key`, or an error naming the attribute.
    pub fn required_str(&self, key: &str) -> Result<&str, ProviderError> {
        self.str(key).ok_or_else(|| {
            ProviderError::Validation(format!("attribute '{key}' is required"))
        })
    }

    /// Owned copy of [`State::str`].
    pub fn string(&self, key: &str) -> Option<String> {
        self.str(key).map(str::to_owned)
    }

    /// Boolean value of `key`.
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Integer value of `key`. Integral floats are accepted.
    pub fn i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        })
    }

    /// Integer value of `key`, narrowed to `i32`.
    pub fn i32(&self, key: &str) -> Option<i32> {
        self.i64(key).and_then(|v| i32::try_from(v).ok())
    }

    /// Numeric value of `key`.
    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Numeric value of `key`, narrowed to `f32`.
    pub fn f32(&self, key: &str) -> Option<f32> {
        self.f64(key).map(|v| v as f32)
    }

    /// String elements of a list or set attribute; non-strings are skipped.
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// String entries of a map attribute; non-string values are skipped.
    pub fn string_map(&self, key: &str) -> HashMap<String, String> {
        self.get(key)
            .and_then(Value::as_object)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_owned())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A single nested block. Accepts an object or a list holding one.
    pub fn block(&self, key: &str) -> Option<State> {
        match self.get(key)? {
            Value::Object(map) => Some(Self(map.clone())),
            Value::Array(items) => match items.first()? {
                Value::Object(map) => Some(Self(map.clone())),
                _ => None,
            },
            _ => None,
        }
    }

    /// A list of nested blocks.
    pub fn blocks(&self, key: &str) -> Vec<State> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_object().map(|map| Self(map.clone())))
                .collect(),
            Some(Value::Object(map)) => vec![Self(map.clone())],
            _ => Vec::new(),
        }
    }

    /// Set `key`. `None` values become `null`.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Set `key` from an SDK enum (or an optional one), using its wire string.
    pub fn set_enum(&mut self, key: &str, value: impl WireStr) {
        self.set(key, value.wire_str().map(str::to_owned));
    }

    /// Set a single nested block; `None` clears it.
    pub fn set_block(&mut self, key: &str, block: Option<State>) {
        self.set(key, block.map(State::into_value));
    }

    /// Set a list of nested blocks.
    pub fn set_blocks(&mut self, key: &str, blocks: impl IntoIterator<Item = State>) {
        let items: Vec<Value> = blocks.into_iter().map(State::into_value).collect();
        self.set(key, items);
    }

    /// Set a list of strings.
    pub fn set_strings<S: AsRef<str>>(&mut self, key: &str, items: impl IntoIterator<Item = S>) {
        let items: Vec<Value> = items
            .into_iter()
            .map(|s| Value::String(s.as_ref().to_owned()))
            .collect();
        self.set(key, items);
    }

    /// Set a string map. `None` becomes an empty map so computed maps stay stable.
    pub fn set_string_map(&mut self, key: &str, entries: Option<&HashMap<String, String>>) {
        let map: Map<String, Value> = entries
            .into_iter()
            .flatten()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        self.set(key, Value::Object(map));
    }

    /// Builder form of [`State::set`].
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder form of [`State::set`] for the `f32` numbers Rekognition returns.
    /// The value is widened through its shortest decimal form, so `0.1f32` is
    /// stored as `0.1` rather than `0.10000000149011612`.
    pub fn with_f32(self, key: &str, value: Option<f32>) -> Self {
        self.with(key, value.map(widen))
    }

    /// Whether `key` differs between `prior` and `self`. Missing, `null` and empty
    /// values compare equal.
    pub fn changed(&self, prior: &State, key: &str) -> bool {
        let set = |state: &State| state.get(key).filter(|v| !is_unset(v)).cloned();
        set(self) != set(prior)
    }

    /// Whether any of `keys` changed.
    pub fn any_changed(&self, prior: &State, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.changed(prior, key))
    }

    /// Parse a string attribute into an SDK enum.
    pub fn enum_value<E>(&self, key: &str) -> Option<E>
    where
        E: for<'a> From<&'a str>,
    {
        self.str(key).map(E::from)
    }
}

/// `null`, `""`, `[]` and `{}`: the encodings of an attribute that is not set.
pub fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// `f32` to `f64` without picking up binary noise.
pub fn widen(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(f64::from(value))
}

impl From<State> for Value {
    fn from(state: State) -> Self {
        state.into_value()
    }
}

/// Anything with an AWS wire-format string, used to store SDK enums in state.
pub trait WireStr {
    /// The wire string, if present.
    fn wire_str(&self) -> Option<&str>;
}

impl<E: AsRef<str>> WireStr for &E {
    fn wire_str(&self) -> Option<&str> {
        Some((*self).as_ref())
    }
}

impl<E: AsRef<str>> WireStr for Option<&E> {
    fn wire_str(&self) -> Option<&str> {
        self.map(|e| e.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: Value) -> State {
        State::from_value(value).unwrap()
    }

    #[test]
    fn test_from_value() {
        assert_eq!(State::from_value(Value::Null).unwrap(), State::new());
        assert!(State::from_value(json!([1])).is_err());
    }

    #[test]
    fn test_strings_treat_empty_as_unset() {
        let s = state(json!({"name": "api", "description": "", "other": null}));

        assert_eq!(s.str("name"), Some("api"));
        assert_eq!(s.str("description"), None);
        assert_eq!(s.str("other"), None);
        assert!(s.required_str("description").is_err());
        assert!(s.id().is_err());
    }

    #[test]
    fn test_numbers() {
        let s = state(json!({"ttl": 300, "whole": 12.0, "threshold": 80.5}));

        assert_eq!(s.i64("ttl"), Some(300));
        assert_eq!(s.i32("whole"), Some(12));
        assert_eq!(s.i64("threshold"), None);
        assert_eq!(s.f32("threshold"), Some(80.5));
    }

    #[test]
    fn test_collections() {
        let s = state(json!({
            "functions": ["a", "b"],
            "tags": {"env": "prod"},
            "runtime": [{"name": "APPSYNC_JS"}],
            "auth_provider": [{"auth_type": "API_KEY"}, {"auth_type": "AWS_IAM"}],
        }));

        assert_eq!(s.strings("functions"), vec!["a", "b"]);
        assert_eq!(s.string_map("tags").get("env").map(String::as_str), Some("prod"));
        assert_eq!(s.block("runtime").unwrap().str("name"), Some("APPSYNC_JS"));
        assert_eq!(s.blocks("auth_provider").len(), 2);
        assert!(s.block("missing").is_none());
        assert!(s.strings("missing").is_empty());
    }

    #[test]
    fn test_set_and_changed() {
        let prior = state(json!({"name": "a", "description": null}));
        let mut next = State::new();
        next.set("name", "b");
        next.set("description", None::<String>);

        assert!(next.changed(&prior, "name"));
        assert!(!next.changed(&prior, "description"));
        assert!(next.any_changed(&prior, &["description", "name"]));
    }

    #[test]
    fn test_empty_collections_are_unchanged() {
        let prior = state(json!({"tags": {}, "regions_of_interest": [], "description": ""}));
        let next = State::new();

        assert!(!next.any_changed(&prior, &["tags", "regions_of_interest", "description"]));
        assert!(state(json!({"tags": {"env": "prod"}})).changed(&prior, "tags"));
    }

    #[test]
    fn test_with_f32_keeps_decimal_form() {
        let s = State::new()
            .with_f32("height", Some(0.1))
            .with_f32("width", Some(0.3))
            .with_f32("top", None);

        assert_eq!(s.as_map()["height"], json!(0.1));
        assert_eq!(s.as_map()["width"], json!(0.3));
        assert_eq!(s.get("top"), None);
        assert_eq!(widen(80.5), 80.5);
    }

    #[test]
    fn test_set_block_and_map() {
        let mut s = State::new();
        s.set_block("log_config", Some(State::new().with("field_log_level", "ALL")));
        s.set_string_map("uris", None);
        s.set_strings("labels", ["PET"]);

        assert_eq!(
            s.into_value(),
            json!({"log_config": {"field_log_level": "ALL"}, "uris": {}, "labels": ["PET"]})
        );
    }

    #[test]
    fn test_enum_round_trip() {
        #[derive(Debug, PartialEq)]
        struct Kind(String);
        impl From<&str> for Kind {
            fn from(s: &str) -> Self {
                Kind(s.to_string())
            }
        }
        impl AsRef<str> for Kind {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        let s = state(json!({"kind": "PIPELINE"}));
        let kind: Kind = s.enum_value("kind").unwrap();

        let mut out = State::new();
        out.set_enum("kind", &kind);
        out.set_enum("other", None::<&Kind>);
        assert_eq!(out.into_value(), json!({"kind": "PIPELINE", "other": null}));
    }
}
