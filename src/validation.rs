//! Checks a JSON configuration against a [`Schema`].
//!
//! Validation never talks to AWS. It reports structural problems (missing required
//! attributes, wrong types, block cardinality) and value problems (length, pattern,
//! enum membership, numeric range, timestamp format) as [`Diagnostic`]s, so the
//! engine can show every mistake in one pass.
//!
//! ```
//! use hemmer_provider_aws::schema::{Attribute, Schema, Validator};
//! use hemmer_provider_aws::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0().with_attribute(
//!     "ttl",
//!     Attribute::required_int64().with_validator(Validator::int_range(1, 3600)),
//! );
//!
//! assert!(validate(&schema, &json!({"ttl": 60})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"ttl": 0}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("ttl"));
//! ```

use regex::Regex;
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema, Validator,
};

/// Validate `value` against `schema`. An empty result means the value is valid.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], but as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether `value` passes [`validate`] without diagnostics.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Check a single value against a validator.
///
/// Returns the reason for rejection, or `None` when the value is acceptable or the
/// validator does not apply to the value's JSON type.
pub fn check_value(validator: &Validator, value: &Value) -> Option<String> {
    match (validator, value) {
        (Validator::StringLength { min, max }, Value::String(s)) => {
            let len = s.chars().count();
            (len < *min || len > *max)
                .then(|| format!("length must be between {min} and {max}, got {len}"))
        },
        (Validator::Pattern { pattern, message }, Value::String(s)) => match Regex::new(pattern) {
            Ok(re) if re.is_match(s) => None,
            Ok(_) => Some(message.clone()),
            Err(err) => Some(format!("invalid pattern {pattern:?}: {err}")),
        },
        (Validator::OneOf { values }, Value::String(s)) => (!values.iter().any(|v| v == s))
            .then(|| format!("expected one of [{}], got {s:?}", values.join(", "))),
        (Validator::IntRange { min, max }, Value::Number(n)) => {
            let n = n.as_f64().unwrap_or_default();
            (n < *min as f64 || n > *max as f64)
                .then(|| format!("must be between {min} and {max}, got {n}"))
        },
        (Validator::FloatRange { min, max }, Value::Number(n)) => {
            let n = n.as_f64().unwrap_or_default();
            (n < *min || n > *max).then(|| format!("must be between {min} and {max}, got {n}"))
        },
        (Validator::Rfc3339, Value::String(s)) => OffsetDateTime::parse(s, &Rfc3339)
            .err()
            .map(|err| format!("must be an RFC3339 timestamp: {err}")),
        _ => None,
    }
}

fn check_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(obj) => obj,
        Value::Null => return,
        other => {
            let mut diagnostic =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", kind(other)));
            if !path.is_empty() {
                diagnostic = diagnostic.with_attribute(path);
            }
            diagnostics.push(diagnostic);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        check_attribute(attr, obj.get(name), &join(path, name), diagnostics);
    }
    for (name, nested) in &block.blocks {
        check_nested(nested, obj.get(name), &join(path, name), diagnostics);
    }
}

fn check_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    let value = match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{path}'"))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
            return;
        },
        Some(value) => value,
    };

    let before = diagnostics.len();
    check_type(&attr.attr_type, value, path, diagnostics);
    if diagnostics.len() > before || attr.validators.is_empty() {
        return;
    }

    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_validators(&attr.validators, item, &format!("{path}.{i}"), diagnostics);
            }
        },
        scalar => check_validators(&attr.validators, scalar, path, diagnostics),
    }
}

fn check_validators(
    validators: &[Validator],
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for reason in validators.iter().filter_map(|v| check_value(v, value)) {
        diagnostics.push(
            Diagnostic::error(format!("Invalid value for attribute '{path}'"))
                .with_detail(reason)
                .with_attribute(path),
        );
    }
}

fn check_type(attr_type: &AttributeType, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let ok = match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => is_integral(value),
        AttributeType::Float64 => value.is_number(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::Dynamic => true,
        AttributeType::List(element) | AttributeType::Set(element) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    check_type(element, item, &format!("{path}.{i}"), diagnostics);
                }
                true
            },
            None => false,
        },
        AttributeType::Map(element) => match value.as_object() {
            Some(entries) => {
                for (key, item) in entries {
                    check_type(element, item, &format!("{path}.{key}"), diagnostics);
                }
                true
            },
            None => false,
        },
        AttributeType::Object(fields) => match value.as_object() {
            Some(entries) => {
                for (name, field_type) in fields {
                    if let Some(item) = entries.get(name) {
                        check_type(field_type, item, &join(path, name), diagnostics);
                    }
                }
                true
            },
            None => false,
        },
    };

    if !ok {
        diagnostics.push(
            Diagnostic::error(format!("Invalid type for attribute '{path}'"))
                .with_detail(format!("Expected {}, got {}", type_label(attr_type), kind(value)))
                .with_attribute(path),
        );
    }
}

fn check_nested(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let value = match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required block '{path}'"))
                        .with_detail(format!("At least {} block(s) required", nested.min_items))
                        .with_attribute(path),
                );
            }
            return;
        },
        Some(value) => value,
    };

    match (nested.nesting_mode, value) {
        // A single block may arrive as a one-element list.
        (BlockNestingMode::Single, Value::Array(items)) => {
            check_count(nested, items.len(), path, diagnostics);
            for item in items {
                check_block(&nested.block, item, path, diagnostics);
            }
        },
        (BlockNestingMode::Single, item) => check_block(&nested.block, item, path, diagnostics),
        (BlockNestingMode::List | BlockNestingMode::Set, Value::Array(items)) => {
            check_count(nested, items.len(), path, diagnostics);
            for (i, item) in items.iter().enumerate() {
                check_block(&nested.block, item, &format!("{path}.{i}"), diagnostics);
            }
        },
        (BlockNestingMode::Map, Value::Object(entries)) => {
            check_count(nested, entries.len(), path, diagnostics);
            check_map_entries(&nested.block, entries, path, diagnostics);
        },
        (mode, other) => diagnostics.push(
            Diagnostic::error(format!(
                "Expected {} for block '{path}'",
                if mode == BlockNestingMode::Map { "map" } else { "list" }
            ))
            .with_detail(format!("Got {}", kind(other)))
            .with_attribute(path),
        ),
    }
}

fn check_map_entries(
    block: &Block,
    entries: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (key, item) in entries {
        check_block(block, item, &format!("{path}.{key}"), diagnostics);
    }
}

fn check_count(nested: &NestedBlock, len: usize, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let len = len as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{path}' requires at least {} item(s), got {len}",
                nested.min_items
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{path}' allows at most {} item(s), got {len}",
                nested.max_items
            ))
            .with_attribute(path),
        );
    }
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}.{name}")
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_label(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Float64 => "float64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
        AttributeType::Set(_) => "set",
        AttributeType::Map(_) => "map",
        AttributeType::Object(_) => "object",
        AttributeType::Dynamic => "any",
    }
}

fn is_integral(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => true,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
    use serde_json::json;

    #[test]
    fn test_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "example"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        assert_eq!(validate(&schema, &json!({"name": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_computed_only_skipped() {
        let schema = Schema::resource();
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_int64_accepts_integral_floats() {
        let schema = Schema::v0().with_attribute("ttl", Attribute::required_int64());

        assert!(validate(&schema, &json!({"ttl": 42})).is_empty());
        assert!(validate(&schema, &json!({"ttl": 42.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"ttl": 42.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"ttl": "42"})).len(), 1);
    }

    #[test]
    fn test_list_element_paths() {
        let schema = Schema::v0().with_attribute(
            "functions",
            Attribute::string_list(AttributeFlags::required()),
        );

        assert!(validate(&schema, &json!({"functions": []})).is_empty());

        let diagnostics = validate(&schema, &json!({"functions": ["a", 1]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("functions.1".to_string()));

        assert_eq!(validate(&schema, &json!({"functions": "a"})).len(), 1);
    }

    #[test]
    fn test_tags_map() {
        let schema = Schema::v0().with_tags();

        assert!(validate(&schema, &json!({"tags": {"env": "prod"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"tags": {"env": "prod", "count": 1}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("tags.count".to_string()));
    }

    #[test]
    fn test_string_length_and_pattern() {
        let schema = Schema::v0().with_attribute(
            "name",
            Attribute::required_string()
                .with_validator(Validator::length(1, 50))
                .with_validator(Validator::pattern(
                    r"^[A-Za-z0-9](?:[A-Za-z0-9\-]{0,48}[A-Za-z0-9])?$",
                    "must be alphanumeric with inner hyphens",
                )),
        );

        assert!(validate(&schema, &json!({"name": "chat-room"})).is_empty());

        let diagnostics = validate(&schema, &json!({"name": "-bad"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("must be alphanumeric with inner hyphens")
        );

        let diagnostics = validate(&schema, &json!({"name": ""}));
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_one_of() {
        let schema = Schema::v0().with_attribute(
            "kind",
            Attribute::optional_string().one_of(&["UNIT", "PIPELINE"]),
        );

        assert!(validate(&schema, &json!({"kind": "PIPELINE"})).is_empty());

        let diagnostics = validate(&schema, &json!({"kind": "pipeline"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.as_deref().unwrap().contains("UNIT, PIPELINE"));
    }

    #[test]
    fn test_one_of_applies_to_list_elements() {
        let schema = Schema::v0().with_attribute(
            "labels",
            Attribute::string_list(AttributeFlags::required())
                .one_of(&["PERSON", "PET", "PACKAGE", "ALL"]),
        );

        assert!(validate(&schema, &json!({"labels": ["PET", "PERSON"]})).is_empty());

        let diagnostics = validate(&schema, &json!({"labels": ["PET", "CAR"]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("labels.1".to_string()));
    }

    #[test]
    fn test_numeric_ranges() {
        let schema = Schema::v0()
            .with_attribute(
                "query_depth_limit",
                Attribute::optional_int64().with_validator(Validator::int_range(0, 75)),
            )
            .with_attribute(
                "min_confidence",
                Attribute::optional_float64().with_validator(Validator::float_range(0.0, 100.0)),
            );

        assert!(validate(&schema, &json!({"query_depth_limit": 75, "min_confidence": 99.5})).is_empty());
        assert_eq!(validate(&schema, &json!({"query_depth_limit": 76})).len(), 1);
        assert_eq!(validate(&schema, &json!({"min_confidence": -1})).len(), 1);
    }

    #[test]
    fn test_rfc3339() {
        let schema = Schema::v0().with_attribute(
            "expires",
            Attribute::optional_computed_string().with_validator(Validator::Rfc3339),
        );

        assert!(validate(&schema, &json!({"expires": "2030-01-02T03:00:00Z"})).is_empty());
        assert_eq!(validate(&schema, &json!({"expires": "tomorrow"})).len(), 1);
    }

    #[test]
    fn test_single_block() {
        let schema = Schema::v0().with_block(
            "log_config",
            NestedBlock::single(
                Block::new().with_attribute("cloudwatch_logs_role_arn", Attribute::required_string()),
            ),
        );

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(
            &schema,
            &json!({"log_config": {"cloudwatch_logs_role_arn": "arn:aws:iam::1:role/x"}})
        )
        .is_empty());
        assert!(validate(
            &schema,
            &json!({"log_config": [{"cloudwatch_logs_role_arn": "arn:aws:iam::1:role/x"}]})
        )
        .is_empty());

        let diagnostics = validate(&schema, &json!({"log_config": {}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("log_config.cloudwatch_logs_role_arn".to_string())
        );

        let diagnostics = validate(&schema, &json!({"log_config": [{}, {}]}));
        assert!(diagnostics.iter().any(|d| d.summary.contains("at most 1")));
    }

    #[test]
    fn test_required_single_block() {
        let schema = Schema::v0()
            .with_block("input", NestedBlock::required_single(Block::new()));

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Missing required block"));
    }

    #[test]
    fn test_list_block_bounds() {
        let schema = Schema::v0().with_block(
            "auth_provider",
            NestedBlock::list(Block::new().with_attribute("auth_type", Attribute::required_string()))
                .with_min_items(1)
                .with_max_items(2),
        );

        assert!(validate(&schema, &json!({"auth_provider": [{"auth_type": "API_KEY"}]})).is_empty());

        let diagnostics = validate(&schema, &json!({"auth_provider": []}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(
            &schema,
            &json!({"auth_provider": [{"auth_type": "A"}, {"auth_type": "B"}, {"auth_type": "C"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 2"));

        let diagnostics = validate(&schema, &json!({"auth_provider": [{"auth_type": 1}]}));
        assert_eq!(
            diagnostics[0].attribute,
            Some("auth_provider.0.auth_type".to_string())
        );
    }

    #[test]
    fn test_deeply_nested_validator_path() {
        let schema = Schema::v0().with_block(
            "settings",
            NestedBlock::single(Block::new().with_block(
                "face_search",
                NestedBlock::single(Block::new().with_attribute(
                    "face_match_threshold",
                    Attribute::optional_float64().with_validator(Validator::float_range(0.0, 100.0)),
                )),
            )),
        );

        let diagnostics = validate(
            &schema,
            &json!({"settings": {"face_search": {"face_match_threshold": 101}}}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("settings.face_search.face_match_threshold".to_string())
        );
    }

    #[test]
    fn test_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(is_valid(&schema, &json!({"name": "x"})));
        assert!(!is_valid(&schema, &json!({})));
        assert!(validate_result(&schema, &json!({"name": "x"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("nope"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert_eq!(diagnostics[0].attribute, None);
    }
}
