//! Plain data types shared by the protocol layer and the resources.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generated;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The attribute name.
    pub path: String,
    /// The value before the change, `None` when the attribute is being set.
    pub before: Option<Value>,
    /// The value after the change, `None` when the attribute is being removed.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Build a change from optional before/after values.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Whether the attribute is being set for the first time.
    pub fn is_addition(&self) -> bool {
        self.before.is_none() && self.after.is_some()
    }

    /// Whether the attribute is being removed.
    pub fn is_removal(&self) -> bool {
        self.before.is_some() && self.after.is_none()
    }
}

fn encode_optional(value: Option<Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(&v).ok())
        .unwrap_or_default()
}

fn decode_optional(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

impl From<generated::AttributeChange> for AttributeChange {
    fn from(proto: generated::AttributeChange) -> Self {
        Self::new(
            proto.path,
            decode_optional(&proto.before),
            decode_optional(&proto.after),
        )
    }
}

impl From<AttributeChange> for generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: encode_optional(change.before),
            after: encode_optional(change.after),
        }
    }
}

/// The outcome of planning one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The state the resource is expected to have after apply.
    pub planned_state: Value,
    /// Per-attribute differences from the prior state.
    pub changes: Vec<AttributeChange>,
    /// Whether a changed attribute forces destroy-then-create.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan that leaves `state` untouched.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Whether the plan would do anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource produced by `ImportResourceState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type name.
    pub resource_type: String,
    /// The state read from AWS.
    pub state: Value,
}

impl ImportedResource {
    /// An imported resource of `resource_type`.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// What the provider serves, returned by `GetMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Optional protocol features.
    pub capabilities: ServerCapabilities,
}

/// Optional protocol features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether `Plan` accepts a null proposed state to plan a destroy.
    pub plan_destroy: bool,
}

/// Handshake protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// First field of the handshake line.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_kinds() {
        assert!(AttributeChange::new("name", None, Some(json!("api"))).is_addition());
        assert!(AttributeChange::new("name", Some(json!("api")), None).is_removal());

        let modified = AttributeChange::new("ttl", Some(json!(1)), Some(json!(2)));
        assert!(!modified.is_addition());
        assert!(!modified.is_removal());
    }

    #[test]
    fn test_change_proto_conversion() {
        let change = AttributeChange::new("kind", None, Some(json!("PIPELINE")));

        let proto: generated::AttributeChange = change.clone().into();
        assert_eq!(proto.path, "kind");
        assert!(proto.before.is_empty());

        let back: AttributeChange = proto.into();
        assert_eq!(back, change);
    }

    #[test]
    fn test_plan_result() {
        let plan = PlanResult::no_change(json!({"id": "abc"}));
        assert!(!plan.has_changes());
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_handshake_constants() {
        assert_eq!(
            format!("{HANDSHAKE_PREFIX}|{PROTOCOL_VERSION}|127.0.0.1:5000"),
            "HEMMER_PROVIDER|1|127.0.0.1:5000"
        );
    }
}
