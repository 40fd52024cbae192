//! The contract every resource and data source implements, and the generic plan.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::{Map, Number, Value};

use crate::config::AwsClients;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema};
use crate::state::{is_unset, State};
use crate::types::{AttributeChange, PlanResult};

/// One managed AWS object type, e.g. `aws_appsync_resolver`.
///
/// Handlers receive the full attribute map and return the full attribute map as
/// read back from AWS. `read` returns `Ok(None)` when the object no longer exists;
/// `delete` succeeds when it is already gone.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The resource type name.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Cross-attribute checks the schema cannot express.
    fn validate(&self, _config: &State) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Replacements the `force_new` flags cannot express, e.g. one member of a block.
    fn requires_replace(&self, _prior: &State, _planned: &State) -> bool {
        false
    }

    /// Create the object described by `planned`.
    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError>;

    /// Refresh `current` from AWS.
    async fn read(
        &self,
        clients: &AwsClients,
        current: State,
    ) -> Result<Option<State>, ProviderError>;

    /// Apply the difference between `prior` and `planned`.
    async fn update(
        &self,
        clients: &AwsClients,
        prior: State,
        planned: State,
    ) -> Result<State, ProviderError>;

    /// Destroy the object.
    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError>;

    /// Adopt an existing object by its ID.
    async fn import(&self, clients: &AwsClients, id: &str) -> Result<State, ProviderError> {
        let state = State::new().with("id", id);
        self.read(clients, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("cannot import non-existent {} ({id})", self.type_name()))
        })
    }
}

/// One read-only lookup, e.g. `aws_appsync_graphql_api`.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The data source type name.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Look the object up. A missing object is an error.
    async fn read(&self, clients: &AwsClients, config: State) -> Result<State, ProviderError>;
}

/// The state read back after a create or update. The object must exist.
pub(crate) fn read_back(what: &str, state: Option<State>) -> Result<State, ProviderError> {
    state.ok_or_else(|| ProviderError::NotFound(format!("{what} not found after write")))
}

/// Diff `prior` against `proposed` using `schema`.
///
/// - A null `proposed` plans a destroy: every set attribute is removed.
/// - Both sides are normalized first: unset values (`null`, `""`, `[]`, `{}`) are
///   dropped, defaults are filled in, numbers take their declared type and set
///   elements are ordered.
/// - Computed attributes left unset in `proposed` keep their prior value, inside
///   nested blocks too.
/// - A change to a `force_new` attribute (or any attribute inside a block that has
///   one) requires replacement, and computed-only attributes are cleared since the
///   new object will report fresh values.
pub fn plan(schema: &Schema, prior: &Value, proposed: &Value) -> Result<PlanResult, ProviderError> {
    plan_with(schema, prior, proposed, |_, _| false)
}

/// [`plan`], with `replace` consulted for updates the schema alone would apply in place.
pub fn plan_with(
    schema: &Schema,
    prior: &Value,
    proposed: &Value,
    replace: impl Fn(&State, &State) -> bool,
) -> Result<PlanResult, ProviderError> {
    let prior = State::from_value(prior.clone())?;

    if proposed.is_null() {
        let changes = prior
            .as_map()
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| AttributeChange::new(k.clone(), Some(v.clone()), None))
            .collect();
        return Ok(PlanResult {
            planned_state: Value::Null,
            changes,
            requires_replace: false,
        });
    }

    let proposed = State::from_value(proposed.clone())?;
    let creating = prior.as_map().is_empty();

    let prior = if creating {
        prior
    } else {
        State::from_value(Value::Object(normalize(&schema.block, prior.as_map())))?
    };
    let mut planned = normalize(&schema.block, proposed.as_map());
    if !creating {
        carry_computed(&schema.block, prior.as_map(), &mut planned);
    }
    let mut planned = State::from_value(Value::Object(planned))?;

    let mut requires_replace = false;
    let mut changes = Vec::new();
    for key in diff_keys(schema, &prior, &planned) {
        let before = prior.get(&key).cloned();
        let after = planned.get(&key).cloned();
        if before == after {
            continue;
        }
        if !creating && forces_new(schema, &key) {
            requires_replace = true;
        }
        changes.push(AttributeChange::new(key, before, after));
    }
    if !creating && !requires_replace && !changes.is_empty() && replace(&prior, &planned) {
        requires_replace = true;
    }

    if requires_replace {
        for (name, attr) in &schema.block.attributes {
            if attr.flags.is_computed_only() && planned.get(name).is_some() {
                if let Some(change) = changes.iter_mut().find(|c| &c.path == name) {
                    change.after = None;
                } else {
                    changes.push(AttributeChange::new(name.clone(), planned.get(name).cloned(), None));
                }
                planned.set(name, Value::Null);
            }
        }
    }

    Ok(PlanResult {
        planned_state: planned.into_value(),
        changes,
        requires_replace,
    })
}

/// Canonical form of one object under `block`.
fn normalize(block: &Block, object: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in object {
        let value = if let Some(attr) = block.attributes.get(key) {
            normalize_attribute(attr, value)
        } else if let Some(nested) = block.blocks.get(key) {
            normalize_nested(nested, value)
        } else {
            value.clone()
        };
        // An empty single block is still a block; its computed members get filled in.
        let empty_block = value.is_object()
            && block
                .blocks
                .get(key)
                .is_some_and(|nested| nested.nesting_mode == BlockNestingMode::Single);
        if empty_block || !is_unset(&value) {
            out.insert(key.clone(), value);
        }
    }
    for (key, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            if !out.contains_key(key) {
                out.insert(key.clone(), normalize_attribute(attr, default));
            }
        }
    }
    out
}

fn normalize_attribute(attr: &Attribute, value: &Value) -> Value {
    match (&attr.attr_type, value) {
        (AttributeType::Int64, Value::Number(n)) if n.as_i64().is_none() => n
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| Value::from(f as i64))
            .unwrap_or_else(|| value.clone()),
        (AttributeType::Float64, Value::Number(n)) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        (AttributeType::Set(_), Value::Array(items)) => Value::Array(sorted(items.clone())),
        _ => value.clone(),
    }
}

fn normalize_nested(nested: &NestedBlock, value: &Value) -> Value {
    let object = |item: &Value| item.as_object().map(|o| Value::Object(normalize(&nested.block, o)));
    let objects = |items: &[Value]| -> Vec<Value> { items.iter().filter_map(object).collect() };

    match (nested.nesting_mode, value) {
        (BlockNestingMode::Single, Value::Array(items)) => items.first().and_then(object).unwrap_or(Value::Null),
        (BlockNestingMode::Single, Value::Object(_)) => object(value).unwrap_or(Value::Null),
        (BlockNestingMode::List, Value::Array(items)) => Value::Array(objects(items)),
        (BlockNestingMode::Set, Value::Array(items)) => Value::Array(sorted(objects(items))),
        (BlockNestingMode::List | BlockNestingMode::Set, Value::Object(_)) => {
            Value::Array(objects(std::slice::from_ref(value)))
        }
        (BlockNestingMode::Map, Value::Object(entries)) => Value::Object(
            entries
                .iter()
                .filter_map(|(label, item)| object(item).map(|item| (label.clone(), item)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn sorted(mut items: Vec<Value>) -> Vec<Value> {
    items.sort_by_cached_key(Value::to_string);
    items
}

/// Copy computed attributes `planned` leaves unset from `prior`, descending into
/// single blocks and index-matched list blocks.
fn carry_computed(block: &Block, prior: &Map<String, Value>, planned: &mut Map<String, Value>) {
    for (key, attr) in &block.attributes {
        if attr.flags.computed && !planned.contains_key(key) {
            if let Some(value) = prior.get(key) {
                planned.insert(key.clone(), value.clone());
            }
        }
    }
    for (key, nested) in &block.blocks {
        match (nested.nesting_mode, prior.get(key), planned.get_mut(key)) {
            (BlockNestingMode::Single, Some(Value::Object(before)), Some(Value::Object(after))) => {
                carry_computed(&nested.block, before, after);
            }
            (BlockNestingMode::List, Some(Value::Array(before)), Some(Value::Array(after))) => {
                for (before, after) in before.iter().zip(after.iter_mut()) {
                    if let (Value::Object(before), Value::Object(after)) = (before, after) {
                        carry_computed(&nested.block, before, after);
                    }
                }
            }
            _ => {}
        }
    }
}

fn diff_keys(schema: &Schema, prior: &State, planned: &State) -> BTreeSet<String> {
    schema
        .block
        .attributes
        .keys()
        .chain(schema.block.blocks.keys())
        .chain(prior.as_map().keys())
        .chain(planned.as_map().keys())
        .cloned()
        .collect()
}

fn forces_new(schema: &Schema, key: &str) -> bool {
    if let Some(attr) = schema.block.attributes.get(key) {
        return attr.force_new;
    }
    schema
        .block
        .blocks
        .get(key)
        .is_some_and(|nested| nested.block.forces_new())
}
