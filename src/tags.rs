//! Resource tag diffs.

use std::collections::{BTreeSet, HashMap};

use crate::state::State;

/// The configured `tags`, `None` when empty so create calls omit them.
pub fn tags_from(state: &State) -> Option<HashMap<String, String>> {
    Some(state.string_map("tags")).filter(|tags| !tags.is_empty())
}

/// What to send to `UntagResource` and `TagResource` to move from one tag set to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Keys present before and absent after.
    pub remove: Vec<String>,
    /// Keys added or whose value changed.
    pub upsert: HashMap<String, String>,
}

impl TagDiff {
    /// Compare `old` against `new`.
    pub fn new(old: &HashMap<String, String>, new: &HashMap<String, String>) -> Self {
        let remove = old
            .keys()
            .filter(|key| !new.contains_key(*key))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let upsert = new
            .iter()
            .filter(|(key, value)| old.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { remove, upsert }
    }

    /// Whether the tag sets are equal.
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.upsert.is_empty()
    }
}
