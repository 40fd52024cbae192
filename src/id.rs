//! Composite resource IDs.
//!
//! Several AppSync objects are only addressable through their parent API, so the
//! provider stores a synthesized ID that joins the parts needed to find the object
//! again, e.g. `apiID:SDL:Query` for a type.

use crate::error::ProviderError;

/// How one resource type joins its ID parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdFormat {
    separator: &'static str,
    parts: &'static [&'static str],
}

impl IdFormat {
    /// A format joining `parts` (named for error messages) with `separator`.
    pub const fn new(separator: &'static str, parts: &'static [&'static str]) -> Self {
        Self { separator, parts }
    }

    /// Join `values` into an ID.
    pub fn encode(&self, values: &[&str]) -> String {
        values.join(self.separator)
    }

    /// Split `id` into its parts.
    ///
    /// When the separator is `-`, which may also appear inside the last part (field
    /// names never do, but function IDs and data source names may), the split stops
    /// after the expected number of parts.
    pub fn decode<'a>(&self, id: &'a str) -> Result<Vec<&'a str>, ProviderError> {
        let values: Vec<&str> = id.splitn(self.parts.len(), self.separator).collect();
        if values.len() != self.parts.len() || values.iter().any(|v| v.is_empty()) {
            return Err(ProviderError::InvalidRequest(format!(
                "unexpected format for ID ({id}), expected {}",
                self.parts.join(self.separator)
            )));
        }
        Ok(values)
    }

    /// Decode an ID with exactly two parts.
    pub fn decode_pair<'a>(&self, id: &'a str) -> Result<(&'a str, &'a str), ProviderError> {
        match self.decode(id)?.as_slice() {
            [a, b] => Ok((*a, *b)),
            _ => Err(ProviderError::InvalidRequest(format!(
                "ID format for {id} does not have two parts"
            ))),
        }
    }

    /// Decode an ID with exactly three parts.
    pub fn decode_triple<'a>(
        &self,
        id: &'a str,
    ) -> Result<(&'a str, &'a str, &'a str), ProviderError> {
        match self.decode(id)?.as_slice() {
            [a, b, c] => Ok((*a, *b, *c)),
            _ => Err(ProviderError::InvalidRequest(format!(
                "ID format for {id} does not have three parts"
            ))),
        }
    }
}
