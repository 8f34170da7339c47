//! Compiled field-path accessors.
//!
//! Field paths use JSON-pointer syntax (`/name/family`). They are parsed and
//! validated once, when a schema is built, so a typo in configuration fails
//! at startup instead of silently matching nothing at query time.

use crate::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A validated accessor for one field inside a record payload.
///
/// Only object traversal is supported; array indexing is intentionally
/// excluded because indexed/encrypted fields must be stable named locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    pointer: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses and validates a JSON-pointer field path.
    pub fn parse(pointer: &str) -> ModelResult<Self> {
        let invalid = |reason: &str| ModelError::InvalidPath {
            path: pointer.to_string(),
            reason: reason.to_string(),
        };

        if pointer.is_empty() {
            return Err(invalid("path is empty"));
        }
        if !pointer.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut segments = Vec::new();
        for raw in pointer[1..].split('/') {
            if raw.is_empty() {
                return Err(invalid("empty path segment"));
            }
            // JSON-pointer escape sequences: ~1 => '/', ~0 => '~'
            let seg = raw.replace("~1", "/").replace("~0", "~");
            if seg.parse::<usize>().is_ok() {
                return Err(invalid("array indices are not addressable"));
            }
            segments.push(seg);
        }

        Ok(Self {
            pointer: pointer.to_string(),
            segments,
        })
    }

    /// The original JSON-pointer string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pointer
    }

    /// Reads the value at this path, if present.
    #[must_use]
    pub fn get<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        let mut current = payload;
        for seg in &self.segments {
            current = current.as_object()?.get(seg)?;
        }
        Some(current)
    }

    /// Replaces the value at this path in place.
    ///
    /// Returns `false` (payload untouched) when any intermediate object is
    /// missing or not an object; paths never create structure.
    pub fn set(&self, payload: &mut Value, new_value: Value) -> bool {
        let mut current = payload;
        let (last, parents) = match self.segments.split_last() {
            Some(split) => split,
            None => return false,
        };
        for seg in parents {
            current = match current.as_object_mut().and_then(|o| o.get_mut(seg)) {
                Some(next) => next,
                None => return false,
            };
        }
        match current.as_object_mut() {
            Some(obj) if obj.contains_key(last) => {
                obj.insert(last.clone(), new_value);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pointer)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.pointer
    }
}
