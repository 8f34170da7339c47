//! Per-type schema configuration: index fields, encrypted fields, retention.
//!
//! Schemas are built once at startup through [`SchemaBuilder`], which
//! validates every field path up front, and collected into an immutable
//! [`SchemaRegistry`] shared by the storage and query engines.

use crate::{FieldPath, ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for one record type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSchema {
    pub record_type: String,
    /// Fields the store may use to narrow a scan. Order matters: the query
    /// engine picks the first indexed predicate in this order.
    pub indexed_fields: Vec<FieldPath>,
    /// Fields whose values are encrypted at rest.
    pub encrypted_fields: Vec<FieldPath>,
    /// Maximum record age in days; `0` means permanent.
    pub retention_days: u32,
}

impl RecordSchema {
    /// Starts building a schema for `record_type`.
    #[must_use]
    pub fn builder(record_type: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            record_type: record_type.into(),
            indexed: Vec::new(),
            encrypted: Vec::new(),
            retention_days: 0,
        }
    }

    /// Whether records of this type ever expire.
    #[must_use]
    pub fn expires(&self) -> bool {
        self.retention_days > 0
    }

    /// Whether `path` is configured as encrypted.
    #[must_use]
    pub fn is_encrypted(&self, path: &str) -> bool {
        self.encrypted_fields.iter().any(|p| p.as_str() == path)
    }

    /// The first indexed field (in declaration order) matching `path`.
    #[must_use]
    pub fn index_for(&self, path: &str) -> Option<&FieldPath> {
        self.indexed_fields.iter().find(|p| p.as_str() == path)
    }
}

/// Builder that validates field paths at configuration time.
#[derive(Debug)]
pub struct SchemaBuilder {
    record_type: String,
    indexed: Vec<String>,
    encrypted: Vec<String>,
    retention_days: u32,
}

impl SchemaBuilder {
    /// Declares an indexed field (JSON-pointer path).
    #[must_use]
    pub fn index(mut self, path: &str) -> Self {
        self.indexed.push(path.to_string());
        self
    }

    /// Declares an encrypted field (JSON-pointer path).
    #[must_use]
    pub fn encrypt(mut self, path: &str) -> Self {
        self.encrypted.push(path.to_string());
        self
    }

    /// Sets the retention policy in days (`0` = keep forever).
    #[must_use]
    pub fn retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Compiles every declared path; an invalid path fails the whole build.
    pub fn build(self) -> ModelResult<RecordSchema> {
        let indexed_fields = self
            .indexed
            .iter()
            .map(|p| FieldPath::parse(p))
            .collect::<ModelResult<Vec<_>>>()?;
        let encrypted_fields = self
            .encrypted
            .iter()
            .map(|p| FieldPath::parse(p))
            .collect::<ModelResult<Vec<_>>>()?;

        Ok(RecordSchema {
            record_type: self.record_type,
            indexed_fields,
            encrypted_fields,
            retention_days: self.retention_days,
        })
    }
}

/// Immutable collection of all registered record schemas.
///
/// Built once before the store opens; the engines treat it as read-only for
/// the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, RecordSchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema; rejects duplicates.
    pub fn register(&mut self, schema: RecordSchema) -> ModelResult<()> {
        if self.schemas.contains_key(&schema.record_type) {
            return Err(ModelError::DuplicateSchema(schema.record_type));
        }
        self.schemas.insert(schema.record_type.clone(), schema);
        Ok(())
    }

    /// Looks up the schema for a record type.
    #[must_use]
    pub fn get(&self, record_type: &str) -> Option<&RecordSchema> {
        self.schemas.get(record_type)
    }

    /// All registered record types.
    pub fn record_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Schemas with a finite retention policy, for the expiration sweep.
    pub fn expiring_schemas(&self) -> impl Iterator<Item = &RecordSchema> {
        self.schemas.values().filter(|s| s.expires())
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
