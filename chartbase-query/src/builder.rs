//! Query description accumulated by callers before execution.
//!
//! The builder is deliberately infallible; field paths are validated when the
//! query is compiled against a schema, so malformed input surfaces as a
//! [`QueryError`](crate::QueryError) from `execute` rather than mid-chain.

use serde_json::Value;

/// Comparison operator for a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Substring match; both sides must be strings.
    Contains,
    StartsWith,
    /// Membership in a JSON array of values.
    In,
    NotIn,
}

impl Operator {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::In => "in",
            Self::NotIn => "not_in",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort order for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// One `(path, operator, value)` predicate.
#[derive(Debug, Clone)]
pub struct Filter {
    pub path: String,
    pub operator: Operator,
    pub value: Value,
}

/// One sort key.
#[derive(Debug, Clone)]
pub struct SortSpec {
    pub path: String,
    pub direction: SortDirection,
}

/// Directive to attach a related record to each hit.
///
/// The value at `fk_path` is treated as the id of a record of `related_type`
/// and looked up by key. This is an augmentation, not a join: an unresolvable
/// id simply leaves the hit without an attachment.
#[derive(Debug, Clone)]
pub struct Include {
    pub alias: String,
    pub fk_path: String,
    pub related_type: String,
}

/// A query over one record type.
#[derive(Debug, Clone)]
pub struct Query {
    pub record_type: String,
    pub filters: Vec<Filter>,
    pub sorts: Vec<SortSpec>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub includes: Vec<Include>,
}

impl Query {
    /// Starts a query for all live records of `record_type`.
    #[must_use]
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            filters: Vec::new(),
            sorts: Vec::new(),
            limit: None,
            offset: 0,
            includes: Vec::new(),
        }
    }

    /// Adds a predicate; all predicates are ANDed together.
    #[must_use]
    pub fn filter(mut self, path: &str, operator: Operator, value: Value) -> Self {
        self.filters.push(Filter {
            path: path.to_string(),
            operator,
            value,
        });
        self
    }

    /// Inclusive range: sugar for `Gte(low) AND Lte(high)`.
    #[must_use]
    pub fn between(self, path: &str, low: Value, high: Value) -> Self {
        self.filter(path, Operator::Gte, low)
            .filter(path, Operator::Lte, high)
    }

    /// Adds a sort key; keys are applied in the order given.
    #[must_use]
    pub fn sort(mut self, path: &str, direction: SortDirection) -> Self {
        self.sorts.push(SortSpec {
            path: path.to_string(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Attaches the record of `related_type` whose id is the string at
    /// `fk_path`, under `alias`.
    #[must_use]
    pub fn include(mut self, alias: &str, fk_path: &str, related_type: &str) -> Self {
        self.includes.push(Include {
            alias: alias.to_string(),
            fk_path: fk_path.to_string(),
            related_type: related_type.to_string(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn between_expands_to_two_predicates() {
        let query = Query::new("Patient").between("/age", json!(18), json!(65));
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[0].operator, Operator::Gte);
        assert_eq!(query.filters[0].value, json!(18));
        assert_eq!(query.filters[1].operator, Operator::Lte);
        assert_eq!(query.filters[1].value, json!(65));
    }

    #[test]
    fn builder_accumulates_in_order() {
        let query = Query::new("Encounter")
            .filter("/status", Operator::Eq, json!("open"))
            .sort("/started_at", SortDirection::Descending)
            .include("patient", "/patient_id", "Patient")
            .limit(10)
            .offset(20);
        assert_eq!(query.record_type, "Encounter");
        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.sorts.len(), 1);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, 20);
        assert_eq!(query.includes[0].alias, "patient");
    }
}
