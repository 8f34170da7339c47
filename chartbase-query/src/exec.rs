//! Query execution: index narrowing, predicate evaluation, pagination.
//!
//! The engine always evaluates every predicate against every candidate, even
//! the one that selected the index. The index only shrinks the scan; it is
//! never trusted for correctness.

use crate::builder::{Operator, Query, SortDirection};
use crate::error::{QueryError, QueryResult};
use chartbase_model::{FieldPath, Record, RecordSchema};
use chartbase_storage::{index_value, RecordStore, StorageError};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// One query result: the revealed record plus any included related records.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub record: Record,
    /// Related records keyed by include alias. Unresolvable foreign keys
    /// simply have no entry.
    pub related: BTreeMap<String, Record>,
}

/// A page of confirmed matches.
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub hits: Vec<QueryHit>,
    /// Count of all confirmed matches, regardless of page size.
    pub total: usize,
    /// Whether `offset + limit` leaves matches beyond this page.
    pub has_more: bool,
}

/// A filter whose path has been validated and classified against the schema.
struct CompiledFilter {
    path: FieldPath,
    operator: Operator,
    value: Value,
    /// Set when the field is encrypted and the store's cipher is active;
    /// evaluation then runs over search hashes instead of payload values.
    hashed: bool,
}

struct CompiledSort {
    path: FieldPath,
    direction: SortDirection,
}

/// Executes [`Query`] descriptions against a [`RecordStore`].
#[derive(Clone)]
pub struct QueryEngine {
    store: RecordStore,
}

impl QueryEngine {
    #[must_use]
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Runs the query and materializes one page of results.
    ///
    /// Only records on the returned page are decrypted; predicate evaluation
    /// runs entirely over the protected representation.
    pub async fn execute(&self, query: &Query) -> QueryResult<QueryPage> {
        let (mut matches, total) = self.confirmed_matches(query).await?;

        let sorts = self.compile_sorts(query)?;
        if !sorts.is_empty() {
            matches.sort_by(|a, b| compare_records(a, b, &sorts));
        }

        let page: Vec<Record> = matches
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        let has_more = match query.limit {
            Some(limit) => query.offset + limit < total,
            None => false,
        };

        let mut hits = Vec::with_capacity(page.len());
        for record in page {
            let record = self.store.reveal_record(record);
            let related = self.resolve_includes(query, &record).await?;
            hits.push(QueryHit { record, related });
        }

        debug!(
            record_type = query.record_type.as_str(),
            total,
            returned = hits.len(),
            "query executed"
        );
        Ok(QueryPage {
            hits,
            total,
            has_more,
        })
    }

    /// Counts confirmed matches without decrypting anything.
    pub async fn count(&self, query: &Query) -> QueryResult<usize> {
        let (_, total) = self.confirmed_matches(query).await?;
        Ok(total)
    }

    /// Whether at least one record matches. Never decrypts.
    pub async fn exists(&self, query: &Query) -> QueryResult<bool> {
        Ok(self.count(query).await? > 0)
    }

    /// Fetches candidates (narrowed by index when possible) and confirms
    /// every predicate against each. Returns protected records.
    async fn confirmed_matches(&self, query: &Query) -> QueryResult<(Vec<Record>, usize)> {
        let schema = self
            .store
            .registry()
            .get(&query.record_type)
            .ok_or_else(|| StorageError::UnsupportedType(query.record_type.clone()))?;
        let filters = self.compile_filters(query, schema)?;

        let candidates = match self.index_narrowing(schema, &filters) {
            Some((path, renderings)) => {
                debug!(
                    record_type = query.record_type.as_str(),
                    index = path,
                    "narrowing scan via index"
                );
                self.store
                    .candidates_by_index(&query.record_type, path, renderings)
                    .await?
            }
            None => self.store.live_records_protected(&query.record_type).await?,
        };

        let matches: Vec<Record> = candidates
            .into_iter()
            .filter(|record| filters.iter().all(|f| self.evaluate(f, record)))
            .collect();
        let total = matches.len();
        Ok((matches, total))
    }

    fn compile_filters(
        &self,
        query: &Query,
        schema: &RecordSchema,
    ) -> QueryResult<Vec<CompiledFilter>> {
        let cipher_active = self.store.cipher().is_active();
        query
            .filters
            .iter()
            .map(|f| {
                let path = FieldPath::parse(&f.path)?;
                let hashed = cipher_active && schema.is_encrypted(&f.path);
                if hashed && !matches!(f.operator, Operator::Eq | Operator::In) {
                    return Err(QueryError::EncryptedFieldOperator {
                        path: f.path.clone(),
                        operator: f.operator.to_string(),
                    });
                }
                Ok(CompiledFilter {
                    path,
                    operator: f.operator,
                    value: f.value.clone(),
                    hashed,
                })
            })
            .collect()
    }

    fn compile_sorts(&self, query: &Query) -> QueryResult<Vec<CompiledSort>> {
        let schema = self
            .store
            .registry()
            .get(&query.record_type)
            .ok_or_else(|| StorageError::UnsupportedType(query.record_type.clone()))?;
        query
            .sorts
            .iter()
            .map(|s| {
                if schema.is_encrypted(&s.path) {
                    return Err(QueryError::EncryptedFieldSort(s.path.clone()));
                }
                Ok(CompiledSort {
                    path: FieldPath::parse(&s.path)?,
                    direction: s.direction,
                })
            })
            .collect()
    }

    /// Picks at most one indexed equality predicate, in schema index order,
    /// and renders its values the way the index stores them.
    fn index_narrowing<'a>(
        &self,
        schema: &'a RecordSchema,
        filters: &[CompiledFilter],
    ) -> Option<(&'a str, Vec<String>)> {
        for indexed in &schema.indexed_fields {
            let Some(filter) = filters.iter().find(|f| {
                f.path.as_str() == indexed.as_str()
                    && matches!(f.operator, Operator::Eq | Operator::In)
            }) else {
                continue;
            };
            let values: Vec<&Value> = match (&filter.operator, &filter.value) {
                (Operator::Eq, v) => vec![v],
                (Operator::In, Value::Array(items)) => items.iter().collect(),
                _ => continue,
            };
            let renderings: Vec<String> = values
                .iter()
                .filter_map(|v| self.render_index_value(filter, v))
                .collect();
            // A value the index has no rendering for (null, non-scalars, a
            // non-string probe against a hashed field) can still match in
            // full evaluation, so this index cannot answer for the
            // predicate. Try the next indexed field.
            if renderings.len() < values.len() {
                continue;
            }
            return Some((indexed.as_str(), renderings));
        }
        None
    }

    fn render_index_value(&self, filter: &CompiledFilter, value: &Value) -> Option<String> {
        if filter.hashed {
            value
                .as_str()
                .and_then(|s| self.store.cipher().search_hash(s))
        } else {
            index_value(value)
        }
    }

    fn evaluate(&self, filter: &CompiledFilter, record: &Record) -> bool {
        if filter.hashed {
            return self.evaluate_hashed(filter, record);
        }
        let actual = filter.path.get(&record.payload);
        evaluate_plain(filter.operator, actual, &filter.value)
    }

    /// Equality over search hashes; the payload holds ciphertext here.
    fn evaluate_hashed(&self, filter: &CompiledFilter, record: &Record) -> bool {
        let stored = match record.search_hashes.get(filter.path.as_str()) {
            Some(h) => h,
            None => return false,
        };
        let hash_of = |v: &Value| {
            v.as_str()
                .and_then(|s| self.store.cipher().search_hash(s))
        };
        match (&filter.operator, &filter.value) {
            (Operator::Eq, v) => hash_of(v).as_deref() == Some(stored.as_str()),
            (Operator::In, Value::Array(items)) => items
                .iter()
                .any(|v| hash_of(v).as_deref() == Some(stored.as_str())),
            _ => false,
        }
    }

    async fn resolve_includes(
        &self,
        query: &Query,
        record: &Record,
    ) -> QueryResult<BTreeMap<String, Record>> {
        let mut related = BTreeMap::new();
        for include in &query.includes {
            let fk_path = FieldPath::parse(&include.fk_path)?;
            let Some(fk) = fk_path.get(&record.payload).and_then(Value::as_str) else {
                continue;
            };
            if let Some(found) = self.store.read(&include.related_type, fk).await? {
                related.insert(include.alias.clone(), found);
            }
        }
        Ok(related)
    }
}

/// Evaluates one plaintext predicate. A missing field fails every operator
/// except the negative ones (`Ne`, `NotIn`), which it satisfies.
fn evaluate_plain(operator: Operator, actual: Option<&Value>, expected: &Value) -> bool {
    let Some(actual) = actual else {
        return matches!(operator, Operator::Ne | Operator::NotIn);
    };
    match operator {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        Operator::Gt => compare_values(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare_values(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Contains => match (actual.as_str(), expected.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
        Operator::StartsWith => match (actual.as_str(), expected.as_str()) {
            (Some(s), Some(prefix)) => s.starts_with(prefix),
            _ => false,
        },
        Operator::In => match expected {
            Value::Array(items) => items.contains(actual),
            _ => false,
        },
        Operator::NotIn => match expected {
            Value::Array(items) => !items.contains(actual),
            _ => false,
        },
    }
}

/// Total order over comparable scalars; incomparable pairs yield `None` and
/// fail range predicates.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Multi-key record comparator; records missing a sort key order last.
fn compare_records(a: &Record, b: &Record, sorts: &[CompiledSort]) -> Ordering {
    for sort in sorts {
        let va = sort.path.get(&a.payload);
        let vb = sort.path.get(&b.payload);
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ord = match sort.direction {
            SortDirection::Ascending => ord,
            // Missing keys stay last even when descending.
            SortDirection::Descending => match (va, vb) {
                (Some(_), Some(_)) => ord.reverse(),
                _ => ord,
            },
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
