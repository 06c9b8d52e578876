//! List queries: filter, ordering and fingerprint.
//!
//! The filter is deliberately small. The store evaluates it to find the key
//! space of a list read; the resolver evaluates the same filter against the
//! variant each perspective selects, so both sides agree on what a list holds.

use crate::document::{lookup_path, ResolvedDocument, Variant};
use crate::error::ResolveError;
use crate::identity::LogicalKey;
use crate::perspective::Perspective;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Document predicate. All populated clauses must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Match `_type` exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    /// Restrict to these logical keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<BTreeSet<LogicalKey>>,
    /// Dotted payload path -> required JSON value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
}

impl Filter {
    /// Filter matching every document.
    pub fn all() -> Self {
        Filter::default()
    }

    pub fn of_type(document_type: impl Into<String>) -> Self {
        Filter {
            document_type: Some(document_type.into()),
            ..Filter::default()
        }
    }

    pub fn keys<I: IntoIterator<Item = LogicalKey>>(keys: I) -> Self {
        Filter {
            keys: Some(keys.into_iter().collect()),
            ..Filter::default()
        }
    }

    pub fn with_field(mut self, path: impl Into<String>, value: Value) -> Self {
        self.fields.insert(path.into(), value);
        self
    }

    /// Reject field paths the store cannot address and values it cannot
    /// compare the way [`Filter::matches`] does.
    ///
    /// Only strings, numbers and booleans are accepted: store-side equality is
    /// false for arrays and objects, and true for `null` against a missing field.
    pub fn validate(&self) -> Result<(), ResolveError> {
        if let Some(t) = &self.document_type {
            if t.is_empty() {
                return Err(ResolveError::InvalidQuery("empty document type".to_string()));
            }
        }
        for (path, value) in &self.fields {
            validate_path(path)?;
            if !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
                return Err(ResolveError::InvalidQuery(format!(
                    "field '{}' must compare against a string, number or boolean, got {}",
                    path, value
                )));
            }
        }
        Ok(())
    }

    /// Evaluate against one variant.
    pub fn matches(&self, variant: &Variant) -> bool {
        self.matches_parts(&variant.logical_key, &variant.document_type, &variant.payload)
    }

    /// Evaluate against the parts of a record.
    ///
    /// Used by stores that hold raw records and by the resolver, so both apply
    /// identical semantics.
    pub fn matches_parts(
        &self,
        key: &LogicalKey,
        document_type: &str,
        payload: &Map<String, Value>,
    ) -> bool {
        self.matches_raw(key.as_str(), document_type, payload)
    }

    pub(crate) fn matches_raw(
        &self,
        key: &str,
        document_type: &str,
        payload: &Map<String, Value>,
    ) -> bool {
        if let Some(t) = &self.document_type {
            if t != document_type {
                return false;
            }
        }
        if let Some(keys) = &self.keys {
            if !keys.iter().any(|k| k.as_str() == key) {
                return false;
            }
        }
        self.fields
            .iter()
            .all(|(path, expected)| {
                lookup_path(payload, path).is_some_and(|actual| scalar_eq(actual, expected))
            })
    }

    /// Whether a document with `key` could ever satisfy this filter.
    pub fn could_admit(&self, key: &LogicalKey) -> bool {
        self.keys.as_ref().map_or(true, |keys| keys.contains(key))
    }
}

/// Equality as the store evaluates it: numbers compare by value, so `1`
/// equals `1.0`.
fn scalar_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => actual == expected,
    }
}

pub(crate) fn validate_path(path: &str) -> Result<(), ResolveError> {
    let ok = !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && !segment.starts_with(|c: char| c.is_ascii_digit())
                && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if ok {
        Ok(())
    } else {
        Err(ResolveError::InvalidQuery(format!("invalid field path '{}'", path)))
    }
}

/// Sort key for list results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// Logical key (lexicographic).
    Key,
    /// `updated_at` of the selected variant.
    UpdatedAt,
    /// Payload value at a dotted path; missing values sort first.
    Field(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

/// A list read: what to match, how to order it, how many to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub filter: Filter,
    pub order: OrderBy,
    pub direction: Direction,
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn new(filter: Filter) -> Self {
        ListQuery {
            filter,
            order: OrderBy::Key,
            direction: Direction::Ascending,
            limit: None,
        }
    }

    /// Create a builder for a list query.
    ///
    /// # Example
    /// ```rust
    /// use vantage::query::ListQuery;
    ///
    /// let query = ListQuery::builder()
    ///     .of_type("glossaryTerm")
    ///     .order_by_field("title")
    ///     .limit(20)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(query.limit, Some(20));
    /// ```
    pub fn builder() -> ListQueryBuilder {
        ListQueryBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ResolveError> {
        self.filter.validate()?;
        if let OrderBy::Field(path) = &self.order {
            validate_path(path)?;
        }
        Ok(())
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_list(self)
    }

    /// Order resolved documents in place and apply the limit.
    ///
    /// The logical key is always the final tie-break, so the result never
    /// depends on the order the store returned records in.
    pub fn arrange(&self, documents: &mut Vec<ResolvedDocument>) {
        documents.sort_by(|a, b| {
            let primary = match &self.order {
                OrderBy::Key => Ordering::Equal,
                OrderBy::UpdatedAt => a.variant.updated_at.cmp(&b.variant.updated_at),
                OrderBy::Field(path) => {
                    compare_values(a.variant.field(path), b.variant.field(path))
                }
            };
            let primary = primary.then_with(|| a.logical_key.cmp(&b.logical_key));
            match self.direction {
                Direction::Ascending => primary,
                Direction::Descending => primary.reverse(),
            }
        });
        if let Some(limit) = self.limit {
            documents.truncate(limit);
        }
    }
}

/// Total order over optional JSON values: missing < null < bool < number < string < array < object.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Object(_)) => 6,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x @ Value::Array(_)), Some(y @ Value::Array(_)))
        | (Some(x @ Value::Object(_)), Some(y @ Value::Object(_))) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Builder for [`ListQuery`].
#[derive(Debug, Default)]
pub struct ListQueryBuilder {
    filter: Filter,
    order: Option<OrderBy>,
    direction: Option<Direction>,
    limit: Option<usize>,
}

impl ListQueryBuilder {
    pub fn of_type(mut self, document_type: impl Into<String>) -> Self {
        self.filter.document_type = Some(document_type.into());
        self
    }

    pub fn key(mut self, key: LogicalKey) -> Self {
        self.filter.keys.get_or_insert_with(BTreeSet::new).insert(key);
        self
    }

    pub fn field(mut self, path: impl Into<String>, value: Value) -> Self {
        self.filter.fields.insert(path.into(), value);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by_key(mut self) -> Self {
        self.order = Some(OrderBy::Key);
        self
    }

    pub fn order_by_updated(mut self) -> Self {
        self.order = Some(OrderBy::UpdatedAt);
        self
    }

    pub fn order_by_field(mut self, path: impl Into<String>) -> Self {
        self.order = Some(OrderBy::Field(path.into()));
        self
    }

    pub fn descending(mut self) -> Self {
        self.direction = Some(Direction::Descending);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Build and validate the query.
    ///
    /// Defaults: ordered by logical key, ascending, no limit.
    pub fn build(self) -> Result<ListQuery, ResolveError> {
        let query = ListQuery {
            filter: self.filter,
            order: self.order.unwrap_or(OrderBy::Key),
            direction: self.direction.unwrap_or(Direction::Ascending),
            limit: self.limit,
        };
        query.validate()?;
        Ok(query)
    }
}

/// Deterministic hash of a query, used as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint of a list query.
    ///
    /// Canonical JSON: every map in the query is ordered, so equal queries hash
    /// identically regardless of construction order.
    pub fn of_list(query: &ListQuery) -> Self {
        let canonical = serde_json::to_vec(query).unwrap_or_default();
        let mut hasher = Hasher::new();
        hasher.update(b"list:");
        hasher.update(&canonical);
        Fingerprint(*hasher.finalize().as_bytes())
    }

    /// Fingerprint of a single-key read. Lives in its own domain so it can
    /// never collide with a list entry.
    pub fn of_key(key: &LogicalKey) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(b"key:");
        hasher.update(key.as_str().as_bytes());
        Fingerprint(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ResolveError> {
        let bytes = hex::decode(s)
            .map_err(|e| ResolveError::InvalidQuery(format!("invalid fingerprint: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ResolveError::InvalidQuery("fingerprint must be 32 bytes".to_string()))?;
        Ok(Fingerprint(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Cache key: perspective plus query fingerprint.
pub type CacheKey = (Perspective, Fingerprint);
