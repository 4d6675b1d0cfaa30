//! Document data, field writes, queries and batches.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::clock;
use crate::error::{Result, StoreError};
use crate::path::{CollectionPath, DocumentPath};

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// A document as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocumentPath,
    pub data: Map<String, Value>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl Document {
    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.data.get(field).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.data.get(field).and_then(Value::as_bool)
    }

    /// A timestamp field written through `FieldValue::ServerTimestamp`.
    pub fn get_timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get_str(field).and_then(clock::decode)
    }

    /// Deserialize the whole document body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}

// ---------------------------------------------------------------------------
// Field writes
// ---------------------------------------------------------------------------

/// Value written to one field. The sentinels are resolved by the store at
/// commit time.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// The store's clock at commit.
    ServerTimestamp,
    /// Add to the current numeric value (missing counts as zero).
    Increment(i64),
    /// Remove the field (only meaningful with merge or update).
    Delete,
}

/// The set of field writes carried by one document write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), FieldValue::Value(value.into()));
        self
    }

    pub fn server_timestamp(mut self, field: &str) -> Self {
        self.0.insert(field.to_string(), FieldValue::ServerTimestamp);
        self
    }

    pub fn increment(mut self, field: &str, by: i64) -> Self {
        self.0.insert(field.to_string(), FieldValue::Increment(by));
        self
    }

    pub fn delete(mut self, field: &str) -> Self {
        self.0.insert(field.to_string(), FieldValue::Delete);
        self
    }

    /// Serialize `value` and use each top-level key as a plain field.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::Value(v)))
                    .collect(),
            )),
            other => Err(StoreError::InvalidPath(format!(
                "document body must be an object, got {other}"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve the writes on top of `base`, stamping sentinels with `now`.
    pub(crate) fn apply(&self, mut base: Map<String, Value>, now: DateTime<Utc>) -> Map<String, Value> {
        for (field, write) in &self.0 {
            match write {
                FieldValue::Value(v) => {
                    base.insert(field.clone(), v.clone());
                }
                FieldValue::ServerTimestamp => {
                    base.insert(field.clone(), Value::String(clock::encode(now)));
                }
                FieldValue::Increment(by) => {
                    let current = base.get(field).and_then(Value::as_i64).unwrap_or(0);
                    base.insert(field.clone(), Value::from(current + by));
                }
                FieldValue::Delete => {
                    base.remove(field);
                }
            }
        }
        base
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Keep fields not named in the write instead of replacing the body.
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }

    pub fn replace() -> Self {
        Self { merge: false }
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        path: DocumentPath,
        fields: Fields,
        options: SetOptions,
    },
    /// Merge into an existing document; the batch fails if it is absent.
    Update { path: DocumentPath, fields: Fields },
    /// Create the document unless it already exists.
    CreateIfAbsent { path: DocumentPath, fields: Fields },
    Delete { path: DocumentPath },
}

impl WriteOp {
    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteOp::Set { path, .. }
            | WriteOp::Update { path, .. }
            | WriteOp::CreateIfAbsent { path, .. }
            | WriteOp::Delete { path } => path,
        }
    }
}

/// What a committed write did, in batch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// `CreateIfAbsent` found the document already there.
    AlreadyExists,
    Deleted,
    /// `Delete` found nothing to remove.
    Absent,
}

/// Writes applied all-or-nothing by [`crate::DocumentStore::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: DocumentPath, fields: Fields, options: SetOptions) -> Self {
        self.ops.push(WriteOp::Set {
            path,
            fields,
            options,
        });
        self
    }

    pub fn update(mut self, path: DocumentPath, fields: Fields) -> Self {
        self.ops.push(WriteOp::Update { path, fields });
        self
    }

    pub fn create_if_absent(mut self, path: DocumentPath, fields: Fields) -> Self {
        self.ops.push(WriteOp::CreateIfAbsent { path, fields });
        self
    }

    pub fn delete(mut self, path: DocumentPath) -> Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Filter / order / limit applied to a collection listing.
///
/// Without an explicit order, documents come back sorted by id. Ordering by
/// a field drops documents that lack it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<(String, Value)>,
    order_by: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Apply to every document of the collection, in any order.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs
            .into_iter()
            .filter(|d| self.filters.iter().all(|(f, v)| d.get(f) == Some(v)))
            .collect();

        match &self.order_by {
            Some((field, direction)) => {
                out.retain(|d| d.get(field).is_some());
                out.sort_by(|a, b| {
                    let ord = compare_values(a.get(field), b.get(field))
                        .then_with(|| a.id().cmp(b.id()));
                    match direction {
                        Direction::Ascending => ord,
                        Direction::Descending => ord.reverse(),
                    }
                });
            }
            None => out.sort_by(|a, b| a.id().cmp(b.id())),
        }

        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => type_rank(a).cmp(&type_rank(b)),
        },
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document: Document,
}

/// One delivery of a collection subscription: the full ordered result set
/// plus what changed since the previous delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub collection: CollectionPath,
    pub documents: Vec<Document>,
    pub changes: Vec<DocumentChange>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.documents.iter().map(Document::id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> Document {
        let now = Utc::now();
        Document {
            path: CollectionPath::root("c").unwrap().doc(id).unwrap(),
            data: data.as_object().cloned().unwrap(),
            create_time: now,
            update_time: now,
        }
    }

    #[test]
    fn fields_resolve_sentinels() {
        let now = Utc::now();
        let mut base = Map::new();
        base.insert("count".into(), json!(2));
        base.insert("gone".into(), json!(true));

        let out = Fields::new()
            .value("name", "Alva")
            .increment("count", 3)
            .increment("fresh", 1)
            .server_timestamp("at")
            .delete("gone")
            .apply(base, now);

        assert_eq!(out["name"], json!("Alva"));
        assert_eq!(out["count"], json!(5));
        assert_eq!(out["fresh"], json!(1));
        assert_eq!(out["at"], json!(clock::encode(now)));
        assert!(!out.contains_key("gone"));
    }

    #[test]
    fn query_orders_and_filters() {
        let docs = vec![
            doc("c", json!({"t": 3, "kind": "a"})),
            doc("a", json!({"t": 1, "kind": "a"})),
            doc("b", json!({"t": 2, "kind": "b"})),
            doc("d", json!({"kind": "a"})),
        ];

        let asc = Query::new().order_by("t", Direction::Ascending).apply(docs.clone());
        assert_eq!(asc.iter().map(Document::id).collect::<Vec<_>>(), ["a", "b", "c"]);

        let only_a = Query::new()
            .where_eq("kind", "a")
            .order_by("t", Direction::Descending)
            .limit(1)
            .apply(docs.clone());
        assert_eq!(only_a[0].id(), "c");

        let by_id = Query::new().apply(docs);
        assert_eq!(by_id.iter().map(Document::id).collect::<Vec<_>>(), ["a", "b", "c", "d"]);
    }

    #[test]
    fn from_serializable_requires_object() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Entry {
            display_name: String,
        }

        let fields = Fields::from_serializable(&Entry {
            display_name: "Alva".into(),
        })
        .unwrap();
        let out = fields.apply(Map::new(), Utc::now());
        assert_eq!(out["displayName"], json!("Alva"));

        assert!(Fields::from_serializable(&42).is_err());
    }
}
