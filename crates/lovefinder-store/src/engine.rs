//! Batch resolution shared by the document store backends.
//!
//! A backend loads whatever it needs through the `load` callback; the
//! engine turns the batch into a list of mutations plus per-op outcomes.
//! Later ops in a batch observe the effect of earlier ones.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::document::{Document, WriteOp, WriteOutcome};
use crate::error::{Result, StoreError};
use crate::path::{CollectionPath, DocumentPath};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredDocument {
    pub data: Map<String, Value>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl StoredDocument {
    pub fn to_document(&self, path: DocumentPath) -> Document {
        Document {
            path,
            data: self.data.clone(),
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Mutation {
    Put(StoredDocument),
    Remove,
}

#[derive(Debug, Default)]
pub(crate) struct Staged {
    /// Final state per touched document, keyed by path string.
    pub writes: BTreeMap<String, (DocumentPath, Mutation)>,
    pub outcomes: Vec<WriteOutcome>,
}

impl Staged {
    /// Collections whose contents change when the batch lands.
    pub fn touched_collections(&self) -> BTreeSet<CollectionPath> {
        self.writes.values().map(|(path, _)| path.parent()).collect()
    }
}

pub(crate) fn stage<F>(ops: Vec<WriteOp>, now: DateTime<Utc>, mut load: F) -> Result<Staged>
where
    F: FnMut(&DocumentPath) -> Result<Option<StoredDocument>>,
{
    let mut staged = Staged::default();

    for op in ops {
        let key = op.path().to_string();
        let existing = match staged.writes.get(&key) {
            Some((_, Mutation::Put(doc))) => Some(doc.clone()),
            Some((_, Mutation::Remove)) => None,
            None => load(op.path())?,
        };

        let (mutation, outcome) = resolve(&op, existing, now)?;
        staged.outcomes.push(outcome);
        if let Some(mutation) = mutation {
            staged.writes.insert(key, (op.path().clone(), mutation));
        }
    }

    Ok(staged)
}

fn resolve(
    op: &WriteOp,
    existing: Option<StoredDocument>,
    now: DateTime<Utc>,
) -> Result<(Option<Mutation>, WriteOutcome)> {
    let create_time = existing.as_ref().map(|d| d.create_time).unwrap_or(now);

    match op {
        WriteOp::Set {
            fields, options, ..
        } => {
            let base = match existing {
                Some(doc) if options.merge => doc.data,
                _ => Map::new(),
            };
            let put = StoredDocument {
                data: fields.apply(base, now),
                create_time,
                update_time: now,
            };
            Ok((Some(Mutation::Put(put)), WriteOutcome::Written))
        }
        WriteOp::Update { path, fields } => {
            let doc = existing.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            let put = StoredDocument {
                data: fields.apply(doc.data, now),
                create_time,
                update_time: now,
            };
            Ok((Some(Mutation::Put(put)), WriteOutcome::Written))
        }
        WriteOp::CreateIfAbsent { fields, .. } => {
            if existing.is_some() {
                return Ok((None, WriteOutcome::AlreadyExists));
            }
            let put = StoredDocument {
                data: fields.apply(Map::new(), now),
                create_time: now,
                update_time: now,
            };
            Ok((Some(Mutation::Put(put)), WriteOutcome::Written))
        }
        WriteOp::Delete { .. } => match existing {
            Some(_) => Ok((Some(Mutation::Remove), WriteOutcome::Deleted)),
            None => Ok((None, WriteOutcome::Absent)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Fields, SetOptions, WriteBatch};
    use serde_json::json;

    fn path(s: &str) -> DocumentPath {
        DocumentPath::parse(s).unwrap()
    }

    #[test]
    fn later_ops_see_earlier_ones() {
        let batch = WriteBatch::new()
            .create_if_absent(path("chats/a_b"), Fields::new().value("n", 1))
            .create_if_absent(path("chats/a_b"), Fields::new().value("n", 2))
            .update(path("chats/a_b"), Fields::new().increment("n", 10));

        let staged = stage(batch.into_ops(), Utc::now(), |_| Ok(None)).unwrap();
        assert_eq!(
            staged.outcomes,
            [
                WriteOutcome::Written,
                WriteOutcome::AlreadyExists,
                WriteOutcome::Written
            ]
        );
        match &staged.writes["chats/a_b"].1 {
            Mutation::Put(doc) => assert_eq!(doc.data["n"], json!(11)),
            Mutation::Remove => panic!("expected a put"),
        }
    }

    #[test]
    fn update_of_missing_document_fails_the_batch() {
        let batch = WriteBatch::new()
            .set(path("users/a"), Fields::new().value("x", 1), SetOptions::replace())
            .update(path("users/missing"), Fields::new().value("x", 1));

        let err = stage(batch.into_ops(), Utc::now(), |_| Ok(None)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn merge_keeps_create_time_and_other_fields() {
        let then = Utc::now() - chrono::Duration::seconds(60);
        let mut data = Map::new();
        data.insert("keep".into(), json!("yes"));
        let existing = StoredDocument {
            data,
            create_time: then,
            update_time: then,
        };

        let now = Utc::now();
        let batch = WriteBatch::new().set(
            path("users/a"),
            Fields::new().value("x", 1),
            SetOptions::merge(),
        );
        let staged = stage(batch.into_ops(), now, |_| Ok(Some(existing.clone()))).unwrap();
        match &staged.writes["users/a"].1 {
            Mutation::Put(doc) => {
                assert_eq!(doc.data["keep"], json!("yes"));
                assert_eq!(doc.create_time, then);
                assert_eq!(doc.update_time, now);
            }
            Mutation::Remove => panic!("expected a put"),
        }
    }

    #[test]
    fn delete_reports_absence() {
        let batch = WriteBatch::new().delete(path("users/a"));
        let staged = stage(batch.into_ops(), Utc::now(), |_| Ok(None)).unwrap();
        assert_eq!(staged.outcomes, [WriteOutcome::Absent]);
        assert!(staged.writes.is_empty());
    }
}
