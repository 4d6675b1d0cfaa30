//! Live collection subscriptions.
//!
//! Backends hold a [`WatchRegistry`] and call [`WatchRegistry::publish`]
//! after each commit, while still holding their own state lock, so every
//! watcher sees snapshots in commit order. Lock order is always backend
//! state first, registry second.

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::document::{ChangeKind, Document, DocumentChange, Query, Snapshot};
use crate::error::{Result, StoreError};
use crate::path::CollectionPath;

struct Watcher {
    collection: CollectionPath,
    query: Query,
    last: Vec<Document>,
    tx: mpsc::UnboundedSender<Result<Snapshot>>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    watchers: HashMap<u64, Watcher>,
}

#[derive(Default)]
pub(crate) struct WatchRegistry {
    inner: Mutex<Inner>,
}

impl WatchRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a watcher and queue its initial snapshot. `all` is every
    /// document currently in `collection`.
    pub fn register(
        self: &Arc<Self>,
        collection: CollectionPath,
        query: Query,
        all: Vec<Document>,
    ) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let documents = query.apply(all);
        let changes = documents
            .iter()
            .cloned()
            .map(|document| DocumentChange {
                kind: ChangeKind::Added,
                document,
            })
            .collect();
        let _ = tx.send(Ok(Snapshot {
            collection: collection.clone(),
            documents: documents.clone(),
            changes,
        }));

        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.watchers.insert(
            id,
            Watcher {
                collection: collection.clone(),
                query,
                last: documents,
                tx,
            },
        );
        debug!(id, collection = %collection, "Subscription registered");

        Subscription {
            id,
            collection,
            rx,
            registry: Arc::downgrade(self),
        }
    }

    pub fn unregister(&self, id: u64) {
        if let Some(w) = self.lock().watchers.remove(&id) {
            debug!(id, collection = %w.collection, "Subscription closed");
        }
    }

    /// Whether anyone listens on `collection`.
    pub fn is_watched(&self, collection: &CollectionPath) -> bool {
        self.lock()
            .watchers
            .values()
            .any(|w| &w.collection == collection)
    }

    /// Deliver the new contents of `collection` to its watchers. Watchers
    /// whose result set did not change get nothing.
    pub fn publish(&self, collection: &CollectionPath, all: &[Document]) {
        let mut inner = self.lock();
        let mut closed = Vec::new();

        for (id, w) in inner.watchers.iter_mut() {
            if &w.collection != collection {
                continue;
            }
            if w.tx.is_closed() {
                closed.push(*id);
                continue;
            }
            let documents = w.query.apply(all.iter().cloned());
            let changes = diff(&w.last, &documents);
            if changes.is_empty() {
                continue;
            }
            trace!(id = *id, changes = changes.len(), collection = %collection, "Publishing snapshot");
            w.last = documents.clone();
            let snapshot = Snapshot {
                collection: collection.clone(),
                documents,
                changes,
            };
            if w.tx.send(Ok(snapshot)).is_err() {
                closed.push(*id);
            }
        }

        for id in closed {
            inner.watchers.remove(&id);
        }
    }

    /// Terminate every watcher whose collection lies under `prefix` with a
    /// permission error. Returns how many were closed.
    pub fn fail_under(&self, prefix: &str, reason: &str) -> usize {
        let mut inner = self.lock();
        let ids: Vec<u64> = inner
            .watchers
            .iter()
            .filter(|(_, w)| w.collection.to_string().starts_with(prefix))
            .map(|(id, _)| *id)
            .collect();

        for id in &ids {
            if let Some(w) = inner.watchers.remove(id) {
                let _ = w.tx.send(Err(StoreError::PermissionDenied(format!(
                    "{}: {reason}",
                    w.collection
                ))));
            }
        }
        ids.len()
    }
}

fn diff(old: &[Document], new: &[Document]) -> Vec<DocumentChange> {
    let before: HashMap<&str, &Document> = old.iter().map(|d| (d.id(), d)).collect();
    let after: HashSet<&str> = new.iter().map(Document::id).collect();
    let mut changes = Vec::new();

    for doc in new {
        match before.get(doc.id()) {
            None => changes.push(DocumentChange {
                kind: ChangeKind::Added,
                document: doc.clone(),
            }),
            Some(prev) if prev.data != doc.data || prev.update_time != doc.update_time => {
                changes.push(DocumentChange {
                    kind: ChangeKind::Modified,
                    document: doc.clone(),
                })
            }
            Some(_) => {}
        }
    }
    for doc in old {
        if !after.contains(doc.id()) {
            changes.push(DocumentChange {
                kind: ChangeKind::Removed,
                document: doc.clone(),
            });
        }
    }
    changes
}

/// Handle on a live collection query.
///
/// Snapshots arrive in commit order. Dropping the handle (or calling
/// [`Subscription::cancel`]) unregisters it; no snapshot is delivered after
/// that.
pub struct Subscription {
    id: u64,
    collection: CollectionPath,
    rx: mpsc::UnboundedReceiver<Result<Snapshot>>,
    registry: Weak<WatchRegistry>,
}

impl Subscription {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Wait for the next snapshot. `None` once the subscription has been
    /// terminated by the backend.
    pub async fn next_snapshot(&mut self) -> Option<Result<Snapshot>> {
        self.rx.recv().await
    }

    /// A snapshot that is already queued, without waiting.
    pub fn try_next_snapshot(&mut self) -> Option<Result<Snapshot>> {
        self.rx.try_recv().ok()
    }

    pub fn cancel(self) {}
}

impl Stream for Subscription {
    type Item = Result<Snapshot>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("collection", &self.collection.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn doc(id: &str, n: i64) -> Document {
        let now = Utc::now();
        Document {
            path: CollectionPath::root("c").unwrap().doc(id).unwrap(),
            data: json!({ "n": n }).as_object().cloned().unwrap(),
            create_time: now,
            update_time: now,
        }
    }

    #[tokio::test]
    async fn initial_then_incremental_snapshots() {
        let registry = WatchRegistry::new();
        let coll = CollectionPath::root("c").unwrap();
        let a = doc("a", 1);
        let mut sub = registry.register(coll.clone(), Query::new(), vec![a.clone()]);

        let first = sub.next_snapshot().await.unwrap().unwrap();
        assert_eq!(first.ids(), ["a"]);
        assert_eq!(first.changes[0].kind, ChangeKind::Added);

        // Unchanged contents are not re-delivered.
        registry.publish(&coll, &[a.clone()]);
        assert!(sub.try_next_snapshot().is_none());

        let b = doc("b", 2);
        registry.publish(&coll, &[b.clone()]);
        let second = sub.next_snapshot().await.unwrap().unwrap();
        assert_eq!(second.ids(), ["b"]);
        let kinds: Vec<_> = second.changes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, [ChangeKind::Added, ChangeKind::Removed]);
    }

    #[tokio::test]
    async fn dropping_unregisters() {
        let registry = WatchRegistry::new();
        let coll = CollectionPath::root("c").unwrap();
        let sub = registry.register(coll.clone(), Query::new(), vec![]);
        assert!(registry.is_watched(&coll));
        drop(sub);
        assert!(!registry.is_watched(&coll));
    }

    #[tokio::test]
    async fn fail_under_terminates_matching_watchers() {
        let registry = WatchRegistry::new();
        let mine = CollectionPath::parse("users/a/matches").unwrap();
        let other = CollectionPath::parse("users/b/matches").unwrap();
        let mut sub_a = registry.register(mine, Query::new(), vec![]);
        let _sub_b = registry.register(other.clone(), Query::new(), vec![]);

        assert_eq!(registry.fail_under("users/a/", "signed out"), 1);
        let _initial = sub_a.next_snapshot().await;
        let err = sub_a.next_snapshot().await.unwrap().unwrap_err();
        assert!(err.is_expected_on_sign_out());
        assert!(sub_a.next_snapshot().await.is_none());
        assert!(registry.is_watched(&other));
    }
}
