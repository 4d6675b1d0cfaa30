//! In-process document store.
//!
//! Shared by every client session in a process (tests, embedding). Supports
//! fault injection so callers can exercise partial-failure paths.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::clock::ServerClock;
use crate::document::{Document, Query, WriteBatch, WriteOp, WriteOutcome};
use crate::engine::{self, Mutation, StoredDocument};
use crate::error::{Result, StoreError};
use crate::path::{CollectionPath, DocumentPath};
use crate::store::DocumentStore;
use crate::watch::{Subscription, WatchRegistry};

#[derive(Default)]
struct State {
    docs: BTreeMap<String, StoredDocument>,
    failing_prefixes: Vec<String>,
    failing_deletes: Vec<String>,
}

pub struct MemoryDocumentStore {
    state: Mutex<State>,
    clock: ServerClock,
    watchers: Arc<WatchRegistry>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock: ServerClock::new(),
            watchers: WatchRegistry::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Make every batch touching a path under `prefix` fail as unavailable.
    pub fn fail_writes_under(&self, prefix: &str) {
        self.lock().failing_prefixes.push(prefix.to_string());
    }

    /// Like [`fail_writes_under`](Self::fail_writes_under), but only for
    /// batches deleting a document under `prefix`.
    pub fn fail_deletes_under(&self, prefix: &str) {
        self.lock().failing_deletes.push(prefix.to_string());
    }

    pub fn clear_faults(&self) {
        let mut state = self.lock();
        state.failing_prefixes.clear();
        state.failing_deletes.clear();
    }

    /// Terminate live queries under `prefix` the way a backend does when a
    /// principal loses access.
    pub fn close_subscriptions_under(&self, prefix: &str) -> usize {
        let _state = self.lock();
        self.watchers.fail_under(prefix, "access revoked")
    }

    /// Every stored document path under `prefix`, sorted.
    pub fn paths_under(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .docs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn children(state: &State, collection: &CollectionPath) -> Result<Vec<Document>> {
        let prefix = collection.child_prefix();
        let mut out = Vec::new();
        for (key, doc) in state.docs.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            if rest.contains('/') {
                continue;
            }
            out.push(doc.to_document(collection.doc(rest)?));
        }
        Ok(out)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let state = self.lock();
        Ok(state
            .docs
            .get(&path.to_string())
            .map(|d| d.to_document(path.clone())))
    }

    async fn list_collection(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<Document>> {
        let state = self.lock();
        Ok(query.apply(Self::children(&state, collection)?))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<WriteOutcome>> {
        let mut state = self.lock();

        if let Some(op) = batch.ops().iter().find(|op| {
            let deleting = matches!(op, WriteOp::Delete { .. });
            state
                .failing_prefixes
                .iter()
                .chain(state.failing_deletes.iter().filter(|_| deleting))
                .any(|p| op.path().starts_with(p))
        }) {
            warn!(path = %op.path(), "Rejecting batch (injected fault)");
            return Err(StoreError::Unavailable(op.path().to_string()));
        }

        let now = self.clock.tick();
        let staged = engine::stage(batch.into_ops(), now, |path| {
            Ok(state.docs.get(&path.to_string()).cloned())
        })?;

        let touched = staged.touched_collections();
        for (key, (_, mutation)) in staged.writes {
            match mutation {
                Mutation::Put(doc) => {
                    state.docs.insert(key, doc);
                }
                Mutation::Remove => {
                    state.docs.remove(&key);
                }
            }
        }
        debug!(collections = touched.len(), "Batch committed");

        for collection in touched {
            if self.watchers.is_watched(&collection) {
                let all = Self::children(&state, &collection)?;
                self.watchers.publish(&collection, &all);
            }
        }
        Ok(staged.outcomes)
    }

    async fn subscribe_collection(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> Result<Subscription> {
        let state = self.lock();
        let all = Self::children(&state, collection)?;
        Ok(self.watchers.register(collection.clone(), query, all))
    }
}
