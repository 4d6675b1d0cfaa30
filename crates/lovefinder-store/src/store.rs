//! The document store contract.

use async_trait::async_trait;

use crate::document::{Document, Fields, Query, SetOptions, WriteBatch, WriteOutcome};
use crate::error::Result;
use crate::path::{CollectionPath, DocumentPath};
use crate::watch::Subscription;

/// Hierarchical document store with atomic batches and live queries.
///
/// Implementations must apply a batch all-or-nothing and must deliver
/// subscription snapshots in commit order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document; `None` if it does not exist.
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>>;

    /// One-shot query over the direct children of `collection`.
    async fn list_collection(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<Document>>;

    /// Apply every write in `batch` or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<Vec<WriteOutcome>>;

    /// Live query over `collection`. The first snapshot holds the current
    /// contents.
    async fn subscribe_collection(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> Result<Subscription>;

    async fn set_document(
        &self,
        path: &DocumentPath,
        fields: Fields,
        options: SetOptions,
    ) -> Result<()> {
        self.commit(WriteBatch::new().set(path.clone(), fields, options))
            .await?;
        Ok(())
    }

    /// Merge into an existing document; `NotFound` if it is absent.
    async fn update_document(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
        self.commit(WriteBatch::new().update(path.clone(), fields))
            .await?;
        Ok(())
    }

    /// Create the document unless it exists. Returns `true` if this call
    /// created it.
    async fn create_document(&self, path: &DocumentPath, fields: Fields) -> Result<bool> {
        let outcomes = self
            .commit(WriteBatch::new().create_if_absent(path.clone(), fields))
            .await?;
        Ok(outcomes.first() == Some(&WriteOutcome::Written))
    }

    /// Create a document with a generated id.
    async fn add_document(&self, collection: &CollectionPath, fields: Fields) -> Result<DocumentPath> {
        let path = collection.doc(&uuid::Uuid::new_v4().simple().to_string())?;
        self.commit(WriteBatch::new().set(path.clone(), fields, SetOptions::replace()))
            .await?;
        Ok(path)
    }

    /// Returns `true` if a document was removed.
    async fn delete_document(&self, path: &DocumentPath) -> Result<bool> {
        let outcomes = self.commit(WriteBatch::new().delete(path.clone())).await?;
        Ok(outcomes.first() == Some(&WriteOutcome::Deleted))
    }
}
