//! # lovefinder-store
//!
//! The backend collaborators the client protocol talks to: a hierarchical
//! document store with atomic batches and live collection subscriptions,
//! an identity provider, and a file store.
//!
//! Each collaborator is a trait so the protocol can run against the
//! in-memory backends (tests, embedding) or the persistent ones (SQLite
//! documents, files on local disk).

pub mod clock;
pub mod database;
pub mod document;
pub mod files;
pub mod identity;
pub mod memory;
pub mod migrations;
pub mod path;
pub mod store;
pub mod watch;

mod engine;
mod error;

pub use database::SqliteDocumentStore;
pub use document::{
    ChangeKind, Direction, Document, DocumentChange, FieldValue, Fields, Query, SetOptions,
    Snapshot, WriteBatch, WriteOp, WriteOutcome,
};
pub use error::{Result, StoreError};
pub use files::{FileStore, LocalFileStore, MemoryFileStore};
pub use identity::{DocumentIdentityProvider, IdentityProvider};
pub use memory::MemoryDocumentStore;
pub use path::{CollectionPath, DocumentPath};
pub use store::DocumentStore;
pub use watch::Subscription;
