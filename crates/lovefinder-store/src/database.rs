//! SQLite-backed document store.
//!
//! Every document is one row keyed by its full path, with the body stored
//! as JSON. A batch runs inside a single SQLite transaction, and migrations
//! are run before the store is handed out.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::clock::{self, ServerClock};
use crate::document::{Document, Query, WriteBatch, WriteOutcome};
use crate::engine::{self, Mutation, StoredDocument};
use crate::error::{Result, StoreError};
use crate::migrations;
use crate::path::{CollectionPath, DocumentPath};
use crate::store::DocumentStore;
use crate::watch::{Subscription, WatchRegistry};

pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    clock: ServerClock,
    watchers: Arc<WatchRegistry>,
}

impl SqliteDocumentStore {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/lovefinder/lovefinder.db`
    /// - macOS:   `~/Library/Application Support/com.lovefinder.lovefinder/lovefinder.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\lovefinder\lovefinder\data\lovefinder.db`
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "lovefinder", "lovefinder").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("lovefinder.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        migrations::run_migrations(&conn)?;

        let last: Option<String> =
            conn.query_row("SELECT MAX(update_time) FROM documents", [], |row| row.get(0))?;
        let clock = match last.as_deref().and_then(clock::decode) {
            Some(ts) => ServerClock::resume_after(ts),
            None => ServerClock::new(),
        };

        Ok(Self {
            conn: Mutex::new(conn),
            clock,
            watchers: WatchRegistry::new(),
        })
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path().map(PathBuf::from)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn load(conn: &Connection, path: &DocumentPath) -> Result<Option<StoredDocument>> {
    conn.query_row(
        "SELECT data, create_time, update_time FROM documents WHERE path = ?1",
        params![path.to_string()],
        row_to_stored,
    )
    .optional()
    .map_err(StoreError::from)
}

fn children(conn: &Connection, collection: &CollectionPath) -> Result<Vec<Document>> {
    let mut stmt = conn.prepare(
        "SELECT data, create_time, update_time, doc_id
         FROM documents
         WHERE collection = ?1
         ORDER BY doc_id",
    )?;
    let rows = stmt.query_map(params![collection.to_string()], |row| {
        let stored = row_to_stored(row)?;
        let id: String = row.get(3)?;
        Ok((id, stored))
    })?;

    let mut docs = Vec::new();
    for row in rows {
        let (id, stored) = row?;
        docs.push(stored.to_document(collection.doc(&id)?));
    }
    Ok(docs)
}

fn row_to_stored(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredDocument> {
    let data_str: String = row.get(0)?;
    let create_str: String = row.get(1)?;
    let update_str: String = row.get(2)?;

    let data = match serde_json::from_str::<Value>(&data_str) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))
        }
    };
    let create_time = parse_time(1, &create_str)?;
    let update_time = parse_time(2, &update_str)?;

    Ok(StoredDocument {
        data,
        create_time,
        update_time,
    })
}

fn parse_time(col: usize, s: &str) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let conn = self.lock();
        Ok(load(&conn, path)?.map(|d| d.to_document(path.clone())))
    }

    async fn list_collection(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<Document>> {
        let conn = self.lock();
        Ok(query.apply(children(&conn, collection)?))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<WriteOutcome>> {
        let mut conn = self.lock();
        let now = self.clock.tick();

        let tx = conn.transaction()?;
        let staged = engine::stage(batch.into_ops(), now, |path| load(&tx, path))?;
        let touched = staged.touched_collections();

        for (key, (path, mutation)) in &staged.writes {
            match mutation {
                Mutation::Put(doc) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO documents
                             (path, collection, doc_id, data, create_time, update_time)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            key,
                            path.parent().to_string(),
                            path.id(),
                            Value::Object(doc.data.clone()).to_string(),
                            clock::encode(doc.create_time),
                            clock::encode(doc.update_time),
                        ],
                    )?;
                }
                Mutation::Remove => {
                    tx.execute("DELETE FROM documents WHERE path = ?1", params![key])?;
                }
            }
        }
        tx.commit()?;
        tracing::debug!(writes = staged.writes.len(), "batch committed");

        for collection in touched {
            if !self.watchers.is_watched(&collection) {
                continue;
            }
            // The batch has landed; a failed re-read only costs this snapshot.
            match children(&conn, &collection) {
                Ok(all) => self.watchers.publish(&collection, &all),
                Err(e) => {
                    tracing::error!(%collection, error = %e, "could not publish committed change")
                }
            }
        }
        Ok(staged.outcomes)
    }

    async fn subscribe_collection(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> Result<Subscription> {
        let conn = self.lock();
        let all = children(&conn, collection)?;
        Ok(self.watchers.register(collection.clone(), query, all))
    }
}
