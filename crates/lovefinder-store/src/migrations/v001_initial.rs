//! v001 -- Initial schema creation.
//!
//! Creates the `documents` table holding every document of the store.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Documents
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS documents (
    path        TEXT PRIMARY KEY NOT NULL,   -- full path, e.g. users/abc/matches/def
    collection  TEXT NOT NULL,               -- parent collection path
    doc_id      TEXT NOT NULL,               -- last path segment
    data        TEXT NOT NULL,               -- JSON object
    create_time TEXT NOT NULL,               -- RFC-3339, microseconds
    update_time TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection
    ON documents(collection, doc_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
