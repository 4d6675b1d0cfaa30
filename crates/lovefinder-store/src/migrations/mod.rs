//! Database migration runner.
//!
//! Migrations are executed in order on every [`SqliteDocumentStore::new`] /
//! [`SqliteDocumentStore::open_at`] call. Each migration is guarded by a
//! `user_version` pragma so it runs exactly once.
//!
//! [`SqliteDocumentStore::new`]: crate::SqliteDocumentStore::new
//! [`SqliteDocumentStore::open_at`]: crate::SqliteDocumentStore::open_at

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Migration = (u32, &'static str, fn(&Connection) -> rusqlite::Result<()>);

/// Every migration, by the schema version it produces.
const MIGRATIONS: &[Migration] = &[(1, "v001_initial", v001_initial::up)];

/// Schema version written by the last migration.
const CURRENT_VERSION: u32 = 1;

/// Bring the schema up to [`CURRENT_VERSION`]. A database written by a newer
/// build is refused rather than guessed at.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than supported v{CURRENT_VERSION}"
        )));
    }

    for (version, name, up) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        tracing::info!(from = current, to = version, migration = name, "Applying document store migration");
        up(conn).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(())
}
