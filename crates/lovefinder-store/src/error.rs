use lovefinder_shared::AuthError;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed document or file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller may not read or write the addressed path.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The backend refused or failed the write.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A path segment was empty or contained a separator.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// JSON (de)serialization of document data failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (database directory, file store).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Upload exceeds the configured maximum.
    #[error("File too large: {size} bytes (max {max})")]
    FileTooLarge { size: usize, max: usize },

    /// Uploads must carry at least one byte.
    #[error("Empty file")]
    EmptyFile,

    /// Identity provider failure.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

impl StoreError {
    /// Errors a subscriber sees when its principal signs out or its
    /// documents disappear. These are expected and not worth an error log.
    pub fn is_expected_on_sign_out(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::PermissionDenied(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
