//! File storage: profile pictures, gallery and chat images.
//!
//! Files are addressed by slash-separated relative paths such as
//! `profileImages/{uid}/me.jpg`. A folder listing returns the files directly
//! inside the folder.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store `data` at `path`, replacing any previous file. Returns the path.
    async fn upload(&self, path: &str, data: Bytes) -> Result<String>;

    /// URL the UI can load the file from.
    async fn download_url(&self, path: &str) -> Result<String>;

    /// `NotFound` if there is no file at `path`.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Paths of the files directly inside `folder`.
    async fn list_folder(&self, folder: &str) -> Result<Vec<String>>;
}

fn check_file_path(path: &str) -> Result<()> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|s| s.is_empty() || s == "." || s == "..");
    if bad {
        return Err(StoreError::InvalidPath(format!("bad file path {path:?}")));
    }
    Ok(())
}

fn check_size(data: &[u8], max: usize) -> Result<()> {
    if data.is_empty() {
        return Err(StoreError::EmptyFile);
    }
    if data.len() > max {
        return Err(StoreError::FileTooLarge {
            size: data.len(),
            max,
        });
    }
    Ok(())
}

fn folder_prefix(folder: &str) -> String {
    format!("{}/", folder.trim_end_matches('/'))
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local file store, shared by every session of a test or embedding.
pub struct MemoryFileStore {
    files: RwLock<BTreeMap<String, Bytes>>,
    failing_prefixes: RwLock<Vec<String>>,
    base_url: String,
    max_size: usize,
}

impl MemoryFileStore {
    pub fn new(base_url: impl Into<String>, max_size: usize) -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
            failing_prefixes: RwLock::new(Vec::new()),
            base_url: base_url.into(),
            max_size,
        }
    }

    /// Make deletes under `prefix` fail as unavailable.
    pub async fn fail_deletes_under(&self, prefix: &str) {
        self.failing_prefixes.write().await.push(prefix.to_string());
    }

    pub async fn clear_faults(&self) {
        self.failing_prefixes.write().await.clear();
    }

    pub async fn exists(&self, path: &str) -> bool {
        self.files.read().await.contains_key(path)
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn upload(&self, path: &str, data: Bytes) -> Result<String> {
        check_file_path(path)?;
        check_size(&data, self.max_size)?;
        debug!(path, size = data.len(), "Stored file");
        self.files.write().await.insert(path.to_string(), data);
        Ok(path.to_string())
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        check_file_path(path)?;
        if !self.files.read().await.contains_key(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(join_url(&self.base_url, path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        check_file_path(path)?;
        if self
            .failing_prefixes
            .read()
            .await
            .iter()
            .any(|p| path.starts_with(p.as_str()))
        {
            warn!(path, "Rejecting delete (injected fault)");
            return Err(StoreError::Unavailable(path.to_string()));
        }
        match self.files.write().await.remove(path) {
            Some(_) => {
                debug!(path, "Deleted file");
                Ok(())
            }
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn list_folder(&self, folder: &str) -> Result<Vec<String>> {
        check_file_path(folder.trim_end_matches('/'))?;
        let prefix = folder_prefix(folder);
        let files = self.files.read().await;
        Ok(files
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| !k[prefix.len()..].contains('/'))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Local disk
// ---------------------------------------------------------------------------

/// Resolve `target` under `base`, refusing anything that would escape it.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target.components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(StoreError::InvalidPath(
                    "Path traversal detected".to_string(),
                ));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(StoreError::InvalidPath(
            "Path traversal detected".to_string(),
        ));
    }
    Ok(resolved)
}

/// Files on local disk below a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    base_path: PathBuf,
    base_url: String,
    max_size: usize,
}

impl LocalFileStore {
    pub async fn new(base_path: PathBuf, base_url: impl Into<String>, max_size: usize) -> Result<Self> {
        fs::create_dir_all(&base_path).await?;

        info!(path = %base_path.display(), "File store initialized");

        Ok(Self {
            base_path,
            base_url: base_url.into(),
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        check_file_path(path)?;
        ensure_within(&self.base_path, Path::new(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn upload(&self, path: &str, data: Bytes) -> Result<String> {
        check_size(&data, self.max_size)?;
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &data).await?;

        debug!(path, size = data.len(), "Stored file");
        Ok(path.to_string())
    }

    async fn download_url(&self, path: &str) -> Result<String> {
        let target = self.resolve(path)?;
        if !fs::try_exists(&target).await? {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(join_url(&self.base_url, path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path, "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_folder(&self, folder: &str) -> Result<Vec<String>> {
        let folder = folder.trim_end_matches('/');
        let dir = self.resolve(folder)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                paths.push(format!("{folder}/{name}"));
            }
        }
        paths.sort();
        Ok(paths)
    }
}
