//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so an embedding UI can start with zero
//! configuration.

use std::path::PathBuf;

use directories::ProjectDirs;
use lovefinder_shared::constants::{DEFAULT_MAX_GALLERY_IMAGES, DEFAULT_MAX_UPLOAD_SIZE};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base directory for local data.
    /// Env: `LOVEFINDER_DATA_DIR`
    /// Default: platform data directory, or `./lovefinder-data`
    pub data_dir: PathBuf,

    /// SQLite document database.
    /// Env: `LOVEFINDER_DB_PATH`
    /// Default: `{data_dir}/lovefinder.db`
    pub db_path: PathBuf,

    /// Root of the local file store.
    /// Env: `LOVEFINDER_FILES_PATH`
    /// Default: `{data_dir}/files`
    pub files_path: PathBuf,

    /// Prefix of the URLs handed out for stored files.
    /// Env: `LOVEFINDER_DOWNLOAD_BASE_URL`
    /// Default: `file://{files_path}`
    pub download_base_url: String,

    /// Maximum upload size in bytes.
    /// Env: `LOVEFINDER_MAX_UPLOAD_SIZE`
    /// Default: 10 MiB
    pub max_upload_size: usize,

    /// Maximum number of gallery images per principal.
    /// Env: `LOVEFINDER_MAX_GALLERY_IMAGES`
    /// Default: `6`
    pub max_gallery_images: usize,

    /// Capacity of the client event channel.
    /// Env: `LOVEFINDER_EVENT_BUFFER`
    /// Default: `64`
    pub event_buffer: usize,
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "lovefinder", "lovefinder")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./lovefinder-data"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

impl ClientConfig {
    /// Defaults with every local path placed under `data_dir`.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let files_path = data_dir.join("files");
        Self {
            db_path: data_dir.join("lovefinder.db"),
            download_base_url: format!("file://{}", files_path.display()),
            files_path,
            data_dir,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            max_gallery_images: DEFAULT_MAX_GALLERY_IMAGES,
            event_buffer: 64,
        }
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match var("LOVEFINDER_DATA_DIR") {
            Some(dir) => Self::with_data_dir(PathBuf::from(dir)),
            None => Self::default(),
        };

        if let Some(path) = var("LOVEFINDER_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Some(path) = var("LOVEFINDER_FILES_PATH") {
            config.files_path = PathBuf::from(path);
            config.download_base_url = format!("file://{}", config.files_path.display());
        }

        if let Some(url) = var("LOVEFINDER_DOWNLOAD_BASE_URL") {
            config.download_base_url = url;
        }

        if let Some(val) = var("LOVEFINDER_MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid LOVEFINDER_MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(val) = var("LOVEFINDER_MAX_GALLERY_IMAGES") {
            match val.parse::<usize>() {
                Ok(n) => config.max_gallery_images = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid LOVEFINDER_MAX_GALLERY_IMAGES, using default")
                }
            }
        }

        if let Some(val) = var("LOVEFINDER_EVENT_BUFFER") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.event_buffer = n,
                _ => tracing::warn!(value = %val, "Invalid LOVEFINDER_EVENT_BUFFER, using default"),
            }
        }

        config
    }
}
