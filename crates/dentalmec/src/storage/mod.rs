//! Physical storage of design files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};

use crate::error::StorageError;

pub mod filesystem;

pub use filesystem::FileStorage;

/// Where order files are kept.
pub trait FileStore: Send + Sync {
    /// Moves `source` to `logical_path` (relative to the storage root) and
    /// returns the path it was stored at. An existing file with the same
    /// name is never overwritten; the stored name gets a `_<n>` suffix.
    fn store(&self, source: &Path, logical_path: &Path) -> Result<PathBuf, StorageError>;

    fn exists(&self, path: &Path) -> bool;

    /// Removes a stored file. Returns false if it was already gone.
    fn delete(&self, path: &Path) -> Result<bool, StorageError>;

    /// Copies a stored file to a temporary location named `download_name`.
    fn copy_to_temp(&self, stored: &Path, download_name: &str) -> Result<PathBuf, StorageError>;
}

/// Logical location of an upload: `YYYY/MM/<order_id>/<file_name>`.
pub fn order_file_path(uploaded_at: DateTime<Utc>, order_id: i64, file_name: &str) -> PathBuf {
    PathBuf::from(format!("{:04}", uploaded_at.year()))
        .join(format!("{:02}", uploaded_at.month()))
        .join(order_id.to_string())
        .join(file_name)
}
