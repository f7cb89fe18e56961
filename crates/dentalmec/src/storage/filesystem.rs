use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::storage::FileStore;

/// Candidate names tried before a directory is considered full.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Move a file from `src` to `dst`. Uses `rename` first (atomic on the same
/// filesystem) and falls back to copy + delete for cross-device moves.
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// `name_<n>.ext` for `n > 0`, the name itself for `n == 0`.
fn numbered_name(file_name: &str, n: u32) -> String {
    if n == 0 {
        return file_name.to_string();
    }
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &file_name[..dot], n, &file_name[dot..]),
        _ => format!("{}_{}", file_name, n),
    }
}

/// Creates an empty file under the first free name in `directory`.
///
/// `create_new` makes the check and the creation one step, so two writers
/// never get the same name.
fn reserve_name(directory: &Path, file_name: &str) -> Result<PathBuf, StorageError> {
    for n in 0..MAX_NAME_ATTEMPTS {
        let candidate = directory.join(numbered_name(file_name, n));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(StorageError::WriteFile {
                    path: candidate,
                    source: e,
                })
            }
        }
    }

    Err(StorageError::FileExists(directory.join(file_name)))
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// True when the path only descends (no `..`, no root, no prefix).
fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Design files on the local filesystem.
///
/// Stored files live under `upload_directory`; download copies go to
/// `temp_directory` and are removed by [`FileStorage::cleanup_temporary`].
pub struct FileStorage {
    upload_directory: PathBuf,
    temp_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(upload_directory: P, temp_directory: Q) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
            temp_directory: temp_directory.as_ref().to_path_buf(),
        }
    }

    pub fn upload_directory(&self) -> &Path {
        &self.upload_directory
    }

    pub fn temp_directory(&self) -> &Path {
        &self.temp_directory
    }

    /// Maps a stored path back into the upload directory, refusing anything
    /// that would point outside of it.
    fn resolve(&self, path: &Path) -> Result<PathBuf, StorageError> {
        let relative = match path.strip_prefix(&self.upload_directory) {
            Ok(relative) => relative,
            Err(_) if path.is_relative() => path,
            Err(_) => return Err(StorageError::InvalidPath(path.to_path_buf())),
        };
        if relative.as_os_str().is_empty() || !is_plain_relative(relative) {
            return Err(StorageError::InvalidPath(path.to_path_buf()));
        }
        Ok(self.upload_directory.join(relative))
    }

    /// Removes files in the temp directory older than `max_age`.
    /// Returns how many were removed.
    pub fn cleanup_temporary(&self, max_age: Duration) -> Result<usize, StorageError> {
        let entries = match std::fs::read_dir(&self.temp_directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(StorageError::DeleteFile {
                    path: self.temp_directory.clone(),
                    source: e,
                })
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= max_age {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    file = %crate::sanitize::redact_path(&path),
                    error = %e,
                    "Failed to remove temporary file"
                ),
            }
        }
        Ok(removed)
    }
}

impl FileStore for FileStorage {
    fn store(&self, source: &Path, logical_path: &Path) -> Result<PathBuf, StorageError> {
        if !is_plain_relative(logical_path) {
            return Err(StorageError::InvalidPath(logical_path.to_path_buf()));
        }
        let file_name = logical_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidPath(logical_path.to_path_buf()))?;
        let directory = match logical_path.parent() {
            Some(parent) => self.upload_directory.join(parent),
            None => self.upload_directory.clone(),
        };

        ensure_directory(&directory)?;
        let target = reserve_name(&directory, file_name)?;
        if let Err(e) = move_file(source, &target) {
            // Release the reserved name.
            let _ = std::fs::remove_file(&target);
            return Err(e);
        }

        debug!(
            file = %crate::sanitize::redact_path(&target),
            "Stored file"
        );
        Ok(target)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn delete(&self, path: &Path) -> Result<bool, StorageError> {
        let path = self.resolve(path)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFile { path, source: e }),
        }
    }

    /// Download copies are de-duplicated like uploads.
    fn copy_to_temp(&self, stored: &Path, download_name: &str) -> Result<PathBuf, StorageError> {
        let source = self.resolve(stored)?;
        let name = Path::new(download_name);
        if name.components().count() != 1 || !is_plain_relative(name) {
            return Err(StorageError::InvalidPath(name.to_path_buf()));
        }

        ensure_directory(&self.temp_directory)?;
        let target = reserve_name(&self.temp_directory, download_name)?;
        if let Err(e) = std::fs::copy(&source, &target) {
            let _ = std::fs::remove_file(&target);
            return Err(StorageError::WriteFile {
                path: target,
                source: e,
            });
        }
        Ok(target)
    }
}
