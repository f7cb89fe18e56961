//! Design file uploads attached to orders.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, info_span, warn};

use crate::auth::Actor;
use crate::clock::Clock;
use crate::config::UploadConfig;
use crate::db::file_repo::{self, FileRow, NewFile};
use crate::db::{order_repo, Database};
use crate::error::{PortalError, Result, StorageError, ValidationError};
use crate::order::service::ensure_editable;
use crate::storage::{order_file_path, FileStore};

/// A file received from the client, waiting in a temporary location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub original_name: String,
    pub temp_path: PathBuf,
    pub size: u64,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, temp_path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            original_name: original_name.into(),
            temp_path: temp_path.into(),
            size,
        }
    }

    /// Lowercased text after the last dot, if the name has one.
    pub fn extension(&self) -> Option<String> {
        let name = self.original_name.trim();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Checks name, extension and size. Returns the lowercased extension.
pub fn validate(upload: &UploadedFile, config: &UploadConfig) -> std::result::Result<String, ValidationError> {
    let name = upload.original_name.trim();
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(ValidationError::InvalidFileName(upload.original_name.clone()));
    }

    let extension = upload.extension().unwrap_or_default();
    if !config.is_allowed_extension(&extension) {
        return Err(ValidationError::DisallowedExtension {
            name: name.to_string(),
            extension,
        });
    }

    if upload.size > config.max_file_size {
        return Err(ValidationError::FileTooLarge {
            name: name.to_string(),
            size: upload.size,
            max: config.max_file_size,
        });
    }

    Ok(extension)
}

#[derive(Clone)]
pub struct FileService {
    db: Database,
    store: Arc<dyn FileStore>,
    config: UploadConfig,
    clock: Arc<dyn Clock>,
}

impl FileService {
    pub fn new(
        db: Database,
        store: Arc<dyn FileStore>,
        config: UploadConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            store,
            config,
            clock,
        }
    }

    pub fn validate(&self, upload: &UploadedFile) -> std::result::Result<String, ValidationError> {
        validate(upload, &self.config)
    }

    /// Stores the file and records it against the order.
    ///
    /// The physical write happens first. If the row cannot be written the
    /// stored file is removed again.
    pub fn attach(&self, order_id: i64, upload: &UploadedFile) -> Result<FileRow> {
        let _span = info_span!(
            "file.attach",
            order_id,
            file = %upload.original_name.trim()
        )
        .entered();

        let file_type = self.validate(upload)?;
        let original_name = upload.original_name.trim();
        let uploaded_at = self.clock.now();

        let logical = order_file_path(uploaded_at, order_id, original_name);
        let stored = self.store.store(&upload.temp_path, &logical)?;
        let Some(stored_name) = stored
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
        else {
            if let Err(cleanup) = self.store.delete(&stored) {
                warn!(error = %cleanup, "Failed to remove stored file");
            }
            return Err(StorageError::InvalidPath(stored).into());
        };
        let file_path = stored.to_string_lossy().into_owned();

        let new_file = NewFile {
            order_id,
            original_name,
            stored_name: &stored_name,
            file_path: &file_path,
            file_size: upload.size,
            file_type: &file_type,
            uploaded_at,
        };
        let id = match self.db.with_conn(|conn| file_repo::insert(conn, &new_file)) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "File row not written, removing stored file");
                if let Err(cleanup) = self.store.delete(&stored) {
                    warn!(error = %cleanup, file = %stored_name, "Failed to remove stored file");
                }
                return Err(e.into());
            }
        };

        info!(file_id = id, stored_name = %stored_name, size = upload.size, "File attached");
        Ok(FileRow {
            id,
            order_id,
            original_name: original_name.to_string(),
            stored_name,
            file_path,
            file_size: upload.size,
            file_type,
            uploaded_at,
        })
    }

    pub fn list_for_order(&self, actor: &Actor, order_id: i64) -> Result<Vec<FileRow>> {
        let (order, files) = self.db.with_conn(|conn| {
            let order = order_repo::find_by_id(conn, order_id)?;
            Ok((order, file_repo::list_for_order(conn, order_id)?))
        })?;
        let order = order.ok_or(PortalError::OrderNotFound(order_id))?;
        actor.ensure_access(order.user_id)?;
        Ok(files)
    }

    /// Deletes a file row and its stored copy.
    ///
    /// The row is removed inside a transaction that only commits once the
    /// physical file is gone.
    pub fn delete_file(&self, actor: &Actor, file_id: i64) -> Result<()> {
        let _span = info_span!("file.delete", file_id).entered();
        self.db.with_tx(|conn| {
            let file = file_repo::find_by_id(conn, file_id)?
                .ok_or(PortalError::FileNotFound(file_id))?;
            let order = order_repo::find_by_id(conn, file.order_id)?
                .ok_or(PortalError::OrderNotFound(file.order_id))?;
            ensure_editable(actor, &order)?;

            file_repo::delete(conn, file_id)?;
            if !self.store.delete(Path::new(&file.file_path))? {
                warn!(file = %file.stored_name, "Stored file was already missing");
            }
            info!(file = %file.stored_name, "File deleted");
            Ok(())
        })
    }

    /// Copies a file to the temp directory under its original name so it can
    /// be served for download.
    pub fn prepare_download(&self, actor: &Actor, file_id: i64) -> Result<PathBuf> {
        let (file, owner_id) = self
            .db
            .with_conn(|conn| {
                let file = file_repo::find_by_id(conn, file_id)?;
                let owner = match &file {
                    Some(file) => order_repo::find_by_id(conn, file.order_id)?.map(|o| o.user_id),
                    None => None,
                };
                Ok((file, owner))
            })?;
        let file = file.ok_or(PortalError::FileNotFound(file_id))?;
        let owner_id = owner_id.ok_or(PortalError::OrderNotFound(file.order_id))?;
        actor.ensure_access(owner_id)?;

        let stored = Path::new(&file.file_path);
        if !self.store.exists(stored) {
            return Err(PortalError::FileNotFound(file_id));
        }
        Ok(self.store.copy_to_temp(stored, &file.original_name)?)
    }

    /// Removes the stored copies of every file of an order. Rows are left to
    /// the caller, usually to the order's cascade delete.
    pub(crate) fn remove_stored_files(&self, order_id: i64) -> Result<usize> {
        let files = self
            .db
            .with_conn(|conn| file_repo::list_for_order(conn, order_id))?;
        let mut removed = 0;
        for file in &files {
            if self.store.delete(Path::new(&file.file_path))? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::clock::FixedClock;
    use crate::db::order_repo::tests::{sample_order, seed_user};
    use crate::order::OrderStatus;
    use crate::storage::FileStorage;
    use chrono::Utc;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        dir: PathBuf,
        db: Database,
        service: FileService,
        owner: Actor,
        order: i64,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let db = Database::open_in_memory().unwrap();
        let (owner, order) = db
            .with_conn(|conn| {
                let owner = seed_user(conn, "client@example.com");
                let order = order_repo::insert(conn, "20260309-0001", &sample_order(owner))?;
                Ok((owner, order))
            })
            .unwrap();
        let store = Arc::new(FileStorage::new(path.join("uploads"), path.join("tmp")));
        let clock = Arc::new(FixedClock("2026-03-09T10:00:00Z".parse().unwrap()));
        let service = FileService::new(db.clone(), store, UploadConfig::default(), clock);
        Fixture {
            _dir: dir,
            dir: path,
            db,
            service,
            owner: Actor::new(owner, Role::Client),
            order,
        }
    }

    fn incoming(f: &Fixture, name: &str, content: &[u8]) -> UploadedFile {
        let incoming = f.dir.join("incoming");
        std::fs::create_dir_all(&incoming).unwrap();
        let path = incoming.join(format!("{}-{}", content.len(), name));
        std::fs::write(&path, content).unwrap();
        UploadedFile::new(name, path, content.len() as u64)
    }

    #[test]
    fn test_extension() {
        assert_eq!(UploadedFile::new("Crown.STL", "/t", 1).extension().as_deref(), Some("stl"));
        assert_eq!(UploadedFile::new("case.constructionInfo", "/t", 1).extension().as_deref(), Some("constructioninfo"));
        assert_eq!(UploadedFile::new("noext", "/t", 1).extension(), None);
        assert_eq!(UploadedFile::new(".stl", "/t", 1).extension(), None);
    }

    #[test]
    fn test_validate() {
        let config = UploadConfig::default();
        assert_eq!(validate(&UploadedFile::new("crown.STL", "/t", 10), &config).unwrap(), "stl");
        assert!(matches!(
            validate(&UploadedFile::new("notes.pdf", "/t", 10), &config),
            Err(ValidationError::DisallowedExtension { .. })
        ));
        assert!(matches!(
            validate(&UploadedFile::new("README", "/t", 10), &config),
            Err(ValidationError::DisallowedExtension { .. })
        ));
        assert!(matches!(
            validate(&UploadedFile::new("../crown.stl", "/t", 10), &config),
            Err(ValidationError::InvalidFileName(_))
        ));
        assert!(matches!(
            validate(&UploadedFile::new("  ", "/t", 10), &config),
            Err(ValidationError::InvalidFileName(_))
        ));
        let too_big = config.max_file_size + 1;
        assert_eq!(
            validate(&UploadedFile::new("scan.zip", "/t", too_big), &config),
            Err(ValidationError::FileTooLarge {
                name: "scan.zip".to_string(),
                size: too_big,
                max: config.max_file_size,
            })
        );
        // Exactly at the limit is accepted.
        assert!(validate(&UploadedFile::new("scan.zip", "/t", config.max_file_size), &config).is_ok());
    }

    #[test]
    fn test_attach_stores_and_records() {
        let f = fixture();
        let upload = incoming(&f, "crown.stl", b"solid crown");
        let row = f.service.attach(f.order, &upload).unwrap();

        assert_eq!(row.original_name, "crown.stl");
        assert_eq!(row.stored_name, "crown.stl");
        assert_eq!(row.file_type, "stl");
        assert_eq!(row.file_size, 11);
        let expected = f.dir.join(format!("uploads/2026/03/{}/crown.stl", f.order));
        assert_eq!(PathBuf::from(&row.file_path), expected);
        assert!(expected.exists());
        assert!(!upload.temp_path.exists());

        let listed = f.service.list_for_order(&f.owner, f.order).unwrap();
        assert_eq!(listed, vec![row]);
    }

    #[test]
    fn test_attach_duplicate_name_keeps_both() {
        let f = fixture();
        let first = f.service.attach(f.order, &incoming(&f, "crown.stl", b"a")).unwrap();
        let second = f.service.attach(f.order, &incoming(&f, "crown.stl", b"bb")).unwrap();
        assert_eq!(first.stored_name, "crown.stl");
        assert_eq!(second.stored_name, "crown_1.stl");
        assert_eq!(second.original_name, "crown.stl");
    }

    #[test]
    fn test_attach_removes_stored_file_when_row_fails() {
        let f = fixture();
        f.db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER fail_files BEFORE INSERT ON files
                 BEGIN SELECT RAISE(ABORT, 'files table unavailable'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        let result = f.service.attach(f.order, &incoming(&f, "crown.stl", b"a"));
        assert!(matches!(result, Err(PortalError::Database(_))));
        assert!(!f.dir.join(format!("uploads/2026/03/{}/crown.stl", f.order)).exists());
    }

    #[test]
    fn test_attach_rejects_invalid_without_touching_disk() {
        let f = fixture();
        let upload = incoming(&f, "notes.pdf", b"%PDF");
        let result = f.service.attach(f.order, &upload);
        assert!(matches!(result, Err(PortalError::Validation(_))));
        assert!(upload.temp_path.exists());
        assert!(!f.dir.join("uploads").exists());
    }

    #[test]
    fn test_other_client_cannot_list_or_download() {
        let f = fixture();
        let row = f.service.attach(f.order, &incoming(&f, "crown.stl", b"a")).unwrap();
        let stranger = Actor::new(f.owner.user_id + 100, Role::Client);

        assert!(matches!(
            f.service.list_for_order(&stranger, f.order),
            Err(PortalError::Unauthorized(_))
        ));
        assert!(matches!(
            f.service.prepare_download(&stranger, row.id),
            Err(PortalError::Unauthorized(_))
        ));

        let staff = Actor::new(f.owner.user_id + 100, Role::Technician);
        let copy = f.service.prepare_download(&staff, row.id).unwrap();
        assert_eq!(copy, f.dir.join("tmp/crown.stl"));
    }

    #[test]
    fn test_download_of_missing_file() {
        let f = fixture();
        assert!(matches!(
            f.service.prepare_download(&f.owner, 404),
            Err(PortalError::FileNotFound(404))
        ));
        let row = f.service.attach(f.order, &incoming(&f, "crown.stl", b"a")).unwrap();
        std::fs::remove_file(&row.file_path).unwrap();
        assert!(matches!(
            f.service.prepare_download(&f.owner, row.id),
            Err(PortalError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_delete_file_removes_row_and_disk() {
        let f = fixture();
        let row = f.service.attach(f.order, &incoming(&f, "crown.stl", b"a")).unwrap();
        f.service.delete_file(&f.owner, row.id).unwrap();

        assert!(!PathBuf::from(&row.file_path).exists());
        assert!(f.service.list_for_order(&f.owner, f.order).unwrap().is_empty());
        assert!(matches!(
            f.service.delete_file(&f.owner, row.id),
            Err(PortalError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_client_cannot_delete_file_of_submitted_order() {
        let f = fixture();
        let row = f.service.attach(f.order, &incoming(&f, "crown.stl", b"a")).unwrap();
        f.db.with_conn(|conn| {
            order_repo::update_status(conn, f.order, OrderStatus::Pending, None, Utc::now())
        })
        .unwrap();

        assert!(matches!(
            f.service.delete_file(&f.owner, row.id),
            Err(PortalError::Unauthorized(_))
        ));
        assert!(PathBuf::from(&row.file_path).exists());
        assert_eq!(f.service.list_for_order(&f.owner, f.order).unwrap().len(), 1);

        let staff = Actor::new(f.owner.user_id + 100, Role::Technician);
        f.service.delete_file(&staff, row.id).unwrap();
        assert!(!PathBuf::from(&row.file_path).exists());
    }

    /// Hands back a stored path that has no file name component.
    struct NamelessStore {
        inner: FileStorage,
        deleted: Mutex<Vec<PathBuf>>,
    }

    impl FileStore for NamelessStore {
        fn store(&self, _source: &Path, _logical_path: &Path) -> std::result::Result<PathBuf, StorageError> {
            Ok(PathBuf::from("/"))
        }

        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }

        fn delete(&self, path: &Path) -> std::result::Result<bool, StorageError> {
            self.deleted.lock().unwrap().push(path.to_path_buf());
            Ok(true)
        }

        fn copy_to_temp(&self, stored: &Path, name: &str) -> std::result::Result<PathBuf, StorageError> {
            self.inner.copy_to_temp(stored, name)
        }
    }

    #[test]
    fn test_attach_rejects_stored_path_without_file_name() {
        let f = fixture();
        let store = Arc::new(NamelessStore {
            inner: FileStorage::new(f.dir.join("uploads"), f.dir.join("tmp")),
            deleted: Mutex::new(Vec::new()),
        });
        let clock = Arc::new(FixedClock("2026-03-09T10:00:00Z".parse().unwrap()));
        let service = FileService::new(f.db.clone(), store.clone(), UploadConfig::default(), clock);

        let result = service.attach(f.order, &incoming(&f, "crown.stl", b"a"));
        assert!(matches!(
            result,
            Err(PortalError::Storage(StorageError::InvalidPath(ref path))) if path == Path::new("/")
        ));
        assert!(f.service.list_for_order(&f.owner, f.order).unwrap().is_empty());
        assert_eq!(*store.deleted.lock().unwrap(), vec![PathBuf::from("/")]);
    }

    #[test]
    fn test_remove_stored_files() {
        let f = fixture();
        let a = f.service.attach(f.order, &incoming(&f, "a.stl", b"a")).unwrap();
        let b = f.service.attach(f.order, &incoming(&f, "b.obj", b"b")).unwrap();
        assert_eq!(f.service.remove_stored_files(f.order).unwrap(), 2);
        assert!(!PathBuf::from(&a.file_path).exists());
        assert!(!PathBuf::from(&b.file_path).exists());
    }
}
