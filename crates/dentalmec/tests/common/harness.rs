//! Isolated environment for driving the order services end to end.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use dentalmec::auth::{Actor, Role};
use dentalmec::clock::{Clock, FixedClock};
use dentalmec::config::Config;
use dentalmec::db::order_repo::{self, OrderRow};
use dentalmec::db::user_repo::{self, NewUser};
use dentalmec::db::Database;
use dentalmec::storage::FileStorage;
use dentalmec::uploads::{FileService, UploadedFile};
use dentalmec::wizard::{MemorySessionStore, OrderWizard, SessionKey, StepOutcome, WizardAction};
use dentalmec::OrderService;

/// Thursday, 2026-03-12 10:00 UTC.
pub const FIXTURE_NOW: &str = "2026-03-12T10:00:00Z";

pub struct TestHarness {
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub db: Database,
    pub orders: OrderService,
    pub wizard: OrderWizard,
    pub sessions: Arc<MemorySessionStore>,
    pub client: Actor,
    pub technician: Actor,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let config = Arc::new(Config {
            upload_directory: base.join("uploads"),
            temp_directory: base.join("tmp"),
            ..Config::default()
        });
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            FIXTURE_NOW.parse().expect("Failed to parse fixture time"),
        ));

        let db_path = base.join("data").join("dentalmec.db");
        let db = Database::open(&db_path).expect("Failed to open database");
        let client = register(&db, "Clínica Sonrisa", "sonrisa@example.com", Role::Client);
        let technician = register(&db, "Marta Ruiz", "marta@example.com", Role::Technician);

        let orders = build_orders(&db, &config, &clock);
        let sessions = Arc::new(MemorySessionStore::new());
        let wizard = OrderWizard::new(orders.clone(), sessions.clone());

        Self {
            temp_dir,
            db_path,
            config,
            clock,
            db,
            orders,
            wizard,
            sessions,
            client,
            technician,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A second service stack on its own connection to the same database file.
    pub fn reopen(&self) -> OrderService {
        let db = Database::open(&self.db_path).expect("Failed to reopen database");
        build_orders(&db, &self.config, &self.clock)
    }

    /// Writes `content` to an incoming temp file, as a web server would.
    pub fn upload(&self, name: &str, content: &[u8]) -> UploadedFile {
        let incoming = self.temp_path().join("incoming");
        std::fs::create_dir_all(&incoming).expect("Failed to create incoming dir");
        let path = incoming.join(format!("{}.part", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).expect("Failed to write upload");
        UploadedFile::new(name, path, content.len() as u64)
    }

    pub fn act(&self, key: &SessionKey, action: WizardAction) -> StepOutcome {
        self.wizard
            .handle(key, &self.client, action)
            .expect("Wizard step failed")
    }

    pub fn order(&self, id: i64) -> OrderRow {
        self.db
            .with_conn(|conn| order_repo::find_by_id(conn, id))
            .expect("Failed to read order")
            .expect("Order does not exist")
    }

    pub fn count(&self, table: &str) -> u64 {
        self.db
            .with_conn(|conn| {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                    r.get(0)
                })?)
            })
            .expect("Failed to count rows")
    }

    /// Every regular file below the upload directory.
    pub fn stored_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }
        let mut files = Vec::new();
        walk(&self.config.upload_directory, &mut files);
        files.sort();
        files
    }
}

fn register(db: &Database, name: &str, email: &str, role: Role) -> Actor {
    let id = db
        .with_conn(|conn| {
            user_repo::insert(
                conn,
                &NewUser { name, email, role },
                chrono::Utc::now(),
            )
        })
        .expect("Failed to register user");
    Actor::new(id, role)
}

fn build_orders(db: &Database, config: &Arc<Config>, clock: &Arc<dyn Clock>) -> OrderService {
    let storage = Arc::new(FileStorage::new(
        &config.upload_directory,
        &config.temp_directory,
    ));
    let files = FileService::new(db.clone(), storage, config.uploads.clone(), clock.clone());
    OrderService::new(db.clone(), config.clone(), clock.clone(), files)
}
