pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod order;
pub mod sanitize;
pub mod storage;
pub mod uploads;
pub mod wizard;

pub use auth::{Actor, Role};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, PortalError, Result, StorageError, ValidationError};
pub use order::{LifecycleManager, OrderService, OrderStatus, ProcessType};
pub use storage::{FileStorage, FileStore};
pub use uploads::{FileService, UploadedFile};
pub use wizard::{MemorySessionStore, OrderWizard, SessionKey, StepOutcome, WizardAction};
