pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    AllocatorConfig, Config, LogConfig, ProcessingTimes, UploadConfig, WizardConfig,
    DEFAULT_PROCESSING_HOURS, MAX_PROCESSING_HOURS,
};
