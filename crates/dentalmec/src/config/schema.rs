use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::order::ProcessType;

/// Processing duration used when a process type has no configured entry.
pub const DEFAULT_PROCESSING_HOURS: u32 = 24;

/// Upper bound for a configured processing duration, one year.
pub const MAX_PROCESSING_HOURS: u32 = 8760;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    /// SQLite file. Defaults to `~/.dentalmec/data/dentalmec.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    pub upload_directory: PathBuf,
    pub temp_directory: PathBuf,
    #[serde(default)]
    pub processing_times: ProcessingTimes,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub allocator: AllocatorConfig,
    #[serde(default)]
    pub wizard: WizardConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            upload_directory: PathBuf::from("uploads"),
            temp_directory: PathBuf::from("uploads/temp"),
            processing_times: ProcessingTimes::default(),
            uploads: UploadConfig::default(),
            allocator: AllocatorConfig::default(),
            wizard: WizardConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Estimated processing hours per process type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessingTimes(BTreeMap<ProcessType, u32>);

impl ProcessingTimes {
    pub fn new(hours: impl IntoIterator<Item = (ProcessType, u32)>) -> Self {
        Self(hours.into_iter().collect())
    }

    /// Hours for the process type, falling back to [`DEFAULT_PROCESSING_HOURS`].
    pub fn hours_for(&self, process_type: ProcessType) -> u32 {
        self.0
            .get(&process_type)
            .copied()
            .unwrap_or(DEFAULT_PROCESSING_HOURS)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProcessType, u32)> + '_ {
        self.0.iter().map(|(process_type, hours)| (*process_type, *hours))
    }
}

impl Default for ProcessingTimes {
    fn default() -> Self {
        Self::new([
            (ProcessType::Milling, 24),
            (ProcessType::Sintering, 48),
            (ProcessType::Printing, 12),
        ])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_file_size() -> u64 {
    200 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["stl", "obj", "dcm", "constructioninfo", "zip", "rar"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl UploadConfig {
    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatorConfig {
    /// Insert attempts before a reference collision is reported as a conflict.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardConfig {
    /// Age after which an unconfirmed draft order may be reaped.
    #[serde(default = "default_draft_ttl_hours")]
    pub draft_ttl_hours: u32,
}

fn default_draft_ttl_hours() -> u32 {
    48
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            draft_ttl_hours: default_draft_ttl_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
