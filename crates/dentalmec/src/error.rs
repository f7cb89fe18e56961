use std::path::PathBuf;
use thiserror::Error;

use crate::order::OrderStatus;
use crate::wizard::WizardStep;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Reference number conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Order {0} not found")]
    OrderNotFound(i64),

    #[error("File {0} not found")]
    FileNotFound(i64),
}

impl PortalError {
    /// Message safe to show to the end user.
    ///
    /// Persistence and filesystem internals are replaced with a generic text;
    /// the full error is logged by the operation that produced it.
    pub fn user_message(&self) -> String {
        match self {
            PortalError::Validation(e) => e.to_string(),
            PortalError::Unauthorized(_) => {
                "You do not have permission to perform this action.".to_string()
            }
            PortalError::OrderNotFound(_) => {
                "The order does not exist or has been deleted.".to_string()
            }
            PortalError::FileNotFound(_) => "The file does not exist.".to_string(),
            PortalError::Conflict(_) | PortalError::Database(_) | PortalError::Config(_) => {
                "An error occurred while saving the order. Please try again.".to_string()
            }
            PortalError::Storage(_) => {
                "An error occurred while storing the file. Please try again.".to_string()
            }
        }
    }
}

/// Malformed or missing input. Always raised before any write is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid process type: '{0}'")]
    InvalidProcessType(String),

    #[error("Invalid order status: '{0}'")]
    InvalidStatus(String),

    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("At least one file must be uploaded")]
    NoFiles,

    #[error("File '{name}' has a disallowed extension '{extension}'")]
    DisallowedExtension { name: String, extension: String },

    #[error("File '{name}' is {size} bytes, the limit is {max} bytes")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("Invalid file name: '{0}'")]
    InvalidFileName(String),

    #[error("Comment text must not be empty")]
    EmptyComment,

    #[error("A reason must be given when rejecting an order")]
    MissingRejectionReason,

    #[error("Order is already in status '{0}'")]
    UnchangedStatus(OrderStatus),

    #[error("Status '{0}' cannot be set manually")]
    StatusNotSettable(OrderStatus),

    #[error("Expected wizard step {expected}, but the order form is at step {actual}")]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },

    #[error("The draft order could not be found, please start again")]
    MissingDraft,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file '{path}': {source}")]
    DeleteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free file name left for: {0}")]
    FileExists(PathBuf),

    #[error("Path escapes the storage root: {0}")]
    InvalidPath(PathBuf),
}

pub type Result<T> = std::result::Result<T, PortalError>;
