use std::path::Path;

use crate::config::schema::{Config, MAX_PROCESSING_HOURS};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    for (process_type, hours) in config.processing_times.iter() {
        if hours > MAX_PROCESSING_HOURS {
            return Err(ConfigError::Validation {
                message: format!(
                    "processingTimes.{} must be at most {} hours",
                    process_type, MAX_PROCESSING_HOURS
                ),
            });
        }
    }

    if config.uploads.max_file_size == 0 {
        return Err(ConfigError::Validation {
            message: "uploads.maxFileSize must be greater than zero".to_string(),
        });
    }

    if config.uploads.allowed_extensions.is_empty() {
        return Err(ConfigError::Validation {
            message: "uploads.allowedExtensions must not be empty".to_string(),
        });
    }

    for ext in &config.uploads.allowed_extensions {
        if ext.is_empty() || ext.contains('.') || ext.contains('/') {
            return Err(ConfigError::Validation {
                message: format!("Invalid allowed extension '{}'", ext),
            });
        }
    }

    if config.allocator.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "allocator.maxAttempts must be at least 1".to_string(),
        });
    }

    if config.upload_directory == config.temp_directory {
        return Err(ConfigError::Validation {
            message: "tempDirectory must differ from uploadDirectory".to_string(),
        });
    }

    Ok(())
}
