use std::path::Path;

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

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

/// Checks that hold regardless of which schema revision accepted the file.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.uploads_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "uploads_directory must not be empty".to_string(),
        });
    }

    if config.dispatch.max_retries > 10 {
        return Err(ConfigError::Validation {
            message: format!(
                "dispatch.max_retries must be at most 10, got {}",
                config.dispatch.max_retries
            ),
        });
    }

    let intelligence = &config.intelligence;
    if !(0.0..=2.0).contains(&intelligence.temperature) {
        return Err(ConfigError::Validation {
            message: format!(
                "intelligence.temperature must be between 0 and 2, got {}",
                intelligence.temperature
            ),
        });
    }

    if !intelligence.base_url.starts_with("http://") && !intelligence.base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation {
            message: format!(
                "intelligence.base_url must be an http(s) URL: {}",
                crate::sanitize::redact_url(&intelligence.base_url)
            ),
        });
    }

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        return Err(ConfigError::Validation {
            message: format!("Unknown log level: {}", config.log.level),
        });
    }

    Ok(())
}
