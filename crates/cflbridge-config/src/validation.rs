// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation

use crate::{BridgeConfig, ConfigError, ConfigResult};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &BridgeConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    if config.transcript.capacity == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "transcript.capacity".to_string(),
            reason: "must hold at least the terminator byte".to_string(),
        });
    }

    if config.engine.symbol.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "engine.symbol".to_string(),
        });
    }

    if config.storage.max_rank == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "storage.max_rank".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if let Some(suffix) = &config.storage.required_suffix {
        if suffix.is_empty() || suffix.contains('\0') {
            errors.push(ConfigValidationError::InvalidValue {
                field: "storage.required_suffix".to_string(),
                reason: "must be non-empty and free of NUL bytes".to_string(),
            });
        }
    }

    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("'{}' is not one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        });
    }

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut config = BridgeConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let mut config = BridgeConfig::default();
        config.logging.level = "WARN".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_all_problems_reported() {
        let mut config = BridgeConfig::default();
        config.transcript.capacity = 0;
        config.storage.max_rank = 0;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("transcript.capacity"));
        assert!(message.contains("storage.max_rank"));
    }
}
