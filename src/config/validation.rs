//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the metrics layer can prefix instrument names
//! - Check the log level is one `tracing` understands
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::EngineConfig;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown log level '{0}'")]
    InvalidLogLevel(String),

    #[error("metrics layer must not be empty")]
    EmptyLayer,

    #[error("metrics layer '{0}' may only contain ASCII letters, digits and '_'")]
    InvalidLayer(String),

    #[error("default traversal operation must not be empty")]
    EmptyOperation,
}

/// Validate `config`, collecting every error found.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let level = config.logging.level.to_ascii_lowercase();
    if !LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.logging.level.clone(),
        ));
    }

    let layer = &config.metrics.layer;
    if layer.is_empty() {
        errors.push(ValidationError::EmptyLayer);
    } else if !layer.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        errors.push(ValidationError::InvalidLayer(layer.clone()));
    }

    if config.traversal.default_operation.trim().is_empty() {
        errors.push(ValidationError::EmptyOperation);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
