//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Log output settings.
    pub logging: LoggingConfig,

    /// Category metrics settings.
    pub metrics: MetricsConfig,

    /// Span collection settings.
    pub tracing: TracingConfig,

    /// Defaults for observed traversals.
    pub traversal: TraversalConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Category metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Record request/success/failure metrics.
    pub enabled: bool,

    /// Architectural layer prefixed to every instrument name
    /// (e.g. "application" gives `application_<category>_requests_total`).
    pub layer: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            layer: "application".to_string(),
        }
    }
}

/// Span collection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TracingConfig {
    /// Produce a span per traversed item.
    pub enabled: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Traversal defaults.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TraversalConfig {
    /// Operation name used when a caller does not supply one.
    pub default_operation: String,

    /// Tag each item span with the item's Rust type name.
    pub record_item_type: bool,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            default_operation: "traverse".to_string(),
            record_item_type: true,
        }
    }
}

impl EngineConfig {
    /// Parse and validate configuration held in memory.
    pub fn from_toml_str(content: &str) -> Result<Self, crate::config::ConfigError> {
        crate::config::loader::parse_config(content)
    }
}
