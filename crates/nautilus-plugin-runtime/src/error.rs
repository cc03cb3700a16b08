//! Plugin runtime error types

use nautilus_plugin_api::PluginError;
use std::fmt;

/// Plugin runtime error type
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// An instantiated candidate does not satisfy the plugin capability
    #[error("Unknown plugin type: {0}")]
    UnknownPluginType(String),

    /// Zero-argument construction of a plugin type failed
    #[error("Failed to load plugin {plugin}: {source}")]
    LoadFailure {
        /// Plugin type name
        plugin: String,
        /// Underlying failure
        #[source]
        source: PluginError,
    },

    /// Plugin API error
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// Metadata scan failed
    #[error("Scan error: {0}")]
    Scan(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for plugin runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    /// Create a new unknown-plugin-type error
    pub fn unknown_plugin_type(name: impl fmt::Display) -> Self {
        Self::UnknownPluginType(name.to_string())
    }

    /// Create a new load-failure error
    pub fn load_failure(plugin: impl fmt::Display, source: PluginError) -> Self {
        Self::LoadFailure {
            plugin: plugin.to_string(),
            source,
        }
    }

    /// Create a new scan error
    pub fn scan(msg: impl fmt::Display) -> Self {
        Self::Scan(msg.to_string())
    }
}
