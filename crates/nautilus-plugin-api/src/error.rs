//! Plugin API error types

use std::fmt;

/// Plugin API error type
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// No dependency is bound under the requested name
    #[error("Dependency name not found: {0}")]
    DepNameNotFound(String),

    /// No dependency with an assignable value class exists
    #[error("Dependency class not found: {0}")]
    DepClassNotFound(String),

    /// A named dependency exists but its value class does not match
    #[error("Dependency {name} has class {actual}, expected {expected}")]
    DepUnexpectedClass {
        /// Name the lookup was performed under
        name: String,
        /// Class declared by the parameter
        expected: String,
        /// Value class actually bound under the name
        actual: String,
    },

    /// A dependency is already bound under the name
    #[error("Duplicate dependency: {0}")]
    DuplicateDependency(String),

    /// A dependency was constructed with a missing or empty field
    #[error("Bad dependency: {0}")]
    BadDependency(String),

    /// `register` was called on a plugin with no manager back-reference
    #[error("Plugin not attached to a manager: {0}")]
    PluginNotAttached(String),

    /// Failure raised from a handler body or a plugin constructor
    #[error("{0}")]
    Failure(String),
}

/// Result type for plugin API operations
pub type Result<T> = std::result::Result<T, PluginError>;

impl PluginError {
    /// Create a new dependency-name-not-found error
    pub fn dep_name_not_found(name: impl fmt::Display) -> Self {
        Self::DepNameNotFound(name.to_string())
    }

    /// Create a new dependency-class-not-found error
    pub fn dep_class_not_found(class: impl fmt::Display) -> Self {
        Self::DepClassNotFound(class.to_string())
    }

    /// Create a new unexpected-class error
    pub fn dep_unexpected_class(
        name: impl fmt::Display,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        Self::DepUnexpectedClass {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a new duplicate-dependency error
    pub fn duplicate_dependency(name: impl fmt::Display) -> Self {
        Self::DuplicateDependency(name.to_string())
    }

    /// Create a new bad-dependency error
    pub fn bad_dependency(what: impl fmt::Display) -> Self {
        Self::BadDependency(what.to_string())
    }

    /// Create a new not-attached error
    pub fn not_attached(plugin: impl fmt::Display) -> Self {
        Self::PluginNotAttached(plugin.to_string())
    }

    /// Create a new generic failure
    pub fn failure(msg: impl fmt::Display) -> Self {
        Self::Failure(msg.to_string())
    }

    /// Whether this is one of the dependency-resolution failures
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::DepNameNotFound(_) | Self::DepClassNotFound(_) | Self::DepUnexpectedClass { .. }
        )
    }
}
