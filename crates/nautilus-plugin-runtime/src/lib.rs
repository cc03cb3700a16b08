//! # Nautilus Plugin Runtime
//!
//! Discovery, lifecycle, and dependency-injected event dispatch for
//! Nautilus plugins.
//!
//! ## Features
//!
//! - **Plugin search**: walks scanned class metadata for concrete types
//!   that transitively reach the plugin marker
//! - **Lifecycle management**: load, initialize, destroy
//! - **Fixed-point dispatch**: handlers whose dependencies are published
//!   by peers in the same batch are retried until no progress is possible
//! - **Event fanout**: named events dispatched to every bound handler of
//!   every active plugin
//!
//! ## Example
//!
//! ```rust,no_run
//! use nautilus_plugin_runtime::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let manager = PluginManager::builder()
//!     .scanner(Arc::new(ManifestScanner::new().with_internal_path("plugins")))
//!     .build();
//!
//! // Load the built-in plugin set and run its init phase
//! manager.initialize().await?;
//!
//! // Dispatch an event with a scoped dependency
//! let results = manager
//!     .fire_event_with("session-started", vec![Dependency::of("session-id", 42u64)?])
//!     .await?;
//! # let _ = results;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
mod invoker;
pub mod loader;
pub mod manager;
pub mod scan;
pub mod searcher;

pub use error::{Result, RuntimeError};
pub use loader::PluginLoader;
pub use manager::{PluginManager, PluginManagerBuilder};
pub use scan::{ClassScanner, ManifestScanner, StaticScanner};
pub use searcher::PluginSearcher;

// Re-export plugin API types for convenience
pub use nautilus_plugin_api::{
    Args, ClassDef, ClassInfo, ClassKey, ClassResolver, Dependency, DependencyManager, HandlerCx,
    HandlerResult, HandlerSpec, HandlerValue, Marker, Plugin, PluginError, PluginVtable,
    StaticResolver, PLUGIN_TYPE,
};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::error::{Result, RuntimeError};
    pub use crate::loader::PluginLoader;
    pub use crate::manager::PluginManager;
    pub use crate::scan::{ClassScanner, ManifestScanner, StaticScanner};
    pub use crate::searcher::PluginSearcher;
    pub use nautilus_plugin_api::prelude::*;
}
