//! Plugin class loading
//!
//! The loader keeps a deduplicated, ordered collection of search roots
//! and delegates type resolution to a parent [`ClassResolver`] supplied
//! by the host, parent-first.

use nautilus_plugin_api::{ClassDef, ClassResolver};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Search roots plus parent-first type resolution
pub struct PluginLoader {
    paths: parking_lot::RwLock<Vec<PathBuf>>,
    parent: Arc<dyn ClassResolver>,
}

impl PluginLoader {
    /// Create a loader delegating to the given parent resolver
    pub fn new(parent: Arc<dyn ClassResolver>) -> Self {
        Self {
            paths: parking_lot::RwLock::new(Vec::new()),
            parent,
        }
    }

    /// Add a search root
    ///
    /// Idempotent: a root that is already present is discarded. Returns
    /// whether the root was newly added.
    pub fn add_path(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let mut paths = self.paths.write();
        if paths.contains(&path) {
            debug!(path = %path.display(), "Search root already present, discarded");
            return false;
        }
        paths.push(path);
        true
    }

    /// Snapshot of the search roots, in addition order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.read().clone()
    }

    /// Resolve a type name through the parent resolver
    pub fn resolve(&self, name: &str) -> Option<Arc<ClassDef>> {
        self.parent.resolve(name)
    }
}

impl fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLoader")
            .field("paths", &self.paths.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nautilus_plugin_api::StaticResolver;

    #[test]
    fn test_add_path_idempotent() {
        let loader = PluginLoader::new(Arc::new(StaticResolver::new()));

        assert!(loader.add_path("/plugins/a"));
        assert!(loader.add_path("/plugins/b"));
        assert!(!loader.add_path("/plugins/a"));

        let paths: Vec<String> = loader
            .paths()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        assert_eq!(paths, ["/plugins/a", "/plugins/b"]);
    }

    #[test]
    fn test_resolution_delegates_to_parent() {
        let resolver = StaticResolver::new().with(ClassDef::of("demo.Widget", || Ok(0u8)));
        let loader = PluginLoader::new(Arc::new(resolver));

        assert!(loader.resolve("demo.Widget").is_some());
        assert!(loader.resolve("demo.Missing").is_none());
    }
}
