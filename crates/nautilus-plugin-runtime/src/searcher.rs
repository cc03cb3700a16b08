//! Plugin type discovery
//!
//! The searcher walks the scanned metadata graph and yields the concrete
//! types that transitively reach the plugin marker through superclass or
//! interface edges. Ordering of the results is not a contract.

use crate::error::Result;
use crate::scan::ClassScanner;
use nautilus_plugin_api::{class_index, ClassInfo, PLUGIN_TYPE};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Finds concrete plugin types in scanned metadata
pub struct PluginSearcher {
    scanner: Arc<dyn ClassScanner>,
    marker: String,
}

impl PluginSearcher {
    /// Create a searcher using the default plugin marker
    pub fn new(scanner: Arc<dyn ClassScanner>) -> Self {
        Self {
            scanner,
            marker: PLUGIN_TYPE.to_string(),
        }
    }

    /// Override the plugin marker name
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// The marker name candidates must reach
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Concrete plugin types built into the host
    pub async fn internal(&self) -> Result<Vec<ClassInfo>> {
        let classes = self.scanner.scan_internal().await?;
        Ok(self.select(classes))
    }

    /// Concrete plugin types declared under the given paths
    pub async fn search(&self, paths: &[PathBuf]) -> Result<Vec<ClassInfo>> {
        let classes = self.scanner.scan(paths).await?;
        Ok(self.select(classes))
    }

    fn select(&self, classes: Vec<ClassInfo>) -> Vec<ClassInfo> {
        let index = class_index(&classes);
        let found: Vec<ClassInfo> = classes
            .iter()
            .filter(|c| c.is_concrete && reaches_marker(&index, &c.name, &self.marker))
            .cloned()
            .collect();
        debug!(
            scanned = classes.len(),
            plugins = found.len(),
            "Plugin search finished"
        );
        found
    }
}

impl fmt::Debug for PluginSearcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSearcher")
            .field("marker", &self.marker)
            .finish()
    }
}

/// Breadth-first closure over superclass and interface edges
fn reaches_marker(index: &HashMap<String, ClassInfo>, start: &str, marker: &str) -> bool {
    let mut seen: HashSet<String> = HashSet::new();
    let mut frontier = vec![start.to_string()];

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for name in frontier.drain(..) {
            if name == marker {
                return true;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(info) = index.get(&name) {
                if info.super_class.as_deref() == Some(marker)
                    || info.interfaces.iter().any(|i| i == marker)
                {
                    return true;
                }
                if let Some(sup) = &info.super_class {
                    next.push(sup.clone());
                }
                next.extend(info.interfaces.iter().cloned());
            }
        }
        frontier = next;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::StaticScanner;

    fn names(mut classes: Vec<ClassInfo>) -> Vec<String> {
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        classes.into_iter().map(|c| c.name).collect()
    }

    #[tokio::test]
    async fn test_direct_interface_match() {
        let scanner = StaticScanner::new().with_internal(vec![
            ClassInfo::concrete("demo.A").implements(PLUGIN_TYPE),
            ClassInfo::concrete("demo.B"),
        ]);
        let searcher = PluginSearcher::new(Arc::new(scanner));

        assert_eq!(names(searcher.internal().await.unwrap()), ["demo.A"]);
    }

    #[tokio::test]
    async fn test_transitive_mixed_edges() {
        // concrete -> superclass -> interface -> marker
        let scanner = StaticScanner::new().with_internal(vec![
            ClassInfo::concrete("demo.Leaf").extends("demo.Mid"),
            ClassInfo::abstract_type("demo.Mid").implements("demo.Cap"),
            ClassInfo::abstract_type("demo.Cap").implements(PLUGIN_TYPE),
        ]);
        let searcher = PluginSearcher::new(Arc::new(scanner));

        assert_eq!(names(searcher.internal().await.unwrap()), ["demo.Leaf"]);
    }

    #[tokio::test]
    async fn test_abstract_candidates_excluded() {
        let scanner = StaticScanner::new().with_internal(vec![
            ClassInfo::abstract_type("demo.Base").implements(PLUGIN_TYPE),
            ClassInfo::concrete("demo.Impl").extends("demo.Base"),
        ]);
        let searcher = PluginSearcher::new(Arc::new(scanner));

        assert_eq!(names(searcher.internal().await.unwrap()), ["demo.Impl"]);
    }

    #[tokio::test]
    async fn test_unreachable_and_unknown_supertypes() {
        let scanner = StaticScanner::new().with_internal(vec![
            ClassInfo::concrete("demo.Orphan").extends("demo.NotScanned"),
            ClassInfo::concrete("demo.Plain"),
        ]);
        let searcher = PluginSearcher::new(Arc::new(scanner));

        assert!(searcher.internal().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cyclic_metadata_terminates() {
        let scanner = StaticScanner::new().with_internal(vec![
            ClassInfo::concrete("demo.A").extends("demo.B"),
            ClassInfo::abstract_type("demo.B").extends("demo.A"),
        ]);
        let searcher = PluginSearcher::new(Arc::new(scanner));

        assert!(searcher.internal().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_marker_and_paths() {
        let scanner = StaticScanner::new().with_path(
            "/ext",
            vec![ClassInfo::concrete("ext.A").implements("custom.Marker")],
        );
        let searcher = PluginSearcher::new(Arc::new(scanner)).with_marker("custom.Marker");

        let found = searcher.search(&[PathBuf::from("/ext")]).await.unwrap();
        assert_eq!(names(found), ["ext.A"]);
    }
}
