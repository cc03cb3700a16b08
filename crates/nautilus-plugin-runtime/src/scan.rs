//! Metadata scanners
//!
//! The runtime consumes class metadata through the [`ClassScanner`]
//! trait; how the metadata is obtained is the host's business. Two
//! implementations are provided: an in-memory [`StaticScanner`] for
//! embedders and tests, and a [`ManifestScanner`] that reads JSON
//! class-metadata manifests from directories.

use crate::error::Result;
use async_trait::async_trait;
use nautilus_plugin_api::ClassInfo;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source of class metadata for the searcher
#[async_trait]
pub trait ClassScanner: Send + Sync {
    /// Enumerate declared types from the given paths
    async fn scan(&self, paths: &[PathBuf]) -> Result<Vec<ClassInfo>>;

    /// Enumerate the types built into the host
    async fn scan_internal(&self) -> Result<Vec<ClassInfo>> {
        self.scan(&[]).await
    }
}

/// Scanner over fixed, in-memory metadata
#[derive(Debug, Default)]
pub struct StaticScanner {
    internal: Vec<ClassInfo>,
    by_path: HashMap<PathBuf, Vec<ClassInfo>>,
}

impl StaticScanner {
    /// Create an empty scanner
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the internal (no-path) class set
    pub fn with_internal(mut self, classes: Vec<ClassInfo>) -> Self {
        self.internal = classes;
        self
    }

    /// Associate a class set with a path
    pub fn with_path(mut self, path: impl Into<PathBuf>, classes: Vec<ClassInfo>) -> Self {
        self.by_path.insert(path.into(), classes);
        self
    }
}

#[async_trait]
impl ClassScanner for StaticScanner {
    async fn scan(&self, paths: &[PathBuf]) -> Result<Vec<ClassInfo>> {
        let mut classes = Vec::new();
        for path in paths {
            if let Some(found) = self.by_path.get(path) {
                classes.extend(found.iter().cloned());
            }
        }
        Ok(classes)
    }

    async fn scan_internal(&self) -> Result<Vec<ClassInfo>> {
        Ok(self.internal.clone())
    }
}

/// Scanner that reads `*.json` class-metadata manifests
///
/// Each manifest holds a JSON array of class records. A path may be a
/// manifest file or a directory of manifests; malformed manifests are
/// logged and skipped so one bad file cannot hide the rest.
#[derive(Debug, Default)]
pub struct ManifestScanner {
    internal_paths: Vec<PathBuf>,
}

impl ManifestScanner {
    /// Create a scanner with no internal paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path scanned by [`ClassScanner::scan_internal`]
    pub fn with_internal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.internal_paths.push(path.into());
        self
    }

    async fn scan_path(path: &Path, classes: &mut Vec<ClassInfo>) -> Result<()> {
        if path.is_dir() {
            let mut entries = tokio::fs::read_dir(path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let entry_path = entry.path();
                if entry_path.extension().and_then(|e| e.to_str()) == Some("json") {
                    Self::read_manifest(&entry_path, classes).await;
                }
            }
        } else {
            Self::read_manifest(path, classes).await;
        }
        Ok(())
    }

    async fn read_manifest(path: &Path, classes: &mut Vec<ClassInfo>) {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read manifest");
                return;
            }
        };
        match serde_json::from_str::<Vec<ClassInfo>>(&content) {
            Ok(mut found) => {
                for class in &mut found {
                    class.location.get_or_insert_with(|| path.to_path_buf());
                }
                debug!(path = %path.display(), classes = found.len(), "Manifest scanned");
                classes.extend(found);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed manifest skipped");
            }
        }
    }
}

#[async_trait]
impl ClassScanner for ManifestScanner {
    async fn scan(&self, paths: &[PathBuf]) -> Result<Vec<ClassInfo>> {
        let mut classes = Vec::new();
        for path in paths {
            Self::scan_path(path, &mut classes).await?;
        }
        Ok(classes)
    }

    async fn scan_internal(&self) -> Result<Vec<ClassInfo>> {
        self.scan(&self.internal_paths).await
    }
}
