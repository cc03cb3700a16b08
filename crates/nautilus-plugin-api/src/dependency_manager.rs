//! Registry of named dependencies
//!
//! The registry is a concurrent `name → Dependency` map that remembers
//! insertion order: every query and snapshot returns entries in the order
//! they were added, and the unnamed parameter resolver picks the last one.
//! A shared [`DependencyManager::empty`] sentinel silently discards all
//! additions and is used wherever a scoped registry is optional.

use crate::class::{ClassKey, ClassResolver};
use crate::dependency::Dependency;
use crate::error::{PluginError, Result};
use crate::metadata::{ClassInfo, TypeRelations};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

static EMPTY: Lazy<Arc<DependencyManager>> = Lazy::new(|| {
    Arc::new(DependencyManager {
        entries: DashMap::new(),
        seq: AtomicU64::new(0),
        relations: parking_lot::RwLock::new(TypeRelations::new()),
        discard: true,
    })
});

#[derive(Debug, Clone)]
struct Registered {
    seq: u64,
    dep: Dependency,
}

/// Insertion-ordered concurrent dependency registry
#[derive(Debug)]
pub struct DependencyManager {
    entries: DashMap<String, Registered>,
    seq: AtomicU64,
    relations: parking_lot::RwLock<TypeRelations>,
    discard: bool,
}

impl DependencyManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            seq: AtomicU64::new(0),
            relations: parking_lot::RwLock::new(TypeRelations::new()),
            discard: false,
        }
    }

    /// The shared sentinel that accepts and discards all additions
    pub fn empty() -> Arc<DependencyManager> {
        EMPTY.clone()
    }

    /// Whether this is the discard sentinel
    pub fn is_discard(&self) -> bool {
        self.discard
    }

    /// Register a value under a freshly generated unique name
    pub fn add<T: Any + Send + Sync>(&self, value: T) -> Result<Dependency> {
        let dep = Dependency::of(Uuid::new_v4().to_string(), value)?;
        self.add_dependency(dep.clone())?;
        Ok(dep)
    }

    /// Register a value under the given name
    pub fn add_named<T: Any + Send + Sync>(
        &self,
        name: impl Into<String>,
        value: T,
    ) -> Result<Dependency> {
        let dep = Dependency::of(name, value)?;
        self.add_dependency(dep.clone())?;
        Ok(dep)
    }

    /// Register a prebuilt dependency
    ///
    /// Fails with [`PluginError::DuplicateDependency`] when the name is
    /// already bound. On the discard sentinel this is a successful no-op.
    pub fn add_dependency(&self, dep: Dependency) -> Result<()> {
        if self.discard {
            return Ok(());
        }
        match self.entries.entry(dep.name().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(PluginError::duplicate_dependency(dep.name()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                debug!(
                    name = %dep.name(),
                    class = %dep.value_class(),
                    "Dependency registered"
                );
                slot.insert(Registered { seq, dep });
                Ok(())
            }
        }
    }

    /// Look up a dependency by name
    pub fn find(&self, name: &str) -> Option<Dependency> {
        self.entries.get(name).map(|e| e.dep.clone())
    }

    /// All dependencies whose abstract type is a declared subtype of `type_name`
    pub fn find_by_type(&self, type_name: &str) -> Vec<Dependency> {
        let relations = self.relations.read();
        self.sorted(|r| relations.is_subtype(r.dep.abstract_type(), type_name))
    }

    /// All dependencies whose abstract type materializes to a class
    /// assignable to `class`
    ///
    /// Each entry's abstract type name is resolved through the host
    /// resolver; entries whose name does not resolve are skipped.
    pub fn find_by_type_class(&self, class: &ClassKey, resolver: &dyn ClassResolver) -> Vec<Dependency> {
        self.sorted(|r| {
            resolver
                .resolve(r.dep.abstract_type())
                .is_some_and(|def| class.accepts(def.class()))
        })
    }

    /// All dependencies whose value class is assignable to `class`,
    /// in insertion order
    pub fn find_by_value_class(&self, class: &ClassKey) -> Vec<Dependency> {
        self.sorted(|r| class.accepts(r.dep.value_class()))
    }

    /// Remove the dependency bound under `name`
    pub fn remove(&self, name: &str) -> Option<Dependency> {
        self.entries.remove(name).map(|(_, r)| r.dep)
    }

    /// Remove every dependency matched by [`Self::find_by_type`]
    pub fn remove_by_type(&self, type_name: &str) -> Vec<Dependency> {
        self.remove_all(self.find_by_type(type_name))
    }

    /// Remove every dependency matched by [`Self::find_by_type_class`]
    pub fn remove_by_type_class(
        &self,
        class: &ClassKey,
        resolver: &dyn ClassResolver,
    ) -> Vec<Dependency> {
        self.remove_all(self.find_by_type_class(class, resolver))
    }

    /// Remove every dependency matched by [`Self::find_by_value_class`]
    pub fn remove_by_value_class(&self, class: &ClassKey) -> Vec<Dependency> {
        self.remove_all(self.find_by_value_class(class))
    }

    /// Snapshot as a name → dependency map
    pub fn to_map(&self) -> HashMap<String, Dependency> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.dep.clone()))
            .collect()
    }

    /// Snapshot in insertion order
    pub fn to_seq(&self) -> Vec<Dependency> {
        self.sorted(|_| true)
    }

    /// Number of registered dependencies
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declare `sub` a direct subtype of `sup` for [`Self::find_by_type`]
    pub fn declare_subtype(&self, sub: impl Into<String>, sup: impl Into<String>) {
        self.relations.write().declare(sub, sup);
    }

    /// Absorb the type edges of scanned metadata into the subtype relation
    pub fn absorb_relations(&self, classes: &[ClassInfo]) {
        self.relations.write().absorb(classes);
    }

    fn sorted(&self, keep: impl Fn(&Registered) -> bool) -> Vec<Dependency> {
        let mut matched: Vec<Registered> = self
            .entries
            .iter()
            .filter(|e| keep(e.value()))
            .map(|e| e.value().clone())
            .collect();
        matched.sort_by_key(|r| r.seq);
        matched.into_iter().map(|r| r.dep).collect()
    }

    fn remove_all(&self, deps: Vec<Dependency>) -> Vec<Dependency> {
        deps.into_iter()
            .filter_map(|d| self.remove(d.name()))
            .collect()
    }
}

impl Default for DependencyManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find() {
        let manager = DependencyManager::new();
        manager.add_named("db", "postgres".to_string()).unwrap();

        let dep = manager.find("db").unwrap();
        assert_eq!(*dep.value_as::<String>().unwrap(), "postgres");
        assert!(manager.find("missing").is_none());
    }

    #[test]
    fn test_generated_names_are_unique() {
        let manager = DependencyManager::new();
        let a = manager.add(1u32).unwrap();
        let b = manager.add(2u32).unwrap();

        assert_ne!(a.name(), b.name());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let manager = DependencyManager::new();
        manager.add_named("db", 1u32).unwrap();

        let err = manager.add_named("db", 2u32).unwrap_err();
        assert!(matches!(err, PluginError::DuplicateDependency(_)));
        assert_eq!(*manager.find("db").unwrap().value_as::<u32>().unwrap(), 1);
    }

    #[test]
    fn test_find_by_value_class_insertion_order() {
        let manager = DependencyManager::new();
        manager.add_named("first", 1u32).unwrap();
        manager.add_named("other", "text".to_string()).unwrap();
        manager.add_named("second", 2u32).unwrap();

        let found = manager.find_by_value_class(&ClassKey::of::<u32>());
        let names: Vec<&str> = found.iter().map(|d| d.name()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn test_find_by_type_uses_relations() {
        let manager = DependencyManager::new();
        manager.declare_subtype("demo.Redis", "demo.Cache");

        manager
            .add_dependency(Dependency::with_abstract_type("r", "demo.Redis", 1u8).unwrap())
            .unwrap();
        manager
            .add_dependency(Dependency::with_abstract_type("m", "demo.Memcached", 2u8).unwrap())
            .unwrap();

        let found = manager.find_by_type("demo.Cache");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "r");

        // exact name always matches, even with no declared edges
        assert_eq!(manager.find_by_type("demo.Memcached").len(), 1);

        let removed = manager.remove_by_type("demo.Cache");
        assert_eq!(removed.len(), 1);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_find_by_type_class() {
        use crate::class::{ClassDef, StaticResolver};

        let resolver =
            StaticResolver::new().with(ClassDef::of("demo.Counter", || Ok(0u64)));

        let manager = DependencyManager::new();
        manager
            .add_dependency(Dependency::with_abstract_type("c", "demo.Counter", 7u64).unwrap())
            .unwrap();
        manager
            .add_dependency(Dependency::with_abstract_type("u", "demo.Unresolved", 8u64).unwrap())
            .unwrap();

        let found = manager.find_by_type_class(&ClassKey::of::<u64>(), &resolver);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "c");

        assert!(manager
            .find_by_type_class(&ClassKey::of::<u32>(), &resolver)
            .is_empty());
    }

    #[test]
    fn test_remove_variants() {
        let manager = DependencyManager::new();
        manager.add_named("a", 1u32).unwrap();
        manager.add_named("b", 2u32).unwrap();
        manager.add_named("c", "x".to_string()).unwrap();

        assert_eq!(manager.remove("a").unwrap().name(), "a");
        assert!(manager.remove("a").is_none());

        let removed = manager.remove_by_value_class(&ClassKey::of::<u32>());
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].name(), "b");
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_snapshots() {
        let manager = DependencyManager::new();
        manager.add_named("z", 1u32).unwrap();
        manager.add_named("a", 2u32).unwrap();

        let seq = manager.to_seq();
        let names: Vec<&str> = seq.iter().map(|d| d.name()).collect();
        assert_eq!(names, ["z", "a"]);

        let map = manager.to_map();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("z"));
    }

    #[test]
    fn test_empty_sentinel_discards() {
        let empty = DependencyManager::empty();
        assert!(empty.is_discard());

        empty.add_named("x", 1u32).unwrap();
        empty
            .add_dependency(Dependency::of("y", 2u32).unwrap())
            .unwrap();

        assert!(empty.find("x").is_none());
        assert!(empty.is_empty());
    }
}
