//! Scanned class metadata
//!
//! The metadata scanner (a host collaborator) reports declared types from
//! a set of archive or directory paths as [`ClassInfo`] records. The
//! searcher walks the superclass and interface edges of this graph; the
//! dependency manager derives its subtype relation from the same edges.

use crate::markers::Marker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A declared type as reported by the metadata scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Fully qualified type name
    pub name: String,

    /// Whether the type can be instantiated (not abstract, not an interface)
    #[serde(default)]
    pub is_concrete: bool,

    /// Direct supertype name, if declared
    #[serde(default)]
    pub super_class: Option<String>,

    /// Directly declared interface names
    #[serde(default)]
    pub interfaces: Vec<String>,

    /// Declared methods with their parameter types and markers
    #[serde(default)]
    pub methods: Vec<MethodInfo>,

    /// Where the type was found
    #[serde(default)]
    pub location: Option<PathBuf>,
}

impl ClassInfo {
    /// A concrete class with no supertype or interfaces
    pub fn concrete(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_concrete: true,
            super_class: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            location: None,
        }
    }

    /// An abstract class or interface
    pub fn abstract_type(name: impl Into<String>) -> Self {
        Self {
            is_concrete: false,
            ..Self::concrete(name)
        }
    }

    /// Set the direct supertype
    pub fn extends(mut self, super_class: impl Into<String>) -> Self {
        self.super_class = Some(super_class.into());
        self
    }

    /// Add a declared interface
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }
}

/// A declared method as reported by the metadata scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInfo {
    /// Method name
    pub name: String,

    /// Declared parameters in order
    #[serde(default)]
    pub params: Vec<ParamInfo>,

    /// Markers declared on the method
    #[serde(default)]
    pub markers: Vec<Marker>,
}

/// A declared method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamInfo {
    /// Declared parameter type name
    pub class_name: String,

    /// Forced dependency name, if annotated
    #[serde(default)]
    pub dep_name: Option<String>,
}

/// Index a class list by type name
pub fn class_index(classes: &[ClassInfo]) -> HashMap<String, ClassInfo> {
    classes
        .iter()
        .map(|c| (c.name.clone(), c.clone()))
        .collect()
}

/// Declared subtype relation between type names
///
/// Built from the superclass and interface edges of scanned metadata.
/// With no declared edges the relation degrades to name equality.
#[derive(Debug, Default)]
pub struct TypeRelations {
    supers: HashMap<String, Vec<String>>,
}

impl TypeRelations {
    /// Create an empty relation
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `sub` a direct subtype of `sup`
    pub fn declare(&mut self, sub: impl Into<String>, sup: impl Into<String>) {
        let sup = sup.into();
        let supers = self.supers.entry(sub.into()).or_default();
        if !supers.contains(&sup) {
            supers.push(sup);
        }
    }

    /// Absorb the superclass and interface edges of scanned classes
    pub fn absorb(&mut self, classes: &[ClassInfo]) {
        for class in classes {
            if let Some(sup) = &class.super_class {
                self.declare(class.name.clone(), sup.clone());
            }
            for interface in &class.interfaces {
                self.declare(class.name.clone(), interface.clone());
            }
        }
    }

    /// Whether `sub` reaches `sup` through declared edges
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        let mut seen = std::collections::HashSet::new();
        let mut frontier = vec![sub];
        while let Some(name) = frontier.pop() {
            if !seen.insert(name) {
                continue;
            }
            if let Some(supers) = self.supers.get(name) {
                for s in supers {
                    if s == sup {
                        return true;
                    }
                    frontier.push(s);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_info_builders() {
        let info = ClassInfo::concrete("demo.Cache")
            .extends("demo.Base")
            .implements("demo.Evictable");

        assert!(info.is_concrete);
        assert_eq!(info.super_class.as_deref(), Some("demo.Base"));
        assert_eq!(info.interfaces, ["demo.Evictable"]);

        assert!(!ClassInfo::abstract_type("demo.Base").is_concrete);
    }

    #[test]
    fn test_class_index() {
        let classes = vec![ClassInfo::concrete("a.A"), ClassInfo::concrete("b.B")];
        let index = class_index(&classes);
        assert_eq!(index.len(), 2);
        assert!(index.contains_key("a.A"));
    }

    #[test]
    fn test_relations_transitive() {
        let mut relations = TypeRelations::new();
        relations.declare("C", "B");
        relations.declare("B", "A");

        assert!(relations.is_subtype("C", "C"));
        assert!(relations.is_subtype("C", "B"));
        assert!(relations.is_subtype("C", "A"));
        assert!(!relations.is_subtype("A", "C"));
        assert!(!relations.is_subtype("C", "unrelated"));
    }

    #[test]
    fn test_relations_absorb() {
        let classes = vec![
            ClassInfo::concrete("demo.Redis")
                .extends("demo.Cache")
                .implements("demo.Closeable"),
            ClassInfo::abstract_type("demo.Cache").implements("demo.Store"),
        ];

        let mut relations = TypeRelations::new();
        relations.absorb(&classes);

        assert!(relations.is_subtype("demo.Redis", "demo.Store"));
        assert!(relations.is_subtype("demo.Redis", "demo.Closeable"));
    }

    #[test]
    fn test_relations_cycle_terminates() {
        let mut relations = TypeRelations::new();
        relations.declare("A", "B");
        relations.declare("B", "A");

        assert!(relations.is_subtype("A", "B"));
        assert!(!relations.is_subtype("A", "missing"));
    }

    #[test]
    fn test_class_info_serde() {
        let json = r#"{"name": "demo.Cache", "is_concrete": true, "interfaces": ["nautilus::Plugin"]}"#;
        let info: ClassInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.name, "demo.Cache");
        assert!(info.super_class.is_none());
        assert!(info.methods.is_empty());
    }
}
