//! Runtime class keys and host type resolution

use crate::error::Result;
use crate::plugin::PluginVtable;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identity of a concrete runtime class
///
/// Pairs the `TypeId` of a Rust type with its type name. Value-class
/// assignability is type identity; subtype relations between declared
/// type names are answered by the metadata graph, not by `ClassKey`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassKey {
    id: TypeId,
    name: &'static str,
}

impl ClassKey {
    /// Key for the type `T`
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The type id
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a value of class `other` can be passed where `self` is declared
    pub fn accepts(&self, other: &ClassKey) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassKey").field(&self.name).finish()
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Boxed instance produced by a zero-argument constructor
pub type Instance = Box<dyn Any + Send + Sync>;

/// Zero-argument constructor for a class
pub type Constructor = Arc<dyn Fn() -> Result<Instance> + Send + Sync>;

/// A materialized class: constructor plus optional plugin capability
///
/// This is what a [`ClassResolver`] yields for a type name. A class that
/// can be constructed but carries no vtable does not satisfy the plugin
/// capability.
#[derive(Clone)]
pub struct ClassDef {
    name: String,
    class: ClassKey,
    constructor: Constructor,
    vtable: Option<Arc<PluginVtable>>,
}

impl ClassDef {
    /// Define a class for `T` with the given fully qualified name and constructor
    pub fn of<T, F>(name: impl Into<String>, constructor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            class: ClassKey::of::<T>(),
            constructor: Arc::new(move || constructor().map(|v| Box::new(v) as Instance)),
            vtable: None,
        }
    }

    /// Attach the plugin capability vtable
    pub fn with_vtable(mut self, vtable: Arc<PluginVtable>) -> Self {
        self.vtable = Some(vtable);
        self
    }

    /// Fully qualified class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key of the constructed type
    pub fn class(&self) -> &ClassKey {
        &self.class
    }

    /// Construct a fresh instance
    pub fn construct(&self) -> Result<Instance> {
        (self.constructor)()
    }

    /// The plugin capability vtable, if the class is a plugin
    pub fn vtable(&self) -> Option<&Arc<PluginVtable>> {
        self.vtable.as_ref()
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("plugin", &self.vtable.is_some())
            .finish()
    }
}

/// Host-side type resolution, parent-first
pub trait ClassResolver: Send + Sync {
    /// Resolve a fully qualified type name to a class definition
    fn resolve(&self, name: &str) -> Option<Arc<ClassDef>>;
}

/// Resolver backed by a fixed name → class map
#[derive(Debug, Default)]
pub struct StaticResolver {
    defs: HashMap<String, Arc<ClassDef>>,
}

impl StaticResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class definition, keyed by its name
    pub fn with(mut self, def: ClassDef) -> Self {
        self.defs.insert(def.name().to_string(), Arc::new(def));
        self
    }

    /// Insert a class definition
    pub fn insert(&mut self, def: ClassDef) {
        self.defs.insert(def.name().to_string(), Arc::new(def));
    }
}

impl ClassResolver for StaticResolver {
    fn resolve(&self, name: &str) -> Option<Arc<ClassDef>> {
        self.defs.get(name).cloned()
    }
}
