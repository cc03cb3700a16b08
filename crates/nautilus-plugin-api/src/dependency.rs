//! Named, typed dependency values

use crate::class::ClassKey;
use crate::error::{PluginError, Result};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased dependency value
pub type DepValue = Arc<dyn Any + Send + Sync>;

/// An immutable named binding in a dependency registry
///
/// `abstract_type` is the declared type of the binding and drives the
/// name-graph subtype queries; `value_class` is the concrete class of the
/// stored value and drives assignability during parameter resolution.
/// The two may differ.
#[derive(Clone)]
pub struct Dependency {
    name: String,
    abstract_type: String,
    value: DepValue,
    value_class: ClassKey,
}

impl Dependency {
    /// Bind `value` under `name` with its concrete type as the abstract type
    pub fn of<T: Any + Send + Sync>(name: impl Into<String>, value: T) -> Result<Self> {
        Self::from_parts(
            name.into(),
            std::any::type_name::<T>().to_string(),
            Arc::new(value),
            ClassKey::of::<T>(),
        )
    }

    /// Bind `value` under `name`, declaring a supertype name for the binding
    pub fn with_abstract_type<T: Any + Send + Sync>(
        name: impl Into<String>,
        abstract_type: impl Into<String>,
        value: T,
    ) -> Result<Self> {
        Self::from_parts(
            name.into(),
            abstract_type.into(),
            Arc::new(value),
            ClassKey::of::<T>(),
        )
    }

    fn from_parts(
        name: String,
        abstract_type: String,
        value: DepValue,
        value_class: ClassKey,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(PluginError::bad_dependency("empty name"));
        }
        if abstract_type.is_empty() {
            return Err(PluginError::bad_dependency("empty abstract type"));
        }
        Ok(Self {
            name,
            abstract_type,
            value,
            value_class,
        })
    }

    /// The unique binding name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type of the binding
    pub fn abstract_type(&self) -> &str {
        &self.abstract_type
    }

    /// The stored value
    pub fn value(&self) -> &DepValue {
        &self.value
    }

    /// The concrete class of the stored value
    pub fn value_class(&self) -> &ClassKey {
        &self.value_class
    }

    /// Downcast the stored value
    pub fn value_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("name", &self.name)
            .field("abstract_type", &self.abstract_type)
            .field("value_class", &self.value_class)
            .finish()
    }
}
