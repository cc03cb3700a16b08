//! # Nautilus Plugin API
//!
//! This crate provides the SDK for authoring Nautilus plugins and for
//! embedding the plugin runtime in a host.
//!
//! A plugin type is described by a capability vtable built at
//! registration time: each handler method carries declarative markers
//! (`init`, `destroy`, `event`, `events`) and parameter descriptors that
//! the runtime resolves against a dependency registry on every
//! invocation.
//!
//! ## Example
//!
//! ```rust
//! use nautilus_plugin_api::prelude::*;
//!
//! #[derive(Default)]
//! struct Greeter {
//!     greeted: usize,
//! }
//!
//! let vtable = PluginVtable::builder()
//!     .handler(
//!         HandlerSpec::builder("greet")
//!             .init()
//!             .named_param::<String>("who")
//!             .run(|cx: HandlerCx<Greeter>, args| async move {
//!                 let who: &String = args.get(0)?;
//!                 println!("hello {who}");
//!                 cx.state(|g| g.greeted += 1)?;
//!                 Ok(HandlerValue::none())
//!             }),
//!     )
//!     .build();
//!
//! let class = ClassDef::of("demo.Greeter", || Ok(Greeter::default())).with_vtable(vtable);
//! # let _ = class;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod class;
pub mod dependency;
pub mod dependency_manager;
pub mod error;
pub mod handler;
pub mod markers;
pub mod metadata;
pub mod plugin;

// Re-export commonly used types
pub use class::{ClassDef, ClassKey, ClassResolver, Constructor, Instance, StaticResolver};
pub use dependency::{DepValue, Dependency};
pub use dependency_manager::DependencyManager;
pub use error::PluginError;
pub use handler::{
    Args, HandlerBuilder, HandlerCx, HandlerFn, HandlerFuture, HandlerResult, HandlerSpec,
    HandlerValue, ParamSpec,
};
pub use markers::{Marker, PLUGIN_TYPE};
pub use metadata::{class_index, ClassInfo, MethodInfo, ParamInfo, TypeRelations};
pub use plugin::{Plugin, PluginVtable, VtableBuilder};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::class::{ClassDef, ClassKey, ClassResolver, StaticResolver};
    pub use crate::dependency::Dependency;
    pub use crate::dependency_manager::DependencyManager;
    pub use crate::error::PluginError;
    pub use crate::handler::{Args, HandlerCx, HandlerSpec, HandlerValue};
    pub use crate::markers::{Marker, PLUGIN_TYPE};
    pub use crate::metadata::ClassInfo;
    pub use crate::plugin::{Plugin, PluginVtable};
}
