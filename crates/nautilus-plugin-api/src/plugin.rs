//! Plugin instances and capability vtables
//!
//! A plugin type declares its handlers by building a [`PluginVtable`] at
//! registration time; the runtime pairs a constructed instance with that
//! vtable in a [`Plugin`]. Handler views and the event-name map are
//! derived once per instance and cached.

use crate::class::Instance;
use crate::dependency::Dependency;
use crate::dependency_manager::DependencyManager;
use crate::error::{PluginError, Result};
use crate::handler::HandlerSpec;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Capability vtable of a plugin type
///
/// Holds the flattened, ordered handler set of the type. Built once per
/// type and shared by every instance.
pub struct PluginVtable {
    handlers: Vec<Arc<HandlerSpec>>,
    new_instance_per_event: bool,
}

impl PluginVtable {
    /// Start building a vtable
    pub fn builder() -> VtableBuilder {
        VtableBuilder {
            parents: Vec::new(),
            handlers: Vec::new(),
            new_instance_per_event: false,
        }
    }

    /// The flattened handler set, in declaration order
    pub fn handlers(&self) -> &[Arc<HandlerSpec>] {
        &self.handlers
    }

    /// Whether the type asked for a fresh instance per event
    ///
    /// Declared but not enforced by the runtime; the flag is surfaced to
    /// embedders as a hint.
    pub fn new_instance_per_event(&self) -> bool {
        self.new_instance_per_event
    }
}

impl fmt::Debug for PluginVtable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginVtable")
            .field("handlers", &self.handlers.len())
            .field("new_instance_per_event", &self.new_instance_per_event)
            .finish()
    }
}

/// Builder for [`PluginVtable`]
#[derive(Debug)]
pub struct VtableBuilder {
    parents: Vec<Arc<PluginVtable>>,
    handlers: Vec<Arc<HandlerSpec>>,
    new_instance_per_event: bool,
}

impl VtableBuilder {
    /// Inherit the handlers of an ancestor vtable
    ///
    /// May be called once per inherited supertype. Ancestor handlers are
    /// carried into the flattened set; a handler declared here with the
    /// same method name replaces the inherited one, and among ancestors
    /// the first declaration of a method name wins.
    pub fn extends(mut self, parent: Arc<PluginVtable>) -> Self {
        self.parents.push(parent);
        self
    }

    /// Declare a handler method
    pub fn handler(mut self, handler: HandlerSpec) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Mark the type as per-event-transient (hint only)
    pub fn new_instance_per_event(mut self) -> Self {
        self.new_instance_per_event = true;
        self
    }

    /// Flatten and finish the vtable
    pub fn build(self) -> Arc<PluginVtable> {
        let shadowed = |handlers: &[Arc<HandlerSpec>], method: &str| {
            handlers.iter().any(|h| h.method() == method)
        };

        let mut handlers: Vec<Arc<HandlerSpec>> = Vec::new();
        for parent in &self.parents {
            for inherited in parent.handlers() {
                if !shadowed(&handlers, inherited.method())
                    && !shadowed(&self.handlers, inherited.method())
                {
                    handlers.push(inherited.clone());
                }
            }
        }
        handlers.extend(self.handlers);

        Arc::new(PluginVtable {
            handlers,
            new_instance_per_event: self.new_instance_per_event,
        })
    }
}

/// A constructed plugin instance known to a manager by its type name
pub struct Plugin {
    name: String,
    instance: Mutex<Instance>,
    vtable: Arc<PluginVtable>,
    deps: OnceLock<Arc<DependencyManager>>,
    init_handlers: OnceLock<Vec<Arc<HandlerSpec>>>,
    destroy_handlers: OnceLock<Vec<Arc<HandlerSpec>>>,
    event_handlers: OnceLock<Vec<Arc<HandlerSpec>>>,
    events_handlers: OnceLock<Vec<Arc<HandlerSpec>>>,
    event_map: OnceLock<HashMap<String, Vec<Arc<HandlerSpec>>>>,
}

impl Plugin {
    /// Pair a constructed instance with its type's vtable
    pub fn new(name: impl Into<String>, instance: Instance, vtable: Arc<PluginVtable>) -> Self {
        Self {
            name: name.into(),
            instance: Mutex::new(instance),
            vtable,
            deps: OnceLock::new(),
            init_handlers: OnceLock::new(),
            destroy_handlers: OnceLock::new(),
            event_handlers: OnceLock::new(),
            events_handlers: OnceLock::new(),
            event_map: OnceLock::new(),
        }
    }

    /// Fully qualified type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type's capability vtable
    pub fn vtable(&self) -> &Arc<PluginVtable> {
        &self.vtable
    }

    /// Assign the manager back-reference
    ///
    /// The first assignment wins; any later assignment fails.
    pub fn attach(&self, deps: Arc<DependencyManager>) -> Result<()> {
        self.deps
            .set(deps)
            .map_err(|_| PluginError::failure(format!("plugin {} is already attached", self.name)))
    }

    /// Whether the back-reference has been assigned
    pub fn is_attached(&self) -> bool {
        self.deps.get().is_some()
    }

    /// Publish a dependency under a generated name
    pub fn register<T: Any + Send + Sync>(&self, value: T) -> Result<Dependency> {
        self.global()?.add(value)
    }

    /// Publish a dependency under the given name
    pub fn register_named<T: Any + Send + Sync>(
        &self,
        name: impl Into<String>,
        value: T,
    ) -> Result<Dependency> {
        self.global()?.add_named(name, value)
    }

    /// Run a closure against the typed instance state
    pub fn with_state<S: Any + Send + Sync, R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R> {
        let mut guard = self.instance.lock();
        let state = guard.downcast_mut::<S>().ok_or_else(|| {
            PluginError::failure(format!(
                "plugin {} does not hold state of type {}",
                self.name,
                std::any::type_name::<S>()
            ))
        })?;
        Ok(f(state))
    }

    /// Handlers carrying the init marker, in declaration order
    pub fn init_handlers(&self) -> &[Arc<HandlerSpec>] {
        self.init_handlers
            .get_or_init(|| self.filtered(HandlerSpec::is_init))
    }

    /// Handlers carrying the destroy marker, in declaration order
    pub fn destroy_handlers(&self) -> &[Arc<HandlerSpec>] {
        self.destroy_handlers
            .get_or_init(|| self.filtered(HandlerSpec::is_destroy))
    }

    /// Handlers carrying a single-event marker
    pub fn event_handlers(&self) -> &[Arc<HandlerSpec>] {
        self.event_handlers
            .get_or_init(|| self.filtered(HandlerSpec::has_event_marker))
    }

    /// Handlers carrying a multi-event marker
    pub fn events_handlers(&self) -> &[Arc<HandlerSpec>] {
        self.events_handlers
            .get_or_init(|| self.filtered(HandlerSpec::has_events_marker))
    }

    /// Event name → handlers, one entry per method per distinct name
    pub fn event_method_map(&self) -> &HashMap<String, Vec<Arc<HandlerSpec>>> {
        self.event_map.get_or_init(|| {
            let mut map: HashMap<String, Vec<Arc<HandlerSpec>>> = HashMap::new();
            for handler in self.vtable.handlers() {
                for name in handler.event_names() {
                    map.entry(name.to_string()).or_default().push(handler.clone());
                }
            }
            map
        })
    }

    /// Handlers bound under the given event name, in declaration order
    pub fn handlers_for_event(&self, event: &str) -> &[Arc<HandlerSpec>] {
        match self.event_method_map().get(event) {
            Some(handlers) => handlers.as_slice(),
            None => &[],
        }
    }

    fn filtered(&self, keep: impl Fn(&HandlerSpec) -> bool) -> Vec<Arc<HandlerSpec>> {
        self.vtable
            .handlers()
            .iter()
            .filter(|h| keep(h))
            .cloned()
            .collect()
    }

    fn global(&self) -> Result<&Arc<DependencyManager>> {
        self.deps
            .get()
            .ok_or_else(|| PluginError::not_attached(&self.name))
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("attached", &self.is_attached())
            .field("handlers", &self.vtable.handlers().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerCx, HandlerValue};

    struct Recorder {
        calls: Vec<&'static str>,
    }

    fn noop(method: &str) -> HandlerSpec {
        HandlerSpec::builder(method)
            .init()
            .run(|_cx: HandlerCx<Recorder>, _args| async { Ok(HandlerValue::none()) })
    }

    fn event_spec(method: &str, names: &[&str]) -> HandlerSpec {
        let mut builder = HandlerSpec::builder(method);
        for name in names {
            builder = builder.on_event(*name);
        }
        builder.run(|_cx: HandlerCx<Recorder>, _args| async { Ok(HandlerValue::none()) })
    }

    fn plugin_with(vtable: Arc<PluginVtable>) -> Plugin {
        Plugin::new(
            "test.Recorder",
            Box::new(Recorder { calls: Vec::new() }),
            vtable,
        )
    }

    #[test]
    fn test_attach_exactly_once() {
        let plugin = plugin_with(PluginVtable::builder().build());
        assert!(!plugin.is_attached());

        plugin.attach(Arc::new(DependencyManager::new())).unwrap();
        assert!(plugin.is_attached());

        let err = plugin.attach(Arc::new(DependencyManager::new())).unwrap_err();
        assert!(matches!(err, PluginError::Failure(_)));
    }

    #[test]
    fn test_register_requires_attachment() {
        let plugin = plugin_with(PluginVtable::builder().build());

        let err = plugin.register(1u32).unwrap_err();
        assert!(matches!(err, PluginError::PluginNotAttached(_)));

        let deps = Arc::new(DependencyManager::new());
        plugin.attach(deps.clone()).unwrap();
        plugin.register_named("n", 1u32).unwrap();
        assert!(deps.find("n").is_some());
    }

    #[test]
    fn test_with_state() {
        let plugin = plugin_with(PluginVtable::builder().build());

        plugin
            .with_state(|r: &mut Recorder| r.calls.push("seen"))
            .unwrap();
        let calls = plugin.with_state(|r: &mut Recorder| r.calls.len()).unwrap();
        assert_eq!(calls, 1);

        assert!(plugin.with_state(|_: &mut String| ()).is_err());
    }

    #[test]
    fn test_handler_views() {
        let vtable = PluginVtable::builder()
            .handler(noop("first"))
            .handler(
                HandlerSpec::builder("last")
                    .destroy()
                    .run(|_cx: HandlerCx<Recorder>, _args| async { Ok(HandlerValue::none()) }),
            )
            .handler(noop("second"))
            .build();
        let plugin = plugin_with(vtable);

        let init: Vec<&str> = plugin.init_handlers().iter().map(|h| h.method()).collect();
        assert_eq!(init, ["first", "second"]);
        assert_eq!(plugin.destroy_handlers().len(), 1);
        assert!(plugin.event_handlers().is_empty());
    }

    #[test]
    fn test_event_method_map_fanout() {
        let both = HandlerSpec::builder("both")
            .on_event("e2")
            .on_events(["e2", "e3"])
            .run(|_cx: HandlerCx<Recorder>, _args| async { Ok(HandlerValue::none()) });

        let vtable = PluginVtable::builder()
            .handler(event_spec("single", &["e1"]))
            .handler(both)
            .build();
        let plugin = plugin_with(vtable);

        assert_eq!(plugin.handlers_for_event("e1").len(), 1);
        // a method carrying both markers collapses to one entry per name
        assert_eq!(plugin.handlers_for_event("e2").len(), 1);
        assert_eq!(plugin.handlers_for_event("e3").len(), 1);
        assert!(plugin.handlers_for_event("e4").is_empty());

        assert_eq!(plugin.event_handlers().len(), 2);
        assert_eq!(plugin.events_handlers().len(), 1);
    }

    #[test]
    fn test_marker_inheritance() {
        let base = PluginVtable::builder()
            .handler(noop("inherited"))
            .handler(noop("overridden"))
            .build();

        let derived = PluginVtable::builder()
            .extends(base)
            .handler(noop("overridden"))
            .handler(noop("own"))
            .build();

        let methods: Vec<&str> = derived.handlers().iter().map(|h| h.method()).collect();
        assert_eq!(methods, ["inherited", "overridden", "own"]);
        assert_eq!(derived.handlers().len(), 3);
    }

    #[test]
    fn test_multiple_inherited_supertypes() {
        let a = PluginVtable::builder()
            .handler(noop("from_a"))
            .handler(noop("shared"))
            .build();
        let b = PluginVtable::builder()
            .handler(noop("from_b"))
            .handler(noop("shared"))
            .build();

        let merged = PluginVtable::builder()
            .extends(a)
            .extends(b)
            .handler(noop("own"))
            .build();

        let methods: Vec<&str> = merged.handlers().iter().map(|h| h.method()).collect();
        assert_eq!(methods, ["from_a", "shared", "from_b", "own"]);
    }

    #[test]
    fn test_per_event_hint() {
        let vtable = PluginVtable::builder().new_instance_per_event().build();
        assert!(vtable.new_instance_per_event());
        assert!(!PluginVtable::builder().build().new_instance_per_event());
    }
}
