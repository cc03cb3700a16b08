//! Handler descriptors and invocation plumbing
//!
//! A handler is described by a [`HandlerSpec`]: its method name, the
//! markers it carries, its parameter descriptors, and a type-erased
//! invocation function. Arguments are resolved by the runtime as opaque
//! references and downcast once, inside the handler body, through
//! [`Args`].

use crate::class::ClassKey;
use crate::dependency::{DepValue, Dependency};
use crate::error::{PluginError, Result};
use crate::markers::Marker;
use crate::plugin::Plugin;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

/// Value produced by a handler invocation
#[derive(Clone, Default)]
pub struct HandlerValue(Option<DepValue>);

impl HandlerValue {
    /// A handler that produces nothing
    pub fn none() -> Self {
        Self(None)
    }

    /// Wrap a produced value
    pub fn of<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    /// Downcast the produced value
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.as_ref().and_then(|v| v.clone().downcast::<T>().ok())
    }

    /// Whether a value was produced
    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for HandlerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerValue")
            .field(&self.0.is_some())
            .finish()
    }
}

/// Outcome of a single handler invocation
pub type HandlerResult = Result<HandlerValue>;

/// Boxed future returned by a handler invocation
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>;

/// Type-erased handler invocation function
pub type HandlerFn = Arc<dyn Fn(Arc<Plugin>, Args) -> HandlerFuture + Send + Sync>;

/// A declared handler parameter: its class and optional forced name
#[derive(Debug, Clone)]
pub struct ParamSpec {
    class: ClassKey,
    dep_name: Option<String>,
}

impl ParamSpec {
    /// An unnamed parameter of class `T`, resolved by value class
    pub fn of<T: Any>() -> Self {
        Self {
            class: ClassKey::of::<T>(),
            dep_name: None,
        }
    }

    /// A parameter of class `T` forced to named resolution
    pub fn named<T: Any>(name: impl Into<String>) -> Self {
        Self {
            class: ClassKey::of::<T>(),
            dep_name: Some(name.into()),
        }
    }

    /// Declared parameter class
    pub fn class(&self) -> &ClassKey {
        &self.class
    }

    /// Forced dependency name, if any
    pub fn dep_name(&self) -> Option<&str> {
        self.dep_name.as_deref()
    }
}

/// Resolved arguments handed to a handler body
#[derive(Clone)]
pub struct Args {
    values: Vec<DepValue>,
}

impl Args {
    /// Wrap resolved argument values, in parameter order
    pub fn new(values: Vec<DepValue>) -> Self {
        Self { values }
    }

    /// No arguments
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the argument at `index` as a `T`
    pub fn get<T: Any>(&self, index: usize) -> Result<&T> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| PluginError::failure(format!("no argument at index {index}")))?;
        value.downcast_ref::<T>().ok_or_else(|| {
            PluginError::failure(format!(
                "argument {index} is not a {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Clone the argument at `index` out as a shared `T`
    pub fn get_arc<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| PluginError::failure(format!("no argument at index {index}")))?;
        value.clone().downcast::<T>().map_err(|_| {
            PluginError::failure(format!(
                "argument {index} is not a {}",
                std::any::type_name::<T>()
            ))
        })
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args").field("len", &self.values.len()).finish()
    }
}

/// Context handed to a handler body
///
/// Grants typed access to the plugin's state and lets the body publish
/// dependencies for peer handlers through the plugin's back-reference.
pub struct HandlerCx<S> {
    plugin: Arc<Plugin>,
    _state: PhantomData<fn() -> S>,
}

impl<S: Any + Send + Sync> HandlerCx<S> {
    pub(crate) fn new(plugin: Arc<Plugin>) -> Self {
        Self {
            plugin,
            _state: PhantomData,
        }
    }

    /// Name of the plugin being invoked
    pub fn plugin_name(&self) -> &str {
        self.plugin.name()
    }

    /// Run a closure against the plugin's typed state
    pub fn state<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R> {
        self.plugin.with_state(f)
    }

    /// Publish a dependency under a generated name
    pub fn register<T: Any + Send + Sync>(&self, value: T) -> Result<Dependency> {
        self.plugin.register(value)
    }

    /// Publish a dependency under the given name
    pub fn register_named<T: Any + Send + Sync>(
        &self,
        name: impl Into<String>,
        value: T,
    ) -> Result<Dependency> {
        self.plugin.register_named(name, value)
    }
}

impl<S> fmt::Debug for HandlerCx<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerCx")
            .field("plugin", &self.plugin.name())
            .finish()
    }
}

/// A handler method descriptor
pub struct HandlerSpec {
    method: String,
    markers: Vec<Marker>,
    params: Vec<ParamSpec>,
    invoke: HandlerFn,
}

impl HandlerSpec {
    /// Start describing a handler method
    pub fn builder(method: impl Into<String>) -> HandlerBuilder {
        HandlerBuilder {
            method: method.into(),
            markers: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Method name
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Markers carried by the method
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Declared parameters in order
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Whether the method carries the init marker
    pub fn is_init(&self) -> bool {
        self.markers.iter().any(Marker::is_init)
    }

    /// Whether the method carries the destroy marker
    pub fn is_destroy(&self) -> bool {
        self.markers.iter().any(Marker::is_destroy)
    }

    /// Whether the method carries a single-event marker
    pub fn has_event_marker(&self) -> bool {
        self.markers.iter().any(|m| matches!(m, Marker::Event(_)))
    }

    /// Whether the method carries a multi-event marker
    pub fn has_events_marker(&self) -> bool {
        self.markers.iter().any(|m| matches!(m, Marker::Events(_)))
    }

    /// Distinct event names the method is bound under, in declaration order
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for marker in &self.markers {
            for name in marker.event_names() {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Invoke the handler with resolved arguments
    pub fn invoke(&self, plugin: Arc<Plugin>, args: Args) -> HandlerFuture {
        (self.invoke)(plugin, args)
    }
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("method", &self.method)
            .field("markers", &self.markers)
            .field("params", &self.params.len())
            .finish()
    }
}

/// Builder for [`HandlerSpec`]
#[derive(Debug)]
pub struct HandlerBuilder {
    method: String,
    markers: Vec<Marker>,
    params: Vec<ParamSpec>,
}

impl HandlerBuilder {
    /// Mark the method as an init handler
    pub fn init(mut self) -> Self {
        self.markers.push(Marker::Init);
        self
    }

    /// Mark the method as a destroy handler
    pub fn destroy(mut self) -> Self {
        self.markers.push(Marker::Destroy);
        self
    }

    /// Bind the method to a single event
    pub fn on_event(mut self, name: impl Into<String>) -> Self {
        self.markers.push(Marker::Event(name.into()));
        self
    }

    /// Bind the method to several events
    ///
    /// # Panics
    ///
    /// Panics when `names` is empty.
    pub fn on_events<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        assert!(!names.is_empty(), "events marker requires at least one name");
        self.markers.push(Marker::Events(names));
        self
    }

    /// Declare an unnamed parameter of class `T`
    pub fn param<T: Any>(mut self) -> Self {
        self.params.push(ParamSpec::of::<T>());
        self
    }

    /// Declare a parameter of class `T` forced to named resolution
    pub fn named_param<T: Any>(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec::named::<T>(name));
        self
    }

    /// Finish the descriptor with the handler body
    ///
    /// The body receives a [`HandlerCx`] typed to the plugin state `S`
    /// and the resolved [`Args`] in parameter order.
    pub fn run<S, F, Fut>(self, body: F) -> HandlerSpec
    where
        S: Any + Send + Sync,
        F: Fn(HandlerCx<S>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        HandlerSpec {
            method: self.method,
            markers: self.markers,
            params: self.params,
            invoke: Arc::new(move |plugin, args| Box::pin(body(HandlerCx::new(plugin), args))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoState;

    fn spec(builder: HandlerBuilder) -> HandlerSpec {
        builder.run(|_cx: HandlerCx<NoState>, _args| async { Ok(HandlerValue::none()) })
    }

    #[test]
    fn test_builder_markers() {
        let handler = spec(
            HandlerSpec::builder("setup")
                .init()
                .param::<String>()
                .named_param::<u32>("count"),
        );

        assert_eq!(handler.method(), "setup");
        assert!(handler.is_init());
        assert!(!handler.is_destroy());
        assert_eq!(handler.params().len(), 2);
        assert!(handler.params()[0].dep_name().is_none());
        assert_eq!(handler.params()[1].dep_name(), Some("count"));
    }

    #[test]
    fn test_event_names_dedup_across_markers() {
        let handler = spec(
            HandlerSpec::builder("on_change")
                .on_event("e1")
                .on_events(["e1", "e2"]),
        );

        assert!(handler.has_event_marker());
        assert!(handler.has_events_marker());
        assert_eq!(handler.event_names(), ["e1", "e2"]);
    }

    #[test]
    #[should_panic(expected = "at least one name")]
    fn test_empty_events_marker_panics() {
        let _ = HandlerSpec::builder("bad").on_events(Vec::<String>::new());
    }

    #[test]
    fn test_args_downcast() {
        let args = Args::new(vec![
            Arc::new("hello".to_string()) as DepValue,
            Arc::new(7u32) as DepValue,
        ]);

        assert_eq!(args.len(), 2);
        assert_eq!(args.get::<String>(0).unwrap(), "hello");
        assert_eq!(*args.get_arc::<u32>(1).unwrap(), 7);

        assert!(matches!(
            args.get::<u32>(0),
            Err(PluginError::Failure(_))
        ));
        assert!(args.get::<u32>(5).is_err());
    }

    #[test]
    fn test_handler_value() {
        let value = HandlerValue::of(41u8);
        assert!(value.is_some());
        assert_eq!(*value.get::<u8>().unwrap(), 41);
        assert!(value.get::<u16>().is_none());
        assert!(!HandlerValue::none().is_some());
    }
}
