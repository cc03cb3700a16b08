//! Plugin lifecycle orchestration and event dispatch
//!
//! The manager owns the active plugin set, the global dependency
//! registry, and the search/load pipeline. Lifecycle phases and events
//! are dispatched through the fixed-point invoker, so handlers may
//! depend on values that peer handlers in the same batch publish.

use crate::error::{Result, RuntimeError};
use crate::invoker::{self, Bundle};
use crate::loader::PluginLoader;
use crate::scan::{ClassScanner, StaticScanner};
use crate::searcher::PluginSearcher;
use dashmap::DashMap;
use nautilus_plugin_api::{
    ClassDef, ClassResolver, Dependency, DependencyManager, HandlerResult, HandlerSpec, Plugin,
    StaticResolver,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Orchestrates plugin loading, lifecycle, and event dispatch
#[derive(Debug)]
pub struct PluginManager {
    loader: PluginLoader,
    searcher: PluginSearcher,
    dependencies: Arc<DependencyManager>,
    internal_types: tokio::sync::OnceCell<Vec<(String, Arc<ClassDef>)>>,
    external_types: DashMap<String, Arc<ClassDef>>,
    active_plugins: DashMap<String, Arc<Plugin>>,
}

impl PluginManager {
    /// Create a manager over the given scanner and resolver
    pub fn new(scanner: Arc<dyn ClassScanner>, resolver: Arc<dyn ClassResolver>) -> Self {
        Self::builder().scanner(scanner).resolver(resolver).build()
    }

    /// Start building a manager
    pub fn builder() -> PluginManagerBuilder {
        PluginManagerBuilder::default()
    }

    /// The global dependency registry
    pub fn dependencies(&self) -> &Arc<DependencyManager> {
        &self.dependencies
    }

    /// The class loader
    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    /// Get an active plugin by type name
    pub fn get(&self, name: &str) -> Option<Arc<Plugin>> {
        self.active_plugins.get(name).map(|e| e.clone())
    }

    /// Whether a plugin with the given type name is active
    pub fn is_active(&self, name: &str) -> bool {
        self.active_plugins.contains_key(name)
    }

    /// Snapshot of the active plugins
    ///
    /// Iteration order over active plugins is not a contract.
    pub fn active_plugins(&self) -> Vec<Arc<Plugin>> {
        self.active_plugins.iter().map(|e| e.clone()).collect()
    }

    /// Number of active plugins
    pub fn plugin_count(&self) -> usize {
        self.active_plugins.len()
    }

    /// Names of externally admitted plugin types
    pub fn external_type_names(&self) -> Vec<String> {
        self.external_types.iter().map(|e| e.key().clone()).collect()
    }

    /// Construct and admit one plugin type
    ///
    /// Loading is idempotent: if a plugin with this type name is already
    /// active, the existing instance is returned. Construction failures
    /// surface as [`RuntimeError::LoadFailure`]; a constructible type
    /// without the plugin capability is [`RuntimeError::UnknownPluginType`].
    pub fn load_plugin(&self, name: &str, def: &ClassDef) -> Result<Arc<Plugin>> {
        if let Some(existing) = self.active_plugins.get(name) {
            return Ok(existing.clone());
        }

        let instance = def
            .construct()
            .map_err(|e| RuntimeError::load_failure(name, e))?;
        let vtable = def
            .vtable()
            .cloned()
            .ok_or_else(|| RuntimeError::unknown_plugin_type(name))?;

        let plugin = Arc::new(Plugin::new(name, instance, vtable));
        plugin.attach(self.dependencies.clone())?;

        match self.active_plugins.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => Ok(e.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(plugin.clone());
                info!(plugin = %name, "Plugin loaded");
                Ok(plugin)
            }
        }
    }

    /// Load all internal plugin types and run their init phase
    ///
    /// The internal type set is computed once, on the first call, from
    /// the searcher's no-path scan. Only plugins loaded by this call run
    /// their init handlers; types already active are left untouched.
    pub async fn initialize(&self) -> Result<HashMap<String, Vec<HandlerResult>>> {
        let defs = self
            .internal_types
            .get_or_try_init(|| self.discover_internal())
            .await?;

        let mut loaded = Vec::new();
        for (name, def) in defs {
            let fresh = !self.active_plugins.contains_key(name);
            match self.load_plugin(name, def) {
                Ok(plugin) if fresh => loaded.push(plugin),
                Ok(_) => {}
                Err(e) => error!(plugin = %name, error = %e, "Failed to load plugin"),
            }
        }

        Ok(self
            .initialize_plugins(&loaded, &DependencyManager::empty())
            .await)
    }

    /// Admit and load the plugin types declared under the given paths
    ///
    /// Extends the loader's search roots, scans, and loads each yielded
    /// type. Newly loaded plugins are returned uninitialized; the caller
    /// decides when to run their init phase.
    pub async fn load_plugins(&self, paths: &[PathBuf]) -> Result<Vec<Arc<Plugin>>> {
        for path in paths {
            self.loader.add_path(path.clone());
        }

        let found = self.searcher.search(paths).await?;
        self.dependencies.absorb_relations(&found);

        let mut loaded = Vec::new();
        for info in found {
            let Some(def) = self.loader.resolve(&info.name) else {
                warn!(plugin = %info.name, "Plugin type not resolvable");
                continue;
            };
            self.external_types.insert(info.name.clone(), def.clone());

            let fresh = !self.active_plugins.contains_key(&info.name);
            match self.load_plugin(&info.name, &def) {
                Ok(plugin) if fresh => loaded.push(plugin),
                Ok(_) => {}
                Err(e) => error!(plugin = %info.name, error = %e, "Failed to load plugin"),
            }
        }
        Ok(loaded)
    }

    /// Run the init handlers of the given plugins under `scope`
    ///
    /// Returns per-plugin results, preserving each plugin's handler
    /// declaration order.
    pub async fn initialize_plugins(
        &self,
        plugins: &[Arc<Plugin>],
        scope: &DependencyManager,
    ) -> HashMap<String, Vec<HandlerResult>> {
        let results = self
            .run_phase(plugins, scope, Plugin::init_handlers)
            .await;

        for plugin in plugins {
            match results.get(plugin.name()) {
                Some(rs) if rs.iter().any(|r| r.is_err()) => {
                    warn!(plugin = %plugin.name(), "Plugin initialization failed")
                }
                _ => info!(plugin = %plugin.name(), "Plugin initialized"),
            }
        }
        results
    }

    /// Run the destroy handlers of the given plugins under `scope`
    ///
    /// A plugin is removed from the active set iff all of its destroy
    /// handlers succeeded, or `destroy_on_failure` is set.
    pub async fn destroy_plugins(
        &self,
        plugins: &[Arc<Plugin>],
        scope: &DependencyManager,
        destroy_on_failure: bool,
    ) -> HashMap<String, Vec<HandlerResult>> {
        let results = self
            .run_phase(plugins, scope, Plugin::destroy_handlers)
            .await;

        for plugin in plugins {
            let clean = results
                .get(plugin.name())
                .map_or(true, |rs| rs.iter().all(|r| r.is_ok()));
            if clean || destroy_on_failure {
                self.active_plugins.remove(plugin.name());
                info!(plugin = %plugin.name(), forced = !clean, "Plugin destroyed");
            } else {
                warn!(plugin = %plugin.name(), "Plugin destroy failed, kept active");
            }
        }
        results
    }

    /// Dispatch an event to every active plugin bound to it
    ///
    /// Results are returned flat, in the order bundles were collected.
    /// Iteration order over active plugins is not a contract.
    pub async fn fire_event(
        &self,
        event: &str,
        scope: &DependencyManager,
    ) -> Vec<HandlerResult> {
        let mut bundles = Vec::new();
        for entry in self.active_plugins.iter() {
            let plugin = entry.value().clone();
            for handler in plugin.handlers_for_event(event) {
                bundles.push(Bundle {
                    plugin: plugin.clone(),
                    handler: handler.clone(),
                });
            }
        }

        debug!(event, bundles = bundles.len(), "Firing event");
        invoker::invoke_all(bundles, scope, &self.dependencies).await
    }

    /// Dispatch an event under a fresh scope holding the given dependencies
    pub async fn fire_event_with(
        &self,
        event: &str,
        deps: Vec<Dependency>,
    ) -> Result<Vec<HandlerResult>> {
        let scope = DependencyManager::new();
        for dep in deps {
            scope.add_dependency(dep)?;
        }
        Ok(self.fire_event(event, &scope).await)
    }

    async fn run_phase(
        &self,
        plugins: &[Arc<Plugin>],
        scope: &DependencyManager,
        handlers: fn(&Plugin) -> &[Arc<HandlerSpec>],
    ) -> HashMap<String, Vec<HandlerResult>> {
        let mut owners = Vec::new();
        let mut bundles = Vec::new();
        let mut grouped: HashMap<String, Vec<HandlerResult>> = HashMap::new();

        for plugin in plugins {
            grouped.entry(plugin.name().to_string()).or_default();
            for handler in handlers(plugin) {
                owners.push(plugin.name().to_string());
                bundles.push(Bundle {
                    plugin: plugin.clone(),
                    handler: handler.clone(),
                });
            }
        }

        let results = invoker::invoke_all(bundles, scope, &self.dependencies).await;
        for (owner, result) in owners.into_iter().zip(results) {
            grouped.entry(owner).or_default().push(result);
        }
        grouped
    }

    async fn discover_internal(&self) -> Result<Vec<(String, Arc<ClassDef>)>> {
        let found = self.searcher.internal().await?;
        self.dependencies.absorb_relations(&found);

        let mut defs = Vec::new();
        for info in found {
            match self.loader.resolve(&info.name) {
                Some(def) => defs.push((info.name, def)),
                None => warn!(plugin = %info.name, "Plugin type not resolvable"),
            }
        }
        Ok(defs)
    }
}

/// Builder for [`PluginManager`]
#[derive(Default)]
pub struct PluginManagerBuilder {
    scanner: Option<Arc<dyn ClassScanner>>,
    resolver: Option<Arc<dyn ClassResolver>>,
    marker: Option<String>,
    paths: Vec<PathBuf>,
}

impl PluginManagerBuilder {
    /// Set the metadata scanner
    pub fn scanner(mut self, scanner: Arc<dyn ClassScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Set the parent class resolver
    pub fn resolver(mut self, resolver: Arc<dyn ClassResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Override the plugin marker name
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// Add an initial search root
    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Finish the manager
    pub fn build(self) -> PluginManager {
        let scanner = self
            .scanner
            .unwrap_or_else(|| Arc::new(StaticScanner::new()));
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(StaticResolver::new()));

        let mut searcher = PluginSearcher::new(scanner);
        if let Some(marker) = self.marker {
            searcher = searcher.with_marker(marker);
        }

        let loader = PluginLoader::new(resolver);
        for path in self.paths {
            loader.add_path(path);
        }

        PluginManager {
            loader,
            searcher,
            dependencies: Arc::new(DependencyManager::new()),
            internal_types: tokio::sync::OnceCell::new(),
            external_types: DashMap::new(),
            active_plugins: DashMap::new(),
        }
    }
}

impl std::fmt::Debug for PluginManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManagerBuilder")
            .field("marker", &self.marker)
            .field("paths", &self.paths)
            .finish()
    }
}
