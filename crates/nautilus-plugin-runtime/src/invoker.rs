//! Fixed-point handler invocation
//!
//! A batch of `(plugin, handler)` bundles is invoked in rounds. Handlers
//! whose parameters cannot be resolved yet are retried in the next round:
//! a peer that succeeded in the meantime may have published the missing
//! dependency. A round that does not strictly shrink the pending set
//! means the remaining bundles are unsatisfiable (for example a
//! dependency cycle), and their last-seen failures are committed.
//!
//! Results always land at the bundle's original index, regardless of the
//! round in which it completed.

use nautilus_plugin_api::{
    Args, DepValue, DependencyManager, HandlerResult, HandlerSpec, Plugin, PluginError,
};
use std::sync::Arc;
use tracing::debug;

/// A handler queued for invocation on a plugin
#[derive(Debug, Clone)]
pub(crate) struct Bundle {
    pub(crate) plugin: Arc<Plugin>,
    pub(crate) handler: Arc<HandlerSpec>,
}

/// Invoke all bundles under `scope`, retrying until a fixed point
pub(crate) async fn invoke_all(
    bundles: Vec<Bundle>,
    scope: &DependencyManager,
    global: &DependencyManager,
) -> Vec<HandlerResult> {
    let total = bundles.len();
    let mut done: Vec<Option<HandlerResult>> = (0..total).map(|_| None).collect();
    let mut pending: Vec<(usize, Bundle)> = bundles.into_iter().enumerate().collect();
    let mut round = 0usize;

    while !pending.is_empty() {
        round += 1;
        let before = pending.len();
        let mut stuck: Vec<(usize, Bundle, PluginError)> = Vec::new();

        for (index, bundle) in pending {
            match try_invoke(&bundle, scope, global).await {
                Ok(value) => done[index] = Some(Ok(value)),
                Err(e) => stuck.push((index, bundle, e)),
            }
        }

        debug!(
            round,
            pending = stuck.len(),
            completed = total - stuck.len(),
            "Invocation round finished"
        );

        if stuck.len() == before {
            // No progress: the remaining bundles cannot be satisfied.
            for (index, _, e) in stuck {
                done[index] = Some(Err(e));
            }
            break;
        }

        pending = stuck
            .into_iter()
            .map(|(index, bundle, _)| (index, bundle))
            .collect();
    }

    done.into_iter()
        .map(|r| r.unwrap_or_else(|| Err(PluginError::failure("handler was never invoked"))))
        .collect()
}

/// Resolve one handler's parameters and invoke it
async fn try_invoke(
    bundle: &Bundle,
    scope: &DependencyManager,
    global: &DependencyManager,
) -> HandlerResult {
    let mut values: Vec<DepValue> = Vec::with_capacity(bundle.handler.params().len());

    for param in bundle.handler.params() {
        let value = match param.dep_name() {
            Some(name) => {
                let dep = scope
                    .find(name)
                    .or_else(|| global.find(name))
                    .ok_or_else(|| PluginError::dep_name_not_found(name))?;
                if !param.class().accepts(dep.value_class()) {
                    return Err(PluginError::dep_unexpected_class(
                        name,
                        param.class(),
                        dep.value_class(),
                    ));
                }
                dep.value().clone()
            }
            None => {
                let mut candidates = scope.find_by_value_class(param.class());
                if candidates.is_empty() {
                    candidates = global.find_by_value_class(param.class());
                }
                // Last entry wins, following insertion order.
                let dep = candidates
                    .pop()
                    .ok_or_else(|| PluginError::dep_class_not_found(param.class()))?;
                dep.value().clone()
            }
        };
        values.push(value);
    }

    bundle
        .handler
        .invoke(bundle.plugin.clone(), Args::new(values))
        .await
}
