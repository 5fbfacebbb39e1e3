//! Extension registry.
//!
//! Callbacks are plain functions that observe or replace run data at a named
//! boundary. Multiple callbacks may be registered per boundary; they run in
//! registration order and each sees the values produced by the one before.
//! A failing or panicking callback is logged and treated as "no change".
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::errors::ExtensionError;
use crate::core::params::RunParameters;
use crate::core::types::StageData;
use crate::extensions::boundary::{Boundary, HookContext, HookOutcome};
use crate::extensions::extension::{
    ConfigField, Extension, ExtensionConfig, ExtensionMetadata, Registrar,
};
use crate::utils::Metrics;

pub type HookFn = Arc<dyn Fn(&HookContext<'_>) -> anyhow::Result<HookOutcome> + Send + Sync>;

struct Callback {
    extension_id: String,
    hook: HookFn,
}

#[derive(Default)]
struct RegistryState {
    hooks: HashMap<Boundary, Vec<Callback>>,
    /// Explicit enable/disable calls
    enabled: HashMap<String, bool>,
    /// Host-provided and extension-declared defaults
    defaults: HashMap<String, bool>,
    installed: BTreeMap<String, Arc<dyn Extension>>,
}

impl RegistryState {
    fn is_enabled(&self, extension_id: &str) -> bool {
        self.enabled
            .get(extension_id)
            .or_else(|| self.defaults.get(extension_id))
            .copied()
            .unwrap_or(true)
    }

    fn knows(&self, extension_id: &str) -> bool {
        self.installed.contains_key(extension_id)
            || self
                .hooks
                .values()
                .flatten()
                .any(|cb| cb.extension_id == extension_id)
    }
}

/// Listing entry for an installed extension
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionInfo {
    pub metadata: ExtensionMetadata,
    pub enabled: bool,
    pub config_spec: Vec<ConfigField>,
}

/// Thread-safe registry of boundary callbacks keyed by extension id.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    state: Arc<RwLock<RegistryState>>,
    metrics: Option<Metrics>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose extensions start enabled or disabled per `defaults`.
    ///
    /// Entries here win over an extension's own `enabled_by_default`.
    pub fn with_defaults(defaults: HashMap<String, bool>) -> Self {
        let registry = Self::default();
        registry.state.write().defaults = defaults;
        registry
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Append a callback for `boundary`. Order of registration is invocation order.
    pub fn register<F>(&self, extension_id: &str, boundary: Boundary, callback: F)
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<HookOutcome> + Send + Sync + 'static,
    {
        self.push_hook(extension_id, boundary, Arc::new(callback));
    }

    fn push_hook(&self, extension_id: &str, boundary: Boundary, hook: HookFn) {
        let mut state = self.state.write();
        state.hooks.entry(boundary).or_default().push(Callback {
            extension_id: extension_id.to_string(),
            hook,
        });
        debug!("Registered {} callback for {}", boundary, extension_id);
    }

    /// Install a packaged extension: setup, default configuration, callbacks.
    pub fn install(&self, extension: Arc<dyn Extension>) -> Result<(), ExtensionError> {
        let metadata = extension.metadata();
        let id = metadata.id.clone();
        if self.state.read().installed.contains_key(&id) {
            return Err(ExtensionError::AlreadyInstalled(id));
        }

        extension
            .setup()
            .map_err(|source| ExtensionError::SetupFailed {
                id: id.clone(),
                source,
            })?;
        extension.load_config(ExtensionConfig::resolve(&extension.config_spec(), &Map::new()));

        let mut registrar = Registrar::new(&id);
        Arc::clone(&extension).register(&mut registrar);

        let mut state = self.state.write();
        if state.installed.contains_key(&id) {
            return Err(ExtensionError::AlreadyInstalled(id));
        }
        state
            .defaults
            .entry(id.clone())
            .or_insert(metadata.enabled_by_default);
        let hook_count = registrar.hooks.len();
        for (boundary, hook) in registrar.hooks {
            state.hooks.entry(boundary).or_default().push(Callback {
                extension_id: id.clone(),
                hook,
            });
        }
        state.installed.insert(id.clone(), extension);
        let enabled = state.is_enabled(&id);
        drop(state);

        info!(
            "Installed extension {} v{} ({} callbacks, enabled: {})",
            metadata.name, metadata.version, hook_count, enabled
        );
        Ok(())
    }

    /// Enable or disable every callback of an extension without removing it.
    /// Returns false when nothing is registered under `extension_id`.
    pub fn set_enabled(&self, extension_id: &str, enabled: bool) -> bool {
        let mut state = self.state.write();
        state.enabled.insert(extension_id.to_string(), enabled);
        let known = state.knows(extension_id);
        if !known {
            warn!("Enabled state set for unknown extension {}", extension_id);
        }
        known
    }

    pub fn is_enabled(&self, extension_id: &str) -> bool {
        self.state.read().is_enabled(extension_id)
    }

    /// Remove every callback of an extension. Returns how many were removed.
    pub fn unregister(&self, extension_id: &str) -> usize {
        let mut state = self.state.write();
        let mut removed = 0;
        for callbacks in state.hooks.values_mut() {
            let before = callbacks.len();
            callbacks.retain(|cb| cb.extension_id != extension_id);
            removed += before - callbacks.len();
        }
        state.hooks.retain(|_, callbacks| !callbacks.is_empty());
        state.installed.remove(extension_id);
        removed
    }

    /// Push new settings to an installed extension.
    pub fn configure(&self, extension_id: &str, raw: &Map<String, Value>) -> bool {
        let extension = self.state.read().installed.get(extension_id).cloned();
        match extension {
            Some(extension) => {
                extension.load_config(ExtensionConfig::resolve(&extension.config_spec(), raw));
                true
            }
            None => false,
        }
    }

    pub fn has_callbacks(&self, boundary: Boundary) -> bool {
        let state = self.state.read();
        state
            .hooks
            .get(&boundary)
            .is_some_and(|callbacks| callbacks.iter().any(|cb| state.is_enabled(&cb.extension_id)))
    }

    pub fn extensions(&self) -> Vec<ExtensionInfo> {
        let state = self.state.read();
        state
            .installed
            .iter()
            .map(|(id, extension)| ExtensionInfo {
                metadata: extension.metadata(),
                enabled: state.is_enabled(id),
                config_spec: extension.config_spec(),
            })
            .collect()
    }

    /// Invoke the enabled callbacks of `boundary` in order, threading `data`.
    ///
    /// The callback list is snapshotted first, so callbacks run without the
    /// registry lock held and may themselves register or toggle extensions.
    /// A params replacement is applied only at `before_run`. Returns the
    /// number of callbacks that replaced something.
    pub fn fire(
        &self,
        boundary: Boundary,
        data: &mut StageData,
        params: &mut Arc<RunParameters>,
    ) -> usize {
        let chain: Vec<(String, HookFn)> = {
            let state = self.state.read();
            match state.hooks.get(&boundary) {
                None => return 0,
                Some(callbacks) => callbacks
                    .iter()
                    .filter(|cb| state.is_enabled(&cb.extension_id))
                    .map(|cb| (cb.extension_id.clone(), Arc::clone(&cb.hook)))
                    .collect(),
            }
        };

        let mut applied = 0;
        for (extension_id, hook) in chain {
            let result = {
                let ctx = HookContext {
                    boundary,
                    data: &*data,
                    params: params.as_ref(),
                };
                panic::catch_unwind(AssertUnwindSafe(|| hook(&ctx)))
            };

            match result {
                Ok(Ok(HookOutcome::Unchanged)) => {}
                Ok(Ok(HookOutcome::Replace(patch))) => {
                    if patch.is_empty() {
                        continue;
                    }
                    if let Some(new_params) = patch.apply_to(data) {
                        if boundary.accepts_params() {
                            debug!("{} replaced run parameters at {}", extension_id, boundary);
                            *params = Arc::new(new_params);
                        } else {
                            warn!(
                                "{} tried to replace run parameters at {}; ignored",
                                extension_id, boundary
                            );
                        }
                    }
                    applied += 1;
                }
                Ok(Err(err)) => {
                    warn!("Extension {} failed at {}: {:#}", extension_id, boundary, err);
                    self.record_failure();
                }
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    error!("Extension {} panicked at {}: {}", extension_id, boundary, message);
                    self.record_failure();
                }
            }
        }
        applied
    }

    fn record_failure(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_extension_failure();
        }
    }
}
