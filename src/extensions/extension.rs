use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::extensions::boundary::{Boundary, HookContext, HookOutcome};
use crate::extensions::registry::HookFn;

/// Descriptive data an extension reports about itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionMetadata {
    /// Stable identifier used for enable/disable and configuration
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub enabled_by_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    Text,
    Number,
    Boolean,
    Select,
}

/// One user-facing setting of an extension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigField {
    pub name: String,
    pub label: String,
    pub kind: ConfigKind,
    pub default: Value,
    pub description: String,
    /// Allowed values for `Select`
    pub options: Vec<String>,
}

impl ConfigField {
    pub fn new(name: &str, label: &str, kind: ConfigKind, default: Value) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            default,
            description: String::new(),
            options: Vec::new(),
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    /// Coerce a raw value to this field's kind, `None` when it cannot be.
    fn coerce(&self, raw: &Value) -> Option<Value> {
        match self.kind {
            ConfigKind::Text => Some(match raw {
                Value::String(_) => raw.clone(),
                Value::Null => return None,
                other => Value::String(other.to_string()),
            }),
            ConfigKind::Number => match raw {
                Value::Number(_) => Some(raw.clone()),
                Value::String(s) => {
                    let s = s.trim();
                    if s.contains('.') {
                        s.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number)
                    } else {
                        s.parse::<i64>().ok().map(Value::from)
                    }
                }
                _ => None,
            },
            ConfigKind::Boolean => match raw {
                Value::Bool(_) => Some(raw.clone()),
                Value::String(s) => Some(Value::Bool(matches!(
                    s.trim().to_lowercase().as_str(),
                    "true" | "1" | "yes" | "on"
                ))),
                Value::Number(n) => Some(Value::Bool(n.as_f64().is_some_and(|f| f == 1.0))),
                _ => None,
            },
            ConfigKind::Select => match raw {
                Value::String(s) if self.options.iter().any(|o| o == s) => Some(raw.clone()),
                _ => None,
            },
        }
    }
}

/// Settings of one extension after defaults and type coercion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionConfig {
    values: Map<String, Value>,
}

impl ExtensionConfig {
    /// Build the effective configuration from a spec and raw user values.
    ///
    /// Missing keys take the field default; values of the wrong type fall
    /// back to the default with a warning. Keys not in the spec are dropped.
    pub fn resolve(spec: &[ConfigField], raw: &Map<String, Value>) -> Self {
        let mut values = Map::new();
        for field in spec {
            let value = match raw.get(&field.name) {
                None => field.default.clone(),
                Some(raw_value) => field.coerce(raw_value).unwrap_or_else(|| {
                    warn!(
                        "Config value {} for {} is invalid, using default {}",
                        raw_value, field.name, field.default
                    );
                    field.default.clone()
                }),
            };
            values.insert(field.name.clone(), value);
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn text(&self, key: &str) -> &str {
        self.values.get(key).and_then(Value::as_str).unwrap_or("")
    }

    pub fn flag(&self, key: &str) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }
}

/// Collects the callbacks an extension wants at each boundary
pub struct Registrar {
    extension_id: String,
    pub(crate) hooks: Vec<(Boundary, HookFn)>,
}

impl Registrar {
    pub(crate) fn new(extension_id: &str) -> Self {
        Self {
            extension_id: extension_id.to_string(),
            hooks: Vec::new(),
        }
    }

    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }

    pub fn on<F>(&mut self, boundary: Boundary, callback: F) -> &mut Self
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<HookOutcome> + Send + Sync + 'static,
    {
        let hook: HookFn = Arc::new(callback);
        self.hooks.push((boundary, hook));
        self
    }
}

/// A packaged set of boundary callbacks with metadata and settings
pub trait Extension: Send + Sync + 'static {
    fn metadata(&self) -> ExtensionMetadata;

    fn config_spec(&self) -> Vec<ConfigField> {
        Vec::new()
    }

    /// Receive the resolved settings. Called once at install with defaults
    /// and again whenever the host reconfigures the extension.
    fn load_config(&self, _config: ExtensionConfig) {}

    /// One-time preparation; an error keeps the extension from installing.
    fn setup(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn register(self: Arc<Self>, registrar: &mut Registrar);
}
