//! The binding store: typed defaults, override values, and change
//! notification for one render root.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::schema::{BindingDeclaration, BindingKind};

use super::path;

/// Serves values for `function`-typed bindings.
pub type ValueProvider = Box<dyn Fn() -> Value>;

/// Called with the full merged snapshot after every successful write.
pub type StoreObserver = Box<dyn FnMut(&Map<String, Value>)>;

/// Holds declared bindings, their materialized defaults, and the override
/// values written by controls and actions.
///
/// Reads always see the shallow merge of defaults and overrides; a partial
/// object override fills in on top of an object default key by key.
pub struct BindingStore {
    declarations: Vec<BindingDeclaration>,
    providers: HashMap<String, ValueProvider>,
    overrides: Map<String, Value>,
    // Defaults parse lazily on first read so a store can be built before
    // function providers are registered.
    defaults: RefCell<Option<Map<String, Value>>>,
    versions: HashMap<String, u64>,
    observer: Option<StoreObserver>,
}

impl BindingStore {
    pub fn new(declarations: Vec<BindingDeclaration>) -> Self {
        Self {
            declarations,
            providers: HashMap::new(),
            overrides: Map::new(),
            defaults: RefCell::new(None),
            versions: HashMap::new(),
            observer: None,
        }
    }

    /// Register the provider backing a `function`-typed binding. Invoked on
    /// every snapshot, so the served value is always current.
    pub fn register_provider(&mut self, name: impl Into<String>, provider: ValueProvider) {
        self.providers.insert(name.into(), provider);
        *self.defaults.borrow_mut() = None;
    }

    /// Install the change observer, replacing any previous one.
    pub fn set_observer(&mut self, observer: StoreObserver) {
        self.observer = Some(observer);
    }

    pub fn declarations(&self) -> &[BindingDeclaration] {
        &self.declarations
    }

    /// The merged snapshot: materialized defaults with overrides on top.
    pub fn values(&self) -> Map<String, Value> {
        let mut merged = self.materialized_defaults();
        for declaration in &self.declarations {
            if declaration.kind == BindingKind::Function {
                if let Some(provider) = self.providers.get(&declaration.name) {
                    merged.insert(declaration.name.clone(), provider());
                }
            }
        }
        for (name, override_value) in &self.overrides {
            match (merged.get_mut(name), override_value) {
                (Some(Value::Object(base)), Value::Object(layer)) => {
                    for (key, value) in layer {
                        base.insert(key.clone(), value.clone());
                    }
                }
                _ => {
                    merged.insert(name.clone(), override_value.clone());
                }
            }
        }
        merged
    }

    /// Read the value at a (possibly sigil-prefixed) dot-path.
    pub fn get(&self, raw_path: &str) -> Option<Value> {
        let normalized = path::normalize(raw_path);
        let snapshot = Value::Object(self.values());
        path::get_path(&snapshot, normalized).cloned()
    }

    /// Write `value` at a (possibly sigil-prefixed) dot-path.
    ///
    /// A top-level write always lands. A deeper write only bridges missing
    /// intermediate objects when `recursive` is set; otherwise it is a
    /// silent no-op. Returns whether a write happened.
    pub fn set_value(&mut self, raw_path: &str, value: Value, recursive: bool) -> bool {
        let normalized = path::normalize(raw_path).to_owned();
        let segments = path::segments(&normalized);
        let Some(&top) = segments.first() else {
            return false;
        };

        let written = if segments.len() == 1 {
            self.overrides.insert(top.to_owned(), value);
            true
        } else {
            // Deep writes land on a copy of the current merged value for the
            // top-level key, so existence checks see defaults too.
            let mut scratch = Map::new();
            let current = self
                .overrides
                .get(top)
                .cloned()
                .or_else(|| self.values().get(top).cloned())
                .unwrap_or(Value::Null);
            scratch.insert(top.to_owned(), current);
            if path::set_path(&mut scratch, &normalized, value, recursive) {
                let updated = scratch.remove(top).unwrap_or(Value::Null);
                self.overrides.insert(top.to_owned(), updated);
                true
            } else {
                false
            }
        };

        if written {
            self.bump_version(top);
            self.notify();
        }
        written
    }

    /// Discard all overrides, returning bindings to their defaults.
    pub fn reset(&mut self) {
        self.overrides.clear();
        let names: Vec<String> = self
            .declarations
            .iter()
            .map(|declaration| declaration.name.clone())
            .collect();
        for name in names {
            self.bump_version(&name);
        }
        self.notify();
    }

    /// Monotonic change counter for a top-level binding. Used to drop
    /// asynchronous results that arrive after the binding moved on.
    pub fn version(&self, name: &str) -> u64 {
        self.versions.get(name).copied().unwrap_or(0)
    }

    fn bump_version(&mut self, name: &str) {
        *self.versions.entry(name.to_owned()).or_insert(0) += 1;
    }

    fn notify(&mut self) {
        if self.observer.is_some() {
            let snapshot = self.values();
            if let Some(observer) = self.observer.as_mut() {
                observer(&snapshot);
            }
        }
    }

    fn materialized_defaults(&self) -> Map<String, Value> {
        let mut cache = self.defaults.borrow_mut();
        if cache.is_none() {
            let mut defaults = Map::new();
            for declaration in &self.declarations {
                defaults.insert(declaration.name.clone(), materialize(declaration));
            }
            *cache = Some(defaults);
        }
        cache.as_ref().cloned().unwrap_or_default()
    }
}

impl std::fmt::Debug for BindingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingStore")
            .field("declarations", &self.declarations.len())
            .field("overrides", &self.overrides)
            .finish()
    }
}

/// Turn a declaration's default into its runtime value.
fn materialize(declaration: &BindingDeclaration) -> Value {
    match declaration.kind {
        BindingKind::String => declaration.default.clone(),
        BindingKind::Promise | BindingKind::Function => Value::Null,
        BindingKind::Number
        | BindingKind::Boolean
        | BindingKind::Object
        | BindingKind::Array
        | BindingKind::Json => match &declaration.default {
            // Typed defaults may arrive as JSON text.
            Value::String(text) => serde_json::from_str(text).unwrap_or_else(|error| {
                warn!(binding = %declaration.name, %error, "invalid default, using null");
                Value::Null
            }),
            other => other.clone(),
        },
    }
}

// ===========================================================================
// Tests
// ===========================================================================
