//! Binding declarations: name, declared type, default value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a binding. Drives how the default value is materialized
/// on first access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    /// Passed through as-is.
    #[default]
    String,
    /// Default given as a JSON literal (possibly a string to parse).
    Number,
    /// Default given as a JSON literal (possibly a string to parse).
    Boolean,
    /// Default given as serialized JSON text or a structured value.
    Object,
    /// Default given as serialized JSON text or a structured value.
    Array,
    /// Default given as serialized JSON text or a structured value.
    Json,
    /// Resolved asynchronously by the render root; `null` until then.
    Promise,
    /// Served by a value provider registered on the store.
    Function,
}

/// Declares a named, typed binding visible to expressions and two-way-bound
/// controls within one render root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingDeclaration {
    /// Binding name, unique within the render root.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type", default)]
    pub kind: BindingKind,
    /// Default value. Interpretation depends on `kind`.
    #[serde(default)]
    pub default: Value,
}

impl BindingDeclaration {
    /// Declare a binding.
    pub fn new(name: impl Into<String>, kind: BindingKind, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            default: default.into(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
