//! Tag resolution: mapping descriptor tags to render targets.
//!
//! A [`TagRegistry`] maps tag names to [`ComponentFactory`] implementations
//! and carries the per-tag model property/event defaults. Resolution
//! precedence: a factory attached directly to the node, then the registry,
//! then the tag name as a raw builtin.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::schema::{NodeData, ROOT_TAG};

/// Tag of the structural container builtin. Used for missing tags and for
/// the document root sentinel.
pub const CONTAINER_TAG: &str = "container";

/// Tag of the wrapper injected around every subtree in overlay mode.
pub const OVERLAY_TAG: &str = "editor-overlay";

// ---------------------------------------------------------------------------
// ComponentFactory
// ---------------------------------------------------------------------------

/// Object-safe seam for host-provided component implementations.
///
/// The interpreter never calls into the component; it only records which
/// factory a node resolved to. `as_any` lets hosts downcast back to their
/// concrete type when consuming the output tree.
pub trait ComponentFactory {
    /// Name the factory renders as.
    fn name(&self) -> &str;

    /// Upcast to `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl std::fmt::Debug for dyn ComponentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentFactory({})", self.name())
    }
}

// ---------------------------------------------------------------------------
// RenderTarget
// ---------------------------------------------------------------------------

/// What a node's tag resolved to.
#[derive(Clone)]
pub enum RenderTarget {
    /// A structural or host-interpreted raw tag.
    Builtin(String),
    /// A registered component implementation.
    Component(Arc<dyn ComponentFactory>),
}

impl RenderTarget {
    /// The resolved name, whichever form it took.
    pub fn name(&self) -> &str {
        match self {
            RenderTarget::Builtin(tag) => tag,
            RenderTarget::Component(factory) => factory.name(),
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, RenderTarget::Component(_))
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderTarget::Builtin(tag) => write!(f, "Builtin({tag:?})"),
            RenderTarget::Component(factory) => write!(f, "Component({:?})", factory.name()),
        }
    }
}

impl PartialEq for RenderTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RenderTarget::Builtin(a), RenderTarget::Builtin(b)) => a == b,
            (RenderTarget::Component(a), RenderTarget::Component(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Model defaults
// ---------------------------------------------------------------------------

/// Per-tag default property/event pair for two-way model bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefaults {
    pub property: String,
    pub event: String,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            property: "value".into(),
            event: "input".into(),
        }
    }
}

impl ModelDefaults {
    pub fn new(property: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            event: event.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TagRegistry
// ---------------------------------------------------------------------------

/// Registry of component factories and per-tag model defaults.
pub struct TagRegistry {
    factories: HashMap<String, Arc<dyn ComponentFactory>>,
    model_defaults: HashMap<String, ModelDefaults>,
}

impl TagRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            model_defaults: HashMap::new(),
        }
    }

    /// Create a registry with the standard model-default overrides installed.
    ///
    /// Most controls update through `value`/`input`; toggles carry their
    /// state in `checked` and report through `change`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.set_model_defaults("checkbox", ModelDefaults::new("checked", "change"));
        registry.set_model_defaults("switch", ModelDefaults::new("checked", "change"));
        registry
    }

    /// Register a factory under a tag name, replacing any previous one.
    pub fn register(&mut self, tag: impl Into<String>, factory: Arc<dyn ComponentFactory>) {
        self.factories.insert(tag.into(), factory);
    }

    /// Override the model property/event pair for a tag.
    pub fn set_model_defaults(&mut self, tag: impl Into<String>, defaults: ModelDefaults) {
        self.model_defaults.insert(tag.into(), defaults);
    }

    /// The model defaults for a tag.
    pub fn model_defaults(&self, tag: Option<&str>) -> ModelDefaults {
        tag.and_then(|tag| self.model_defaults.get(tag).cloned())
            .unwrap_or_default()
    }

    /// Resolve a node to its render target.
    ///
    /// Precedence: node-attached factory, registered factory for the tag,
    /// then the raw tag. A missing tag and the root sentinel both resolve to
    /// the structural container.
    pub fn resolve(&self, node: &NodeData) -> RenderTarget {
        if let Some(factory) = &node.factory {
            return RenderTarget::Component(Arc::clone(factory));
        }
        match node.tag.as_deref() {
            None | Some(ROOT_TAG) => RenderTarget::Builtin(CONTAINER_TAG.into()),
            Some(tag) => match self.factories.get(tag) {
                Some(factory) => RenderTarget::Component(Arc::clone(factory)),
                None => RenderTarget::Builtin(tag.into()),
            },
        }
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no factories are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.factories.keys().collect();
        tags.sort();
        f.debug_struct("TagRegistry").field("tags", &tags).finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
