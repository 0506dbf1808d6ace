//! Render root: one interpreter instance tying the subsystems together.
//!
//! A [`RenderRoot`] owns the document, the binding store and both
//! registries. Nothing here is process-global; independent roots with
//! different registries coexist in one process. Asynchronous binding
//! resolutions arrive over an internal channel and are applied explicitly
//! with [`RenderRoot::apply_pending`], so rendering itself stays
//! synchronous.

use std::future::Future;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::action::{ActionContext, ActionRegistry};
use crate::binding::{BindingStore, StoreObserver};
use crate::expr::ExprCache;
use crate::render::{EventHook, OutputNode, Renderer, TagRegistry};
use crate::schema::Document;

/// A completed asynchronous binding resolution.
struct PromiseResolution {
    binding: String,
    /// Store version captured when the work started. A mismatch on arrival
    /// means the binding moved on and the result is stale.
    version: u64,
    result: Result<Value, String>,
}

/// One interpreter instance: document, bindings, registries, liveness.
pub struct RenderRoot {
    document: Document,
    store: BindingStore,
    tags: TagRegistry,
    actions: ActionRegistry,
    cache: ExprCache,
    overlay: bool,
    needs_render: bool,
    pending_tx: mpsc::UnboundedSender<PromiseResolution>,
    pending_rx: mpsc::UnboundedReceiver<PromiseResolution>,
}

impl RenderRoot {
    /// Create a root over a document and store, with default registries.
    pub fn new(document: Document, store: BindingStore) -> Self {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        Self {
            document,
            store,
            tags: TagRegistry::with_defaults(),
            actions: ActionRegistry::with_defaults(),
            cache: ExprCache::new(),
            overlay: false,
            needs_render: true,
            pending_tx,
            pending_rx,
        }
    }

    /// Replace the tag registry (builder).
    pub fn with_tags(mut self, tags: TagRegistry) -> Self {
        self.tags = tags;
        self
    }

    /// Replace the action registry (builder).
    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    /// Toggle editor overlay mode.
    pub fn set_overlay(&mut self, overlay: bool) {
        if self.overlay != overlay {
            self.overlay = overlay;
            self.needs_render = true;
        }
    }

    pub fn overlay(&self) -> bool {
        self.overlay
    }

    // ── Access ───────────────────────────────────────────────────────

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable document access. Assumes the caller changes something.
    pub fn document_mut(&mut self) -> &mut Document {
        self.needs_render = true;
        &mut self.document
    }

    pub fn store(&self) -> &BindingStore {
        &self.store
    }

    /// Mutable store access. Assumes the caller changes something.
    pub fn store_mut(&mut self) -> &mut BindingStore {
        self.needs_render = true;
        &mut self.store
    }

    pub fn tags_mut(&mut self) -> &mut TagRegistry {
        self.needs_render = true;
        &mut self.tags
    }

    pub fn actions_mut(&mut self) -> &mut ActionRegistry {
        &mut self.actions
    }

    /// Install the store observer, replacing any previous one.
    pub fn set_observer(&mut self, observer: StoreObserver) {
        self.store.set_observer(observer);
    }

    // ── Rendering ────────────────────────────────────────────────────

    /// Whether state changed since the last [`RenderRoot::render`] call.
    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    /// A renderer borrowing this root's current state. Hosts use it to
    /// invoke scoped slot providers from the last output tree.
    pub fn renderer(&self) -> Renderer<'_> {
        Renderer::new(&self.document, &self.store, &self.tags, &self.cache).with_overlay(self.overlay)
    }

    /// Render a fresh output tree and clear the dirty flag.
    pub fn render(&mut self) -> OutputNode {
        self.needs_render = false;
        self.renderer().render()
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Fire an event hook with a payload.
    ///
    /// The model write-back runs first, with the first payload element as
    /// the new value, then the declared invocations in order. Unknown
    /// invocation kinds are skipped; failures are logged and do not stop
    /// later invocations.
    pub fn fire(&mut self, hook: &EventHook, call_args: &[Value]) {
        if let Some(path) = &hook.model_path {
            let value = call_args.first().cloned().unwrap_or(Value::Null);
            self.store.set_value(path, value, true);
        }
        let mut context = ActionContext {
            store: &mut self.store,
            cache: &self.cache,
            event: &hook.event,
            call_args,
            scope_args: &hook.scope_args,
        };
        self.actions.run_all(&mut context, &hook.invocations);
        self.needs_render = true;
    }

    // ── Asynchronous bindings ────────────────────────────────────────

    /// Start resolving a promise-typed binding. The result is queued and
    /// applied by [`RenderRoot::apply_pending`]; a result that arrives after
    /// the binding changed again is dropped.
    pub fn resolve_promise<F>(&self, binding: impl Into<String>, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let binding = binding.into();
        let version = self.store.version(&binding);
        let sender = self.pending_tx.clone();
        tokio::spawn(async move {
            let result = future.await;
            let _ = sender.send(PromiseResolution {
                binding,
                version,
                result,
            });
        })
    }

    /// Drain queued resolutions into the store. Returns how many applied.
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(resolution) = self.pending_rx.try_recv() {
            if self.store.version(&resolution.binding) != resolution.version {
                debug!(binding = %resolution.binding, "stale resolution dropped");
                continue;
            }
            match resolution.result {
                Ok(value) => {
                    self.store.set_value(&resolution.binding, value, false);
                    self.needs_render = true;
                    applied += 1;
                }
                Err(message) => {
                    // The binding keeps its pre-resolution value.
                    warn!(binding = %resolution.binding, %message, "binding resolution failed");
                }
            }
        }
        applied
    }
}

impl std::fmt::Debug for RenderRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderRoot")
            .field("document", &self.document)
            .field("overlay", &self.overlay)
            .field("needs_render", &self.needs_render)
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
