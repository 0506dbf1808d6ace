//! Action handler trait and registry.
//!
//! Event hooks carry named action invocations. The registry maps each
//! invocation's `kind` to an [`ActionHandler`]; the `with_defaults()`
//! constructor installs the built-in handlers.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::binding::BindingStore;
use crate::expr::{ExprCache, ExprError};
use crate::schema::ActionInvocation;

/// Errors from action execution.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Expr(#[from] ExprError),
    #[error("action '{action}' is missing the '{detail}' detail")]
    MissingDetail {
        action: &'static str,
        detail: &'static str,
    },
    #[error("action '{action}' detail '{detail}': {message}")]
    InvalidDetail {
        action: &'static str,
        detail: &'static str,
        message: String,
    },
}

/// Everything a handler can touch while executing one invocation.
pub struct ActionContext<'a> {
    /// The binding store of the firing render root.
    pub store: &'a mut BindingStore,
    /// Shared expression compile cache.
    pub cache: &'a ExprCache,
    /// Name of the event that fired.
    pub event: &'a str,
    /// Payload the event was fired with.
    pub call_args: &'a [Value],
    /// Loop scope values captured where the hook was produced.
    pub scope_args: &'a [Value],
}

/// Object-safe action handler.
pub trait ActionHandler {
    /// The invocation kind this handler serves.
    fn name(&self) -> &str;

    /// Execute one invocation.
    fn execute(
        &self,
        context: &mut ActionContext<'_>,
        invocation: &ActionInvocation,
    ) -> Result<(), ActionError>;
}

/// Registry of action handlers, keyed by invocation kind.
pub struct ActionRegistry {
    handlers: HashMap<String, Box<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Create a registry with the built-in handlers installed:
    /// `change_binding`, `eval_expression`, `change_route`,
    /// `make_http_request`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(super::builtin::ChangeBinding));
        registry.register(Box::new(super::builtin::EvalExpression));
        registry.register(Box::new(super::builtin::ChangeRoute));
        registry.register(Box::new(super::builtin::MakeHttpRequest));
        registry
    }

    /// Register a handler under its own name, replacing any previous one.
    pub fn register(&mut self, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(handler.name().to_owned(), handler);
    }

    /// Look up the handler for an invocation kind.
    pub fn resolve(&self, kind: &str) -> Option<&dyn ActionHandler> {
        self.handlers.get(kind).map(Box::as_ref)
    }

    /// Execute one invocation. An unknown kind is skipped, not an error.
    pub fn dispatch(
        &self,
        context: &mut ActionContext<'_>,
        invocation: &ActionInvocation,
    ) -> Result<(), ActionError> {
        match self.resolve(&invocation.kind) {
            Some(handler) => handler.execute(context, invocation),
            None => {
                debug!(kind = %invocation.kind, "no handler registered, skipping");
                Ok(())
            }
        }
    }

    /// Execute a sequence of invocations in order. A failing invocation is
    /// logged and does not stop the ones after it.
    pub fn run_all(&self, context: &mut ActionContext<'_>, invocations: &[ActionInvocation]) {
        for invocation in invocations {
            if let Err(error) = self.dispatch(context, invocation) {
                warn!(kind = %invocation.kind, event = %context.event, %error, "action failed");
            }
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("ActionRegistry").field("kinds", &kinds).finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
