//! Event actions: handler trait, registry, built-in handlers.

pub mod builtin;
pub mod registry;

pub use builtin::{ChangeBinding, ChangeRoute, EvalExpression, MakeHttpRequest};
pub use registry::{ActionContext, ActionError, ActionHandler, ActionRegistry};
