//! Built-in action handlers.

use serde_json::{Map, Value};
use tracing::info;

use crate::expr::{classify, PropertySource};
use crate::schema::ActionInvocation;

use super::registry::{ActionContext, ActionError, ActionHandler};

// ---------------------------------------------------------------------------
// change_binding
// ---------------------------------------------------------------------------

/// Writes a value to a binding path.
///
/// Details:
/// - `binding` (required, `path` accepted as an alias): target path, sigils
///   and the `bindings.` prefix allowed
/// - `value`: the value to write; a sigil-prefixed string resolves first
/// - `type`: how a literal string value is coerced (`string` is default;
///   `number`, `boolean`, `object`, `array` and `json` parse it as JSON;
///   `null` and `undefined` discard the value and write null)
/// - `recursive`: create missing intermediate objects (default false)
pub struct ChangeBinding;

impl ActionHandler for ChangeBinding {
    fn name(&self) -> &str {
        "change_binding"
    }

    fn execute(
        &self,
        context: &mut ActionContext<'_>,
        invocation: &ActionInvocation,
    ) -> Result<(), ActionError> {
        let target = match require_str(invocation, "change_binding", "binding") {
            Ok(target) => target,
            Err(missing) => require_str(invocation, "change_binding", "path").map_err(|_| missing)?,
        };
        let recursive = invocation
            .details
            .get("recursive")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let value = resolve_value(context, invocation)?;
        context.store.set_value(&target, value, recursive);
        Ok(())
    }
}

fn resolve_value(
    context: &mut ActionContext<'_>,
    invocation: &ActionInvocation,
) -> Result<Value, ActionError> {
    let raw = invocation.details.get("value").cloned().unwrap_or(Value::Null);
    let Value::String(text) = raw else {
        // Structured values pass through untouched.
        return Ok(raw);
    };
    match classify(&text) {
        PropertySource::Expression(source) => {
            let program = context.cache.compile(source).map_err(parse_error)?;
            Ok(evaluate(context, &program)?)
        }
        PropertySource::Reference(path) => Ok(context.store.get(path).unwrap_or(Value::Null)),
        PropertySource::Literal(literal) => coerce_literal(invocation, literal),
    }
}

fn coerce_literal(invocation: &ActionInvocation, literal: &str) -> Result<Value, ActionError> {
    let kind = invocation
        .details
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("string");
    match kind {
        "string" => Ok(Value::String(literal.to_owned())),
        // The value detail is ignored for these.
        "null" | "undefined" => Ok(Value::Null),
        "number" | "boolean" | "object" | "array" | "json" => {
            serde_json::from_str(literal).map_err(|error| ActionError::InvalidDetail {
                action: "change_binding",
                detail: "value",
                message: error.to_string(),
            })
        }
        other => Err(ActionError::InvalidDetail {
            action: "change_binding",
            detail: "type",
            message: format!("unknown coercion '{other}'"),
        }),
    }
}

// ---------------------------------------------------------------------------
// eval_expression
// ---------------------------------------------------------------------------

/// Runs an expression for its effect, usually a top-level assignment.
///
/// Details:
/// - `expression` (required): source text; the `$()` wrapper is optional
///
/// The first payload element is visible as `event`, the full payload as
/// `args`, and the loop scope the hook was produced with as `scope`.
pub struct EvalExpression;

impl ActionHandler for EvalExpression {
    fn name(&self) -> &str {
        "eval_expression"
    }

    fn execute(
        &self,
        context: &mut ActionContext<'_>,
        invocation: &ActionInvocation,
    ) -> Result<(), ActionError> {
        let raw = require_str(invocation, "eval_expression", "expression")?;
        let source = match classify(&raw) {
            PropertySource::Expression(inner) => inner.to_owned(),
            _ => raw,
        };
        let program = context.cache.compile(&source).map_err(parse_error)?;
        evaluate(context, &program)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

/// Navigation is outside the interpreter; the request is only recorded.
pub struct ChangeRoute;

impl ActionHandler for ChangeRoute {
    fn name(&self) -> &str {
        "change_route"
    }

    fn execute(
        &self,
        _context: &mut ActionContext<'_>,
        invocation: &ActionInvocation,
    ) -> Result<(), ActionError> {
        let route = invocation.details.get("route").and_then(Value::as_str).unwrap_or("");
        info!(%route, "route change requested");
        Ok(())
    }
}

/// Network IO is outside the interpreter; the request is only recorded.
pub struct MakeHttpRequest;

impl ActionHandler for MakeHttpRequest {
    fn name(&self) -> &str {
        "make_http_request"
    }

    fn execute(
        &self,
        _context: &mut ActionContext<'_>,
        invocation: &ActionInvocation,
    ) -> Result<(), ActionError> {
        let url = invocation.details.get("url").and_then(Value::as_str).unwrap_or("");
        info!(%url, "http request requested");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn require_str(
    invocation: &ActionInvocation,
    action: &'static str,
    detail: &'static str,
) -> Result<String, ActionError> {
    invocation
        .details
        .get(detail)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(ActionError::MissingDetail { action, detail })
}

fn evaluate(
    context: &mut ActionContext<'_>,
    program: &crate::expr::Program,
) -> Result<Value, ActionError> {
    let mut extra = Map::new();
    extra.insert(
        "event".to_owned(),
        context.call_args.first().cloned().unwrap_or(Value::Null),
    );
    // `args` is the full event payload; `scope` is the loop scope the hook
    // was produced with.
    extra.insert("args".to_owned(), Value::Array(context.call_args.to_vec()));
    extra.insert("scope".to_owned(), Value::Array(context.scope_args.to_vec()));
    crate::expr::run(program, context.store, context.scope_args, &extra).map_err(ActionError::from)
}

fn parse_error(error: crate::expr::ParseError) -> ActionError {
    ActionError::Expr(error.into())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionRegistry;
    use crate::binding::BindingStore;
    use crate::expr::ExprCache;
    use crate::schema::{BindingDeclaration, BindingKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fire(store: &mut BindingStore, invocation: ActionInvocation) {
        fire_with(store, invocation, &[], &[]);
    }

    fn fire_with(
        store: &mut BindingStore,
        invocation: ActionInvocation,
        call_args: &[Value],
        scope_args: &[Value],
    ) {
        let registry = ActionRegistry::with_defaults();
        let cache = ExprCache::new();
        let mut context = ActionContext {
            store,
            cache: &cache,
            event: "click",
            call_args,
            scope_args,
        };
        registry.run_all(&mut context, &[invocation]);
    }

    fn store() -> BindingStore {
        BindingStore::new(vec![
            BindingDeclaration::new("count", BindingKind::Number, "1"),
            BindingDeclaration::new("title", BindingKind::String, "hi"),
            BindingDeclaration::new("user", BindingKind::Object, json!({ "name": "ada" })),
        ])
    }

    // ── change_binding ───────────────────────────────────────────────

    #[test]
    fn writes_string_literal() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("change_binding")
                .with_detail("binding", "title")
                .with_detail("value", "bye"),
        );
        assert_eq!(store.get("title"), Some(json!("bye")));
    }

    #[test]
    fn coerces_typed_literals() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("change_binding")
                .with_detail("binding", "count")
                .with_detail("type", "number")
                .with_detail("value", "42"),
        );
        assert_eq!(store.get("count"), Some(json!(42)));
    }

    #[test]
    fn missing_value_writes_null() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("change_binding").with_detail("binding", "title"),
        );
        assert_eq!(store.get("title"), Some(Value::Null));
    }

    #[test]
    fn null_type_discards_value_and_writes_null() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("change_binding")
                .with_detail("binding", "title")
                .with_detail("type", "null")
                .with_detail("value", "ignored"),
        );
        assert_eq!(store.get("title"), Some(Value::Null));
    }

    #[test]
    fn expression_value_is_evaluated() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("change_binding")
                .with_detail("binding", "count")
                .with_detail("value", "$(count + 10)"),
        );
        assert_eq!(store.get("count"), Some(json!(11)));
    }

    #[test]
    fn reference_value_copies_a_binding() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("change_binding")
                .with_detail("binding", "title")
                .with_detail("value", "$user.name"),
        );
        assert_eq!(store.get("title"), Some(json!("ada")));
    }

    #[test]
    fn invalid_typed_literal_leaves_binding_untouched() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("change_binding")
                .with_detail("binding", "count")
                .with_detail("type", "number")
                .with_detail("value", "not a number"),
        );
        assert_eq!(store.get("count"), Some(json!(1)));
    }

    #[test]
    fn deep_write_honors_recursive_flag() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("change_binding")
                .with_detail("binding", "user.address.city")
                .with_detail("value", "Oslo"),
        );
        assert_eq!(store.get("user.address"), None);

        fire(
            &mut store,
            ActionInvocation::new("change_binding")
                .with_detail("binding", "user.address.city")
                .with_detail("value", "Oslo")
                .with_detail("recursive", true),
        );
        assert_eq!(store.get("user.address.city"), Some(json!("Oslo")));
    }

    // ── eval_expression ──────────────────────────────────────────────

    #[test]
    fn expression_assignment_mutates_store() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("eval_expression")
                .with_detail("expression", "count = count * 5"),
        );
        assert_eq!(store.get("count"), Some(json!(5)));
    }

    #[test]
    fn expression_sees_event_payload() {
        let mut store = store();
        fire_with(
            &mut store,
            ActionInvocation::new("eval_expression").with_detail("expression", "title = event"),
            &[json!("typed text")],
            &[],
        );
        assert_eq!(store.get("title"), Some(json!("typed text")));
    }

    #[test]
    fn expression_sees_all_call_args() {
        let mut store = store();
        fire_with(
            &mut store,
            ActionInvocation::new("eval_expression").with_detail("expression", "title = args[1]"),
            &[json!("first"), json!("second")],
            &[],
        );
        assert_eq!(store.get("title"), Some(json!("second")));
    }

    #[test]
    fn expression_sees_loop_scope() {
        let mut store = store();
        fire_with(
            &mut store,
            ActionInvocation::new("eval_expression")
                .with_detail("expression", "title = scope[0].label"),
            &[],
            &[json!({ "label": "row 3" })],
        );
        assert_eq!(store.get("title"), Some(json!("row 3")));
    }

    #[test]
    fn wrapped_expression_detail_is_unwrapped() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("eval_expression")
                .with_detail("expression", "$(count = 9)"),
        );
        assert_eq!(store.get("count"), Some(json!(9)));
    }

    #[test]
    fn bad_expression_is_caught() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("eval_expression").with_detail("expression", "count = ("),
        );
        assert_eq!(store.get("count"), Some(json!(1)));
    }

    // ── Stubs ────────────────────────────────────────────────────────

    #[test]
    fn stubs_accept_their_invocations() {
        let mut store = store();
        fire(
            &mut store,
            ActionInvocation::new("change_route").with_detail("route", "/home"),
        );
        fire(
            &mut store,
            ActionInvocation::new("make_http_request").with_detail("url", "https://example.test"),
        );
        // No observable state change; the point is that nothing fails.
        assert_eq!(store.get("count"), Some(json!(1)));
    }
}
