//! Sandboxed expression language: tokenizer, AST, parser, evaluator.
//!
//! Property values and action details select their meaning with a sigil:
//! `$(expr)` evaluates an expression, `$name` reads a binding path directly,
//! anything else is a literal. [`classify`] makes that split.

pub mod ast;
pub mod eval;
pub mod parser;
pub mod token;

pub use ast::{BinaryOp, Expr, Program, UnaryOp};
pub use eval::{display, eval, run, truthy, EvalContext, ExprCache, ExprError};
pub use parser::{parse, ParseError};

/// How a string value should be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertySource<'a> {
    /// `$(...)`: evaluate the inner expression.
    Expression(&'a str),
    /// `$path.to.binding`: read the binding path directly.
    Reference(&'a str),
    /// Plain literal text.
    Literal(&'a str),
}

/// Classify a raw string property by its sigil.
pub fn classify(raw: &str) -> PropertySource<'_> {
    if let Some(inner) = raw.strip_prefix("$(").and_then(|rest| rest.strip_suffix(')')) {
        PropertySource::Expression(inner.trim())
    } else if let Some(path) = raw.strip_prefix('$') {
        PropertySource::Reference(path)
    } else {
        PropertySource::Literal(raw)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_expression() {
        assert_eq!(classify("$(count + 1)"), PropertySource::Expression("count + 1"));
    }

    #[test]
    fn classify_reference() {
        assert_eq!(classify("$user.name"), PropertySource::Reference("user.name"));
    }

    #[test]
    fn classify_literal() {
        assert_eq!(classify("plain text"), PropertySource::Literal("plain text"));
        assert_eq!(classify("100$"), PropertySource::Literal("100$"));
    }

    #[test]
    fn unbalanced_sigil_is_a_reference() {
        // `$(x` has no closing paren, so it falls through to the `$` form.
        assert_eq!(classify("$(x"), PropertySource::Reference("(x"));
    }
}
