//! logos-based expression tokenizer.
//!
//! Token priority in logos is determined by:
//! 1. Longest match wins (e.g. `==` beats `=` + `=`)
//! 2. For equal length matches, earlier-defined variants win
//!
//! Keywords are defined before [`Token::Ident`] so `true` lexes as
//! [`Token::True`] and not as an identifier.

use logos::Logos;

/// Expression token produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // ── Keywords ─────────────────────────────────────────────────────

    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("null")]
    Null,

    // ── Literals and names ───────────────────────────────────────────

    /// Number: integer or float. Sign is a separate unary operator.
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,

    /// Double-quoted string literal.
    #[regex(r#""[^"]*""#)]
    StringLiteral,

    /// Single-quoted string literal.
    #[regex(r"'[^']*'")]
    StringLiteralSingle,

    /// Identifier: binding names, path segments, function names.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ── Two-character operators (defined before their prefixes) ──────

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<=")]
    Le,

    #[token(">=")]
    Ge,

    #[token("&&")]
    AndAnd,

    #[token("||")]
    OrOr,

    // ── Single-character operators and punctuation ───────────────────

    #[token("=")]
    Eq,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token("!")]
    Bang,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token(".")]
    Dot,

    #[token(",")]
    Comma,

    #[token("?")]
    Question,

    #[token(":")]
    Colon,
}

// ===========================================================================
// Tests
// ===========================================================================
