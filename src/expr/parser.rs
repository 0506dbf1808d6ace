//! Recursive descent expression parser.
//!
//! Parses source text into a [`Program`] using the logos-based tokenizer
//! from [`crate::expr::token`].

use logos::Logos;

use super::ast::{BinaryOp, Expr, Program, UnaryOp};
use super::token::Token;

/// Errors from expression parsing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected token at position {position}: {message}")]
    UnexpectedToken { position: usize, message: String },
    #[error("unexpected end of input: {0}")]
    UnexpectedEof(String),
    #[error("invalid character at byte {0}")]
    InvalidCharacter(usize),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
}

/// A positioned token.
#[derive(Debug, Clone)]
struct PToken {
    token: Token,
    text: String,
    /// Index in the token stream (for error reporting).
    pos: usize,
}

fn tokenize(input: &str) -> Result<Vec<PToken>, ParseError> {
    let lexer = Token::lexer(input);
    let mut tokens = Vec::new();
    for (idx, (result, span)) in lexer.spanned().enumerate() {
        match result {
            Ok(token) => tokens.push(PToken {
                text: input[span].to_string(),
                token,
                pos: idx,
            }),
            Err(()) => return Err(ParseError::InvalidCharacter(span.start)),
        }
    }
    Ok(tokens)
}

/// Parse source text into a [`Program`].
pub fn parse(input: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, cursor: 0 };
    let program = parser.parse_program()?;
    if let Some(extra) = parser.peek() {
        return Err(ParseError::UnexpectedToken {
            position: extra.pos,
            message: format!("trailing input '{}'", extra.text),
        });
    }
    Ok(program)
}

/// Recursive descent parser state.
struct Parser {
    tokens: Vec<PToken>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&PToken> {
        self.tokens.get(self.cursor)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|positioned| &positioned.token)
    }

    fn advance(&mut self) -> Option<PToken> {
        let tok = self.tokens.get(self.cursor).cloned();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    /// Consume the next token when it matches.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek_token() == Some(expected) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<PToken, ParseError> {
        match self.advance() {
            Some(tok) if &tok.token == expected => Ok(tok),
            Some(tok) => Err(ParseError::UnexpectedToken {
                position: tok.pos,
                message: format!("expected {:?}, got {:?} '{}'", expected, tok.token, tok.text),
            }),
            None => Err(ParseError::UnexpectedEof(format!("expected {:?}", expected))),
        }
    }

    // ── Program ──────────────────────────────────────────────────────

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        if let Some(after_path) = self.assignment_target_end() {
            let target = self.tokens[..after_path]
                .iter()
                .filter(|positioned| positioned.token == Token::Ident)
                .map(|positioned| positioned.text.as_str())
                .collect::<Vec<_>>()
                .join(".");
            self.cursor = after_path + 1; // past the `=`
            let value = self.parse_expr()?;
            return Ok(Program::Assign { target, value });
        }
        Ok(Program::Value(self.parse_expr()?))
    }

    /// When the stream starts with `ident (. ident)* =`, return the index of
    /// the `=` token.
    fn assignment_target_end(&self) -> Option<usize> {
        let mut index = 0;
        if self.tokens.get(index)?.token != Token::Ident {
            return None;
        }
        index += 1;
        while self.tokens.get(index)?.token == Token::Dot {
            if self.tokens.get(index + 1)?.token != Token::Ident {
                return None;
            }
            index += 2;
        }
        (self.tokens.get(index)?.token == Token::Eq).then_some(index)
    }

    // ── Expressions, lowest to highest precedence ────────────────────

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let condition = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then_branch = self.parse_expr()?;
        self.expect(&Token::Colon)?;
        let else_branch = self.parse_expr()?;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.cursor += 1;
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.cursor += 1;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.cursor += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.cursor += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_token() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.cursor += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let property = self.expect_ident()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat(&Token::BracketOpen) {
                let index = self.parse_expr()?;
                self.expect(&Token::BracketClose)?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.peek_token() == Some(&Token::ParenOpen) {
                // Only bare names are callable.
                let Expr::Ident(function) = expr else {
                    let position = self.peek().map(|tok| tok.pos).unwrap_or(0);
                    return Err(ParseError::UnexpectedToken {
                        position,
                        message: "only named functions can be called".into(),
                    });
                };
                self.cursor += 1;
                let args = self.parse_call_args()?;
                expr = Expr::Call { function, args };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&Token::ParenClose) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::ParenClose)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(tok) = self.advance() else {
            return Err(ParseError::UnexpectedEof("expected an expression".into()));
        };
        match tok.token {
            Token::Number => tok
                .text
                .parse::<f64>()
                .map(Expr::Number)
                .map_err(|_| ParseError::InvalidNumber(tok.text)),
            Token::StringLiteral | Token::StringLiteralSingle => {
                Ok(Expr::Str(tok.text[1..tok.text.len() - 1].to_string()))
            }
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Null => Ok(Expr::Null),
            Token::Ident => Ok(Expr::Ident(tok.text)),
            Token::ParenOpen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::ParenClose)?;
                Ok(inner)
            }
            other => Err(ParseError::UnexpectedToken {
                position: tok.pos,
                message: format!("expected an expression, got {:?} '{}'", other, tok.text),
            }),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        let tok = self.expect(&Token::Ident)?;
        Ok(tok.text)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
