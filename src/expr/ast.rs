//! Expression syntax tree.
//!
//! The language is deliberately small: literals, binding references, member
//! and index access, arithmetic, comparison, boolean logic, a ternary, calls
//! to allow-listed functions, and a single top-level assignment form. There
//! is no way to reach anything outside the binding store.

/// A parsed source: either a value expression or an assignment statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Program {
    /// Evaluates to a value.
    Value(Expr),
    /// `path.to.binding = expr`. Only valid at the top level.
    Assign { target: String, value: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    /// A bare name, resolved against the evaluation scope then the bindings.
    Ident(String),
    /// `object.property`
    Member { object: Box<Expr>, property: String },
    /// `object[index]`
    Index { object: Box<Expr>, index: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    /// `condition ? then_branch : else_branch`
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// Call to an allow-listed named function.
    Call { function: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}
