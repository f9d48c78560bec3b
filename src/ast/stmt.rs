//! Statement AST nodes.

use crate::ast::expr::Expr;
use crate::span::Span;

/// A complete parsed program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A statement in the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement variants.
///
/// `for` loops never appear here: the parser desugars them into an
/// initializer block wrapping a `While`.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement: expr;
    Expression(Expr),

    /// Print statement: print expr;
    Print(Expr),

    /// Variable declaration: var x = expr;
    Var {
        name: String,
        initializer: Option<Expr>,
    },

    /// Block: { statements }
    Block(Vec<Stmt>),

    /// If statement: if (cond) stmt else stmt
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// While loop: while (cond) stmt
    While { condition: Expr, body: Box<Stmt> },

    /// Function declaration
    Function(FunctionDecl),

    /// Return statement: return expr;
    Return(Option<Expr>),

    /// Class declaration: class Name {}
    Class { name: String },
}

/// Function declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub span: Span,
}
