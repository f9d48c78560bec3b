//! Abstract Syntax Tree for Lumen.

pub mod expr;
pub mod stmt;

pub use expr::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
pub use stmt::{FunctionDecl, Parameter, Program, Stmt, StmtKind};
