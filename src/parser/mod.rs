//! Recursive-descent parser for Lumen.

mod core;
mod expressions;
mod statements;


pub use self::core::Parser;
