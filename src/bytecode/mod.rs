//! Bytecode compiler and virtual machine.
//!
//! The pipeline hands a parsed [`crate::ast::Program`] to the
//! [`compiler::Compiler`], which produces a top-level
//! [`chunk::Function`]; the [`vm::Vm`] then executes it.

pub mod chunk;
pub mod compiler;
pub mod disassembler;
pub mod instruction;
pub mod object;
pub mod vm;

pub use chunk::{Chunk, Constant, Function};
pub use compiler::Compiler;
pub use instruction::OpCode;
pub use object::Value;
pub use vm::Vm;
