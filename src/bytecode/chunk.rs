//! Bytecode chunk containing instructions and constants.

use std::rc::Rc;

use crate::bytecode::instruction::OpCode;

/// A chunk of bytecode with its constant pool and line table.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// The bytecode instructions.
    pub code: Vec<u8>,
    /// The constant pool. Entries are appended as-is, never deduplicated,
    /// so indexes are stable across identical literals.
    pub constants: Vec<Constant>,
    /// Source line for each byte of `code` (parallel array).
    pub lines: Vec<u32>,
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Write an opcode to the chunk.
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.code.push(op as u8);
        self.lines.push(line);
    }

    /// Write a raw byte to the chunk.
    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write a 16-bit value to the chunk (big-endian).
    pub fn write_u16(&mut self, value: u16, line: u32) {
        self.code.push((value >> 8) as u8);
        self.lines.push(line);
        self.code.push((value & 0xff) as u8);
        self.lines.push(line);
    }

    /// Read a 16-bit big-endian value from the chunk at offset.
    pub fn read_u16(&self, offset: usize) -> u16 {
        let hi = self.code[offset] as u16;
        let lo = self.code[offset + 1] as u16;
        (hi << 8) | lo
    }

    /// Overwrite a 16-bit big-endian value at the given offset.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        self.code[offset] = (value >> 8) as u8;
        self.code[offset + 1] = (value & 0xff) as u8;
    }

    /// Add a constant to the pool and return its index. The compiler is
    /// responsible for rejecting indexes that do not fit in one byte.
    pub fn add_constant(&mut self, constant: Constant) -> usize {
        self.constants.push(constant);
        self.constants.len() - 1
    }

    /// Get the current offset in the code.
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Get the line number at a given offset.
    pub fn get_line(&self, offset: usize) -> u32 {
        self.lines.get(offset).copied().unwrap_or(0)
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

/// A constant value in the constant pool.
#[derive(Debug, Clone)]
pub enum Constant {
    /// Number constant
    Number(f64),
    /// String constant (also used for identifier names)
    String(String),
    /// Function constant
    Function(Rc<Function>),
}

/// A compiled function: its bytecode plus calling metadata.
///
/// `name` is `None` for the top-level script.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Option<String>,
    pub arity: u8,
    pub upvalue_count: usize,
    pub chunk: Chunk,
}

impl Function {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            arity: 0,
            upvalue_count: 0,
            chunk: Chunk::new(),
        }
    }

    /// The name shown in diagnostics and disassembly.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("script")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_write() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write_byte(0, 1);
        chunk.write_op(OpCode::Return, 2);

        assert_eq!(chunk.code.len(), 3);
        assert_eq!(chunk.code[0], OpCode::Constant as u8);
        assert_eq!(chunk.code[2], OpCode::Return as u8);
        assert_eq!(chunk.lines, vec![1, 1, 2]);
    }

    #[test]
    fn test_u16_is_big_endian() {
        let mut chunk = Chunk::new();
        chunk.write_u16(0x1234, 1);
        assert_eq!(chunk.code, vec![0x12, 0x34]);
        assert_eq!(chunk.read_u16(0), 0x1234);

        chunk.patch_u16(0, 0xBEEF);
        assert_eq!(chunk.code, vec![0xBE, 0xEF]);
    }

    #[test]
    fn test_constants_are_not_deduplicated() {
        let mut chunk = Chunk::new();
        let a = chunk.add_constant(Constant::Number(1.0));
        let b = chunk.add_constant(Constant::Number(1.0));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(chunk.constants.len(), 2);
    }
}
