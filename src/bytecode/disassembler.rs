//! Human-readable bytecode listings.

use std::fmt::Write;

use crate::bytecode::chunk::{Chunk, Constant, Function};
use crate::bytecode::instruction::OpCode;

/// Disassemble a function and, recursively, every function in its
/// constant pool.
pub fn disassemble_function(function: &Function) -> String {
    let mut out = String::new();
    write_function(function, &mut out);
    out
}

fn write_function(function: &Function, out: &mut String) {
    let _ = writeln!(out, "== {} ==", function.display_name());
    write_chunk(&function.chunk, out);

    for constant in &function.chunk.constants {
        if let Constant::Function(nested) = constant {
            out.push('\n');
            write_function(nested, out);
        }
    }
}

fn write_chunk(chunk: &Chunk, out: &mut String) {
    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = write_instruction(chunk, offset, out);
    }
}

/// Render one instruction and return the offset of the next.
fn write_instruction(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let _ = write!(out, "{:04} ", offset);

    let line = chunk.get_line(offset);
    if offset > 0 && line == chunk.get_line(offset - 1) {
        let _ = write!(out, "   | ");
    } else {
        let _ = write!(out, "{:4} ", line);
    }

    let Some(op) = OpCode::from_u8(chunk.code[offset]) else {
        let _ = writeln!(out, "UNKNOWN {:#04x}", chunk.code[offset]);
        return offset + 1;
    };

    match op {
        OpCode::Constant
        | OpCode::GetGlobal
        | OpCode::DefineGlobal
        | OpCode::SetGlobal
        | OpCode::Class
        | OpCode::GetProperty
        | OpCode::SetProperty => {
            let index = chunk.code[offset + 1];
            let _ = writeln!(
                out,
                "{:<16} {:4} '{}'",
                op_name(op),
                index,
                constant_str(chunk, index)
            );
            offset + 2
        }

        OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::GetUpvalue
        | OpCode::SetUpvalue
        | OpCode::Call
        | OpCode::Array => {
            let operand = chunk.code[offset + 1];
            let _ = writeln!(out, "{:<16} {:4}", op_name(op), operand);
            offset + 2
        }

        OpCode::Jump | OpCode::JumpIfFalse => {
            let distance = chunk.read_u16(offset + 1) as usize;
            let _ = writeln!(
                out,
                "{:<16} {:4} -> {}",
                op_name(op),
                offset,
                offset + 3 + distance
            );
            offset + 3
        }
        OpCode::Loop => {
            let distance = chunk.read_u16(offset + 1) as usize;
            let target = (offset + 3).saturating_sub(distance);
            let _ = writeln!(out, "{:<16} {:4} -> {}", op_name(op), offset, target);
            offset + 3
        }

        OpCode::Closure => {
            let index = chunk.code[offset + 1];
            let _ = writeln!(
                out,
                "{:<16} {:4} {}",
                op_name(op),
                index,
                constant_str(chunk, index)
            );
            let mut next = offset + 2;

            // Each captured variable contributes an (is_local, index) pair.
            let upvalue_count = match chunk.constants.get(index as usize) {
                Some(Constant::Function(function)) => function.upvalue_count,
                _ => 0,
            };
            for _ in 0..upvalue_count {
                let is_local = chunk.code[next] != 0;
                let capture_index = chunk.code[next + 1];
                let _ = writeln!(
                    out,
                    "{:04}    |                     {} {}",
                    next,
                    if is_local { "local" } else { "upvalue" },
                    capture_index
                );
                next += 2;
            }
            next
        }

        _ => {
            let _ = writeln!(out, "{}", op_name(op));
            offset + 1
        }
    }
}

fn constant_str(chunk: &Chunk, index: u8) -> String {
    match chunk.constants.get(index as usize) {
        Some(Constant::Number(n)) => n.to_string(),
        Some(Constant::String(s)) => s.clone(),
        Some(Constant::Function(f)) => format!("<fn {}>", f.display_name()),
        None => "<bad constant>".to_string(),
    }
}

fn op_name(op: OpCode) -> &'static str {
    match op {
        OpCode::Constant => "CONSTANT",
        OpCode::Nil => "NIL",
        OpCode::True => "TRUE",
        OpCode::False => "FALSE",
        OpCode::Pop => "POP",
        OpCode::GetLocal => "GET_LOCAL",
        OpCode::SetLocal => "SET_LOCAL",
        OpCode::GetGlobal => "GET_GLOBAL",
        OpCode::DefineGlobal => "DEFINE_GLOBAL",
        OpCode::SetGlobal => "SET_GLOBAL",
        OpCode::GetUpvalue => "GET_UPVALUE",
        OpCode::SetUpvalue => "SET_UPVALUE",
        OpCode::CloseUpvalue => "CLOSE_UPVALUE",
        OpCode::Equal => "EQUAL",
        OpCode::Greater => "GREATER",
        OpCode::Less => "LESS",
        OpCode::Add => "ADD",
        OpCode::Subtract => "SUBTRACT",
        OpCode::Multiply => "MULTIPLY",
        OpCode::Divide => "DIVIDE",
        OpCode::Not => "NOT",
        OpCode::Negate => "NEGATE",
        OpCode::Print => "PRINT",
        OpCode::Jump => "JUMP",
        OpCode::JumpIfFalse => "JUMP_IF_FALSE",
        OpCode::Loop => "LOOP",
        OpCode::Call => "CALL",
        OpCode::Closure => "CLOSURE",
        OpCode::Return => "RETURN",
        OpCode::Class => "CLASS",
        OpCode::GetProperty => "GET_PROPERTY",
        OpCode::SetProperty => "SET_PROPERTY",
        OpCode::Array => "ARRAY",
        OpCode::IndexGet => "INDEX_GET",
        OpCode::IndexSet => "INDEX_SET",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::Compiler;
    use crate::lexer::Scanner;
    use crate::parser::Parser;

    fn disassemble(source: &str) -> String {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let function = Compiler::new().compile(&program).unwrap();
        disassemble_function(&function)
    }

    #[test]
    fn test_simple_listing() {
        let listing = disassemble("print 1 + 2;");
        assert!(listing.starts_with("== script =="));
        assert!(listing.contains("CONSTANT"));
        assert!(listing.contains("ADD"));
        assert!(listing.contains("PRINT"));
        assert!(listing.contains("RETURN"));
    }

    #[test]
    fn test_jump_targets_resolve() {
        let listing = disassemble("if (true) print 1;");
        assert!(listing.contains("JUMP_IF_FALSE"));
        assert!(listing.contains("->"));
    }

    #[test]
    fn test_nested_functions_are_listed() {
        let listing = disassemble("fun outer() { var x = 1; fun inner() { return x; } }");
        assert!(listing.contains("== outer =="));
        assert!(listing.contains("== inner =="));
        assert!(listing.contains("CLOSURE"));
        assert!(listing.contains("local 1"));
    }

    #[test]
    fn test_repeated_line_shows_pipe() {
        let listing = disassemble("print 1;");
        assert!(listing.contains("   | "));
    }
}
