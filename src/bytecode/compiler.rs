//! Single-pass compiler from the AST to bytecode.

use std::rc::Rc;

use crate::ast::{
    BinaryOp, Expr, ExprKind, FunctionDecl, LogicalOp, Program, Stmt, StmtKind, UnaryOp,
};
use crate::bytecode::chunk::{Chunk, Constant, Function};
use crate::bytecode::instruction::{OpCode, UpvalueInfo};
use crate::error::CompileError;
use crate::span::Span;

pub type CompileResult<T> = Result<T, CompileError>;

/// Locals per function, including the reserved callee slot.
pub const MAX_LOCALS: usize = 256;
/// Captured variables per function.
pub const MAX_UPVALUES: usize = 256;
/// Constant pool entries per chunk; indexes must fit in one byte.
pub const MAX_CONSTANTS: usize = 256;

/// A local variable tracked at compile time.
///
/// `depth` is `None` between declaration and the end of the initializer,
/// which is what makes `var a = a;` detectable.
struct Local {
    name: String,
    depth: Option<usize>,
    is_captured: bool,
}

/// Per-function compilation state. Function declarations nest, so the
/// compiler keeps a stack of these with the innermost function last.
struct FunctionState {
    function: Function,
    locals: Vec<Local>,
    upvalues: Vec<UpvalueInfo>,
    scope_depth: usize,
}

impl FunctionState {
    fn new(name: Option<String>) -> Self {
        // Slot 0 belongs to the callee and is never resolvable by name.
        let callee_slot = Local {
            name: String::new(),
            depth: Some(0),
            is_captured: false,
        };
        Self {
            function: Function::new(name),
            locals: vec![callee_slot],
            upvalues: Vec::new(),
            scope_depth: 0,
        }
    }
}

/// The bytecode compiler.
///
/// An error inside one top-level declaration is recorded and compilation
/// resumes at the next, so a single pass reports every diagnostic. No
/// bytecode reaches the VM unless the whole program compiled cleanly.
pub struct Compiler {
    states: Vec<FunctionState>,
    line: u32,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            states: vec![FunctionState::new(None)],
            line: 1,
        }
    }

    /// Compile a program into its top-level function.
    pub fn compile(mut self, program: &Program) -> Result<Function, Vec<CompileError>> {
        let mut errors = Vec::new();

        for stmt in &program.statements {
            if let Err(err) = self.statement(stmt) {
                errors.push(err);
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        self.emit_return();
        let state = match self.states.pop() {
            Some(state) => state,
            None => return Err(errors),
        };
        Ok(state.function)
    }

    // ============ Statements ============

    fn statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        self.line = stmt.span.line as u32;

        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.expression(expr)?;
                self.emit_op(OpCode::Pop);
            }
            StmtKind::Print(expr) => {
                self.expression(expr)?;
                self.emit_op(OpCode::Print);
            }
            StmtKind::Var { name, initializer } => {
                self.var_statement(name, initializer.as_ref(), stmt.span)?;
            }
            StmtKind::Block(statements) => {
                self.begin_scope();
                let result = self.block(statements);
                self.end_scope();
                result?;
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.if_statement(condition, then_branch, else_branch.as_deref(), stmt.span)?;
            }
            StmtKind::While { condition, body } => {
                self.while_statement(condition, body, stmt.span)?;
            }
            StmtKind::Function(decl) => {
                self.function_statement(decl)?;
            }
            StmtKind::Return(value) => {
                if self.states.len() == 1 {
                    return Err(CompileError::ReturnFromScript(stmt.span));
                }
                match value {
                    Some(expr) => self.expression(expr)?,
                    None => self.emit_op(OpCode::Nil),
                }
                self.emit_op(OpCode::Return);
            }
            StmtKind::Class { name } => {
                self.class_statement(name, stmt.span)?;
            }
        }

        Ok(())
    }

    fn block(&mut self, statements: &[Stmt]) -> CompileResult<()> {
        for stmt in statements {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn var_statement(
        &mut self,
        name: &str,
        initializer: Option<&Expr>,
        span: Span,
    ) -> CompileResult<()> {
        let is_local = self.current().scope_depth > 0;

        // Declared before the initializer compiles, so a read of the same
        // name inside it resolves here and gets rejected.
        if is_local {
            self.declare_local(name, span)?;
        }

        match initializer {
            Some(expr) => self.expression(expr)?,
            None => self.emit_op(OpCode::Nil),
        }

        if is_local {
            self.mark_initialized();
        } else {
            let index = self.name_constant(name, span)?;
            self.emit_op(OpCode::DefineGlobal);
            self.emit_byte(index);
        }

        Ok(())
    }

    fn if_statement(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
        span: Span,
    ) -> CompileResult<()> {
        self.expression(condition)?;

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement(then_branch)?;

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump, span)?;
        self.emit_op(OpCode::Pop);

        if let Some(else_branch) = else_branch {
            self.statement(else_branch)?;
        }
        self.patch_jump(else_jump, span)?;

        Ok(())
    }

    fn while_statement(&mut self, condition: &Expr, body: &Stmt, span: Span) -> CompileResult<()> {
        let loop_start = self.current_chunk().current_offset();

        self.expression(condition)?;
        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);

        self.statement(body)?;
        self.emit_loop(loop_start, span)?;

        self.patch_jump(exit_jump, span)?;
        self.emit_op(OpCode::Pop);

        Ok(())
    }

    fn function_statement(&mut self, decl: &FunctionDecl) -> CompileResult<()> {
        let is_local = self.current().scope_depth > 0;

        // Bound and initialized up front so the body can recurse.
        if is_local {
            self.declare_local(&decl.name, decl.span)?;
            self.mark_initialized();
        }

        self.compile_function(decl)?;

        if !is_local {
            let index = self.name_constant(&decl.name, decl.span)?;
            self.emit_op(OpCode::DefineGlobal);
            self.emit_byte(index);
        }

        Ok(())
    }

    /// Compile a function body in a fresh state and emit the Closure
    /// instruction with its upvalue descriptor pairs.
    fn compile_function(&mut self, decl: &FunctionDecl) -> CompileResult<()> {
        self.states.push(FunctionState::new(Some(decl.name.clone())));
        self.current_mut().function.arity = decl.params.len() as u8;
        self.current_mut().scope_depth = 1;

        for param in &decl.params {
            self.declare_local(&param.name, param.span)?;
            self.mark_initialized();
        }

        let body_result = self.block(&decl.body);

        self.emit_return();
        let state = self
            .states
            .pop()
            .ok_or_else(|| CompileError::new("compiler state underflow", decl.span))?;
        body_result?;

        let mut function = state.function;
        function.upvalue_count = state.upvalues.len();

        self.line = decl.span.line as u32;
        let index = self.make_constant(Constant::Function(Rc::new(function)), decl.span)?;
        self.emit_op(OpCode::Closure);
        self.emit_byte(index);
        for upvalue in &state.upvalues {
            self.emit_byte(upvalue.is_local as u8);
            self.emit_byte(upvalue.index);
        }

        Ok(())
    }

    fn class_statement(&mut self, name: &str, span: Span) -> CompileResult<()> {
        let is_local = self.current().scope_depth > 0;
        if is_local {
            self.declare_local(name, span)?;
        }

        let index = self.name_constant(name, span)?;
        self.emit_op(OpCode::Class);
        self.emit_byte(index);

        if is_local {
            self.mark_initialized();
        } else {
            self.emit_op(OpCode::DefineGlobal);
            self.emit_byte(index);
        }

        Ok(())
    }

    // ============ Expressions ============

    fn expression(&mut self, expr: &Expr) -> CompileResult<()> {
        self.line = expr.span.line as u32;

        match &expr.kind {
            ExprKind::Number(n) => {
                self.emit_constant(Constant::Number(*n), expr.span)?;
            }
            ExprKind::String(s) => {
                self.emit_constant(Constant::String(s.clone()), expr.span)?;
            }
            ExprKind::Bool(true) => self.emit_op(OpCode::True),
            ExprKind::Bool(false) => self.emit_op(OpCode::False),
            ExprKind::Nil => self.emit_op(OpCode::Nil),
            ExprKind::Variable(name) => {
                self.named_variable(name, expr.span, false)?;
            }
            ExprKind::Assign { name, value } => {
                self.expression(value)?;
                self.named_variable(name, expr.span, true)?;
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                self.expression(left)?;
                self.expression(right)?;
                self.binary_operator(*operator);
            }
            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                self.logical(left, *operator, right, expr.span)?;
            }
            ExprKind::Unary { operator, operand } => {
                self.expression(operand)?;
                match operator {
                    UnaryOp::Negate => self.emit_op(OpCode::Negate),
                    UnaryOp::Not => self.emit_op(OpCode::Not),
                }
            }
            ExprKind::Grouping(inner) => {
                self.expression(inner)?;
            }
            ExprKind::Call { callee, arguments } => {
                self.expression(callee)?;
                for argument in arguments {
                    self.expression(argument)?;
                }
                self.emit_op(OpCode::Call);
                self.emit_byte(arguments.len() as u8);
            }
            ExprKind::Get { object, name } => {
                self.expression(object)?;
                let index = self.name_constant(name, expr.span)?;
                self.emit_op(OpCode::GetProperty);
                self.emit_byte(index);
            }
            ExprKind::Set {
                object,
                name,
                value,
            } => {
                self.expression(object)?;
                self.expression(value)?;
                let index = self.name_constant(name, expr.span)?;
                self.emit_op(OpCode::SetProperty);
                self.emit_byte(index);
            }
            ExprKind::Index { object, index } => {
                self.expression(object)?;
                self.expression(index)?;
                self.emit_op(OpCode::IndexGet);
            }
            ExprKind::IndexSet {
                object,
                index,
                value,
            } => {
                self.expression(object)?;
                self.expression(index)?;
                self.expression(value)?;
                self.emit_op(OpCode::IndexSet);
            }
            ExprKind::Array(elements) => {
                if elements.len() > u8::MAX as usize {
                    return Err(CompileError::new(
                        "Too many elements in array literal",
                        expr.span,
                    ));
                }
                for element in elements {
                    self.expression(element)?;
                }
                self.emit_op(OpCode::Array);
                self.emit_byte(elements.len() as u8);
            }
            ExprKind::This => {
                return Err(CompileError::ThisOutsideMethod(expr.span));
            }
        }

        Ok(())
    }

    fn binary_operator(&mut self, operator: BinaryOp) {
        match operator {
            BinaryOp::Add => self.emit_op(OpCode::Add),
            BinaryOp::Subtract => self.emit_op(OpCode::Subtract),
            BinaryOp::Multiply => self.emit_op(OpCode::Multiply),
            BinaryOp::Divide => self.emit_op(OpCode::Divide),
            BinaryOp::Equal => self.emit_op(OpCode::Equal),
            BinaryOp::NotEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            BinaryOp::Less => self.emit_op(OpCode::Less),
            BinaryOp::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            BinaryOp::Greater => self.emit_op(OpCode::Greater),
            BinaryOp::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
        }
    }

    fn logical(
        &mut self,
        left: &Expr,
        operator: LogicalOp,
        right: &Expr,
        span: Span,
    ) -> CompileResult<()> {
        self.expression(left)?;

        match operator {
            LogicalOp::And => {
                let end_jump = self.emit_jump(OpCode::JumpIfFalse);
                self.emit_op(OpCode::Pop);
                self.expression(right)?;
                self.patch_jump(end_jump, span)?;
            }
            LogicalOp::Or => {
                let else_jump = self.emit_jump(OpCode::JumpIfFalse);
                let end_jump = self.emit_jump(OpCode::Jump);
                self.patch_jump(else_jump, span)?;
                self.emit_op(OpCode::Pop);
                self.expression(right)?;
                self.patch_jump(end_jump, span)?;
            }
        }

        Ok(())
    }

    // ============ Variable resolution ============

    fn named_variable(&mut self, name: &str, span: Span, assign: bool) -> CompileResult<()> {
        let state = self.states.len() - 1;

        if let Some(slot) = self.resolve_local(state, name, span)? {
            let op = if assign {
                OpCode::SetLocal
            } else {
                OpCode::GetLocal
            };
            self.emit_op(op);
            self.emit_byte(slot);
        } else if let Some(index) = self.resolve_upvalue(state, name, span)? {
            let op = if assign {
                OpCode::SetUpvalue
            } else {
                OpCode::GetUpvalue
            };
            self.emit_op(op);
            self.emit_byte(index);
        } else {
            let index = self.name_constant(name, span)?;
            let op = if assign {
                OpCode::SetGlobal
            } else {
                OpCode::GetGlobal
            };
            self.emit_op(op);
            self.emit_byte(index);
        }

        Ok(())
    }

    /// Resolve a name against the locals of the given function state,
    /// innermost declaration first.
    fn resolve_local(
        &self,
        state: usize,
        name: &str,
        span: Span,
    ) -> CompileResult<Option<u8>> {
        for (slot, local) in self.states[state].locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth.is_none() {
                    return Err(CompileError::ReadInInitializer(name.to_string(), span));
                }
                return Ok(Some(slot as u8));
            }
        }
        Ok(None)
    }

    /// Resolve a name against enclosing functions, threading an upvalue
    /// through every function in between. The captured local is flagged so
    /// its scope exit emits CloseUpvalue instead of Pop.
    fn resolve_upvalue(
        &mut self,
        state: usize,
        name: &str,
        span: Span,
    ) -> CompileResult<Option<u8>> {
        if state == 0 {
            return Ok(None);
        }
        let enclosing = state - 1;

        if let Some(slot) = self.resolve_local(enclosing, name, span)? {
            self.states[enclosing].locals[slot as usize].is_captured = true;
            return self.add_upvalue(state, slot, true, span).map(Some);
        }

        if let Some(index) = self.resolve_upvalue(enclosing, name, span)? {
            return self.add_upvalue(state, index, false, span).map(Some);
        }

        Ok(None)
    }

    fn add_upvalue(
        &mut self,
        state: usize,
        index: u8,
        is_local: bool,
        span: Span,
    ) -> CompileResult<u8> {
        let upvalues = &mut self.states[state].upvalues;

        for (i, upvalue) in upvalues.iter().enumerate() {
            if upvalue.index == index && upvalue.is_local == is_local {
                return Ok(i as u8);
            }
        }

        if upvalues.len() >= MAX_UPVALUES {
            return Err(CompileError::TooManyUpvalues(span));
        }
        upvalues.push(UpvalueInfo::new(is_local, index));
        Ok((upvalues.len() - 1) as u8)
    }

    // ============ Scopes & locals ============

    fn begin_scope(&mut self) {
        self.current_mut().scope_depth += 1;
    }

    /// Close the current scope, discarding its locals last-declared first.
    /// Captured locals are closed into their upvalues instead of popped.
    fn end_scope(&mut self) {
        self.current_mut().scope_depth -= 1;
        let scope_depth = self.current().scope_depth;

        loop {
            let op = match self.current().locals.last() {
                Some(local) if matches!(local.depth, Some(depth) if depth > scope_depth) => {
                    if local.is_captured {
                        OpCode::CloseUpvalue
                    } else {
                        OpCode::Pop
                    }
                }
                _ => break,
            };
            self.emit_op(op);
            self.current_mut().locals.pop();
        }
    }

    fn declare_local(&mut self, name: &str, span: Span) -> CompileResult<()> {
        let scope_depth = self.current().scope_depth;

        for local in self.current().locals.iter().rev() {
            match local.depth {
                Some(depth) if depth < scope_depth => break,
                _ => {}
            }
            if local.name == name {
                return Err(CompileError::DuplicateVariable(name.to_string(), span));
            }
        }

        if self.current().locals.len() >= MAX_LOCALS {
            return Err(CompileError::TooManyLocals(span));
        }

        self.current_mut().locals.push(Local {
            name: name.to_string(),
            depth: None,
            is_captured: false,
        });
        Ok(())
    }

    fn mark_initialized(&mut self) {
        let scope_depth = self.current().scope_depth;
        if let Some(local) = self.current_mut().locals.last_mut() {
            local.depth = Some(scope_depth);
        }
    }

    // ============ Emit helpers ============

    // The state stack always holds at least the script entry.
    fn current(&self) -> &FunctionState {
        let last = self.states.len() - 1;
        &self.states[last]
    }

    fn current_mut(&mut self) -> &mut FunctionState {
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.current_mut().function.chunk
    }

    fn emit_op(&mut self, op: OpCode) {
        let line = self.line;
        self.current_chunk().write_op(op, line);
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.line;
        self.current_chunk().write_byte(byte, line);
    }

    fn emit_return(&mut self) {
        self.emit_op(OpCode::Nil);
        self.emit_op(OpCode::Return);
    }

    fn make_constant(&mut self, constant: Constant, span: Span) -> CompileResult<u8> {
        let index = self.current_chunk().add_constant(constant);
        if index >= MAX_CONSTANTS {
            return Err(CompileError::TooManyConstants(span));
        }
        Ok(index as u8)
    }

    fn emit_constant(&mut self, constant: Constant, span: Span) -> CompileResult<()> {
        let index = self.make_constant(constant, span)?;
        self.emit_op(OpCode::Constant);
        self.emit_byte(index);
        Ok(())
    }

    fn name_constant(&mut self, name: &str, span: Span) -> CompileResult<u8> {
        self.make_constant(Constant::String(name.to_string()), span)
    }

    /// Emit a jump with a placeholder offset and return the offset of the
    /// operand for later patching.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        let line = self.line;
        let offset = self.current_chunk().current_offset();
        self.current_chunk().write_u16(0xffff, line);
        offset
    }

    /// Patch a forward jump to land on the next instruction to be emitted.
    fn patch_jump(&mut self, offset: usize, span: Span) -> CompileResult<()> {
        let distance = self.current_chunk().current_offset() - offset - 2;
        if distance > u16::MAX as usize {
            return Err(CompileError::JumpTooLarge(span));
        }
        self.current_chunk().patch_u16(offset, distance as u16);
        Ok(())
    }

    /// Emit a backward jump to `loop_start`. The operand counts from the
    /// position after itself, hence the +2.
    fn emit_loop(&mut self, loop_start: usize, span: Span) -> CompileResult<()> {
        self.emit_op(OpCode::Loop);
        let distance = self.current_chunk().current_offset() - loop_start + 2;
        if distance > u16::MAX as usize {
            return Err(CompileError::LoopTooLarge(span));
        }
        let line = self.line;
        self.current_chunk().write_u16(distance as u16, line);
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> Function {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        Compiler::new().compile(&program).unwrap()
    }

    fn compile_errors(source: &str) -> Vec<CompileError> {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        Compiler::new().compile(&program).unwrap_err()
    }

    #[test]
    fn test_compiles_deterministically() {
        let source = "fun f(n) { if (n < 2) return n; return f(n - 1) + f(n - 2); } print f(10);";
        let a = compile(source);
        let b = compile(source);
        assert_eq!(a.chunk.code, b.chunk.code);
        assert_eq!(a.chunk.lines, b.chunk.lines);
    }

    #[test]
    fn test_print_number() {
        let function = compile("print 1;");
        assert_eq!(
            function.chunk.code,
            vec![
                OpCode::Constant as u8,
                0,
                OpCode::Print as u8,
                OpCode::Nil as u8,
                OpCode::Return as u8,
            ]
        );
    }

    #[test]
    fn test_comparison_operators_desugar() {
        let function = compile("1 != 2;");
        assert_eq!(function.chunk.code[4], OpCode::Equal as u8);
        assert_eq!(function.chunk.code[5], OpCode::Not as u8);

        let function = compile("1 <= 2;");
        assert_eq!(function.chunk.code[4], OpCode::Greater as u8);
        assert_eq!(function.chunk.code[5], OpCode::Not as u8);
    }

    #[test]
    fn test_if_emits_patched_jumps() {
        let function = compile("if (true) print 1; else print 2;");
        let chunk = &function.chunk;

        assert_eq!(chunk.code[0], OpCode::True as u8);
        assert_eq!(chunk.code[1], OpCode::JumpIfFalse as u8);
        // Then arm: Pop, Constant c, Print, Jump o16.
        let then_distance = chunk.read_u16(2) as usize;
        assert_eq!(then_distance, 7);
        // Landing pad of the exit jump is the trailing Nil.
        assert_eq!(chunk.code[8], OpCode::Jump as u8);
        let exit_distance = chunk.read_u16(9) as usize;
        assert_eq!(11 + exit_distance, chunk.code.len() - 2);
    }

    #[test]
    fn test_loop_jumps_back_to_condition() {
        let function = compile("while (false) print 1;");
        let chunk = &function.chunk;
        let loop_offset = chunk
            .code
            .iter()
            .position(|&b| b == OpCode::Loop as u8)
            .unwrap();
        let distance = chunk.read_u16(loop_offset + 1) as usize;
        // Jumping back from just past the operand lands on the condition.
        assert_eq!(loop_offset + 3 - distance, 0);
    }

    #[test]
    fn test_duplicate_local_is_an_error() {
        let errors = compile_errors("{ var a = 1; var a = 2; }");
        assert!(matches!(errors[0], CompileError::DuplicateVariable(..)));
    }

    #[test]
    fn test_read_in_own_initializer() {
        let errors = compile_errors("{ var a = a; }");
        assert!(matches!(errors[0], CompileError::ReadInInitializer(..)));
    }

    #[test]
    fn test_shadowing_global_is_allowed() {
        // Same name, different scopes: the inner one is a fresh local.
        compile("var a = 1; { var a = 2; print a; } print a;");
    }

    #[test]
    fn test_return_at_top_level() {
        let errors = compile_errors("return 1;");
        assert!(matches!(errors[0], CompileError::ReturnFromScript(_)));
    }

    #[test]
    fn test_this_is_rejected() {
        let errors = compile_errors("print this;");
        assert!(matches!(errors[0], CompileError::ThisOutsideMethod(_)));
    }

    #[test]
    fn test_errors_collected_across_statements() {
        let errors = compile_errors("return 1; print this;");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_closure_upvalue_descriptors() {
        let function = compile(
            "fun outer() { var x = 1; fun inner() { return x; } return inner; }",
        );
        let outer = function
            .chunk
            .constants
            .iter()
            .find_map(|c| match c {
                Constant::Function(f) => Some(f.clone()),
                _ => None,
            })
            .unwrap();
        let inner = outer
            .chunk
            .constants
            .iter()
            .find_map(|c| match c {
                Constant::Function(f) => Some(f.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(inner.upvalue_count, 1);

        // The Closure instruction carries (is_local=1, index=1): slot 1 of
        // outer, right after the callee slot.
        let closure_offset = outer
            .chunk
            .code
            .iter()
            .position(|&b| b == OpCode::Closure as u8)
            .unwrap();
        assert_eq!(outer.chunk.code[closure_offset + 2], 1);
        assert_eq!(outer.chunk.code[closure_offset + 3], 1);
    }

    #[test]
    fn test_captured_local_closes_on_scope_exit() {
        let function = compile("{ var x = 1; fun f() { return x; } } print 1;");
        assert!(function
            .chunk
            .code
            .contains(&(OpCode::CloseUpvalue as u8)));
    }

    #[test]
    fn test_too_many_constants() {
        let mut source = String::new();
        for i in 0..257 {
            source.push_str(&format!("print {};", i));
        }
        let errors = compile_errors(&source);
        assert!(matches!(errors[0], CompileError::TooManyConstants(_)));
    }

    #[test]
    fn test_flat_script_within_constant_budget() {
        // Fifty global declarations of the benchmark shape: four pool
        // entries each (three numbers plus the name), 200 in total.
        let mut source = String::new();
        for i in 0..50 {
            source.push_str(&format!("var v{} = {} * 2 + 1;\n", i, i));
        }
        let function = compile(&source);
        assert!(function.chunk.constants.len() <= 256);
    }

    #[test]
    fn test_loop_body_too_large() {
        // Locals only, so the constant pool stays small and the loop body
        // is what overflows.
        let mut source = String::from("{ var x = true; while (true) { ");
        for _ in 0..12000 {
            source.push_str("x = !x; ");
        }
        source.push_str("} }");
        let errors = compile_errors(&source);
        assert!(errors
            .iter()
            .any(|e| matches!(e, CompileError::LoopTooLarge(_) | CompileError::JumpTooLarge(_))));
    }

    #[test]
    fn test_constants_not_shared_between_functions() {
        let function = compile("fun f() { return 1; } print 1;");
        // Top level has the function constant plus its own literal 1 and
        // the name "f".
        assert!(function
            .chunk
            .constants
            .iter()
            .any(|c| matches!(c, Constant::Function(_))));
        assert!(function
            .chunk
            .constants
            .iter()
            .any(|c| matches!(c, Constant::Number(n) if *n == 1.0)));
    }
}
