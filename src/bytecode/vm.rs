//! Stack-based virtual machine executing compiled chunks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::bytecode::chunk::{Constant, Function};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::object::{Class, Closure, Instance, NativeFunction, Upvalue, Value};
use crate::error::RuntimeError;

pub type VmResult<T> = Result<T, RuntimeError>;

/// Maximum call depth.
pub const FRAMES_MAX: usize = 64;
/// Wall-clock ceiling for a single `interpret` call. A runaway script is
/// aborted with a runtime error instead of hanging the host.
pub const EXECUTION_LIMIT: Duration = Duration::from_secs(5);
/// Instructions executed between deadline checks.
const TIMEOUT_CHECK_INTERVAL: u32 = 1024;

/// One function activation.
struct CallFrame {
    closure: Rc<Closure>,
    /// Offset of the next byte to execute in the closure's chunk.
    ip: usize,
    /// Stack slot of the callee; locals are addressed relative to it.
    slots_start: usize,
}

/// Where `print` writes.
enum PrintSink {
    Stdout,
    Buffer(Rc<RefCell<String>>),
}

/// The virtual machine.
///
/// Globals survive across `interpret` calls so the REPL can build up
/// state line by line; the value stack and frames are reset every run.
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: HashMap<String, Value>,
    open_upvalues: Vec<Rc<RefCell<Upvalue>>>,
    output: PrintSink,
}

impl Vm {
    pub fn new() -> Self {
        let mut vm = Self {
            stack: Vec::new(),
            frames: Vec::new(),
            globals: HashMap::new(),
            open_upvalues: Vec::new(),
            output: PrintSink::Stdout,
        };
        vm.install_natives();
        vm
    }

    /// A VM whose `print` output goes to a shared buffer instead of
    /// stdout. Used by the test suite and the REPL machinery.
    pub fn with_captured_output() -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        let mut vm = Self::new();
        vm.output = PrintSink::Buffer(buffer.clone());
        (vm, buffer)
    }

    /// Look up a global by name. Mainly useful for embedding and tests.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Execute a compiled top-level function to completion.
    pub fn interpret(&mut self, function: Function) -> VmResult<()> {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();

        let closure = Rc::new(Closure::new(Rc::new(function)));
        self.stack.push(Value::Closure(closure.clone()));
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slots_start: 0,
        });

        self.execute()
    }

    fn execute(&mut self) -> VmResult<()> {
        let started = Instant::now();
        let mut ticks: u32 = 0;

        loop {
            ticks += 1;
            if ticks >= TIMEOUT_CHECK_INTERVAL {
                ticks = 0;
                if started.elapsed() > EXECUTION_LIMIT {
                    return Err(RuntimeError::ExecutionTimeout {
                        limit_secs: EXECUTION_LIMIT.as_secs(),
                    });
                }
            }

            let byte = self.read_byte()?;
            let op = OpCode::from_u8(byte)
                .ok_or_else(|| RuntimeError::internal(format!("invalid opcode {}", byte)))?;

            match op {
                OpCode::Constant => {
                    let value = match self.read_constant()? {
                        Constant::Number(n) => Value::Number(n),
                        Constant::String(s) => Value::string(s),
                        Constant::Function(_) => {
                            return Err(RuntimeError::internal(
                                "function constant outside a closure instruction",
                            ));
                        }
                    };
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop()?;
                }

                OpCode::GetLocal => {
                    let slot = self.read_byte()? as usize;
                    let index = self.frame()?.slots_start + slot;
                    let value = self
                        .stack
                        .get(index)
                        .cloned()
                        .ok_or_else(|| RuntimeError::internal("local slot out of range"))?;
                    self.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte()? as usize;
                    let index = self.frame()?.slots_start + slot;
                    let value = self.peek(0)?.clone();
                    let cell = self
                        .stack
                        .get_mut(index)
                        .ok_or_else(|| RuntimeError::internal("local slot out of range"))?;
                    *cell = value;
                }
                OpCode::GetGlobal => {
                    let name = self.read_string()?;
                    let value = self
                        .globals
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| RuntimeError::undefined_variable(&name, self.line()))?;
                    self.push(value);
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string()?;
                    let value = self.pop()?;
                    self.globals.insert(name, value);
                }
                OpCode::SetGlobal => {
                    let name = self.read_string()?;
                    if !self.globals.contains_key(&name) {
                        return Err(RuntimeError::undefined_variable(&name, self.line()));
                    }
                    // Assignment is an expression; the value stays on the stack.
                    let value = self.peek(0)?.clone();
                    self.globals.insert(name, value);
                }
                OpCode::GetUpvalue => {
                    let index = self.read_byte()? as usize;
                    let upvalue = self.upvalue(index)?;
                    let value = match &*upvalue.borrow() {
                        Upvalue::Open(slot) => self
                            .stack
                            .get(*slot)
                            .cloned()
                            .ok_or_else(|| RuntimeError::internal("open upvalue slot missing"))?,
                        Upvalue::Closed(value) => value.clone(),
                    };
                    self.push(value);
                }
                OpCode::SetUpvalue => {
                    let index = self.read_byte()? as usize;
                    let upvalue = self.upvalue(index)?;
                    let value = self.peek(0)?.clone();
                    let open_slot = upvalue.borrow().slot();
                    match open_slot {
                        Some(slot) => {
                            let cell = self.stack.get_mut(slot).ok_or_else(|| {
                                RuntimeError::internal("open upvalue slot missing")
                            })?;
                            *cell = value;
                        }
                        None => *upvalue.borrow_mut() = Upvalue::Closed(value),
                    }
                }
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack.len().saturating_sub(1));
                    self.pop()?;
                }

                OpCode::Equal => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.numeric_binary(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.numeric_binary(|a, b| Value::Bool(a < b))?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.numeric_binary(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.numeric_binary(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.numeric_binary(|a, b| Value::Number(a / b))?,

                OpCode::Not => {
                    let value = self.pop()?;
                    self.push(Value::Bool(!value.is_truthy()));
                }
                OpCode::Negate => {
                    let value = self.pop()?;
                    match value {
                        Value::Number(n) => self.push(Value::Number(-n)),
                        other => {
                            return Err(RuntimeError::type_error(
                                format!("Operand must be a number, got {}.", other.type_name()),
                                self.line(),
                            ));
                        }
                    }
                }

                OpCode::Print => {
                    let value = self.pop()?;
                    self.print_value(&value);
                }

                OpCode::Jump => {
                    let offset = self.read_u16()? as usize;
                    self.frame_mut()?.ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16()? as usize;
                    // The condition stays on the stack; the compiler emits
                    // the Pop, which is what makes short-circuit work.
                    if !self.peek(0)?.is_truthy() {
                        self.frame_mut()?.ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16()? as usize;
                    let frame = self.frame_mut()?;
                    frame.ip = frame.ip.checked_sub(offset).ok_or_else(|| {
                        RuntimeError::internal("loop offset before chunk start")
                    })?;
                }

                OpCode::Call => {
                    let arg_count = self.read_byte()? as usize;
                    self.call_value(arg_count)?;
                }
                OpCode::Closure => {
                    self.make_closure()?;
                }
                OpCode::Return => {
                    let result = self.pop()?;
                    let frame = self
                        .frames
                        .pop()
                        .ok_or_else(|| RuntimeError::internal("no active call frame"))?;
                    self.close_upvalues(frame.slots_start);
                    self.stack.truncate(frame.slots_start);
                    if self.frames.is_empty() {
                        // Script finished; its implicit nil is discarded.
                        return Ok(());
                    }
                    self.push(result);
                }

                OpCode::Class => {
                    let name = self.read_string()?;
                    self.push(Value::Class(Rc::new(Class { name })));
                }
                OpCode::GetProperty => {
                    let name = self.read_string()?;
                    let object = self.pop()?;
                    let Value::Instance(instance) = object else {
                        return Err(RuntimeError::NotAnInstance { line: self.line() });
                    };
                    let value = instance.borrow().fields.get(&name).cloned();
                    match value {
                        Some(value) => self.push(value),
                        None => {
                            return Err(RuntimeError::undefined_property(&name, self.line()));
                        }
                    }
                }
                OpCode::SetProperty => {
                    let name = self.read_string()?;
                    let value = self.pop()?;
                    let object = self.pop()?;
                    let Value::Instance(instance) = object else {
                        return Err(RuntimeError::NotAnInstance { line: self.line() });
                    };
                    instance.borrow_mut().fields.insert(name, value.clone());
                    // Assignment is an expression; the value is the result.
                    self.push(value);
                }

                OpCode::Array => {
                    let count = self.read_byte()? as usize;
                    if self.stack.len() < count {
                        return Err(RuntimeError::internal("array literal underflow"));
                    }
                    let elements = self.stack.split_off(self.stack.len() - count);
                    self.push(Value::Array(Rc::new(RefCell::new(elements))));
                }
                OpCode::IndexGet => {
                    let index = self.pop()?;
                    let object = self.pop()?;
                    let (elements, index) = self.check_index(object, index)?;
                    let value = elements.borrow()[index].clone();
                    self.push(value);
                }
                OpCode::IndexSet => {
                    let value = self.pop()?;
                    let index = self.pop()?;
                    let object = self.pop()?;
                    let (elements, index) = self.check_index(object, index)?;
                    elements.borrow_mut()[index] = value.clone();
                    self.push(value);
                }
            }
        }
    }

    // ============ Calls ============

    fn call_value(&mut self, arg_count: usize) -> VmResult<()> {
        let callee = self.peek(arg_count)?.clone();

        match callee {
            Value::Closure(closure) => self.push_frame(closure, arg_count),
            Value::Native(native) => {
                if arg_count != native.arity as usize {
                    return Err(RuntimeError::wrong_arity(
                        native.arity,
                        arg_count,
                        self.line(),
                    ));
                }
                let args_start = self.stack.len() - arg_count;
                let result = (native.function)(&self.stack[args_start..])
                    .map_err(|message| RuntimeError::type_error(message, self.line()))?;
                // Drop the arguments and the callee itself.
                self.stack.truncate(args_start - 1);
                self.push(result);
                Ok(())
            }
            Value::Class(class) => {
                // No constructors: instantiation takes no arguments.
                if arg_count != 0 {
                    return Err(RuntimeError::wrong_arity(0, arg_count, self.line()));
                }
                let instance = Value::Instance(Rc::new(RefCell::new(Instance::new(class))));
                let slot = self.stack.len() - 1;
                self.stack[slot] = instance;
                Ok(())
            }
            _ => Err(RuntimeError::NotCallable { line: self.line() }),
        }
    }

    fn push_frame(&mut self, closure: Rc<Closure>, arg_count: usize) -> VmResult<()> {
        if arg_count != closure.function.arity as usize {
            return Err(RuntimeError::wrong_arity(
                closure.function.arity,
                arg_count,
                self.line(),
            ));
        }
        if self.frames.len() >= FRAMES_MAX {
            return Err(RuntimeError::StackOverflow { line: self.line() });
        }
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slots_start: self.stack.len() - arg_count - 1,
        });
        Ok(())
    }

    /// Instantiate a closure: read the function constant and its upvalue
    /// descriptors, capturing enclosing locals or reusing the enclosing
    /// closure's upvalues.
    fn make_closure(&mut self) -> VmResult<()> {
        let constant = self.read_constant()?;
        let Constant::Function(function) = constant else {
            return Err(RuntimeError::internal("closure over a non-function constant"));
        };

        let mut upvalues = Vec::with_capacity(function.upvalue_count);
        for _ in 0..function.upvalue_count {
            let is_local = self.read_byte()? != 0;
            let index = self.read_byte()? as usize;
            let upvalue = if is_local {
                let slot = self.frame()?.slots_start + index;
                self.capture_upvalue(slot)
            } else {
                self.frame()?
                    .closure
                    .upvalues
                    .get(index)
                    .cloned()
                    .ok_or_else(|| RuntimeError::internal("upvalue index out of range"))?
            };
            upvalues.push(upvalue);
        }

        self.push(Value::Closure(Rc::new(Closure { function, upvalues })));
        Ok(())
    }

    // ============ Upvalues ============

    /// Capture the variable at an absolute stack slot, reusing the open
    /// upvalue for that slot if one exists so every closure over the same
    /// variable shares one cell.
    fn capture_upvalue(&mut self, slot: usize) -> Rc<RefCell<Upvalue>> {
        for upvalue in &self.open_upvalues {
            if upvalue.borrow().slot() == Some(slot) {
                return upvalue.clone();
            }
        }

        let upvalue = Rc::new(RefCell::new(Upvalue::Open(slot)));
        self.open_upvalues.push(upvalue.clone());
        upvalue
    }

    /// Close every open upvalue at or above `floor`: the stack slots are
    /// about to disappear, so the values move into the upvalues.
    fn close_upvalues(&mut self, floor: usize) {
        for upvalue in &self.open_upvalues {
            let slot = upvalue.borrow().slot();
            if let Some(slot) = slot {
                if slot >= floor {
                    let value = self.stack.get(slot).cloned().unwrap_or(Value::Nil);
                    *upvalue.borrow_mut() = Upvalue::Closed(value);
                }
            }
        }
        self.open_upvalues.retain(|upvalue| upvalue.borrow().is_open());
    }

    // ============ Arithmetic ============

    fn numeric_binary(&mut self, apply: fn(f64, f64) -> Value) -> VmResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => {
                self.push(apply(a, b));
                Ok(())
            }
            (a, b) => Err(RuntimeError::type_error(
                format!(
                    "Operands must be numbers, got {} and {}.",
                    a.type_name(),
                    b.type_name()
                ),
                self.line(),
            )),
        }
    }

    fn add(&mut self) -> VmResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => {
                self.push(Value::Number(a + b));
                Ok(())
            }
            (Value::String(a), Value::String(b)) => {
                self.push(Value::String(Rc::new(format!("{}{}", a, b))));
                Ok(())
            }
            _ => Err(RuntimeError::type_error(
                "Operands must be two numbers or two strings.",
                self.line(),
            )),
        }
    }

    // ============ Arrays ============

    /// Validate an indexing operation: the target must be an array and
    /// the index an in-bounds integer.
    fn check_index(
        &self,
        object: Value,
        index: Value,
    ) -> VmResult<(Rc<RefCell<Vec<Value>>>, usize)> {
        let Value::Array(elements) = &object else {
            return Err(RuntimeError::type_error(
                format!("Only arrays can be indexed, got {}.", object.type_name()),
                self.line(),
            ));
        };
        let Value::Number(n) = &index else {
            return Err(RuntimeError::type_error(
                format!("Array index must be a number, got {}.", index.type_name()),
                self.line(),
            ));
        };
        let elements = Rc::clone(elements);
        let n = *n;

        let length = elements.borrow().len();
        if n.fract() != 0.0 || n < 0.0 || (n as usize) >= length {
            return Err(RuntimeError::IndexOutOfBounds {
                index: n,
                length,
                line: self.line(),
            });
        }
        Ok((elements, n as usize))
    }

    // ============ Natives ============

    fn install_natives(&mut self) {
        self.define_native("clock", 0, native_clock);
        self.define_native("len", 1, native_len);
        self.define_native("push", 2, native_push);
        self.define_native("pop", 1, native_pop);
    }

    fn define_native(
        &mut self,
        name: &'static str,
        arity: u8,
        function: fn(&[Value]) -> Result<Value, String>,
    ) {
        self.globals.insert(
            name.to_string(),
            Value::Native(Rc::new(NativeFunction {
                name,
                arity,
                function,
            })),
        );
    }

    // ============ Stack & frame helpers ============

    fn frame(&self) -> VmResult<&CallFrame> {
        self.frames
            .last()
            .ok_or_else(|| RuntimeError::internal("no active call frame"))
    }

    fn frame_mut(&mut self) -> VmResult<&mut CallFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| RuntimeError::internal("no active call frame"))
    }

    fn upvalue(&self, index: usize) -> VmResult<Rc<RefCell<Upvalue>>> {
        self.frame()?
            .closure
            .upvalues
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::internal("upvalue index out of range"))
    }

    fn read_byte(&mut self) -> VmResult<u8> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| RuntimeError::internal("no active call frame"))?;
        let byte = frame
            .closure
            .function
            .chunk
            .code
            .get(frame.ip)
            .copied()
            .ok_or_else(|| RuntimeError::internal("instruction pointer out of range"))?;
        frame.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> VmResult<u16> {
        let hi = self.read_byte()? as u16;
        let lo = self.read_byte()? as u16;
        Ok((hi << 8) | lo)
    }

    fn read_constant(&mut self) -> VmResult<Constant> {
        let index = self.read_byte()? as usize;
        self.frame()?
            .closure
            .function
            .chunk
            .constants
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::internal("constant index out of range"))
    }

    fn read_string(&mut self) -> VmResult<String> {
        match self.read_constant()? {
            Constant::String(s) => Ok(s),
            _ => Err(RuntimeError::internal("expected a string constant")),
        }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> VmResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::internal("stack underflow"))
    }

    fn peek(&self, distance: usize) -> VmResult<&Value> {
        self.stack
            .len()
            .checked_sub(1 + distance)
            .and_then(|index| self.stack.get(index))
            .ok_or_else(|| RuntimeError::internal("stack underflow"))
    }

    /// Source line of the instruction currently executing.
    fn line(&self) -> u32 {
        match self.frames.last() {
            Some(frame) => frame
                .closure
                .function
                .chunk
                .get_line(frame.ip.saturating_sub(1)),
            None => 0,
        }
    }

    fn print_value(&mut self, value: &Value) {
        match &self.output {
            PrintSink::Stdout => println!("{}", value),
            PrintSink::Buffer(buffer) => {
                use std::fmt::Write;
                let _ = writeln!(buffer.borrow_mut(), "{}", value);
            }
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

fn native_clock(_args: &[Value]) -> Result<Value, String> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(Value::Number(seconds))
}

/// len(x): array length, string character count, 0 for anything else.
fn native_len(args: &[Value]) -> Result<Value, String> {
    let length = match &args[0] {
        Value::Array(elements) => elements.borrow().len(),
        Value::String(s) => s.chars().count(),
        _ => 0,
    };
    Ok(Value::Number(length as f64))
}

/// push(array, value): append and return the value.
fn native_push(args: &[Value]) -> Result<Value, String> {
    let Value::Array(elements) = &args[0] else {
        return Err(format!(
            "push() expects an array, got {}.",
            args[0].type_name()
        ));
    };
    elements.borrow_mut().push(args[1].clone());
    Ok(args[1].clone())
}

/// pop(array): remove and return the last element, nil when empty.
fn native_pop(args: &[Value]) -> Result<Value, String> {
    let Value::Array(elements) = &args[0] else {
        return Err(format!(
            "pop() expects an array, got {}.",
            args[0].type_name()
        ));
    };
    let value = elements.borrow_mut().pop().unwrap_or(Value::Nil);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::Compiler;
    use crate::lexer::Scanner;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> Function {
        let tokens = Scanner::new(source).scan_tokens().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        Compiler::new().compile(&program).unwrap()
    }

    fn run(source: &str) -> String {
        let (mut vm, output) = Vm::with_captured_output();
        vm.interpret(compile(source)).unwrap();
        let captured = output.borrow().clone();
        captured
    }

    fn run_lines(source: &str) -> Vec<String> {
        run(source).lines().map(|l| l.to_string()).collect()
    }

    fn run_err(source: &str) -> RuntimeError {
        let (mut vm, _output) = Vm::with_captured_output();
        vm.interpret(compile(source)).unwrap_err()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            run_lines("print 10 + 5; print 10 - 5; print 10 * 5; print 10 / 5; print -10;"),
            vec!["15", "5", "50", "2", "-10"]
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run_lines("print \"foo\" + \"bar\";"), vec!["foobar"]);
    }

    #[test]
    fn test_add_type_mismatch() {
        let err = run_err("print 1 + \"a\";");
        assert!(err
            .to_string()
            .contains("Operands must be two numbers or two strings."));
    }

    #[test]
    fn test_comparisons_and_equality() {
        assert_eq!(
            run_lines("print 1 < 2; print 2 <= 2; print 1 > 2; print 2 >= 3;"),
            vec!["true", "true", "false", "false"]
        );
        assert_eq!(
            run_lines("print 1 == 1; print 1 != 1; print \"a\" == \"a\"; print nil == nil;"),
            vec!["true", "false", "true", "true"]
        );
    }

    #[test]
    fn test_heap_equality_is_identity() {
        assert_eq!(
            run_lines("var a = [1]; var b = [1]; print a == b; print a == a;"),
            vec!["false", "true"]
        );
    }

    #[test]
    fn test_print_values() {
        assert_eq!(
            run_lines("print nil; print true; print 5; print 3.25; print [1, \"x\", nil];"),
            vec!["nil", "true", "5", "3.25", "[1, x, nil]"]
        );
    }

    #[test]
    fn test_global_variables() {
        assert_eq!(
            run_lines("var a = 1; print a; a = 2; print a;"),
            vec!["1", "2"]
        );
    }

    #[test]
    fn test_undefined_variable() {
        let err = run_err("print missing;");
        assert!(matches!(err, RuntimeError::UndefinedVariable { ref name, .. } if name == "missing"));
    }

    #[test]
    fn test_assignment_to_undefined_global() {
        let err = run_err("missing = 1;");
        assert!(matches!(err, RuntimeError::UndefinedVariable { .. }));
    }

    #[test]
    fn test_block_scoping_and_shadowing() {
        assert_eq!(
            run_lines("var a = \"global\"; { var a = \"local\"; print a; } print a;"),
            vec!["local", "global"]
        );
    }

    #[test]
    fn test_if_else() {
        assert_eq!(
            run_lines("if (1 < 2) print \"then\"; else print \"else\";"),
            vec!["then"]
        );
        assert_eq!(
            run_lines("if (1 > 2) print \"then\"; else print \"else\";"),
            vec!["else"]
        );
    }

    #[test]
    fn test_short_circuit_and_leaves_operand() {
        // The right-hand side must not run, so `a` stays false.
        assert_eq!(
            run_lines("var a = false; print a and (a = true); print a;"),
            vec!["false", "false"]
        );
    }

    #[test]
    fn test_short_circuit_or() {
        assert_eq!(
            run_lines("var a = true; print a or (a = false); print a;"),
            vec!["true", "true"]
        );
        assert_eq!(run_lines("print false or \"rhs\";"), vec!["rhs"]);
    }

    #[test]
    fn test_truthiness_in_conditions() {
        assert_eq!(
            run_lines("if (0) print \"t\"; else print \"f\"; if (\"\") print \"t\"; else print \"f\"; if ([]) print \"t\"; else print \"f\";"),
            vec!["f", "f", "t"]
        );
    }

    #[test]
    fn test_while_loop() {
        assert_eq!(
            run_lines("var i = 0; var sum = 0; while (i < 5) { sum = sum + i; i = i + 1; } print sum;"),
            vec!["10"]
        );
    }

    #[test]
    fn test_for_loop() {
        assert_eq!(
            run_lines("for (var i = 0; i < 3; i = i + 1) print i;"),
            vec!["0", "1", "2"]
        );
    }

    #[test]
    fn test_function_call_and_return() {
        assert_eq!(
            run_lines("fun add(a, b) { return a + b; } print add(2, 3);"),
            vec!["5"]
        );
    }

    #[test]
    fn test_implicit_nil_return() {
        assert_eq!(run_lines("fun f() {} print f();"), vec!["nil"]);
    }

    #[test]
    fn test_fib() {
        assert_eq!(
            run_lines(
                "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);"
            ),
            vec!["55"]
        );
    }

    #[test]
    fn test_wrong_arity() {
        let err = run_err("fun f(a) { return a; } f(1, 2);");
        assert!(matches!(
            err,
            RuntimeError::WrongArity {
                expected: 1,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_call_non_callable() {
        let err = run_err("nil();");
        assert!(matches!(err, RuntimeError::NotCallable { .. }));
    }

    #[test]
    fn test_unbounded_recursion_overflows() {
        let err = run_err("fun f() { f(); } f();");
        assert!(matches!(err, RuntimeError::StackOverflow { .. }));
    }

    #[test]
    fn test_function_display() {
        assert_eq!(run_lines("fun f() {} print f;"), vec!["<fn f>"]);
        assert_eq!(run_lines("print clock;"), vec!["<native fn clock>"]);
    }

    #[test]
    fn test_counter_closure() {
        assert_eq!(
            run_lines(
                "fun makeCounter() {
                     var count = 0;
                     fun increment() { count = count + 1; return count; }
                     return increment;
                 }
                 var c = makeCounter();
                 print c(); print c(); print c();"
            ),
            vec!["1", "2", "3"]
        );
    }

    #[test]
    fn test_two_closures_share_one_upvalue() {
        assert_eq!(
            run_lines(
                "fun make() {
                     var x = 0;
                     fun inc() { x = x + 1; return x; }
                     fun get() { return x; }
                     return [inc, get];
                 }
                 var pair = make();
                 var inc = pair[0];
                 var get = pair[1];
                 inc(); inc();
                 print get();"
            ),
            vec!["2"]
        );
    }

    #[test]
    fn test_upvalue_closed_on_scope_exit() {
        assert_eq!(
            run_lines(
                "var f;
                 {
                     var x = 10;
                     fun g() { return x; }
                     f = g;
                 }
                 print f();"
            ),
            vec!["10"]
        );
    }

    #[test]
    fn test_independent_counters() {
        assert_eq!(
            run_lines(
                "fun makeCounter() {
                     var count = 0;
                     fun increment() { count = count + 1; return count; }
                     return increment;
                 }
                 var a = makeCounter();
                 var b = makeCounter();
                 a(); a();
                 print a(); print b();"
            ),
            vec!["3", "1"]
        );
    }

    #[test]
    fn test_class_instance_fields() {
        assert_eq!(
            run_lines(
                "class Point {}
                 var p = Point();
                 p.x = 1;
                 p.y = p.x + 2;
                 print p.x; print p.y; print p; print Point;"
            ),
            vec!["1", "3", "<Point instance>", "Point"]
        );
    }

    #[test]
    fn test_undefined_property() {
        let err = run_err("class C {} var c = C(); print c.missing;");
        assert!(matches!(err, RuntimeError::UndefinedProperty { ref name, .. } if name == "missing"));
    }

    #[test]
    fn test_property_on_non_instance() {
        let err = run_err("var x = 1; print x.field;");
        assert!(matches!(err, RuntimeError::NotAnInstance { .. }));
    }

    #[test]
    fn test_class_call_with_arguments() {
        let err = run_err("class C {} C(1);");
        assert!(matches!(
            err,
            RuntimeError::WrongArity {
                expected: 0,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_property_set_is_an_expression() {
        assert_eq!(
            run_lines("class C {} var c = C(); print c.x = 7;"),
            vec!["7"]
        );
    }

    #[test]
    fn test_array_indexing() {
        assert_eq!(
            run_lines("var a = [10, 20, 30]; print a[0]; a[1] = 99; print a[1]; print a;"),
            vec!["10", "99", "[10, 99, 30]"]
        );
    }

    #[test]
    fn test_array_index_out_of_bounds() {
        let err = run_err("var a = [1]; print a[1];");
        assert!(matches!(err, RuntimeError::IndexOutOfBounds { length: 1, .. }));

        let err = run_err("var a = [1]; print a[0.5];");
        assert!(matches!(err, RuntimeError::IndexOutOfBounds { .. }));
    }

    #[test]
    fn test_index_non_array() {
        let err = run_err("var x = 1; print x[0];");
        assert!(matches!(err, RuntimeError::TypeError { .. }));
    }

    #[test]
    fn test_native_len() {
        assert_eq!(
            run_lines("print len([1, 2, 3]); print len(\"abcd\"); print len(5);"),
            vec!["3", "4", "0"]
        );
    }

    #[test]
    fn test_native_push_pop() {
        assert_eq!(
            run_lines(
                "var a = [1, 2];
                 print push(a, 3);
                 print len(a);
                 print pop(a);
                 print len(a);
                 print pop([]);"
            ),
            vec!["3", "3", "3", "2", "nil"]
        );
    }

    #[test]
    fn test_native_push_non_array() {
        let err = run_err("push(1, 2);");
        assert!(err.to_string().contains("push() expects an array"));
    }

    #[test]
    fn test_native_wrong_arity() {
        let err = run_err("len([1], [2]);");
        assert!(matches!(
            err,
            RuntimeError::WrongArity {
                expected: 1,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_clock_is_monotonic_enough() {
        assert_eq!(run_lines("print clock() > 0;"), vec!["true"]);
    }

    #[test]
    fn test_runtime_error_reports_line() {
        let err = run_err("var a = 1;\nprint missing;");
        assert!(matches!(err, RuntimeError::UndefinedVariable { line: 2, .. }));
    }

    #[test]
    fn test_globals_survive_across_runs() {
        let (mut vm, output) = Vm::with_captured_output();
        vm.interpret(compile("var a = 1;")).unwrap();
        vm.interpret(compile("print a;")).unwrap();
        assert_eq!(output.borrow().as_str(), "1\n");
    }

    #[test]
    fn test_global_accessor() {
        let (mut vm, _output) = Vm::with_captured_output();
        vm.interpret(compile("var answer = 42;")).unwrap();
        assert_eq!(vm.global("answer"), Some(Value::Number(42.0)));
    }

    #[test]
    fn test_infinite_loop_times_out() {
        let err = run_err("while (true) {}");
        assert!(matches!(err, RuntimeError::ExecutionTimeout { .. }));
    }
}
