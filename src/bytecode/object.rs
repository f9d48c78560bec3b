//! Runtime values and heap objects for the Lumen VM.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::bytecode::chunk::Function;

/// A runtime value.
///
/// Numbers, booleans and nil live on the stack; everything else is a
/// reference-counted heap object shared by clone.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    String(Rc<String>),
    Bool(bool),
    Nil,
    Closure(Rc<Closure>),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
    Array(Rc<RefCell<Vec<Value>>>),
    Native(Rc<NativeFunction>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Rc::new(s.into()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
            Value::Closure(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Array(_) => "array",
            Value::Native(_) => "function",
        }
    }

    /// `false`, `nil`, zero, NaN and the empty string are falsey; every
    /// other value, heap objects included, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Nil => false,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

/// Equality: primitives by value (IEEE semantics for numbers, so
/// `NaN != NaN`), heap objects by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Closure(closure) => match &closure.function.name {
                Some(name) => write!(f, "<fn {}>", name),
                None => write!(f, "<script>"),
            },
            Value::Class(class) => write!(f, "{}", class.name),
            Value::Instance(instance) => {
                write!(f, "<{} instance>", instance.borrow().class.name)
            }
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, value) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::Native(native) => write!(f, "<native fn {}>", native.name),
        }
    }
}

/// A function plus its captured upvalues.
#[derive(Debug)]
pub struct Closure {
    pub function: Rc<Function>,
    pub upvalues: Vec<Rc<RefCell<Upvalue>>>,
}

impl Closure {
    pub fn new(function: Rc<Function>) -> Self {
        let upvalue_count = function.upvalue_count;
        Self {
            function,
            upvalues: Vec::with_capacity(upvalue_count),
        }
    }
}

/// A captured variable. While the variable is still live on the stack the
/// upvalue stays open and points at its slot; when the slot is about to
/// disappear the value moves in here.
#[derive(Debug, Clone)]
pub enum Upvalue {
    /// Points to an absolute stack slot.
    Open(usize),
    /// Owns the value after the stack slot was discarded.
    Closed(Value),
}

impl Upvalue {
    pub fn is_open(&self) -> bool {
        matches!(self, Upvalue::Open(_))
    }

    /// The stack slot of an open upvalue.
    pub fn slot(&self) -> Option<usize> {
        match self {
            Upvalue::Open(slot) => Some(*slot),
            Upvalue::Closed(_) => None,
        }
    }
}

/// A class. Only a name: no methods, constructors or inheritance.
#[derive(Debug)]
pub struct Class {
    pub name: String,
}

/// An instance of a class with its dynamically-created fields.
#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }
}

/// A host function exposed to scripts.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: u8,
    pub function: fn(&[Value]) -> Result<Value, String>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_equality() {
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_eq!(Value::string("a"), Value::string("a"));
        assert_eq!(Value::Nil, Value::Nil);
        assert_ne!(Value::Nil, Value::Bool(false));
    }

    #[test]
    fn test_heap_identity_equality() {
        let a = Value::Array(Rc::new(RefCell::new(vec![Value::Number(1.0)])));
        let b = Value::Array(Rc::new(RefCell::new(vec![Value::Number(1.0)])));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::Number(1.0).is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(Value::Array(Rc::new(RefCell::new(Vec::new()))).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(5.0).to_string(), "5");
        assert_eq!(Value::Number(3.25).to_string(), "3.25");
        assert_eq!(Value::Nil.to_string(), "nil");
        let array = Value::Array(Rc::new(RefCell::new(vec![
            Value::Number(1.0),
            Value::string("two"),
        ])));
        assert_eq!(array.to_string(), "[1, two]");
    }
}
