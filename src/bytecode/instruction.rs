//! Bytecode instruction definitions for the Lumen VM.

/// Opcodes for the bytecode virtual machine.
///
/// Constant-pool and stack-slot operands are a single byte; jump and loop
/// offsets are two bytes, big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // ============ Constants & Stack ============
    /// Load a constant from the constant pool: CONSTANT <index:u8>
    Constant = 0,
    /// Push nil onto the stack
    Nil,
    /// Push true onto the stack
    True,
    /// Push false onto the stack
    False,
    /// Pop the top value from the stack
    Pop,

    // ============ Variables ============
    /// Get a local variable: GET_LOCAL <slot:u8>
    GetLocal,
    /// Set a local variable: SET_LOCAL <slot:u8>
    SetLocal,
    /// Get a global variable: GET_GLOBAL <name_index:u8>
    GetGlobal,
    /// Define a global variable: DEFINE_GLOBAL <name_index:u8>
    DefineGlobal,
    /// Set an existing global variable: SET_GLOBAL <name_index:u8>
    SetGlobal,
    /// Get an upvalue (captured variable): GET_UPVALUE <index:u8>
    GetUpvalue,
    /// Set an upvalue: SET_UPVALUE <index:u8>
    SetUpvalue,
    /// Close the upvalue for the top stack slot, then pop it
    CloseUpvalue,

    // ============ Comparison ============
    /// Equal: a == b
    Equal,
    /// Greater than: a > b
    Greater,
    /// Less than: a < b
    Less,

    // ============ Arithmetic ============
    /// Add two numbers or concatenate two strings: a + b
    Add,
    /// Subtract two numbers: a - b
    Subtract,
    /// Multiply two numbers: a * b
    Multiply,
    /// Divide two numbers: a / b
    Divide,

    // ============ Logic ============
    /// Logical not: !a
    Not,
    /// Negate a number: -a
    Negate,

    // ============ Output ============
    /// Pop and print the top of stack
    Print,

    // ============ Control Flow ============
    /// Unconditional forward jump: JUMP <offset:u16 be>
    Jump,
    /// Forward jump if top of stack is falsey (no pop): JUMP_IF_FALSE <offset:u16 be>
    JumpIfFalse,
    /// Backward jump: LOOP <offset:u16 be>
    Loop,

    // ============ Functions & Calls ============
    /// Call a value: CALL <arg_count:u8>
    Call,
    /// Create a closure: CLOSURE <func_index:u8> [is_local:u8, index:u8]...
    Closure,
    /// Return from the current function
    Return,

    // ============ Classes & Objects ============
    /// Create a class: CLASS <name_index:u8>
    Class,
    /// Get a property: GET_PROPERTY <name_index:u8>
    GetProperty,
    /// Set a property: SET_PROPERTY <name_index:u8>
    SetProperty,

    // ============ Arrays ============
    /// Build an array from the top n stack values: ARRAY <count:u8>
    Array,
    /// Get element by index: obj[index]
    IndexGet,
    /// Set element by index: obj[index] = value
    IndexSet,
}

impl OpCode {
    /// Fixed operand width in bytes. `Closure` additionally carries two
    /// bytes per upvalue after its constant operand.
    pub fn operand_size(self) -> usize {
        match self {
            OpCode::Nil
            | OpCode::True
            | OpCode::False
            | OpCode::Pop
            | OpCode::CloseUpvalue
            | OpCode::Equal
            | OpCode::Greater
            | OpCode::Less
            | OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Not
            | OpCode::Negate
            | OpCode::Print
            | OpCode::Return
            | OpCode::IndexGet
            | OpCode::IndexSet => 0,

            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::DefineGlobal
            | OpCode::SetGlobal
            | OpCode::GetUpvalue
            | OpCode::SetUpvalue
            | OpCode::Call
            | OpCode::Closure
            | OpCode::Class
            | OpCode::GetProperty
            | OpCode::SetProperty
            | OpCode::Array => 1,

            OpCode::Jump | OpCode::JumpIfFalse | OpCode::Loop => 2,
        }
    }

    /// Convert from u8 to OpCode.
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        if byte <= OpCode::IndexSet as u8 {
            Some(unsafe { std::mem::transmute::<u8, OpCode>(byte) })
        } else {
            None
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

/// Information about an upvalue for closure creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueInfo {
    /// True if this upvalue captures a local in the enclosing function,
    /// false if it captures an upvalue from the enclosing function.
    pub is_local: bool,
    /// The index of the local or upvalue being captured.
    pub index: u8,
}

impl UpvalueInfo {
    pub fn new(is_local: bool, index: u8) -> Self {
        Self { is_local, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for i in 0..=OpCode::IndexSet as u8 {
            let op = OpCode::from_u8(i).expect("valid opcode");
            assert_eq!(i, op as u8);
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(OpCode::from_u8(255).is_none());
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(OpCode::Constant.operand_size(), 1);
        assert_eq!(OpCode::Jump.operand_size(), 2);
        assert_eq!(OpCode::Return.operand_size(), 0);
        assert_eq!(OpCode::Closure.operand_size(), 1);
    }
}
