//! Error types for all pipeline phases.

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("Invalid number '{0}' at {1}")]
    InvalidNumber(String, Span),
}

impl LexerError {
    pub fn unexpected_char(c: char, span: Span) -> Self {
        Self::UnexpectedChar(c, span)
    }

    pub fn unterminated_string(span: Span) -> Self {
        Self::UnterminatedString(span)
    }

    pub fn invalid_number(s: String, span: Span) -> Self {
        Self::InvalidNumber(s, span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::InvalidNumber(_, span) => *span,
        }
    }
}

/// Parser errors.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Unexpected token '{found}', expected {expected} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of file at {0}")]
    UnexpectedEof(Span),

    #[error("Invalid assignment target at {0}")]
    InvalidAssignmentTarget(Span),

    #[error("Too many {kind}: the limit is {limit} at {span}")]
    TooMany {
        kind: &'static str,
        limit: usize,
        span: Span,
    },

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn unexpected_eof(span: Span) -> Self {
        Self::UnexpectedEof(span)
    }

    pub fn invalid_assignment_target(span: Span) -> Self {
        Self::InvalidAssignmentTarget(span)
    }

    pub fn too_many(kind: &'static str, limit: usize, span: Span) -> Self {
        Self::TooMany { kind, limit, span }
    }

    pub fn general(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::UnexpectedEof(span) => *span,
            Self::InvalidAssignmentTarget(span) => *span,
            Self::TooMany { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }
}

/// Bytecode compilation errors.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Variable '{0}' is already declared in this scope at {1}")]
    DuplicateVariable(String, Span),

    #[error("Can't read local variable '{0}' in its own initializer at {1}")]
    ReadInInitializer(String, Span),

    #[error("Too many constants in one chunk at {0}")]
    TooManyConstants(Span),

    #[error("Too many local variables in function at {0}")]
    TooManyLocals(Span),

    #[error("Too many captured variables in function at {0}")]
    TooManyUpvalues(Span),

    #[error("Jump body too large at {0}")]
    JumpTooLarge(Span),

    #[error("Loop body too large at {0}")]
    LoopTooLarge(Span),

    #[error("Can't return from top-level code at {0}")]
    ReturnFromScript(Span),

    #[error("Can't use 'this' outside of a class method at {0}")]
    ThisOutsideMethod(Span),

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl CompileError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::DuplicateVariable(_, span) => *span,
            Self::ReadInInitializer(_, span) => *span,
            Self::TooManyConstants(span) => *span,
            Self::TooManyLocals(span) => *span,
            Self::TooManyUpvalues(span) => *span,
            Self::JumpTooLarge(span) => *span,
            Self::LoopTooLarge(span) => *span,
            Self::ReturnFromScript(span) => *span,
            Self::ThisOutsideMethod(span) => *span,
            Self::General { span, .. } => *span,
        }
    }
}

/// Runtime errors. Each carries the source line of the faulting instruction.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Undefined variable '{name}'. [line {line}]")]
    UndefinedVariable { name: String, line: u32 },

    #[error("Undefined property '{name}'. [line {line}]")]
    UndefinedProperty { name: String, line: u32 },

    #[error("Only instances have properties. [line {line}]")]
    NotAnInstance { line: u32 },

    #[error("Can only call functions and classes. [line {line}]")]
    NotCallable { line: u32 },

    #[error("Expected {expected} arguments but got {got}. [line {line}]")]
    WrongArity {
        expected: u8,
        got: usize,
        line: u32,
    },

    #[error("Stack overflow. [line {line}]")]
    StackOverflow { line: u32 },

    #[error("{message} [line {line}]")]
    TypeError { message: String, line: u32 },

    #[error("Array index {index} out of bounds (length {length}). [line {line}]")]
    IndexOutOfBounds {
        index: f64,
        length: usize,
        line: u32,
    },

    #[error("Execution exceeded the {limit_secs} second limit.")]
    ExecutionTimeout { limit_secs: u64 },

    #[error("Internal VM error: {0}")]
    Internal(String),
}

impl RuntimeError {
    pub fn undefined_variable(name: impl Into<String>, line: u32) -> Self {
        Self::UndefinedVariable {
            name: name.into(),
            line,
        }
    }

    pub fn undefined_property(name: impl Into<String>, line: u32) -> Self {
        Self::UndefinedProperty {
            name: name.into(),
            line,
        }
    }

    pub fn wrong_arity(expected: u8, got: usize, line: u32) -> Self {
        Self::WrongArity {
            expected,
            got,
            line,
        }
    }

    pub fn type_error(message: impl Into<String>, line: u32) -> Self {
        Self::TypeError {
            message: message.into(),
            line,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// A unified error type for all phases.
///
/// Parse and compile failures carry every diagnostic collected before the
/// phase gave up, so the driver can report them all at once.
#[derive(Debug, Error)]
pub enum LumenError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parsing failed with {} error(s)", .0.len())]
    Parse(Vec<ParserError>),

    #[error("Compilation failed with {} error(s)", .0.len())]
    Compile(Vec<CompileError>),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Vec<ParserError>> for LumenError {
    fn from(errors: Vec<ParserError>) -> Self {
        Self::Parse(errors)
    }
}

impl From<Vec<CompileError>> for LumenError {
    fn from(errors: Vec<CompileError>) -> Self {
        Self::Compile(errors)
    }
}
