// Compiler Error Handling

use std::fmt;

use crate::dcpu_compiler::ast::SourcePos;

#[derive(Debug, Clone, PartialEq)]
pub enum CompilerError {
    // Lexical errors
    LexicalError(String, SourcePos), // message, position
    UnexpectedCharacter(char, SourcePos),

    // Parse errors
    ParseError(String, SourcePos),
    ExpectedToken(String, String, SourcePos), // expected, found, position

    // Lowering errors
    UnsupportedOperator(String, SourcePos),    // operator, position
    InvalidReferenceTarget(String, SourcePos), // node kind, position
    MemoryExhausted(SourcePos),
    UnboundScopeOperation(String, SourcePos),
    UndefinedFunction(String, SourcePos),
    ReservedRoutineName(String, String, SourcePos), // name, what it clashes with, position

    // Driver errors
    ConfigError(String),
    IOError(String),
}

impl CompilerError {
    /// Source position of the node that triggered the error, if any.
    pub fn position(&self) -> Option<SourcePos> {
        match self {
            CompilerError::LexicalError(_, pos)
            | CompilerError::UnexpectedCharacter(_, pos)
            | CompilerError::ParseError(_, pos)
            | CompilerError::ExpectedToken(_, _, pos)
            | CompilerError::UnsupportedOperator(_, pos)
            | CompilerError::InvalidReferenceTarget(_, pos)
            | CompilerError::MemoryExhausted(pos)
            | CompilerError::UnboundScopeOperation(_, pos)
            | CompilerError::UndefinedFunction(_, pos)
            | CompilerError::ReservedRoutineName(_, _, pos) => Some(*pos),
            CompilerError::ConfigError(_) | CompilerError::IOError(_) => None,
        }
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompilerError::LexicalError(msg, pos) => {
                write!(f, "Lexical error at {}: {}", pos, msg)
            }
            CompilerError::UnexpectedCharacter(ch, pos) => {
                write!(f, "Unexpected character '{}' at {}", ch, pos)
            }
            CompilerError::ParseError(msg, pos) => {
                write!(f, "Parse error at {}: {}", pos, msg)
            }
            CompilerError::ExpectedToken(expected, found, pos) => {
                write!(f, "Expected {} but found {} at {}", expected, found, pos)
            }
            CompilerError::UnsupportedOperator(op, pos) => {
                write!(f, "Unsupported operator '{}' at {}", op, pos)
            }
            CompilerError::InvalidReferenceTarget(what, pos) => {
                write!(f, "Cannot take the address of {} at {}", what, pos)
            }
            CompilerError::MemoryExhausted(pos) => {
                write!(f, "Variable memory exhausted at {}", pos)
            }
            CompilerError::UnboundScopeOperation(msg, pos) => {
                write!(f, "Invalid scope operation at {}: {}", pos, msg)
            }
            CompilerError::UndefinedFunction(name, pos) => {
                write!(f, "Call to undefined function '{}' at {}", name, pos)
            }
            CompilerError::ReservedRoutineName(name, clash, pos) => {
                write!(f, "Function name '{}' clashes with {} at {}", name, clash, pos)
            }
            CompilerError::ConfigError(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            CompilerError::IOError(msg) => {
                write!(f, "IO error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CompilerError {}
