//! Error types for the textual IR boundary.
//!
//! Using thiserror for more idiomatic error handling. The scheduler core
//! itself has no recoverable-error taxonomy: every stage either succeeds
//! (possibly as a no-op when disabled) or the input was malformed upstream.

use thiserror::Error;

/// Errors produced while parsing the textual IR format.
#[derive(Error, Debug)]
pub enum IrParseError {
    #[error("line {line}: unknown opcode '{opcode}'")]
    UnknownOpcode { line: usize, opcode: String },

    #[error("line {line}: malformed operand '{token}'")]
    MalformedOperand { line: usize, token: String },

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("unterminated function body for '{name}'")]
    UnterminatedFunction { name: String },
}

/// Result type alias for parse operations.
pub type ParseResult<T> = Result<T, IrParseError>;
