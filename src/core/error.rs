// This module defines the compiler's error type using the thiserror crate. CompileError
// covers the fatal conditions of the core: register identities that match no known
// register, Pop instructions built over a non-identifier operand, operands lowering
// cannot express, branch tables that point nowhere, malformed metadata descriptions,
// malformed method-boundary tables, and failures bubbled up from the x86 encoder or the
// object writer. Soft misses (unknown field names, unsized types) are deliberately not
// errors; they travel as sentinel values and callers decide their own fallback.

//! Error types for the compiler.

use thiserror::Error;

use crate::x86::encoder::EncodingError;

/// Main error type for compilation.
///
/// Every variant describes a bug in an earlier compiler stage or malformed
/// input handed to the compiler, never a property of the program being
/// compiled. None of them is retried.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Unknown CR Register '{name}'")]
    UnknownRegister {
        name: String,
    },

    #[error("Pop requires an identifier operand, found '{operand}'")]
    InvalidPopOperand {
        operand: String,
    },

    #[error("Relation {relation} takes a single operand")]
    InvalidCondition {
        relation: String,
    },

    #[error("Unsupported operand in {method}: {reason}")]
    UnsupportedOperand {
        method: String,
        reason: String,
    },

    #[error("Instruction {index} in {method} has no branch target")]
    MissingBranchTarget {
        method: String,
        index: usize,
    },

    #[error("Branch target {target} is outside of {method}")]
    InvalidBranchTarget {
        method: String,
        target: usize,
    },

    #[error("Target table mismatch in {method}: {reason}")]
    MismatchedTarget {
        method: String,
        reason: String,
    },

    #[error("Metadata parse error at line {line}: {reason}")]
    Parse {
        line: usize,
        reason: String,
    },

    #[error("Type registered twice: {name}")]
    DuplicateType {
        name: String,
    },

    #[error("Type not found: {name}")]
    TypeNotFound {
        name: String,
    },

    #[error("Malformed method boundary table: {reason}")]
    BoundaryTable {
        reason: String,
    },

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("Object emission failed: {0}")]
    Object(#[from] object::write::Error),

    #[error("Object parsing failed: {0}")]
    ObjectRead(#[from] object::read::Error),
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
