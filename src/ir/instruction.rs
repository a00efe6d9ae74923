//! Control-flow instructions of the IR.
//!
//! Instructions are a closed set dispatched by pattern matching. Each carries
//! at most one principal operand, whose shape is fixed by the constructor:
//!
//! | Kind            | Principal operand          |
//! |-----------------|----------------------------|
//! | Jump            | none                       |
//! | ConditionalJump | boolean condition          |
//! | Switch          | dispatched value           |
//! | Pop             | identifier                 |
//! | Return          | optional return value      |
//!
//! Branch and switch targets are not stored on the instruction; they belong
//! to the owning [`Method`](super::Method), keyed by instruction index.

use std::fmt;

use super::operand::{Condition, Identifier, Operand};
use crate::core::{CompileError, CompileResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Jump,
    ConditionalJump,
    Switch,
    Pop,
    Return,
}

impl InstructionKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            InstructionKind::Jump | InstructionKind::ConditionalJump => "Jump",
            InstructionKind::Switch => "Switch",
            InstructionKind::Pop => "Pop",
            InstructionKind::Return => "Return",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    kind: InstructionKind,
    value: Option<Operand>,
    /// Position in the owning method, assigned on insertion.
    index: usize,
}

impl Instruction {
    fn new(kind: InstructionKind, value: Option<Operand>) -> Self {
        Self {
            kind,
            value,
            index: 0,
        }
    }

    /// Unconditional jump.
    pub fn jump() -> Self {
        Self::new(InstructionKind::Jump, None)
    }

    pub fn conditional_jump(condition: Condition) -> Self {
        Self::new(InstructionKind::ConditionalJump, Some(Operand::Boolean(condition)))
    }

    pub fn switch(value: Operand) -> Self {
        Self::new(InstructionKind::Switch, Some(value))
    }

    pub fn pop(identifier: Identifier) -> Self {
        Self::new(InstructionKind::Pop, Some(Operand::Identifier(identifier)))
    }

    /// Pop into an operand produced by an earlier stage.
    ///
    /// Anything but an identifier is a bug in that stage and aborts compilation.
    pub fn pop_operand(operand: Operand) -> CompileResult<Self> {
        match operand {
            Operand::Identifier(identifier) => Ok(Self::pop(identifier)),
            other => Err(CompileError::InvalidPopOperand {
                operand: other.to_string(),
            }),
        }
    }

    pub fn ret(value: Option<Operand>) -> Self {
        Self::new(InstructionKind::Return, value)
    }

    pub fn kind(&self) -> InstructionKind {
        self.kind
    }

    /// The principal operand.
    pub fn value(&self) -> Option<&Operand> {
        self.value.as_ref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn condition(&self) -> Option<&Condition> {
        match &self.value {
            Some(Operand::Boolean(condition)) if self.kind == InstructionKind::ConditionalJump => {
                Some(condition)
            }
            _ => None,
        }
    }

    /// Whether the owning method must record a branch target for this instruction.
    pub fn is_branch(&self) -> bool {
        matches!(self.kind, InstructionKind::Jump | InstructionKind::ConditionalJump)
    }

    pub fn mnemonic(&self) -> &'static str {
        self.kind.mnemonic()
    }

    /// Append the diagnostic form of this instruction to `out`.
    pub fn dump(&self, prefix: &str, out: &mut String) {
        out.push_str(prefix);
        out.push_str(&self.to_string());
        out.push('\n');
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04} {}", self.index, self.mnemonic())?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}
