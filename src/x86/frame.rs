//! Stack frame layout of a compiled method.
//!
//! Every method keeps the classic frame-pointer chain:
//!
//! ```text
//!   [ebp + 8 + ...]   arguments, first argument lowest
//!   [ebp + 4]         return address
//!   [ebp]             caller's ebp
//!   [ebp - ...]       locals and temporaries, in order of first use
//! ```
//!
//! Every slot is a whole number of stack slots wide.

use std::collections::HashMap;

use super::memory::{Memory, OperandSize};
use crate::core::{CompileError, CompileResult, CompilerOptions};
use crate::ir::{Identifier, IdentifierKind, InternalType, Method};

/// Offset of the first argument from the frame pointer.
pub const FIRST_ARGUMENT_OFFSET: i32 = 8;

/// A slot of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    /// Offset from EBP.
    pub offset: i32,
    /// Size of the stored value.
    pub size: u32,
    /// Bytes reserved for the slot.
    pub reserved: u32,
    pub signed: bool,
}

impl FrameSlot {
    /// Memory operand reading the value of this slot.
    ///
    /// Values wider than a dword are read through their first dword.
    pub fn value(&self) -> Memory {
        let size = OperandSize::from_bytes(self.size).unwrap_or(OperandSize::DWord);
        Memory::frame_slot(size, self.offset)
    }

    /// Number of stack words the slot spans.
    pub fn words(&self) -> u32 {
        self.reserved / 4
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameLayout {
    slots: HashMap<IdentifierKind, FrameSlot>,
    /// Bytes reserved below EBP.
    local_size: u32,
}

impl FrameLayout {
    /// Lay out every identifier `method` uses.
    pub fn for_method(method: &Method, options: &CompilerOptions) -> CompileResult<Self> {
        let mut layout = Self::default();

        let mut argument_offset = FIRST_ARGUMENT_OFFSET;
        for (index, &internal_type) in method.arguments().iter().enumerate() {
            let size = value_size(method, internal_type, options)?;
            let reserved = options.align_to_slot(size);
            let kind = IdentifierKind::Argument(index as u16);
            layout.slots.insert(
                kind,
                FrameSlot {
                    offset: argument_offset,
                    size,
                    reserved,
                    signed: internal_type.is_signed(),
                },
            );
            argument_offset += reserved as i32;
        }

        for identifier in method.identifiers() {
            match identifier.kind {
                IdentifierKind::Argument(index) => {
                    if index as usize >= method.arguments().len() {
                        return Err(CompileError::UnsupportedOperand {
                            method: method.name().to_string(),
                            reason: format!("argument {identifier} is not declared"),
                        });
                    }
                }
                IdentifierKind::Local(_) | IdentifierKind::Temporary(_) => {
                    layout.allocate(method, identifier, options)?;
                }
            }
        }

        log::trace!(
            "{}: {} argument bytes, {} local bytes",
            method.name(),
            argument_offset - FIRST_ARGUMENT_OFFSET,
            layout.local_size
        );
        Ok(layout)
    }

    fn allocate(
        &mut self,
        method: &Method,
        identifier: Identifier,
        options: &CompilerOptions,
    ) -> CompileResult<()> {
        let size = value_size(method, identifier.internal_type, options)?;
        let reserved = options.align_to_slot(size);
        self.local_size += reserved;
        self.slots.insert(
            identifier.kind,
            FrameSlot {
                offset: -(self.local_size as i32),
                size,
                reserved,
                signed: identifier.internal_type.is_signed(),
            },
        );
        Ok(())
    }

    pub fn slot(&self, identifier: &Identifier) -> Option<&FrameSlot> {
        self.slots.get(&identifier.kind)
    }

    /// Bytes the prologue reserves below EBP.
    pub fn local_size(&self) -> u32 {
        self.local_size
    }
}

fn value_size(method: &Method, internal_type: InternalType, options: &CompilerOptions) -> CompileResult<u32> {
    internal_type
        .size(options.pointer_size)
        .ok_or_else(|| CompileError::UnsupportedOperand {
            method: method.name().to_string(),
            reason: format!("no stack slot for a value of type {internal_type}"),
        })
}
