// This module lowers the control-flow IR of one method to x86 machine code. The method
// gets a frame-pointer prologue sized by its FrameLayout, then every IR instruction is
// preceded by a label keyed by its index so jumps and switch cases can refer to any
// instruction of the same method. Operands are materialized into EAX (and ECX for the
// right-hand side of a comparison): identifiers load from their EBP-relative slot with
// zero or sign extension, constants become immediates, and boolean conditions are
// evaluated to 0/1 with SETcc. Comparisons pick signed or unsigned condition codes from
// the left operand's InternalType. Values the 32-bit register model cannot hold
// (aggregates, floats, 64-bit integers in a register) are rejected with
// CompileError::UnsupportedOperand rather than silently truncated.

//! Lowering of IR methods to x86 machine code.

use super::encoder::{JumpCondition, X86Encoder};
use super::frame::FrameLayout;
use super::memory::OperandSize;
use super::register::R32;
use crate::core::{CompilationSession, CompileError, CompileResult};
use crate::ir::{Condition, Constant, Instruction, InstructionKind, Method, Operand, Relation};

/// Compiles methods within one session.
pub struct MethodCompiler<'s, 'arena> {
    session: &'s CompilationSession<'arena>,
}

impl<'s, 'arena> MethodCompiler<'s, 'arena> {
    pub fn new(session: &'s CompilationSession<'arena>) -> Self {
        Self { session }
    }

    /// Compile `method` for execution at address `ip`.
    pub fn compile(&self, method: &Method, ip: u32) -> CompileResult<Vec<u8>> {
        method.validate()?;
        let frame = FrameLayout::for_method(method, self.session.options())?;

        let mut lowering = Lowering {
            method,
            frame: &frame,
            encoder: X86Encoder::new()?,
        };

        lowering.encoder.emit_prologue(frame.local_size())?;
        for instruction in method.instructions() {
            log::trace!("{}: {}", method.name(), instruction);
            lowering.encoder.place_label(instruction.index())?;
            lowering.lower(instruction)?;
            self.session.record_instruction_lowered(instruction.mnemonic());
        }

        // Never run off the end of the method.
        let terminated = method.instructions().last().is_some_and(|last| {
            matches!(last.kind(), InstructionKind::Return | InstructionKind::Jump)
        });
        if !terminated {
            lowering.encoder.emit_epilogue()?;
        }

        let code = lowering.encoder.finalize(ip)?;
        log::debug!("Compiled {} at {:#x}: {} bytes", method.name(), ip, code.len());
        self.session.record_method_compiled(method.name(), code.len());
        Ok(code)
    }
}

struct Lowering<'m> {
    method: &'m Method,
    frame: &'m FrameLayout,
    encoder: X86Encoder,
}

impl Lowering<'_> {
    fn lower(&mut self, instruction: &Instruction) -> CompileResult<()> {
        let index = instruction.index();
        match instruction.kind() {
            InstructionKind::Jump => {
                let target = self.branch_target(index)?;
                self.encoder.jmp_to(target)?;
            }
            InstructionKind::ConditionalJump => {
                let target = self.branch_target(index)?;
                let condition = instruction
                    .condition()
                    .ok_or_else(|| self.unsupported("conditional jump without a condition".into()))?;
                let jump = self.compare(condition)?;
                self.encoder.jcc_to(jump, target)?;
            }
            InstructionKind::Switch => {
                let value = self.principal(instruction)?;
                self.load(R32::EAX, value)?;
                for (case, &target) in self.method.switch_targets(index).iter().enumerate() {
                    self.encoder.cmp_reg_imm(R32::EAX, case as i32)?;
                    self.encoder.jcc_to(JumpCondition::Equal, target)?;
                }
            }
            InstructionKind::Pop => {
                let value = self.principal(instruction)?;
                let identifier = value
                    .as_identifier()
                    .ok_or_else(|| CompileError::InvalidPopOperand {
                        operand: value.to_string(),
                    })?;
                let slot = self.frame.slot(identifier).ok_or_else(|| {
                    self.unsupported(format!("no slot for {identifier}"))
                })?;

                let first = slot.value().with_size(OperandSize::DWord);
                for word in 0..slot.words() {
                    self.encoder.pop_mem(&first.offset_by(4 * word as i32))?;
                }
            }
            InstructionKind::Return => {
                if let Some(value) = instruction.value() {
                    self.load(R32::EAX, value)?;
                }
                self.encoder.emit_epilogue()?;
            }
        }
        Ok(())
    }

    fn branch_target(&self, index: usize) -> CompileResult<usize> {
        self.method
            .branch_target(index)
            .ok_or_else(|| CompileError::MissingBranchTarget {
                method: self.method.name().to_string(),
                index,
            })
    }

    fn principal<'i>(&self, instruction: &'i Instruction) -> CompileResult<&'i Operand> {
        instruction
            .value()
            .ok_or_else(|| self.unsupported(format!("{} without an operand", instruction.mnemonic())))
    }

    fn unsupported(&self, reason: String) -> CompileError {
        CompileError::UnsupportedOperand {
            method: self.method.name().to_string(),
            reason,
        }
    }

    /// 32-bit immediate for `constant`. Values up to `u32::MAX` keep their bit pattern.
    fn immediate(&self, constant: &Constant) -> CompileResult<i32> {
        i32::try_from(constant.value)
            .or_else(|_| u32::try_from(constant.value).map(|value| value as i32))
            .map_err(|_| self.unsupported(format!("constant {constant} does not fit a register")))
    }

    /// Materialize `operand` in `dst`. May clobber EAX and ECX.
    fn load(&mut self, dst: R32, operand: &Operand) -> CompileResult<()> {
        match operand {
            Operand::Identifier(identifier) => {
                if identifier.internal_type.is_float() {
                    return Err(self.unsupported(format!("floating point operand {identifier}")));
                }
                let slot = self
                    .frame
                    .slot(identifier)
                    .ok_or_else(|| self.unsupported(format!("no slot for {identifier}")))?;
                if slot.size > 4 {
                    return Err(self.unsupported(format!(
                        "{identifier} of type {} does not fit a register",
                        identifier.internal_type
                    )));
                }
                self.encoder.load(dst, &slot.value(), slot.signed)?;
            }
            Operand::Constant(constant) => {
                let value = self.immediate(constant)?;
                self.encoder.mov_reg_imm(dst, value)?;
            }
            Operand::Boolean(condition) => {
                let flags = self.compare(condition)?;
                self.encoder.set_reg(flags, R32::EAX)?;
                if dst != R32::EAX {
                    self.encoder.mov_reg_reg(dst, R32::EAX)?;
                }
            }
        }
        Ok(())
    }

    /// Set the flags for `condition`, returning the condition code that holds
    /// when it is true.
    fn compare(&mut self, condition: &Condition) -> CompileResult<JumpCondition> {
        let left = condition.left.as_ref();
        let Some(right) = condition.right.as_deref() else {
            self.load(R32::EAX, left)?;
            self.encoder.test_reg_reg(R32::EAX, R32::EAX)?;
            return Ok(match condition.relation {
                Relation::False => JumpCondition::Equal,
                _ => JumpCondition::NotEqual,
            });
        };

        match right {
            Operand::Constant(constant) => {
                let value = self.immediate(constant)?;
                self.load(R32::EAX, left)?;
                self.encoder.cmp_reg_imm(R32::EAX, value)?;
            }
            Operand::Identifier(_) => {
                self.load(R32::EAX, left)?;
                self.load(R32::ECX, right)?;
                self.encoder.cmp_reg_reg(R32::EAX, R32::ECX)?;
            }
            Operand::Boolean(_) => {
                self.load(R32::EAX, right)?;
                self.encoder.push_reg(R32::EAX)?;
                self.load(R32::EAX, left)?;
                self.encoder.pop_reg(R32::ECX)?;
                self.encoder.cmp_reg_reg(R32::EAX, R32::ECX)?;
            }
        }

        Ok(jump_condition(condition.relation, left.internal_type().is_signed()))
    }
}

/// Condition code for a binary relation.
pub fn jump_condition(relation: Relation, signed: bool) -> JumpCondition {
    match (relation, signed) {
        (Relation::Equal | Relation::True, _) => JumpCondition::Equal,
        (Relation::NotEqual | Relation::False, _) => JumpCondition::NotEqual,
        (Relation::Less, true) => JumpCondition::Less,
        (Relation::Less, false) => JumpCondition::Below,
        (Relation::LessOrEqual, true) => JumpCondition::LessEqual,
        (Relation::LessOrEqual, false) => JumpCondition::BelowEqual,
        (Relation::Greater, true) => JumpCondition::Greater,
        (Relation::Greater, false) => JumpCondition::Above,
        (Relation::GreaterOrEqual, true) => JumpCondition::GreaterEqual,
        (Relation::GreaterOrEqual, false) => JumpCondition::AboveEqual,
    }
}
