// This module provides x86 (32-bit protected mode) instruction encoding on top of the
// iced-x86 code assembler. X86Encoder turns the register and memory vocabulary of this
// crate into machine code: register and immediate moves, sized loads with zero or sign
// extension, stores, pushes and pops of registers and memory, control register moves,
// comparisons and tests, SETcc materialization, LEA, and labelled control flow with one
// label per IR instruction index. Register-register forms go through the typed code_asm
// helpers; memory forms are built as iced Instructions over a MemoryOperand because
// operands may lack a base or an index. Prologue and epilogue follow the frame-pointer
// discipline the runtime stack walker relies on.

//! x86 instruction encoding using iced-x86.

use std::collections::{HashMap, HashSet};

use iced_x86::code_asm::*;
use iced_x86::{Code, IcedError, Instruction};
use thiserror::Error;

use super::memory::{Memory, OperandSize};
use super::register::{ControlRegister, R32};

/// Error types for instruction encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid register for operation: {0}")]
    InvalidRegister(String),

    #[error("Unsupported operand combination: {0}")]
    Unsupported(String),

    #[error("Assembly error: {0}")]
    Assembly(String),

    #[error("Label for instruction {0} was referenced but never placed")]
    UnplacedLabel(usize),

    #[error("Label for instruction {0} placed twice")]
    DuplicateLabel(usize),
}

impl From<IcedError> for EncodingError {
    fn from(error: IcedError) -> Self {
        EncodingError::Assembly(error.to_string())
    }
}

/// Jump conditions for conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpCondition {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Below,
    BelowEqual,
    Above,
    AboveEqual,
}

impl JumpCondition {
    pub fn negate(self) -> Self {
        use JumpCondition::*;
        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            Less => GreaterEqual,
            LessEqual => Greater,
            Greater => LessEqual,
            GreaterEqual => Less,
            Below => AboveEqual,
            BelowEqual => Above,
            Above => BelowEqual,
            AboveEqual => Below,
        }
    }
}

/// x86 instruction encoder.
pub struct X86Encoder {
    assembler: CodeAssembler,
    /// Labels keyed by IR instruction index.
    labels: HashMap<usize, CodeLabel>,
    placed: HashSet<usize>,
}

impl X86Encoder {
    pub fn new() -> Result<Self, EncodingError> {
        Ok(Self {
            assembler: CodeAssembler::new(32)?,
            labels: HashMap::new(),
            placed: HashSet::new(),
        })
    }

    /// Number of instructions emitted so far.
    pub fn instruction_count(&self) -> usize {
        self.assembler.instructions().len()
    }

    fn emit(&mut self, instruction: Result<Instruction, IcedError>) -> Result<(), EncodingError> {
        self.assembler.add_instruction(instruction?)?;
        Ok(())
    }

    // ==== MOVES ====

    pub fn mov_reg_reg(&mut self, dst: R32, src: R32) -> Result<(), EncodingError> {
        self.assembler.mov(dst.asm(), src.asm())?;
        Ok(())
    }

    pub fn mov_reg_imm(&mut self, dst: R32, imm: i32) -> Result<(), EncodingError> {
        if imm == 0 {
            self.assembler.xor(dst.asm(), dst.asm())?;
        } else {
            self.assembler.mov(dst.asm(), imm)?;
        }
        Ok(())
    }

    /// Load `mem` into `dst`, extending narrow accesses to 32 bits.
    pub fn load(&mut self, dst: R32, mem: &Memory, signed: bool) -> Result<(), EncodingError> {
        let code = match (mem.size, signed) {
            (OperandSize::Byte, false) => Code::Movzx_r32_rm8,
            (OperandSize::Byte, true) => Code::Movsx_r32_rm8,
            (OperandSize::Word, false) => Code::Movzx_r32_rm16,
            (OperandSize::Word, true) => Code::Movsx_r32_rm16,
            (OperandSize::DWord, _) => Code::Mov_r32_rm32,
            (OperandSize::QWord, _) => {
                return Err(EncodingError::Unsupported(format!("load {mem} into {dst}")))
            }
        };
        self.emit(Instruction::with2(code, dst.iced(), mem.to_iced()))
    }

    /// Store the low bytes of `src` to `mem`.
    pub fn store(&mut self, mem: &Memory, src: R32) -> Result<(), EncodingError> {
        let instruction = match mem.size {
            OperandSize::Byte => {
                let low = src
                    .low_byte()
                    .ok_or_else(|| EncodingError::InvalidRegister(format!("{src} has no low byte")))?;
                Instruction::with2(Code::Mov_rm8_r8, mem.to_iced(), low.iced())
            }
            OperandSize::Word => Instruction::with2(Code::Mov_rm16_r16, mem.to_iced(), src.word().iced()),
            OperandSize::DWord => Instruction::with2(Code::Mov_rm32_r32, mem.to_iced(), src.iced()),
            OperandSize::QWord => {
                return Err(EncodingError::Unsupported(format!("store {src} to {mem}")))
            }
        };
        self.emit(instruction)
    }

    pub fn lea(&mut self, dst: R32, mem: &Memory) -> Result<(), EncodingError> {
        self.emit(Instruction::with2(Code::Lea_r32_m, dst.iced(), mem.to_iced()))
    }

    pub fn mov_cr_reg(&mut self, dst: ControlRegister, src: R32) -> Result<(), EncodingError> {
        self.emit(Instruction::with2(Code::Mov_cr_r32, dst.iced(), src.iced()))
    }

    pub fn mov_reg_cr(&mut self, dst: R32, src: ControlRegister) -> Result<(), EncodingError> {
        self.emit(Instruction::with2(Code::Mov_r32_cr, dst.iced(), src.iced()))
    }

    // ==== STACK ====

    pub fn push_reg(&mut self, reg: R32) -> Result<(), EncodingError> {
        self.assembler.push(reg.asm())?;
        Ok(())
    }

    pub fn pop_reg(&mut self, reg: R32) -> Result<(), EncodingError> {
        self.assembler.pop(reg.asm())?;
        Ok(())
    }

    pub fn push_mem(&mut self, mem: &Memory) -> Result<(), EncodingError> {
        self.emit(Instruction::with1(Code::Push_rm32, mem.with_size(OperandSize::DWord).to_iced()))
    }

    pub fn pop_mem(&mut self, mem: &Memory) -> Result<(), EncodingError> {
        self.emit(Instruction::with1(Code::Pop_rm32, mem.with_size(OperandSize::DWord).to_iced()))
    }

    // ==== ARITHMETIC AND COMPARISON ====

    pub fn sub_reg_imm(&mut self, dst: R32, imm: i32) -> Result<(), EncodingError> {
        self.assembler.sub(dst.asm(), imm)?;
        Ok(())
    }

    pub fn add_reg_imm(&mut self, dst: R32, imm: i32) -> Result<(), EncodingError> {
        self.assembler.add(dst.asm(), imm)?;
        Ok(())
    }

    pub fn cmp_reg_reg(&mut self, left: R32, right: R32) -> Result<(), EncodingError> {
        self.assembler.cmp(left.asm(), right.asm())?;
        Ok(())
    }

    pub fn cmp_reg_imm(&mut self, reg: R32, imm: i32) -> Result<(), EncodingError> {
        self.assembler.cmp(reg.asm(), imm)?;
        Ok(())
    }

    pub fn test_reg_reg(&mut self, left: R32, right: R32) -> Result<(), EncodingError> {
        self.assembler.test(left.asm(), right.asm())?;
        Ok(())
    }

    /// Set `dst` to 0 or 1 from the flags.
    pub fn set_reg(&mut self, condition: JumpCondition, dst: R32) -> Result<(), EncodingError> {
        let low = dst
            .low_byte()
            .ok_or_else(|| EncodingError::InvalidRegister(format!("{dst} has no low byte")))?
            .asm();

        match condition {
            JumpCondition::Equal => self.assembler.sete(low)?,
            JumpCondition::NotEqual => self.assembler.setne(low)?,
            JumpCondition::Less => self.assembler.setl(low)?,
            JumpCondition::LessEqual => self.assembler.setle(low)?,
            JumpCondition::Greater => self.assembler.setg(low)?,
            JumpCondition::GreaterEqual => self.assembler.setge(low)?,
            JumpCondition::Below => self.assembler.setb(low)?,
            JumpCondition::BelowEqual => self.assembler.setbe(low)?,
            JumpCondition::Above => self.assembler.seta(low)?,
            JumpCondition::AboveEqual => self.assembler.setae(low)?,
        }
        self.assembler.movzx(dst.asm(), low)?;
        Ok(())
    }

    pub fn ret(&mut self) -> Result<(), EncodingError> {
        self.assembler.ret()?;
        Ok(())
    }

    pub fn int3(&mut self) -> Result<(), EncodingError> {
        self.assembler.int3()?;
        Ok(())
    }

    // ==== LABELS AND CONTROL FLOW ====

    fn label_for(&mut self, index: usize) -> CodeLabel {
        if let Some(&label) = self.labels.get(&index) {
            label
        } else {
            let label = self.assembler.create_label();
            self.labels.insert(index, label);
            label
        }
    }

    /// Place the label of IR instruction `index` before the next instruction.
    pub fn place_label(&mut self, index: usize) -> Result<(), EncodingError> {
        if !self.placed.insert(index) {
            return Err(EncodingError::DuplicateLabel(index));
        }

        let mut label = self.label_for(index);
        self.assembler.set_label(&mut label)?;
        Ok(())
    }

    pub fn is_placed(&self, index: usize) -> bool {
        self.placed.contains(&index)
    }

    pub fn jmp_to(&mut self, index: usize) -> Result<(), EncodingError> {
        let label = self.label_for(index);
        self.assembler.jmp(label)?;
        Ok(())
    }

    pub fn jcc_to(&mut self, condition: JumpCondition, index: usize) -> Result<(), EncodingError> {
        let label = self.label_for(index);
        match condition {
            JumpCondition::Equal => self.assembler.je(label)?,
            JumpCondition::NotEqual => self.assembler.jne(label)?,
            JumpCondition::Less => self.assembler.jl(label)?,
            JumpCondition::LessEqual => self.assembler.jle(label)?,
            JumpCondition::Greater => self.assembler.jg(label)?,
            JumpCondition::GreaterEqual => self.assembler.jge(label)?,
            JumpCondition::Below => self.assembler.jb(label)?,
            JumpCondition::BelowEqual => self.assembler.jbe(label)?,
            JumpCondition::Above => self.assembler.ja(label)?,
            JumpCondition::AboveEqual => self.assembler.jae(label)?,
        }
        Ok(())
    }

    // ==== FRAME ====

    /// `push ebp; mov ebp, esp; sub esp, frame_size`
    pub fn emit_prologue(&mut self, frame_size: u32) -> Result<(), EncodingError> {
        self.push_reg(R32::EBP)?;
        self.mov_reg_reg(R32::EBP, R32::ESP)?;
        if frame_size > 0 {
            self.sub_reg_imm(R32::ESP, frame_size as i32)?;
        }
        Ok(())
    }

    /// `mov esp, ebp; pop ebp; ret`
    pub fn emit_epilogue(&mut self) -> Result<(), EncodingError> {
        self.mov_reg_reg(R32::ESP, R32::EBP)?;
        self.pop_reg(R32::EBP)?;
        self.ret()
    }

    /// Assemble everything emitted so far for execution at `ip`.
    pub fn finalize(mut self, ip: u32) -> Result<Vec<u8>, EncodingError> {
        let mut unplaced: Vec<_> = self
            .labels
            .keys()
            .filter(|index| !self.placed.contains(index))
            .copied()
            .collect();
        unplaced.sort_unstable();
        if let Some(&index) = unplaced.first() {
            return Err(EncodingError::UnplacedLabel(index));
        }

        Ok(self.assembler.assemble(ip as u64)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x86::memory::Scale;

    #[test]
    fn test_basic_instructions() {
        let mut encoder = X86Encoder::new().unwrap();
        encoder.mov_reg_reg(R32::EAX, R32::ECX).unwrap();
        encoder.mov_reg_imm(R32::EAX, 42).unwrap();
        encoder.ret().unwrap();

        let code = encoder.finalize(0x1000).unwrap();
        // mov eax, ecx (89 C8) / mov eax, 42 (B8 2A 00 00 00) / ret (C3)
        assert_eq!(code, [0x89, 0xC8, 0xB8, 0x2A, 0x00, 0x00, 0x00, 0xC3]);
    }

    #[test]
    fn test_prologue_epilogue() {
        let mut encoder = X86Encoder::new().unwrap();
        encoder.emit_prologue(8).unwrap();
        encoder.emit_epilogue().unwrap();

        let code = encoder.finalize(0).unwrap();
        // push ebp / mov ebp, esp / sub esp, 8 / mov esp, ebp / pop ebp / ret
        assert_eq!(code[0], 0x55);
        assert_eq!(&code[1..3], &[0x89, 0xE5]);
        assert_eq!(&code[3..6], &[0x83, 0xEC, 0x08]);
        assert_eq!(&code[code.len() - 4..], &[0x89, 0xEC, 0x5D, 0xC3]);
    }

    #[test]
    fn test_memory_forms() {
        let mut encoder = X86Encoder::new().unwrap();
        let slot = Memory::frame_slot(OperandSize::DWord, -4);
        encoder.load(R32::EAX, &slot, false).unwrap();
        encoder.store(&slot.with_size(OperandSize::Byte), R32::ECX).unwrap();
        encoder.pop_mem(&slot).unwrap();
        encoder.push_mem(&Memory::absolute(OperandSize::DWord, 0x2000)).unwrap();
        encoder
            .lea(R32::EDX, &Memory::indexed(OperandSize::DWord, R32::EBX, R32::ESI, Scale::Four, 16))
            .unwrap();
        encoder.load(R32::EAX, &slot.with_size(OperandSize::Word), true).unwrap();
        assert_eq!(encoder.instruction_count(), 6);

        let code = encoder.finalize(0).unwrap();
        // mov eax, [ebp-4]
        assert_eq!(&code[..3], &[0x8B, 0x45, 0xFC]);
        // mov [ebp-4], cl
        assert_eq!(&code[3..6], &[0x88, 0x4D, 0xFC]);
        // pop dword [ebp-4]
        assert_eq!(&code[6..9], &[0x8F, 0x45, 0xFC]);
    }

    #[test]
    fn test_qword_access_rejected() {
        let mut encoder = X86Encoder::new().unwrap();
        let slot = Memory::frame_slot(OperandSize::QWord, -8);
        assert!(matches!(
            encoder.load(R32::EAX, &slot, false),
            Err(EncodingError::Unsupported(_))
        ));
        assert!(matches!(encoder.store(&slot, R32::EAX), Err(EncodingError::Unsupported(_))));
    }

    #[test]
    fn test_store_byte_needs_low_byte() {
        let mut encoder = X86Encoder::new().unwrap();
        let slot = Memory::frame_slot(OperandSize::Byte, -1);
        assert!(matches!(
            encoder.store(&slot, R32::ESI),
            Err(EncodingError::InvalidRegister(_))
        ));
    }

    #[test]
    fn test_control_registers() {
        let mut encoder = X86Encoder::new().unwrap();
        encoder.mov_reg_cr(R32::EAX, ControlRegister::CR0).unwrap();
        encoder.mov_cr_reg(ControlRegister::CR3, R32::EAX).unwrap();

        let code = encoder.finalize(0).unwrap();
        // mov eax, cr0 (0F 20 C0) / mov cr3, eax (0F 22 D8)
        assert_eq!(code, [0x0F, 0x20, 0xC0, 0x0F, 0x22, 0xD8]);
    }

    #[test]
    fn test_label_management() {
        let mut encoder = X86Encoder::new().unwrap();

        encoder.place_label(0).unwrap();
        encoder.cmp_reg_imm(R32::EAX, 1).unwrap();
        encoder.jcc_to(JumpCondition::LessEqual, 2).unwrap();

        encoder.place_label(1).unwrap();
        encoder.sub_reg_imm(R32::EAX, 1).unwrap();
        encoder.jmp_to(0).unwrap();

        assert!(!encoder.is_placed(2));
        encoder.place_label(2).unwrap();
        encoder.ret().unwrap();
        assert!(encoder.is_placed(2));

        assert_eq!(encoder.place_label(2), Err(EncodingError::DuplicateLabel(2)));

        let code = encoder.finalize(0x1000).unwrap();
        assert!(!code.is_empty());
        assert_eq!(code.last(), Some(&0xC3));
    }

    #[test]
    fn test_unplaced_label() {
        let mut encoder = X86Encoder::new().unwrap();
        encoder.jmp_to(7).unwrap();
        assert_eq!(encoder.finalize(0), Err(EncodingError::UnplacedLabel(7)));
    }

    #[test]
    fn test_set_reg() {
        let mut encoder = X86Encoder::new().unwrap();
        encoder.cmp_reg_reg(R32::EAX, R32::ECX).unwrap();
        encoder.set_reg(JumpCondition::Below, R32::EAX).unwrap();
        assert!(encoder.set_reg(JumpCondition::Equal, R32::EDI).is_err());

        let code = encoder.finalize(0).unwrap();
        // cmp eax, ecx / setb al / movzx eax, al
        assert_eq!(code, [0x39, 0xC8, 0x0F, 0x92, 0xC0, 0x0F, 0xB6, 0xC0]);
    }

    #[test]
    fn test_negate() {
        assert_eq!(JumpCondition::Less.negate(), JumpCondition::GreaterEqual);
        assert_eq!(JumpCondition::Above.negate().negate(), JumpCondition::Above);
    }
}
