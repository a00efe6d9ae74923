//! Memory operands.
//!
//! A memory operand addresses `base + index * scale + displacement` with an
//! access size. Base and index are both optional; an operand with neither is
//! an absolute address.

use std::fmt;

use iced_x86::{MemoryOperand, Register};

use super::register::R32;

/// Width of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandSize {
    Byte,
    Word,
    DWord,
    QWord,
}

impl OperandSize {
    pub fn bytes(self) -> u32 {
        match self {
            OperandSize::Byte => 1,
            OperandSize::Word => 2,
            OperandSize::DWord => 4,
            OperandSize::QWord => 8,
        }
    }

    pub fn from_bytes(bytes: u32) -> Option<Self> {
        match bytes {
            1 => Some(OperandSize::Byte),
            2 => Some(OperandSize::Word),
            4 => Some(OperandSize::DWord),
            8 => Some(OperandSize::QWord),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            OperandSize::Byte => "byte",
            OperandSize::Word => "word",
            OperandSize::DWord => "dword",
            OperandSize::QWord => "qword",
        }
    }
}

/// Index scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scale {
    #[default]
    One,
    Two,
    Four,
    Eight,
}

impl Scale {
    pub fn factor(self) -> u32 {
        match self {
            Scale::One => 1,
            Scale::Two => 2,
            Scale::Four => 4,
            Scale::Eight => 8,
        }
    }

    pub fn from_factor(factor: u32) -> Option<Self> {
        match factor {
            1 => Some(Scale::One),
            2 => Some(Scale::Two),
            4 => Some(Scale::Four),
            8 => Some(Scale::Eight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory {
    pub size: OperandSize,
    pub base: Option<R32>,
    pub index: Option<(R32, Scale)>,
    pub displacement: i32,
}

impl Memory {
    /// `[base + displacement]`
    pub fn based(size: OperandSize, base: R32, displacement: i32) -> Self {
        Self {
            size,
            base: Some(base),
            index: None,
            displacement,
        }
    }

    /// `[base + index * scale + displacement]`
    pub fn indexed(size: OperandSize, base: R32, index: R32, scale: Scale, displacement: i32) -> Self {
        Self {
            size,
            base: Some(base),
            index: Some((index, scale)),
            displacement,
        }
    }

    /// `[address]`
    pub fn absolute(size: OperandSize, address: u32) -> Self {
        Self {
            size,
            base: None,
            index: None,
            displacement: address as i32,
        }
    }

    /// Stack slot relative to the frame pointer.
    pub fn frame_slot(size: OperandSize, offset: i32) -> Self {
        Self::based(size, R32::EBP, offset)
    }

    /// The same address `bytes` further on, e.g. the next word of a slot.
    pub fn offset_by(self, bytes: i32) -> Self {
        Self {
            displacement: self.displacement + bytes,
            ..self
        }
    }

    pub fn with_size(self, size: OperandSize) -> Self {
        Self { size, ..self }
    }

    /// Convert to an iced-x86 memory operand.
    pub fn to_iced(&self) -> MemoryOperand {
        let base = self.base.map_or(Register::None, R32::iced);
        let (index, scale) = match self.index {
            Some((register, scale)) => (register.iced(), scale.factor()),
            None => (Register::None, 1),
        };

        // Absolute addresses always take a full 32-bit displacement.
        let displ_size = if self.base.is_none() && self.index.is_none() {
            4
        } else if self.displacement == 0 {
            0
        } else {
            1
        };

        MemoryOperand::new(
            base,
            index,
            scale,
            self.displacement as i64,
            displ_size,
            false,
            Register::None,
        )
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.size.keyword())?;

        let mut wrote_register = false;
        if let Some(base) = self.base {
            write!(f, "{}", base.name().to_ascii_lowercase())?;
            wrote_register = true;
        }
        if let Some((index, scale)) = self.index {
            if wrote_register {
                f.write_str("+")?;
            }
            write!(f, "{}", index.name().to_ascii_lowercase())?;
            if scale != Scale::One {
                write!(f, "*{}", scale.factor())?;
            }
            wrote_register = true;
        }

        if !wrote_register {
            write!(f, "{:#x}", self.displacement as u32)?;
        } else if self.displacement > 0 {
            write!(f, "+{}", self.displacement)?;
        } else if self.displacement < 0 {
            write!(f, "-{}", self.displacement.unsigned_abs())?;
        }

        f.write_str("]")
    }
}
