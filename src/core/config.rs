//! Compiler options describing the kernel target.

/// Options for one compilation run.
///
/// The defaults describe the 32-bit protected-mode kernel the compiler
/// targets: 4-byte pointers, an image loaded at 1 MiB and methods aligned to
/// 16 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Size of a native pointer (and object reference) in bytes.
    pub pointer_size: u32,
    /// Address the first compiled method is placed at.
    pub image_base: u32,
    /// Alignment of every method's first instruction.
    pub method_alignment: u32,
    /// Granularity of stack slots in a method frame.
    pub stack_slot_size: u32,
}

impl CompilerOptions {
    pub fn with_pointer_size(mut self, pointer_size: u32) -> Self {
        self.pointer_size = pointer_size;
        self
    }

    pub fn with_image_base(mut self, image_base: u32) -> Self {
        self.image_base = image_base;
        self
    }

    pub fn with_method_alignment(mut self, alignment: u32) -> Self {
        self.method_alignment = alignment.max(1);
        self
    }

    /// Round `value` up to the next multiple of the stack slot size.
    pub fn align_to_slot(&self, value: u32) -> u32 {
        let slot = self.stack_slot_size.max(1);
        value.div_ceil(slot) * slot
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            pointer_size: 4,
            image_base: 0x0010_0000,
            method_alignment: 16,
            stack_slot_size: 4,
        }
    }
}
