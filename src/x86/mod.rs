//! x86 (32-bit protected mode) architecture-specific components.
//!
//! This module contains all x86 specific code:
//! - Register and memory operand model
//! - Instruction encoding using iced-x86
//! - Frame-pointer stack frame layout
//! - Lowering of IR methods to machine code

pub mod encoder;
pub mod frame;
pub mod lowering;
pub mod memory;
pub mod register;

pub use encoder::{EncodingError, JumpCondition, X86Encoder as Encoder};
pub use frame::{FrameLayout, FrameSlot};
pub use lowering::MethodCompiler;
pub use memory::{Memory, OperandSize, Scale};
pub use register::{ControlRegister, RegisterIdentity, R16, R32, R8};
