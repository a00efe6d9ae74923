// This module holds the runtime side of the compiler's contract with the kernel: the
// method-boundary table that maps code address ranges to method identities, and the
// frame-pointer stack walker that consumes it from the kernel's fault path. Neither part
// depends on the compile-time pipeline; both only rely on the table layout and on every
// compiled method keeping the EBP chain intact.

//! Method boundaries and stack walking.

pub mod boundary;
pub mod stack_walk;

pub use boundary::{MethodBoundary, MethodBoundaryTable, MethodIdentity, RECORD_SIZE};
pub use stack_walk::{capture_call_stack, FrameMemory, StackFrame, SyntheticStack, WORD_SIZE};

#[cfg(target_arch = "x86")]
pub use stack_walk::{capture_current, NativeMemory};
