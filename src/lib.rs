//! kaot - ahead-of-time compilation of managed methods for a freestanding x86 kernel.
//!
//! The crate covers the architectural machinery the rest of the compiler sits on:
//! type layout resolution, the typed IR for control flow, the x86 register and
//! addressing vocabulary together with lowering to machine code, and the
//! runtime-side stack walker that consumes the method-boundary table emitted
//! next to the kernel image.
//!
//! # Primary Usage
//!
//! ```ignore
//! use bumpalo::Bump;
//! use kaot::core::{CompilationSession, CompilerOptions};
//! use kaot::image::compile_program;
//!
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena, CompilerOptions::default());
//! let image = compile_program(&session, &program)?;
//! let object = image.to_object()?;
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Session, options and error types
//! - [`metadata`] - Type descriptors, the metadata oracle and the type registry
//! - [`layout`] - Per-type size and internal type resolution
//! - [`ir`] - Operands, instructions, methods and classes
//! - [`x86`] - Registers, memory operands, encoder and lowering
//! - [`image`] - Method placement and boundary table / object emission
//! - [`runtime`] - Method boundaries and the frame-pointer stack walker

pub mod core;
pub mod metadata;
pub mod layout;
pub mod ir;
pub mod x86;
pub mod image;
pub mod runtime;

pub use crate::core::{CompilationSession, CompileError, CompileResult, CompilerOptions, SessionStats};
pub use crate::ir::{Class, ClassId, Instruction, InternalType, Method, MethodId, Operand, Program};
pub use crate::layout::{ClassLayout, TypeLayoutResolver};
pub use crate::metadata::{MetadataOracle, TypeDescriptor, TypeRegistry};
pub use crate::runtime::{capture_call_stack, MethodBoundary, MethodBoundaryTable, StackFrame};
