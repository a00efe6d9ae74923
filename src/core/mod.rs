// This module is the hub for the compiler's shared infrastructure: the error type every
// fallible operation returns, the options describing the kernel target, and the
// compilation session that owns the name arena, the per-type layout cache and the
// compilation statistics. Everything here is single-threaded by construction; a session
// lives for exactly one compilation run and is never shared across threads.

//! Core compiler infrastructure.
//!
//! # Key Components
//!
//! ## Errors (`error`)
//! - [`CompileError`] for fatal compiler-internal violations
//! - Soft misses are sentinels elsewhere and never appear here
//!
//! ## Options (`config`)
//! - Pointer size, image base, method alignment and stack slot size
//!
//! ## Session Management (`session`)
//! - Arena-based name interning using `bumpalo`
//! - Layout cache keyed by type identity
//! - Compilation statistics

pub mod config;
pub mod error;
pub mod session;

pub use config::CompilerOptions;
pub use error::{CompileError, CompileResult};
pub use session::{CompilationSession, SessionStats};
