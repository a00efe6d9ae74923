// This module provides the arena-based compilation session. CompilationSession owns a
// reference to a bumpalo arena used to intern class and method names, the compiler
// options for the run, a layout cache keyed by type identity, and SessionStats. Layout
// resolution itself is a pure recomputation on every resolver query; the session is the
// caller that caches results so repeated queries for the same type during one run cost a
// single hash lookup. All state sits behind RefCell because a session is handed around
// by shared reference within one single-threaded compilation.

//! Arena-based compilation session management.

use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::collections::HashMap as StdHashMap;
use std::fmt;

use super::config::CompilerOptions;
use crate::layout::{ClassLayout, TypeLayoutResolver};
use crate::metadata::{TypeId, TypeRegistry};

/// Arena-based compilation session.
///
/// All interned strings share the arena lifetime, so identities handed out by
/// the session outlive every per-method structure built during the run.
pub struct CompilationSession<'arena> {
    /// Arena allocator for interned names.
    arena: &'arena Bump,

    /// Target description for this run.
    options: CompilerOptions,

    /// Session statistics for debugging.
    stats: RefCell<SessionStats>,

    /// String interning for class and method identities.
    interned_strings: RefCell<StdHashMap<String, &'arena str>>,

    /// Layouts resolved so far, keyed by type identity.
    layouts: RefCell<HashMap<TypeId, ClassLayout>>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new compilation session with the given arena.
    pub fn new(arena: &'arena Bump, options: CompilerOptions) -> Self {
        Self {
            arena,
            options,
            stats: RefCell::new(SessionStats::default()),
            interned_strings: RefCell::new(StdHashMap::new()),
            layouts: RefCell::new(HashMap::new()),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned = self.arena.alloc_str(s);
        strings.insert(s.to_string(), interned);
        interned
    }

    /// Layout of a registered type, resolved once per session.
    pub fn class_layout(&self, registry: &TypeRegistry, type_id: TypeId) -> ClassLayout {
        if let Some(layout) = self.layouts.borrow().get(&type_id) {
            return *layout;
        }

        let descriptor = registry.descriptor(type_id);
        let layout = TypeLayoutResolver::new(registry).layout(descriptor);
        log::debug!(
            "Resolved layout of {}: {} / {} bytes",
            descriptor.full_name(),
            layout.internal_type,
            layout.size
        );

        self.layouts.borrow_mut().insert(type_id, layout);
        self.stats.borrow_mut().layouts_resolved += 1;
        layout
    }

    /// Record that a method was compiled.
    pub fn record_method_compiled(&self, name: &str, code_size: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.methods_compiled += 1;
        stats.total_code_size += code_size;

        if stats.largest_method_size < code_size {
            stats.largest_method_size = code_size;
            stats.largest_method_name = name.to_string();
        }
    }

    /// Record an IR instruction lowered to machine code.
    pub fn record_instruction_lowered(&self, mnemonic: &str) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions_lowered += 1;
        *stats
            .instruction_counts
            .entry(mnemonic.to_string())
            .or_insert(0) += 1;
    }

    /// Snapshot of the statistics gathered so far.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Compilation statistics.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub methods_compiled: usize,
    pub instructions_lowered: usize,
    pub layouts_resolved: usize,
    pub total_code_size: usize,
    pub largest_method_size: usize,
    pub largest_method_name: String,
    pub instruction_counts: StdHashMap<String, usize>,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Statistics:")?;
        writeln!(f, "  Methods compiled: {}", self.methods_compiled)?;
        writeln!(f, "  Instructions lowered: {}", self.instructions_lowered)?;
        writeln!(f, "  Layouts resolved: {}", self.layouts_resolved)?;
        writeln!(f, "  Total code size: {} bytes", self.total_code_size)?;
        if self.methods_compiled > 0 {
            writeln!(
                f,
                "  Largest method: {} ({} bytes)",
                self.largest_method_name, self.largest_method_size
            )?;
        }

        let mut counts: Vec<_> = self.instruction_counts.iter().collect();
        counts.sort();
        for (mnemonic, count) in counts {
            writeln!(f, "    {mnemonic}: {count}")?;
        }
        Ok(())
    }
}
