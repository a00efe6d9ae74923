//! Methods: instructions in program order plus their target tables.

use std::collections::HashMap;

use super::instruction::{Instruction, InstructionKind};
use super::operand::{Identifier, InternalType};
use crate::core::{CompileError, CompileResult};

/// A compiled method body.
///
/// Instructions are appended in program order and never reordered. Jump
/// targets and switch case lists are kept next to the instruction list,
/// keyed by the index of the branching instruction; targets are instruction
/// indices within the same method.
#[derive(Debug, Clone, Default)]
pub struct Method {
    name: String,
    /// Declared argument types, in order.
    arguments: Vec<InternalType>,
    instructions: Vec<Instruction>,
    branch_targets: HashMap<usize, usize>,
    switch_tables: HashMap<usize, Vec<usize>>,
}

impl Method {
    pub fn new(name: &str, arguments: Vec<InternalType>) -> Self {
        Self {
            name: name.to_string(),
            arguments,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[InternalType] {
        &self.arguments
    }

    /// Append an instruction, returning its index.
    pub fn push(&mut self, mut instruction: Instruction) -> usize {
        let index = self.instructions.len();
        instruction.set_index(index);
        self.instructions.push(instruction);
        index
    }

    /// Append a branch together with its target.
    pub fn push_branch(&mut self, instruction: Instruction, target: usize) -> CompileResult<usize> {
        if !instruction.is_branch() {
            return Err(self.mismatched_target(&instruction, "a branch target"));
        }
        let index = self.push(instruction);
        self.branch_targets.insert(index, target);
        Ok(index)
    }

    /// Append a switch together with its case targets.
    pub fn push_switch(&mut self, instruction: Instruction, targets: Vec<usize>) -> CompileResult<usize> {
        if instruction.kind() != InstructionKind::Switch {
            return Err(self.mismatched_target(&instruction, "case targets"));
        }
        let index = self.push(instruction);
        self.switch_tables.insert(index, targets);
        Ok(index)
    }

    /// Set or replace the target of an already appended branch.
    pub fn set_branch_target(&mut self, branch: usize, target: usize) -> CompileResult<()> {
        match self.instructions.get(branch) {
            Some(instruction) if instruction.is_branch() => {
                self.branch_targets.insert(branch, target);
                Ok(())
            }
            Some(instruction) => Err(self.mismatched_target(instruction, "a branch target")),
            None => Err(CompileError::InvalidBranchTarget {
                method: self.name.clone(),
                target: branch,
            }),
        }
    }

    fn mismatched_target(&self, instruction: &Instruction, what: &str) -> CompileError {
        CompileError::MismatchedTarget {
            method: self.name.clone(),
            reason: format!("{} cannot take {what}", instruction.kind().mnemonic()),
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn branch_target(&self, branch: usize) -> Option<usize> {
        self.branch_targets.get(&branch).copied()
    }

    /// Case targets of a switch; case `i` jumps to `targets[i]`.
    pub fn switch_targets(&self, switch: usize) -> &[usize] {
        self.switch_tables
            .get(&switch)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check that every branch has a target inside this method.
    pub fn validate(&self) -> CompileResult<()> {
        for instruction in &self.instructions {
            let index = instruction.index();
            if instruction.is_branch() {
                let target = self.branch_target(index).ok_or_else(|| {
                    CompileError::MissingBranchTarget {
                        method: self.name.clone(),
                        index,
                    }
                })?;
                self.check_target(target)?;
            } else if instruction.kind() == InstructionKind::Switch {
                for &target in self.switch_targets(index) {
                    self.check_target(target)?;
                }
            }
        }
        Ok(())
    }

    fn check_target(&self, target: usize) -> CompileResult<()> {
        if target >= self.instructions.len() {
            return Err(CompileError::InvalidBranchTarget {
                method: self.name.clone(),
                target,
            });
        }
        Ok(())
    }

    /// Identifiers in order of first appearance.
    pub fn identifiers(&self) -> Vec<Identifier> {
        let mut seen = Vec::new();
        for instruction in &self.instructions {
            if let Some(value) = instruction.value() {
                value.for_each_identifier(&mut |identifier| {
                    if !seen.iter().any(|s: &Identifier| s.kind == identifier.kind) {
                        seen.push(*identifier);
                    }
                });
            }
        }
        seen
    }

    /// Diagnostic listing, one instruction per line.
    pub fn dump(&self) -> String {
        let mut out = format!("Method {}\n", self.name);
        for instruction in &self.instructions {
            instruction.dump("  ", &mut out);
            let index = instruction.index();
            if let Some(target) = self.branch_target(index) {
                out.push_str(&format!("    -> {target:04}\n"));
            }
            for (case, target) in self.switch_targets(index).iter().enumerate() {
                out.push_str(&format!("    case {case} -> {target:04}\n"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::operand::{Condition, Constant};

    fn counter_loop() -> Method {
        let counter = Identifier::local(0, InternalType::I4);
        let mut method = Method::new("Spin", vec![InternalType::I4]);
        method.push(Instruction::pop(counter));
        method.push_branch(
            Instruction::conditional_jump(Condition::is_true(counter.into())),
            0,
        ).unwrap();
        method.push(Instruction::ret(Some(Constant::i4(0).into())));
        method
    }

    #[test]
    fn test_indices_follow_insertion_order() {
        let method = counter_loop();
        let indices: Vec<_> = method.instructions().iter().map(Instruction::index).collect();
        assert_eq!(indices, [0, 1, 2]);
        assert_eq!(method.branch_target(1), Some(0));
        assert!(method.validate().is_ok());
    }

    #[test]
    fn test_missing_branch_target() {
        let mut method = Method::new("Broken", Vec::new());
        method.push(Instruction::jump());
        let err = method.validate().unwrap_err();
        assert!(matches!(err, CompileError::MissingBranchTarget { index: 0, .. }));
    }

    #[test]
    fn test_target_out_of_range() {
        let mut method = Method::new("Broken", Vec::new());
        let selector = Identifier::argument(0, InternalType::I4);
        method.push_switch(Instruction::switch(selector.into()), vec![1, 5]).unwrap();
        method.push(Instruction::ret(None));
        let err = method.validate().unwrap_err();
        assert!(matches!(err, CompileError::InvalidBranchTarget { target: 5, .. }));
    }

    #[test]
    fn test_targets_require_matching_kind() {
        let selector = Identifier::argument(0, InternalType::I4);
        let mut method = Method::new("Mixed", vec![InternalType::I4]);

        let err = method.push_branch(Instruction::switch(selector.into()), 0).unwrap_err();
        assert!(matches!(err, CompileError::MismatchedTarget { .. }));
        let err = method.push_switch(Instruction::jump(), vec![0]).unwrap_err();
        assert!(matches!(err, CompileError::MismatchedTarget { .. }));
        assert!(method.is_empty());

        method.push(Instruction::ret(None));
        assert!(matches!(
            method.set_branch_target(0, 0),
            Err(CompileError::MismatchedTarget { .. })
        ));
        assert!(matches!(
            method.set_branch_target(4, 0),
            Err(CompileError::InvalidBranchTarget { target: 4, .. })
        ));

        let jump = method.push_branch(Instruction::jump(), 0).unwrap();
        method.set_branch_target(jump, 1).unwrap();
        assert_eq!(method.branch_target(jump), Some(1));
    }

    #[test]
    fn test_identifiers_deduplicated() {
        let method = counter_loop();
        let identifiers = method.identifiers();
        assert_eq!(identifiers.len(), 1);
        assert_eq!(identifiers[0].to_string(), "L0");
    }

    #[test]
    fn test_dump_lists_targets() {
        let mut method = Method::new("Dispatch", vec![InternalType::I4]);
        method.push_switch(
            Instruction::switch(Identifier::argument(0, InternalType::I4).into()),
            vec![2, 3],
        ).unwrap();
        method.push(Instruction::ret(Some(Constant::i4(-1).into())));
        method.push(Instruction::ret(Some(Constant::i4(10).into())));
        method.push(Instruction::ret(Some(Constant::i4(20).into())));

        let dump = method.dump();
        assert!(dump.starts_with("Method Dispatch\n"));
        assert!(dump.contains("  0000 Switch A0\n"));
        assert!(dump.contains("    case 1 -> 0003\n"));
        assert!(dump.contains("  0001 Return -1\n"));
    }
}
