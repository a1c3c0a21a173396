//! Two-pass instruction emission: instructions are appended as they are
//! compiled, jump targets are bound once reached, and every pending jump is
//! patched to its final relative offset once the function is complete.

use super::op::{Instruction, Opcode};
use crate::location::CodeRange;

/// A yet-to-be-bound jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

pub struct CodeBuilder {
    instructions: Vec<u32>,
    locations: Vec<CodeRange>,
    label_targets: Vec<Option<usize>>,
    pending_jumps: Vec<(usize, Label)>,
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { instructions: vec![], locations: vec![], label_targets: vec![], pending_jumps: vec![] }
    }

    #[must_use]
    pub fn pos(&self) -> usize {
        self.instructions.len()
    }

    /// Emits a plain instruction, returning its index.
    pub fn emit(&mut self, op: Opcode, operand: i32, loc: CodeRange) -> usize {
        let idx = self.instructions.len();
        self.instructions.push(Instruction::new(op, operand).pack());
        self.locations.push(loc);
        idx
    }

    /// Reserves a label that some later instruction will bind via
    /// [`Self::bind_label`].
    pub fn new_label(&mut self) -> Label {
        self.label_targets.push(None);
        Label(self.label_targets.len() - 1)
    }

    /// Binds `label` to the instruction about to be emitted next.
    pub fn bind_label(&mut self, label: Label) {
        self.label_targets[label.0] = Some(self.instructions.len());
    }

    /// Emits a jump instruction (`Jmp`/`Jof`) whose operand is resolved
    /// against `label` once the function is finished.
    pub fn emit_jump(&mut self, op: Opcode, label: Label, loc: CodeRange) -> usize {
        debug_assert!(matches!(op, Opcode::Jmp | Opcode::Jof), "only Jmp/Jof take a label operand");
        let idx = self.emit(op, 0, loc);
        self.pending_jumps.push((idx, label));
        idx
    }

    /// Patches every pending jump to its final relative offset and returns
    /// the completed instruction/location arrays.
    #[must_use]
    pub fn finish(mut self) -> (Vec<u32>, Vec<CodeRange>) {
        for (idx, label) in &self.pending_jumps {
            let target = self.label_targets[label.0].expect("every emitted jump targets a bound label");
            let delta = i32::try_from(*target).expect("instruction index fits in i32")
                - i32::try_from(idx + 1).expect("index fits in i32");
            let existing = Instruction::unpack(self.instructions[*idx]);
            self.instructions[*idx] = Instruction::new(existing.op, delta).pack();
        }
        (self.instructions, self.locations)
    }
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::CodeRange;

    #[test]
    fn forward_jump_resolves_to_positive_delta() {
        let mut b = CodeBuilder::new();
        let end = b.new_label();
        b.emit_jump(Opcode::Jmp, end, CodeRange::UNKNOWN);
        b.emit(Opcode::Nop, 0, CodeRange::UNKNOWN);
        b.bind_label(end);
        let (instrs, _) = b.finish();
        let jmp = Instruction::unpack(instrs[0]);
        assert_eq!(jmp.operand, 1);
    }

    #[test]
    fn backward_jump_resolves_to_negative_delta() {
        let mut b = CodeBuilder::new();
        let top = b.new_label();
        b.bind_label(top);
        b.emit(Opcode::Nop, 0, CodeRange::UNKNOWN);
        b.emit_jump(Opcode::Jmp, top, CodeRange::UNKNOWN);
        let (instrs, _) = b.finish();
        let jmp = Instruction::unpack(instrs[1]);
        assert_eq!(jmp.operand, -2);
    }
}
