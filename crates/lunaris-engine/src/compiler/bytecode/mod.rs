//! Lunaris bytecode
//!
//! All chunks loaded into one script share a single append-only code store.
//! A closure is an entry offset into that store plus its captured cells, so
//! compiled code never moves once emitted.

pub mod disasm;
pub mod instruction;
pub mod opcode;
pub mod verify;

pub use disasm::{disassemble, listing};
pub use instruction::{Instruction, UNRESOLVED};
pub use opcode::OpCode;
pub use verify::{verify_jumps, VerifyError};

/// Append-only instruction store
///
/// A store may start at a non-zero `base` so code compiled into it gets
/// offsets that continue an existing code store.
#[derive(Debug, Clone, Default)]
pub struct ByteCode {
    base: usize,
    code: Vec<Instruction>,
}

impl ByteCode {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store whose first instruction will sit at offset `base`.
    pub fn starting_at(base: usize) -> Self {
        Self {
            base,
            code: Vec::new(),
        }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Offset one past the last instruction
    pub fn len(&self) -> usize {
        self.base + self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Instructions from `base()` on
    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    /// Instructions at offset `from` and beyond, with their offsets.
    pub fn iter_from(&self, from: usize) -> impl Iterator<Item = (usize, &Instruction)> {
        let skip = from.saturating_sub(self.base);
        self.code
            .iter()
            .enumerate()
            .skip(skip)
            .map(move |(i, instruction)| (self.base + i, instruction))
    }

    pub fn get(&self, ip: usize) -> Option<&Instruction> {
        ip.checked_sub(self.base).and_then(|i| self.code.get(i))
    }

    fn get_mut(&mut self, ip: usize) -> Option<&mut Instruction> {
        ip.checked_sub(self.base).and_then(|i| self.code.get_mut(i))
    }

    /// Append an instruction, returning its offset
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.code.push(instruction);
        self.len() - 1
    }

    /// Point the jump at `at` to `target`
    pub fn patch_jump(&mut self, at: usize, target: usize) {
        if let Some(instruction) = self.get_mut(at) {
            instruction.num_val = target as i32;
        }
    }

    /// Set how many stack values the jump at `at` discards
    pub fn patch_jump_pops(&mut self, at: usize, pops: usize) {
        if let Some(instruction) = self.get_mut(at) {
            instruction.num_val2 = pops as i32;
        }
    }

    /// Drop everything from offset `len` on; used to discard a chunk that failed to compile
    pub fn truncate(&mut self, len: usize) {
        self.code.truncate(len.saturating_sub(self.base));
    }

    /// Remove all code (script reset)
    pub fn clear(&mut self) {
        self.code.clear();
    }

    pub(crate) fn into_instructions(self) -> Vec<Instruction> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_continue_from_base() {
        let mut bytecode = ByteCode::starting_at(10);
        assert_eq!(bytecode.emit(Instruction::new(OpCode::Nop)), 10);
        let jump = bytecode.emit(Instruction::new(OpCode::Jump).with_num(UNRESOLVED));
        assert_eq!(jump, 11);
        bytecode.patch_jump(jump, 10);
        assert_eq!(bytecode.get(11).map(|i| i.num_val), Some(10));
        assert!(bytecode.get(3).is_none());
        let offsets: Vec<usize> = bytecode.iter_from(11).map(|(o, _)| o).collect();
        assert_eq!(offsets, vec![11]);
        bytecode.truncate(11);
        assert_eq!(bytecode.len(), 11);
    }
}
