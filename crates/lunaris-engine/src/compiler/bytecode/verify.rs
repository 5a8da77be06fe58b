//! Bytecode verification

use thiserror::Error;

use super::ByteCode;

/// Bytecode verification errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// A jump was emitted but never patched
    #[error("Unresolved jump at offset {0}")]
    UnresolvedJump(usize),

    /// A jump leaves the code store
    #[error("Invalid jump target {target} at offset {offset}")]
    InvalidJumpTarget {
        /// The invalid jump target
        target: usize,
        /// Offset in bytecode
        offset: usize,
    },
}

/// Check that every jump in `from..` is patched and lands inside the store.
pub fn verify_jumps(bytecode: &ByteCode, from: usize) -> Result<(), VerifyError> {
    let len = bytecode.len();
    for (offset, instruction) in bytecode.iter_from(from) {
        if !instruction.op.is_jump() {
            continue;
        }
        if instruction.num_val < 0 {
            return Err(VerifyError::UnresolvedJump(offset));
        }
        let target = instruction.num_val as usize;
        if target > len {
            return Err(VerifyError::InvalidJumpTarget { target, offset });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::{Instruction, OpCode, UNRESOLVED};

    #[test]
    fn test_unpatched_jump_is_reported() {
        let mut bytecode = ByteCode::new();
        bytecode.emit(Instruction::new(OpCode::Nop));
        bytecode.emit(Instruction::new(OpCode::Jump).with_num(UNRESOLVED));
        assert_eq!(verify_jumps(&bytecode, 0), Err(VerifyError::UnresolvedJump(1)));
        bytecode.patch_jump(1, 0);
        assert_eq!(verify_jumps(&bytecode, 0), Ok(()));
    }

    #[test]
    fn test_out_of_range_target() {
        let mut bytecode = ByteCode::new();
        bytecode.emit(Instruction::new(OpCode::Jf).with_num(9));
        assert_eq!(
            verify_jumps(&bytecode, 0),
            Err(VerifyError::InvalidJumpTarget { target: 9, offset: 0 })
        );
    }
}
