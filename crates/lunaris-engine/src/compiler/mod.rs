//! Lunaris compiler
//!
//! Turns a resolved chunk AST into instructions appended to a shared
//! [`ByteCode`] store.

pub mod bytecode;
mod codegen;

pub use bytecode::{disassemble, ByteCode, Instruction, OpCode};

use crate::error::SyntaxError;
use crate::parser::ChunkStatement;

use codegen::CodeGenerator;

/// Compile `chunk` into `bytecode` and return the entry offset of its function.
///
/// On failure nothing is left behind in the store.
pub fn compile_chunk(bytecode: &mut ByteCode, chunk: &ChunkStatement) -> Result<usize, SyntaxError> {
    let start = bytecode.len();
    let result = CodeGenerator::new(bytecode, chunk.name.clone()).compile_chunk(chunk);
    let checked = result.and_then(|entry| {
        bytecode::verify_jumps(bytecode, start)
            .map(|_| entry)
            .map_err(|e| SyntaxError::new(format!("internal compiler error: {}", e), None))
    });
    if checked.is_err() {
        bytecode.truncate(start);
    }
    checked
}
