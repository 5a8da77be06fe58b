//! Human readable listings of the code store

use std::fmt::Write;

use super::{ByteCode, Instruction, OpCode};

/// List instructions `from..to`, one per line, marking function entries.
pub fn disassemble(bytecode: &ByteCode, from: usize, to: usize) -> String {
    listing(bytecode.iter_from(from).take_while(|(offset, _)| *offset < to))
}

/// List offset/instruction pairs in the order given.
pub fn listing<'a>(instructions: impl Iterator<Item = (usize, &'a Instruction)>) -> String {
    let mut output = String::new();
    for (offset, instruction) in instructions {
        if instruction.op == OpCode::BeginFn {
            let _ = writeln!(output, "function @{:05}:", offset);
        }
        let line = instruction
            .source
            .as_ref()
            .map(|s| s.line.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(output, "  {:05} [{:>4}]  {}", offset, line, instruction);
    }
    output
}
