//! Code Generator
//!
//! Walks the resolved AST and appends instructions to the shared code store.

mod expr;
mod goto;
mod loops;
mod stmt;

use std::sync::Arc;

use crate::compiler::bytecode::{ByteCode, Instruction, OpCode, UNRESOLVED};
use crate::error::{SourceRef, SyntaxError};
use crate::parser::token::Span;
use crate::parser::SymbolRef;

use goto::BlockContext;

/// Jumps waiting for the end of the innermost loop
#[derive(Debug, Default)]
struct LoopContext {
    break_jumps: Vec<usize>,
}

/// Context for compiling a single function
#[derive(Debug, Default)]
struct FunctionContext {
    /// Lexical blocks, innermost last
    blocks: Vec<BlockContext>,
    /// Loops, innermost last
    loops: Vec<LoopContext>,
    /// Names of the locals visible at the current point
    active_locals: Vec<Arc<str>>,
    /// Values loop statements keep on the stack (3 per numeric for, 1 per generic for)
    stack_depth: usize,
}

/// Code generator that transforms the AST into bytecode
pub(crate) struct CodeGenerator<'a> {
    bytecode: &'a mut ByteCode,
    chunk_name: Arc<str>,
    functions: Vec<FunctionContext>,
    /// Position attached to emitted instructions
    source: Option<SourceRef>,
}

impl<'a> CodeGenerator<'a> {
    pub(crate) fn new(bytecode: &'a mut ByteCode, chunk_name: Arc<str>) -> Self {
        Self {
            bytecode,
            chunk_name,
            functions: Vec::new(),
            source: None,
        }
    }

    // ========================================================================
    // Emission helpers
    // ========================================================================

    fn emit(&mut self, instruction: Instruction) -> usize {
        let instruction = instruction.with_source(self.source.clone());
        self.bytecode.emit(instruction)
    }

    fn emit_op(&mut self, op: OpCode) -> usize {
        self.emit(Instruction::new(op))
    }

    fn emit_num(&mut self, op: OpCode, num_val: i32) -> usize {
        self.emit(Instruction::new(op).with_num(num_val))
    }

    /// Emit a jump to be patched later
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_num(op, UNRESOLVED)
    }

    fn here(&self) -> usize {
        self.bytecode.len()
    }

    fn patch_here(&mut self, at: usize) {
        let target = self.here();
        self.bytecode.patch_jump(at, target);
    }

    fn emit_pop(&mut self, count: usize) {
        if count > 0 {
            self.emit_num(OpCode::Pop, count as i32);
        }
    }

    fn set_source(&mut self, span: Span) {
        self.source = Some(SourceRef::new(self.chunk_name.clone(), span.line, span.column));
    }

    fn error(&self, span: Span, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(
            message,
            Some(SourceRef::new(self.chunk_name.clone(), span.line, span.column)),
        )
    }

    fn function(&mut self) -> &mut FunctionContext {
        if self.functions.is_empty() {
            self.functions.push(FunctionContext::default());
        }
        let last = self.functions.len() - 1;
        &mut self.functions[last]
    }

    /// Mark a local as visible from here to the end of its block
    fn activate_local(&mut self, symbol: &SymbolRef) {
        let name: Arc<str> = Arc::from(symbol.name());
        self.function().active_locals.push(name);
    }

    /// Emit a block-scope instruction for `from..to` if the range is not empty
    fn emit_scope(&mut self, op: OpCode, from: usize, to: usize) {
        if from < to {
            self.emit(Instruction::new(op).with_num(from as i32).with_num2(to as i32));
        }
    }
}
