//! Blocks, labels and `goto` resolution
//!
//! Each function keeps a stack of block contexts. A label is visible in its
//! block and every nested block; a forward `goto` waits in its block until a
//! matching label appears, and migrates outward when the block closes.

use std::sync::Arc;

use crate::compiler::bytecode::{Instruction, OpCode};
use crate::error::SyntaxError;
use crate::parser::token::Span;
use crate::parser::SymbolRef;

use super::CodeGenerator;

#[derive(Debug)]
struct LabelInfo {
    name: Arc<str>,
    address: usize,
    stack_depth: usize,
}

#[derive(Debug)]
struct PendingGoto {
    name: Arc<str>,
    jump_at: usize,
    /// Locals visible at the jump, clamped to each block it migrates out of
    active_locals: usize,
    stack_depth: usize,
    span: Span,
}

#[derive(Debug, Default)]
pub(super) struct BlockContext {
    labels: Vec<LabelInfo>,
    pending: Vec<PendingGoto>,
    entry_locals: usize,
    /// One past the last slot of the block
    slot_end: usize,
}

impl CodeGenerator<'_> {
    pub(super) fn open_block(&mut self, slot_end: usize) {
        let function = self.function();
        let entry_locals = function.active_locals.len();
        function.blocks.push(BlockContext {
            entry_locals,
            slot_end,
            ..Default::default()
        });
    }

    /// Close the innermost block, handing its unresolved gotos to the parent.
    pub(super) fn close_block(&mut self) -> Result<(), SyntaxError> {
        let function = self.function();
        let Some(block) = function.blocks.pop() else {
            return Ok(());
        };
        function.active_locals.truncate(block.entry_locals);

        match function.blocks.last_mut() {
            Some(parent) => {
                for mut goto in block.pending {
                    goto.active_locals = goto.active_locals.min(block.entry_locals);
                    parent.pending.push(goto);
                }
                Ok(())
            }
            None => match block.pending.first() {
                Some(goto) => Err(self.error(
                    goto.span,
                    format!(
                        "no visible label '{}' for <goto> at line {}",
                        goto.name, goto.span.line
                    ),
                )),
                None => Ok(()),
            },
        }
    }

    pub(super) fn compile_goto(&mut self, name: &Arc<str>, span: Span) {
        let function = self.function();
        let stack_depth = function.stack_depth;
        let backward = function
            .blocks
            .iter()
            .rev()
            .find_map(|b| b.labels.iter().find(|l| l.name == *name))
            .map(|l| (l.address, l.stack_depth));

        match backward {
            Some((address, label_depth)) => {
                self.emit(
                    Instruction::new(OpCode::Jump)
                        .with_num(address as i32)
                        .with_num2((stack_depth - label_depth) as i32),
                );
            }
            None => {
                let jump_at = self.emit_jump(OpCode::Jump);
                let function = self.function();
                let active_locals = function.active_locals.len();
                if let Some(block) = function.blocks.last_mut() {
                    block.pending.push(PendingGoto {
                        name: name.clone(),
                        jump_at,
                        active_locals,
                        stack_depth,
                        span,
                    });
                }
            }
        }
    }

    /// Define a label and resolve the forward gotos of its block.
    ///
    /// A label followed only by void statements counts as the end of the
    /// block, so jumping there never enters the scope of the block's locals.
    pub(super) fn compile_label(&mut self, label: &SymbolRef, at_block_end: bool) -> Result<(), SyntaxError> {
        let SymbolRef::Label { name, slot_mark } = label else {
            return Ok(());
        };
        let address = self.here();
        let function = self.function();
        let stack_depth = function.stack_depth;
        let Some(block) = function.blocks.last_mut() else {
            return Ok(());
        };
        let visible = if at_block_end {
            block.entry_locals
        } else {
            function.active_locals.len()
        };
        let slot_end = block.slot_end;

        let (resolved, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut block.pending).into_iter().partition(|g| g.name == *name);
        block.pending = waiting;
        block.labels.push(LabelInfo {
            name: name.clone(),
            address,
            stack_depth,
        });

        for goto in resolved {
            if goto.active_locals < visible {
                let local = self
                    .function()
                    .active_locals
                    .get(goto.active_locals)
                    .cloned()
                    .unwrap_or_else(|| Arc::from("?"));
                return Err(self.error(
                    goto.span,
                    format!(
                        "<goto {}> at line {} jumps into the scope of local '{}'",
                        goto.name, goto.span.line, local
                    ),
                ));
            }
            self.bytecode.patch_jump(goto.jump_at, address);
            self.bytecode
                .patch_jump_pops(goto.jump_at, goto.stack_depth.saturating_sub(stack_depth));
        }

        self.emit_scope(OpCode::Clean, *slot_mark, slot_end);
        Ok(())
    }
}
