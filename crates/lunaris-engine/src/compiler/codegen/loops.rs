//! Loop code generation
//!
//! Numeric `for` keeps `[limit, step, current]` on the stack while its body
//! runs; generic `for` keeps one iterator state tuple. Jumps that leave a
//! loop through `goto` discard those values (see the `Jump` pop count).

use std::sync::Arc;

use crate::compiler::bytecode::{Instruction, OpCode};
use crate::error::SyntaxError;
use crate::parser::ast::*;
use crate::parser::token::Span;
use crate::vm::DynValue;

use super::{CodeGenerator, LoopContext};

/// Values a numeric `for` keeps on the stack
const NUMERIC_FOR_STATE: usize = 3;

impl CodeGenerator<'_> {
    fn begin_loop(&mut self) {
        self.function().loops.push(LoopContext::default());
    }

    /// Close the innermost loop, sending its `break`s to `exit`.
    fn end_loop(&mut self, exit: usize) {
        if let Some(context) = self.function().loops.pop() {
            for jump in context.break_jumps {
                self.bytecode.patch_jump(jump, exit);
            }
        }
    }

    pub(super) fn compile_break(&mut self, span: Span) -> Result<(), SyntaxError> {
        if self.function().loops.is_empty() {
            return Err(self.error(span, format!("<break> at line {} not inside a loop", span.line)));
        }
        let jump = self.emit_jump(OpCode::Jump);
        if let Some(context) = self.function().loops.last_mut() {
            context.break_jumps.push(jump);
        }
        Ok(())
    }

    pub(super) fn compile_while(&mut self, statement: &WhileStatement) -> Result<(), SyntaxError> {
        let start = self.here();
        self.compile_expression(&statement.condition)?;
        let exit = self.emit_jump(OpCode::Jf);

        self.begin_loop();
        self.compile_scoped_block(&statement.body, statement.scope)?;
        self.set_source(statement.span);
        self.emit_num(OpCode::Jump, start as i32);

        self.patch_here(exit);
        let here = self.here();
        self.end_loop(here);
        Ok(())
    }

    /// The condition of `repeat` sees the locals of the body.
    pub(super) fn compile_repeat(&mut self, statement: &RepeatStatement) -> Result<(), SyntaxError> {
        let scope = statement.scope;
        let start = self.here();

        self.begin_loop();
        self.open_block(scope.to);
        self.emit_scope(OpCode::Enter, scope.from, scope.to);
        self.compile_statements(&statement.body)?;
        self.set_source(statement.condition.span());
        self.compile_expression(&statement.condition)?;
        self.emit_scope(OpCode::Leave, scope.from, scope.to);
        self.close_block()?;
        self.emit_num(OpCode::Jf, start as i32);

        let here = self.here();
        self.end_loop(here);
        Ok(())
    }

    pub(super) fn compile_numeric_for(&mut self, statement: &ForNumStatement) -> Result<(), SyntaxError> {
        let scope = statement.scope;

        self.compile_expression(&statement.end)?;
        self.emit_num(OpCode::ToNum, 1);
        match &statement.step {
            Some(step) => self.compile_expression(step)?,
            None => {
                self.emit(Instruction::new(OpCode::Literal).with_value(DynValue::Number(1.0)));
            }
        }
        self.emit_num(OpCode::ToNum, 2);
        self.compile_expression(&statement.start)?;
        self.emit_num(OpCode::ToNum, 0);
        self.function().stack_depth += NUMERIC_FOR_STATE;

        let top = self.here();
        let exit = self.emit_jump(OpCode::JFor);

        self.begin_loop();
        self.open_block(scope.to);
        self.emit_scope(OpCode::Enter, scope.from, scope.to);
        self.store_symbol(&statement.variable, 0, 0);
        self.activate_local(&statement.variable);
        self.compile_statements(&statement.body)?;
        self.emit_scope(OpCode::Leave, scope.from, scope.to);
        self.close_block()?;

        self.set_source(statement.span);
        self.emit_op(OpCode::Incr);
        self.emit_num(OpCode::Jump, top as i32);

        self.patch_here(exit);
        let here = self.here();
        self.end_loop(here);
        self.emit_pop(NUMERIC_FOR_STATE);
        self.function().stack_depth -= NUMERIC_FOR_STATE;
        Ok(())
    }

    pub(super) fn compile_generic_for(&mut self, statement: &ForEachStatement) -> Result<(), SyntaxError> {
        let scope = statement.scope;

        for value in &statement.values {
            self.compile_expression(value)?;
        }
        if statement.values.len() > 1 {
            self.emit_num(OpCode::MkTuple, statement.values.len() as i32);
        }
        self.set_source(statement.span);
        self.emit_op(OpCode::IterPrep);
        self.function().stack_depth += 1;

        let top = self.here();
        self.begin_loop();
        self.open_block(scope.to);
        self.emit_scope(OpCode::Enter, scope.from, scope.to);
        self.emit_num(OpCode::ExpTuple, 0);
        self.emit(
            Instruction::new(OpCode::Call)
                .with_num(2)
                .with_name(Some(Arc::from("for iterator"))),
        );
        let exit = self.emit_jump(OpCode::IterCheck);
        for (i, name) in statement.names.iter().enumerate() {
            self.store_symbol(name, 0, i);
            self.activate_local(name);
        }
        self.emit_pop(1);
        self.compile_statements(&statement.body)?;
        self.emit_scope(OpCode::Leave, scope.from, scope.to);
        self.close_block()?;

        self.set_source(statement.span);
        self.emit_num(OpCode::Jump, top as i32);

        self.patch_here(exit);
        let here = self.here();
        self.end_loop(here);
        self.emit_pop(1);
        self.function().stack_depth -= 1;
        Ok(())
    }
}
