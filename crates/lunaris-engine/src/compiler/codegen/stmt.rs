//! Statement code generation

use std::sync::Arc;

use crate::compiler::bytecode::{Instruction, OpCode};
use crate::error::SyntaxError;
use crate::parser::ast::*;
use crate::parser::SymbolRef;
use crate::vm::DynValue;

use super::{CodeGenerator, FunctionContext};

impl CodeGenerator<'_> {
    /// Compile a chunk as a variadic function and return its entry offset.
    pub(crate) fn compile_chunk(&mut self, chunk: &ChunkStatement) -> Result<usize, SyntaxError> {
        self.functions.push(FunctionContext::default());
        self.set_source(chunk.body.span);
        let entry = self.emit(
            Instruction::new(OpCode::BeginFn)
                .with_num(chunk.frame.slots as i32)
                .with_symbols(Vec::new())
                .with_symbol(chunk.varargs.clone())
                .with_name(Some(chunk.name.clone())),
        );
        self.open_block(chunk.scope.to.max(chunk.frame.slots));
        self.activate_local(&chunk.varargs);
        self.compile_statements(&chunk.body)?;
        self.emit_num(OpCode::Ret, 0);
        self.close_block()?;
        self.functions.pop();
        Ok(entry)
    }

    pub(super) fn compile_statements(&mut self, body: &CompositeStatement) -> Result<(), SyntaxError> {
        for (i, statement) in body.statements.iter().enumerate() {
            let at_block_end = body.statements[i + 1..].iter().all(Statement::is_void);
            self.compile_statement(statement, at_block_end)?;
        }
        Ok(())
    }

    /// Compile a nested block with its own scope range.
    pub(super) fn compile_scoped_block(
        &mut self,
        body: &CompositeStatement,
        scope: crate::parser::RuntimeScopeBlock,
    ) -> Result<(), SyntaxError> {
        self.open_block(scope.to);
        self.emit_scope(OpCode::Enter, scope.from, scope.to);
        self.compile_statements(body)?;
        self.emit_scope(OpCode::Leave, scope.from, scope.to);
        self.close_block()
    }

    fn compile_statement(&mut self, statement: &Statement, at_block_end: bool) -> Result<(), SyntaxError> {
        self.set_source(statement.span());
        match statement {
            Statement::Assignment(s) => self.compile_assignment(s),
            Statement::Break(s) => self.compile_break(s.span),
            Statement::Empty(_) => Ok(()),
            Statement::ForNum(s) => self.compile_numeric_for(s),
            Statement::ForEach(s) => self.compile_generic_for(s),
            Statement::Call(s) => {
                self.compile_call(&s.call, false)?;
                self.emit_pop(1);
                Ok(())
            }
            Statement::FunctionDefinition(s) => self.compile_function_definition(s),
            Statement::Goto(s) => {
                self.compile_goto(&s.label, s.span);
                Ok(())
            }
            Statement::If(s) => self.compile_if(s),
            Statement::Label(s) => self.compile_label(&s.label, at_block_end),
            Statement::Repeat(s) => self.compile_repeat(s),
            Statement::Return(s) => self.compile_return(s),
            Statement::ScopeBlock(s) => self.compile_scoped_block(&s.body, s.scope),
            Statement::While(s) => self.compile_while(s),
        }
    }

    // ========================================================================
    // Stores
    // ========================================================================

    /// Store the value at `stack_offset` (element `tuple_index`) into `symbol`.
    pub(super) fn store_symbol(&mut self, symbol: &SymbolRef, stack_offset: usize, tuple_index: usize) {
        match symbol {
            SymbolRef::Local { .. } | SymbolRef::Upvalue { .. } => {
                let op = if matches!(symbol, SymbolRef::Local { .. }) {
                    OpCode::StoreLcl
                } else {
                    OpCode::StoreUpv
                };
                self.emit(
                    Instruction::new(op)
                        .with_symbol(symbol.clone())
                        .with_num(stack_offset as i32)
                        .with_num2(tuple_index as i32),
                );
            }
            SymbolRef::Global { name, env } => {
                self.load_symbol(env);
                self.emit(Instruction::new(OpCode::Literal).with_value(DynValue::String(name.clone())));
                self.emit(
                    Instruction::new(OpCode::IndexSet)
                        .with_num(stack_offset as i32)
                        .with_num2(tuple_index as i32)
                        .with_name(Some(Arc::from(env.describe()))),
                );
            }
            SymbolRef::Label { .. } => {}
        }
    }

    /// Multiple assignment: all values are evaluated before any store.
    fn compile_assignment(&mut self, statement: &AssignmentStatement) -> Result<(), SyntaxError> {
        let mut count = statement.values.len();
        if count == 0 {
            self.emit(Instruction::new(OpCode::Literal).with_value(DynValue::Nil));
            count = 1;
        } else {
            for value in &statement.values {
                self.compile_expression(value)?;
            }
        }

        for (i, target) in statement.targets.iter().enumerate().rev() {
            let (offset, tuple_index) = if i + 1 < count {
                (count - 1 - i, 0)
            } else {
                (0, i + 1 - count)
            };
            match target {
                AssignmentTarget::Symbol(symbol) => self.store_symbol(symbol, offset, tuple_index),
                AssignmentTarget::Index { object, key } => {
                    self.compile_expression(object)?;
                    self.compile_expression(key)?;
                    self.emit(
                        Instruction::new(OpCode::IndexSet)
                            .with_num(offset as i32)
                            .with_num2(tuple_index as i32)
                            .with_name(object.describe().map(Arc::from)),
                    );
                }
            }
        }
        self.emit_pop(count);

        if statement.is_local {
            for target in &statement.targets {
                if let AssignmentTarget::Symbol(symbol) = target {
                    self.activate_local(symbol);
                }
            }
        }
        Ok(())
    }

    fn compile_function_definition(&mut self, statement: &FunctionDefinitionStatement) -> Result<(), SyntaxError> {
        match &statement.target {
            FunctionTarget::Local(symbol) => {
                // Declared (as nil) before the body so the function can capture itself
                self.emit(Instruction::new(OpCode::Literal).with_value(DynValue::Nil));
                self.store_symbol(symbol, 0, 0);
                self.emit_pop(1);
                self.activate_local(symbol);
                self.compile_function(&statement.function)?;
                self.store_symbol(symbol, 0, 0);
            }
            FunctionTarget::Symbol(symbol) => {
                self.compile_function(&statement.function)?;
                self.store_symbol(symbol, 0, 0);
            }
            FunctionTarget::Field { base, path, name, .. } => {
                self.compile_function(&statement.function)?;
                self.load_symbol(base);
                let mut description = base.describe();
                for segment in path {
                    self.emit(Instruction::new(OpCode::Literal).with_value(DynValue::String(segment.clone())));
                    self.emit(Instruction::new(OpCode::Index).with_name(Some(Arc::from(description))));
                    description = format!("field '{}'", segment);
                }
                self.emit(Instruction::new(OpCode::Literal).with_value(DynValue::String(name.clone())));
                self.emit(Instruction::new(OpCode::IndexSet).with_name(Some(Arc::from(description))));
            }
        }
        self.emit_pop(1);
        Ok(())
    }

    fn compile_if(&mut self, statement: &IfStatement) -> Result<(), SyntaxError> {
        let mut end_jumps = Vec::new();
        let branch_count = statement.branches.len();
        for (i, branch) in statement.branches.iter().enumerate() {
            self.set_source(branch.span);
            self.compile_expression(&branch.condition)?;
            let next = self.emit_jump(OpCode::Jf);
            self.compile_scoped_block(&branch.body, branch.scope)?;
            if i + 1 < branch_count || statement.else_branch.is_some() {
                end_jumps.push(self.emit_jump(OpCode::Jump));
            }
            self.patch_here(next);
        }
        if let Some(else_branch) = &statement.else_branch {
            self.compile_scoped_block(&else_branch.body, else_branch.scope)?;
        }
        for jump in end_jumps {
            self.patch_here(jump);
        }
        Ok(())
    }

    /// `return f(x)` becomes a tail call.
    fn compile_return(&mut self, statement: &ReturnStatement) -> Result<(), SyntaxError> {
        match statement.values.as_slice() {
            [] => {
                self.emit_num(OpCode::Ret, 0);
            }
            [Expression::Call(call)] => {
                self.compile_call(call, true)?;
                self.emit_num(OpCode::Ret, 1);
            }
            [single] => {
                self.compile_expression(single)?;
                self.emit_num(OpCode::Ret, 1);
            }
            values => {
                for value in values {
                    self.compile_expression(value)?;
                }
                self.emit_num(OpCode::MkTuple, values.len() as i32);
                self.emit_num(OpCode::Ret, 1);
            }
        }
        Ok(())
    }
}
