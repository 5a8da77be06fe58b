//! Expression code generation
//!
//! Every expression leaves exactly one stack value. Calls and `...` may leave
//! a tuple; consumers that need a single value truncate it.

use std::sync::Arc;

use crate::compiler::bytecode::{Instruction, OpCode};
use crate::error::SyntaxError;
use crate::parser::ast::*;
use crate::parser::SymbolRef;
use crate::vm::DynValue;

use super::{CodeGenerator, FunctionContext};

impl CodeGenerator<'_> {
    pub(super) fn compile_expression(&mut self, expression: &Expression) -> Result<(), SyntaxError> {
        match expression {
            Expression::Literal(literal) => {
                let value = match &literal.value {
                    LiteralValue::Nil => DynValue::Nil,
                    LiteralValue::Boolean(b) => DynValue::Boolean(*b),
                    LiteralValue::Number(n) => DynValue::Number(*n),
                    LiteralValue::String(s) => DynValue::String(s.clone()),
                };
                self.emit(Instruction::new(OpCode::Literal).with_value(value));
            }
            Expression::Varargs(varargs) => self.load_symbol(&varargs.symbol),
            Expression::Symbol(symbol) => self.load_symbol(&symbol.symbol),
            Expression::Index(index) => {
                self.compile_expression(&index.object)?;
                self.compile_expression(&index.key)?;
                self.emit(Instruction::new(OpCode::Index).with_name(index.object.describe().map(Arc::from)));
            }
            Expression::Call(call) => self.compile_call(call, false)?,
            Expression::Function(function) => self.compile_function(function)?,
            Expression::Binary(binary) => self.compile_binary(binary)?,
            Expression::Unary(unary) => {
                self.compile_expression(&unary.operand)?;
                let op = match unary.operator {
                    UnaryOperator::Not => OpCode::Not,
                    UnaryOperator::Negate => OpCode::Neg,
                    UnaryOperator::Length => OpCode::Len,
                };
                self.emit(Instruction::new(op).with_name(unary.operand.describe().map(Arc::from)));
            }
            Expression::Table(table) => self.compile_table(table)?,
            Expression::Adjusted(adjusted) => {
                self.compile_expression(&adjusted.inner)?;
                if adjusted.inner.is_multi_value() {
                    self.emit_op(OpCode::Scalar);
                }
            }
        }
        Ok(())
    }

    pub(super) fn load_symbol(&mut self, symbol: &SymbolRef) {
        match symbol {
            SymbolRef::Local { index, .. } => {
                self.emit_num(OpCode::Local, *index as i32);
            }
            SymbolRef::Upvalue { index, .. } => {
                self.emit_num(OpCode::Upvalue, *index as i32);
            }
            SymbolRef::Global { name, env } => {
                self.load_symbol(env);
                self.emit(Instruction::new(OpCode::Literal).with_value(DynValue::String(name.clone())));
                self.emit(Instruction::new(OpCode::Index).with_name(Some(Arc::from(env.describe()))));
            }
            SymbolRef::Label { .. } => {
                self.emit(Instruction::new(OpCode::Literal).with_value(DynValue::Nil));
            }
        }
    }

    /// Emit a call; a tail call reuses the caller's frame.
    pub(super) fn compile_call(&mut self, call: &FunctionCallExpression, tail: bool) -> Result<(), SyntaxError> {
        self.set_source(call.span);
        self.compile_expression(&call.callee)?;
        let (extra, description) = match &call.method {
            Some(method) => {
                self.emit(Instruction::new(OpCode::Method).with_name(Some(method.clone())));
                (1, Some(format!("method '{}'", method)))
            }
            None => (0, call.callee.describe()),
        };
        for argument in &call.arguments {
            self.compile_expression(argument)?;
        }
        // Argument evaluation may have moved the position to a nested call
        self.set_source(call.span);
        self.emit(
            Instruction::new(OpCode::Call)
                .with_num((call.arguments.len() + extra) as i32)
                .with_num2(tail as i32)
                .with_name(description.map(Arc::from)),
        );
        Ok(())
    }

    /// Inline the function body behind a jump and push the closure.
    pub(super) fn compile_function(&mut self, function: &FunctionDefinitionExpression) -> Result<(), SyntaxError> {
        let skip = self.emit_jump(OpCode::Jump);
        let saved_source = self.source.clone();
        self.set_source(function.span);

        self.functions.push(FunctionContext::default());
        let mut begin = Instruction::new(OpCode::BeginFn)
            .with_num(function.frame.slots as i32)
            .with_symbols(function.parameters.clone())
            .with_name(function.name.clone());
        if let Some(varargs) = &function.varargs {
            begin = begin.with_symbol(varargs.clone());
        }
        let entry = self.emit(begin);

        self.open_block(function.frame.slots);
        for parameter in &function.parameters {
            self.activate_local(parameter);
        }
        if let Some(varargs) = &function.varargs {
            self.activate_local(varargs);
        }
        self.compile_statements(&function.body)?;
        self.emit_num(OpCode::Ret, 0);
        self.close_block()?;
        self.functions.pop();

        self.source = saved_source;
        self.patch_here(skip);
        self.emit(
            Instruction::new(OpCode::Closure)
                .with_num(entry as i32)
                .with_symbols(function.frame.upvalues.clone())
                .with_name(function.name.clone()),
        );
        Ok(())
    }

    fn compile_binary(&mut self, binary: &BinaryOperatorExpression) -> Result<(), SyntaxError> {
        let (op, reversed) = match binary.operator {
            BinaryOperator::And => return self.compile_short_circuit(binary, OpCode::JfOrPop),
            BinaryOperator::Or => return self.compile_short_circuit(binary, OpCode::JtOrPop),
            BinaryOperator::Add => (OpCode::Add, false),
            BinaryOperator::Subtract => (OpCode::Sub, false),
            BinaryOperator::Multiply => (OpCode::Mul, false),
            BinaryOperator::Divide => (OpCode::Div, false),
            BinaryOperator::Modulo => (OpCode::Mod, false),
            BinaryOperator::Power => (OpCode::Power, false),
            BinaryOperator::Concat => (OpCode::Concat, false),
            BinaryOperator::Equal | BinaryOperator::NotEqual => (OpCode::Eq, false),
            BinaryOperator::Less => (OpCode::Less, false),
            BinaryOperator::Greater => (OpCode::Less, true),
            BinaryOperator::LessEqual => (OpCode::LessEq, false),
            BinaryOperator::GreaterEqual => (OpCode::LessEq, true),
        };
        self.compile_expression(&binary.left)?;
        self.compile_expression(&binary.right)?;
        self.emit(Instruction::new(op).with_num(reversed as i32));
        if binary.operator == BinaryOperator::NotEqual {
            self.emit_op(OpCode::Not);
        }
        Ok(())
    }

    /// `and`/`or`: the right operand only runs when the left one does not decide.
    fn compile_short_circuit(&mut self, binary: &BinaryOperatorExpression, op: OpCode) -> Result<(), SyntaxError> {
        self.compile_expression(&binary.left)?;
        let jump = self.emit_jump(op);
        self.compile_expression(&binary.right)?;
        self.patch_here(jump);
        Ok(())
    }

    fn compile_table(&mut self, table: &TableConstructorExpression) -> Result<(), SyntaxError> {
        self.emit_op(OpCode::NewTable);
        let last = table.fields.len().saturating_sub(1);
        let mut position = 0;
        for (i, field) in table.fields.iter().enumerate() {
            match field {
                TableField::Positional(value) => {
                    position += 1;
                    self.compile_expression(value)?;
                    let expand = i == last && value.is_multi_value();
                    self.emit(
                        Instruction::new(OpCode::TblInitI)
                            .with_num(expand as i32)
                            .with_num2(position),
                    );
                }
                TableField::Keyed { key, value } => {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                    self.emit_op(OpCode::TblInitN);
                }
            }
        }
        Ok(())
    }
}
