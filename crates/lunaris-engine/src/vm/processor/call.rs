//! Calls, returns, closures and coroutine entry points

use std::sync::Arc;

use crate::compiler::Instruction;
use crate::error::{ScriptError, ScriptResult};
use crate::parser::SymbolRef;
use crate::vm::callback::{CallbackArguments, CallbackFunction};
use crate::vm::closure::{new_cell, Closure, ValueCell};
use crate::vm::context::ExecutionContext;
use crate::vm::value::DynValue;

use super::{CallFrame, Processor, RunOutcome};

/// Longest `__call` chain followed before giving up
const MAX_CALL_CHAIN: usize = 16;

/// A callee after `__call` resolution
enum Callee {
    Script(Arc<Closure>),
    Host(Arc<CallbackFunction>),
}

/// Truncate every argument but the last to one value; expand the last one.
fn normalize_args(args: Vec<DynValue>) -> Vec<DynValue> {
    let count = args.len();
    let mut normalized = Vec::with_capacity(count);
    for (i, arg) in args.into_iter().enumerate() {
        match arg {
            DynValue::Tuple(values) if i + 1 == count => normalized.extend(values.iter().cloned()),
            other => normalized.push(other.to_scalar()),
        }
    }
    normalized
}

impl Processor {
    /// Resolve `__call` metamethods, prepending the callee to the arguments.
    fn resolve_callee(
        &mut self,
        mut function: DynValue,
        args: &mut Vec<DynValue>,
        description: Option<&str>,
    ) -> ScriptResult<Callee> {
        for _ in 0..MAX_CALL_CHAIN {
            match function {
                DynValue::Function(closure) => return Ok(Callee::Script(closure)),
                DynValue::ClrFunction(callback) => return Ok(Callee::Host(callback)),
                other => match self.get_metamethod(&other, "__call") {
                    Some(handler) => {
                        args.insert(0, other);
                        function = handler;
                    }
                    None => {
                        let message = match description {
                            Some(d) => format!("attempt to call a {} value ({})", other.type_name(), d),
                            None => format!("attempt to call a {} value", other.type_name()),
                        };
                        return Err(ScriptError::runtime(message));
                    }
                },
            }
        }
        Err(ScriptError::runtime("'__call' chain too long; possible loop"))
    }

    fn check_closure(&self, closure: &Closure) -> ScriptResult<()> {
        if closure.generation != self.state.generation() {
            return Err(ScriptError::runtime(
                "attempt to call a function compiled before the script was reset",
            ));
        }
        if self.frames.len() >= self.state.options().max_call_depth {
            return Err(ScriptError::runtime("stack overflow"));
        }
        Ok(())
    }

    /// Call any value from host code, running a nested instruction loop for
    /// script functions.
    pub(crate) fn call_value(&mut self, function: DynValue, args: Vec<DynValue>) -> ScriptResult<DynValue> {
        let mut args = normalize_args(args);
        match self.resolve_callee(function, &mut args, None)? {
            Callee::Host(callback) => self.call_host(&callback, args),
            Callee::Script(closure) => {
                self.check_closure(&closure)?;
                let saved_ip = self.ip;
                let stack_height = self.stack.len();
                let frame_count = self.frames.len();
                self.frames.push(CallFrame {
                    locals: Vec::new(),
                    args,
                    base: stack_height,
                    return_address: None,
                    closure: closure.clone(),
                });
                self.ip = closure.entry;
                let result = self.execute();
                self.ip = saved_ip;
                match result {
                    Ok(RunOutcome::Returned(value)) => Ok(value),
                    Ok(RunOutcome::Yielded(_)) => {
                        self.frames.truncate(frame_count);
                        self.stack.truncate(stack_height);
                        Err(ScriptError::runtime("attempt to yield across a CLR-call boundary"))
                    }
                    Err(e) => {
                        self.frames.truncate(frame_count);
                        self.stack.truncate(stack_height);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Invoke a host callback with an execution context over this processor.
    pub(crate) fn call_host(&mut self, callback: &CallbackFunction, args: Vec<DynValue>) -> ScriptResult<DynValue> {
        if self.host_depth >= self.state.options().max_host_reentrancy {
            return Err(ScriptError::runtime(format!(
                "host call nesting too deep (limit is {})",
                self.state.options().max_host_reentrancy
            )));
        }
        self.host_depth += 1;
        let result = {
            let mut ctx = ExecutionContext::new(self);
            callback.invoke(&mut ctx, CallbackArguments::new(args))
        };
        self.host_depth -= 1;
        result
    }

    // ========================================================================
    // Coroutine entry points
    // ========================================================================

    /// First resume of a coroutine: enter `function` as the base frame.
    pub(crate) fn start(&mut self, function: DynValue, args: Vec<DynValue>) -> ScriptResult<RunOutcome> {
        let mut args = normalize_args(args);
        match self.resolve_callee(function, &mut args, None)? {
            Callee::Host(callback) => {
                // A host function body cannot be suspended
                self.host_depth += 1;
                let result = self.call_host(&callback, args);
                self.host_depth -= 1;
                result.map(RunOutcome::Returned)
            }
            Callee::Script(closure) => {
                self.check_closure(&closure)?;
                self.frames.push(CallFrame {
                    locals: Vec::new(),
                    args,
                    base: 0,
                    return_address: None,
                    closure: closure.clone(),
                });
                self.ip = closure.entry;
                self.execute()
            }
        }
    }

    /// Continue a suspended coroutine; `values` become the result of its `yield`.
    pub(crate) fn resume_with(&mut self, values: Vec<DynValue>) -> ScriptResult<RunOutcome> {
        self.push(DynValue::tuple(values));
        self.execute()
    }

    /// Ask the instruction loop to suspend after the running callback returns.
    pub(crate) fn request_yield(&mut self, values: Vec<DynValue>) -> ScriptResult<()> {
        if self.coroutine.is_none() {
            return Err(ScriptError::runtime("attempt to yield from outside a coroutine"));
        }
        if self.host_depth != 1 {
            return Err(ScriptError::runtime("attempt to yield across a CLR-call boundary"));
        }
        self.pending_yield = Some(DynValue::tuple(values));
        Ok(())
    }

    // ========================================================================
    // Opcode handlers
    // ========================================================================

    pub(super) fn exec_call(&mut self, instruction: &Instruction) -> ScriptResult<Option<RunOutcome>> {
        let argc = instruction.num_val.max(0) as usize;
        let tail = instruction.num_val2 == 1;
        let args = self.pop_n(argc);
        let function = self.pop().to_scalar();
        let mut args = normalize_args(args);

        match self.resolve_callee(function, &mut args, instruction.name.as_deref())? {
            Callee::Host(callback) => {
                let result = self.call_host(&callback, args);
                let pending = self.pending_yield.take();
                let result = result?;
                if let Some(values) = pending {
                    return Ok(Some(RunOutcome::Yielded(values)));
                }
                self.push(result);
            }
            Callee::Script(closure) => {
                self.check_closure(&closure)?;
                let (base, return_address) = if tail {
                    match self.frames.pop() {
                        Some(frame) => {
                            self.stack.truncate(frame.base);
                            (frame.base, frame.return_address)
                        }
                        None => (self.stack.len(), None),
                    }
                } else {
                    (self.stack.len(), Some(self.ip))
                };
                self.frames.push(CallFrame {
                    locals: Vec::new(),
                    args,
                    base,
                    return_address,
                    closure: closure.clone(),
                });
                self.ip = closure.entry;
            }
        }
        Ok(None)
    }

    pub(super) fn exec_ret(&mut self, count: usize) -> ScriptResult<Option<RunOutcome>> {
        let value = if count == 0 { DynValue::void() } else { self.pop() };
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| ScriptError::runtime("return without an active call frame"))?;
        self.stack.truncate(frame.base);
        match frame.return_address {
            Some(address) => {
                self.ip = address;
                self.push(value);
                Ok(None)
            }
            None => Ok(Some(RunOutcome::Returned(value))),
        }
    }

    /// Function prologue: allocate the frame's slots and bind the arguments.
    pub(super) fn exec_begin_fn(&mut self, instruction: &Instruction) -> ScriptResult<()> {
        self.token.check()?;
        let slots = instruction.num_val.max(0) as usize;
        let frame = self.frame_mut()?;
        frame.locals = (0..slots).map(|_| new_cell(DynValue::Nil)).collect();
        let mut args = std::mem::take(&mut frame.args).into_iter();

        let parameters = instruction.symbols.as_deref().unwrap_or(&[]);
        for parameter in parameters {
            let value = args.next().unwrap_or_default();
            if let Some(cell) = parameter.index().and_then(|i| frame.locals.get(i)) {
                *cell.lock() = value;
            }
        }
        if let Some(SymbolRef::Local { index, .. }) = &instruction.symbol {
            let rest: Vec<DynValue> = args.collect();
            if let Some(cell) = frame.locals.get(*index) {
                *cell.lock() = DynValue::Tuple(Arc::from(rest));
            }
        }
        Ok(())
    }

    /// Build a closure sharing the cells named by the capture list.
    pub(super) fn exec_closure(&mut self, instruction: &Instruction) -> ScriptResult<()> {
        let frame = self.frame()?;
        let captures = instruction.symbols.as_deref().unwrap_or(&[]);
        let mut upvalues: Vec<ValueCell> = Vec::with_capacity(captures.len());
        for symbol in captures {
            let cell = match symbol {
                SymbolRef::Local { index, .. } => frame.locals.get(*index).cloned(),
                SymbolRef::Upvalue { index, .. } => frame.closure.upvalues.get(*index).cloned(),
                _ => None,
            };
            upvalues.push(cell.unwrap_or_else(|| new_cell(DynValue::Nil)));
        }
        let closure = Closure::new(
            instruction.num_val.max(0) as usize,
            upvalues,
            self.state.generation(),
            instruction.name.clone(),
        );
        self.push(DynValue::Function(Arc::new(closure)));
        Ok(())
    }
}
