//! The processor: a stack machine executing the shared code store
//!
//! One processor runs the main thread of a script; every coroutine owns
//! another. Instruction handlers are grouped by category as `impl Processor`
//! blocks in the submodules.

mod call;
mod loops;
mod meta;
mod ops;

use std::sync::{Arc, Weak};

use crate::compiler::{Instruction, OpCode};
use crate::error::{ScriptError, ScriptResult, SourceRef};
use crate::vm::closure::{Closure, ValueCell};
use crate::vm::coroutine::{Coroutine, CoroutineInner};
use crate::vm::execution_control::ExecutionControlToken;
use crate::vm::state::{CodeSegment, ScriptState};
use crate::vm::table::Table;
use crate::vm::value::DynValue;

/// An activation record of a script function
pub(crate) struct CallFrame {
    closure: Arc<Closure>,
    locals: Vec<ValueCell>,
    /// Arguments waiting for `BeginFn` to bind them
    args: Vec<DynValue>,
    /// Stack height below the frame's own values
    base: usize,
    /// Where the caller resumes; `None` returns to the host
    return_address: Option<usize>,
}

/// How a run of the instruction loop ended
pub(crate) enum RunOutcome {
    Returned(DynValue),
    Yielded(DynValue),
}

/// Bytecode interpreter
pub struct Processor {
    state: Arc<ScriptState>,
    stack: Vec<DynValue>,
    frames: Vec<CallFrame>,
    ip: usize,
    /// Host callbacks currently running on this processor
    host_depth: usize,
    /// Owning coroutine, `None` for the main processor
    coroutine: Option<Weak<CoroutineInner>>,
    /// Values handed to `coroutine.yield` by the running callback
    pending_yield: Option<DynValue>,
    token: ExecutionControlToken,
    last_ip: usize,
    /// Code segment the instruction loop last executed from
    segment: Option<Arc<CodeSegment>>,
}

impl Processor {
    pub fn new(state: Arc<ScriptState>) -> Self {
        Self {
            state,
            stack: Vec::with_capacity(64),
            frames: Vec::new(),
            ip: 0,
            host_depth: 0,
            coroutine: None,
            pending_yield: None,
            token: ExecutionControlToken::dummy(),
            last_ip: 0,
            segment: None,
        }
    }

    pub(crate) fn for_coroutine(state: Arc<ScriptState>, coroutine: Weak<CoroutineInner>) -> Self {
        let mut processor = Self::new(state);
        processor.coroutine = Some(coroutine);
        processor
    }

    pub fn state(&self) -> &Arc<ScriptState> {
        &self.state
    }

    pub fn globals(&self) -> Table {
        self.state.globals()
    }

    pub fn token(&self) -> &ExecutionControlToken {
        &self.token
    }

    pub(crate) fn set_token(&mut self, token: ExecutionControlToken) {
        self.token = token;
    }

    /// Call a function value with the processor's current token.
    pub fn call(&mut self, function: &DynValue, args: Vec<DynValue>) -> ScriptResult<DynValue> {
        self.call_value(function.clone(), args)
    }

    /// Call a function value under `token`; terminating the token aborts the
    /// call at its next check point with [`ScriptError::Cancelled`].
    pub fn call_with_token(
        &mut self,
        function: &DynValue,
        args: Vec<DynValue>,
        token: ExecutionControlToken,
    ) -> ScriptResult<DynValue> {
        let previous = std::mem::replace(&mut self.token, token);
        let result = self.call_value(function.clone(), args);
        self.token = previous;
        if let Err(ScriptError::Cancelled) = &result {
            log::warn!("script call cancelled by its control token");
        }
        result
    }

    /// Coroutine owning this processor, if it is not the main one.
    pub fn current_coroutine(&self) -> Option<Coroutine> {
        self.coroutine
            .as_ref()
            .and_then(|weak| weak.upgrade())
            .map(Coroutine::from_inner)
    }

    /// Source position of the instruction executed last.
    pub fn current_location(&self) -> Option<SourceRef> {
        if self.frames.is_empty() {
            return None;
        }
        self.state.source_at(self.last_ip)
    }

    // ========================================================================
    // Stack helpers
    // ========================================================================

    fn push(&mut self, value: DynValue) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> DynValue {
        self.stack.pop().unwrap_or_default()
    }

    fn pop_n(&mut self, count: usize) -> Vec<DynValue> {
        let at = self.stack.len().saturating_sub(count);
        self.stack.split_off(at)
    }

    fn peek(&self, offset: usize) -> DynValue {
        self.stack
            .len()
            .checked_sub(offset + 1)
            .and_then(|i| self.stack.get(i))
            .cloned()
            .unwrap_or_default()
    }

    fn replace(&mut self, offset: usize, value: DynValue) {
        if let Some(i) = self.stack.len().checked_sub(offset + 1) {
            self.stack[i] = value;
        }
    }

    /// Value at `offset`, taking element `tuple_index` of a tuple.
    fn read_stack(&self, offset: usize, tuple_index: usize) -> DynValue {
        match self.peek(offset) {
            DynValue::Tuple(values) => values.get(tuple_index).cloned().unwrap_or_default(),
            other if tuple_index == 0 => other,
            _ => DynValue::Nil,
        }
    }

    fn frame(&self) -> ScriptResult<&CallFrame> {
        self.frames
            .last()
            .ok_or_else(|| ScriptError::runtime("no active call frame"))
    }

    fn frame_mut(&mut self) -> ScriptResult<&mut CallFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| ScriptError::runtime("no active call frame"))
    }

    fn local_cell(&self, slot: usize) -> ScriptResult<&ValueCell> {
        self.frame()?
            .locals
            .get(slot)
            .ok_or_else(|| ScriptError::runtime(format!("invalid local slot {}", slot)))
    }

    fn upvalue_cell(&self, index: usize) -> ScriptResult<&ValueCell> {
        self.frame()?
            .closure
            .upvalues
            .get(index)
            .ok_or_else(|| ScriptError::runtime(format!("invalid upvalue index {}", index)))
    }

    // ========================================================================
    // Instruction loop
    // ========================================================================

    /// Run until the frame entered from the host returns or the coroutine yields.
    fn execute(&mut self) -> ScriptResult<RunOutcome> {
        // Nested calls from host callbacks run their own loop on this
        // processor, so the cached segment is held locally while stepping.
        let mut segment = self.segment.take();
        let outcome = self.run_instructions(&mut segment);
        self.segment = segment;
        outcome
    }

    fn run_instructions(&mut self, segment: &mut Option<Arc<CodeSegment>>) -> ScriptResult<RunOutcome> {
        loop {
            let ip = self.ip;
            if !segment.as_ref().is_some_and(|s| s.contains(ip)) {
                *segment = self.state.segment_at(ip);
            }
            let instruction = segment
                .as_deref()
                .and_then(|s| s.get(ip))
                .ok_or_else(|| ScriptError::runtime(format!("invalid instruction pointer {}", ip)))?;
            self.ip += 1;
            self.last_ip = ip;
            match self.step(instruction) {
                Ok(None) => {}
                Ok(Some(outcome)) => return Ok(outcome),
                Err(e) => return Err(e.located(instruction.source.as_ref())),
            }
        }
    }

    fn step(&mut self, instruction: &Instruction) -> ScriptResult<Option<RunOutcome>> {
        let num = instruction.num_val.max(0) as usize;
        let num2 = instruction.num_val2.max(0) as usize;
        match instruction.op {
            // ===== Stack =====
            OpCode::Nop => {}
            OpCode::Literal => self.push(instruction.value.clone().unwrap_or_default()),
            OpCode::Pop => {
                let len = self.stack.len().saturating_sub(num);
                self.stack.truncate(len);
            }
            OpCode::Copy => {
                let value = self.peek(num);
                self.push(value);
            }
            OpCode::Scalar => {
                let value = self.pop().to_scalar();
                self.push(value);
            }
            OpCode::MkTuple => {
                let values = self.pop_n(num);
                self.push(DynValue::tuple(values));
            }
            OpCode::ExpTuple => {
                let values = self.peek(num).into_values();
                self.stack.extend(values);
            }

            // ===== Variables =====
            OpCode::Local => {
                let value = self.local_cell(num)?.lock().clone();
                self.push(value);
            }
            OpCode::Upvalue => {
                let value = self.upvalue_cell(num)?.lock().clone();
                self.push(value);
            }
            OpCode::StoreLcl | OpCode::StoreUpv => {
                let value = self.read_stack(num, num2);
                let index = instruction.symbol.as_ref().and_then(|s| s.index()).unwrap_or(0);
                let cell = if instruction.op == OpCode::StoreLcl {
                    self.local_cell(index)?
                } else {
                    self.upvalue_cell(index)?
                };
                *cell.lock() = value;
            }

            // ===== Tables =====
            OpCode::Index => {
                let key = self.pop().to_scalar();
                let object = self.pop().to_scalar();
                let value = self.index_value(&object, &key, instruction.name.as_deref())?;
                self.push(value);
            }
            OpCode::IndexSet => {
                let key = self.pop().to_scalar();
                let object = self.pop().to_scalar();
                let value = self.read_stack(num, num2);
                self.set_index_value(&object, key, value, instruction.name.as_deref())?;
            }
            OpCode::Method => {
                let object = self.pop().to_scalar();
                let key = DynValue::String(instruction.name.clone().unwrap_or_else(|| Arc::from("")));
                let function = self.index_value(&object, &key, None)?;
                self.push(function);
                self.push(object);
            }
            OpCode::NewTable => self.push(DynValue::Table(Table::new())),
            OpCode::TblInitN => {
                let value = self.pop().to_scalar();
                let key = self.pop().to_scalar();
                if let DynValue::Table(table) = self.peek(0) {
                    table.set(key, value)?;
                }
            }
            OpCode::TblInitI => {
                let value = self.pop();
                if let DynValue::Table(table) = self.peek(0) {
                    let position = instruction.num_val2 as i64;
                    if num == 1 {
                        for (i, v) in value.into_values().into_iter().enumerate() {
                            table.set_int(position + i as i64, v);
                        }
                    } else {
                        table.set_int(position, value.to_scalar());
                    }
                }
            }

            // ===== Functions =====
            OpCode::Closure => self.exec_closure(instruction)?,
            OpCode::BeginFn => self.exec_begin_fn(instruction)?,
            OpCode::Call => return self.exec_call(instruction),
            OpCode::Ret => return self.exec_ret(num),

            // ===== Control flow =====
            OpCode::Jump => {
                let len = self.stack.len().saturating_sub(num2);
                self.stack.truncate(len);
                self.jump(num)?;
            }
            OpCode::Jf => {
                if !self.pop().is_truthy() {
                    self.jump(num)?;
                }
            }
            OpCode::JfOrPop | OpCode::JtOrPop => {
                let value = self.pop().to_scalar();
                let jump_when = instruction.op == OpCode::JtOrPop;
                if value.is_truthy() == jump_when {
                    self.push(value);
                    self.jump(num)?;
                }
            }

            // ===== Operators =====
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Power
            | OpCode::Concat
            | OpCode::Eq
            | OpCode::Less
            | OpCode::LessEq => {
                let right = self.pop().to_scalar();
                let left = self.pop().to_scalar();
                let result = self.exec_binary(instruction.op, left, right, num == 1)?;
                self.push(result);
            }
            OpCode::Not => {
                let value = self.pop();
                self.push(DynValue::Boolean(!value.is_truthy()));
            }
            OpCode::Neg => {
                let value = self.pop().to_scalar();
                let result = self.negate(value)?;
                self.push(result);
            }
            OpCode::Len => {
                let value = self.pop().to_scalar();
                let result = self.length(value, instruction.name.as_deref())?;
                self.push(result);
            }

            // ===== Scopes =====
            OpCode::Enter | OpCode::Leave | OpCode::Clean => self.reset_slots(num, num2)?,

            // ===== Loops =====
            OpCode::ToNum => self.exec_to_num(num)?,
            OpCode::JFor => self.exec_jfor(num)?,
            OpCode::Incr => self.exec_incr(),
            OpCode::IterPrep => self.exec_iter_prep()?,
            OpCode::IterCheck => self.exec_iter_check(num),
        }
        Ok(None)
    }

    /// Transfer control; backward jumps are cancellation check points.
    fn jump(&mut self, target: usize) -> ScriptResult<()> {
        if target < self.ip {
            self.token.check()?;
        }
        self.ip = target;
        Ok(())
    }

    /// Give slots `from..to` fresh cells so closures of a previous pass keep theirs.
    fn reset_slots(&mut self, from: usize, to: usize) -> ScriptResult<()> {
        let frame = self.frame_mut()?;
        let to = to.min(frame.locals.len());
        for slot in from..to {
            frame.locals[slot] = crate::vm::closure::new_cell(DynValue::Nil);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("frames", &self.frames.len())
            .field("stack", &self.stack.len())
            .field("ip", &self.ip)
            .finish()
    }
}
