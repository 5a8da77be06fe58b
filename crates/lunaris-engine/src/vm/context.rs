//! The view a host callback gets of the running script

use std::sync::Arc;

use crate::error::{ScriptResult, SourceRef, SyntaxError};
use crate::vm::coroutine::Coroutine;
use crate::vm::execution_control::ExecutionControlToken;
use crate::vm::processor::Processor;
use crate::vm::state::ScriptState;
use crate::vm::table::Table;
use crate::vm::value::DynValue;

/// Execution context handed to every callback.
///
/// It borrows the processor that invoked the callback, so calls made through
/// it run on the same stack and honour the same control token.
pub struct ExecutionContext<'a> {
    processor: &'a mut Processor,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(processor: &'a mut Processor) -> Self {
        Self { processor }
    }

    pub fn state(&self) -> &Arc<ScriptState> {
        self.processor.state()
    }

    pub fn globals(&self) -> Table {
        self.processor.globals()
    }

    /// Control token of the call in progress.
    pub fn token(&self) -> ExecutionControlToken {
        self.processor.token().clone()
    }

    /// Call a script or host function and wait for its results.
    pub fn call(&mut self, function: &DynValue, args: Vec<DynValue>) -> ScriptResult<DynValue> {
        self.processor.call(function, args)
    }

    /// `object[key]` with metamethods.
    pub fn index(&mut self, object: &DynValue, key: &DynValue) -> ScriptResult<DynValue> {
        self.processor.index_value(object, key, None)
    }

    /// `object[key] = value` with metamethods.
    pub fn set_index(&mut self, object: &DynValue, key: DynValue, value: DynValue) -> ScriptResult<()> {
        self.processor.set_index_value(object, key, value, None)
    }

    pub fn get_metatable(&self, value: &DynValue) -> Option<Table> {
        self.processor.get_metatable(value)
    }

    pub fn get_metamethod(&self, value: &DynValue, name: &str) -> Option<DynValue> {
        self.processor.get_metamethod(value, name)
    }

    /// `tostring(value)`, honouring `__tostring`.
    pub fn to_display_string(&mut self, value: &DynValue) -> ScriptResult<String> {
        self.processor.to_display_string(value)
    }

    pub fn equals(&mut self, left: &DynValue, right: &DynValue) -> ScriptResult<bool> {
        self.processor.equals(left, right)
    }

    pub fn less_than(&mut self, left: &DynValue, right: &DynValue) -> ScriptResult<bool> {
        self.processor.less_than(left, right)
    }

    pub fn length(&mut self, value: &DynValue) -> ScriptResult<DynValue> {
        self.processor.length(value.clone(), None)
    }

    /// Suspend the running coroutine once this callback returns. The values
    /// become the results of the `resume` that started this run.
    pub fn yield_values(&mut self, values: Vec<DynValue>) -> ScriptResult<DynValue> {
        self.processor.request_yield(values)?;
        Ok(DynValue::void())
    }

    pub fn create_coroutine(&self, function: DynValue) -> Coroutine {
        Coroutine::new(self.processor.state().clone(), function)
    }

    /// Resume `coroutine` from the current thread of execution.
    pub fn resume(&mut self, coroutine: &Coroutine, args: Vec<DynValue>) -> ScriptResult<DynValue> {
        let caller = self.processor.current_coroutine();
        coroutine.resume(args, self.token(), caller.as_ref())
    }

    /// Coroutine this callback runs in; `None` on the main processor.
    pub fn current_coroutine(&self) -> Option<Coroutine> {
        self.processor.current_coroutine()
    }

    /// Compile `source` into a function sharing this script's code store.
    pub fn load(&self, source: &str, name: &str, env: Option<Table>) -> Result<DynValue, SyntaxError> {
        self.processor.state().load_chunk(source, name, env)
    }

    /// Position of the script instruction that invoked this callback.
    pub fn current_location(&self) -> Option<SourceRef> {
        self.processor.current_location()
    }
}
