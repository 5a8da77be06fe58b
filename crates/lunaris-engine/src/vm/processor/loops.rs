//! Numeric and generic `for` loop support

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::{ScriptError, ScriptResult};
use crate::vm::state::ZeroStepPolicy;
use crate::vm::value::DynValue;

use super::Processor;

/// Iterator used when a generic `for` walks a plain table
static TABLE_NEXT: Lazy<DynValue> = Lazy::new(|| {
    DynValue::callback("next", |_ctx, args| {
        let table = args.check_table(0, "next")?;
        match table.next(&args.get(1))? {
            Some((key, value)) => Ok(DynValue::tuple(vec![key, value])),
            None => Ok(DynValue::Nil),
        }
    })
});

impl Processor {
    /// Coerce a `for` control value in place. `which` is 0 for the initial
    /// value, 1 for the limit and 2 for the step.
    pub(super) fn exec_to_num(&mut self, which: usize) -> ScriptResult<()> {
        let value = self.pop().to_scalar();
        match value.to_number() {
            Some(n) => {
                self.push(DynValue::Number(n));
                Ok(())
            }
            None => {
                let what = match which {
                    0 => "initial value",
                    1 => "limit",
                    _ => "step",
                };
                Err(ScriptError::runtime(format!("'for' {} must be a number", what)))
            }
        }
    }

    /// Leave the loop at `exit` once the control value passed the limit.
    pub(super) fn exec_jfor(&mut self, exit: usize) -> ScriptResult<()> {
        let current = self.peek(0).as_number().unwrap_or(0.0);
        let step = self.peek(1).as_number().unwrap_or(0.0);
        let limit = self.peek(2).as_number().unwrap_or(0.0);

        if step == 0.0 && self.state.options().zero_step == ZeroStepPolicy::Error {
            return Err(ScriptError::runtime("'for' step is zero"));
        }
        let keep_going = if step < 0.0 { current >= limit } else { current <= limit };
        if !keep_going {
            self.ip = exit;
        }
        Ok(())
    }

    pub(super) fn exec_incr(&mut self) {
        let current = self.peek(0).as_number().unwrap_or(0.0);
        let step = self.peek(1).as_number().unwrap_or(0.0);
        self.replace(0, DynValue::Number(current + step));
    }

    /// Normalize the `in` expression list into an `(f, s, var)` triple.
    pub(super) fn exec_iter_prep(&mut self) -> ScriptResult<()> {
        let mut values = self.pop().into_values();
        values.resize(3, DynValue::Nil);
        let function = values[0].clone();

        if !function.is_callable() {
            if let Some(handler) = self.get_metamethod(&function, "__iterator") {
                let mut produced = self.call_value(handler, vec![function])?.into_values();
                produced.resize(3, DynValue::Nil);
                values = produced;
            } else if let DynValue::Table(_) = &function {
                if self.get_metamethod(&function, "__call").is_none() {
                    values = vec![TABLE_NEXT.clone(), function, DynValue::Nil];
                }
            }
        }
        self.push(DynValue::Tuple(Arc::from(values)));
        Ok(())
    }

    /// Stop the loop when the iterator returned nil, otherwise feed the first
    /// result back as the next control value.
    pub(super) fn exec_iter_check(&mut self, exit: usize) {
        let first = self.read_stack(0, 0);
        if first.is_nil() {
            self.pop();
            self.ip = exit;
            return;
        }
        if let DynValue::Tuple(state) = self.peek(1) {
            let mut next_state = state.to_vec();
            next_state.resize(3, DynValue::Nil);
            next_state[2] = first;
            self.replace(1, DynValue::Tuple(Arc::from(next_state)));
        }
    }
}
