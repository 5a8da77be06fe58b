//! Host functions callable from scripts.

use std::any::Any;
use std::sync::Arc;

use crate::error::{ScriptError, ScriptResult};
use crate::vm::context::ExecutionContext;
use crate::vm::table::Table;
use crate::vm::value::DynValue;

/// Signature of a host callback. Returning a tuple returns multiple values.
pub type CallbackFn =
    dyn Fn(&mut ExecutionContext<'_>, CallbackArguments) -> ScriptResult<DynValue> + Send + Sync;

/// A named host function.
pub struct CallbackFunction {
    name: Arc<str>,
    func: Box<CallbackFn>,
}

impl CallbackFunction {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, CallbackArguments) -> ScriptResult<DynValue> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(&self, ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
        (self.func)(ctx, args)
    }
}

impl std::fmt::Debug for CallbackFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CallbackFunction({})", self.name)
    }
}

impl DynValue {
    /// Wrap a host closure as a function value.
    pub fn callback<F>(name: &str, func: F) -> DynValue
    where
        F: Fn(&mut ExecutionContext<'_>, CallbackArguments) -> ScriptResult<DynValue> + Send + Sync + 'static,
    {
        DynValue::ClrFunction(Arc::new(CallbackFunction::new(name, func)))
    }
}

/// Arguments passed to a callback, with Lua-style checking helpers.
///
/// Indices are zero-based; error messages report them one-based.
#[derive(Debug, Clone, Default)]
pub struct CallbackArguments {
    values: Vec<DynValue>,
}

impl CallbackArguments {
    pub fn new(values: Vec<DynValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Argument `index`, nil when absent.
    pub fn get(&self, index: usize) -> DynValue {
        self.values.get(index).cloned().unwrap_or_default()
    }

    pub fn values(&self) -> &[DynValue] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<DynValue> {
        self.values
    }

    /// Arguments after the first `count`.
    pub fn skip(&self, count: usize) -> CallbackArguments {
        CallbackArguments::new(self.values.iter().skip(count).cloned().collect())
    }

    fn bad_argument(index: usize, func: &str, message: &str) -> ScriptError {
        ScriptError::runtime(format!("bad argument #{} to '{}' ({})", index + 1, func, message))
    }

    fn type_mismatch(&self, index: usize, func: &str, expected: &str) -> ScriptError {
        let got = match self.values.get(index) {
            Some(value) => value.type_name(),
            None => "no value",
        };
        Self::bad_argument(index, func, &format!("{} expected, got {}", expected, got))
    }

    pub fn check_value(&self, index: usize, func: &str) -> ScriptResult<DynValue> {
        match self.values.get(index) {
            Some(value) => Ok(value.clone()),
            None => Err(Self::bad_argument(index, func, "value expected")),
        }
    }

    pub fn check_number(&self, index: usize, func: &str) -> ScriptResult<f64> {
        self.get(index)
            .to_number()
            .ok_or_else(|| self.type_mismatch(index, func, "number"))
    }

    pub fn check_integer(&self, index: usize, func: &str) -> ScriptResult<i64> {
        let n = self.check_number(index, func)?;
        if n.fract() != 0.0 || !n.is_finite() {
            return Err(Self::bad_argument(index, func, "number has no integer representation"));
        }
        Ok(n as i64)
    }

    /// String argument; numbers are converted.
    pub fn check_string(&self, index: usize, func: &str) -> ScriptResult<String> {
        self.get(index)
            .to_concat_string()
            .ok_or_else(|| self.type_mismatch(index, func, "string"))
    }

    pub fn check_table(&self, index: usize, func: &str) -> ScriptResult<Table> {
        match self.get(index) {
            DynValue::Table(t) => Ok(t),
            _ => Err(self.type_mismatch(index, func, "table")),
        }
    }

    pub fn check_function(&self, index: usize, func: &str) -> ScriptResult<DynValue> {
        let value = self.get(index);
        if value.is_callable() {
            Ok(value)
        } else {
            Err(self.type_mismatch(index, func, "function"))
        }
    }

    pub fn opt_number(&self, index: usize, func: &str, default: f64) -> ScriptResult<f64> {
        if self.get(index).is_nil() {
            Ok(default)
        } else {
            self.check_number(index, func)
        }
    }

    pub fn opt_integer(&self, index: usize, func: &str, default: i64) -> ScriptResult<i64> {
        if self.get(index).is_nil() {
            Ok(default)
        } else {
            self.check_integer(index, func)
        }
    }

    pub fn opt_string(&self, index: usize, func: &str, default: &str) -> ScriptResult<String> {
        if self.get(index).is_nil() {
            Ok(default.to_string())
        } else {
            self.check_string(index, func)
        }
    }

    /// Host object of type `T` carried by a userdata argument.
    pub fn userdata<T: Any + Send + Sync>(&self, index: usize, func: &str) -> ScriptResult<Arc<T>> {
        self.get(index)
            .as_userdata()
            .and_then(|u| u.downcast::<T>())
            .ok_or_else(|| self.type_mismatch(index, func, "userdata"))
    }
}

impl From<Vec<DynValue>> for CallbackArguments {
    fn from(values: Vec<DynValue>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_helpers() {
        let args = CallbackArguments::new(vec![DynValue::from("12"), DynValue::Nil, DynValue::from(true)]);
        assert_eq!(args.check_number(0, "f").unwrap(), 12.0);
        assert_eq!(args.opt_integer(1, "f", 7).unwrap(), 7);
        let err = args.check_number(2, "f").unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #3 to 'f' (number expected, got boolean)"
        );
        let err = args.check_table(5, "g").unwrap_err();
        assert_eq!(err.to_string(), "bad argument #6 to 'g' (table expected, got no value)");
    }

    #[test]
    fn test_integer_representation() {
        let args = CallbackArguments::new(vec![DynValue::Number(1.5)]);
        assert!(args.check_integer(0, "h").is_err());
    }
}
