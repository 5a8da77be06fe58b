//! Arithmetic, comparison, concatenation and length

use crate::compiler::OpCode;
use crate::error::{ScriptError, ScriptResult};
use crate::vm::value::DynValue;

use super::Processor;

fn arith_event(op: OpCode) -> &'static str {
    match op {
        OpCode::Add => "__add",
        OpCode::Sub => "__sub",
        OpCode::Mul => "__mul",
        OpCode::Div => "__div",
        OpCode::Mod => "__mod",
        _ => "__pow",
    }
}

/// Lua modulo: the result takes the sign of the divisor.
pub(crate) fn lua_mod(a: f64, b: f64) -> f64 {
    if b.is_infinite() && a.is_finite() {
        if (a >= 0.0) == (b > 0.0) {
            a
        } else {
            b
        }
    } else {
        a - (a / b).floor() * b
    }
}

fn arithmetic(op: OpCode, a: f64, b: f64) -> f64 {
    match op {
        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,
        OpCode::Mod => lua_mod(a, b),
        _ => a.powf(b),
    }
}

fn compare_error(left: &DynValue, right: &DynValue) -> ScriptError {
    let (l, r) = (left.type_name(), right.type_name());
    if l == r {
        ScriptError::runtime(format!("attempt to compare two {} values", l))
    } else {
        ScriptError::runtime(format!("attempt to compare {} with {}", l, r))
    }
}

impl Processor {
    pub(super) fn exec_binary(
        &mut self,
        op: OpCode,
        left: DynValue,
        right: DynValue,
        reversed: bool,
    ) -> ScriptResult<DynValue> {
        match op {
            OpCode::Concat => self.concat(left, right),
            OpCode::Eq => Ok(DynValue::Boolean(self.equals(&left, &right)?)),
            OpCode::Less | OpCode::LessEq => {
                let (a, b) = if reversed { (right, left) } else { (left, right) };
                let result = if op == OpCode::Less {
                    self.less_than(&a, &b)?
                } else {
                    self.less_equal(&a, &b)?
                };
                Ok(DynValue::Boolean(result))
            }
            _ => self.arith(op, left, right),
        }
    }

    fn arith(&mut self, op: OpCode, left: DynValue, right: DynValue) -> ScriptResult<DynValue> {
        if let (Some(a), Some(b)) = (left.to_number(), right.to_number()) {
            return Ok(DynValue::Number(arithmetic(op, a, b)));
        }
        if let Some(result) = self.call_binary_metamethod(arith_event(op), &left, &right)? {
            return Ok(result);
        }
        let culprit = if left.to_number().is_none() { &left } else { &right };
        Err(ScriptError::runtime(format!(
            "attempt to perform arithmetic on a {} value",
            culprit.type_name()
        )))
    }

    fn concat(&mut self, left: DynValue, right: DynValue) -> ScriptResult<DynValue> {
        if let (Some(a), Some(b)) = (left.to_concat_string(), right.to_concat_string()) {
            return Ok(DynValue::String((a + &b).into()));
        }
        if let Some(result) = self.call_binary_metamethod("__concat", &left, &right)? {
            return Ok(result);
        }
        let culprit = if left.to_concat_string().is_none() { &left } else { &right };
        Err(ScriptError::runtime(format!(
            "attempt to concatenate a {} value",
            culprit.type_name()
        )))
    }

    /// `==`: raw equality, then `__eq` for two tables or two userdata.
    pub fn equals(&mut self, left: &DynValue, right: &DynValue) -> ScriptResult<bool> {
        if left.raw_equals(right) {
            return Ok(true);
        }
        let comparable = matches!(
            (left, right),
            (DynValue::Table(_), DynValue::Table(_)) | (DynValue::UserData(_), DynValue::UserData(_))
        );
        if !comparable {
            return Ok(false);
        }
        Ok(self
            .call_binary_metamethod("__eq", left, right)?
            .map(|v| v.is_truthy())
            .unwrap_or(false))
    }

    pub fn less_than(&mut self, left: &DynValue, right: &DynValue) -> ScriptResult<bool> {
        match (left, right) {
            (DynValue::Number(a), DynValue::Number(b)) => Ok(a < b),
            (DynValue::String(a), DynValue::String(b)) => Ok(a < b),
            _ => match self.call_binary_metamethod("__lt", left, right)? {
                Some(result) => Ok(result.is_truthy()),
                None => Err(compare_error(left, right)),
            },
        }
    }

    pub fn less_equal(&mut self, left: &DynValue, right: &DynValue) -> ScriptResult<bool> {
        match (left, right) {
            (DynValue::Number(a), DynValue::Number(b)) => Ok(a <= b),
            (DynValue::String(a), DynValue::String(b)) => Ok(a <= b),
            _ => {
                if let Some(result) = self.call_binary_metamethod("__le", left, right)? {
                    return Ok(result.is_truthy());
                }
                // a <= b as not (b < a)
                match self.call_binary_metamethod("__lt", right, left)? {
                    Some(result) => Ok(!result.is_truthy()),
                    None => Err(compare_error(left, right)),
                }
            }
        }
    }

    pub(super) fn negate(&mut self, value: DynValue) -> ScriptResult<DynValue> {
        if let Some(n) = value.to_number() {
            return Ok(DynValue::Number(-n));
        }
        if let Some(handler) = self.get_metamethod(&value, "__unm") {
            let result = self.call_value(handler, vec![value.clone(), value])?;
            return Ok(result.to_scalar());
        }
        Err(ScriptError::runtime(format!(
            "attempt to perform arithmetic on a {} value",
            value.type_name()
        )))
    }

    /// `#value`
    pub fn length(&mut self, value: DynValue, description: Option<&str>) -> ScriptResult<DynValue> {
        if let DynValue::String(s) = &value {
            return Ok(DynValue::Number(s.len() as f64));
        }
        if let Some(handler) = self.get_metamethod(&value, "__len") {
            let result = self.call_value(handler, vec![value])?;
            return Ok(result.to_scalar());
        }
        match &value {
            DynValue::Table(table) => Ok(DynValue::Number(table.len() as f64)),
            other => Err(ScriptError::runtime(match description {
                Some(d) => format!("attempt to get length of a {} value ({})", other.type_name(), d),
                None => format!("attempt to get length of a {} value", other.type_name()),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lua_mod_sign_follows_divisor() {
        assert_eq!(lua_mod(5.0, 3.0), 2.0);
        assert_eq!(lua_mod(-5.0, 3.0), 1.0);
        assert_eq!(lua_mod(5.0, -3.0), -1.0);
        assert!(lua_mod(1.0, 0.0).is_nan());
    }
}
