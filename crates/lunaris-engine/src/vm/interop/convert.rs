//! Conversions between Rust values and script values

use crate::error::{ScriptError, ScriptResult};
use crate::vm::table::Table;
use crate::vm::value::DynValue;

/// Convert a Rust value into a script value.
pub trait ToDynValue {
    fn to_dyn_value(self) -> DynValue;
}

/// Convert a script value into a Rust value.
pub trait FromDynValue: Sized {
    fn from_dyn_value(value: &DynValue) -> ScriptResult<Self>;
}

fn conversion_error(value: &DynValue, target: &str) -> ScriptError {
    ScriptError::runtime(format!("cannot convert a {} to {}", value.type_name(), target))
}

macro_rules! number_conversions {
    ($($ty:ty),*) => {
        $(
            impl ToDynValue for $ty {
                fn to_dyn_value(self) -> DynValue {
                    DynValue::Number(self as f64)
                }
            }

            impl FromDynValue for $ty {
                fn from_dyn_value(value: &DynValue) -> ScriptResult<Self> {
                    value
                        .to_number()
                        .map(|n| n as $ty)
                        .ok_or_else(|| conversion_error(value, stringify!($ty)))
                }
            }
        )*
    };
}

number_conversions!(f64, f32, i32, i64, u32, u64, usize);

impl ToDynValue for bool {
    fn to_dyn_value(self) -> DynValue {
        DynValue::Boolean(self)
    }
}

impl FromDynValue for bool {
    /// Lua truthiness: only nil and false are false.
    fn from_dyn_value(value: &DynValue) -> ScriptResult<Self> {
        Ok(value.clone().to_scalar().is_truthy())
    }
}

impl ToDynValue for String {
    fn to_dyn_value(self) -> DynValue {
        DynValue::from(self)
    }
}

impl ToDynValue for &str {
    fn to_dyn_value(self) -> DynValue {
        DynValue::from(self)
    }
}

impl FromDynValue for String {
    fn from_dyn_value(value: &DynValue) -> ScriptResult<Self> {
        value
            .to_concat_string()
            .ok_or_else(|| conversion_error(value, "string"))
    }
}

impl ToDynValue for () {
    fn to_dyn_value(self) -> DynValue {
        DynValue::void()
    }
}

impl ToDynValue for DynValue {
    fn to_dyn_value(self) -> DynValue {
        self
    }
}

impl FromDynValue for DynValue {
    fn from_dyn_value(value: &DynValue) -> ScriptResult<Self> {
        Ok(value.clone())
    }
}

impl ToDynValue for Table {
    fn to_dyn_value(self) -> DynValue {
        DynValue::Table(self)
    }
}

impl FromDynValue for Table {
    fn from_dyn_value(value: &DynValue) -> ScriptResult<Self> {
        value
            .as_table()
            .cloned()
            .ok_or_else(|| conversion_error(value, "table"))
    }
}

impl<T: ToDynValue> ToDynValue for Option<T> {
    fn to_dyn_value(self) -> DynValue {
        match self {
            Some(v) => v.to_dyn_value(),
            None => DynValue::Nil,
        }
    }
}

impl<T: FromDynValue> FromDynValue for Option<T> {
    fn from_dyn_value(value: &DynValue) -> ScriptResult<Self> {
        if value.is_nil_or_void() {
            Ok(None)
        } else {
            T::from_dyn_value(value).map(Some)
        }
    }
}

/// Vectors become sequences starting at index 1.
impl<T: ToDynValue> ToDynValue for Vec<T> {
    fn to_dyn_value(self) -> DynValue {
        let values = self.into_iter().map(ToDynValue::to_dyn_value).collect();
        DynValue::Table(Table::from_values(values))
    }
}

impl<T: FromDynValue> FromDynValue for Vec<T> {
    fn from_dyn_value(value: &DynValue) -> ScriptResult<Self> {
        let table = value.as_table().ok_or_else(|| conversion_error(value, "sequence"))?;
        (1..=table.len() as i64)
            .map(|i| T::from_dyn_value(&table.get_int(i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_accept_numeric_strings() {
        assert_eq!(i64::from_dyn_value(&DynValue::from("42")).unwrap(), 42);
        let err = f64::from_dyn_value(&DynValue::Boolean(true)).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert a boolean to f64");
    }

    #[test]
    fn test_vec_and_option() {
        let value = vec![1.0, 2.0, 3.0].to_dyn_value();
        assert_eq!(value.as_table().unwrap().len(), 3);
        assert_eq!(Vec::<f64>::from_dyn_value(&value).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(Option::<String>::from_dyn_value(&DynValue::Nil).unwrap(), None);
        assert!(None::<i32>.to_dyn_value().is_nil());
    }
}
