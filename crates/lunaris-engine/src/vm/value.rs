//! Dynamic script values.

use std::fmt;
use std::sync::Arc;

use crate::vm::callback::CallbackFunction;
use crate::vm::closure::Closure;
use crate::vm::coroutine::Coroutine;
use crate::vm::interop::UserData;
use crate::vm::table::Table;

/// Kind of a [`DynValue`], also the key of per-type metatables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
    ClrFunction,
    UserData,
    Tuple,
    Coroutine,
}

impl DataType {
    /// Name reported by `type()`.
    pub fn lua_name(self) -> &'static str {
        match self {
            DataType::Nil => "nil",
            DataType::Boolean => "boolean",
            DataType::Number => "number",
            DataType::String => "string",
            DataType::Table => "table",
            DataType::Function | DataType::ClrFunction => "function",
            DataType::UserData => "userdata",
            DataType::Tuple => "tuple",
            DataType::Coroutine => "thread",
        }
    }
}

/// A script value.
///
/// Reference kinds (tables, functions, userdata, coroutines) are shared
/// handles; cloning a `DynValue` never copies the referenced object.
#[derive(Clone, Default)]
pub enum DynValue {
    #[default]
    Nil,
    Boolean(bool),
    Number(f64),
    String(Arc<str>),
    Table(Table),
    Function(Arc<Closure>),
    ClrFunction(Arc<CallbackFunction>),
    UserData(UserData),
    /// Multiple values produced by calls and `...`; never stored in variables
    Tuple(Arc<[DynValue]>),
    Coroutine(Coroutine),
}

impl DynValue {
    pub fn string(s: impl AsRef<str>) -> Self {
        DynValue::String(Arc::from(s.as_ref()))
    }

    /// The empty tuple returned by functions without return values.
    pub fn void() -> Self {
        DynValue::Tuple(Arc::from(Vec::new()))
    }

    /// Build a result list: every value but the last is truncated to one
    /// value, the last one is expanded.
    pub fn tuple(values: Vec<DynValue>) -> Self {
        let count = values.len();
        let mut flat = Vec::with_capacity(count);
        for (i, value) in values.into_iter().enumerate() {
            match value {
                DynValue::Tuple(inner) if i + 1 == count => flat.extend(inner.iter().cloned()),
                other => flat.push(other.to_scalar()),
            }
        }
        match flat.len() {
            1 => flat.pop().unwrap_or_default(),
            _ => DynValue::Tuple(Arc::from(flat)),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            DynValue::Nil => DataType::Nil,
            DynValue::Boolean(_) => DataType::Boolean,
            DynValue::Number(_) => DataType::Number,
            DynValue::String(_) => DataType::String,
            DynValue::Table(_) => DataType::Table,
            DynValue::Function(_) => DataType::Function,
            DynValue::ClrFunction(_) => DataType::ClrFunction,
            DynValue::UserData(_) => DataType::UserData,
            DynValue::Tuple(_) => DataType::Tuple,
            DynValue::Coroutine(_) => DataType::Coroutine,
        }
    }

    /// Name reported by `type()`.
    pub fn type_name(&self) -> &'static str {
        match self {
            DynValue::Tuple(values) => values
                .first()
                .map(|v| v.type_name())
                .unwrap_or("nil"),
            other => other.data_type().lua_name(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, DynValue::Nil)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, DynValue::Tuple(values) if values.is_empty())
    }

    /// Nil or void.
    pub fn is_nil_or_void(&self) -> bool {
        self.is_nil() || self.is_void()
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            DynValue::Nil | DynValue::Boolean(false) => false,
            DynValue::Tuple(values) => values.first().map(|v| v.is_truthy()).unwrap_or(false),
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, DynValue::Function(_) | DynValue::ClrFunction(_))
    }

    /// First value of a tuple; any other value is returned unchanged.
    pub fn to_scalar(self) -> DynValue {
        match self {
            DynValue::Tuple(values) => values.first().cloned().unwrap_or_default(),
            other => other,
        }
    }

    /// Expand into a list of values (a tuple becomes its elements).
    pub fn into_values(self) -> Vec<DynValue> {
        match self {
            DynValue::Tuple(values) => values.to_vec(),
            other => vec![other],
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            DynValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Number value, converting numeric strings.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            DynValue::Number(n) => Some(*n),
            DynValue::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// Integral number value, converting numeric strings.
    pub fn to_integer(&self) -> Option<i64> {
        self.to_number()
            .filter(|n| n.fract() == 0.0 && n.is_finite())
            .map(|n| n as i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            DynValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_userdata(&self) -> Option<&UserData> {
        match self {
            DynValue::UserData(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_coroutine(&self) -> Option<&Coroutine> {
        match self {
            DynValue::Coroutine(c) => Some(c),
            _ => None,
        }
    }

    /// String form used by concatenation: strings and numbers only.
    pub fn to_concat_string(&self) -> Option<String> {
        match self {
            DynValue::String(s) => Some(s.to_string()),
            DynValue::Number(n) => Some(format_number(*n)),
            _ => None,
        }
    }

    /// Identity of reference values.
    pub fn reference_id(&self) -> Option<usize> {
        match self {
            DynValue::Table(t) => Some(t.id()),
            DynValue::Function(f) => Some(Arc::as_ptr(f) as *const () as usize),
            DynValue::ClrFunction(f) => Some(Arc::as_ptr(f) as *const () as usize),
            DynValue::UserData(u) => Some(u.id()),
            DynValue::Coroutine(c) => Some(c.address()),
            _ => None,
        }
    }

    /// Primitive equality: by value for scalars, by identity for references.
    pub fn raw_equals(&self, other: &DynValue) -> bool {
        match (self, other) {
            (DynValue::Nil, DynValue::Nil) => true,
            (DynValue::Boolean(a), DynValue::Boolean(b)) => a == b,
            (DynValue::Number(a), DynValue::Number(b)) => a == b,
            (DynValue::String(a), DynValue::String(b)) => a == b,
            (DynValue::Tuple(a), DynValue::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.raw_equals(y))
            }
            (DynValue::UserData(a), DynValue::UserData(b)) => a.same_object(b),
            (a, b) => match (a.reference_id(), b.reference_id()) {
                (Some(x), Some(y)) => x == y && a.data_type() == b.data_type(),
                _ => false,
            },
        }
    }

    /// `tostring` without metamethods.
    pub fn to_display_string(&self) -> String {
        match self {
            DynValue::Nil => "nil".to_string(),
            DynValue::Boolean(b) => b.to_string(),
            DynValue::Number(n) => format_number(*n),
            DynValue::String(s) => s.to_string(),
            DynValue::Table(t) => format!("table: 0x{:08x}", t.id()),
            DynValue::Function(f) => format!("function: 0x{:08x}", Arc::as_ptr(f) as *const () as usize),
            DynValue::ClrFunction(f) => format!("function: builtin: {}", f.name()),
            DynValue::UserData(u) => u.display_string(),
            DynValue::Tuple(values) => values
                .iter()
                .map(|v| v.to_display_string())
                .collect::<Vec<_>>()
                .join("\t"),
            DynValue::Coroutine(c) => format!("thread: 0x{:08x}", c.address()),
        }
    }
}

impl PartialEq for DynValue {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equals(other)
    }
}

impl fmt::Debug for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynValue::String(s) => write!(f, "{:?}", s),
            DynValue::Tuple(values) => f.debug_tuple("Tuple").field(&values).finish(),
            other => write!(f, "{}", other.to_display_string()),
        }
    }
}

impl fmt::Display for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<f64> for DynValue {
    fn from(n: f64) -> Self {
        DynValue::Number(n)
    }
}

impl From<bool> for DynValue {
    fn from(b: bool) -> Self {
        DynValue::Boolean(b)
    }
}

impl From<&str> for DynValue {
    fn from(s: &str) -> Self {
        DynValue::string(s)
    }
}

impl From<String> for DynValue {
    fn from(s: String) -> Self {
        DynValue::String(Arc::from(s))
    }
}

impl From<Table> for DynValue {
    fn from(t: Table) -> Self {
        DynValue::Table(t)
    }
}

/// Format a number the way `%.14g` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return if n.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n == 0.0 && n.is_sign_negative() {
        return "-0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }

    let exponent = n.abs().log10().floor() as i32;
    if !(-4..14).contains(&exponent) {
        let formatted = format!("{:.13e}", n);
        let (mantissa, exp) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let mantissa = trim_fraction(mantissa);
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (13 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, n)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Parse a numeric string the way the language coerces strings to numbers.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        if hex.is_empty() {
            return None;
        }
        let mut value: u64 = 0;
        for c in hex.chars() {
            value = value.wrapping_mul(16).wrapping_add(c.to_digit(16)? as u64);
        }
        value as i64 as f64
    } else {
        // Reject words Rust accepts but Lua does not ("inf", "nan")
        if body.is_empty() || !body.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return None;
        }
        body.parse::<f64>().ok()?
    };
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(-0.0), "-0");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(1.0 / 3.0), "0.33333333333333");
        assert_eq!(format_number(1e15), "1e+15");
        assert_eq!(format_number(1.5e-7), "1.5e-07");
        assert_eq!(format_number(f64::INFINITY), "inf");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 10 "), Some(10.0));
        assert_eq!(parse_number("0x10"), Some(16.0));
        assert_eq!(parse_number("-2.5e1"), Some(-25.0));
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_tuple_flattening() {
        let inner = DynValue::tuple(vec![DynValue::Number(2.0), DynValue::Number(3.0)]);
        let outer = DynValue::tuple(vec![inner.clone(), inner]);
        assert_eq!(
            outer.into_values(),
            vec![DynValue::Number(2.0), DynValue::Number(2.0), DynValue::Number(3.0)]
        );
        assert_eq!(DynValue::tuple(vec![DynValue::Boolean(true)]), DynValue::Boolean(true));
        assert!(DynValue::tuple(Vec::new()).is_void());
    }

    #[test]
    fn test_truthiness() {
        assert!(!DynValue::Nil.is_truthy());
        assert!(!DynValue::Boolean(false).is_truthy());
        assert!(DynValue::Number(0.0).is_truthy());
        assert!(DynValue::string("").is_truthy());
        assert!(!DynValue::void().is_truthy());
    }

    #[test]
    fn test_reference_equality() {
        let a = Table::new();
        let b = Table::new();
        assert_eq!(DynValue::Table(a.clone()), DynValue::Table(a));
        assert_ne!(DynValue::Table(b), DynValue::Table(Table::new()));
        assert_eq!(DynValue::string("x"), DynValue::from("x"));
    }
}
