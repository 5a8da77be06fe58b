//! Enum descriptors with bitwise flag operations

use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use crate::error::{ScriptError, ScriptResult};
use crate::vm::callback::CallbackArguments;
use crate::vm::context::ExecutionContext;
use crate::vm::value::DynValue;

use super::{UserData, UserDataDescriptor};

/// Underlying integer type of an enum; selects the signed or unsigned path
/// of the flag operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumStorage {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl EnumStorage {
    pub fn is_unsigned(self) -> bool {
        matches!(self, EnumStorage::U8 | EnumStorage::U16 | EnumStorage::U32 | EnumStorage::U64)
    }

    pub fn bits(self) -> u32 {
        match self {
            EnumStorage::I8 | EnumStorage::U8 => 8,
            EnumStorage::I16 | EnumStorage::U16 => 16,
            EnumStorage::I32 | EnumStorage::U32 => 32,
            EnumStorage::I64 | EnumStorage::U64 => 64,
        }
    }

    /// Truncate a raw value to this storage width.
    fn normalize(self, raw: EnumRaw) -> EnumRaw {
        let bits = self.bits();
        if self.is_unsigned() {
            let value = raw.as_u64();
            let masked = if bits == 64 { value } else { value & ((1u64 << bits) - 1) };
            EnumRaw::Unsigned(masked)
        } else {
            let value = raw.as_i64();
            let shift = 64 - bits;
            EnumRaw::Signed((value << shift) >> shift)
        }
    }

    fn from_number(self, n: f64) -> EnumRaw {
        let raw = if self.is_unsigned() {
            EnumRaw::Unsigned(n as u64)
        } else {
            EnumRaw::Signed(n as i64)
        };
        self.normalize(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumRaw {
    Signed(i64),
    Unsigned(u64),
}

impl EnumRaw {
    pub fn as_i64(self) -> i64 {
        match self {
            EnumRaw::Signed(v) => v,
            EnumRaw::Unsigned(v) => v as i64,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            EnumRaw::Signed(v) => v as u64,
            EnumRaw::Unsigned(v) => v,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            EnumRaw::Signed(v) => v as f64,
            EnumRaw::Unsigned(v) => v as f64,
        }
    }
}

/// The object carried by enum userdata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue {
    pub raw: EnumRaw,
}

#[derive(Debug, Clone, Copy)]
enum FlagOp {
    And,
    Or,
    Xor,
    Not,
    HasAll,
    HasAny,
}

impl FlagOp {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "flagsAnd" => FlagOp::And,
            "flagsOr" => FlagOp::Or,
            "flagsXor" => FlagOp::Xor,
            "flagsNot" => FlagOp::Not,
            "hasAll" => FlagOp::HasAll,
            "hasAny" => FlagOp::HasAny,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            FlagOp::And => "flagsAnd",
            FlagOp::Or => "flagsOr",
            FlagOp::Xor => "flagsXor",
            FlagOp::Not => "flagsNot",
            FlagOp::HasAll => "hasAll",
            FlagOp::HasAny => "hasAny",
        }
    }

    fn arity(self) -> usize {
        match self {
            FlagOp::Not => 1,
            _ => 2,
        }
    }
}

/// Descriptor of a host enum: its named values plus, for flag enums, the
/// bitwise helpers `flagsAnd`, `flagsOr`, `flagsXor`, `flagsNot`, `hasAll`
/// and `hasAny`.
pub struct EnumUserDataDescriptor {
    name: String,
    storage: EnumStorage,
    flags: bool,
    values: IndexMap<String, EnumRaw>,
    this: Weak<EnumUserDataDescriptor>,
}

impl EnumUserDataDescriptor {
    /// `values` are given as signed integers and truncated to `storage`.
    pub fn new(name: &str, storage: EnumStorage, flags: bool, values: &[(&str, i64)]) -> Arc<Self> {
        Self::from_raw(
            name,
            storage,
            flags,
            values.iter().map(|(n, v)| (n.to_string(), EnumRaw::Signed(*v))),
        )
    }

    /// Like [`EnumUserDataDescriptor::new`] for unsigned enums with values
    /// above `i64::MAX`.
    pub fn new_unsigned(name: &str, storage: EnumStorage, flags: bool, values: &[(&str, u64)]) -> Arc<Self> {
        Self::from_raw(
            name,
            storage,
            flags,
            values.iter().map(|(n, v)| (n.to_string(), EnumRaw::Unsigned(*v))),
        )
    }

    fn from_raw(
        name: &str,
        storage: EnumStorage,
        flags: bool,
        values: impl Iterator<Item = (String, EnumRaw)>,
    ) -> Arc<Self> {
        let values = values.map(|(n, v)| (n, storage.normalize(v))).collect();
        Arc::new_cyclic(|this| Self {
            name: name.to_string(),
            storage,
            flags,
            values,
            this: this.clone(),
        })
    }

    pub fn storage(&self) -> EnumStorage {
        self.storage
    }

    pub fn is_flags(&self) -> bool {
        self.flags
    }

    /// Script value for `raw`, or nil if the descriptor is being dropped.
    pub fn wrap(&self, raw: EnumRaw) -> DynValue {
        match self.this.upgrade() {
            Some(descriptor) => {
                let descriptor: Arc<dyn UserDataDescriptor> = descriptor;
                DynValue::UserData(UserData::new(
                    EnumValue {
                        raw: self.storage.normalize(raw),
                    },
                    descriptor,
                ))
            }
            None => DynValue::Nil,
        }
    }

    /// The type object: named values and flag helpers as static members.
    pub fn static_type(&self) -> DynValue {
        match self.this.upgrade() {
            Some(descriptor) => DynValue::UserData(UserData::static_type(descriptor)),
            None => DynValue::Nil,
        }
    }

    pub fn value(&self, name: &str) -> Option<DynValue> {
        self.values.get(name).map(|raw| self.wrap(*raw))
    }

    fn raw_of(&self, value: &DynValue, op: FlagOp) -> ScriptResult<EnumRaw> {
        match value {
            DynValue::UserData(u) => match u.downcast_ref::<EnumValue>() {
                Some(v) => Ok(self.storage.normalize(v.raw)),
                None => Err(self.operand_error(op, value)),
            },
            other => match other.to_number() {
                Some(n) => Ok(self.storage.from_number(n)),
                None => Err(self.operand_error(op, value)),
            },
        }
    }

    fn operand_error(&self, op: FlagOp, value: &DynValue) -> ScriptError {
        ScriptError::runtime(format!(
            "{}.{}: expected an enum value or a number, got {}",
            self.name,
            op.name(),
            value.type_name()
        ))
    }

    fn apply(&self, op: FlagOp, args: &CallbackArguments) -> ScriptResult<DynValue> {
        if args.len() != op.arity() {
            return Err(ScriptError::runtime(format!(
                "{}.{} expects {} argument{}, got {}",
                self.name,
                op.name(),
                op.arity(),
                if op.arity() == 1 { "" } else { "s" },
                args.len()
            )));
        }
        let a = self.raw_of(&args.get(0), op)?;
        if let FlagOp::Not = op {
            let raw = if self.storage.is_unsigned() {
                EnumRaw::Unsigned(!a.as_u64())
            } else {
                EnumRaw::Signed(!a.as_i64())
            };
            return Ok(self.wrap(raw));
        }
        let b = self.raw_of(&args.get(1), op)?;
        if self.storage.is_unsigned() {
            let (a, b) = (a.as_u64(), b.as_u64());
            Ok(match op {
                FlagOp::And => self.wrap(EnumRaw::Unsigned(a & b)),
                FlagOp::Or => self.wrap(EnumRaw::Unsigned(a | b)),
                FlagOp::Xor => self.wrap(EnumRaw::Unsigned(a ^ b)),
                FlagOp::HasAll => DynValue::Boolean(a & b == b),
                _ => DynValue::Boolean(a & b != 0),
            })
        } else {
            let (a, b) = (a.as_i64(), b.as_i64());
            Ok(match op {
                FlagOp::And => self.wrap(EnumRaw::Signed(a & b)),
                FlagOp::Or => self.wrap(EnumRaw::Signed(a | b)),
                FlagOp::Xor => self.wrap(EnumRaw::Signed(a ^ b)),
                FlagOp::HasAll => DynValue::Boolean(a & b == b),
                _ => DynValue::Boolean(a & b != 0),
            })
        }
    }

    fn flag_function(&self, op: FlagOp) -> Option<DynValue> {
        let descriptor = self.this.upgrade()?;
        let name = format!("{}.{}", self.name, op.name());
        Some(DynValue::callback(&name, move |_ctx, args| descriptor.apply(op, &args)))
    }

    fn name_of(&self, raw: EnumRaw) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, v)| **v == raw)
            .map(|(n, _)| n.as_str())
    }
}

impl UserDataDescriptor for EnumUserDataDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn index(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        _object: &UserData,
        key: &DynValue,
    ) -> ScriptResult<Option<DynValue>> {
        let Some(key) = key.as_str() else {
            return Ok(None);
        };
        if let Some(value) = self.value(key) {
            return Ok(Some(value));
        }
        match FlagOp::from_name(key) {
            Some(op) if self.flags => Ok(self.flag_function(op)),
            _ => Ok(None),
        }
    }

    fn set_index(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        _object: &UserData,
        key: &DynValue,
        _value: DynValue,
    ) -> ScriptResult<bool> {
        Err(ScriptError::runtime(format!(
            "cannot assign '{}' of enum {}",
            key.to_display_string(),
            self.name
        )))
    }

    fn as_string(&self, object: &UserData) -> Option<String> {
        let value = object.downcast_ref::<EnumValue>()?;
        Some(match self.name_of(value.raw) {
            Some(name) => name.to_string(),
            None => match value.raw {
                EnumRaw::Signed(v) => v.to_string(),
                EnumRaw::Unsigned(v) => v.to_string(),
            },
        })
    }

    fn meta_index(&self, _object: &UserData, name: &str) -> Option<DynValue> {
        let descriptor = self.this.upgrade()?;
        match name {
            "__eq" => Some(DynValue::callback("__eq", move |_ctx, args| {
                let a = descriptor.raw_of(&args.get(0), FlagOp::And);
                let b = descriptor.raw_of(&args.get(1), FlagOp::And);
                Ok(DynValue::Boolean(matches!((a, b), (Ok(a), Ok(b)) if a == b)))
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(value: &DynValue) -> EnumRaw {
        value.as_userdata().unwrap().downcast_ref::<EnumValue>().unwrap().raw
    }

    #[test]
    fn test_signed_storage_sign_extends() {
        assert_eq!(EnumStorage::I8.normalize(EnumRaw::Signed(0xFF)), EnumRaw::Signed(-1));
        assert_eq!(EnumStorage::U8.normalize(EnumRaw::Signed(-1)), EnumRaw::Unsigned(0xFF));
        assert_eq!(EnumStorage::U64.normalize(EnumRaw::Unsigned(u64::MAX)), EnumRaw::Unsigned(u64::MAX));
    }

    #[test]
    fn test_flags_not_respects_width() {
        let unsigned = EnumUserDataDescriptor::new("U", EnumStorage::U8, true, &[("A", 1)]);
        let args = CallbackArguments::new(vec![unsigned.value("A").unwrap()]);
        assert_eq!(raw(&unsigned.apply(FlagOp::Not, &args).unwrap()), EnumRaw::Unsigned(0xFE));

        let signed = EnumUserDataDescriptor::new("S", EnumStorage::I16, true, &[("A", 1)]);
        let args = CallbackArguments::new(vec![signed.value("A").unwrap()]);
        assert_eq!(raw(&signed.apply(FlagOp::Not, &args).unwrap()), EnumRaw::Signed(-2));
    }

    #[test]
    fn test_has_all_and_has_any() {
        for storage in [EnumStorage::I32, EnumStorage::U32, EnumStorage::I64, EnumStorage::U64] {
            let e = EnumUserDataDescriptor::new("F", storage, true, &[("A", 1), ("B", 2), ("AB", 3), ("C", 4)]);
            let ab = e.value("AB").unwrap();
            let a = e.value("A").unwrap();
            let c = e.value("C").unwrap();
            let has_all = |x: &DynValue, y: &DynValue| {
                e.apply(FlagOp::HasAll, &CallbackArguments::new(vec![x.clone(), y.clone()])).unwrap()
            };
            let has_any = |x: &DynValue, y: &DynValue| {
                e.apply(FlagOp::HasAny, &CallbackArguments::new(vec![x.clone(), y.clone()])).unwrap()
            };
            assert_eq!(has_all(&ab, &a), DynValue::Boolean(true), "{:?}", storage);
            assert_eq!(has_all(&a, &ab), DynValue::Boolean(false), "{:?}", storage);
            assert_eq!(has_any(&a, &ab), DynValue::Boolean(true), "{:?}", storage);
            assert_eq!(has_any(&ab, &c), DynValue::Boolean(false), "{:?}", storage);
        }
    }

    #[test]
    fn test_wrong_argument_count_is_an_error() {
        let e = EnumUserDataDescriptor::new("F", EnumStorage::I32, true, &[("A", 1)]);
        let err = e
            .apply(FlagOp::And, &CallbackArguments::new(vec![e.value("A").unwrap()]))
            .unwrap_err();
        assert!(err.to_string().contains("expects 2 arguments"), "{}", err);
    }

    #[test]
    fn test_non_flag_enum_hides_helpers() {
        let e = EnumUserDataDescriptor::new("Color", EnumStorage::I32, false, &[("Red", 0)]);
        assert!(!e.is_flags());
        assert!(e.value("Red").is_some());
    }
}
