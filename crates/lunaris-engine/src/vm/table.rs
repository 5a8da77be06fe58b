//! Script tables: an array part for keys `1..=n` plus an insertion-ordered
//! hash part.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::{Equivalent, IndexMap};
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;

use crate::error::{ScriptError, ScriptResult};
use crate::vm::value::DynValue;

/// Hash-part key. Numbers are keyed by their bit pattern with `-0` folded
/// into `0`; reference values are keyed by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TableKey {
    Boolean(bool),
    Number(u64),
    String(Arc<str>),
    Reference(usize),
}

impl Hash for TableKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            TableKey::Boolean(b) => {
                0u8.hash(state);
                b.hash(state);
            }
            TableKey::Number(bits) => {
                1u8.hash(state);
                bits.hash(state);
            }
            TableKey::String(s) => {
                2u8.hash(state);
                (**s).hash(state);
            }
            TableKey::Reference(ptr) => {
                3u8.hash(state);
                ptr.hash(state);
            }
        }
    }
}

/// Borrowed string lookup key, hashing exactly like `TableKey::String`.
struct StrKey<'a>(&'a str);

impl Hash for StrKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        2u8.hash(state);
        self.0.hash(state);
    }
}

impl Equivalent<TableKey> for StrKey<'_> {
    fn equivalent(&self, key: &TableKey) -> bool {
        matches!(key, TableKey::String(s) if &**s == self.0)
    }
}

fn number_key(n: f64) -> TableKey {
    TableKey::Number(if n == 0.0 { 0f64.to_bits() } else { n.to_bits() })
}

/// Classify a key. `Ok(None)` means the key can never be present (nil).
fn table_key(key: &DynValue) -> Result<Option<TableKey>, &'static str> {
    Ok(Some(match key {
        DynValue::Nil => return Ok(None),
        DynValue::Boolean(b) => TableKey::Boolean(*b),
        DynValue::Number(n) if n.is_nan() => return Err("table index is NaN"),
        DynValue::Number(n) => number_key(*n),
        DynValue::String(s) => TableKey::String(s.clone()),
        DynValue::Tuple(values) => {
            return match values.first() {
                Some(first) => table_key(first),
                None => Ok(None),
            }
        }
        other => match other.reference_id() {
            Some(id) => TableKey::Reference(id),
            None => return Ok(None),
        },
    }))
}

/// Array slot for an integral key in `1..`.
fn array_index(key: &DynValue) -> Option<usize> {
    match key {
        DynValue::Number(n) if n.fract() == 0.0 && *n >= 1.0 && *n <= u32::MAX as f64 => {
            Some(*n as usize - 1)
        }
        _ => None,
    }
}

const COMPACT_THRESHOLD: usize = 8;

#[derive(Default)]
struct TableData {
    array: Vec<DynValue>,
    /// Key to (original key, value); a nil value marks a removed entry
    hash: IndexMap<TableKey, (DynValue, DynValue), FxBuildHasher>,
    tombstones: usize,
    metatable: Option<Table>,
}

impl TableData {
    fn trim_array(&mut self) {
        while matches!(self.array.last(), Some(DynValue::Nil)) {
            self.array.pop();
        }
    }

    /// Move hash entries that continue the array sequence into the array.
    fn migrate_from_hash(&mut self) {
        loop {
            let next = number_key((self.array.len() + 1) as f64);
            match self.hash.shift_remove(&next) {
                Some((_, value)) if !value.is_nil() => self.array.push(value),
                Some(_) => {
                    self.tombstones = self.tombstones.saturating_sub(1);
                    break;
                }
                None => break,
            }
        }
    }

    fn compact(&mut self) {
        self.hash.retain(|_, (_, value)| !value.is_nil());
        self.tombstones = 0;
    }

    fn set_hash(&mut self, key: TableKey, original: DynValue, value: DynValue) {
        if let Some(slot) = self.hash.get_mut(&key) {
            if value.is_nil() && !slot.1.is_nil() {
                self.tombstones += 1;
            } else if !value.is_nil() && slot.1.is_nil() {
                self.tombstones = self.tombstones.saturating_sub(1);
            }
            slot.1 = value;
            return;
        }
        if value.is_nil() {
            return;
        }
        if self.tombstones > COMPACT_THRESHOLD && self.tombstones * 2 > self.hash.len() {
            self.compact();
        }
        self.hash.insert(key, (original, value));
    }
}

/// A shared, mutable table handle.
#[derive(Clone, Default)]
pub struct Table(Arc<Mutex<TableData>>);

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table whose array part holds `values` (trailing nils dropped).
    pub fn from_values(values: Vec<DynValue>) -> Self {
        let mut data = TableData {
            array: values,
            ..Default::default()
        };
        data.trim_array();
        Table(Arc::new(Mutex::new(data)))
    }

    /// Identity used for reference equality and hashing.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Table) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Raw read; missing keys (and nil/NaN keys) read as nil.
    pub fn get(&self, key: &DynValue) -> DynValue {
        let data = self.0.lock();
        if let Some(i) = array_index(key) {
            if let Some(value) = data.array.get(i) {
                return value.clone();
            }
        }
        match table_key(key) {
            Ok(Some(k)) => data.hash.get(&k).map(|(_, v)| v.clone()).unwrap_or_default(),
            _ => DynValue::Nil,
        }
    }

    pub fn get_str(&self, key: &str) -> DynValue {
        self.0
            .lock()
            .hash
            .get(&StrKey(key))
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    pub fn get_int(&self, index: i64) -> DynValue {
        self.get(&DynValue::Number(index as f64))
    }

    /// Raw write. Assigning nil removes the key.
    pub fn set(&self, key: DynValue, value: DynValue) -> ScriptResult<()> {
        let key = key.to_scalar();
        let value = value.to_scalar();
        let mut data = self.0.lock();
        if let Some(i) = array_index(&key) {
            let len = data.array.len();
            if i < len {
                data.array[i] = value;
                if i + 1 == len {
                    data.trim_array();
                }
                return Ok(());
            }
            if i == len && !value.is_nil() {
                if let Some((_, slot)) = data.hash.shift_remove(&number_key(key.as_number().unwrap_or_default())) {
                    if slot.is_nil() {
                        data.tombstones = data.tombstones.saturating_sub(1);
                    }
                }
                data.array.push(value);
                data.migrate_from_hash();
                return Ok(());
            }
        }
        match table_key(&key) {
            Ok(Some(k)) => {
                data.set_hash(k, key, value);
                Ok(())
            }
            Ok(None) => Err(ScriptError::runtime("table index is nil")),
            Err(message) => Err(ScriptError::runtime(message)),
        }
    }

    pub fn set_str(&self, key: &str, value: DynValue) {
        let mut data = self.0.lock();
        let value = value.to_scalar();
        data.set_hash(TableKey::String(Arc::from(key)), DynValue::string(key), value);
    }

    pub fn set_int(&self, index: i64, value: DynValue) {
        // Integral keys are never nil or NaN
        let _ = self.set(DynValue::Number(index as f64), value);
    }

    /// Append after the current border.
    pub fn append(&self, value: DynValue) {
        let len = self.len();
        self.set_int(len as i64 + 1, value);
    }

    /// Border of the sequence part (the `#` operator without metamethods).
    pub fn len(&self) -> usize {
        let data = self.0.lock();
        if !data.array.is_empty() {
            return data.array.len();
        }
        // Sequences built from the top down may live in the hash part
        let mut n = 0usize;
        while data
            .hash
            .get(&number_key((n + 1) as f64))
            .is_some_and(|(_, v)| !v.is_nil())
        {
            n += 1;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        let data = self.0.lock();
        data.array.iter().all(DynValue::is_nil) && data.hash.values().all(|(_, v)| v.is_nil())
    }

    /// Traversal step: the entry after `key` (nil starts the traversal).
    pub fn next(&self, key: &DynValue) -> ScriptResult<Option<(DynValue, DynValue)>> {
        let data = self.0.lock();
        let key = key.clone().to_scalar();
        let (mut array_pos, mut hash_pos) = (0usize, 0usize);

        if !key.is_nil() {
            match array_index(&key) {
                Some(i) if i < data.array.len() => array_pos = i + 1,
                _ => {
                    let k = table_key(&key)
                        .ok()
                        .flatten()
                        .ok_or_else(|| ScriptError::runtime("invalid key to 'next'"))?;
                    let index = data
                        .hash
                        .get_index_of(&k)
                        .ok_or_else(|| ScriptError::runtime("invalid key to 'next'"))?;
                    array_pos = data.array.len();
                    hash_pos = index + 1;
                }
            }
        }

        for i in array_pos..data.array.len() {
            if !data.array[i].is_nil() {
                return Ok(Some((DynValue::Number((i + 1) as f64), data.array[i].clone())));
            }
        }
        for i in hash_pos..data.hash.len() {
            if let Some((_, (k, v))) = data.hash.get_index(i) {
                if !v.is_nil() {
                    return Ok(Some((k.clone(), v.clone())));
                }
            }
        }
        Ok(None)
    }

    /// Snapshot of all live entries in traversal order.
    pub fn pairs(&self) -> Vec<(DynValue, DynValue)> {
        let data = self.0.lock();
        data.array
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nil())
            .map(|(i, v)| (DynValue::Number((i + 1) as f64), v.clone()))
            .chain(
                data.hash
                    .values()
                    .filter(|(_, v)| !v.is_nil())
                    .map(|(k, v)| (k.clone(), v.clone())),
            )
            .collect()
    }

    pub fn metatable(&self) -> Option<Table> {
        self.0.lock().metatable.clone()
    }

    pub fn set_metatable(&self, metatable: Option<Table>) {
        self.0.lock().metatable = metatable;
    }

    /// Remove every entry, keeping the metatable.
    pub fn clear(&self) {
        let mut data = self.0.lock();
        data.array.clear();
        data.hash.clear();
        data.tombstones = 0;
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "table: 0x{:08x}", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> DynValue {
        DynValue::Number(n)
    }

    #[test]
    fn test_array_and_hash_parts() {
        let t = Table::new();
        t.set(num(1.0), DynValue::from("a")).unwrap();
        t.set(num(2.0), DynValue::from("b")).unwrap();
        t.set(DynValue::from("x"), num(10.0)).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&num(2.0)), DynValue::from("b"));
        assert_eq!(t.get_str("x"), num(10.0));
        assert_eq!(t.get(&DynValue::from("missing")), DynValue::Nil);
    }

    #[test]
    fn test_out_of_order_fill_migrates() {
        let t = Table::new();
        t.set_int(3, num(3.0));
        t.set_int(2, num(2.0));
        assert_eq!(t.len(), 0);
        t.set_int(1, num(1.0));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_nil_and_nan_keys() {
        let t = Table::new();
        assert!(t.set(DynValue::Nil, num(1.0)).is_err());
        assert!(t.set(num(f64::NAN), num(1.0)).is_err());
        assert_eq!(t.get(&DynValue::Nil), DynValue::Nil);
    }

    #[test]
    fn test_negative_zero_key() {
        let t = Table::new();
        t.set(num(-0.0), DynValue::from("zero")).unwrap();
        assert_eq!(t.get(&num(0.0)), DynValue::from("zero"));
    }

    #[test]
    fn test_traversal_with_removal() {
        let t = Table::new();
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            t.set_str(name, num(i as f64));
        }
        let mut seen = Vec::new();
        let mut key = DynValue::Nil;
        while let Some((k, _)) = t.next(&key).unwrap() {
            // Clearing the current field is allowed during traversal
            t.set(k.clone(), DynValue::Nil).unwrap();
            seen.push(k.clone());
            key = k;
        }
        assert_eq!(seen.len(), 4);
        assert!(t.is_empty());
    }

    #[test]
    fn test_invalid_next_key() {
        let t = Table::new();
        t.set_str("a", num(1.0));
        assert!(t.next(&DynValue::from("zzz")).is_err());
    }

    #[test]
    fn test_tombstones_compact() {
        let t = Table::new();
        for i in 0..40 {
            t.set_str(&format!("k{}", i), num(i as f64));
        }
        for i in 0..40 {
            t.set_str(&format!("k{}", i), DynValue::Nil);
        }
        t.set_str("fresh", num(1.0));
        assert_eq!(t.pairs().len(), 1);
        assert_eq!(t.0.lock().hash.len(), 1);
    }
}
