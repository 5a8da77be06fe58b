//! Variables shared between script sessions
//!
//! A [`SharedVariables`] map can be handed to any number of [`crate::Script`]
//! instances, including ones running on other threads. Scripts see it as a
//! userdata with `get`/`set`/`keys`/`clear` methods and plain field access:
//!
//! ```lua
//! shared.counter = (shared.counter or 0) + 1
//! for _, k in ipairs(shared:keys()) do print(k, shared:get(k)) end
//! ```

use std::sync::Arc;

use lunaris_engine::{
    CompositeUserDataDescriptor, DescriptorBuilder, DynValue, ExecutionContext, ScriptError,
    ScriptResult, Table, UserData, UserDataDescriptor,
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

static DESCRIPTOR: Lazy<Arc<dyn UserDataDescriptor>> = Lazy::new(|| {
    let methods: Arc<dyn UserDataDescriptor> = DescriptorBuilder::<SharedVariables>::new("SharedVariables")
        .method("get", |_ctx, this, args| {
            let key = args.check_string(0, "get")?;
            Ok(this.get(&key))
        })
        .method("set", |_ctx, this, args| {
            let key = args.check_string(0, "set")?;
            this.set(&key, args.get(1))?;
            Ok(DynValue::void())
        })
        .method("keys", |_ctx, this, _args| {
            let keys = this.keys().into_iter().map(DynValue::from).collect();
            Ok(DynValue::Table(Table::from_values(keys)))
        })
        .method("clear", |_ctx, this, _args| {
            this.clear();
            Ok(DynValue::void())
        })
        .meta("__len", |_ctx, args| {
            let this = args.userdata::<SharedVariables>(0, "__len")?;
            Ok(DynValue::Number(this.len() as f64))
        })
        .to_string(|this| format!("SharedVariables ({} entries)", this.len()))
        .build();

    let fields: Arc<dyn UserDataDescriptor> = Arc::new(FieldAccess);
    Arc::new(CompositeUserDataDescriptor::new("SharedVariables", vec![methods, fields]))
});

/// Thread-safe name to value map.
///
/// Only nil, booleans, numbers and strings can be stored: tables and
/// functions belong to one session and must not leak into another.
#[derive(Clone, Default)]
pub struct SharedVariables {
    values: Arc<RwLock<FxHashMap<String, DynValue>>>,
}

impl SharedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> DynValue {
        self.values.read().get(name).cloned().unwrap_or_default()
    }

    /// Store a value; nil removes the entry.
    pub fn set(&self, name: &str, value: DynValue) -> ScriptResult<()> {
        let value = value.to_scalar();
        match value {
            DynValue::Nil => {
                self.values.write().remove(name);
            }
            DynValue::Boolean(_) | DynValue::Number(_) | DynValue::String(_) => {
                self.values.write().insert(name.to_string(), value);
            }
            other => {
                return Err(ScriptError::runtime(format!(
                    "shared variables only hold nil, boolean, number and string values (got {})",
                    other.type_name()
                )))
            }
        }
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<DynValue> {
        self.values.write().remove(name)
    }

    /// Names in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn clear(&self) {
        self.values.write().clear();
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Userdata handle over this map; every handle sees the same entries.
    pub fn to_userdata(&self) -> DynValue {
        DynValue::UserData(UserData::new(self.clone(), DESCRIPTOR.clone()))
    }
}

impl std::fmt::Debug for SharedVariables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedVariables").field("len", &self.len()).finish()
    }
}

/// Answers any string key not claimed by a method with the stored value.
struct FieldAccess;

impl UserDataDescriptor for FieldAccess {
    fn name(&self) -> &str {
        "SharedVariables"
    }

    fn index(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
    ) -> ScriptResult<Option<DynValue>> {
        match (object.downcast_ref::<SharedVariables>(), key.as_str()) {
            (Some(vars), Some(name)) => Ok(Some(vars.get(name))),
            _ => Ok(None),
        }
    }

    fn set_index(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
        value: DynValue,
    ) -> ScriptResult<bool> {
        match (object.downcast_ref::<SharedVariables>(), key.as_str()) {
            (Some(vars), Some(name)) => vars.set(name, value).map(|_| true),
            _ => Ok(false),
        }
    }
}
