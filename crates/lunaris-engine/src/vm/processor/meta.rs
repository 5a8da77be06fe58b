//! Metatables, indexing and metamethod dispatch

use crate::error::{ScriptError, ScriptResult};
use crate::vm::context::ExecutionContext;
use crate::vm::table::Table;
use crate::vm::value::DynValue;

use super::Processor;

/// Longest `__index`/`__newindex` chain followed before giving up
const MAX_META_CHAIN: usize = 100;

fn index_error(object: &DynValue, description: Option<&str>) -> ScriptError {
    match description {
        Some(d) => ScriptError::runtime(format!("attempt to index a {} value ({})", object.type_name(), d)),
        None => ScriptError::runtime(format!("attempt to index a {} value", object.type_name())),
    }
}

fn userdata_field_error(object: &DynValue, key: &DynValue) -> ScriptError {
    let name = object
        .as_userdata()
        .map(|u| u.descriptor().name().to_string())
        .unwrap_or_default();
    ScriptError::runtime(format!(
        "cannot access field {} of userdata<{}>",
        key.to_display_string(),
        name
    ))
}

impl Processor {
    /// Metatable of a non-userdata value.
    pub fn get_metatable(&self, value: &DynValue) -> Option<Table> {
        self.state.metatable_of(value)
    }

    /// Metamethod `name` of `value`, if any. Userdata answer through their descriptor.
    pub fn get_metamethod(&self, value: &DynValue, name: &str) -> Option<DynValue> {
        match value {
            DynValue::UserData(userdata) => userdata.descriptor().meta_index(userdata, name),
            other => self
                .state
                .metatable_of(other)
                .map(|mt| mt.get_str(name))
                .filter(|v| !v.is_nil()),
        }
    }

    /// `object[key]` honouring `__index` chains and userdata descriptors.
    pub fn index_value(&mut self, object: &DynValue, key: &DynValue, description: Option<&str>) -> ScriptResult<DynValue> {
        let mut current = object.clone();
        for _ in 0..MAX_META_CHAIN {
            let handler = match &current {
                DynValue::Table(table) => {
                    let value = table.get(key);
                    if !value.is_nil() {
                        return Ok(value);
                    }
                    match self.get_metamethod(&current, "__index") {
                        Some(handler) => handler,
                        None => return Ok(DynValue::Nil),
                    }
                }
                DynValue::UserData(userdata) => {
                    let userdata = userdata.clone();
                    let found = {
                        let mut ctx = ExecutionContext::new(self);
                        userdata.descriptor().index(&mut ctx, &userdata, key)?
                    };
                    if let Some(value) = found {
                        return Ok(value);
                    }
                    match self.get_metamethod(&current, "__index") {
                        Some(handler) => handler,
                        None => return Err(userdata_field_error(&current, key)),
                    }
                }
                other => match self.get_metamethod(other, "__index") {
                    Some(handler) => handler,
                    None => return Err(index_error(other, description)),
                },
            };
            if handler.is_callable() {
                let result = self.call_value(handler, vec![current, key.clone()])?;
                return Ok(result.to_scalar());
            }
            current = handler;
        }
        Err(ScriptError::runtime("'__index' chain too long; possible loop"))
    }

    /// `object[key] = value` honouring `__newindex` chains and userdata descriptors.
    pub fn set_index_value(
        &mut self,
        object: &DynValue,
        key: DynValue,
        value: DynValue,
        description: Option<&str>,
    ) -> ScriptResult<()> {
        let mut current = object.clone();
        for _ in 0..MAX_META_CHAIN {
            let handler = match &current {
                DynValue::Table(table) => {
                    if !table.get(&key).is_nil() {
                        return table.set(key, value);
                    }
                    match self.get_metamethod(&current, "__newindex") {
                        Some(handler) => handler,
                        None => return table.set(key, value),
                    }
                }
                DynValue::UserData(userdata) => {
                    let userdata = userdata.clone();
                    let handled = {
                        let mut ctx = ExecutionContext::new(self);
                        userdata.descriptor().set_index(&mut ctx, &userdata, &key, value.clone())?
                    };
                    if handled {
                        return Ok(());
                    }
                    match self.get_metamethod(&current, "__newindex") {
                        Some(handler) => handler,
                        None => return Err(userdata_field_error(&current, &key)),
                    }
                }
                other => match self.get_metamethod(other, "__newindex") {
                    Some(handler) => handler,
                    None => return Err(index_error(other, description)),
                },
            };
            if handler.is_callable() {
                self.call_value(handler, vec![current, key, value])?;
                return Ok(());
            }
            current = handler;
        }
        Err(ScriptError::runtime("'__newindex' chain too long; possible loop"))
    }

    /// `tostring` semantics: `__tostring`, then the descriptor, then the raw form.
    pub fn to_display_string(&mut self, value: &DynValue) -> ScriptResult<String> {
        let value = value.clone().to_scalar();
        if let Some(handler) = self.get_metamethod(&value, "__tostring") {
            let result = self.call_value(handler, vec![value])?.to_scalar();
            return match result {
                DynValue::String(s) => Ok(s.to_string()),
                DynValue::Number(_) => Ok(result.to_display_string()),
                _ => Err(ScriptError::runtime("'__tostring' must return a string")),
            };
        }
        Ok(value.to_display_string())
    }

    /// Call a binary metamethod found on either operand.
    pub(super) fn call_binary_metamethod(
        &mut self,
        event: &str,
        left: &DynValue,
        right: &DynValue,
    ) -> ScriptResult<Option<DynValue>> {
        let handler = self
            .get_metamethod(left, event)
            .or_else(|| self.get_metamethod(right, event));
        match handler {
            Some(handler) => {
                let result = self.call_value(handler, vec![left.clone(), right.clone()])?;
                Ok(Some(result.to_scalar()))
            }
            None => Ok(None),
        }
    }
}
