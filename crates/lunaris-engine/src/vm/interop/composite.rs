//! Descriptor trying several descriptors in order

use std::sync::Arc;

use crate::error::ScriptResult;
use crate::vm::context::ExecutionContext;
use crate::vm::value::DynValue;

use super::{UserData, UserDataDescriptor};

/// Member lookup falls through the descriptors in registration order; the
/// first one that knows a member answers for it.
pub struct CompositeUserDataDescriptor {
    name: String,
    descriptors: Vec<Arc<dyn UserDataDescriptor>>,
}

impl CompositeUserDataDescriptor {
    pub fn new(name: &str, descriptors: Vec<Arc<dyn UserDataDescriptor>>) -> Self {
        Self {
            name: name.to_string(),
            descriptors,
        }
    }

    pub fn descriptors(&self) -> &[Arc<dyn UserDataDescriptor>] {
        &self.descriptors
    }
}

impl UserDataDescriptor for CompositeUserDataDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn index(
        &self,
        ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
    ) -> ScriptResult<Option<DynValue>> {
        for descriptor in &self.descriptors {
            if let Some(value) = descriptor.index(ctx, object, key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn set_index(
        &self,
        ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
        value: DynValue,
    ) -> ScriptResult<bool> {
        for descriptor in &self.descriptors {
            if descriptor.set_index(ctx, object, key, value.clone())? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn as_string(&self, object: &UserData) -> Option<String> {
        self.descriptors.iter().find_map(|d| d.as_string(object))
    }

    fn meta_index(&self, object: &UserData, name: &str) -> Option<DynValue> {
        self.descriptors.iter().find_map(|d| d.meta_index(object, name))
    }
}
