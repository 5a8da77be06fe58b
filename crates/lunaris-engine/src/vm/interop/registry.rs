//! Process-wide descriptor cache

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::error::{ScriptError, ScriptResult};
use crate::vm::value::DynValue;

use super::{UserData, UserDataDescriptor};

static DESCRIPTORS: Lazy<DashMap<TypeId, Arc<dyn UserDataDescriptor>>> = Lazy::new(DashMap::new);

/// One descriptor per Rust type, shared by every script in the process.
pub struct UserDataRegistry;

impl UserDataRegistry {
    /// Register (or replace) the descriptor of `T`.
    pub fn register<T: Any>(descriptor: Arc<dyn UserDataDescriptor>) -> Arc<dyn UserDataDescriptor> {
        log::debug!("registered userdata descriptor '{}'", descriptor.name());
        DESCRIPTORS.insert(TypeId::of::<T>(), descriptor.clone());
        descriptor
    }

    pub fn get<T: Any>() -> Option<Arc<dyn UserDataDescriptor>> {
        Self::get_by_id(TypeId::of::<T>())
    }

    pub fn get_by_id(type_id: TypeId) -> Option<Arc<dyn UserDataDescriptor>> {
        DESCRIPTORS.get(&type_id).map(|entry| entry.value().clone())
    }

    /// Existing descriptor of `T`, or the one built by `build`.
    pub fn get_or_register<T, F>(build: F) -> Arc<dyn UserDataDescriptor>
    where
        T: Any,
        F: FnOnce() -> Arc<dyn UserDataDescriptor>,
    {
        DESCRIPTORS.entry(TypeId::of::<T>()).or_insert_with(build).value().clone()
    }

    pub fn is_registered<T: Any>() -> bool {
        DESCRIPTORS.contains_key(&TypeId::of::<T>())
    }

    pub fn unregister<T: Any>() -> Option<Arc<dyn UserDataDescriptor>> {
        DESCRIPTORS.remove(&TypeId::of::<T>()).map(|(_, d)| d)
    }

    /// Wrap `object` with the registered descriptor of its type.
    pub fn wrap<T: Any + Send + Sync>(object: T) -> ScriptResult<DynValue> {
        Self::wrap_arc(Arc::new(object))
    }

    pub fn wrap_arc<T: Any + Send + Sync>(object: Arc<T>) -> ScriptResult<DynValue> {
        let descriptor = Self::get::<T>().ok_or_else(|| not_registered::<T>())?;
        Ok(DynValue::UserData(UserData::from_arc(object, descriptor)))
    }

    /// The static side of `T`: constructors, static methods and constants.
    pub fn static_type<T: Any>() -> ScriptResult<DynValue> {
        let descriptor = Self::get::<T>().ok_or_else(|| not_registered::<T>())?;
        Ok(DynValue::UserData(UserData::static_type(descriptor)))
    }
}

fn not_registered<T: Any>() -> ScriptError {
    ScriptError::runtime(format!(
        "type '{}' has no registered userdata descriptor",
        std::any::type_name::<T>()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::interop::DescriptorBuilder;

    struct Registered;
    struct NeverRegistered;

    #[test]
    fn test_register_and_wrap() {
        DescriptorBuilder::<Registered>::new("Registered").register();
        assert!(UserDataRegistry::is_registered::<Registered>());
        let value = UserDataRegistry::wrap(Registered).unwrap();
        assert_eq!(value.type_name(), "userdata");
        assert!(value.as_userdata().unwrap().downcast_ref::<Registered>().is_some());
    }

    #[test]
    fn test_wrap_unregistered_type_fails() {
        let err = UserDataRegistry::wrap(NeverRegistered).unwrap_err();
        assert!(err.to_string().contains("no registered userdata descriptor"));
    }
}
