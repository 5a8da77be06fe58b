//! Descriptors that expose a stand-in object instead of the real one

use std::any::Any;
use std::sync::Arc;

use crate::error::ScriptResult;
use crate::vm::context::ExecutionContext;
use crate::vm::value::DynValue;

use super::{UserData, UserDataDescriptor};

/// Builds the object scripts actually see for a target object.
pub trait ProxyFactory: Send + Sync {
    fn create_proxy(&self, target: &Arc<dyn Any + Send + Sync>) -> Option<Arc<dyn Any + Send + Sync>>;
}

impl<F> ProxyFactory for F
where
    F: Fn(&Arc<dyn Any + Send + Sync>) -> Option<Arc<dyn Any + Send + Sync>> + Send + Sync,
{
    fn create_proxy(&self, target: &Arc<dyn Any + Send + Sync>) -> Option<Arc<dyn Any + Send + Sync>> {
        self(target)
    }
}

/// Resolves members on a proxy of the target through the proxy's descriptor,
/// so scripts see the proxy's member surface rather than the target's.
pub struct ProxyUserDataDescriptor {
    name: String,
    factory: Arc<dyn ProxyFactory>,
    inner: Arc<dyn UserDataDescriptor>,
}

impl ProxyUserDataDescriptor {
    pub fn new(name: &str, factory: Arc<dyn ProxyFactory>, inner: Arc<dyn UserDataDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            factory,
            inner,
        }
    }

    /// Proxy targets of type `T` with objects of type `P` built by `make`.
    pub fn for_type<T, P, F>(name: &str, inner: Arc<dyn UserDataDescriptor>, make: F) -> Self
    where
        T: Any + Send + Sync,
        P: Any + Send + Sync,
        F: Fn(Arc<T>) -> P + Send + Sync + 'static,
    {
        let factory = move |target: &Arc<dyn Any + Send + Sync>| -> Option<Arc<dyn Any + Send + Sync>> {
            let typed = target.clone().downcast::<T>().ok()?;
            Some(Arc::new(make(typed)))
        };
        Self::new(name, Arc::new(factory), inner)
    }

    pub fn inner(&self) -> &Arc<dyn UserDataDescriptor> {
        &self.inner
    }

    fn proxied(&self, object: &UserData) -> Option<UserData> {
        match object.object() {
            Some(target) => self
                .factory
                .create_proxy(target)
                .map(|proxy| UserData::from_arc(proxy, self.inner.clone())),
            None => Some(UserData::static_type(self.inner.clone())),
        }
    }
}

/// Methods of the proxy expect the proxy as `self`; a call made with the
/// original object as first argument gets the proxy substituted.
fn rebind_self(value: DynValue, original: &UserData, proxy: UserData) -> DynValue {
    let DynValue::ClrFunction(function) = &value else {
        return value;
    };
    let name = function.name().to_string();
    let original = original.clone();
    DynValue::callback(&name, move |ctx, args| {
        let mut args = args.into_vec();
        if let Some(DynValue::UserData(first)) = args.first() {
            if first.same_object(&original) {
                args[0] = DynValue::UserData(proxy.clone());
            }
        }
        ctx.call(&value, args)
    })
}

impl UserDataDescriptor for ProxyUserDataDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn index(
        &self,
        ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
    ) -> ScriptResult<Option<DynValue>> {
        let Some(proxy) = self.proxied(object) else {
            return Ok(None);
        };
        let value = self.inner.index(ctx, &proxy, key)?;
        Ok(value.map(|v| rebind_self(v, object, proxy)))
    }

    fn set_index(
        &self,
        ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
        value: DynValue,
    ) -> ScriptResult<bool> {
        match self.proxied(object) {
            Some(proxy) => self.inner.set_index(ctx, &proxy, key, value),
            None => Ok(false),
        }
    }

    fn as_string(&self, object: &UserData) -> Option<String> {
        self.proxied(object).and_then(|proxy| self.inner.as_string(&proxy))
    }

    fn meta_index(&self, object: &UserData, name: &str) -> Option<DynValue> {
        self.proxied(object).and_then(|proxy| self.inner.meta_index(&proxy, name))
    }
}
