//! Descriptors built member by member for a Rust type

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{ScriptError, ScriptResult};
use crate::vm::callback::CallbackArguments;
use crate::vm::context::ExecutionContext;
use crate::vm::value::DynValue;

use super::event::{event_facade, HostEvent};
use super::{UserData, UserDataDescriptor, UserDataRegistry};

type Getter<T> = Arc<dyn Fn(&T) -> DynValue + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&T, DynValue) -> ScriptResult<()> + Send + Sync>;
type EventAccessor<T> = Arc<dyn Fn(&T) -> HostEvent + Send + Sync>;
type Formatter<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

enum Member<T> {
    /// Instance or static callable, already wrapped as a function value
    Function(DynValue),
    Property { get: Getter<T>, set: Option<Setter<T>> },
    Constant(DynValue),
    Event(EventAccessor<T>),
}

/// Descriptor of a Rust type `T`, assembled with [`DescriptorBuilder`].
///
/// Writable properties receive `&T`; types with mutable state keep it behind
/// interior mutability since the object is shared by every handle.
pub struct StandardUserDataDescriptor<T> {
    name: String,
    members: FxHashMap<String, Member<T>>,
    metamethods: FxHashMap<String, DynValue>,
    constructor: Option<DynValue>,
    formatter: Option<Formatter<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> StandardUserDataDescriptor<T> {
    fn member_error(&self, key: &str, problem: &str) -> ScriptError {
        ScriptError::runtime(format!("{} '{}' of userdata<{}>", problem, key, self.name))
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }
}

impl<T: Any + Send + Sync> UserDataDescriptor for StandardUserDataDescriptor<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_id(&self) -> Option<TypeId> {
        Some(TypeId::of::<T>())
    }

    fn index(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
    ) -> ScriptResult<Option<DynValue>> {
        let Some(key) = key.as_str() else {
            return Ok(None);
        };
        if key == "__new" {
            return Ok(self.constructor.clone());
        }
        let Some(member) = self.members.get(key) else {
            return Ok(None);
        };
        match member {
            Member::Function(f) => Ok(Some(f.clone())),
            Member::Constant(v) => Ok(Some(v.clone())),
            Member::Property { get, .. } => match object.downcast_ref::<T>() {
                Some(this) => Ok(Some(get(this))),
                None => Err(self.member_error(key, "cannot read instance property")),
            },
            Member::Event(accessor) => match object.downcast_ref::<T>() {
                Some(this) => Ok(Some(event_facade(accessor(this)))),
                None => Err(self.member_error(key, "cannot access instance event")),
            },
        }
    }

    fn set_index(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
        value: DynValue,
    ) -> ScriptResult<bool> {
        let Some(key) = key.as_str() else {
            return Ok(false);
        };
        let Some(member) = self.members.get(key) else {
            return Ok(false);
        };
        match member {
            Member::Property { set: Some(set), .. } => match object.downcast_ref::<T>() {
                Some(this) => set(this, value).map(|_| true),
                None => Err(self.member_error(key, "cannot write instance property")),
            },
            Member::Property { set: None, .. } => Err(self.member_error(key, "cannot assign read-only property")),
            Member::Event(_) => Err(self.member_error(key, "cannot assign to event")),
            Member::Function(_) | Member::Constant(_) => Err(self.member_error(key, "cannot assign to member")),
        }
    }

    fn as_string(&self, object: &UserData) -> Option<String> {
        let formatter = self.formatter.as_ref()?;
        object.downcast_ref::<T>().map(|this| formatter(this))
    }

    fn meta_index(&self, object: &UserData, name: &str) -> Option<DynValue> {
        if name == "__call" && object.is_static() {
            if let Some(constructor) = &self.constructor {
                let constructor = constructor.clone();
                // `Type(...)` passes the type itself first
                return Some(DynValue::callback("__call", move |ctx, args| {
                    ctx.call(&constructor, args.skip(1).into_vec())
                }));
            }
        }
        self.metamethods.get(name).cloned()
    }
}

/// Builder for [`StandardUserDataDescriptor`].
///
/// ```ignore
/// DescriptorBuilder::<Counter>::new("Counter")
///     .method("increment", |_ctx, this, _args| Ok(this.increment().into()))
///     .property("value", |this| this.value().into())
///     .constructor(|_ctx, _args| Ok(Counter::default()))
///     .register();
/// ```
pub struct DescriptorBuilder<T> {
    descriptor: StandardUserDataDescriptor<T>,
}

impl<T: Any + Send + Sync> DescriptorBuilder<T> {
    pub fn new(name: &str) -> Self {
        Self {
            descriptor: StandardUserDataDescriptor {
                name: name.to_string(),
                members: FxHashMap::default(),
                metamethods: FxHashMap::default(),
                constructor: None,
                formatter: None,
                _marker: PhantomData,
            },
        }
    }

    fn member(mut self, name: &str, member: Member<T>) -> Self {
        self.descriptor.members.insert(name.to_string(), member);
        self
    }

    /// Instance method, called as `obj:name(...)`.
    pub fn method<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, &T, CallbackArguments) -> ScriptResult<DynValue> + Send + Sync + 'static,
    {
        let qualified = format!("{}.{}", self.descriptor.name, name);
        let func_name = qualified.clone();
        let callback = DynValue::callback(&qualified, move |ctx, args| {
            let this = args.userdata::<T>(0, &func_name)?;
            f(ctx, &this, args.skip(1))
        });
        self.member(name, Member::Function(callback))
    }

    /// Method reachable from the type and from instances without `self`.
    pub fn static_method<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, CallbackArguments) -> ScriptResult<DynValue> + Send + Sync + 'static,
    {
        let qualified = format!("{}.{}", self.descriptor.name, name);
        self.member(name, Member::Function(DynValue::callback(&qualified, f)))
    }

    pub fn property<G>(self, name: &str, get: G) -> Self
    where
        G: Fn(&T) -> DynValue + Send + Sync + 'static,
    {
        self.member(name, Member::Property { get: Arc::new(get), set: None })
    }

    pub fn property_rw<G, S>(self, name: &str, get: G, set: S) -> Self
    where
        G: Fn(&T) -> DynValue + Send + Sync + 'static,
        S: Fn(&T, DynValue) -> ScriptResult<()> + Send + Sync + 'static,
    {
        self.member(
            name,
            Member::Property {
                get: Arc::new(get),
                set: Some(Arc::new(set)),
            },
        )
    }

    pub fn constant(self, name: &str, value: impl Into<DynValue>) -> Self {
        self.member(name, Member::Constant(value.into()))
    }

    /// Event exposed as an `add`/`remove` facade.
    pub fn event<F>(self, name: &str, accessor: F) -> Self
    where
        F: Fn(&T) -> HostEvent + Send + Sync + 'static,
    {
        self.member(name, Member::Event(Arc::new(accessor)))
    }

    /// Metamethod such as `__add`, `__eq`, `__len` or `__call`.
    pub fn meta<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, CallbackArguments) -> ScriptResult<DynValue> + Send + Sync + 'static,
    {
        let qualified = format!("{}.{}", self.descriptor.name, name);
        self.descriptor
            .metamethods
            .insert(name.to_string(), DynValue::callback(&qualified, f));
        self
    }

    /// Constructor reachable as `Type.__new(...)` and `Type(...)`.
    ///
    /// The created object is wrapped with the descriptor registered for `T`.
    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, CallbackArguments) -> ScriptResult<T> + Send + Sync + 'static,
    {
        let qualified = format!("{}.__new", self.descriptor.name);
        self.descriptor.constructor = Some(DynValue::callback(&qualified, move |ctx, args| {
            let object = f(ctx, args)?;
            UserDataRegistry::wrap(object)
        }));
        self
    }

    pub fn to_string<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.descriptor.formatter = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Arc<StandardUserDataDescriptor<T>> {
        Arc::new(self.descriptor)
    }

    /// Build and store the descriptor in [`UserDataRegistry`].
    pub fn register(self) -> Arc<dyn UserDataDescriptor> {
        UserDataRegistry::register::<T>(self.build())
    }
}
