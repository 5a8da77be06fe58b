//! Host events and their script-side `add`/`remove` facade

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{ScriptError, ScriptResult};
use crate::vm::callback::CallbackArguments;
use crate::vm::context::ExecutionContext;
use crate::vm::value::DynValue;

use super::{UserData, UserDataDescriptor};

/// A multicast list of script handlers owned by a host object.
#[derive(Clone, Default)]
pub struct HostEvent {
    handlers: Arc<RwLock<Vec<DynValue>>>,
}

impl HostEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: DynValue) {
        self.handlers.write().push(handler);
    }

    /// Remove the most recently added occurrence of `handler`.
    pub fn remove(&self, handler: &DynValue) -> bool {
        let mut handlers = self.handlers.write();
        match handlers.iter().rposition(|h| h.raw_equals(handler)) {
            Some(i) => {
                handlers.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn handlers(&self) -> Vec<DynValue> {
        self.handlers.read().clone()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Call every handler in subscription order, stopping at the first error.
    pub fn raise(&self, ctx: &mut ExecutionContext<'_>, args: Vec<DynValue>) -> ScriptResult<()> {
        // Handlers may subscribe or unsubscribe while running
        for handler in self.handlers() {
            ctx.call(&handler, args.clone())?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostEvent").field("handlers", &self.len()).finish()
    }
}

const EVENT_ONLY_MEMBERS: &str = "Events only support add and remove methods";

struct EventFacadeDescriptor;

static EVENT_FACADE: Lazy<Arc<EventFacadeDescriptor>> = Lazy::new(|| Arc::new(EventFacadeDescriptor));

/// The handler argument, accepting both `ev.add(f)` and `ev:add(f)`.
fn handler_argument(args: &CallbackArguments, name: &str) -> ScriptResult<DynValue> {
    let first = args.get(0);
    let index = match &first {
        DynValue::UserData(u) if u.downcast_ref::<HostEvent>().is_some() => 1,
        _ => 0,
    };
    args.check_function(index, name)
}

impl UserDataDescriptor for EventFacadeDescriptor {
    fn name(&self) -> &str {
        "Event"
    }

    fn index(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
    ) -> ScriptResult<Option<DynValue>> {
        let event = object
            .downcast_ref::<HostEvent>()
            .cloned()
            .ok_or_else(|| ScriptError::runtime("invalid event object"))?;
        match key.as_str() {
            Some("add") => Ok(Some(DynValue::callback("add", move |_ctx, args| {
                event.add(handler_argument(&args, "add")?);
                Ok(DynValue::void())
            }))),
            Some("remove") => Ok(Some(DynValue::callback("remove", move |_ctx, args| {
                event.remove(&handler_argument(&args, "remove")?);
                Ok(DynValue::void())
            }))),
            _ => Err(ScriptError::runtime(EVENT_ONLY_MEMBERS)),
        }
    }

    fn set_index(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        _object: &UserData,
        _key: &DynValue,
        _value: DynValue,
    ) -> ScriptResult<bool> {
        Err(ScriptError::runtime(EVENT_ONLY_MEMBERS))
    }

    fn as_string(&self, object: &UserData) -> Option<String> {
        let event = object.downcast_ref::<HostEvent>()?;
        Some(format!("event ({} handlers)", event.len()))
    }
}

/// Script value exposing `event` through `add`/`remove` only.
pub fn event_facade(event: HostEvent) -> DynValue {
    let descriptor: Arc<dyn UserDataDescriptor> = EVENT_FACADE.clone();
    DynValue::UserData(UserData::new(event, descriptor))
}
