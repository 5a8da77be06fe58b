//! The descriptor contract

use std::any::TypeId;

use crate::error::ScriptResult;
use crate::vm::context::ExecutionContext;
use crate::vm::value::DynValue;

use super::UserData;

/// Resolves member access on userdata values.
///
/// Descriptors are built once per host type and shared read-only by every
/// script, so implementations must be `Send + Sync`.
pub trait UserDataDescriptor: Send + Sync {
    /// Type name used in error messages and default `tostring` output.
    fn name(&self) -> &str;

    /// Rust type described, if the descriptor is bound to one.
    fn type_id(&self) -> Option<TypeId> {
        None
    }

    /// Read `object[key]`. `Ok(None)` means the member is unknown.
    fn index(
        &self,
        ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
    ) -> ScriptResult<Option<DynValue>>;

    /// Write `object[key] = value`. `Ok(false)` means the member is unknown.
    fn set_index(
        &self,
        ctx: &mut ExecutionContext<'_>,
        object: &UserData,
        key: &DynValue,
        value: DynValue,
    ) -> ScriptResult<bool>;

    /// Custom `tostring` form.
    fn as_string(&self, _object: &UserData) -> Option<String> {
        None
    }

    /// Metamethod `name` for `object` (`__call`, `__eq`, `__add`, ...).
    fn meta_index(&self, _object: &UserData, _name: &str) -> Option<DynValue> {
        None
    }
}
