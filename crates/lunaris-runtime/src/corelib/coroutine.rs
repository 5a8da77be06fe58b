//! The `coroutine` table

use lunaris_engine::{CallbackArguments, Coroutine, DynValue, ExecutionContext, ScriptError, ScriptResult, Table};

use super::register;

pub(super) fn library() -> Table {
    let lib = Table::new();
    register(&lib, "create", create);
    register(&lib, "resume", resume);
    register(&lib, "yield", yield_);
    register(&lib, "status", status);
    register(&lib, "running", running);
    register(&lib, "wrap", wrap);
    register(&lib, "isyieldable", isyieldable);
    lib
}

fn check_coroutine(args: &CallbackArguments, func: &str) -> ScriptResult<Coroutine> {
    match args.get(0) {
        DynValue::Coroutine(co) => Ok(co),
        other => Err(ScriptError::runtime(format!(
            "bad argument #1 to '{}' (coroutine expected, got {})",
            func,
            other.type_name()
        ))),
    }
}

fn create(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let function = args.check_function(0, "create")?;
    Ok(DynValue::Coroutine(ctx.create_coroutine(function)))
}

fn resume(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let co = check_coroutine(&args, "resume")?;
    match ctx.resume(&co, args.skip(1).into_vec()) {
        Ok(values) => Ok(DynValue::tuple(vec![DynValue::Boolean(true), values])),
        Err(ScriptError::Cancelled) => Err(ScriptError::Cancelled),
        Err(e) => Ok(DynValue::tuple(vec![DynValue::Boolean(false), e.error_value()])),
    }
}

fn yield_(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    ctx.yield_values(args.into_vec())
}

fn status(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let co = check_coroutine(&args, "status")?;
    Ok(DynValue::from(co.status().as_str()))
}

fn running(ctx: &mut ExecutionContext<'_>, _args: CallbackArguments) -> ScriptResult<DynValue> {
    Ok(ctx
        .current_coroutine()
        .map(DynValue::Coroutine)
        .unwrap_or_default())
}

/// A function resuming a fresh coroutine on every call; errors are re-raised.
fn wrap(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let function = args.check_function(0, "wrap")?;
    let co = ctx.create_coroutine(function);
    Ok(DynValue::callback("wrap", move |ctx, args| ctx.resume(&co, args.into_vec())))
}

fn isyieldable(ctx: &mut ExecutionContext<'_>, _args: CallbackArguments) -> ScriptResult<DynValue> {
    Ok(DynValue::Boolean(ctx.current_coroutine().is_some()))
}
