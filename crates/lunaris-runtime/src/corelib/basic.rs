//! Global functions: printing, type inspection, raw access, metatables,
//! errors and protected calls

use std::sync::Arc;
use std::time::Duration;

use lunaris_engine::vm::parse_number;
use lunaris_engine::{
    CallbackArguments, DynValue, ExecutionContext, RuntimeError, ScriptError, ScriptResult, Table,
};
use once_cell::sync::Lazy;

use super::register;
use crate::platform::Platform;

/// Ranges longer than this make `unpack` fail instead of allocating.
const MAX_UNPACK: i64 = 1 << 20;

static NEXT: Lazy<DynValue> = Lazy::new(|| DynValue::callback("next", next));
static IPAIRS_STEP: Lazy<DynValue> = Lazy::new(|| DynValue::callback("ipairs_iterator", ipairs_step));

pub(super) fn install(globals: &Table, platform: &Arc<Platform>) {
    let sink = platform.clone();
    register(globals, "print", move |ctx, args| {
        let mut parts = Vec::with_capacity(args.len());
        for value in args.values() {
            parts.push(ctx.to_display_string(value)?);
        }
        sink.write_line(&parts.join("\t"));
        Ok(DynValue::void())
    });

    register(globals, "type", type_of);
    register(globals, "tostring", tostring);
    register(globals, "tonumber", tonumber);
    globals.set_str("next", NEXT.clone());
    register(globals, "pairs", pairs);
    register(globals, "ipairs", ipairs);
    register(globals, "select", select);
    register(globals, "rawget", rawget);
    register(globals, "rawset", rawset);
    register(globals, "rawequal", rawequal);
    register(globals, "rawlen", rawlen);
    register(globals, "setmetatable", setmetatable);
    register(globals, "getmetatable", getmetatable);
    register(globals, "error", error);
    register(globals, "assert", assert);
    register(globals, "pcall", pcall);
    register(globals, "xpcall", xpcall);
    register(globals, "unpack", unpack);
}

// ============================================================================
// Conversion
// ============================================================================

fn type_of(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let value = args.check_value(0, "type")?;
    Ok(DynValue::from(value.type_name()))
}

fn tostring(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let value = args.check_value(0, "tostring")?;
    Ok(DynValue::string(ctx.to_display_string(&value)?))
}

fn tonumber(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let value = args.check_value(0, "tonumber")?;
    if args.get(1).is_nil() {
        return Ok(match value {
            DynValue::Number(n) => DynValue::Number(n),
            DynValue::String(s) => parse_number(&s).map(DynValue::Number).unwrap_or_default(),
            _ => DynValue::Nil,
        });
    }

    let base = args.check_integer(1, "tonumber")?;
    if !(2..=36).contains(&base) {
        return Err(ScriptError::runtime("bad argument #2 to 'tonumber' (base out of range)"));
    }
    let text = args.check_string(0, "tonumber")?;
    Ok(i64::from_str_radix(text.trim(), base as u32)
        .map(|n| DynValue::Number(n as f64))
        .unwrap_or_default())
}

// ============================================================================
// Iteration
// ============================================================================

fn next(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "next")?;
    Ok(match table.next(&args.get(1))? {
        Some((key, value)) => DynValue::tuple(vec![key, value]),
        None => DynValue::Nil,
    })
}

fn pairs(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "pairs")?;
    Ok(DynValue::tuple(vec![NEXT.clone(), DynValue::Table(table), DynValue::Nil]))
}

fn ipairs(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "ipairs")?;
    Ok(DynValue::tuple(vec![
        IPAIRS_STEP.clone(),
        DynValue::Table(table),
        DynValue::Number(0.0),
    ]))
}

fn ipairs_step(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_value(0, "ipairs")?;
    let index = args.check_integer(1, "ipairs")? + 1;
    let value = ctx.index(&table, &DynValue::Number(index as f64))?;
    if value.is_nil() {
        Ok(DynValue::Nil)
    } else {
        Ok(DynValue::tuple(vec![DynValue::Number(index as f64), value]))
    }
}

fn select(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let count = args.len().saturating_sub(1) as i64;
    if args.get(0).as_str() == Some("#") {
        return Ok(DynValue::Number(count as f64));
    }
    let n = args.check_integer(0, "select")?;
    let start = if n < 0 { count + n + 1 } else { n };
    if start < 1 {
        return Err(ScriptError::runtime("bad argument #1 to 'select' (index out of range)"));
    }
    Ok(DynValue::tuple(args.values().iter().skip(start as usize).cloned().collect()))
}

// ============================================================================
// Raw access
// ============================================================================

fn rawget(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "rawget")?;
    Ok(table.get(&args.get(1)))
}

fn rawset(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "rawset")?;
    table.set(args.get(1), args.get(2))?;
    Ok(DynValue::Table(table))
}

fn rawequal(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    Ok(DynValue::Boolean(args.get(0).raw_equals(&args.get(1))))
}

fn rawlen(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    match args.get(0) {
        DynValue::Table(t) => Ok(DynValue::Number(t.len() as f64)),
        DynValue::String(s) => Ok(DynValue::Number(s.len() as f64)),
        _ => Err(ScriptError::runtime("bad argument #1 to 'rawlen' (table or string expected)")),
    }
}

// ============================================================================
// Metatables
// ============================================================================

fn setmetatable(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "setmetatable")?;
    let metatable = match args.get(1) {
        DynValue::Nil => None,
        DynValue::Table(t) => Some(t),
        _ => {
            return Err(ScriptError::runtime(
                "bad argument #2 to 'setmetatable' (nil or table expected)",
            ))
        }
    };
    let protected = table
        .metatable()
        .is_some_and(|current| !current.get_str("__metatable").is_nil());
    if protected {
        return Err(ScriptError::runtime("cannot change a protected metatable"));
    }
    table.set_metatable(metatable);
    Ok(DynValue::Table(table))
}

fn getmetatable(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let value = args.check_value(0, "getmetatable")?;
    Ok(match ctx.get_metatable(&value) {
        Some(metatable) => {
            let shield = metatable.get_str("__metatable");
            if shield.is_nil() {
                DynValue::Table(metatable)
            } else {
                shield
            }
        }
        None => DynValue::Nil,
    })
}

// ============================================================================
// Errors
// ============================================================================

fn error(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let value = args.get(0);
    let level = args.opt_integer(1, "error", 1)?;
    let location = if level > 0 { ctx.current_location() } else { None };

    let err = match (&value, &location) {
        (DynValue::String(message), Some(loc)) => RuntimeError {
            message: message.to_string(),
            value: Some(DynValue::string(format!("{}: {}", loc, message))),
            location: location.clone(),
        },
        _ => RuntimeError::with_value(value),
    };
    Err(err.into())
}

fn assert(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    if args.get(0).is_truthy() {
        return Ok(DynValue::tuple(args.into_vec()));
    }
    match args.get(1) {
        DynValue::Nil => Err(ScriptError::runtime("assertion failed!")),
        message => Err(RuntimeError::with_value(message).into()),
    }
}

/// Result of a protected call as seen by the script. Cancellation is
/// never caught.
fn protect(result: ScriptResult<DynValue>) -> ScriptResult<Result<DynValue, DynValue>> {
    match result {
        Ok(values) => Ok(Ok(values)),
        Err(ScriptError::Cancelled) => Err(ScriptError::Cancelled),
        Err(e) => Ok(Err(e.error_value())),
    }
}

fn pcall(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let function = args.check_value(0, "pcall")?;
    Ok(match protect(ctx.call(&function, args.skip(1).into_vec()))? {
        Ok(values) => DynValue::tuple(vec![DynValue::Boolean(true), values]),
        Err(value) => DynValue::tuple(vec![DynValue::Boolean(false), value]),
    })
}

fn xpcall(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let function = args.check_value(0, "xpcall")?;
    let handler = args.check_function(1, "xpcall")?;
    Ok(match protect(ctx.call(&function, args.skip(2).into_vec()))? {
        Ok(values) => DynValue::tuple(vec![DynValue::Boolean(true), values]),
        Err(value) => {
            let handled = ctx.call(&handler, vec![value])?;
            DynValue::tuple(vec![DynValue::Boolean(false), handled])
        }
    })
}

// ============================================================================
// Loading and waiting
// ============================================================================

fn unpack(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let table = args.check_table(0, "unpack")?;
    unpack_range(&table, &args, "unpack")
}

/// Shared by `unpack` and `table.unpack`.
pub(super) fn unpack_range(table: &Table, args: &CallbackArguments, func: &str) -> ScriptResult<DynValue> {
    let first = args.opt_integer(1, func, 1)?;
    let last = args.opt_integer(2, func, table.len() as i64)?;
    if first > last {
        return Ok(DynValue::void());
    }
    if last - first >= MAX_UNPACK {
        return Err(ScriptError::runtime("too many results to unpack"));
    }
    let values: Vec<DynValue> = (first..=last).map(|i| table.get_int(i)).collect();
    Ok(DynValue::Tuple(values.into()))
}

pub(super) fn load(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let source = match args.get(0) {
        DynValue::String(s) => s.to_string(),
        piece_fn if piece_fn.is_callable() => {
            let mut source = String::new();
            loop {
                let piece = ctx.call(&piece_fn, Vec::new())?.to_scalar();
                match piece.to_concat_string() {
                    Some(text) if !text.is_empty() => source.push_str(&text),
                    _ => break,
                }
            }
            source
        }
        _ => return Err(ScriptError::runtime("bad argument #1 to 'load' (string expected)")),
    };
    let name = args.opt_string(1, "load", "load")?;
    let env = args.get(3).as_table().cloned();

    match ctx.load(&source, &name, env) {
        Ok(function) => Ok(function),
        Err(e) => Ok(DynValue::tuple(vec![DynValue::Nil, DynValue::string(e.to_string())])),
    }
}

/// `sleep(seconds)`: waits on the control token, so terminating the call
/// wakes the script immediately.
pub(super) fn sleep(ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let seconds = args.check_number(0, "sleep")?;
    if seconds.is_finite() && seconds > 0.0 {
        ctx.token().wait(Duration::from_secs_f64(seconds))?;
    } else {
        ctx.token().check()?;
    }
    Ok(DynValue::void())
}
