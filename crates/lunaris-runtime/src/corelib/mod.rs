//! Core library installed into every script's globals
//!
//! Each submodule fills a table (or the globals directly for `basic`).
//! Which parts are installed is decided by [`CoreModules`].

use std::sync::Arc;

use lunaris_engine::{CallbackArguments, DataType, DynValue, ExecutionContext, ScriptResult, ScriptState, Table};

use crate::options::CoreModules;
use crate::platform::Platform;

mod basic;
mod coroutine;
mod math;
mod package;
mod pattern;
mod string;
mod table;

pub(crate) use package::load_module;

/// Install the enabled core modules into the globals of `state`.
pub(crate) fn install(state: &Arc<ScriptState>, modules: &CoreModules, platform: &Arc<Platform>) -> ScriptResult<()> {
    let globals = state.globals();
    globals.set_str("_G", DynValue::Table(globals.clone()));
    globals.set_str("_VERSION", DynValue::from("Lua 5.2"));

    if modules.basic {
        basic::install(&globals, platform);
    }
    if modules.sleep {
        register(&globals, "sleep", basic::sleep);
    }
    if modules.load {
        register(&globals, "load", basic::load);
        package::install(&globals, platform);
    }
    if modules.coroutine {
        globals.set_str("coroutine", DynValue::Table(coroutine::library()));
    }
    if modules.string {
        let library = string::library();
        let metatable = Table::new();
        metatable.set_str("__index", DynValue::Table(library.clone()));
        state.set_type_metatable(DataType::String, Some(metatable))?;
        globals.set_str("string", DynValue::Table(library));
    }
    if modules.table {
        globals.set_str("table", DynValue::Table(table::library()));
    }
    if modules.math {
        globals.set_str("math", DynValue::Table(math::library(platform)));
    }

    log::debug!("core library installed ({:?})", modules);
    Ok(())
}

/// Store a plain function under `name`.
fn register<F>(table: &Table, name: &str, func: F)
where
    F: Fn(&mut ExecutionContext<'_>, CallbackArguments) -> ScriptResult<DynValue> + Send + Sync + 'static,
{
    table.set_str(name, DynValue::callback(name, func));
}

/// Lua string positions (1-based, negative from the end) to a byte range.
fn byte_range(len: usize, start: i64, end: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = match start {
        s if s < 0 => (len + s + 1).max(1),
        0 => 1,
        s => s,
    };
    let end = match end {
        e if e < 0 => len + e + 1,
        e if e > len => len,
        e => e,
    };
    if start > end {
        None
    } else {
        Some(((start - 1) as usize, end as usize))
    }
}

fn lossy(bytes: &[u8]) -> DynValue {
    DynValue::string(String::from_utf8_lossy(bytes))
}
