//! `require` and the `package.loaded` cache

use std::sync::Arc;

use lunaris_engine::{DynValue, ScriptError, ScriptResult, ScriptState, Table};

use crate::platform::Platform;

pub(super) fn install(globals: &Table, platform: &Arc<Platform>) {
    let package = Table::new();
    package.set_str("loaded", DynValue::Table(Table::new()));
    package.set_str(
        "path",
        DynValue::string(platform.module_paths().join(";")),
    );
    globals.set_str("package", DynValue::Table(package));

    let platform = platform.clone();
    super::register(globals, "require", move |ctx, args| {
        let name = args.check_string(0, "require")?;
        let loaded = loaded_table(&ctx.globals())?;

        let cached = loaded.get_str(&name);
        if !cached.is_nil() {
            return Ok(cached);
        }

        let chunk = load_module(&platform, ctx.state(), &name, None)?;
        let result = ctx.call(&chunk, vec![DynValue::string(&name)])?.to_scalar();
        let result = if result.is_nil() { DynValue::Boolean(true) } else { result };
        loaded.set_str(&name, result.clone());
        Ok(result)
    });
}

fn loaded_table(globals: &Table) -> ScriptResult<Table> {
    globals
        .get_str("package")
        .as_table()
        .map(|package| package.get_str("loaded"))
        .and_then(|loaded| loaded.as_table().cloned())
        .ok_or_else(|| ScriptError::runtime("'package.loaded' must be a table"))
}

/// Resolve `name` through the platform loader and compile it without running.
pub(crate) fn load_module(
    platform: &Platform,
    state: &Arc<ScriptState>,
    name: &str,
    env: Option<Table>,
) -> ScriptResult<DynValue> {
    let loader = platform.loader();
    let paths = platform.module_paths();
    let path = loader.resolve_module_name(name, &paths).ok_or_else(|| {
        let tried: Vec<String> = crate::loader::module_candidates(name, &paths)
            .into_iter()
            .map(|candidate| format!("\n\tno file '{}'", candidate))
            .collect();
        ScriptError::runtime(format!("module '{}' not found:{}", name, tried.concat()))
    })?;

    log::debug!("loading module '{}' from {}", name, path);
    let source = loader.load_source(&path)?;
    Ok(state.load_chunk(&source, &path, env)?)
}
