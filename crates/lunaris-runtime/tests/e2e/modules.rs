//! `require`, module loaders and file loading

use std::sync::Arc;

use lunaris_runtime::{DynValue, InMemoryScriptLoader, Script, ScriptError, Table};

fn script_with(loader: InMemoryScriptLoader) -> Script {
    let script = Script::new();
    script.set_loader(Arc::new(loader));
    script
}

// ============================================================================
// In-memory loader
// ============================================================================

#[test]
fn test_require_returns_module_table() {
    let loader = InMemoryScriptLoader::new().with_module(
        "greeter",
        "local M = {}
         function M.greet(name) return 'hello, ' .. name end
         return M",
    );
    let mut script = script_with(loader);
    let result = script
        .do_string("local g = require('greeter') return g.greet('lua')")
        .unwrap();
    assert_eq!(result.to_scalar().as_str(), Some("hello, lua"));
}

#[test]
fn test_require_runs_module_once() {
    let loader = InMemoryScriptLoader::new().with_module(
        "counter",
        "loads = (loads or 0) + 1
         return { id = loads }",
    );
    let mut script = script_with(loader);
    let result = script
        .do_string(
            "local a = require('counter')
             local b = require('counter')
             return loads, rawequal(a, b), package.loaded.counter == a",
        )
        .unwrap();
    let values: Vec<String> = result.into_values().iter().map(DynValue::to_display_string).collect();
    assert_eq!(values, vec!["1", "true", "true"]);
}

#[test]
fn test_module_without_result_caches_true() {
    let loader = InMemoryScriptLoader::new().with_module("side_effect", "touched = true");
    let mut script = script_with(loader);
    let result = script.do_string("return require('side_effect'), touched").unwrap();
    assert_eq!(result.into_values(), vec![DynValue::Boolean(true), DynValue::Boolean(true)]);
}

#[test]
fn test_module_receives_its_name() {
    let loader = InMemoryScriptLoader::new().with_module("named", "local name = ... return name");
    let mut script = script_with(loader);
    let result = script.do_string("return require('named')").unwrap();
    assert_eq!(result.to_scalar().as_str(), Some("named"));
}

#[test]
fn test_dotted_names_resolve_through_templates() {
    let loader = InMemoryScriptLoader::new().with_module("lib/util.lua", "return 'util'");
    let mut script = script_with(loader);
    script.set_module_paths(vec!["lib/?.lua".to_string()]);
    let result = script.do_string("return require('lib.util')").unwrap();
    assert_eq!(result.to_scalar().as_str(), Some("util"));
}

#[test]
fn test_missing_module_lists_candidates() {
    let mut script = script_with(InMemoryScriptLoader::new());
    script.set_module_paths(vec!["?.lua".to_string(), "mods/?.lua".to_string()]);
    let err = script.do_string("require('nope')").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("module 'nope' not found:"), "{}", message);
    assert!(message.contains("no file 'nope.lua'"), "{}", message);
    assert!(message.contains("no file 'mods/nope.lua'"), "{}", message);
}

#[test]
fn test_module_errors_name_the_module() {
    let loader = InMemoryScriptLoader::new().with_module("broken", "local x = nil\nreturn x.field");
    let mut script = script_with(loader);
    let err = script.do_string("require('broken')").unwrap_err();
    assert!(err.to_string().starts_with("broken:2:"), "{}", err);
}

#[test]
fn test_require_module_with_environment() {
    let loader = InMemoryScriptLoader::new().with_module("envmod", "return value * 2");
    let mut script = script_with(loader);
    let env = Table::new();
    env.set_str("value", DynValue::Number(21.0));

    let chunk = script.require_module("envmod", Some(env)).unwrap();
    let result = script.call(&chunk, Vec::new()).unwrap();
    assert_eq!(result.to_scalar().as_number(), Some(42.0));

    // Compiling through the host does not populate the cache
    let cached = script.do_string("return package.loaded.envmod").unwrap();
    assert!(cached.to_scalar().is_nil());
}

#[test]
fn test_sandboxed_session_has_no_require() {
    let mut script = Script::with_options(lunaris_runtime::ScriptOptions {
        core_modules: lunaris_runtime::CoreModules::sandboxed(),
        ..Default::default()
    })
    .unwrap();
    let result = script
        .do_string("return require == nil, load == nil, sleep == nil, print ~= nil")
        .unwrap();
    assert!(result.into_values().iter().all(|v| v == &DynValue::Boolean(true)));
}

// ============================================================================
// File-system loader
// ============================================================================

#[test]
fn test_require_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("shapes")).unwrap();
    std::fs::write(
        dir.path().join("shapes").join("square.lua"),
        "return { area = function(s) return s * s end }",
    )
    .unwrap();

    let mut script = Script::new();
    let template = dir.path().join("?.lua").to_string_lossy().into_owned();
    script.set_module_paths(vec![template]);
    let result = script
        .do_string("return require('shapes.square').area(7)")
        .unwrap();
    assert_eq!(result.to_scalar().as_number(), Some(49.0));
}

#[test]
fn test_do_file_and_chunk_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.lua");
    std::fs::write(&path, "#!/usr/bin/env lunaris\nlocal a = 40\nreturn a + 2").unwrap();

    let mut script = Script::new();
    assert_eq!(script.do_file(&path).unwrap().to_scalar().as_number(), Some(42.0));

    std::fs::write(&path, "\n\nerror('bad line')").unwrap();
    let err = script.do_file(&path).unwrap_err();
    let expected = format!("{}:3: bad line", path.to_string_lossy());
    assert_eq!(err.to_string(), expected);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut script = Script::new();
    let err = script.do_file(dir.path().join("absent.lua")).unwrap_err();
    assert!(matches!(err, ScriptError::Io(_)), "{:?}", err);
}

#[test]
fn test_do_stream() {
    let mut script = Script::new();
    let source = "return ('stream'):upper()".as_bytes();
    let result = script.do_stream(source).unwrap();
    assert_eq!(result.to_scalar().as_str(), Some("STREAM"));
}
