//! Subcommand implementations.

pub mod check;
pub mod disasm;
pub mod eval;
pub mod repl;
pub mod run;

use std::path::Path;

use anyhow::Context;
use lunaris_runtime::{DynValue, Script, ScriptOptions};

/// A session configured from `config`, or with default options.
pub fn open_session(config: Option<&Path>) -> anyhow::Result<Script> {
    let options = match config {
        Some(path) => ScriptOptions::from_file(path)
            .with_context(|| format!("cannot load configuration {}", path.display()))?,
        None => ScriptOptions::default(),
    };
    Ok(Script::with_options(options)?)
}

/// Tab-separated display form of every returned value.
pub fn format_results(script: &mut Script, value: DynValue) -> anyhow::Result<Option<String>> {
    if value.is_void() {
        return Ok(None);
    }
    let tostring = script.get_global("tostring");
    let mut parts = Vec::new();
    for item in value.into_values() {
        let text = if tostring.is_callable() {
            script.call(&tostring, vec![item])?.to_scalar().to_display_string()
        } else {
            item.to_display_string()
        };
        parts.push(text);
    }
    Ok(Some(parts.join("\t")))
}
