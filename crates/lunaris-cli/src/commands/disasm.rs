//! `lunaris disasm`: print the bytecode listing of a script.

use std::path::Path;

use lunaris_runtime::Script;

pub fn execute(file: &Path) -> anyhow::Result<()> {
    let mut script = Script::new();
    let state = script.state().clone();
    let start = state.code_len();
    script.load_file(file, None, None)?;
    print!("{}", state.disassemble(start, state.code_len()));
    Ok(())
}
