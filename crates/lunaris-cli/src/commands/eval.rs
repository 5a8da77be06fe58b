//! `lunaris eval`: run an inline chunk and print what it returns.

use lunaris_runtime::Script;

pub fn execute(code: &str) -> anyhow::Result<()> {
    let mut script = Script::new();
    let value = script.do_string(code)?;
    if let Some(text) = super::format_results(&mut script, value)? {
        println!("{}", text);
    }
    Ok(())
}
