//! `lunaris repl`: interactive session.
//!
//! Globals persist across inputs. A line that is a bare expression is
//! evaluated as `return <line>`; input that ends mid-statement continues on
//! the next line.

use std::path::Path;

use lunaris_runtime::{Script, ScriptError};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use termcolor::ColorChoice;

use crate::output::StyledOutput;

const PROMPT: &str = "> ";
const CONTINUATION_PROMPT: &str = ">> ";

pub fn execute(config: Option<&Path>, choice: ColorChoice) -> anyhow::Result<()> {
    let mut script = super::open_session(config)?;
    let mut out = StyledOutput::new(choice);
    let mut editor = DefaultEditor::new()?;

    let history_path = dirs::home_dir().map(|h| h.join(".lunaris").join("repl_history"));
    if let Some(ref path) = history_path {
        let _ = editor.load_history(path);
    }

    println!("Lunaris v{} (Lua 5.2)", env!("CARGO_PKG_VERSION"));
    println!("Type .help for help, .exit to quit\n");

    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { PROMPT } else { CONTINUATION_PROMPT };

        match editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if buffer.is_empty() && trimmed.is_empty() {
                    continue;
                }

                if buffer.is_empty() && trimmed.starts_with('.') {
                    let _ = editor.add_history_entry(trimmed);
                    if handle_command(trimmed, &mut script, &mut out) {
                        break;
                    }
                    continue;
                }

                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                match evaluate(&mut script, &buffer) {
                    Outcome::Incomplete => continue,
                    Outcome::Done(result) => {
                        let _ = editor.add_history_entry(buffer.as_str());
                        buffer.clear();
                        match result {
                            Ok(Some(text)) => out.value(&text),
                            Ok(None) => {}
                            Err(message) => out.stderr_error(&message),
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                if !buffer.is_empty() {
                    buffer.clear();
                    println!();
                } else {
                    println!("\n(To exit, press Ctrl+D or type .exit)");
                }
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                out.stderr_error(&e.to_string());
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.save_history(path);
    }
    Ok(())
}

enum Outcome {
    Incomplete,
    Done(Result<Option<String>, String>),
}

/// Compile `source` as an expression first, then as a statement block.
fn evaluate(script: &mut Script, source: &str) -> Outcome {
    let chunk = match script.load_string(&format!("return {}", source), None, Some("stdin")) {
        Ok(chunk) => chunk,
        Err(_) => match script.load_string(source, None, Some("stdin")) {
            Ok(chunk) => chunk,
            Err(ScriptError::Syntax(e)) if is_incomplete(&e.message) => return Outcome::Incomplete,
            Err(e) => return Outcome::Done(Err(e.to_string())),
        },
    };
    let result = script
        .call(&chunk, Vec::new())
        .map_err(anyhow::Error::from)
        .and_then(|value| super::format_results(script, value))
        .map_err(|e| e.to_string());
    Outcome::Done(result)
}

/// Syntax errors raised at the end of the input mean more lines are coming.
fn is_incomplete(message: &str) -> bool {
    message.ends_with("near '<eof>'") || message.starts_with("unfinished")
}

/// Handle a `.command`. Returns true if the REPL should exit.
fn handle_command(cmd: &str, script: &mut Script, out: &mut StyledOutput) -> bool {
    let (name, arg) = match cmd.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (cmd, ""),
    };
    match name {
        ".exit" | ".quit" => return true,
        ".help" => {
            println!("Commands:");
            println!("  .help           Show this help");
            println!("  .reset          Discard all globals and compiled code");
            println!("  .load <file>    Run a script file in this session");
            println!("  .exit           Exit the REPL (also Ctrl-D)");
        }
        ".reset" => match script.reset() {
            Ok(()) => println!("Session reset."),
            Err(e) => out.stderr_error(&e.to_string()),
        },
        ".load" if arg.is_empty() => out.stderr_error("Usage: .load <file.lua>"),
        ".load" => match script.do_file(arg) {
            Ok(_) => println!("Loaded: {}", arg),
            Err(e) => out.stderr_error(&e.to_string()),
        },
        _ => out.stderr_error(&format!("Unknown command: {} (try .help)", cmd)),
    }
    false
}
