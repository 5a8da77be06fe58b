//! Test harness for end-to-end script execution
//!
//! Every helper runs its source in a fresh session and panics with the
//! source on mismatch.

use std::sync::Arc;

use lunaris_runtime::{DynValue, Script, ScriptError, ScriptResult};
use parking_lot::Mutex;

/// Run `source` in a fresh session.
pub fn run(source: &str) -> ScriptResult<DynValue> {
    Script::new().do_string(source)
}

/// Run `source` and return its results plus everything `print` wrote.
pub fn run_captured(source: &str) -> (ScriptResult<DynValue>, Vec<String>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let mut script = Script::new();
    let sink = Arc::clone(&lines);
    script.set_output(move |line| sink.lock().push(line.to_string()));
    let result = script.do_string(source);
    let lines = lines.lock().clone();
    (result, lines)
}

fn value_of(source: &str) -> DynValue {
    match run(source) {
        Ok(value) => value,
        Err(e) => panic!("Execution failed: {}\nSource:\n{}", e, source),
    }
}

pub fn expect_number(source: &str, expected: f64) {
    let value = value_of(source).to_scalar();
    let actual = value
        .as_number()
        .unwrap_or_else(|| panic!("Expected number result, got {:?}\nSource:\n{}", value, source));
    assert!(
        (actual - expected).abs() < 1e-9 || (actual.is_nan() && expected.is_nan()),
        "Expected {}, got {} for:\n{}",
        expected,
        actual,
        source
    );
}

pub fn expect_string(source: &str, expected: &str) {
    let value = value_of(source).to_scalar();
    match value.as_str() {
        Some(actual) => assert_eq!(actual, expected, "Wrong result for:\n{}", source),
        None => panic!("Expected string result, got {:?}\nSource:\n{}", value, source),
    }
}

pub fn expect_bool(source: &str, expected: bool) {
    let value = value_of(source).to_scalar();
    match value.as_bool() {
        Some(actual) => assert_eq!(actual, expected, "Wrong result for:\n{}", source),
        None => panic!("Expected boolean result, got {:?}\nSource:\n{}", value, source),
    }
}

pub fn expect_nil(source: &str) {
    let value = value_of(source);
    assert!(value.is_nil_or_void(), "Expected nil, got {:?}\nSource:\n{}", value, source);
}

/// Compare every returned value through its display form.
pub fn expect_values(source: &str, expected: &[&str]) {
    let values: Vec<String> = value_of(source)
        .into_values()
        .iter()
        .map(DynValue::to_display_string)
        .collect();
    assert_eq!(values, expected, "Wrong results for:\n{}", source);
}

pub fn expect_output(source: &str, expected: &[&str]) {
    let (result, lines) = run_captured(source);
    if let Err(e) = result {
        panic!("Execution failed: {}\nSource:\n{}", e, source);
    }
    assert_eq!(lines, expected, "Wrong output for:\n{}", source);
}

pub fn expect_syntax_error(source: &str, error_pattern: &str) {
    match run(source) {
        Err(ScriptError::Syntax(e)) => {
            let message = e.to_string();
            assert!(
                message.contains(error_pattern),
                "Expected syntax error containing '{}', got: {}\nSource:\n{}",
                error_pattern,
                message,
                source
            );
        }
        Err(e) => panic!("Expected syntax error, got: {}\nSource:\n{}", e, source),
        Ok(value) => panic!(
            "Expected syntax error containing '{}', but got {:?}\nSource:\n{}",
            error_pattern, value, source
        ),
    }
}

pub fn expect_runtime_error(source: &str, error_pattern: &str) {
    match run(source) {
        Err(ScriptError::Runtime(e)) => {
            let message = e.to_string();
            assert!(
                message.contains(error_pattern),
                "Expected runtime error containing '{}', got: {}\nSource:\n{}",
                error_pattern,
                message,
                source
            );
        }
        Err(e) => panic!("Expected runtime error, got: {}\nSource:\n{}", e, source),
        Ok(value) => panic!(
            "Expected runtime error containing '{}', but got {:?}\nSource:\n{}",
            error_pattern, value, source
        ),
    }
}
