//! Error types for compilation and execution.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::vm::DynValue;

/// A position inside a named chunk of source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// Chunk name the position belongs to
    pub chunk: Arc<str>,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl SourceRef {
    pub fn new(chunk: Arc<str>, line: u32, column: u32) -> Self {
        Self {
            chunk,
            line,
            column,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chunk, self.line)
    }
}

/// Errors raised while lexing, parsing or compiling a chunk.
///
/// A chunk that failed to compile never produces a closure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", with_location(.location, .message))]
pub struct SyntaxError {
    pub message: String,
    pub location: Option<SourceRef>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, location: Option<SourceRef>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// Errors raised while executing bytecode or host callbacks.
#[derive(Debug, Clone, Error)]
#[error("{}", with_location(.location, .message))]
pub struct RuntimeError {
    pub message: String,
    /// Value thrown by `error(v)`; `None` for errors raised by the VM itself
    pub value: Option<DynValue>,
    pub location: Option<SourceRef>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            value: None,
            location: None,
        }
    }

    /// An error carrying an arbitrary script value.
    pub fn with_value(value: DynValue) -> Self {
        let message = match &value {
            DynValue::String(s) => s.to_string(),
            other => format!("(error object is a {} value)", other.type_name()),
        };
        Self {
            message,
            value: Some(value),
            location: None,
        }
    }

    /// Attach a location unless one is already known.
    pub fn located(mut self, location: Option<&SourceRef>) -> Self {
        if self.location.is_none() {
            self.location = location.cloned();
        }
        self
    }

    /// The value a protected call hands back to the script.
    pub fn error_value(&self) -> DynValue {
        match &self.value {
            Some(v) => v.clone(),
            None => DynValue::string(self.to_string()),
        }
    }
}

/// Any error surfaced by the engine.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The execution control token of the call was terminated
    #[error("execution cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    /// Shorthand for a located-later runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::Runtime(RuntimeError::new(message))
    }

    pub fn syntax(message: impl Into<String>, location: Option<SourceRef>) -> Self {
        ScriptError::Syntax(SyntaxError::new(message, location))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScriptError::Cancelled)
    }

    /// The value a protected call observes for this error.
    pub fn error_value(&self) -> DynValue {
        match self {
            ScriptError::Runtime(e) => e.error_value(),
            other => DynValue::string(other.to_string()),
        }
    }

    pub(crate) fn located(self, location: Option<&SourceRef>) -> Self {
        match self {
            ScriptError::Runtime(e) => ScriptError::Runtime(e.located(location)),
            other => other,
        }
    }
}

/// Result alias used throughout the engine.
pub type ScriptResult<T> = Result<T, ScriptError>;

fn with_location(location: &Option<SourceRef>, message: &str) -> String {
    match location {
        Some(loc) => format!("{}: {}", loc, message),
        None => message.to_string(),
    }
}
