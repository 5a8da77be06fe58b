//! Lunaris VM runtime
//!
//! This module provides everything needed to run compiled chunks:
//! - Dynamic values and tables
//! - Closures and host callbacks
//! - The processor (bytecode interpreter) and coroutines
//! - Execution control tokens for cooperative cancellation
//! - Interop descriptors exposing host objects as userdata

pub mod callback;
pub mod closure;
pub mod context;
pub mod coroutine;
pub mod execution_control;
pub mod interop;
pub mod processor;
pub mod state;
pub mod table;
pub mod value;

pub use callback::{CallbackArguments, CallbackFunction};
pub use closure::Closure;
pub use context::ExecutionContext;
pub use coroutine::{Coroutine, CoroutineStatus};
pub use execution_control::ExecutionControlToken;
pub use processor::Processor;
pub use state::{CodeSegment, EngineOptions, ScriptState, ZeroStepPolicy};
pub use table::Table;
pub use value::{format_number, parse_number, DataType, DynValue};
