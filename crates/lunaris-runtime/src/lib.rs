//! Lunaris Runtime
//!
//! Embedding layer over `lunaris-engine`:
//! - **Script**: the session façade (compile, run, call, coroutines, modules)
//! - **Core library**: `print`, `pcall`, `coroutine.*`, `string.*`, `table.*`, `math.*`
//! - **Loaders**: pluggable module resolution for `require`
//! - **Options**: `lunaris.toml` configuration
//! - **Async**: tokio wrappers and a pool of independent sessions
//! - **Shared variables**: a lock-guarded map visible from several sessions
//!
//! # Example
//!
//! ```rust,ignore
//! use lunaris_runtime::Script;
//!
//! let mut script = Script::new();
//! let value = script.do_string("return 2 + 2")?;
//! assert_eq!(value.as_number(), Some(4.0));
//! ```

#![warn(rust_2018_idioms)]

mod async_ext;
mod corelib;
pub mod error;
pub mod loader;
pub mod options;
mod platform;
mod script;
mod shared;

pub use async_ext::{call_async, do_string_async, share, ScriptPool, SharedScript};
pub use error::ConfigError;
pub use loader::{FileSystemScriptLoader, InMemoryScriptLoader, ScriptLoader};
pub use options::{CoreModules, ScriptOptions, ZeroStep};
pub use platform::OutputSink;
pub use script::Script;
pub use shared::SharedVariables;

pub use lunaris_engine::{
    DataType, DynValue, ExecutionControlToken, RuntimeError, ScriptError, ScriptResult, SyntaxError,
    Table,
};
