//! Lunaris Engine
//!
//! This crate provides the complete Lua language implementation used by Lunaris:
//! - **Parser**: Lexer, scope resolver and AST (`parser` module)
//! - **Compiler**: Bytecode generation with jump patching (`compiler` module)
//! - **VM**: Values, tables, closures, the processor, coroutines and host interop (`vm` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use lunaris_engine::{ScriptState, Processor};
//!
//! let state = ScriptState::new(Default::default());
//! let chunk = state.load_chunk("return 2 + 2", "example", None)?;
//! let mut processor = Processor::new(state);
//! let result = processor.call(&chunk, Vec::new())?;
//! assert_eq!(result.as_number(), Some(4.0));
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]

// ============================================================================
// Core Modules
// ============================================================================

/// Error types shared by every stage
pub mod error;

/// Parser module: Lexer, scope resolver and AST
pub mod parser;

/// Compiler module: Bytecode and code generation
pub mod compiler;

/// VM module: Runtime values, processor, coroutines and interop
pub mod vm;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{RuntimeError, ScriptError, ScriptResult, SourceRef, SyntaxError};

pub use parser::{parse_chunk, parse_function, SymbolRef};

pub use compiler::{compile_chunk, ByteCode, Instruction, OpCode};

pub use vm::{
    CallbackArguments, CallbackFunction, Closure, CodeSegment, Coroutine, CoroutineStatus,
    DataType, DynValue, EngineOptions, ExecutionContext, ExecutionControlToken, Processor,
    ScriptState, Table, ZeroStepPolicy,
};

pub use vm::interop::{
    CompositeUserDataDescriptor, DescriptorBuilder, EnumStorage, EnumUserDataDescriptor,
    FromDynValue, HostEvent, ProxyUserDataDescriptor, StandardUserDataDescriptor,
    ToDynValue, UserData, UserDataDescriptor, UserDataRegistry,
};
