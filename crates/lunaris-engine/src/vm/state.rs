//! State shared by every processor of one script session
//!
//! The code store, the globals, the registry and the per-type metatables
//! live here. Processors (the main one and one per coroutine) hold an
//! `Arc<ScriptState>` and never own code or globals themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::compiler::bytecode::listing;
use crate::compiler::{compile_chunk, ByteCode, Instruction};
use crate::error::{ScriptError, ScriptResult, SourceRef, SyntaxError};
use crate::parser::{parse_chunk, parse_function};
use crate::vm::closure::{new_cell, Closure};
use crate::vm::table::Table;
use crate::vm::value::{DataType, DynValue};

/// What a numeric `for` does when its step evaluates to zero at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroStepPolicy {
    /// Raise `'for' step is zero`
    #[default]
    Error,
    /// Run the loop; it ends only through `break`, `goto` or cancellation
    Allow,
}

/// Limits and policies of the processor.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum number of script call frames ("stack overflow")
    pub max_call_depth: usize,
    /// Maximum nesting of host callbacks that call back into scripts
    pub max_host_reentrancy: usize,
    pub zero_step: ZeroStepPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 4096,
            max_host_reentrancy: 128,
            zero_step: ZeroStepPolicy::Error,
        }
    }
}

/// Instructions of one compiled chunk, addressed by code-store offset.
///
/// Segments are immutable once published, so processors execute straight
/// out of a shared `Arc<CodeSegment>`.
#[derive(Debug)]
pub struct CodeSegment {
    base: usize,
    code: Box<[Instruction]>,
}

impl CodeSegment {
    fn new(bytecode: ByteCode) -> Self {
        Self {
            base: bytecode.base(),
            code: bytecode.into_instructions().into_boxed_slice(),
        }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Offset one past the last instruction
    pub fn end(&self) -> usize {
        self.base + self.code.len()
    }

    pub fn contains(&self, ip: usize) -> bool {
        ip >= self.base && ip < self.end()
    }

    #[inline]
    pub fn get(&self, ip: usize) -> Option<&Instruction> {
        ip.checked_sub(self.base).and_then(|i| self.code.get(i))
    }

    fn iter(&self) -> impl Iterator<Item = (usize, &Instruction)> {
        self.code
            .iter()
            .enumerate()
            .map(move |(i, instruction)| (self.base + i, instruction))
    }
}

/// Append-only list of segments; offsets never move.
#[derive(Debug, Default)]
struct CodeStore {
    segments: Vec<Arc<CodeSegment>>,
    len: usize,
}

impl CodeStore {
    fn segment_at(&self, ip: usize) -> Option<&Arc<CodeSegment>> {
        let index = self.segments.partition_point(|s| s.base() <= ip);
        index
            .checked_sub(1)
            .and_then(|i| self.segments.get(i))
            .filter(|s| s.contains(ip))
    }
}

/// Shared state of a script session
pub struct ScriptState {
    code: RwLock<CodeStore>,
    globals: RwLock<Table>,
    registry: Table,
    type_metatables: RwLock<FxHashMap<DataType, Table>>,
    /// Bumped by `reset`; closures from older generations refuse to run
    generation: AtomicU64,
    options: EngineOptions,
}

impl ScriptState {
    pub fn new(options: EngineOptions) -> Arc<Self> {
        Arc::new(Self {
            code: RwLock::new(CodeStore::default()),
            globals: RwLock::new(Table::new()),
            registry: Table::new(),
            type_metatables: RwLock::new(FxHashMap::default()),
            generation: AtomicU64::new(0),
            options,
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn globals(&self) -> Table {
        self.globals.read().clone()
    }

    /// Table reserved for host bookkeeping; never reachable from scripts.
    pub fn registry(&self) -> &Table {
        &self.registry
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Compile a chunk and close it over `env` (the globals by default).
    pub fn load_chunk(&self, source: &str, name: &str, env: Option<Table>) -> Result<DynValue, SyntaxError> {
        let chunk = parse_chunk(source, name)?;
        self.finish_load(&chunk, env)
    }

    /// Compile `function (...) ... end` source into a chunk returning that function.
    pub fn load_function_chunk(&self, source: &str, name: &str, env: Option<Table>) -> Result<DynValue, SyntaxError> {
        let chunk = parse_function(source, name)?;
        self.finish_load(&chunk, env)
    }

    fn finish_load(&self, chunk: &crate::parser::ChunkStatement, env: Option<Table>) -> Result<DynValue, SyntaxError> {
        let entry = {
            let mut store = self.code.write();
            let mut bytecode = ByteCode::starting_at(store.len);
            let entry = compile_chunk(&mut bytecode, chunk)?;
            let segment = CodeSegment::new(bytecode);
            log::debug!(
                "compiled chunk '{}' ({} instructions)",
                chunk.name,
                segment.end() - segment.base()
            );
            store.len = segment.end();
            store.segments.push(Arc::new(segment));
            entry
        };
        let env = env.unwrap_or_else(|| self.globals());
        let closure = Closure::new(
            entry,
            vec![new_cell(DynValue::Table(env))],
            self.generation(),
            Some(chunk.name.clone()),
        );
        Ok(DynValue::Function(Arc::new(closure)))
    }

    /// The segment holding offset `ip`.
    pub fn segment_at(&self, ip: usize) -> Option<Arc<CodeSegment>> {
        self.code.read().segment_at(ip).cloned()
    }

    /// Source position of the instruction at `ip`.
    pub fn source_at(&self, ip: usize) -> Option<SourceRef> {
        self.code
            .read()
            .segment_at(ip)
            .and_then(|s| s.get(ip))
            .and_then(|i| i.source.clone())
    }

    pub fn code_len(&self) -> usize {
        self.code.read().len
    }

    /// Listing of the code store between two offsets.
    pub fn disassemble(&self, from: usize, to: usize) -> String {
        let store = self.code.read();
        listing(
            store
                .segments
                .iter()
                .filter(|s| s.end() > from && s.base() < to)
                .flat_map(|s| s.iter())
                .filter(|(offset, _)| *offset >= from && *offset < to),
        )
    }

    // ========================================================================
    // Type metatables
    // ========================================================================

    pub fn type_metatable(&self, data_type: DataType) -> Option<Table> {
        self.type_metatables.read().get(&data_type).cloned()
    }

    /// Attach a metatable to every value of a type. Tables and userdata
    /// carry their own metatables and cannot be targeted.
    pub fn set_type_metatable(&self, data_type: DataType, metatable: Option<Table>) -> ScriptResult<()> {
        if matches!(data_type, DataType::Table | DataType::UserData) {
            return Err(ScriptError::runtime(format!(
                "cannot set a type metatable for {} values",
                data_type.lua_name()
            )));
        }
        let mut tables = self.type_metatables.write();
        match metatable {
            Some(t) => {
                tables.insert(data_type, t);
            }
            None => {
                tables.remove(&data_type);
            }
        }
        Ok(())
    }

    /// Metatable governing `value`, userdata excluded (descriptors answer for those).
    pub fn metatable_of(&self, value: &DynValue) -> Option<Table> {
        match value {
            DynValue::Table(t) => t.metatable(),
            DynValue::UserData(_) => None,
            DynValue::Tuple(values) => values.first().and_then(|v| self.metatable_of(v)),
            other => self.type_metatable(other.data_type()),
        }
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Discard all compiled code and start over with empty globals.
    ///
    /// Closures compiled before the reset stay alive as values but fail
    /// when called.
    pub fn reset(&self) {
        *self.code.write() = CodeStore::default();
        *self.globals.write() = Table::new();
        self.type_metatables.write().clear();
        self.registry.clear();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("script state reset (generation {})", generation);
    }
}

impl std::fmt::Debug for ScriptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptState")
            .field("code_len", &self.code_len())
            .field("generation", &self.generation())
            .finish()
    }
}
