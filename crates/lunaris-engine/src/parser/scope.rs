//! Lexical scope resolution
//!
//! Tracks function frames and blocks while the parser walks the source,
//! binding every name to a stack slot, an upvalue capture or a global lookup
//! through the `_ENV` upvalue of the chunk.

use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Name of the environment upvalue every chunk is closed over.
pub const ENV_NAME: &str = "_ENV";

/// Name of the hidden local holding a function's variadic arguments.
pub const VARARGS_NAME: &str = "...";

/// Maximum number of locals a single function may declare.
pub const MAX_LOCALS: usize = 200;

/// A resolved reference to a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolRef {
    /// Stack slot of the current function frame
    Local { name: Arc<str>, index: usize },
    /// Captured cell of the current closure
    Upvalue { name: Arc<str>, index: usize },
    /// Field of the environment table reached through `env`
    Global { name: Arc<str>, env: Box<SymbolRef> },
    /// Jump target declared with `::name::`
    Label { name: Arc<str>, slot_mark: usize },
}

impl SymbolRef {
    pub fn name(&self) -> &str {
        match self {
            SymbolRef::Local { name, .. }
            | SymbolRef::Upvalue { name, .. }
            | SymbolRef::Global { name, .. }
            | SymbolRef::Label { name, .. } => name,
        }
    }

    /// Slot or capture index for locals and upvalues.
    pub fn index(&self) -> Option<usize> {
        match self {
            SymbolRef::Local { index, .. } | SymbolRef::Upvalue { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Human readable kind used in error messages ("local 'x'").
    pub fn describe(&self) -> String {
        match self {
            SymbolRef::Local { name, .. } => format!("local '{}'", name),
            SymbolRef::Upvalue { name, .. } => format!("upvalue '{}'", name),
            SymbolRef::Global { name, .. } => format!("global '{}'", name),
            SymbolRef::Label { name, .. } => format!("label '{}'", name),
        }
    }
}

/// Slot range owned by a lexical block, nested blocks included.
///
/// Slots are never reused inside a frame, so `from..to` covers every local the
/// block or its children declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeScopeBlock {
    pub from: usize,
    pub to: usize,
}

impl RuntimeScopeBlock {
    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }
}

/// Shape of a function's activation record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeScopeFrame {
    /// Number of local slots to allocate on entry
    pub slots: usize,
    /// Captures, expressed in the enclosing function's terms
    pub upvalues: Vec<SymbolRef>,
}

#[derive(Debug, Default)]
struct BlockScope {
    first_slot: usize,
    locals: FxHashMap<Arc<str>, usize>,
    labels: Vec<Arc<str>>,
    is_loop: bool,
    /// Named locals declared directly in this block
    declared: usize,
}

#[derive(Debug, Default)]
struct FunctionScope {
    blocks: Vec<BlockScope>,
    upvalues: Vec<(Arc<str>, SymbolRef)>,
    next_slot: usize,
    /// Named locals currently in scope
    active: usize,
}

impl FunctionScope {
    fn find_local(&self, name: &str) -> Option<usize> {
        self.blocks
            .iter()
            .rev()
            .find_map(|block| block.locals.get(name).copied())
    }

    fn find_upvalue(&self, name: &str) -> Option<usize> {
        self.upvalues.iter().position(|(n, _)| &**n == name)
    }
}

/// Scope stack used while building the AST.
#[derive(Debug, Default)]
pub struct BuildTimeScope {
    functions: Vec<FunctionScope>,
}

impl BuildTimeScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the frame of a chunk: a variadic function closed over `_ENV`.
    pub fn push_chunk(&mut self) {
        let mut chunk = FunctionScope::default();
        chunk.upvalues.push((
            Arc::from(ENV_NAME),
            SymbolRef::Upvalue {
                name: Arc::from(ENV_NAME),
                index: 0,
            },
        ));
        chunk.blocks.push(BlockScope::default());
        self.functions.push(chunk);
    }

    pub fn push_function(&mut self) {
        let mut function = FunctionScope::default();
        function.blocks.push(BlockScope::default());
        self.functions.push(function);
    }

    /// Close the current function and describe its frame.
    pub fn pop_function(&mut self) -> RuntimeScopeFrame {
        let function = self.functions.pop().unwrap_or_default();
        RuntimeScopeFrame {
            slots: function.next_slot,
            upvalues: function.upvalues.into_iter().map(|(_, r)| r).collect(),
        }
    }

    pub fn push_block(&mut self) {
        self.push_block_kind(false);
    }

    /// Open a block that `break` may exit.
    pub fn push_loop_block(&mut self) {
        self.push_block_kind(true);
    }

    fn push_block_kind(&mut self, is_loop: bool) {
        if let Some(function) = self.functions.last_mut() {
            let first_slot = function.next_slot;
            function.blocks.push(BlockScope {
                first_slot,
                is_loop,
                ..Default::default()
            });
        }
    }

    pub fn pop_block(&mut self) -> RuntimeScopeBlock {
        match self.functions.last_mut() {
            Some(function) => {
                let to = function.next_slot;
                let block = function.blocks.pop().unwrap_or_default();
                function.active = function.active.saturating_sub(block.declared);
                RuntimeScopeBlock {
                    from: block.first_slot,
                    to,
                }
            }
            None => RuntimeScopeBlock::default(),
        }
    }

    /// Whether a `break` at this point has a loop to exit.
    pub fn in_loop(&self) -> bool {
        self.functions
            .last()
            .map(|f| f.blocks.iter().any(|b| b.is_loop))
            .unwrap_or(false)
    }

    /// Allocate a slot for `name` in the current block, without limit checks.
    pub fn define_local(&mut self, name: &str) -> SymbolRef {
        let name: Arc<str> = Arc::from(name);
        let Some(function) = self.functions.last_mut() else {
            return SymbolRef::Local { name, index: 0 };
        };
        let index = function.next_slot;
        function.next_slot += 1;
        if let Some(block) = function.blocks.last_mut() {
            if &*name != VARARGS_NAME {
                block.declared += 1;
                function.active += 1;
            }
            block.locals.insert(name.clone(), index);
        }
        SymbolRef::Local { name, index }
    }

    /// Allocate a slot for `name`, failing once too many locals are in scope.
    pub fn try_define_local(&mut self, name: &str) -> Result<SymbolRef, String> {
        let active = self.functions.last().map(|f| f.active).unwrap_or(0);
        if active >= MAX_LOCALS {
            return Err(format!(
                "too many local variables (limit is {}) near '{}'",
                MAX_LOCALS, name
            ));
        }
        Ok(self.define_local(name))
    }

    /// Resolve a name, creating upvalue captures across function boundaries.
    pub fn find(&mut self, name: &str) -> SymbolRef {
        let depth = self.functions.len();
        if depth == 0 {
            return self.global(name, SymbolRef::Upvalue { name: Arc::from(ENV_NAME), index: 0 });
        }
        if let Some(symbol) = self.find_in_function(depth - 1, name) {
            return symbol;
        }
        let env = self
            .find_in_function(depth - 1, ENV_NAME)
            .unwrap_or(SymbolRef::Upvalue {
                name: Arc::from(ENV_NAME),
                index: 0,
            });
        self.global(name, env)
    }

    /// The current function's variadic argument local, if it is variadic.
    pub fn varargs(&self) -> Option<SymbolRef> {
        let function = self.functions.last()?;
        function
            .blocks
            .first()
            .and_then(|b| b.locals.get(VARARGS_NAME))
            .map(|&index| SymbolRef::Local {
                name: Arc::from(VARARGS_NAME),
                index,
            })
    }

    /// Register a label in the current block.
    ///
    /// Labels are visible in the block declaring them and in nested blocks, so
    /// a name may not repeat anywhere along that chain.
    pub fn define_label(&mut self, name: &str) -> Result<SymbolRef, String> {
        let Some(function) = self.functions.last_mut() else {
            return Err(format!("label '{}' outside of a function", name));
        };
        if function
            .blocks
            .iter()
            .any(|b| b.labels.iter().any(|l| &**l == name))
        {
            return Err(format!("label '{}' already defined", name));
        }
        let slot_mark = function.next_slot;
        let name: Arc<str> = Arc::from(name);
        if let Some(block) = function.blocks.last_mut() {
            block.labels.push(name.clone());
        }
        Ok(SymbolRef::Label { name, slot_mark })
    }

    /// Next slot the current function would allocate.
    pub fn slot_mark(&self) -> usize {
        self.functions.last().map(|f| f.next_slot).unwrap_or(0)
    }

    fn global(&self, name: &str, env: SymbolRef) -> SymbolRef {
        SymbolRef::Global {
            name: Arc::from(name),
            env: Box::new(env),
        }
    }

    fn find_in_function(&mut self, level: usize, name: &str) -> Option<SymbolRef> {
        let function = &self.functions[level];
        if let Some(index) = function.find_local(name) {
            return Some(SymbolRef::Local {
                name: Arc::from(name),
                index,
            });
        }
        if let Some(index) = function.find_upvalue(name) {
            return Some(SymbolRef::Upvalue {
                name: Arc::from(name),
                index,
            });
        }
        // Varargs never cross a function boundary
        if level == 0 || name == VARARGS_NAME {
            return None;
        }
        let outer = self.find_in_function(level - 1, name)?;
        let function = &mut self.functions[level];
        let index = function.upvalues.len();
        function.upvalues.push((Arc::from(name), outer));
        Some(SymbolRef::Upvalue {
            name: Arc::from(name),
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locals_shadow_outer_blocks() {
        let mut scope = BuildTimeScope::new();
        scope.push_chunk();
        let outer = scope.define_local("x");
        scope.push_block();
        let inner = scope.define_local("x");
        assert_ne!(outer, inner);
        assert_eq!(scope.find("x"), inner);
        let block = scope.pop_block();
        assert_eq!(block, RuntimeScopeBlock { from: 1, to: 2 });
        assert_eq!(scope.find("x"), outer);
    }

    #[test]
    fn test_unknown_names_are_globals_through_env() {
        let mut scope = BuildTimeScope::new();
        scope.push_chunk();
        match scope.find("print") {
            SymbolRef::Global { name, env } => {
                assert_eq!(&*name, "print");
                assert_eq!(env.index(), Some(0));
            }
            other => panic!("expected global, got {:?}", other),
        }
    }

    #[test]
    fn test_upvalue_chain_across_two_functions() {
        let mut scope = BuildTimeScope::new();
        scope.push_chunk();
        scope.define_local("counter");
        scope.push_function();
        scope.push_function();
        assert_eq!(
            scope.find("counter"),
            SymbolRef::Upvalue { name: "counter".into(), index: 0 }
        );
        let inner = scope.pop_function();
        // The middle function captured the local on behalf of the inner one
        assert_eq!(
            inner.upvalues,
            vec![SymbolRef::Upvalue { name: "counter".into(), index: 0 }]
        );
        let middle = scope.pop_function();
        assert_eq!(
            middle.upvalues,
            vec![SymbolRef::Local { name: "counter".into(), index: 0 }]
        );
    }

    #[test]
    fn test_globals_in_nested_functions_capture_env() {
        let mut scope = BuildTimeScope::new();
        scope.push_chunk();
        scope.push_function();
        let symbol = scope.find("print");
        let frame = scope.pop_function();
        assert!(matches!(symbol, SymbolRef::Global { .. }));
        assert_eq!(frame.upvalues.len(), 1);
        assert_eq!(frame.upvalues[0].name(), ENV_NAME);
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut scope = BuildTimeScope::new();
        scope.push_chunk();
        scope.define_label("top").expect("first label");
        scope.push_block();
        assert!(scope.define_label("top").is_err());
    }

    #[test]
    fn test_loop_tracking() {
        let mut scope = BuildTimeScope::new();
        scope.push_chunk();
        assert!(!scope.in_loop());
        scope.push_loop_block();
        scope.push_block();
        assert!(scope.in_loop());
        scope.push_function();
        assert!(!scope.in_loop());
    }

    #[test]
    fn test_local_limit() {
        let mut scope = BuildTimeScope::new();
        scope.push_chunk();
        for i in 0..MAX_LOCALS {
            scope.try_define_local(&format!("v{}", i)).expect("within limit");
        }
        assert!(scope.try_define_local("overflow").is_err());
    }
}
