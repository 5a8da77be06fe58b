//! Script closures and captured variable cells.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::vm::value::DynValue;

/// A captured variable. Closures created in the same scope share cells, so
/// writes through one closure are visible to the others.
pub type ValueCell = Arc<Mutex<DynValue>>;

pub fn new_cell(value: DynValue) -> ValueCell {
    Arc::new(Mutex::new(value))
}

/// A script function: an entry point in the shared bytecode plus its
/// captured cells.
pub struct Closure {
    pub(crate) entry: usize,
    pub(crate) upvalues: Vec<ValueCell>,
    /// Generation of the owning script; stale after a reset
    pub(crate) generation: u64,
    pub(crate) name: Option<Arc<str>>,
}

impl Closure {
    pub(crate) fn new(entry: usize, upvalues: Vec<ValueCell>, generation: u64, name: Option<Arc<str>>) -> Self {
        Self {
            entry,
            upvalues,
            generation,
            name,
        }
    }

    pub fn entry_point(&self) -> usize {
        self.entry
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn upvalue_count(&self) -> usize {
        self.upvalues.len()
    }

    pub fn get_upvalue(&self, index: usize) -> Option<DynValue> {
        self.upvalues.get(index).map(|cell| cell.lock().clone())
    }

    pub fn set_upvalue(&self, index: usize, value: DynValue) -> bool {
        match self.upvalues.get(index) {
            Some(cell) => {
                *cell.lock() = value;
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closure")
            .field("entry", &self.entry)
            .field("upvalues", &self.upvalues.len())
            .field("name", &self.name)
            .finish()
    }
}
