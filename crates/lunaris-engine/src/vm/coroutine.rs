//! Coroutines: functions with their own processor, resumed and suspended
//! cooperatively

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ScriptError, ScriptResult};
use crate::vm::execution_control::ExecutionControlToken;
use crate::vm::processor::{Processor, RunOutcome};
use crate::vm::state::ScriptState;
use crate::vm::value::DynValue;

/// Lifecycle state reported by `coroutine.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    /// Created or yielded; can be resumed
    Suspended,
    /// Currently executing
    Running,
    /// Resumed another coroutine and waits for it
    Normal,
    /// Returned or raised an error
    Dead,
}

impl CoroutineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CoroutineStatus::Suspended => "suspended",
            CoroutineStatus::Running => "running",
            CoroutineStatus::Normal => "normal",
            CoroutineStatus::Dead => "dead",
        }
    }
}

static NEXT_COROUTINE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct CoroutineInner {
    id: u64,
    status: Mutex<CoroutineStatus>,
    /// Taken out while the coroutine runs
    processor: Mutex<Option<Processor>>,
    function: DynValue,
    started: AtomicBool,
}

/// Handle to a coroutine; clones share the same coroutine.
#[derive(Clone)]
pub struct Coroutine(Arc<CoroutineInner>);

impl Coroutine {
    /// Wrap `function` in a new suspended coroutine.
    pub fn new(state: Arc<ScriptState>, function: DynValue) -> Self {
        let inner = Arc::new_cyclic(|weak| CoroutineInner {
            id: NEXT_COROUTINE_ID.fetch_add(1, Ordering::Relaxed),
            status: Mutex::new(CoroutineStatus::Suspended),
            processor: Mutex::new(Some(Processor::for_coroutine(state, weak.clone()))),
            function,
            started: AtomicBool::new(false),
        });
        log::trace!("coroutine {} created", inner.id);
        Coroutine(inner)
    }

    pub(crate) fn from_inner(inner: Arc<CoroutineInner>) -> Self {
        Coroutine(inner)
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn status(&self) -> CoroutineStatus {
        *self.0.status.lock()
    }

    pub fn function(&self) -> &DynValue {
        &self.0.function
    }

    pub fn ptr_eq(&self, other: &Coroutine) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    fn set_status(&self, status: CoroutineStatus) {
        *self.0.status.lock() = status;
    }

    /// Run the coroutine until it yields, returns or fails.
    ///
    /// `caller` is the coroutine doing the resume, if any; it is reported as
    /// `normal` while this one runs.
    pub fn resume(
        &self,
        args: Vec<DynValue>,
        token: ExecutionControlToken,
        caller: Option<&Coroutine>,
    ) -> ScriptResult<DynValue> {
        match self.status() {
            CoroutineStatus::Suspended => {}
            CoroutineStatus::Dead => return Err(ScriptError::runtime("cannot resume dead coroutine")),
            _ => return Err(ScriptError::runtime("cannot resume non-suspended coroutine")),
        }
        let mut processor = self
            .0
            .processor
            .lock()
            .take()
            .ok_or_else(|| ScriptError::runtime("cannot resume non-suspended coroutine"))?;

        processor.set_token(token);
        self.set_status(CoroutineStatus::Running);
        if let Some(caller) = caller {
            caller.set_status(CoroutineStatus::Normal);
        }
        log::trace!("coroutine {} resumed", self.0.id);

        let outcome = if self.0.started.swap(true, Ordering::AcqRel) {
            processor.resume_with(args)
        } else {
            processor.start(self.0.function.clone(), args)
        };

        if let Some(caller) = caller {
            caller.set_status(CoroutineStatus::Running);
        }
        match outcome {
            Ok(RunOutcome::Yielded(values)) => {
                processor.set_token(ExecutionControlToken::dummy());
                *self.0.processor.lock() = Some(processor);
                self.set_status(CoroutineStatus::Suspended);
                log::trace!("coroutine {} suspended", self.0.id);
                Ok(values)
            }
            Ok(RunOutcome::Returned(values)) => {
                self.set_status(CoroutineStatus::Dead);
                log::trace!("coroutine {} finished", self.0.id);
                Ok(values)
            }
            Err(e) => {
                self.set_status(CoroutineStatus::Dead);
                log::trace!("coroutine {} died: {}", self.0.id, e);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coroutine")
            .field("id", &self.0.id)
            .field("status", &self.status())
            .finish()
    }
}
