//! Cooperative cancellation for running scripts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{ScriptError, ScriptResult};

struct TokenInner {
    aborted: AtomicBool,
    lock: Mutex<()>,
    signal: Condvar,
}

/// Cancellation handle shared between a running script and its host.
///
/// `terminate` may be called from any thread. The interpreter observes it
/// at backward jumps, function entries and inside waiting builtins, then
/// unwinds with [`ScriptError::Cancelled`]; `pcall` does not catch it.
#[derive(Clone)]
pub struct ExecutionControlToken {
    inner: Option<Arc<TokenInner>>,
}

impl ExecutionControlToken {
    pub fn new() -> Self {
        Self {
            inner: Some(Arc::new(TokenInner {
                aborted: AtomicBool::new(false),
                lock: Mutex::new(()),
                signal: Condvar::new(),
            })),
        }
    }

    /// A token that can never be aborted.
    pub fn dummy() -> Self {
        Self { inner: None }
    }

    pub fn is_dummy(&self) -> bool {
        self.inner.is_none()
    }

    /// Request cancellation. Idempotent; ignored on the dummy token.
    pub fn terminate(&self) {
        if let Some(inner) = &self.inner {
            let _guard = inner.lock.lock();
            inner.aborted.store(true, Ordering::SeqCst);
            inner.signal.notify_all();
        }
    }

    pub fn is_abort_requested(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.aborted.load(Ordering::SeqCst))
    }

    /// Fail with `Cancelled` once termination has been requested.
    pub fn check(&self) -> ScriptResult<()> {
        if self.is_abort_requested() {
            Err(ScriptError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early (with `Cancelled`) on terminate.
    pub fn wait(&self, duration: Duration) -> ScriptResult<()> {
        let Some(inner) = &self.inner else {
            std::thread::sleep(duration);
            return Ok(());
        };
        let deadline = Instant::now() + duration;
        let mut guard = inner.lock.lock();
        while !inner.aborted.load(Ordering::SeqCst) {
            if inner.signal.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        drop(guard);
        self.check()
    }
}

impl Default for ExecutionControlToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutionControlToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionControlToken")
            .field("dummy", &self.is_dummy())
            .field("aborted", &self.is_abort_requested())
            .finish()
    }
}
