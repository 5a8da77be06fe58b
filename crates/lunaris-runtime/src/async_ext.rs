//! Async entry points
//!
//! A [`Script`] is synchronous and single-threaded. These helpers run its
//! calls on tokio's blocking pool so async hosts can await them; they do not
//! make one session run in parallel with itself. For parallel work use a
//! [`ScriptPool`] of independent sessions.

use std::sync::Arc;

use lunaris_engine::{DynValue, ExecutionControlToken, ScriptError, ScriptResult};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinError;

use crate::options::ScriptOptions;
use crate::script::Script;

/// A session usable from several tasks, one call at a time.
pub type SharedScript = Arc<Mutex<Script>>;

pub fn share(script: Script) -> SharedScript {
    Arc::new(Mutex::new(script))
}

fn join_error(e: JoinError) -> ScriptError {
    ScriptError::runtime(format!("script task failed: {}", e))
}

/// [`Script::call_with_token`] on a blocking thread.
pub async fn call_async(
    script: &SharedScript,
    function: DynValue,
    args: Vec<DynValue>,
    token: ExecutionControlToken,
) -> ScriptResult<DynValue> {
    let script = Arc::clone(script);
    tokio::task::spawn_blocking(move || script.lock().call_with_token(&function, args, token))
        .await
        .map_err(join_error)?
}

/// Compile and run `code` on a blocking thread under `token`.
pub async fn do_string_async(
    script: &SharedScript,
    code: String,
    token: ExecutionControlToken,
) -> ScriptResult<DynValue> {
    let script = Arc::clone(script);
    tokio::task::spawn_blocking(move || {
        let mut script = script.lock();
        let function = script.load_string(&code, None, None)?;
        script.call_with_token(&function, Vec::new(), token)
    })
    .await
    .map_err(join_error)?
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Fixed set of independent sessions; each job borrows one exclusively.
///
/// The semaphore bounds concurrent jobs to the number of sessions. A session
/// returns to the pool when its job finishes, even if the job panics or the
/// caller stops awaiting it.
pub struct ScriptPool {
    idle: Arc<Mutex<Vec<Script>>>,
    permits: Arc<Semaphore>,
}

impl ScriptPool {
    pub fn new(size: usize, options: &ScriptOptions) -> ScriptResult<Self> {
        let size = size.max(1);
        let scripts = (0..size)
            .map(|_| Script::with_options(options.clone()))
            .collect::<ScriptResult<Vec<_>>>()?;
        Ok(Self {
            idle: Arc::new(Mutex::new(scripts)),
            permits: Arc::new(Semaphore::new(size)),
        })
    }

    /// Build the pool and run `setup` (e.g. loading shared definitions) on
    /// every session.
    pub fn with_setup<F>(size: usize, options: &ScriptOptions, setup: F) -> ScriptResult<Self>
    where
        F: Fn(&mut Script) -> ScriptResult<()>,
    {
        let pool = Self::new(size, options)?;
        for script in pool.idle.lock().iter_mut() {
            setup(script)?;
        }
        Ok(pool)
    }

    /// Sessions not currently running a job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` with an idle session on a blocking thread.
    ///
    /// Dropping the returned future does not cancel the job; its session and
    /// permit stay taken until it completes.
    pub async fn run<F, R>(&self, job: F) -> ScriptResult<R>
    where
        F: FnOnce(&mut Script) -> ScriptResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ScriptError::runtime("script pool is closed"))?;
        let script = self
            .idle
            .lock()
            .pop()
            .ok_or_else(|| ScriptError::runtime("script pool has no idle session"))?;
        let mut checkout = Checkout {
            script: Some(script),
            idle: Arc::clone(&self.idle),
            _permit: permit,
        };

        tokio::task::spawn_blocking(move || match checkout.script.as_mut() {
            Some(script) => job(script),
            None => Err(ScriptError::runtime("script pool session missing")),
        })
        .await
        .map_err(join_error)?
    }
}

/// A session borrowed from a pool.
///
/// Dropping it puts the session back before the permit is released.
struct Checkout {
    script: Option<Script>,
    idle: Arc<Mutex<Vec<Script>>>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Checkout {
    fn drop(&mut self) {
        if let Some(script) = self.script.take() {
            self.idle.lock().push(script);
        }
    }
}
