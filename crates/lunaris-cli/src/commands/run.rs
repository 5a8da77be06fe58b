//! `lunaris run`: execute a script file, optionally under a timeout.

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::bail;
use lunaris_runtime::{ExecutionControlToken, ScriptError};

pub fn execute(file: &Path, timeout: Option<u64>, config: Option<&Path>) -> anyhow::Result<()> {
    if !file.exists() {
        bail!("file not found: {}", file.display());
    }
    let mut script = super::open_session(config)?;
    let chunk = script.load_file(file, None, None)?;

    let token = ExecutionControlToken::new();
    let (done, finished) = mpsc::channel::<()>();
    let watchdog = timeout.map(|ms| {
        let token = token.clone();
        thread::spawn(move || {
            if finished.recv_timeout(Duration::from_millis(ms)).is_err() {
                log::warn!("timeout of {} ms reached, terminating script", ms);
                token.terminate();
            }
        })
    });

    let result = script.call_with_token(&chunk, Vec::new(), token);
    let _ = done.send(());
    if let Some(handle) = watchdog {
        let _ = handle.join();
    }

    match result {
        Ok(_) => Ok(()),
        Err(ScriptError::Cancelled) => match timeout {
            Some(ms) => bail!("script timed out after {} ms", ms),
            None => bail!("script cancelled"),
        },
        Err(e) => Err(e.into()),
    }
}
