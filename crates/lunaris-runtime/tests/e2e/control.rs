//! Cancellation, configuration, reset and the async entry points

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lunaris_runtime::{
    call_async, do_string_async, share, DynValue, ExecutionControlToken, Script, ScriptError,
    ScriptOptions, ScriptPool, ZeroStep,
};

fn terminate_after(token: &ExecutionControlToken, delay: Duration) -> thread::JoinHandle<()> {
    let token = token.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        token.terminate();
    })
}

fn run_with_token(script: &mut Script, source: &str, token: ExecutionControlToken) -> Result<DynValue, ScriptError> {
    let chunk = script.load_string(source, None, None)?;
    script.call_with_token(&chunk, Vec::new(), token)
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_terminate_stops_infinite_loop() {
    let mut script = Script::new();
    let token = ExecutionControlToken::new();
    let watchdog = terminate_after(&token, Duration::from_millis(50));
    let result = run_with_token(&mut script, "while true do end", token);
    watchdog.join().unwrap();
    assert!(matches!(result, Err(ScriptError::Cancelled)), "{:?}", result);
}

#[test]
fn test_pcall_does_not_swallow_cancellation() {
    let mut script = Script::new();
    let token = ExecutionControlToken::new();
    let watchdog = terminate_after(&token, Duration::from_millis(50));
    let result = run_with_token(
        &mut script,
        "local ok = pcall(function() while true do end end) return ok",
        token,
    );
    watchdog.join().unwrap();
    assert!(matches!(result, Err(ScriptError::Cancelled)), "{:?}", result);
}

#[test]
fn test_sleep_wakes_on_terminate() {
    let mut script = Script::new();
    let token = ExecutionControlToken::new();
    let started = Instant::now();
    let watchdog = terminate_after(&token, Duration::from_millis(50));
    let result = run_with_token(&mut script, "sleep(30) return 'overslept'", token);
    watchdog.join().unwrap();
    assert!(matches!(result, Err(ScriptError::Cancelled)), "{:?}", result);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_cancellation_is_observed_at_check_points() {
    let mut script = Script::new();
    script.set_global(
        "stop",
        DynValue::callback("stop", |ctx, _args| {
            ctx.token().terminate();
            Ok(DynValue::Number(1.0))
        }),
    );

    // No backward jump or call after the callback: the chunk completes
    let result = run_with_token(&mut script, "return stop() + 1", ExecutionControlToken::new()).unwrap();
    assert_eq!(result.to_scalar().as_number(), Some(2.0));

    let result = run_with_token(&mut script, "stop() while true do end", ExecutionControlToken::new());
    assert!(matches!(result, Err(ScriptError::Cancelled)), "{:?}", result);
}

#[test]
fn test_session_is_usable_after_cancellation() {
    let mut script = Script::new();
    let token = ExecutionControlToken::new();
    token.terminate();
    let result = run_with_token(&mut script, "local function f() end f()", token);
    assert!(matches!(result, Err(ScriptError::Cancelled)), "{:?}", result);

    let value = script.do_string("return 'still alive'").unwrap();
    assert_eq!(value.to_scalar().as_str(), Some("still alive"));
}

#[test]
fn test_dummy_token_never_aborts() {
    let token = ExecutionControlToken::dummy();
    token.terminate();
    assert!(!token.is_abort_requested());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_runtime_zero_step_is_an_error_by_default() {
    let mut script = Script::new();
    let err = script.do_string("local s = 0 for i = 1, 3, s do end").unwrap_err();
    assert!(err.to_string().contains("'for' step is zero"), "{}", err);
}

#[test]
fn test_zero_step_allowed_by_configuration() {
    let options = ScriptOptions::from_toml_str("zero_step = \"allow\"").unwrap();
    assert_eq!(options.zero_step, ZeroStep::Allow);
    let mut script = Script::with_options(options).unwrap();
    let result = script
        .do_string(
            "local s, n = 0, 0
             for i = 1, 3, s do
                 n = n + 1
                 if n == 5 then break end
             end
             return n",
        )
        .unwrap();
    assert_eq!(result.to_scalar().as_number(), Some(5.0));
}

#[test]
fn test_call_depth_from_configuration() {
    let options = ScriptOptions::from_toml_str("max_call_depth = 50").unwrap();
    let mut script = Script::with_options(options).unwrap();
    let source = "local function depth(n) if n == 0 then return 0 end return 1 + depth(n - 1) end return depth(";
    assert!(script.do_string(&format!("{}20)", source)).is_ok());
    let err = script.do_string(&format!("{}200)", source)).unwrap_err();
    assert!(err.to_string().contains("stack overflow"), "{}", err);
}

#[test]
fn test_options_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lunaris.toml");
    std::fs::write(&path, "[core_modules]\nmath = false\n").unwrap();
    let options = ScriptOptions::from_file(&path).unwrap();
    let mut script = Script::with_options(options).unwrap();
    let result = script.do_string("return math == nil").unwrap();
    assert_eq!(result.to_scalar(), DynValue::Boolean(true));

    assert!(ScriptOptions::from_file(&dir.path().join("missing.toml")).is_err());
}

// ============================================================================
// Reset
// ============================================================================

#[test]
fn test_reset_discards_code_and_globals() {
    let mut script = Script::new();
    let f = script
        .do_string("counter = 5 return function() return counter end")
        .unwrap()
        .to_scalar();
    assert_eq!(script.call(&f, Vec::new()).unwrap().to_scalar().as_number(), Some(5.0));

    script.reset().unwrap();
    assert!(script.get_global("counter").is_nil());
    let err = script.call(&f, Vec::new()).unwrap_err();
    assert!(err.to_string().contains("compiled before the script was reset"), "{}", err);

    let value = script.do_string("return string.upper('fresh')").unwrap();
    assert_eq!(value.to_scalar().as_str(), Some("FRESH"));
}

#[test]
fn test_reset_drops_host_registrations_until_reapplied() {
    let mut script = Script::new();
    let install = |script: &Script| {
        script.set_global("limit", DynValue::Number(3.0));
        let methods = lunaris_runtime::Table::new();
        methods.set_str(
            "twice",
            DynValue::callback("twice", |_ctx, args| Ok(DynValue::Number(args.check_number(0, "twice")? * 2.0))),
        );
        let metatable = lunaris_runtime::Table::new();
        metatable.set_str("__index", DynValue::Table(methods));
        script
            .set_type_metatable(lunaris_runtime::DataType::Number, Some(metatable))
            .unwrap();
    };
    install(&script);
    assert!(script.do_string("return (limit):twice()").is_ok());

    script.reset().unwrap();
    assert!(script.get_global("limit").is_nil());
    assert!(script.get_type_metatable(lunaris_runtime::DataType::Number).is_none());
    assert!(script.get_type_metatable(lunaris_runtime::DataType::String).is_some());

    install(&script);
    let value = script.do_string("return (limit):twice()").unwrap();
    assert_eq!(value.to_scalar().as_number(), Some(6.0));
}

// ============================================================================
// Async
// ============================================================================

#[tokio::test]
async fn test_call_async_runs_script_function() {
    let mut script = Script::new();
    let f = script
        .do_string("return function(a, b) return a ^ b end")
        .unwrap()
        .to_scalar();
    let shared = share(script);
    let result = call_async(&shared, f, vec![2.0.into(), 10.0.into()], ExecutionControlToken::dummy())
        .await
        .unwrap();
    assert_eq!(result.to_scalar().as_number(), Some(1024.0));
}

#[tokio::test]
async fn test_do_string_async_can_be_cancelled() {
    let shared = share(Script::new());
    let token = ExecutionControlToken::new();
    let pending = do_string_async(&shared, "while true do end".to_string(), token.clone());
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.terminate();
    };
    let (result, _) = tokio::join!(pending, canceller);
    assert!(matches!(result, Err(ScriptError::Cancelled)), "{:?}", result);

    let after = do_string_async(&shared, "return 1".to_string(), ExecutionControlToken::dummy())
        .await
        .unwrap();
    assert_eq!(after.to_scalar().as_number(), Some(1.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_runs_jobs_on_independent_sessions() {
    let pool = ScriptPool::with_setup(2, &ScriptOptions::default(), |script| {
        script.do_string("function square(x) return x * x end")?;
        Ok(())
    })
    .unwrap();
    assert_eq!(pool.available(), 2);
    let pool = Arc::new(pool);

    let handles: Vec<_> = (1..=6)
        .map(|n| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                pool.run(move |script| {
                    let value = script.call_global("square", vec![DynValue::Number(n as f64)])?;
                    Ok(value.to_scalar().as_number().unwrap_or_default())
                })
                .await
            })
        })
        .collect();

    let mut total = 0.0;
    for handle in handles {
        total += handle.await.unwrap().unwrap();
    }
    assert_eq!(total, 91.0);
    assert_eq!(pool.available(), 2);
}

#[tokio::test]
async fn test_pool_surfaces_script_errors() {
    let pool = ScriptPool::new(1, &ScriptOptions::default()).unwrap();
    let err = pool
        .run(|script| script.do_string("error('pool job failed', 0)"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("pool job failed"), "{}", err);
    assert_eq!(pool.available(), 1);
}

#[tokio::test]
async fn test_pool_recovers_session_after_job_panic() {
    let pool = ScriptPool::new(1, &ScriptOptions::default()).unwrap();
    let err = pool
        .run(|_script| -> lunaris_runtime::ScriptResult<()> { panic!("job exploded") })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("script task failed"), "{}", err);
    assert_eq!(pool.available(), 1);

    let value = pool.run(|script| script.do_string("return 3")).await.unwrap();
    assert_eq!(value.to_scalar().as_number(), Some(3.0));
}

#[tokio::test]
async fn test_pool_keeps_session_when_caller_gives_up() {
    let pool = ScriptPool::new(1, &ScriptOptions::default()).unwrap();
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        pool.run(|script| script.do_string("sleep(0.3) return 1")),
    )
    .await;
    assert!(abandoned.is_err());

    let value = pool.run(|script| script.do_string("return 2")).await.unwrap();
    assert_eq!(value.to_scalar().as_number(), Some(2.0));
    assert_eq!(pool.available(), 1);
}
