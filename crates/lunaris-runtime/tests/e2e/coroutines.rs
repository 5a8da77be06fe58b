//! Coroutines from scripts and from the host

use lunaris_runtime::{DynValue, Script};

use super::harness::*;

// ============================================================================
// Script side
// ============================================================================

#[test]
fn test_generator_round_trip() {
    expect_values(
        "local co = coroutine.create(function(a, b)
             local c = coroutine.yield(a + b)
             local d, e = coroutine.yield(c * 2)
             return d + e
         end)
         local _, x = coroutine.resume(co, 1, 2)
         local _, y = coroutine.resume(co, 10)
         local _, z = coroutine.resume(co, 3, 4)
         return x, y, z, coroutine.status(co)",
        &["3", "20", "7", "dead"],
    );
}

#[test]
fn test_resume_dead_coroutine() {
    expect_values(
        "local co = coroutine.create(function() end)
         coroutine.resume(co)
         return coroutine.resume(co)",
        &["false", "cannot resume dead coroutine"],
    );
}

#[test]
fn test_errors_inside_coroutine_are_returned() {
    expect_values(
        "local co = coroutine.create(function() error('oops', 0) end)
         local ok, err = coroutine.resume(co)
         return ok, err, coroutine.status(co)",
        &["false", "oops", "dead"],
    );
}

#[test]
fn test_status_transitions() {
    expect_values(
        "local outer
         local inner = coroutine.create(function()
             return coroutine.status(outer)
         end)
         outer = coroutine.create(function()
             local own = coroutine.status(coroutine.running())
             local _, seen = coroutine.resume(inner)
             return own, seen
         end)
         local before = coroutine.status(outer)
         local _, own, seen = coroutine.resume(outer)
         return before, own, seen",
        &["suspended", "running", "normal"],
    );
}

#[test]
fn test_running_and_isyieldable_on_main() {
    expect_values("return coroutine.running(), coroutine.isyieldable()", &["nil", "false"]);
    expect_values(
        "local co = coroutine.wrap(function() return coroutine.isyieldable() end)
         return co()",
        &["true"],
    );
}

#[test]
fn test_wrap_iterates() {
    expect_string(
        "local function range(n)
             return coroutine.wrap(function()
                 for i = 1, n do coroutine.yield(i) end
             end)
         end
         local out = {}
         for i in range(4) do out[#out + 1] = i end
         return table.concat(out, ',')",
        "1,2,3,4",
    );
}

#[test]
fn test_wrap_propagates_errors() {
    expect_runtime_error(
        "local f = coroutine.wrap(function() error('from wrap', 0) end)
         f()",
        "from wrap",
    );
}

#[test]
fn test_yield_outside_coroutine() {
    expect_runtime_error("coroutine.yield(1)", "attempt to yield from outside a coroutine");
}

#[test]
fn test_yield_across_host_call_boundary() {
    expect_values(
        "local f = coroutine.wrap(function() return pcall(coroutine.yield, 1) end)
         return f()",
        &["false", "attempt to yield across a CLR-call boundary"],
    );
}

#[test]
fn test_bad_coroutine_argument() {
    expect_runtime_error("coroutine.resume(42)", "coroutine expected, got number");
    expect_runtime_error("coroutine.create(42)", "bad argument #1 to 'create'");
}

// ============================================================================
// Host side
// ============================================================================

#[test]
fn test_host_resumes_script_coroutine() {
    let mut script = Script::new();
    let function = script
        .do_string("return function(n) for i = 1, n do coroutine.yield(i * i) end return 'done' end")
        .unwrap()
        .to_scalar();
    let co = script.create_coroutine(function).unwrap();

    let mut seen = Vec::new();
    seen.push(script.resume(&co, vec![DynValue::Number(3.0)]).unwrap().to_display_string());
    for _ in 0..3 {
        seen.push(script.resume(&co, Vec::new()).unwrap().to_display_string());
    }
    assert_eq!(seen, vec!["1", "4", "9", "done"]);
    assert!(script.resume(&co, Vec::new()).is_err());
}

#[test]
fn test_host_coroutine_from_callback() {
    let script = Script::new();
    let callback = DynValue::callback("twice", |_ctx, args| {
        let n = args.check_number(0, "twice")?;
        Ok(DynValue::Number(n * 2.0))
    });
    let co = script.create_coroutine(callback).unwrap();
    let result = script.resume(&co, vec![DynValue::Number(21.0)]).unwrap();
    assert_eq!(result.to_scalar().as_number(), Some(42.0));
}

#[test]
fn test_create_coroutine_rejects_non_functions() {
    let script = Script::new();
    let err = script.create_coroutine(DynValue::Number(1.0)).unwrap_err();
    assert_eq!(err.to_string(), "cannot create a coroutine from a number value");
}
