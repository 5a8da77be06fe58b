//! The `math` table

use std::sync::Arc;

use lunaris_engine::{CallbackArguments, DynValue, ExecutionContext, ScriptError, ScriptResult, Table};

use super::register;
use crate::platform::Platform;

pub(super) fn library(platform: &Arc<Platform>) -> Table {
    let lib = Table::new();
    lib.set_str("pi", DynValue::Number(std::f64::consts::PI));
    lib.set_str("huge", DynValue::Number(f64::INFINITY));

    unary(&lib, "floor", f64::floor);
    unary(&lib, "ceil", f64::ceil);
    unary(&lib, "abs", f64::abs);
    unary(&lib, "sqrt", f64::sqrt);
    unary(&lib, "exp", f64::exp);
    unary(&lib, "sin", f64::sin);
    unary(&lib, "cos", f64::cos);
    unary(&lib, "tan", f64::tan);

    register(&lib, "fmod", fmod);
    register(&lib, "max", |_ctx, args| fold(&args, "max", f64::max));
    register(&lib, "min", |_ctx, args| fold(&args, "min", f64::min));
    register(&lib, "log", log);

    let rng = platform.clone();
    register(&lib, "random", move |_ctx, args| random(&rng, &args));
    let rng = platform.clone();
    register(&lib, "randomseed", move |_ctx, args| {
        let seed = args.check_number(0, "randomseed")?;
        rng.reseed(seed.to_bits());
        Ok(DynValue::void())
    });
    lib
}

fn unary(lib: &Table, name: &'static str, op: fn(f64) -> f64) {
    register(lib, name, move |_ctx, args| {
        Ok(DynValue::Number(op(args.check_number(0, name)?)))
    });
}

fn fold(args: &CallbackArguments, name: &str, op: fn(f64, f64) -> f64) -> ScriptResult<DynValue> {
    let mut acc = args.check_number(0, name)?;
    for i in 1..args.len() {
        acc = op(acc, args.check_number(i, name)?);
    }
    Ok(DynValue::Number(acc))
}

fn fmod(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let a = args.check_number(0, "fmod")?;
    let b = args.check_number(1, "fmod")?;
    Ok(DynValue::Number(a % b))
}

fn log(_ctx: &mut ExecutionContext<'_>, args: CallbackArguments) -> ScriptResult<DynValue> {
    let x = args.check_number(0, "log")?;
    Ok(DynValue::Number(match args.get(1) {
        DynValue::Nil => x.ln(),
        _ => {
            let base = args.check_number(1, "log")?;
            if base == 2.0 {
                x.log2()
            } else if base == 10.0 {
                x.log10()
            } else {
                x.ln() / base.ln()
            }
        }
    }))
}

/// `random()` in `[0,1)`, `random(m)` in `[1,m]`, `random(m,n)` in `[m,n]`.
fn random(platform: &Platform, args: &CallbackArguments) -> ScriptResult<DynValue> {
    let (low, high) = match args.len() {
        0 => return Ok(DynValue::Number(platform.random())),
        1 => (1, args.check_integer(0, "random")?),
        2 => (args.check_integer(0, "random")?, args.check_integer(1, "random")?),
        _ => return Err(ScriptError::runtime("wrong number of arguments to 'random'")),
    };
    if low > high {
        return Err(ScriptError::runtime(format!(
            "bad argument #{} to 'random' (interval is empty)",
            args.len()
        )));
    }
    Ok(DynValue::Number(platform.random_range(low, high) as f64))
}
