//! Host objects, callbacks, events, type metatables and shared variables

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use lunaris_engine::{DescriptorBuilder, HostEvent};
use lunaris_runtime::{DataType, DynValue, Script, SharedVariables, Table};
use parking_lot::Mutex;

// ============================================================================
// Host objects
// ============================================================================

struct Account {
    balance: AtomicI64,
    changed: HostEvent,
}

impl Account {
    fn new(balance: i64) -> Self {
        Self {
            balance: AtomicI64::new(balance),
            changed: HostEvent::new(),
        }
    }
}

fn register_account() {
    DescriptorBuilder::<Account>::new("Account")
        .method("deposit", |ctx, this, args| {
            let amount = args.check_integer(0, "deposit")?;
            let balance = this.balance.fetch_add(amount, Ordering::SeqCst) + amount;
            this.changed.raise(ctx, vec![DynValue::Number(balance as f64)])?;
            Ok(DynValue::Number(balance as f64))
        })
        .property("balance", |this| DynValue::Number(this.balance.load(Ordering::SeqCst) as f64))
        .constant("CURRENCY", "EUR")
        .event("changed", |this| this.changed.clone())
        .constructor(|_ctx, args| Ok(Account::new(args.opt_integer(0, "Account", 0)?)))
        .to_string(|this| format!("Account({})", this.balance.load(Ordering::SeqCst)))
        .register();
}

#[test]
fn test_register_type_exposes_constructor() {
    register_account();
    let mut script = Script::new();
    script.register_type::<Account>("Account").unwrap();
    let result = script
        .do_string("local a = Account(10) a:deposit(5) return a.balance, Account.CURRENCY, tostring(a)")
        .unwrap();
    let values: Vec<String> = result.into_values().iter().map(DynValue::to_display_string).collect();
    assert_eq!(values, vec!["15", "EUR", "Account(15)"]);
}

#[test]
fn test_register_object_shares_instance() {
    register_account();
    let mut script = Script::new();
    let handle = script.register_object("account", Account::new(100)).unwrap();
    script.do_string("account:deposit(-30)").unwrap();

    let balance = handle
        .as_userdata()
        .and_then(|u| u.downcast_ref::<Account>())
        .map(|account| account.balance.load(Ordering::SeqCst));
    assert_eq!(balance, Some(70));
}

#[test]
fn test_unregistered_type_is_an_error() {
    struct Unknown;
    let script = Script::new();
    let err = script.register_object("thing", Unknown).unwrap_err();
    assert!(err.to_string().contains("has no registered userdata descriptor"), "{}", err);
}

#[test]
fn test_script_handlers_receive_host_events() {
    register_account();
    let mut script = Script::new();
    let account = Account::new(0);
    let event = account.changed.clone();
    script.register_object("account", account).unwrap();
    script
        .do_string(
            "log = {}
             account.changed.add(function(balance) log[#log + 1] = balance end)
             account:deposit(4)",
        )
        .unwrap();

    script.raise_event(&event, vec![DynValue::Number(99.0)]).unwrap();
    let log = script.do_string("return table.concat(log, ',')").unwrap();
    assert_eq!(log.to_scalar().as_str(), Some("4,99"));
}

#[test]
fn test_handler_errors_stop_raise_event() {
    let mut script = Script::new();
    let event = HostEvent::new();
    let handler = script
        .do_string("return function(v) error('handler failed: ' .. v, 0) end")
        .unwrap()
        .to_scalar();
    event.add(handler);
    let err = script.raise_event(&event, vec![DynValue::from("x")]).unwrap_err();
    assert!(err.to_string().ends_with("handler failed: x"), "{}", err);
}

// ============================================================================
// Callbacks and globals
// ============================================================================

#[test]
fn test_host_callbacks_and_call_global() {
    let mut script = Script::new();
    script.set_global(
        "add_all",
        DynValue::callback("add_all", |_ctx, args| {
            let mut sum = 0.0;
            for i in 0..args.len() {
                sum += args.check_number(i, "add_all")?;
            }
            Ok(DynValue::Number(sum))
        }),
    );
    script
        .do_string("function average(...) return add_all(...) / select('#', ...) end")
        .unwrap();
    let result = script
        .call_global("average", vec![2.0.into(), 4.0.into(), 9.0.into()])
        .unwrap();
    assert_eq!(result.to_scalar().as_number(), Some(5.0));

    let err = script.call_global("missing", Vec::new()).unwrap_err();
    assert!(err.to_string().contains("global 'missing'"), "{}", err);
}

#[test]
fn test_callback_argument_errors() {
    let mut script = Script::new();
    script.set_global(
        "needs_table",
        DynValue::callback("needs_table", |_ctx, args| {
            let table = args.check_table(0, "needs_table")?;
            Ok(DynValue::Number(table.len() as f64))
        }),
    );
    let err = script.do_string("needs_table('nope')").unwrap_err();
    assert!(
        err.to_string().contains("bad argument #1 to 'needs_table' (table expected, got string)"),
        "{}",
        err
    );
}

#[test]
fn test_callbacks_call_back_into_script() {
    let mut script = Script::new();
    script.set_global(
        "apply_twice",
        DynValue::callback("apply_twice", |ctx, args| {
            let f = args.check_function(0, "apply_twice")?;
            let once = ctx.call(&f, vec![args.get(1)])?.to_scalar();
            ctx.call(&f, vec![once])
        }),
    );
    let result = script
        .do_string("return apply_twice(function(x) return x .. '!' end, 'hi')")
        .unwrap();
    assert_eq!(result.to_scalar().as_str(), Some("hi!!"));
}

#[test]
fn test_load_function_returns_callable() {
    let mut script = Script::new();
    let f = script
        .load_function("function(a, b) return a * b end", None, None)
        .unwrap();
    let result = script.call(&f, vec![6.0.into(), 7.0.into()]).unwrap();
    assert_eq!(result.to_scalar().as_number(), Some(42.0));
}

#[test]
fn test_load_string_with_environment() {
    let mut script = Script::new();
    let env = Table::new();
    env.set_str("greeting", DynValue::from("ahoy"));
    let chunk = script
        .load_string("captured = greeting return greeting", Some(env.clone()), Some("sandbox"))
        .unwrap();
    let result = script.call(&chunk, Vec::new()).unwrap();
    assert_eq!(result.to_scalar().as_str(), Some("ahoy"));
    assert_eq!(env.get_str("captured").as_str(), Some("ahoy"));
    assert!(script.get_global("captured").is_nil());
}

// ============================================================================
// Type metatables
// ============================================================================

#[test]
fn test_number_type_metatable() {
    let mut script = Script::new();
    let methods = Table::new();
    methods.set_str(
        "double",
        DynValue::callback("double", |_ctx, args| {
            Ok(DynValue::Number(args.check_number(0, "double")? * 2.0))
        }),
    );
    let metatable = Table::new();
    metatable.set_str("__index", DynValue::Table(methods));
    script.set_type_metatable(DataType::Number, Some(metatable)).unwrap();

    let result = script.do_string("local n = 21 return n:double()").unwrap();
    assert_eq!(result.to_scalar().as_number(), Some(42.0));
    assert!(script.get_type_metatable(DataType::Number).is_some());
}

#[test]
fn test_table_type_metatable_is_rejected() {
    let script = Script::new();
    assert!(script.set_type_metatable(DataType::Table, Some(Table::new())).is_err());
    assert!(script.get_type_metatable(DataType::String).is_some());
}

// ============================================================================
// Shared variables
// ============================================================================

#[test]
fn test_shared_variables_between_sessions() {
    let shared = SharedVariables::new();
    let mut first = Script::new();
    let mut second = Script::new();
    first.set_global("shared", shared.to_userdata());
    second.set_global("shared", shared.to_userdata());

    first.do_string("shared.counter = 1 shared:set('name', 'lunaris')").unwrap();
    let result = second
        .do_string("shared.counter = shared.counter + 1 return shared:get('name'), #shared")
        .unwrap();
    let values: Vec<String> = result.into_values().iter().map(DynValue::to_display_string).collect();
    assert_eq!(values, vec!["lunaris", "2"]);
    assert_eq!(shared.get("counter").as_number(), Some(2.0));
    assert_eq!(shared.keys(), vec!["counter".to_string(), "name".to_string()]);
}

#[test]
fn test_shared_variables_reject_tables() {
    let shared = SharedVariables::new();
    let mut script = Script::new();
    script.set_global("shared", shared.to_userdata());
    let err = script.do_string("shared.config = {}").unwrap_err();
    assert!(err.to_string().contains("shared variables only hold"), "{}", err);
    assert!(shared.is_empty());
}

#[test]
fn test_shared_variables_from_threads() {
    let shared = SharedVariables::new();
    shared.set("total", DynValue::Number(0.0)).unwrap();
    let lock = Arc::new(Mutex::new(()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            let lock = Arc::clone(&lock);
            std::thread::spawn(move || {
                let mut script = Script::new();
                script.set_global("shared", shared.to_userdata());
                for _ in 0..25 {
                    let _guard = lock.lock();
                    script.do_string("shared.total = shared.total + 1").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(shared.get("total").as_number(), Some(100.0));
}
