//! Integration tests for userdata descriptors

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use lunaris_engine::vm::interop::EnumValue;
use lunaris_engine::{
    CompositeUserDataDescriptor, DescriptorBuilder, DynValue, EngineOptions, EnumStorage,
    EnumUserDataDescriptor, ExecutionContext, HostEvent, Processor, ProxyUserDataDescriptor,
    ScriptResult, ScriptState, UserData, UserDataDescriptor, UserDataRegistry,
};

fn run_in(state: &Arc<ScriptState>, source: &str) -> ScriptResult<DynValue> {
    let chunk = state.load_chunk(source, "test", None)?;
    Processor::new(state.clone()).call(&chunk, Vec::new()).map(DynValue::to_scalar)
}

// ============================================================================
// Standard descriptors
// ============================================================================

struct Counter {
    value: AtomicI64,
    step: i64,
    changed: HostEvent,
}

impl Counter {
    fn new(start: i64) -> Self {
        Self {
            value: AtomicI64::new(start),
            step: 1,
            changed: HostEvent::new(),
        }
    }
}

fn register_counter() {
    DescriptorBuilder::<Counter>::new("Counter")
        .method("add", |ctx, this, args| {
            let amount = args.opt_integer(0, "add", this.step)?;
            let value = this.value.fetch_add(amount, Ordering::SeqCst) + amount;
            this.changed.raise(ctx, vec![DynValue::Number(value as f64)])?;
            Ok(DynValue::Number(value as f64))
        })
        .property_rw(
            "value",
            |this| DynValue::Number(this.value.load(Ordering::SeqCst) as f64),
            |this, value| {
                let n = value.to_integer().unwrap_or(0);
                this.value.store(n, Ordering::SeqCst);
                Ok(())
            },
        )
        .property("step", |this| DynValue::Number(this.step as f64))
        .constant("MAX", 1000.0)
        .static_method("describe", |_ctx, _args| Ok(DynValue::from("a counter")))
        .event("changed", |this| this.changed.clone())
        .meta("__len", |_ctx, args| {
            let this = args.userdata::<Counter>(0, "__len")?;
            Ok(DynValue::Number(this.value.load(Ordering::SeqCst) as f64))
        })
        .constructor(|_ctx, args| Ok(Counter::new(args.opt_integer(0, "Counter", 0)?)))
        .to_string(|this| format!("Counter({})", this.value.load(Ordering::SeqCst)))
        .register();
}

fn counter_state() -> Arc<ScriptState> {
    register_counter();
    let state = ScriptState::new(EngineOptions::default());
    state
        .globals()
        .set_str("Counter", UserDataRegistry::static_type::<Counter>().unwrap());
    state
}

#[test]
fn test_constructor_methods_and_properties() {
    let state = counter_state();
    let result = run_in(&state, "local c = Counter(5) c:add(3) c:add() return c.value").unwrap();
    assert_eq!(result.as_number(), Some(9.0));

    let result = run_in(&state, "local c = Counter.__new(2) c.value = 40 return c.value + c.step + #c").unwrap();
    assert_eq!(result.as_number(), Some(81.0));
}

#[test]
fn test_static_members() {
    let state = counter_state();
    assert_eq!(run_in(&state, "return Counter.MAX").unwrap().as_number(), Some(1000.0));
    assert_eq!(run_in(&state, "return Counter.describe()").unwrap().as_str(), Some("a counter"));
}

#[test]
fn test_member_errors() {
    let state = counter_state();
    let err = run_in(&state, "local c = Counter(1) c.step = 3").unwrap_err();
    assert!(err.to_string().contains("read-only property 'step'"), "{}", err);

    let err = run_in(&state, "local c = Counter(1) return c.missing").unwrap_err();
    assert!(err.to_string().contains("cannot access field missing of userdata<Counter>"), "{}", err);

    let err = run_in(&state, "local c = Counter(1) c.changed = 1").unwrap_err();
    assert!(err.to_string().contains("cannot assign to event 'changed'"), "{}", err);
}

#[test]
fn test_host_side_object_access() {
    let state = counter_state();
    let counter = Arc::new(Counter::new(10));
    state
        .globals()
        .set_str("shared", UserDataRegistry::wrap_arc(counter.clone()).unwrap());
    run_in(&state, "shared:add(5)").unwrap();
    assert_eq!(counter.value.load(Ordering::SeqCst), 15);
    let shown = run_in(&state, "return shared").unwrap();
    assert_eq!(shown.to_display_string(), "Counter(15)");
}

#[test]
fn test_events_add_and_remove() {
    let state = counter_state();
    let source = r#"
        local c = Counter(0)
        local seen = 0
        local function handler(v) seen = seen + v end
        c.changed.add(handler)
        c:add(2)
        c.changed:remove(handler)
        c:add(3)
        c.changed:add(handler)
        c:add(4)
        return seen
    "#;
    assert_eq!(run_in(&state, source).unwrap().as_number(), Some(11.0));

    let err = run_in(&state, "local c = Counter(0) return c.changed.count").unwrap_err();
    assert!(err.to_string().contains("Events only support add and remove methods"), "{}", err);
}

// ============================================================================
// Composite descriptors
// ============================================================================

/// Knows exactly one member.
struct SingleMember {
    member: &'static str,
    value: f64,
}

impl UserDataDescriptor for SingleMember {
    fn name(&self) -> &str {
        self.member
    }

    fn index(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        _object: &UserData,
        key: &DynValue,
    ) -> ScriptResult<Option<DynValue>> {
        if key.as_str() == Some(self.member) {
            Ok(Some(DynValue::Number(self.value)))
        } else {
            Ok(None)
        }
    }

    fn set_index(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        _object: &UserData,
        _key: &DynValue,
        _value: DynValue,
    ) -> ScriptResult<bool> {
        Ok(false)
    }
}

fn composite_state() -> (Arc<ScriptState>, UserData) {
    let d1: Arc<dyn UserDataDescriptor> = Arc::new(SingleMember { member: "Bar", value: 1.0 });
    let d2: Arc<dyn UserDataDescriptor> = Arc::new(SingleMember { member: "Foo", value: 2.0 });
    let composite: Arc<dyn UserDataDescriptor> = Arc::new(CompositeUserDataDescriptor::new("Composite", vec![d1, d2]));
    let object = UserData::new((), composite);

    let state = ScriptState::new(EngineOptions::default());
    state.globals().set_str("obj", DynValue::UserData(object.clone()));
    let probe = object.clone();
    // Reports whether the composite itself answered `None` for a key
    state.globals().set_str(
        "is_unknown",
        DynValue::callback("is_unknown", move |ctx, args| {
            let found = probe.descriptor().index(ctx, &probe, &args.get(0))?;
            Ok(DynValue::Boolean(found.is_none()))
        }),
    );
    (state, object)
}

#[test]
fn test_composite_falls_through_to_later_descriptor() {
    let (state, _) = composite_state();
    assert_eq!(run_in(&state, "return obj.Foo").unwrap().as_number(), Some(2.0));
    assert_eq!(run_in(&state, "return obj.Bar").unwrap().as_number(), Some(1.0));
}

#[test]
fn test_composite_miss_is_not_nil() {
    let (state, _) = composite_state();
    assert_eq!(run_in(&state, "return is_unknown('Baz')").unwrap(), DynValue::Boolean(true));
    assert_eq!(run_in(&state, "return is_unknown('Foo')").unwrap(), DynValue::Boolean(false));
    let err = run_in(&state, "return obj.Baz").unwrap_err();
    assert!(err.to_string().contains("cannot access field Baz of userdata<Composite>"), "{}", err);
}

// ============================================================================
// Enums
// ============================================================================

fn enum_state(storage: EnumStorage) -> Arc<ScriptState> {
    let flags = EnumUserDataDescriptor::new(
        "Access",
        storage,
        true,
        &[("None", 0), ("Read", 1), ("Write", 2), ("ReadWrite", 3), ("Exec", 4)],
    );
    let state = ScriptState::new(EngineOptions::default());
    state.globals().set_str("Access", flags.static_type());
    state
}

#[test]
fn test_flag_operations_for_signed_and_unsigned_storage() {
    for storage in [EnumStorage::I32, EnumStorage::U8, EnumStorage::I64, EnumStorage::U64] {
        let state = enum_state(storage);
        let checks = [
            ("return Access.hasAll(Access.ReadWrite, Access.Read)", true),
            ("return Access.hasAll(Access.Read, Access.ReadWrite)", false),
            ("return Access.hasAny(Access.Read, Access.ReadWrite)", true),
            ("return Access.hasAny(Access.ReadWrite, Access.Exec)", false),
            ("return Access.flagsOr(Access.Read, Access.Write) == Access.ReadWrite", true),
            ("return Access.flagsAnd(Access.ReadWrite, Access.Write) == Access.Write", true),
            ("return Access.flagsXor(Access.ReadWrite, Access.Read) == Access.Write", true),
            ("return Access.hasAll(Access.ReadWrite, 2)", true),
        ];
        for (source, expected) in checks {
            let result = run_in(&state, source).unwrap();
            assert_eq!(result, DynValue::Boolean(expected), "{} with {:?}", source, storage);
        }
    }
}

#[test]
fn test_flags_not_uses_storage_width() {
    let state = enum_state(EnumStorage::U8);
    let value = run_in(&state, "return Access.flagsNot(Access.Read)").unwrap();
    let raw = value.as_userdata().unwrap().downcast_ref::<EnumValue>().unwrap().raw;
    assert_eq!(raw.as_u64(), 0xFE);
}

#[test]
fn test_flag_operation_argument_count() {
    let state = enum_state(EnumStorage::I32);
    let err = run_in(&state, "return Access.flagsOr(Access.Read)").unwrap_err();
    assert!(err.to_string().contains("expects 2 arguments"), "{}", err);
    let err = run_in(&state, "return Access.hasAny({}, 1)").unwrap_err();
    assert!(err.to_string().contains("expected an enum value or a number"), "{}", err);
}

#[test]
fn test_enum_values_print_their_names() {
    let state = enum_state(EnumStorage::I32);
    let value = run_in(&state, "return Access.Write").unwrap();
    assert_eq!(value.to_display_string(), "Write");
}

// ============================================================================
// Proxies
// ============================================================================

struct Account {
    owner: String,
    pin: u32,
}

struct AccountView {
    owner: String,
}

#[test]
fn test_proxy_exposes_only_the_proxy_surface() {
    let view = DescriptorBuilder::<AccountView>::new("AccountView")
        .property("owner", |this| DynValue::from(this.owner.as_str()))
        .method("greet", |_ctx, this, _args| Ok(DynValue::from(format!("hello {}", this.owner))))
        .build();
    let proxy: Arc<dyn UserDataDescriptor> = Arc::new(ProxyUserDataDescriptor::for_type::<Account, _, _>(
        "Account",
        view,
        |account: Arc<Account>| AccountView {
            owner: account.owner.clone(),
        },
    ));
    let account = Account {
        owner: "ada".to_string(),
        pin: 1234,
    };
    assert_eq!(account.pin, 1234);

    let state = ScriptState::new(EngineOptions::default());
    state
        .globals()
        .set_str("account", DynValue::UserData(UserData::new(account, proxy)));

    assert_eq!(run_in(&state, "return account.owner").unwrap().as_str(), Some("ada"));
    assert_eq!(run_in(&state, "return account:greet()").unwrap().as_str(), Some("hello ada"));
    let err = run_in(&state, "return account.pin").unwrap_err();
    assert!(err.to_string().contains("cannot access field pin"), "{}", err);
}
