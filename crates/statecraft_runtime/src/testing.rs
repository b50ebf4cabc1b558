// Test fixtures: small modules that record what they were called with

use std::cell::RefCell;
use std::sync::Arc;

use statecraft_types::{ConversionError, Handle, Typed, Value, ValueKind};

use crate::{MethodDef, MethodRegistry, module};

thread_local! {
    static CALLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub fn record(call: impl Into<String>) {
    CALLS.with(|calls| calls.borrow_mut().push(call.into()));
}

/// Drain the calls recorded on this thread
pub fn take_calls() -> Vec<String> {
    CALLS.with(|calls| std::mem::take(&mut *calls.borrow_mut()))
}

/// Host identity type used by `Effects::touch`
#[derive(Debug, Clone, PartialEq)]
pub struct Door(pub Handle);

impl Typed for Door {
    fn kind() -> ValueKind {
        ValueKind::object("Door")
    }

    fn into_value(self) -> Value {
        Value::Handle(self.0)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Handle(handle) if handle.type_id == "Door" => Ok(Door(handle)),
            other => Err(ConversionError::Incompatible {
                from: other.kind_name(),
                to: Self::kind(),
            }),
        }
    }
}

pub struct Gate;

#[module(name = "Gate")]
impl Gate {
    #[method(name = "Gate/open")]
    fn open() -> bool {
        record("open");
        true
    }

    #[method(name = "Gate/closed")]
    fn closed() -> bool {
        record("closed");
        false
    }

    #[method(name = "Gate/at least")]
    fn at_least(value: f32, threshold: f32) -> bool {
        value >= threshold
    }
}

pub struct Numbers;

#[module(name = "Numbers")]
impl Numbers {
    #[method(name = "Numbers/seven")]
    fn seven() -> i32 {
        7
    }

    #[method(name = "Numbers/huge")]
    fn huge() -> i64 {
        i64::MAX
    }

    #[method(name = "Numbers/add")]
    fn add(a: i32, b: i32) -> i32 {
        a.wrapping_add(b)
    }

    #[method(name = "Numbers/half")]
    fn half(value: f32) -> f32 {
        value / 2.0
    }
}

pub struct Effects;

#[module(name = "Effects")]
impl Effects {
    #[method(name = "Effects/say")]
    fn say(text: String) {
        record(format!("say:{text}"));
    }

    #[method(name = "Effects/record float")]
    fn record_float(value: f32) {
        record(format!("float:{value}"));
    }

    #[method(name = "Effects/record int")]
    fn record_int(value: i32) {
        record(format!("int:{value}"));
    }

    #[method(name = "Effects/touch")]
    fn touch(door: Door) {
        record(format!("touch:{}", door.0.id));
    }
}

pub fn registry() -> MethodRegistry {
    MethodRegistry::builder()
        .module::<Gate>()
        .module::<Numbers>()
        .module::<Effects>()
        .discover()
        .unwrap()
}

/// Look up a fixture method, panicking when missing
pub fn def(registry: &MethodRegistry, module: &str, method: &str) -> Arc<MethodDef> {
    Arc::clone(
        registry
            .find(module, method)
            .unwrap_or_else(|| panic!("missing fixture method {module}::{method}")),
    )
}
