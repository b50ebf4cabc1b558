//! Dynamic value type carried by parameters, arguments and method results
//!
//! This module provides the tagged union that replaces runtime type
//! inspection: every value knows its own [`ValueKind`], and the bridge trait
//! [`Typed`] maps plain Rust types onto it for registered method thunks.

use serde::{Deserialize, Serialize};

use crate::{Conversion, ConversionError, MethodId, ParameterId, ValueKind};

// ─────────────────────────────────────────────────────────────────────────────
// Handle Types
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for opaque handles to host objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(pub uuid::Uuid);

impl HandleId {
    /// Create a new unique handle ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an opaque host object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    /// Unique handle ID
    pub id: HandleId,
    /// Type identifier of the referenced object
    pub type_id: String,
}

impl Handle {
    /// Create a new handle
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            id: HandleId::new(),
            type_id: type_id.into(),
        }
    }

    /// Create a handle with a specific ID
    pub fn with_id(id: HandleId, type_id: impl Into<String>) -> Self {
        Self {
            id,
            type_id: type_id.into(),
        }
    }

    /// Kind of values holding this handle
    pub fn kind(&self) -> ValueKind {
        ValueKind::object(self.type_id.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value
// ─────────────────────────────────────────────────────────────────────────────

/// A single dynamically-typed value
///
/// `Null` is "no value": only valid in slots whose kind accepts null
/// (identity kinds and `Any`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    /// No value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Opaque host object
    Handle(Handle),
    /// Reference to a machine parameter
    Parameter(ParameterId),
    /// Reference to a bound method call
    Method(MethodId),
}

impl Value {
    /// Zero value of a kind; identity kinds and `Any` default to `Null`
    pub fn default_for(kind: &ValueKind) -> Self {
        match kind {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int => Value::Int(0),
            ValueKind::Long => Value::Long(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Double => Value::Double(0.0),
            ValueKind::String => Value::String(String::new()),
            ValueKind::Any
            | ValueKind::Object(_)
            | ValueKind::Parameter
            | ValueKind::Method => Value::Null,
        }
    }

    /// Runtime kind of this value (`None` for `Null`)
    pub fn kind(&self) -> Option<ValueKind> {
        let kind = match self {
            Value::Null => return None,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Handle(h) => h.kind(),
            Value::Parameter(_) => ValueKind::Parameter,
            Value::Method(_) => ValueKind::Method,
        };
        Some(kind)
    }

    /// Kind name for diagnostics ("null" when there is no value)
    pub fn kind_name(&self) -> String {
        self.kind()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "null".to_string())
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as i64 (from either integer kind)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i as i64),
            Value::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 (from any numeric kind)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Long(i) => Some(*i as f64),
            Value::Float(f) => Some(*f as f64),
            Value::Double(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as handle reference
    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// Get the referenced parameter
    pub fn as_parameter(&self) -> Option<ParameterId> {
        match self {
            Value::Parameter(id) => Some(*id),
            _ => None,
        }
    }

    /// Get the referenced bound method
    pub fn as_method(&self) -> Option<MethodId> {
        match self {
            Value::Method(id) => Some(*id),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Handle(h) => write!(f, "{}({})", h.type_id, h.id),
            Value::Parameter(id) => write!(f, "{}", id),
            Value::Method(id) => write!(f, "{}", id),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// From Implementations
// ─────────────────────────────────────────────────────────────────────────────

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Handle> for Value {
    fn from(h: Handle) -> Self {
        Value::Handle(h)
    }
}

impl From<ParameterId> for Value {
    fn from(id: ParameterId) -> Self {
        Value::Parameter(id)
    }
}

impl From<MethodId> for Value {
    fn from(id: MethodId) -> Self {
        Value::Method(id)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed Bridge
// ─────────────────────────────────────────────────────────────────────────────

/// Rust types that can appear in a registered method signature
///
/// Generated method thunks use `kind()` to describe the signature and
/// `from_value` / `into_value` to cross the dynamic boundary. Host identity
/// types implement this for a newtype around [`Handle`].
pub trait Typed: Sized {
    /// Kind describing this type in a signature
    fn kind() -> ValueKind;

    /// Wrap into a dynamic value
    fn into_value(self) -> Value;

    /// Extract from a dynamic value, coercing scalars when possible
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

macro_rules! typed_scalar {
    ($ty:ty, $kind:ident) => {
        impl Typed for $ty {
            fn kind() -> ValueKind {
                ValueKind::$kind
            }

            fn into_value(self) -> Value {
                Value::$kind(self)
            }

            fn from_value(value: Value) -> Result<Self, ConversionError> {
                match Conversion::global().convert(value, &ValueKind::$kind)? {
                    Value::$kind(v) => Ok(v),
                    other => Err(ConversionError::Incompatible {
                        from: other.kind_name(),
                        to: ValueKind::$kind,
                    }),
                }
            }
        }
    };
}

typed_scalar!(bool, Bool);
typed_scalar!(i32, Int);
typed_scalar!(i64, Long);
typed_scalar!(f32, Float);
typed_scalar!(f64, Double);
typed_scalar!(String, String);

impl Typed for Value {
    fn kind() -> ValueKind {
        ValueKind::Any
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
