// Value kinds - the type tags of the dynamic value model
//
// Every parameter, argument and method signature is described by a
// `ValueKind`. Scalar kinds are coerced by the conversion engine; identity
// kinds are compared and stored by reference and never coerced.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Value Kind
// ─────────────────────────────────────────────────────────────────────────────

/// Type tag carried by every value slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueKind {
    /// Boolean
    Bool,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// UTF-8 string
    String,
    /// Accepts any value; universal conversion target
    Any,
    /// Opaque host object referenced by identity (e.g. "Actor")
    Object(String),
    /// Reference to a machine parameter
    Parameter,
    /// Reference to a bound method call
    Method,
}

impl ValueKind {
    /// Create a host object kind
    pub fn object(type_id: impl Into<String>) -> Self {
        ValueKind::Object(type_id.into())
    }

    /// Identity kinds are stored by reference and never coerced
    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            ValueKind::Object(_) | ValueKind::Parameter | ValueKind::Method
        )
    }

    /// Whether a slot of this kind may hold "no value"
    pub fn accepts_null(&self) -> bool {
        self.is_identity() || matches!(self, ValueKind::Any)
    }

    /// All scalar kinds, in declaration order
    pub fn scalars() -> [ValueKind; 6] {
        [
            ValueKind::Bool,
            ValueKind::Int,
            ValueKind::Long,
            ValueKind::Float,
            ValueKind::Double,
            ValueKind::String,
        ]
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Long => write!(f, "long"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::Double => write!(f, "double"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Any => write!(f, "any"),
            ValueKind::Object(type_id) => write!(f, "object:{}", type_id),
            ValueKind::Parameter => write!(f, "parameter"),
            ValueKind::Method => write!(f, "method"),
        }
    }
}

/// Error returned when a kind name cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown value kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ValueKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "bool" => ValueKind::Bool,
            "int" => ValueKind::Int,
            "long" => ValueKind::Long,
            "float" => ValueKind::Float,
            "double" => ValueKind::Double,
            "string" => ValueKind::String,
            "any" => ValueKind::Any,
            "parameter" => ValueKind::Parameter,
            "method" => ValueKind::Method,
            other => match other.strip_prefix("object:") {
                Some(type_id) if !type_id.is_empty() => ValueKind::object(type_id),
                _ => return Err(UnknownKind(s.to_string())),
            },
        };
        Ok(kind)
    }
}

impl TryFrom<String> for ValueKind {
    type Error = UnknownKind;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ValueKind> for String {
    fn from(kind: ValueKind) -> Self {
        kind.to_string()
    }
}
