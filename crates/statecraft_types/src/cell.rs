// Value cell - lazily-defaulted, kind-checked storage
//
// Parameters and arguments both store their value in a `ValueCell`. The
// cell does not own its kind: the owner passes the currently required kind on
// every access, so an argument whose style changes re-materializes on the
// next read.

use serde::{Deserialize, Serialize};

use crate::{Value, ValueKind};

/// Error raised when assigning a value of the wrong kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: ValueKind, actual: String },
}

/// Cached value plus lazy default materialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueCell {
    cached: Option<Value>,
}

impl ValueCell {
    /// Create an empty cell (reads yield the kind's default)
    pub fn new() -> Self {
        Self::default()
    }

    fn is_current(&self, kind: &ValueKind) -> bool {
        match &self.cached {
            Some(Value::Null) => kind.accepts_null(),
            Some(value) => value.kind().as_ref() == Some(kind) || *kind == ValueKind::Any,
            None => false,
        }
    }

    /// Read without caching; yields the default when the cache is stale
    pub fn get(&self, kind: &ValueKind) -> Value {
        match &self.cached {
            Some(value) if self.is_current(kind) => value.clone(),
            _ => Value::default_for(kind),
        }
    }

    /// Read, caching the default when the cache is absent or stale
    pub fn materialize(&mut self, kind: &ValueKind) -> &Value {
        if !self.is_current(kind) {
            self.cached = Some(Value::default_for(kind));
        }
        self.cached.get_or_insert_with(|| Value::default_for(kind))
    }

    /// Assign a value, checking it against the required kind
    ///
    /// `Null` is accepted only for null-accepting kinds; any other value must
    /// match the kind exactly (an `Any` slot accepts every value).
    pub fn set(&mut self, kind: &ValueKind, value: Value) -> Result<(), ValueError> {
        let accepted = match value.kind() {
            None => kind.accepts_null(),
            Some(actual) => *kind == ValueKind::Any || actual == *kind,
        };
        if !accepted {
            return Err(ValueError::TypeMismatch {
                expected: kind.clone(),
                actual: value.kind_name(),
            });
        }
        self.cached = Some(value);
        Ok(())
    }

    /// Drop the cached value
    pub fn clear(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Handle;

    #[test]
    fn test_reads_default_before_assignment() {
        let mut cell = ValueCell::new();
        assert_eq!(cell.get(&ValueKind::Int), Value::Int(0));
        assert_eq!(
            cell.materialize(&ValueKind::String),
            &Value::String(String::new())
        );
    }

    #[test]
    fn test_rejects_mismatched_kind() {
        let mut cell = ValueCell::new();
        let err = cell.set(&ValueKind::Float, Value::from("fast")).unwrap_err();
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                expected: ValueKind::Float,
                actual: "string".to_string(),
            }
        );
        cell.set(&ValueKind::Float, Value::Float(1.5)).unwrap();
        assert_eq!(cell.get(&ValueKind::Float), Value::Float(1.5));
    }

    #[test]
    fn test_null_only_for_identity_kinds() {
        let mut cell = ValueCell::new();
        assert!(cell.set(&ValueKind::Int, Value::Null).is_err());
        let door = ValueKind::object("Door");
        cell.set(&door, Value::from(Handle::new("Door"))).unwrap();
        cell.set(&door, Value::Null).unwrap();
        assert!(cell.get(&door).is_null());
    }

    #[test]
    fn test_kind_change_rematerializes() {
        let mut cell = ValueCell::new();
        cell.set(&ValueKind::Int, Value::Int(9)).unwrap();
        assert_eq!(cell.materialize(&ValueKind::Double), &Value::Double(0.0));
        assert_eq!(cell.get(&ValueKind::Int), Value::Int(0));
    }

    #[test]
    fn test_any_slot_accepts_everything() {
        let mut cell = ValueCell::new();
        cell.set(&ValueKind::Any, Value::Int(3)).unwrap();
        assert_eq!(cell.get(&ValueKind::Any), Value::Int(3));
        cell.set(&ValueKind::Any, Value::Null).unwrap();
        assert!(cell.get(&ValueKind::Any).is_null());
    }
}
