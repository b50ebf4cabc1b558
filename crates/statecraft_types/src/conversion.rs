//! Conversion engine
//!
//! Answers "can a value of kind A stand in for kind B" (memoized per ordered
//! pair) and performs the value-level coercion. Feasibility is a property of
//! the kinds only; a feasible conversion can still fail for a concrete value
//! (overflow, unparseable text).

use std::sync::OnceLock;

use dashmap::DashMap;
use tracing::trace;

use crate::{Value, ValueKind};

// ─────────────────────────────────────────────────────────────────────────────
// Conversion Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while coercing a concrete value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("Cannot convert {from} to {to}")]
    Incompatible { from: String, to: ValueKind },
    #[error("Value {value} is out of range for {to}")]
    Overflow { value: String, to: ValueKind },
    #[error("Cannot parse {text:?} as {to}")]
    Unparseable { text: String, to: ValueKind },
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Memoized convertibility table plus the coercion routine
///
/// Cache entries are keyed by the ordered `(from, to)` pair. Population is
/// idempotent, so concurrent first lookups only duplicate work.
#[derive(Debug, Default)]
pub struct Conversion {
    cache: DashMap<(ValueKind, ValueKind), bool>,
}

static GLOBAL: OnceLock<Conversion> = OnceLock::new();

impl Conversion {
    /// Create an engine with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide engine
    pub fn global() -> &'static Conversion {
        GLOBAL.get_or_init(Conversion::new)
    }

    /// Whether values of kind `from` can be coerced to kind `to`
    pub fn can_convert(&self, from: &ValueKind, to: &ValueKind) -> bool {
        let key = (from.clone(), to.clone());
        if let Some(hit) = self.cache.get(&key) {
            return *hit;
        }

        let possible = self.feasible(from, to);
        trace!(%from, %to, possible, "conversion pair computed");
        self.cache.insert(key, possible);
        possible
    }

    /// Number of memoized pairs
    pub fn cached_pairs(&self) -> usize {
        self.cache.len()
    }

    fn feasible(&self, from: &ValueKind, to: &ValueKind) -> bool {
        if *to == ValueKind::Any || from == to {
            return true;
        }
        if from.is_identity() || to.is_identity() {
            return false;
        }
        if *from == ValueKind::Bool || *to == ValueKind::Bool {
            return false;
        }
        if *from == ValueKind::Any {
            return false;
        }
        // Empirical rule: the zero value of `from` must coerce to `to`.
        self.convert(Value::default_for(from), to).is_ok()
    }

    /// Coerce a value to the given kind
    ///
    /// Null values and `Any` targets pass through unchanged.
    pub fn convert(&self, value: Value, to: &ValueKind) -> Result<Value, ConversionError> {
        if value.is_null() || *to == ValueKind::Any {
            return Ok(value);
        }

        let from = match value.kind() {
            Some(kind) => kind,
            None => return Ok(value),
        };
        if from == *to {
            return Ok(value);
        }
        if from.is_identity() || to.is_identity() {
            return Err(ConversionError::Incompatible {
                from: from.to_string(),
                to: to.clone(),
            });
        }

        match to {
            ValueKind::Bool => to_bool(&value).map(Value::Bool),
            ValueKind::Int => {
                let wide = to_integer(&value, to)?;
                i32::try_from(wide)
                    .map(Value::Int)
                    .map_err(|_| overflow(&value, to))
            }
            ValueKind::Long => to_integer(&value, to).map(Value::Long),
            ValueKind::Float => {
                let wide = to_float(&value, to)?;
                let narrow = wide as f32;
                if wide.is_finite() && narrow.is_infinite() {
                    return Err(overflow(&value, to));
                }
                Ok(Value::Float(narrow))
            }
            ValueKind::Double => to_float(&value, to).map(Value::Double),
            ValueKind::String => Ok(Value::String(value.to_string())),
            _ => Err(ConversionError::Incompatible {
                from: from.to_string(),
                to: to.clone(),
            }),
        }
    }
}

/// `can_convert` on the process-wide engine
pub fn can_convert(from: &ValueKind, to: &ValueKind) -> bool {
    Conversion::global().can_convert(from, to)
}

/// `convert` on the process-wide engine
pub fn convert(value: Value, to: &ValueKind) -> Result<Value, ConversionError> {
    Conversion::global().convert(value, to)
}

// ─────────────────────────────────────────────────────────────────────────────
// Scalar Coercions
// ─────────────────────────────────────────────────────────────────────────────

fn overflow(value: &Value, to: &ValueKind) -> ConversionError {
    ConversionError::Overflow {
        value: value.to_string(),
        to: to.clone(),
    }
}

fn to_bool(value: &Value) -> Result<bool, ConversionError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(i) => Ok(*i != 0),
        Value::Long(i) => Ok(*i != 0),
        Value::Float(x) => Ok(*x != 0.0),
        Value::Double(x) => Ok(*x != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConversionError::Unparseable {
                text: s.clone(),
                to: ValueKind::Bool,
            }),
        },
        other => Err(ConversionError::Incompatible {
            from: other.kind_name(),
            to: ValueKind::Bool,
        }),
    }
}

fn to_integer(value: &Value, to: &ValueKind) -> Result<i64, ConversionError> {
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Int(i) => Ok(i64::from(*i)),
        Value::Long(i) => Ok(*i),
        Value::Float(x) => float_to_integer(f64::from(*x)).ok_or_else(|| overflow(value, to)),
        Value::Double(x) => float_to_integer(*x).ok_or_else(|| overflow(value, to)),
        Value::String(s) => s.trim().parse().map_err(|_| ConversionError::Unparseable {
            text: s.clone(),
            to: to.clone(),
        }),
        other => Err(ConversionError::Incompatible {
            from: other.kind_name(),
            to: to.clone(),
        }),
    }
}

// Rounds half to even; `None` when the result does not fit in an i64.
fn float_to_integer(x: f64) -> Option<i64> {
    if !x.is_finite() {
        return None;
    }
    let rounded = x.round_ties_even();
    // i64::MAX as f64 is 2^63, which is itself out of range.
    if rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
        return None;
    }
    Some(rounded as i64)
}

fn to_float(value: &Value, to: &ValueKind) -> Result<f64, ConversionError> {
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Int(i) => Ok(f64::from(*i)),
        Value::Long(i) => Ok(*i as f64),
        Value::Float(x) => Ok(f64::from(*x)),
        Value::Double(x) => Ok(*x),
        Value::String(s) => s.trim().parse().map_err(|_| ConversionError::Unparseable {
            text: s.clone(),
            to: to.clone(),
        }),
        other => Err(ConversionError::Incompatible {
            from: other.kind_name(),
            to: to.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_kinds() -> Vec<ValueKind> {
        let mut kinds = ValueKind::scalars().to_vec();
        kinds.extend([
            ValueKind::Any,
            ValueKind::object("Actor"),
            ValueKind::Parameter,
            ValueKind::Method,
        ]);
        kinds
    }

    #[test]
    fn test_reflexive_and_any_always_convertible() {
        let engine = Conversion::new();
        for kind in all_kinds() {
            assert!(engine.can_convert(&kind, &kind), "{kind} -> {kind}");
            assert!(engine.can_convert(&kind, &ValueKind::Any), "{kind} -> any");
        }
    }

    #[test]
    fn test_bool_is_isolated() {
        let engine = Conversion::new();
        assert!(!engine.can_convert(&ValueKind::Bool, &ValueKind::Int));
        assert!(!engine.can_convert(&ValueKind::Int, &ValueKind::Bool));
        assert!(!engine.can_convert(&ValueKind::Bool, &ValueKind::String));
        assert!(!engine.can_convert(&ValueKind::Double, &ValueKind::Bool));
    }

    #[test]
    fn test_identity_kinds_never_coerce() {
        let engine = Conversion::new();
        let actor = ValueKind::object("Actor");
        assert!(!engine.can_convert(&actor, &ValueKind::String));
        assert!(!engine.can_convert(&ValueKind::Int, &actor));
        assert!(!engine.can_convert(&actor, &ValueKind::object("Door")));
        assert!(!engine.can_convert(&ValueKind::Parameter, &ValueKind::Method));
    }

    #[test]
    fn test_numeric_matrix() {
        let engine = Conversion::new();
        let numerics = [
            ValueKind::Int,
            ValueKind::Long,
            ValueKind::Float,
            ValueKind::Double,
        ];
        for from in &numerics {
            for to in &numerics {
                assert!(engine.can_convert(from, to), "{from} -> {to}");
            }
            assert!(engine.can_convert(from, &ValueKind::String));
            // The default empty string does not parse as a number.
            assert!(!engine.can_convert(&ValueKind::String, from));
        }
        assert!(!engine.can_convert(&ValueKind::Any, &ValueKind::Int));
    }

    #[test]
    fn test_cache_is_directional_and_idempotent() {
        let engine = Conversion::new();
        let first = engine.can_convert(&ValueKind::Int, &ValueKind::String);
        let reverse = engine.can_convert(&ValueKind::String, &ValueKind::Int);
        assert!(first);
        assert!(!reverse);
        assert_eq!(engine.cached_pairs(), 2);

        for _ in 0..3 {
            assert_eq!(engine.can_convert(&ValueKind::Int, &ValueKind::String), first);
        }
        assert_eq!(engine.cached_pairs(), 2);
    }

    #[test]
    fn test_convert_passes_null_and_any_through() {
        let engine = Conversion::new();
        assert_eq!(engine.convert(Value::Null, &ValueKind::Int).unwrap(), Value::Null);
        let handle = Value::from(crate::Handle::new("Actor"));
        assert_eq!(engine.convert(handle.clone(), &ValueKind::Any).unwrap(), handle);
    }

    #[test]
    fn test_convert_numeric() {
        let engine = Conversion::new();
        assert_eq!(
            engine.convert(Value::Int(3), &ValueKind::Float).unwrap(),
            Value::Float(3.0)
        );
        assert_eq!(
            engine.convert(Value::Double(2.5), &ValueKind::Int).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            engine.convert(Value::Double(3.5), &ValueKind::Long).unwrap(),
            Value::Long(4)
        );
        assert_eq!(
            engine.convert(Value::Long(42), &ValueKind::String).unwrap(),
            Value::String("42".to_string())
        );
    }

    #[test]
    fn test_convert_reports_value_level_failures() {
        let engine = Conversion::new();
        assert!(matches!(
            engine.convert(Value::Long(i64::from(i32::MAX) + 1), &ValueKind::Int),
            Err(ConversionError::Overflow { .. })
        ));
        assert!(matches!(
            engine.convert(Value::Double(f64::NAN), &ValueKind::Long),
            Err(ConversionError::Overflow { .. })
        ));
        assert!(matches!(
            engine.convert(Value::Double(1e300), &ValueKind::Float),
            Err(ConversionError::Overflow { .. })
        ));
        assert!(matches!(
            engine.convert(Value::from("abc"), &ValueKind::Double),
            Err(ConversionError::Unparseable { .. })
        ));
        assert!(matches!(
            engine.convert(Value::from(crate::Handle::new("Actor")), &ValueKind::String),
            Err(ConversionError::Incompatible { .. })
        ));
    }

    #[test]
    fn test_convert_to_bool_at_value_level() {
        let engine = Conversion::new();
        assert_eq!(
            engine.convert(Value::Int(2), &ValueKind::Bool).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            engine.convert(Value::from(" False "), &ValueKind::Bool).unwrap(),
            Value::Bool(false)
        );
    }
}
