//! Coercing schema constructors.
//!
//! Coercion runs before the base type test and converts across primitive
//! types with loose, host-language-style rules. It never fails: a value
//! that cannot be converted is left untouched, and the type test then
//! reports the ordinary type mismatch.
//!
//! ```rust
//! use zodiac::coerce;
//!
//! let n = coerce::number();
//! assert_eq!(n.parse(serde_json::json!("42")).unwrap(), zodiac::Value::Number(42.0));
//! ```

use crate::schema::{Schema, SchemaKind};
use crate::value::Value;
use chrono::{DateTime, TimeZone, Utc};

/// Target of a coercion step, attached to at most one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CoerceTo {
    String,
    Number,
    Boolean,
    BigInt,
    Date,
}

impl CoerceTo {
    pub(crate) fn apply(self, value: Value) -> Value {
        match self {
            CoerceTo::String => to_string(value),
            CoerceTo::Number => to_number(value),
            CoerceTo::Boolean => Value::Bool(truthy(&value)),
            CoerceTo::BigInt => to_bigint(value),
            CoerceTo::Date => to_date(value),
        }
    }
}

fn to_string(value: Value) -> Value {
    match value {
        Value::String(_) => value,
        Value::Number(n) => Value::String(format_number(n)),
        Value::BigInt(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Date(d) => Value::String(d.to_rfc3339()),
        Value::Null => Value::String("null".to_string()),
        Value::Undefined => Value::String("undefined".to_string()),
        // Composites have no sensible string form; let the type test report.
        other => other,
    }
}

fn to_number(value: Value) -> Value {
    match value {
        Value::Number(_) => value,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Number(0.0)
            } else {
                match trimmed.parse::<f64>() {
                    Ok(n) => Value::Number(n),
                    Err(_) => Value::String(s),
                }
            }
        }
        Value::Bool(b) => Value::Number(if b { 1.0 } else { 0.0 }),
        Value::BigInt(n) => Value::Number(n as f64),
        Value::Date(d) => Value::Number(d.timestamp_millis() as f64),
        Value::Null => Value::Number(0.0),
        other => other,
    }
}

fn to_bigint(value: Value) -> Value {
    match value {
        Value::BigInt(_) => value,
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Value::BigInt(n as i64),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => Value::BigInt(n),
            Err(_) => Value::String(s),
        },
        Value::Bool(b) => Value::BigInt(if b { 1 } else { 0 }),
        other => other,
    }
}

fn to_date(value: Value) -> Value {
    match value {
        Value::Date(_) => value,
        Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(d) => Value::Date(d.with_timezone(&Utc)),
            Err(_) => Value::String(s),
        },
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => {
            match Utc.timestamp_millis_opt(n as i64).single() {
                Some(d) => Value::Date(d),
                None => Value::Number(n),
            }
        }
        Value::BigInt(n) => match Utc.timestamp_millis_opt(n).single() {
            Some(d) => Value::Date(d),
            None => Value::BigInt(n),
        },
        other => other,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::BigInt(n) => *n != 0,
        Value::String(s) => !s.is_empty(),
        Value::Date(_) => true,
        Value::Array(_) | Value::Object(_) | Value::Set(_) | Value::Map(_) => true,
    }
}

/// Whole numbers render without a trailing `.0`.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// A string schema that stringifies primitive input first.
pub fn string() -> Schema {
    Schema::build(SchemaKind::String, Vec::new(), Some(CoerceTo::String))
}

/// A number schema that parses strings and converts other primitives first.
pub fn number() -> Schema {
    Schema::build(SchemaKind::Number, Vec::new(), Some(CoerceTo::Number))
}

/// A boolean schema applying truthiness to any input.
pub fn boolean() -> Schema {
    Schema::build(SchemaKind::Boolean, Vec::new(), Some(CoerceTo::Boolean))
}

/// A bigint schema converting whole numbers and integer strings first.
pub fn bigint() -> Schema {
    Schema::build(SchemaKind::BigInt, Vec::new(), Some(CoerceTo::BigInt))
}

/// A date schema parsing RFC 3339 strings and epoch-millisecond numbers
/// first.
pub fn date() -> Schema {
    Schema::build(SchemaKind::Date, Vec::new(), Some(CoerceTo::Date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_coercion() {
        assert_eq!(CoerceTo::Number.apply(Value::from("42")), Value::Number(42.0));
        assert_eq!(CoerceTo::Number.apply(Value::from("  3.5 ")), Value::Number(3.5));
        assert_eq!(CoerceTo::Number.apply(Value::from("")), Value::Number(0.0));
        assert_eq!(CoerceTo::Number.apply(Value::from(true)), Value::Number(1.0));
        assert_eq!(CoerceTo::Number.apply(Value::Null), Value::Number(0.0));
        // Unparseable input is left for the type test.
        assert_eq!(CoerceTo::Number.apply(Value::from("abc")), Value::from("abc"));
    }

    #[test]
    fn test_string_coercion_drops_trailing_zero() {
        assert_eq!(CoerceTo::String.apply(Value::Number(3.0)), Value::from("3"));
        assert_eq!(CoerceTo::String.apply(Value::Number(3.25)), Value::from("3.25"));
        assert_eq!(CoerceTo::String.apply(Value::Bool(false)), Value::from("false"));
        assert_eq!(CoerceTo::String.apply(Value::Null), Value::from("null"));
    }

    #[test]
    fn test_boolean_truthiness() {
        assert_eq!(CoerceTo::Boolean.apply(Value::from(0)), Value::Bool(false));
        assert_eq!(CoerceTo::Boolean.apply(Value::from("")), Value::Bool(false));
        assert_eq!(CoerceTo::Boolean.apply(Value::from("no")), Value::Bool(true));
        assert_eq!(CoerceTo::Boolean.apply(Value::Undefined), Value::Bool(false));
        assert_eq!(CoerceTo::Boolean.apply(Value::Array(vec![])), Value::Bool(true));
    }

    #[test]
    fn test_bigint_rejects_fractions() {
        assert_eq!(CoerceTo::BigInt.apply(Value::Number(7.0)), Value::BigInt(7));
        assert_eq!(CoerceTo::BigInt.apply(Value::Number(7.5)), Value::Number(7.5));
        assert_eq!(CoerceTo::BigInt.apply(Value::from("12")), Value::BigInt(12));
    }

    #[test]
    fn test_date_from_millis_and_string() {
        let coerced = CoerceTo::Date.apply(Value::Number(0.0));
        assert_eq!(coerced, Value::Date(Utc.timestamp_millis_opt(0).single().unwrap()));

        let coerced = CoerceTo::Date.apply(Value::from("2024-01-02T03:04:05Z"));
        assert!(matches!(coerced, Value::Date(_)));

        assert_eq!(CoerceTo::Date.apply(Value::from("not a date")), Value::from("not a date"));
    }
}
