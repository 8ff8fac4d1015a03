//! Coerced attribute values.
//!
//! Event attributes arrive as untyped tokens (CSV-like text). `Value` is the
//! small dynamic type a token is coerced into, and the only type predicates
//! and accessors see. Strongly-typed code downstream is expected to match
//! on the variant it expects and surface a [`crate::error::CepError::TypeMismatch`]
//! otherwise.

use serde::{Deserialize, Serialize};

/// A coerced attribute value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Parses a single CSV-like token: all-digit -> int, else parseable -> float, else string.
    ///
    /// Mirrors `original_source`'s `Processor.get_event_from_line.convert_value`.
    pub fn parse(token: &str) -> Value {
        if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(i) = token.parse::<i64>() {
                return Value::Int(i);
            }
        }
        if let Ok(f) = token.parse::<f64>() {
            return Value::Float(f);
        }
        Value::Str(token.to_string())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Str(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Display form used by the reference event source and file sink (comma-joined attributes).
    pub fn display(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_digits_to_int() {
        assert_eq!(Value::parse("42"), Value::Int(42));
    }

    #[test]
    fn coerces_decimal_to_float() {
        assert_eq!(Value::parse("3.14"), Value::Float(3.14));
    }

    #[test]
    fn leaves_non_numeric_as_string() {
        assert_eq!(Value::parse("AAME"), Value::Str("AAME".to_string()));
    }

    #[test]
    fn negative_numbers_are_strings() {
        // matches original_source: str.isdigit("-5") is False, float("-5") succeeds
        assert_eq!(Value::parse("-5"), Value::Float(-5.0));
    }
}
