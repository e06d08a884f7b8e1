//! Numeric coercion and display helpers shared by instructions
//!
//! Chain events usually carry amounts as decimal or `0x` hex strings, so
//! numeric instructions accept those alongside JSON numbers. Integers are
//! kept exact as `i128` and fall back to `f64` when they leave that range.

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// A number read from a variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i128),
    Float(f64),
}

impl Numeric {
    /// Read a JSON number or a numeric string
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Self::from_number(n),
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    fn from_number(n: &Number) -> Option<Self> {
        if let Some(i) = n.as_i64() {
            Some(Self::Int(i as i128))
        } else if let Some(u) = n.as_u64() {
            Some(Self::Int(u as i128))
        } else {
            n.as_f64().map(Self::Float)
        }
    }

    /// Parse decimal, `0x` hex or floating point text
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            return i128::from_str_radix(hex, 16).ok().map(Self::Int);
        }
        if let Ok(i) = text.parse::<i128>() {
            return Some(Self::Int(i));
        }
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Self::Float)
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
        }
    }

    /// Truncate towards zero
    pub fn truncate(&self) -> Option<i128> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() && f.abs() < i128::MAX as f64 => Some(f.trunc() as i128),
            Self::Float(_) => None,
        }
    }

    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }

    /// Convert back to JSON
    ///
    /// Integers outside the `i64`/`u64` range become decimal strings;
    /// non-finite floats have no JSON form and yield `None`.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Int(i) => Some(int_to_value(*i)),
            Self::Float(f) => Number::from_f64(*f).map(Value::Number),
        }
    }
}

pub fn int_to_value(i: i128) -> Value {
    if let Ok(small) = i64::try_from(i) {
        Value::from(small)
    } else if let Ok(unsigned) = u64::try_from(i) {
        Value::from(unsigned)
    } else {
        Value::String(i.to_string())
    }
}

/// Text form of a value for logs and templates; strings are not quoted
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
