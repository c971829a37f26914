//! Convert raw source values into typed TOML values for a field's
//! [`SemanticType`].
//!
//! Scalar conversion failures are errors. List elements that fail to convert
//! become the element type's zero value instead (`0`, `false`), so a list read
//! from a loosely formatted environment variable never aborts a load.

use toml::Value;

use crate::error::FlagfigError;
use crate::types::{FieldDescriptor, SemanticType};

/// A value as reported by a source, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// A flat string, as found in environment variables.
    Text(String),
    /// A structured value from a parsed flag or a config file.
    Node(Value),
}

/// Coerce `raw` into the TOML value expected by `field`.
pub fn coerce(field: &FieldDescriptor, raw: &RawValue) -> Result<Value, FlagfigError> {
    let fail = || FlagfigError::Coercion {
        key: field.key.clone(),
        value: render(raw),
        expected: field.kind,
    };

    let value = match field.kind {
        SemanticType::String => Value::String(scalar_text(raw).ok_or_else(fail)?),
        SemanticType::Int | SemanticType::Int64 => Value::Integer(to_integer(raw).ok_or_else(fail)?),
        SemanticType::Float64 => Value::Float(to_float(raw).ok_or_else(fail)?),
        SemanticType::Bool => Value::Boolean(to_bool(raw).ok_or_else(fail)?),
        SemanticType::StringList => list(raw, |item| {
            Value::String(scalar_text(item).unwrap_or_default())
        })
        .ok_or_else(fail)?,
        SemanticType::IntList => list(raw, |item| {
            Value::Integer(to_integer(item).unwrap_or(0))
        })
        .ok_or_else(fail)?,
        SemanticType::BoolList => list(raw, |item| {
            Value::Boolean(to_bool(item).unwrap_or(false))
        })
        .ok_or_else(fail)?,
    };
    Ok(value)
}

/// Parse a boolean the way command-line tools conventionally accept it.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn scalar_text(raw: &RawValue) -> Option<String> {
    match raw {
        RawValue::Text(s) => Some(s.clone()),
        RawValue::Node(node) => node_text(node),
    }
}

fn node_text(node: &Value) -> Option<String> {
    match node {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(d) => Some(d.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

fn to_integer(raw: &RawValue) -> Option<i64> {
    match raw {
        RawValue::Text(s) => s.trim().parse().ok(),
        RawValue::Node(Value::Integer(i)) => Some(*i),
        // 2^63 itself is out of range, hence the strict upper bound.
        RawValue::Node(Value::Float(f))
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
        {
            Some(*f as i64)
        }
        RawValue::Node(Value::String(s)) => s.trim().parse().ok(),
        RawValue::Node(_) => None,
    }
}

fn to_float(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Text(s) => s.trim().parse().ok(),
        RawValue::Node(Value::Float(f)) => Some(*f),
        RawValue::Node(Value::Integer(i)) => Some(*i as f64),
        RawValue::Node(Value::String(s)) => s.trim().parse().ok(),
        RawValue::Node(_) => None,
    }
}

fn to_bool(raw: &RawValue) -> Option<bool> {
    match raw {
        RawValue::Text(s) => parse_bool(s),
        RawValue::Node(Value::Boolean(b)) => Some(*b),
        RawValue::Node(Value::Integer(i)) => Some(*i != 0),
        RawValue::Node(Value::String(s)) => parse_bool(s),
        RawValue::Node(_) => None,
    }
}

/// Split `raw` into items and map each one. Text splits on whitespace; arrays
/// are taken element-wise. Tables cannot be lists.
fn list(raw: &RawValue, mut convert: impl FnMut(&RawValue) -> Value) -> Option<Value> {
    let items: Vec<RawValue> = match raw {
        RawValue::Text(s) | RawValue::Node(Value::String(s)) => s
            .split_whitespace()
            .map(|item| RawValue::Text(item.to_string()))
            .collect(),
        RawValue::Node(Value::Array(arr)) => arr.iter().cloned().map(RawValue::Node).collect(),
        RawValue::Node(Value::Table(_)) => return None,
        RawValue::Node(scalar) => vec![RawValue::Node(scalar.clone())],
    };
    Some(Value::Array(items.iter().map(&mut convert).collect()))
}

fn render(raw: &RawValue) -> String {
    match raw {
        RawValue::Text(s) => s.clone(),
        RawValue::Node(node) => node.to_string(),
    }
}
