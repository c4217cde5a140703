use crate::common::Value;
use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use std::fmt::{Display, Formatter};

/// Target type of a `field:type` criteria key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastType {
    Int,
    Float,
    String,
    Bool,
    Array,
}

impl CastType {
    pub fn parse(name: &str) -> NestdocResult<CastType> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(CastType::Int),
            "float" | "double" => Ok(CastType::Float),
            "string" => Ok(CastType::String),
            "bool" | "boolean" => Ok(CastType::Bool),
            "array" => Ok(CastType::Array),
            _ => {
                log::error!("Unknown cast type {}", name);
                Err(NestdocError::new(
                    &format!("Unknown cast type '{}', expected int, float, string, bool or array", name),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }

    /// Converts `value` to this type, never failing.
    ///
    /// Strings cast to numbers through their leading numeric prefix (`"12abc"`
    /// is 12, `"abc"` is 0). Booleans cast to 1/0 and from
    /// [Value::is_empty_like]. Scalars cast to arrays as one-element arrays.
    pub fn cast(&self, value: &Value) -> Value {
        match self {
            CastType::Int => Value::I64(to_f64(value).trunc() as i64),
            CastType::Float => Value::F64(to_f64(value)),
            CastType::String => Value::String(value.to_plain_string()),
            CastType::Bool => Value::Bool(!value.is_empty_like()),
            CastType::Array => match value {
                Value::Array(_) => value.clone(),
                Value::Null => Value::Array(vec![]),
                Value::Document(doc) => {
                    Value::Array(doc.iter().map(|(_, v)| v.clone()).collect())
                }
                other => Value::Array(vec![other.clone()]),
            },
        }
    }
}

impl Display for CastType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CastType::Int => "int",
            CastType::Float => "float",
            CastType::String => "string",
            CastType::Bool => "bool",
            CastType::Array => "array",
        };
        write!(f, "{}", name)
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(v) => {
            if *v {
                1.0
            } else {
                0.0
            }
        }
        Value::I64(v) => *v as f64,
        Value::F64(v) => *v,
        Value::String(v) => leading_number(v),
        Value::Array(v) => {
            if v.is_empty() {
                0.0
            } else {
                1.0
            }
        }
        Value::Document(v) => {
            if v.is_empty() {
                0.0
            } else {
                1.0
            }
        }
    }
}

fn leading_number(text: &str) -> f64 {
    let text = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (index, ch) in text.char_indices() {
        match ch {
            '+' | '-' if index == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = index + ch.len_utf8();
    }

    if !seen_digit {
        return 0.0;
    }
    text[..end].trim_end_matches('.').parse::<f64>().unwrap_or(0.0)
}
