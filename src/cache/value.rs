//! Cache Value Module
//!
//! The closed set of storable values and the coercion rules used by the
//! typed accessors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// == Value ==
/// A value stored in a cache entry.
///
/// Untagged for serde so that JSON scalars map directly onto variants:
/// `true` is `Bool`, `-3` is `Int`, `1.5` is `Float`, `"x"` is `String`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Short variant name, used in coercion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Returns true for the floating-point variant.
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => f.write_str(&hex::encode(v)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
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

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

macro_rules! value_from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        }
    )*};
}

macro_rules! value_from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::UInt(v as u64)
            }
        }
    )*};
}

value_from_signed!(i8, i16, i32, i64, isize);
value_from_unsigned!(u8, u16, u32, u64, usize);

// == Cast Error ==
/// Failure to represent a stored value as the requested type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CastError {
    #[error("cannot convert {from} to {to}")]
    Incompatible {
        from: &'static str,
        to: &'static str,
    },

    #[error("value {value} is out of range for {to}")]
    OutOfRange { value: String, to: &'static str },

    #[error("cannot parse {value:?} as {to}")]
    Parse { value: String, to: &'static str },
}

// == From Value ==
/// Conversion from a stored [`Value`] into a concrete Rust type.
pub trait FromValue: Sized {
    /// Name of the target type, used in errors.
    const TARGET: &'static str;

    fn from_value(value: Value) -> Result<Self, CastError>;
}

impl FromValue for Value {
    const TARGET: &'static str = "value";

    fn from_value(value: Value) -> Result<Self, CastError> {
        Ok(value)
    }
}

impl FromValue for bool {
    const TARGET: &'static str = "bool";

    fn from_value(value: Value) -> Result<Self, CastError> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Int(v) => Ok(v != 0),
            Value::UInt(v) => Ok(v != 0),
            Value::Float(v) => Ok(v != 0.0),
            Value::String(s) => match s.trim() {
                "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
                "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
                _ => Err(CastError::Parse {
                    value: s,
                    to: Self::TARGET,
                }),
            },
            other => Err(CastError::Incompatible {
                from: other.kind(),
                to: Self::TARGET,
            }),
        }
    }
}

impl FromValue for f64 {
    const TARGET: &'static str = "f64";

    fn from_value(value: Value) -> Result<Self, CastError> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            Value::UInt(v) => Ok(v as f64),
            Value::Bool(v) => Ok(if v { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().map_err(|_| CastError::Parse {
                value: s,
                to: Self::TARGET,
            }),
            other => Err(CastError::Incompatible {
                from: other.kind(),
                to: Self::TARGET,
            }),
        }
    }
}

impl FromValue for String {
    const TARGET: &'static str = "string";

    fn from_value(value: Value) -> Result<Self, CastError> {
        match value {
            Value::String(s) => Ok(s),
            Value::Bytes(b) => String::from_utf8(b).map_err(|_| CastError::Incompatible {
                from: "non-utf8 bytes",
                to: Self::TARGET,
            }),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    const TARGET: &'static str = "bytes";

    fn from_value(value: Value) -> Result<Self, CastError> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::String(s) => Ok(s.into_bytes()),
            other => Err(CastError::Incompatible {
                from: other.kind(),
                to: Self::TARGET,
            }),
        }
    }
}

/// Widens any numeric-looking value to `i128` so every integer target
/// can range-check from a single representation.
fn integer_of(value: Value, to: &'static str) -> Result<i128, CastError> {
    match value {
        Value::Int(v) => Ok(v as i128),
        Value::UInt(v) => Ok(v as i128),
        Value::Bool(v) => Ok(v as i128),
        Value::Float(v) => truncate_float(v, to),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(v) = trimmed.parse::<i128>() {
                return Ok(v);
            }
            match trimmed.parse::<f64>() {
                Ok(v) => truncate_float(v, to),
                Err(_) => Err(CastError::Parse { value: s, to }),
            }
        }
        Value::Bytes(_) => Err(CastError::Incompatible { from: "bytes", to }),
    }
}

fn truncate_float(v: f64, to: &'static str) -> Result<i128, CastError> {
    if !v.is_finite() {
        return Err(CastError::OutOfRange {
            value: v.to_string(),
            to,
        });
    }
    // `as` saturates, so huge floats land on i128 bounds and fail the
    // target range check below.
    Ok(v.trunc() as i128)
}

macro_rules! from_value_integer {
    ($($t:ty => $name:literal),*) => {$(
        impl FromValue for $t {
            const TARGET: &'static str = $name;

            fn from_value(value: Value) -> Result<Self, CastError> {
                let wide = integer_of(value, Self::TARGET)?;
                <$t>::try_from(wide).map_err(|_| CastError::OutOfRange {
                    value: wide.to_string(),
                    to: Self::TARGET,
                })
            }
        }
    )*};
}

from_value_integer!(
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    usize => "usize"
);

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_impls_pick_variants() {
        assert_eq!(Value::from(5), Value::Int(5));
        assert_eq!(Value::from(5u32), Value::UInt(5));
        assert_eq!(Value::from(1.5), Value::Float(1.5));
        assert_eq!(Value::from("x"), Value::String("x".to_string()));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
        assert!(Value::from(2.0f32).is_float());
    }

    #[test]
    fn test_integer_range_checks() {
        assert_eq!(i8::from_value(Value::Int(127)), Ok(127));
        assert!(matches!(
            i8::from_value(Value::Int(128)),
            Err(CastError::OutOfRange { .. })
        ));
        assert!(matches!(
            u32::from_value(Value::Int(-1)),
            Err(CastError::OutOfRange { .. })
        ));
        assert_eq!(i64::from_value(Value::UInt(42)), Ok(42));
        assert!(i64::from_value(Value::UInt(u64::MAX)).is_err());
        assert_eq!(u64::from_value(Value::UInt(u64::MAX)), Ok(u64::MAX));
    }

    #[test]
    fn test_integer_from_float_and_string() {
        assert_eq!(i32::from_value(Value::Float(3.9)), Ok(3));
        assert_eq!(i32::from_value(Value::Float(-3.9)), Ok(-3));
        assert!(i32::from_value(Value::Float(f64::NAN)).is_err());
        assert_eq!(i32::from_value(Value::String(" 17 ".to_string())), Ok(17));
        assert_eq!(i32::from_value(Value::String("2.5".to_string())), Ok(2));
        assert!(matches!(
            i32::from_value(Value::String("abc".to_string())),
            Err(CastError::Parse { .. })
        ));
        assert_eq!(u8::from_value(Value::Bool(true)), Ok(1));
    }

    #[test]
    fn test_bytes_are_not_numbers() {
        assert_eq!(
            i64::from_value(Value::Bytes(vec![1])),
            Err(CastError::Incompatible {
                from: "bytes",
                to: "i64"
            })
        );
        assert!(f64::from_value(Value::Bytes(vec![1])).is_err());
        assert!(bool::from_value(Value::Bytes(vec![1])).is_err());
    }

    #[test]
    fn test_bool_coercion() {
        assert_eq!(bool::from_value(Value::Int(0)), Ok(false));
        assert_eq!(bool::from_value(Value::UInt(9)), Ok(true));
        assert_eq!(bool::from_value(Value::String("T".to_string())), Ok(true));
        assert_eq!(bool::from_value(Value::String("false".to_string())), Ok(false));
        assert!(bool::from_value(Value::String("yes".to_string())).is_err());
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(f64::from_value(Value::Int(-2)), Ok(-2.0));
        assert_eq!(f64::from_value(Value::String("0.25".to_string())), Ok(0.25));
        assert_eq!(f64::from_value(Value::Bool(true)), Ok(1.0));
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(String::from_value(Value::Int(6)), Ok("6".to_string()));
        assert_eq!(String::from_value(Value::Float(6.0)), Ok("6".to_string()));
        assert_eq!(String::from_value(Value::Bool(true)), Ok("true".to_string()));
        assert_eq!(
            String::from_value(Value::Bytes(b"abc".to_vec())),
            Ok("abc".to_string())
        );
        assert!(String::from_value(Value::Bytes(vec![0xff, 0xfe])).is_err());
    }

    #[test]
    fn test_json_maps_onto_variants() {
        let values: Vec<Value> = serde_json::from_str(r#"[true, -3, 1.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Bool(true),
                Value::Int(-3),
                Value::Float(1.5),
                Value::String("x".to_string())
            ]
        );
        let big: Value = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(big, Value::UInt(u64::MAX));
    }
}
