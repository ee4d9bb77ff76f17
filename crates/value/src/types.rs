//! Value and data type definitions
//!
//! Values are pure data; arithmetic and comparison live in `evaluator`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A row of values, positionally aligned with a record type's fields
pub type Row = Vec<Value>;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    I32,
    I64,
    F64,
    Decimal,
    Str,
    /// Type of the NULL literal; compatible with every other type
    Null,
}

impl DataType {
    /// Check if this type is an integer
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::I32 | DataType::I64)
    }

    /// Check if this type is numeric (integer, float, or decimal)
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::I32 | DataType::I64 | DataType::F64 | DataType::Decimal
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataType::Null)
    }

    /// Whether a value of type `other` may be stored where `self` is expected.
    ///
    /// Allows exact matches, NULL, integer widening and any numeric into
    /// F64 or Decimal.
    pub fn accepts(&self, other: &DataType) -> bool {
        if self == other || other.is_null() {
            return true;
        }
        match self {
            DataType::I64 => matches!(other, DataType::I32),
            DataType::F64 | DataType::Decimal => other.is_numeric(),
            _ => false,
        }
    }

    /// Whether values of the two types can be compared with each other
    pub fn comparable_with(&self, other: &DataType) -> bool {
        self == other
            || self.is_null()
            || other.is_null()
            || (self.is_numeric() && other.is_numeric())
    }

    /// Result type of `+ - * /` over the two types, if both are numeric.
    ///
    /// I32 with I32 stays I32, mixed integers widen to I64, any Decimal
    /// operand yields Decimal and otherwise any F64 operand yields F64.
    pub fn arithmetic_result(&self, other: &DataType) -> Option<DataType> {
        match (self, other) {
            (DataType::Null, t) | (t, DataType::Null) if t.is_numeric() || t.is_null() => {
                Some(*t)
            }
            (a, b) if !a.is_numeric() || !b.is_numeric() => None,
            (DataType::Decimal, _) | (_, DataType::Decimal) => Some(DataType::Decimal),
            (DataType::F64, _) | (_, DataType::F64) => Some(DataType::F64),
            (DataType::I32, DataType::I32) => Some(DataType::I32),
            _ => Some(DataType::I64),
        }
    }

    /// The common type of two branch results (CASE, COALESCE), if any
    pub fn unify(&self, other: &DataType) -> Option<DataType> {
        if self == other || other.is_null() {
            Some(*self)
        } else if self.is_null() {
            Some(*other)
        } else {
            self.arithmetic_result(other)
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => write!(f, "BOOLEAN"),
            DataType::I32 => write!(f, "INT"),
            DataType::I64 => write!(f, "BIGINT"),
            DataType::F64 => write!(f, "DOUBLE"),
            DataType::Decimal => write!(f, "DECIMAL"),
            DataType::Str => write!(f, "VARCHAR"),
            DataType::Null => write!(f, "NULL"),
        }
    }
}

/// A single typed value
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Decimal(Decimal),
    Str(String),
}

impl Value {
    /// Create a string value
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is any integer type
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::I32(_) | Value::I64(_))
    }

    /// Check if value is numeric (integer, float, or decimal)
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::I32(_) | Value::I64(_) | Value::F64(_) | Value::Decimal(_)
        )
    }

    /// Get the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Bool,
            Value::I32(_) => DataType::I32,
            Value::I64(_) => DataType::I64,
            Value::F64(_) => DataType::F64,
            Value::Decimal(_) => DataType::Decimal,
            Value::Str(_) => DataType::Str,
        }
    }

    /// Borrow the string payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::Decimal(_) => "decimal",
            Value::Str(_) => "string",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({:?})", b),
            Value::I32(i) => write!(f, "I32({:?})", i),
            Value::I64(i) => write!(f, "I64({:?})", i),
            Value::F64(fl) => write!(f, "F64({:?})", fl),
            Value::Decimal(d) => write!(f, "Decimal({:?})", d),
            Value::Str(s) => write!(f, "Str({:?})", s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I32(i) => write!(f, "{}", i),
            Value::I64(i) => write!(f, "{}", i),
            Value::F64(fl) => write!(f, "{}", fl),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

// Values are used as group keys, so they need Eq + Hash. Floats compare and
// hash by bit pattern, with -0.0 folded into 0.0.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::I32(i) => i.hash(state),
            Value::I64(i) => i.hash(state),
            Value::F64(f) => {
                let normalized = if *f == 0.0 { 0.0f64 } else { *f };
                normalized.to_bits().hash(state)
            }
            Value::Decimal(d) => d.normalize().hash(state),
            Value::Str(s) => s.hash(state),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    f64 => F64,
    Decimal => Decimal,
    String => Str,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts() {
        assert!(DataType::I64.accepts(&DataType::I32));
        assert!(!DataType::I32.accepts(&DataType::I64));
        assert!(DataType::F64.accepts(&DataType::I32));
        assert!(DataType::Str.accepts(&DataType::Null));
        assert!(!DataType::Str.accepts(&DataType::I32));
    }

    #[test]
    fn test_arithmetic_result() {
        assert_eq!(
            DataType::I32.arithmetic_result(&DataType::I32),
            Some(DataType::I32)
        );
        assert_eq!(
            DataType::I32.arithmetic_result(&DataType::I64),
            Some(DataType::I64)
        );
        assert_eq!(
            DataType::I64.arithmetic_result(&DataType::F64),
            Some(DataType::F64)
        );
        assert_eq!(
            DataType::F64.arithmetic_result(&DataType::Decimal),
            Some(DataType::Decimal)
        );
        assert_eq!(DataType::Str.arithmetic_result(&DataType::I32), None);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::string("a"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let value = Value::string("member1");
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&json).unwrap(), value);
    }
}
