//! Conversions between values and Rust types

use crate::error::{Error, Result};
use crate::types::{DataType, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

/// Extract a Rust value out of a [`Value`]
///
/// Implemented for the primitive types backing each [`DataType`], plus
/// `Option<T>` which maps NULL to `None`.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(Error::mismatch(stringify!($ty), other)),
                    }
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    i32 => I32,
    f64 => F64,
    Decimal => Decimal,
    String => Str,
}

// i64 also accepts I32 so counts and ids read naturally
impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::I64(v) => Ok(v),
            Value::I32(v) => Ok(v as i64),
            other => Err(Error::mismatch("i64", other)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl Value {
    /// Convert into `target`, widening freely and narrowing only when the
    /// value fits.
    pub fn coerce_to(self, target: DataType) -> Result<Value> {
        if self.is_null() || self.data_type() == target || target.is_null() {
            return Ok(self);
        }
        let out_of_range = |value: &Value| Error::OutOfRange {
            value: value.to_string(),
            target: target.to_string(),
        };
        match (target, &self) {
            (DataType::I32, Value::I64(n)) => {
                i32::try_from(*n).map(Value::I32).map_err(|_| out_of_range(&self))
            }
            (DataType::I32, Value::F64(f)) if f.fract() == 0.0 => f
                .to_i32()
                .map(Value::I32)
                .ok_or_else(|| out_of_range(&self)),
            (DataType::I32, Value::Decimal(d)) if d.fract().is_zero() => d
                .to_i32()
                .map(Value::I32)
                .ok_or_else(|| out_of_range(&self)),
            (DataType::I64, Value::I32(n)) => Ok(Value::I64(*n as i64)),
            (DataType::I64, Value::F64(f)) if f.fract() == 0.0 => f
                .to_i64()
                .map(Value::I64)
                .ok_or_else(|| out_of_range(&self)),
            (DataType::I64, Value::Decimal(d)) if d.fract().is_zero() => d
                .to_i64()
                .map(Value::I64)
                .ok_or_else(|| out_of_range(&self)),
            (DataType::F64, Value::I32(n)) => Ok(Value::F64(*n as f64)),
            (DataType::F64, Value::I64(n)) => Ok(Value::F64(*n as f64)),
            (DataType::F64, Value::Decimal(d)) => d
                .to_f64()
                .map(Value::F64)
                .ok_or_else(|| out_of_range(&self)),
            (DataType::Decimal, Value::I32(n)) => Ok(Value::Decimal(Decimal::from(*n))),
            (DataType::Decimal, Value::I64(n)) => Ok(Value::Decimal(Decimal::from(*n))),
            (DataType::Decimal, Value::F64(f)) => Decimal::from_f64(*f)
                .map(Value::Decimal)
                .ok_or_else(|| out_of_range(&self)),
            (DataType::Str, _) => Ok(Value::Str(self.to_string())),
            _ => Err(Error::mismatch(target.to_string(), &self)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_from_value() {
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(Value::string("x")).unwrap(),
            Some("x".to_string())
        );
        assert!(String::from_value(Value::Null).is_err());
        assert_eq!(i64::from_value(Value::I32(4)).unwrap(), 4);
    }

    #[test]
    fn test_coerce_narrowing() {
        assert_eq!(Value::I64(20).coerce_to(DataType::I32).unwrap(), Value::I32(20));
        assert!(matches!(
            Value::I64(i64::MAX).coerce_to(DataType::I32),
            Err(Error::OutOfRange { .. })
        ));
        assert!(Value::F64(1.5).coerce_to(DataType::I32).is_err());
        assert!(Value::Bool(true).coerce_to(DataType::I64).is_err());
    }
}
