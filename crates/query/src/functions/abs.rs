//! ABS function - returns absolute value

use super::{Function, FunctionRegistry, FunctionSignature};
use crate::error::{Error, Result};
use querykit_value::{DataType, Value};

pub struct AbsFunction;

impl Function for AbsFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "abs",
            min_args: 1,
            max_args: Some(1),
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        // ABS returns the same type as input
        match arg_types[0] {
            t if t.is_numeric() || t.is_null() => Ok(t),
            t => Err(Error::malformed(format!("abs expects a number, found {}", t))),
        }
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        let overflow = || Error::Evaluation("abs overflow".into());
        match &args[0] {
            Value::Null => Ok(Value::Null),
            Value::I32(n) => n.checked_abs().map(Value::I32).ok_or_else(overflow),
            Value::I64(n) => n.checked_abs().map(Value::I64).ok_or_else(overflow),
            Value::F64(n) => Ok(Value::F64(n.abs())),
            Value::Decimal(d) => Ok(Value::Decimal(d.abs())),
            other => Err(Error::Evaluation(format!(
                "abs expects a number, found {}",
                other.type_name()
            ))),
        }
    }
}

/// Register the ABS function
pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Box::new(AbsFunction));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs() {
        let func = AbsFunction;
        assert_eq!(func.execute(&[Value::I32(-20)]).unwrap(), Value::I32(20));
        assert_eq!(func.execute(&[Value::F64(-1.5)]).unwrap(), Value::F64(1.5));
        assert!(func.execute(&[Value::I32(i32::MIN)]).is_err());
        assert!(func.validate(&[DataType::Str]).is_err());
    }
}
