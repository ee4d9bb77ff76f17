//! COALESCE function - returns the first non-NULL value

use super::{Function, FunctionRegistry, FunctionSignature};
use crate::error::{Error, Result};
use querykit_value::{DataType, Value};

pub struct CoalesceFunction;

impl Function for CoalesceFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "coalesce",
            min_args: 1,
            max_args: None,
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        // All arguments must share a common type
        arg_types
            .iter()
            .try_fold(DataType::Null, |acc, t| {
                acc.unify(t).ok_or_else(|| {
                    Error::malformed(format!("coalesce arguments disagree: {} and {}", acc, t))
                })
            })
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null))
    }
}

/// Register the COALESCE function
pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Box::new(CoalesceFunction));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesce() {
        let func = CoalesceFunction;
        assert_eq!(
            func.validate(&[DataType::Str, DataType::Null, DataType::Str])
                .unwrap(),
            DataType::Str
        );
        assert!(func.validate(&[DataType::Str, DataType::I32]).is_err());
        assert_eq!(
            func.execute(&[Value::Null, Value::string("unknown")]).unwrap(),
            Value::string("unknown")
        );
        assert_eq!(func.execute(&[Value::Null]).unwrap(), Value::Null);
    }
}
