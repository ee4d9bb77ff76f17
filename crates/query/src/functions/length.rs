//! LENGTH function - number of characters in a string

use super::{Function, FunctionRegistry, FunctionSignature, expect_strings, string_arg};
use crate::error::Result;
use querykit_value::{DataType, Value};

pub struct LengthFunction;

impl Function for LengthFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "length",
            min_args: 1,
            max_args: Some(1),
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        expect_strings("length", arg_types)?;
        Ok(DataType::I32)
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        match &args[0] {
            Value::Null => Ok(Value::Null),
            value => {
                let count = string_arg("length", value)?.chars().count();
                Ok(Value::I32(i32::try_from(count).unwrap_or(i32::MAX)))
            }
        }
    }
}

/// Register the LENGTH function
pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Box::new(LengthFunction));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_counts_characters() {
        let func = LengthFunction;
        assert_eq!(
            func.execute(&[Value::string("member1")]).unwrap(),
            Value::I32(7)
        );
        assert_eq!(func.execute(&[Value::string("회원")]).unwrap(), Value::I32(2));
        assert_eq!(func.execute(&[Value::Null]).unwrap(), Value::Null);
    }
}
