//! TRIM function - strips leading and trailing whitespace

use super::{Function, FunctionRegistry, FunctionSignature, expect_strings, string_arg};
use crate::error::Result;
use querykit_value::{DataType, Value};

pub struct TrimFunction;

impl Function for TrimFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "trim",
            min_args: 1,
            max_args: Some(1),
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        expect_strings("trim", arg_types)?;
        Ok(DataType::Str)
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        match &args[0] {
            Value::Null => Ok(Value::Null),
            value => Ok(Value::string(string_arg("trim", value)?.trim())),
        }
    }
}

/// Register the TRIM function
pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Box::new(TrimFunction));
}
