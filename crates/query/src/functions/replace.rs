//! REPLACE function - replaces occurrences of a substring

use super::{Function, FunctionRegistry, FunctionSignature, expect_strings, string_arg};
use crate::error::Result;
use querykit_value::{DataType, Value};

pub struct ReplaceFunction;

impl Function for ReplaceFunction {
    fn signature(&self) -> &FunctionSignature {
        static SIGNATURE: FunctionSignature = FunctionSignature {
            name: "replace",
            min_args: 3,
            max_args: Some(3),
        };
        &SIGNATURE
    }

    fn validate(&self, arg_types: &[DataType]) -> Result<DataType> {
        // replace(string, search, replacement)
        expect_strings("replace", arg_types)?;
        Ok(DataType::Str)
    }

    fn execute(&self, args: &[Value]) -> Result<Value> {
        if args.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        let text = string_arg("replace", &args[0])?;
        let search = string_arg("replace", &args[1])?;
        let replacement = string_arg("replace", &args[2])?;

        // An empty search string replaces nothing
        let result = if search.is_empty() {
            text.to_string()
        } else {
            text.replace(search, replacement)
        };
        Ok(Value::string(result))
    }
}

/// Register the REPLACE function
pub fn register(registry: &mut FunctionRegistry) {
    registry.register(Box::new(ReplaceFunction));
}
