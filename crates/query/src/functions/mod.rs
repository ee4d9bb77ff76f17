//! Native function definitions and registry
//!
//! Functions are looked up by name when an expression is built. Stores
//! decide separately which of them they allow.

use crate::error::{Error, Result};
use querykit_value::{DataType, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

mod abs;
mod coalesce;
mod length;
mod lower;
mod replace;
mod trim;
mod upper;

/// Metadata about a function's signature
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    /// Function name (lowercase)
    pub name: &'static str,
    pub min_args: usize,
    /// `None` for variadic functions
    pub max_args: Option<usize>,
}

impl FunctionSignature {
    fn check_arity(&self, count: usize) -> Result<()> {
        let too_many = self.max_args.is_some_and(|max| count > max);
        if count < self.min_args || too_many {
            let expected = match self.max_args {
                Some(max) if max == self.min_args => format!("{}", max),
                Some(max) => format!("{} to {}", self.min_args, max),
                None => format!("at least {}", self.min_args),
            };
            return Err(Error::malformed(format!(
                "{} takes {} arguments, got {}",
                self.name, expected, count
            )));
        }
        Ok(())
    }
}

/// A native scalar function
pub trait Function: Send + Sync {
    /// Get the function's signature
    fn signature(&self) -> &FunctionSignature;

    /// Validate argument types and return the result type
    fn validate(&self, arg_types: &[DataType]) -> Result<DataType>;

    /// Execute the function with runtime values
    fn execute(&self, args: &[Value]) -> Result<Value>;
}

/// Registry of all available functions
pub struct FunctionRegistry {
    functions: BTreeMap<&'static str, Box<dyn Function>>,
}

impl FunctionRegistry {
    /// Create a new function registry with all builtin functions
    fn new() -> Self {
        let mut registry = Self {
            functions: BTreeMap::new(),
        };

        // String functions
        replace::register(&mut registry);
        lower::register(&mut registry);
        upper::register(&mut registry);
        length::register(&mut registry);
        trim::register(&mut registry);

        // Type functions
        coalesce::register(&mut registry);

        // Math functions
        abs::register(&mut registry);

        registry
    }

    /// Register a function
    fn register(&mut self, function: Box<dyn Function>) {
        self.functions.insert(function.signature().name, function);
    }
}

// Global static registry
static REGISTRY: LazyLock<FunctionRegistry> = LazyLock::new(FunctionRegistry::new);

/// Look up a function by name
pub fn get_function(name: &str) -> Option<&'static dyn Function> {
    REGISTRY
        .functions
        .get(name.to_lowercase().as_str())
        .map(|f| f.as_ref())
}

/// Names of every registered function
pub fn function_names() -> impl Iterator<Item = &'static str> {
    REGISTRY.functions.keys().copied()
}

/// Validate a call, returning the canonical name and the result type
pub fn validate_function(name: &str, arg_types: &[DataType]) -> Result<(&'static str, DataType)> {
    let func = get_function(name)
        .ok_or_else(|| Error::malformed(format!("Unknown function: {}", name)))?;
    let signature = func.signature();
    signature.check_arity(arg_types.len())?;
    Ok((signature.name, func.validate(arg_types)?))
}

/// Execute a function with runtime values
pub fn execute_function(name: &str, args: &[Value]) -> Result<Value> {
    match get_function(name) {
        Some(func) => func.execute(args),
        None => Err(Error::Evaluation(format!("Unknown function: {}", name))),
    }
}

/// Shared check for functions over string arguments
fn expect_strings(name: &str, arg_types: &[DataType]) -> Result<()> {
    match arg_types
        .iter()
        .find(|t| !matches!(t, DataType::Str | DataType::Null))
    {
        Some(bad) => Err(Error::malformed(format!(
            "{} expects string arguments, found {}",
            name, bad
        ))),
        None => Ok(()),
    }
}

fn string_arg<'a>(name: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::Evaluation(format!("{} expects a string, found {}", name, value)))
}
