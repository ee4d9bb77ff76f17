//! Value-level errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numeric overflow in {0}")]
    Overflow(String),

    #[error("Value {value} out of range for {target}")]
    OutOfRange { value: String, target: String },
}

impl Error {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl std::fmt::Debug) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found: format!("{:?}", found),
        }
    }
}
