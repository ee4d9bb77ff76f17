//! Error types for the query engine

use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Construction errors
    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Function not supported by store: {0}")]
    UnsupportedFunction(String),

    // Result shape errors
    #[error("Expected at most one result, found {0}")]
    TooManyResults(usize),

    #[error("Projection arity mismatch: {0}")]
    ProjectionArityMismatch(String),

    #[error("Projection type mismatch for {field}: expected {expected}, found {found}")]
    ProjectionTypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    // Execution errors
    #[error("Ambiguous ordering: {0}")]
    AmbiguousOrdering(String),

    #[error("Refusing unconditional {operation} on {record_type}")]
    UnsafeUnconditionalMutation {
        operation: &'static str,
        record_type: String,
    },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Kind identifier callers branch on instead of matching error payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedExpression,
    InvalidSchema,
    UnsupportedFunction,
    TooManyResults,
    ProjectionArityMismatch,
    ProjectionTypeMismatch,
    AmbiguousOrdering,
    UnsafeUnconditionalMutation,
    Evaluation,
    StoreUnavailable,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedExpression(_) => ErrorKind::MalformedExpression,
            Error::InvalidSchema(_) => ErrorKind::InvalidSchema,
            Error::UnsupportedFunction(_) => ErrorKind::UnsupportedFunction,
            Error::TooManyResults(_) => ErrorKind::TooManyResults,
            Error::ProjectionArityMismatch(_) => ErrorKind::ProjectionArityMismatch,
            Error::ProjectionTypeMismatch { .. } => ErrorKind::ProjectionTypeMismatch,
            Error::AmbiguousOrdering(_) => ErrorKind::AmbiguousOrdering,
            Error::UnsafeUnconditionalMutation { .. } => ErrorKind::UnsafeUnconditionalMutation,
            Error::Evaluation(_) => ErrorKind::Evaluation,
            Error::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedExpression(message.into())
    }
}

impl From<querykit_value::Error> for Error {
    fn from(err: querykit_value::Error) -> Self {
        Error::Evaluation(err.to_string())
    }
}
