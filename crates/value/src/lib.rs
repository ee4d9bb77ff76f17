//! Querykit Value - typed values shared by the query engine and its stores
//!
//! This crate provides the [`Value`] and [`DataType`] definitions together
//! with the arithmetic, comparison and conversion rules every other
//! component relies on.

pub mod convert;
pub mod error;
pub mod evaluator;
pub mod types;

pub use convert::FromValue;
pub use error::{Error, Result};
pub use types::{DataType, Row, Value};
