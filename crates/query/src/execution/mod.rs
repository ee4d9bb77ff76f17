//! Plan execution
//!
//! [`Executor`] runs query plans through the select pipeline and hands
//! bulk mutations to the store as [`Mutation`]s.

mod aggregator;
mod executor;
mod expression;
mod join;
mod mutation;
mod order;
mod runtime;
mod select;

pub use executor::{Execution, ExecutionState, Executor};
pub use mutation::Mutation;
