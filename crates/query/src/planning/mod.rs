//! Query and mutation planning

pub mod builder;
pub mod mutation;
pub mod plan;

pub use builder::{Query, QueryBuilder};
pub use mutation::{
    Assignment, Delete, DeleteBuilder, DeletePlan, Update, UpdateBuilder, UpdatePlan,
};
pub use plan::{JoinSpec, QueryPlan};
