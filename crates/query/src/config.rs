//! Engine configuration

use serde::{Deserialize, Serialize};

/// What to do when a paged query has no `order_by`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingStrictness {
    /// Log a warning and page in row-identity order
    #[default]
    Warn,
    /// Fail with `AmbiguousOrdering`
    Strict,
}

/// Policy for update/delete plans without a predicate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationGuard {
    /// Mutate every row, logging a warning
    #[default]
    Allow,
    /// Fail with `UnsafeUnconditionalMutation`
    Deny,
}

/// Where NULL sorts when an order spec doesn't say
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullSort {
    /// NULL is the smallest value: first ascending, last descending
    #[default]
    Smallest,
    /// NULL is the largest value: last ascending, first descending
    Largest,
}

/// Query engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Paging without an explicit order
    pub ordering: OrderingStrictness,

    /// Update/delete without a predicate
    pub unconditional_mutation: MutationGuard,

    /// Default null placement for `order_by`
    pub null_sort: NullSort,
}

impl EngineConfig {
    /// Configuration that turns every soft warning into an error
    pub fn strict() -> Self {
        Self {
            ordering: OrderingStrictness::Strict,
            unconditional_mutation: MutationGuard::Deny,
            null_sort: NullSort::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.ordering, OrderingStrictness::Warn);
        assert_eq!(config.unconditional_mutation, MutationGuard::Allow);
        assert_eq!(config.null_sort, NullSort::Smallest);
    }

    #[test]
    fn test_load_partial_json() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "unconditional_mutation": "deny" }"#).unwrap();
        assert_eq!(config.unconditional_mutation, MutationGuard::Deny);
        assert_eq!(config.ordering, OrderingStrictness::Warn);

        let strict: EngineConfig =
            serde_json::from_str(r#"{ "ordering": "strict", "unconditional_mutation": "deny" }"#)
                .unwrap();
        assert_eq!(strict, EngineConfig::strict());
    }
}
