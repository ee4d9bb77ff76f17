//! Join evaluation
//!
//! Sources are joined left to right in plan order: every join widens the
//! current rows by one slot.

use super::expression::is_match;
use super::runtime::{Frame, JoinedRow, Runtime};
use crate::error::{Error, Result};
use crate::planning::plan::{JoinSpec, QueryPlan};
use crate::store::StoredRow;
use crate::types::query::JoinKind;
use querykit_value::{Value, evaluator};
use tracing::trace;

/// Key columns of a relationship join: the owner's reference field and the
/// target's key field.
struct RelationshipKeys {
    owner_slot: usize,
    owner_field: usize,
    target_field: usize,
}

/// NestedLoopJoiner pairs every current row with every row of the joined
/// source and keeps the pairs that satisfy the join condition. Left joins
/// keep unmatched rows with an empty slot.
pub(crate) struct NestedLoopJoiner<'a> {
    rt: &'a Runtime<'a>,
    plan: &'a QueryPlan,
    aliases: &'a [String],
    outer: Option<&'a Frame<'a>>,
}

impl<'a> NestedLoopJoiner<'a> {
    pub fn new(
        rt: &'a Runtime<'a>,
        plan: &'a QueryPlan,
        aliases: &'a [String],
        outer: Option<&'a Frame<'a>>,
    ) -> Self {
        NestedLoopJoiner {
            rt,
            plan,
            aliases,
            outer,
        }
    }

    /// Produce all joined rows, one slot per source.
    pub fn join(&self) -> Result<Vec<JoinedRow>> {
        let width = self.aliases.len();
        let root = self.rt.scan(self.plan.root().record_type().name())?;
        let mut rows: Vec<JoinedRow> = root
            .iter()
            .map(|stored| {
                let mut row = JoinedRow::empty(width);
                row.slots[0] = Some(stored.clone());
                row
            })
            .collect();

        for (i, join) in self.plan.joins().iter().enumerate() {
            rows = self.join_one(rows, i + 1, join)?;
            trace!(
                alias = join.source.alias(),
                kind = ?join.kind,
                rows = rows.len(),
                "joined"
            );
        }
        Ok(rows)
    }

    fn join_one(&self, left: Vec<JoinedRow>, slot: usize, join: &JoinSpec) -> Result<Vec<JoinedRow>> {
        let right = self.rt.scan(join.source.record_type().name())?;
        let keys = self.relationship_keys(join)?;

        let mut joined = Vec::with_capacity(left.len());
        for row in left {
            let mut matched = false;
            for stored in right.iter() {
                let mut candidate = row.clone();
                candidate.slots[slot] = Some(stored.clone());
                if self.matches(join, keys.as_ref(), &candidate, stored)? {
                    joined.push(candidate);
                    matched = true;
                }
            }
            if !matched && join.kind == JoinKind::Left {
                joined.push(row);
            }
        }
        Ok(joined)
    }

    fn matches(
        &self,
        join: &JoinSpec,
        keys: Option<&RelationshipKeys>,
        candidate: &JoinedRow,
        stored: &StoredRow,
    ) -> Result<bool> {
        if let Some(keys) = keys {
            // the owner may itself be an unmatched left join
            let Some(owner) = &candidate.slots[keys.owner_slot] else {
                return Ok(false);
            };
            let owner_key = owner.values.get(keys.owner_field).unwrap_or(&Value::Null);
            let target_key = stored.values.get(keys.target_field).unwrap_or(&Value::Null);
            if evaluator::equals(owner_key, target_key)? != Value::Bool(true) {
                return Ok(false);
            }
        }
        match join.on.expr() {
            Some(condition) => {
                let frame = Frame::new(self.aliases, candidate, self.outer);
                is_match(condition, &frame, self.rt)
            }
            None => Ok(true),
        }
    }

    /// Resolve a relationship join against the relationships the store
    /// declares for the owning record type.
    fn relationship_keys(&self, join: &JoinSpec) -> Result<Option<RelationshipKeys>> {
        let Some(relation) = &join.relation else {
            return Ok(None);
        };
        let owner_slot = self
            .aliases
            .iter()
            .position(|a| a == &relation.alias)
            .ok_or_else(|| Error::malformed(format!("unknown alias in join {}", relation)))?;
        let owner_type = self
            .plan
            .sources()
            .nth(owner_slot)
            .map(|s| s.record_type().name().to_string())
            .unwrap_or_default();

        let declared = self
            .rt
            .store()
            .relationships_of(&owner_type)?
            .into_iter()
            .find(|r| r.field == relation.field)
            .ok_or_else(|| {
                Error::malformed(format!("store declares no relationship {}", relation))
            })?;
        if declared.target.name() != join.source.record_type().name() {
            return Err(Error::malformed(format!(
                "{} references {}, not {}",
                relation,
                declared.target.name(),
                join.source.record_type().name()
            )));
        }
        let (target_field, _) = join
            .source
            .record_type()
            .field(&declared.target_key)
            .ok_or_else(|| {
                Error::malformed(format!(
                    "{} has no key field {}",
                    declared.target.name(),
                    declared.target_key
                ))
            })?;

        Ok(Some(RelationshipKeys {
            owner_slot,
            owner_field: relation.index,
            target_field,
        }))
    }
}
