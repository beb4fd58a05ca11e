//! Query execution against the per-path attribute indexes. Leaves resolve
//! to oid sets (equality buckets, range unions); `and` intersects its
//! children smallest-estimated-first and aborts the moment the accumulator
//! is empty; `or` unions. `ne` leaves act as residual filters over the
//! accumulator once one exists, since their complement sets are large.

use crate::attribute_index::AttributeIndex;
use crate::paths::{PathId, PathTable};
use crate::registry::{Registry, SnapshotView};
use dashmap::DashMap;
use quarryql::ast::{ComparisonOperator, Predicate};
use quarryql::selection::filter::evaluate_predicate;
use std::collections::HashSet;

use crate::entity::EntityId;

pub(crate) struct Planner<'a> {
    pub registry: &'a Registry,
    pub paths: &'a PathTable,
    pub attrs: &'a DashMap<PathId, AttributeIndex>,
}

impl Planner<'_> {
    pub fn execute(&self, predicate: &Predicate) -> HashSet<EntityId> {
        match predicate {
            Predicate::Comparison { path, operator, operands } => {
                let Some(path_id) = self.paths.lookup(path) else {
                    return HashSet::new(); // unregistered path matches nothing
                };
                let Some(index) = self.attrs.get(&path_id) else {
                    return HashSet::new();
                };
                match operator {
                    ComparisonOperator::Equal => match operands.first().and_then(|v| index.eq_bucket(v)) {
                        Some(bucket) => (*bucket).clone(),
                        None => HashSet::new(),
                    },
                    ComparisonOperator::In => {
                        let mut out = HashSet::new();
                        for operand in operands {
                            if let Some(bucket) = index.eq_bucket(operand) {
                                out.extend(bucket.iter().copied());
                            }
                        }
                        out
                    }
                    ComparisonOperator::NotEqual => {
                        let mut out = index.resolved_members();
                        if let Some(bucket) = operands.first().and_then(|v| index.eq_bucket(v)) {
                            for id in bucket.iter() {
                                out.remove(id);
                            }
                        }
                        out
                    }
                    _ => index.range_set(*operator, operands),
                }
            }
            Predicate::And(children) => {
                if children.is_empty() {
                    return self.registry.ids();
                }
                let mut ordered: Vec<&Predicate> = children.iter().collect();
                ordered.sort_by_key(|child| self.estimate(child));

                let mut acc: Option<HashSet<EntityId>> = None;
                for child in ordered {
                    let is_residual =
                        matches!(child, Predicate::Comparison { operator: ComparisonOperator::NotEqual, .. });
                    match (&mut acc, is_residual) {
                        (Some(set), true) => set.retain(|id| self.check(*id, child)),
                        (Some(set), false) => {
                            let next = self.execute(child);
                            set.retain(|id| next.contains(id));
                        }
                        (None, _) => acc = Some(self.execute(child)),
                    }
                    if acc.as_ref().is_some_and(HashSet::is_empty) {
                        return HashSet::new();
                    }
                }
                acc.unwrap_or_default()
            }
            Predicate::Or(children) => {
                let mut out = HashSet::new();
                for child in children {
                    out.extend(self.execute(child));
                }
                out
            }
        }
    }

    /// Estimated result size, used only to order `and` children; smallest
    /// first so an empty bucket kills the intersection immediately.
    fn estimate(&self, predicate: &Predicate) -> usize {
        match predicate {
            Predicate::Comparison { path, operator, operands } => {
                let Some(path_id) = self.paths.lookup(path) else {
                    return 0;
                };
                let Some(index) = self.attrs.get(&path_id) else {
                    return 0;
                };
                match operator {
                    ComparisonOperator::Equal => operands.first().map_or(0, |v| index.eq_len(v)),
                    ComparisonOperator::In => operands.iter().map(|v| index.eq_len(v)).sum(),
                    ComparisonOperator::NotEqual => index.member_count(),
                    _ => index.range_len(*operator, operands),
                }
            }
            Predicate::And(children) => children.iter().map(|c| self.estimate(c)).min().unwrap_or(usize::MAX),
            Predicate::Or(children) => children.iter().map(|c| self.estimate(c)).fold(0usize, usize::saturating_add),
        }
    }

    fn check(&self, id: EntityId, predicate: &Predicate) -> bool {
        match self.registry.get(id) {
            Some(record) => {
                let view = SnapshotView { record: record.as_ref(), table: self.paths };
                evaluate_predicate(&view, predicate).unwrap_or(false)
            }
            None => false,
        }
    }
}
