//! Change accumulation between the resolver (which applies bucket deltas)
//! and the reactor (which routes them to derived views). One buffer is
//! filled per announced attribute write, then dispatched as a single batch.

use crate::entity::EntityId;
use crate::paths::PathId;
use quarryql::ast::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct PathDelta {
    pub removed: Vec<Value>,
    pub added: Vec<Value>,
}

#[derive(Debug, Default)]
pub(crate) struct ChangeBuffer {
    changes: HashMap<(EntityId, PathId), PathDelta>,
}

impl ChangeBuffer {
    pub fn added(&mut self, root: EntityId, path: PathId, value: Value) {
        let delta = self.changes.entry((root, path)).or_default();
        // a key removed and re-added within one batch nets out
        if let Some(pos) = delta.removed.iter().position(|v| *v == value) {
            delta.removed.remove(pos);
        } else {
            delta.added.push(value);
        }
    }

    pub fn removed(&mut self, root: EntityId, path: PathId, value: Value) {
        let delta = self.changes.entry((root, path)).or_default();
        if let Some(pos) = delta.added.iter().position(|v| *v == value) {
            delta.added.remove(pos);
        } else {
            delta.removed.push(value);
        }
    }

    pub fn is_empty(&self) -> bool { self.changes.is_empty() }

    pub fn len(&self) -> usize { self.changes.len() }

    pub fn iter(&self) -> impl Iterator<Item = (&(EntityId, PathId), &PathDelta)> { self.changes.iter() }

    /// Paths touched for `root` that lost at least one key in this batch;
    /// the resolver narrows these down to suffixes that went dangling.
    pub fn paths_with_removals(&self, root: EntityId) -> Vec<PathId> {
        self.changes
            .iter()
            .filter(|((r, _), delta)| *r == root && !delta.removed.is_empty())
            .map(|((_, path), _)| *path)
            .collect()
    }
}
