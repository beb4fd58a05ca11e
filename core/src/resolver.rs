//! Attribute-graph traversal. Adding an object walks everything reachable
//! through links and files the root under every dotted path the walk
//! produces; a mutation re-walks only the changed subtree, applying
//! set-difference updates to the per-path indexes and the root's snapshot.
//!
//! The reverse dependency graph is the `reach` table: for every entity that
//! appears as a link, the set of (root, prefix) pairs that currently reach
//! it, refcounted by traversal route so list fan-in keeps entries alive
//! until the last route is gone.

use crate::attribute_index::AttributeIndex;
use crate::changes::ChangeBuffer;
use crate::entity::{Entity, EntityId};
use crate::error::IndexError;
use crate::index::{AddOptions, IndexInner};
use crate::paths::{PathId, PathTable};
use crate::property::PropertyValue;
use crate::registry::{CountTransition, Registry};
use dashmap::DashMap;
use quarryql::ast::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Weak;
use tracing::trace;

/// Reverse subscriptions for one linked entity: which (root, prefix) pairs
/// reach it, and through how many routes each.
pub(crate) struct ReachEntry {
    entity: crate::entity::WeakEntity,
    routes: std::collections::HashMap<(EntityId, Option<PathId>), u32>,
}

pub(crate) type ReachTable = DashMap<EntityId, ReachEntry>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Sign {
    Add,
    Remove,
}

pub(crate) struct Resolver<'a> {
    pub index_id: usize,
    pub weak_index: &'a Weak<IndexInner>,
    pub registry: &'a Registry,
    pub paths: &'a PathTable,
    pub attrs: &'a DashMap<PathId, AttributeIndex>,
    pub reach: &'a ReachTable,
}

impl Resolver<'_> {
    /// Track `entity` as a root: discover its attributes and index the
    /// whole reachable graph. Returns false if it is already tracked
    /// (re-adding is a no-op).
    pub fn add_root(&self, entity: &Entity, options: &AddOptions, buffer: &mut ChangeBuffer) -> bool {
        if self.registry.insert(entity).is_none() {
            return false;
        }
        self.link(entity, entity.id(), None, Sign::Add, 1);

        // discovered minus ignored, plus explicitly added; underscore
        // prefixed names never index
        let mut names: BTreeSet<String> =
            entity.attributes().into_iter().map(|(name, _)| name).filter(|name| !name.starts_with('_')).collect();
        for name in &options.ignore_attrs {
            names.remove(name);
        }
        for name in &options.add_attrs {
            if !name.starts_with('_') {
                names.insert(name.clone());
            }
        }

        for name in names {
            let value = entity.get(&name).unwrap_or_else(|| PropertyValue::Value(options.default.clone()));
            let path = self.paths.join(None, &name);
            let mut visited = HashSet::from([entity.id()]);
            self.walk(entity.id(), path, &value, Sign::Add, 1, &mut visited, buffer);
        }
        true
    }

    /// Evict a root: snapshot-driven bucket removal plus teardown of every
    /// reverse subscription rooted at it. Works from ids alone so it also
    /// serves the sweep of dead weak handles.
    pub fn remove_root(&self, id: EntityId, buffer: &mut ChangeBuffer) -> Result<(), IndexError> {
        let record = self.registry.remove(id).ok_or(IndexError::NotTracked(id))?;

        for (path, values) in record.drain_terminals() {
            for value in values {
                self.remove_from_bucket(id, path, &value);
                buffer.removed(id, path, value);
            }
        }

        for reached in record.drain_reached() {
            let Some(mut entry) = self.reach.get_mut(&reached) else {
                continue;
            };
            let keys: Vec<_> = entry.routes.keys().filter(|(root, _)| *root == id).copied().collect();
            let linked = entry.entity.upgrade();
            for key in keys {
                entry.routes.remove(&key);
                if let Some(linked) = &linked {
                    linked.unsubscribe(self.index_id);
                }
            }
            let empty = entry.routes.is_empty();
            drop(entry);
            if empty {
                self.reach.remove_if(&reached, |_, e| e.routes.is_empty());
            }
        }
        Ok(())
    }

    /// React to an announced attribute write on any reached entity (roots
    /// included). For every root that reaches the entity, the old subtree is
    /// retracted before the new one is installed, so no reverse subscription
    /// survives a replaced link.
    pub fn apply_change(
        &self,
        entity: &Entity,
        attr: &str,
        old: Option<&PropertyValue>,
        new: Option<&PropertyValue>,
        buffer: &mut ChangeBuffer,
    ) {
        if attr.starts_with('_') {
            return;
        }
        let targets: Vec<(EntityId, Option<PathId>, u32)> = match self.reach.get(&entity.id()) {
            Some(entry) => entry.routes.iter().map(|((root, prefix), routes)| (*root, *prefix, *routes)).collect(),
            None => return,
        };

        for (root, prefix, routes) in targets {
            let q = self.paths.join(prefix, attr);

            match old {
                None => {
                    // the attribute may have been unset before, leaving a
                    // missing sentinel behind
                    self.terminal(root, q, &Value::Missing, Sign::Remove, routes, buffer);
                    self.retract_missing_extensions(root, q, routes, buffer);
                }
                Some(value) => {
                    let mut visited = HashSet::from([entity.id()]);
                    self.walk(root, q, value, Sign::Remove, routes, &mut visited, buffer);
                    if value.is_scalar() {
                        self.retract_missing_extensions(root, q, routes, buffer);
                    }
                }
            }

            match new {
                None => {
                    self.terminal(root, q, &Value::Missing, Sign::Add, routes, buffer);
                    self.file_missing_for_lost(root, q, routes, buffer);
                }
                Some(value) => {
                    let mut visited = HashSet::from([entity.id()]);
                    self.walk(root, q, value, Sign::Add, routes, &mut visited, buffer);
                    if value.is_scalar() {
                        self.file_missing_for_lost(root, q, routes, buffer);
                    }
                }
            }
        }
    }

    /// Walk a property value at `path`, filing (or retracting) terminals for
    /// `root`. Lists fan out over their elements; links recurse into every
    /// non-underscore attribute. The visited set truncates cycles at the
    /// first revisit: the link itself is filed but its children are not
    /// walked again.
    fn walk(
        &self,
        root: EntityId,
        path: PathId,
        value: &PropertyValue,
        sign: Sign,
        routes: u32,
        visited: &mut HashSet<EntityId>,
        buffer: &mut ChangeBuffer,
    ) {
        match value {
            PropertyValue::Value(v) => self.terminal(root, path, v, sign, routes, buffer),
            PropertyValue::List(items) => {
                for item in items {
                    self.walk(root, path, item, sign, routes, visited, buffer);
                }
            }
            PropertyValue::Entity(child) => {
                self.terminal(root, path, &Value::Ref(child.id().into()), sign, routes, buffer);
                if visited.insert(child.id()) {
                    self.link(child, root, Some(path), sign, routes);
                    for (name, value) in child.attributes() {
                        if name.starts_with('_') {
                            continue;
                        }
                        let sub = self.paths.join(Some(path), &name);
                        self.walk(root, sub, &value, sign, routes, visited, buffer);
                    }
                }
            }
        }
    }

    /// Install or release the reverse subscription for a link: `(root,
    /// prefix)` reaches `child` through one more (or one fewer) route.
    fn link(&self, child: &Entity, root: EntityId, prefix: Option<PathId>, sign: Sign, routes: u32) {
        match sign {
            Sign::Add => {
                let mut entry = self
                    .reach
                    .entry(child.id())
                    .or_insert_with(|| ReachEntry { entity: child.downgrade(), routes: std::collections::HashMap::new() });
                let count = entry.routes.entry((root, prefix)).or_insert(0);
                if *count == 0 {
                    child.subscribe(self.index_id, self.weak_index);
                    if let Some(record) = self.registry.get(root) {
                        record.mark_reached(child.id());
                    }
                }
                *count += routes;
            }
            Sign::Remove => {
                let Some(mut entry) = self.reach.get_mut(&child.id()) else {
                    trace!("release of unknown link {}", child.id());
                    return;
                };
                let Some(count) = entry.routes.get_mut(&(root, prefix)) else {
                    return;
                };
                *count = count.saturating_sub(routes);
                if *count == 0 {
                    entry.routes.remove(&(root, prefix));
                    child.unsubscribe(self.index_id);
                    if !entry.routes.keys().any(|(r, _)| *r == root) {
                        if let Some(record) = self.registry.get(root) {
                            record.unmark_reached(child.id());
                        }
                    }
                }
                let empty = entry.routes.is_empty();
                drop(entry);
                if empty {
                    self.reach.remove_if(&child.id(), |_, e| e.routes.is_empty());
                }
            }
        }
    }

    /// Adjust one terminal in the root's snapshot multiset, and mirror
    /// zero-crossings into the path's attribute index and the change buffer.
    fn terminal(&self, root: EntityId, path: PathId, value: &Value, sign: Sign, routes: u32, buffer: &mut ChangeBuffer) {
        let Some(record) = self.registry.get(root) else {
            return;
        };
        match sign {
            Sign::Add => {
                if record.add_terminal(path, value, routes) == CountTransition::Appeared {
                    self.attrs.entry(path).or_default().insert(root, value);
                    buffer.added(root, path, value.clone());
                }
            }
            Sign::Remove => match record.remove_terminal(path, value, routes) {
                CountTransition::Disappeared => {
                    self.remove_from_bucket(root, path, value);
                    buffer.removed(root, path, value.clone());
                }
                CountTransition::Absent => {
                    trace!("retract of unrecorded terminal {} on {:?}", value, path);
                }
                _ => {}
            },
        }
    }

    fn remove_from_bucket(&self, root: EntityId, path: PathId, value: &Value) {
        let mut empty = false;
        if let Some(mut index) = self.attrs.get_mut(&path) {
            index.remove(root, value);
            empty = index.is_empty();
        }
        if empty {
            self.attrs.remove_if(&path, |_, index| index.is_empty());
        }
    }

    /// A link at `q` was restored (or the scalar that replaced it went
    /// away): retract the missing sentinels its loss had filed on suffix
    /// paths.
    fn retract_missing_extensions(&self, root: EntityId, q: PathId, routes: u32, buffer: &mut ChangeBuffer) {
        let Some(record) = self.registry.get(root) else {
            return;
        };
        for (path, _) in record.missing_extensions(q, self.paths) {
            self.terminal(root, path, &Value::Missing, Sign::Remove, routes, buffer);
        }
    }

    /// The value at `q` became non-traversable: every suffix path that just
    /// lost its last terminal and got nothing back is dangling, so the root
    /// files under the missing sentinel there.
    fn file_missing_for_lost(&self, root: EntityId, q: PathId, routes: u32, buffer: &mut ChangeBuffer) {
        let Some(record) = self.registry.get(root) else {
            return;
        };
        for path in buffer.paths_with_removals(root) {
            if path != q && self.paths.extends(path, q) && !record.has_path(path) {
                self.terminal(root, path, &Value::Missing, Sign::Add, routes, buffer);
            }
        }
    }
}
