//! Tracked-object records. A record exists per root object added to an
//! index and owns the last-indexed terminal multiset for every path
//! registered on it. That multiset is the ground truth for "what keys is
//! this object currently filed under": mutations remove by old terminals
//! and insert by new ones, and derived views re-evaluate predicates against
//! it without touching the user object.

use crate::entity::{Entity, EntityId, WeakEntity};
use crate::paths::{PathId, PathTable};
use dashmap::DashMap;
use quarryql::ast::{PathExpr, Value};
use quarryql::selection::filter::Filterable;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub(crate) struct EntityRecord {
    entity: WeakEntity,
    /// Per-path terminal multiset; counts track fan-out multiplicity so a
    /// root stays filed under a key while any route still produces it.
    paths: Mutex<HashMap<PathId, HashMap<Value, u32>>>,
    /// Every entity this root currently reaches through links (itself
    /// included), for teardown without re-walking the object graph.
    reached: Mutex<HashSet<EntityId>>,
}

/// Outcome of a single terminal count adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CountTransition {
    /// 0 -> n: the root must be filed under the key
    Appeared,
    /// n -> 0: the root must leave the key's bucket
    Disappeared,
    /// count changed without crossing zero
    Unchanged,
    /// removal of a terminal that was not recorded (tolerated; asymmetric
    /// walks around cycles can produce these)
    Absent,
}

impl EntityRecord {
    pub fn new(entity: &Entity) -> Self {
        Self { entity: entity.downgrade(), paths: Mutex::new(HashMap::new()), reached: Mutex::new(HashSet::new()) }
    }

    pub fn upgrade(&self) -> Option<Entity> { self.entity.upgrade() }

    pub fn add_terminal(&self, path: PathId, value: &Value, count: u32) -> CountTransition {
        let mut paths = self.paths.lock().unwrap();
        let entry = paths.entry(path).or_default().entry(value.clone()).or_insert(0);
        let was = *entry;
        *entry += count;
        if was == 0 {
            CountTransition::Appeared
        } else {
            CountTransition::Unchanged
        }
    }

    pub fn remove_terminal(&self, path: PathId, value: &Value, count: u32) -> CountTransition {
        let mut paths = self.paths.lock().unwrap();
        let Some(values) = paths.get_mut(&path) else {
            return CountTransition::Absent;
        };
        let Some(entry) = values.get_mut(value) else {
            return CountTransition::Absent;
        };
        *entry = entry.saturating_sub(count);
        if *entry == 0 {
            values.remove(value);
            if values.is_empty() {
                paths.remove(&path);
            }
            CountTransition::Disappeared
        } else {
            CountTransition::Unchanged
        }
    }

    pub fn has_path(&self, path: PathId) -> bool { self.paths.lock().unwrap().contains_key(&path) }

    /// Paths that currently carry a `Missing` terminal and extend `prefix`.
    pub fn missing_extensions(&self, prefix: PathId, table: &PathTable) -> Vec<(PathId, u32)> {
        let paths = self.paths.lock().unwrap();
        paths
            .iter()
            .filter(|(path, _)| table.extends(**path, prefix))
            .filter_map(|(path, values)| values.get(&Value::Missing).map(|count| (*path, *count)))
            .collect()
    }

    /// Drain every (path, distinct value) pair for full eviction.
    pub fn drain_terminals(&self) -> Vec<(PathId, Vec<Value>)> {
        let mut paths = self.paths.lock().unwrap();
        paths.drain().map(|(path, values)| (path, values.into_keys().collect())).collect()
    }

    pub fn mark_reached(&self, id: EntityId) { self.reached.lock().unwrap().insert(id); }

    pub fn unmark_reached(&self, id: EntityId) { self.reached.lock().unwrap().remove(&id); }

    pub fn drain_reached(&self) -> Vec<EntityId> { self.reached.lock().unwrap().drain().collect() }

    pub fn terminals_for(&self, path: PathId) -> Option<Vec<Value>> {
        let paths = self.paths.lock().unwrap();
        paths.get(&path).map(|values| values.keys().cloned().collect())
    }
}

/// Adapter giving predicate evaluation a view of a record's snapshot.
pub(crate) struct SnapshotView<'a> {
    pub record: &'a EntityRecord,
    pub table: &'a PathTable,
}

impl Filterable for SnapshotView<'_> {
    fn terminals(&self, path: &PathExpr) -> Option<Vec<Value>> {
        let id = self.table.lookup(path)?;
        self.record.terminals_for(id)
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    records: DashMap<EntityId, Arc<EntityRecord>>,
}

impl Registry {
    pub fn insert(&self, entity: &Entity) -> Option<Arc<EntityRecord>> {
        match self.records.entry(entity.id()) {
            dashmap::Entry::Occupied(_) => None,
            dashmap::Entry::Vacant(vacant) => {
                let record = Arc::new(EntityRecord::new(entity));
                vacant.insert(record.clone());
                Some(record)
            }
        }
    }

    pub fn get(&self, id: EntityId) -> Option<Arc<EntityRecord>> { self.records.get(&id).map(|r| r.clone()) }

    pub fn remove(&self, id: EntityId) -> Option<Arc<EntityRecord>> { self.records.remove(&id).map(|(_, r)| r) }

    pub fn contains(&self, id: EntityId) -> bool { self.records.contains_key(&id) }

    pub fn ids(&self) -> HashSet<EntityId> { self.records.iter().map(|r| *r.key()).collect() }

    /// Live root objects. Dead weak handles are skipped here and reaped by
    /// the sweep.
    pub fn collect(&self) -> Vec<Entity> { self.records.iter().filter_map(|r| r.upgrade()).collect() }

    /// Ids whose underlying object has been dropped by the user.
    pub fn dead_ids(&self) -> Vec<EntityId> {
        self.records.iter().filter(|r| r.upgrade().is_none()).map(|r| *r.key()).collect()
    }

    pub fn len(&self) -> usize { self.records.len() }
}
