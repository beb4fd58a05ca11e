//! Top-level façade. An `Index` owns the attribute indexes, the object
//! registry, the reverse-subscription graph, and the reactor that keeps
//! derived views live. Tracked user objects are held weakly; their strong
//! handles stay with the caller.

use crate::attribute_index::AttributeIndex;
use crate::changes::ChangeBuffer;
use crate::entity::{Entity, EntityId};
use crate::error::IndexError;
use crate::filtered::FilteredIndex;
use crate::paths::{PathId, PathTable};
use crate::planner::Planner;
use crate::property::PropertyValue;
use crate::reactor::Reactor;
use crate::registry::Registry;
use crate::resolver::{ReachTable, Resolver};
use dashmap::DashMap;
use quarryql::ast::{PathExpr, Predicate, Value};
use quarryql::Q;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

static NEXT_INDEX_ID: AtomicUsize = AtomicUsize::new(0);

/// Attribute discovery refinements for [`Index::add_object_with`]. The
/// indexed set is (discovered non-underscore attributes minus
/// `ignore_attrs`) union `add_attrs`; an added name the object lacks files
/// under `default`.
#[derive(Debug, Clone)]
pub struct AddOptions {
    pub add_attrs: Vec<String>,
    pub ignore_attrs: Vec<String>,
    pub default: Value,
}

impl Default for AddOptions {
    fn default() -> Self { Self { add_attrs: Vec::new(), ignore_attrs: Vec::new(), default: Value::Null } }
}

/// One value (equality) or several (membership) for an attribute lookup.
#[derive(Debug, Clone)]
pub enum QueryArg {
    One(Value),
    Many(Vec<Value>),
}

impl From<Value> for QueryArg {
    fn from(value: Value) -> Self { QueryArg::One(value) }
}
impl From<bool> for QueryArg {
    fn from(value: bool) -> Self { QueryArg::One(value.into()) }
}
impl From<i32> for QueryArg {
    fn from(value: i32) -> Self { QueryArg::One(value.into()) }
}
impl From<i64> for QueryArg {
    fn from(value: i64) -> Self { QueryArg::One(value.into()) }
}
impl From<f64> for QueryArg {
    fn from(value: f64) -> Self { QueryArg::One(value.into()) }
}
impl From<&str> for QueryArg {
    fn from(value: &str) -> Self { QueryArg::One(value.into()) }
}
impl From<String> for QueryArg {
    fn from(value: String) -> Self { QueryArg::One(value.into()) }
}
impl<T: Into<Value>> From<Vec<T>> for QueryArg {
    fn from(values: Vec<T>) -> Self { QueryArg::Many(values.into_iter().map(Into::into).collect()) }
}

#[derive(Clone)]
pub struct Index(pub(crate) Arc<IndexInner>);

impl Default for Index {
    fn default() -> Self { Self::new() }
}

pub(crate) struct IndexInner {
    id: usize,
    weak_self: Weak<IndexInner>,
    pub(crate) registry: Registry,
    pub(crate) paths: PathTable,
    pub(crate) attrs: DashMap<PathId, AttributeIndex>,
    pub(crate) reach: ReachTable,
    pub(crate) reactor: Reactor,
}

impl Index {
    pub fn new() -> Self {
        Self(Arc::new_cyclic(|weak_self| IndexInner {
            id: NEXT_INDEX_ID.fetch_add(1, Ordering::Relaxed),
            weak_self: weak_self.clone(),
            registry: Registry::default(),
            paths: PathTable::default(),
            attrs: DashMap::new(),
            reach: ReachTable::new(),
            reactor: Reactor::new(),
        }))
    }

    /// Track an object: discover its attributes, index the reachable graph,
    /// and subscribe to its changes. Re-adding a tracked object is a no-op.
    pub fn add_object(&self, entity: &Entity) { self.add_object_with(entity, AddOptions::default()) }

    pub fn add_object_with(&self, entity: &Entity, options: AddOptions) {
        let mut buffer = ChangeBuffer::default();
        if !self.0.resolver().add_root(entity, &options, &mut buffer) {
            debug!("add_object: {} already tracked", entity.id());
            return;
        }
        self.0.reactor.notify(&buffer, &self.0.registry, &self.0.paths);
    }

    /// Bulk insert, partitioned across the rayon pool. Fine-grained locking
    /// means concurrent callers (or pool workers) only serialize when they
    /// touch the same attribute bucket.
    pub fn add_object_many(&self, objects: impl IntoIterator<Item = Entity>) {
        let objects: Vec<Entity> = objects.into_iter().collect();
        objects.into_par_iter().for_each(|entity| self.add_object(&entity));
    }

    /// Stop tracking an object and evict every index entry, reverse
    /// subscription, and derived-view membership it holds.
    pub fn remove_object(&self, entity: &Entity) -> Result<(), IndexError> {
        let mut buffer = ChangeBuffer::default();
        self.0.resolver().remove_root(entity.id(), &mut buffer)?;
        self.0.reactor.remove_entity(entity.id());
        Ok(())
    }

    /// All tracked objects still alive. Objects dropped by the caller are
    /// skipped here and reaped by [`Index::sweep`].
    pub fn collect(&self) -> Vec<Entity> { self.0.registry.collect() }

    pub fn len(&self) -> usize { self.0.registry.len() }

    pub fn is_empty(&self) -> bool { self.0.registry.len() == 0 }

    /// Evict entries for tracked objects whose last strong handle is gone.
    pub fn sweep(&self) {
        for id in self.0.registry.dead_ids() {
            let mut buffer = ChangeBuffer::default();
            if self.0.resolver().remove_root(id, &mut buffer).is_ok() {
                self.0.reactor.remove_entity(id);
            }
        }
    }

    /// Equality/membership lookup: every pair must hold, list values mean
    /// "any of". Pairs are intersected in selectivity order.
    pub fn get_by_attribute<P, I>(&self, pairs: I) -> Vec<Entity>
    where
        P: Into<PathExpr>,
        I: IntoIterator<Item = (P, QueryArg)>,
    {
        let ids = self.0.planner().execute(&pairs_predicate(pairs));
        ids.into_iter().filter_map(|id| self.0.registry.get(id).and_then(|r| r.upgrade())).collect()
    }

    /// Live filtered view over equality/membership pairs.
    pub fn reduced<P, I>(&self, pairs: I) -> FilteredIndex
    where
        P: Into<PathExpr>,
        I: IntoIterator<Item = (P, QueryArg)>,
    {
        self.reduced_query(pairs_predicate(pairs))
    }

    /// Live filtered view defined by an arbitrary query expression. The
    /// view's membership tracks the base index until it is dropped.
    pub fn reduced_query(&self, predicate: Predicate) -> FilteredIndex {
        let subscription = {
            let planner = self.0.planner();
            self.0.reactor.subscribe(predicate.clone(), &self.0.paths, || planner.execute(&predicate))
        };
        FilteredIndex::new(self.clone(), subscription)
    }

    /// One live view per distinct terminal currently observed on `path`,
    /// the missing sentinel included. The map itself is a snapshot; each
    /// group stays live.
    pub fn group_by(&self, path: impl Into<PathExpr>) -> HashMap<Value, FilteredIndex> {
        let path = path.into();
        let keys = match self.0.paths.lookup(&path).and_then(|id| self.0.attrs.get(&id)) {
            Some(index) => index.keys(),
            None => return HashMap::new(),
        };
        keys.into_iter().map(|value| (value.clone(), self.reduced_query(Q::eq(path.clone(), value)))).collect()
    }
}

impl IndexInner {
    pub(crate) fn resolver(&self) -> Resolver<'_> {
        Resolver {
            index_id: self.id,
            weak_index: &self.weak_self,
            registry: &self.registry,
            paths: &self.paths,
            attrs: &self.attrs,
            reach: &self.reach,
        }
    }

    pub(crate) fn planner(&self) -> Planner<'_> {
        Planner { registry: &self.registry, paths: &self.paths, attrs: &self.attrs }
    }

    /// Entry point for the observable protocol: an entity we subscribed to
    /// announced `(entity, attr, old, new)` after storing the write.
    pub(crate) fn apply_change(&self, entity: &Entity, attr: &str, old: Option<&PropertyValue>, new: Option<&PropertyValue>) {
        let mut buffer = ChangeBuffer::default();
        self.resolver().apply_change(entity, attr, old, new, &mut buffer);
        self.reactor.notify(&buffer, &self.registry, &self.paths);
    }
}

fn pairs_predicate<P, I>(pairs: I) -> Predicate
where
    P: Into<PathExpr>,
    I: IntoIterator<Item = (P, QueryArg)>,
{
    Predicate::And(
        pairs
            .into_iter()
            .map(|(path, arg)| match arg {
                QueryArg::One(value) => Q::eq(path, value),
                QueryArg::Many(values) => Q::in_(path, values),
            })
            .collect(),
    )
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Index {{ objects: {}, attributes: {} }}", self.0.registry.len(), self.0.attrs.len())
    }
}
