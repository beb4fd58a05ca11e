//! Live derived views. A `FilteredIndex` is pinned to its base index and a
//! predicate; the base's reactor adjusts its membership on every relevant
//! change. Dropping the last handle releases the subscription and its
//! watchers.

use crate::entity::Entity;
use crate::index::{Index, QueryArg};
use crate::reactor::Subscription;
use quarryql::ast::{PathExpr, Predicate};
use quarryql::Q;
use std::sync::Arc;

#[derive(Clone)]
pub struct FilteredIndex(Arc<FilteredInner>);

struct FilteredInner {
    index: Index,
    subscription: Arc<Subscription>,
}

impl FilteredIndex {
    pub(crate) fn new(index: Index, subscription: Arc<Subscription>) -> Self {
        Self(Arc::new(FilteredInner { index, subscription }))
    }

    /// The query expression defining this view.
    pub fn predicate(&self) -> &Predicate { &self.0.subscription.predicate }

    /// Snapshot of the current members, as live object handles.
    pub fn collect(&self) -> Vec<Entity> {
        let inner = &self.0.index.0;
        self.0
            .subscription
            .members()
            .into_iter()
            .filter_map(|id| inner.registry.get(id).and_then(|record| record.upgrade()))
            .collect()
    }

    pub fn len(&self) -> usize { self.0.subscription.len() }

    pub fn is_empty(&self) -> bool { self.0.subscription.len() == 0 }

    pub fn contains(&self, entity: &Entity) -> bool { self.0.subscription.contains(entity.id()) }

    /// Chain a further query: the new view's predicate is the conjunction of
    /// this view's predicate and `predicate`, subscribed on the same base.
    pub fn reduced_query(&self, predicate: Predicate) -> FilteredIndex {
        self.0.index.reduced_query(Q::and_([self.predicate().clone(), predicate]))
    }

    /// Chain equality/membership pairs, as on [`Index::reduced`].
    pub fn reduced<P, I>(&self, pairs: I) -> FilteredIndex
    where
        P: Into<PathExpr>,
        I: IntoIterator<Item = (P, QueryArg)>,
    {
        let children: Vec<Predicate> = pairs
            .into_iter()
            .map(|(path, arg)| match arg {
                QueryArg::One(value) => Q::eq(path, value),
                QueryArg::Many(values) => Q::in_(path, values),
            })
            .collect();
        self.reduced_query(Predicate::And(children))
    }
}

impl Drop for FilteredInner {
    fn drop(&mut self) { self.index.0.reactor.unsubscribe(&self.subscription, &self.index.0.paths); }
}

impl std::fmt::Debug for FilteredIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FilteredIndex {{ predicate: {}, members: {} }}", self.predicate(), self.len())
    }
}
