//! The reactor keeps derived views live: every filtered index (and each
//! group of a group-by) is a subscription holding a membership set. When the
//! base index applies a change batch, the reactor finds the subscriptions
//! whose comparisons the changed terminals touch, re-evaluates their
//! predicates against the object's last-indexed snapshot, and adjusts
//! membership.

mod comparison_index;

pub(crate) use comparison_index::ComparisonIndex;

use crate::changes::ChangeBuffer;
use crate::entity::EntityId;
use crate::paths::{PathId, PathTable};
use crate::registry::{Registry, SnapshotView};
use dashmap::DashMap;
use quarryql::ast::Predicate;
use quarryql::selection::filter::evaluate_predicate;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SubscriptionId(usize);

impl std::ops::Deref for SubscriptionId {
    type Target = usize;
    fn deref(&self) -> &Self::Target { &self.0 }
}

/// One live derived view: the defining predicate and the set of roots that
/// currently satisfy it.
pub(crate) struct Subscription {
    pub id: SubscriptionId,
    pub predicate: Predicate,
    pub matching: Mutex<HashSet<EntityId>>,
}

impl Subscription {
    pub fn members(&self) -> HashSet<EntityId> { self.matching.lock().unwrap().clone() }

    pub fn contains(&self, id: EntityId) -> bool { self.matching.lock().unwrap().contains(&id) }

    pub fn len(&self) -> usize { self.matching.lock().unwrap().len() }
}

pub(crate) struct Reactor {
    subscriptions: DashMap<SubscriptionId, Arc<Subscription>>,
    /// Per-path watcher index: which subscriptions care when a terminal on
    /// this path changes.
    watchers: DashMap<PathId, ComparisonIndex<SubscriptionId>>,
    /// Subscriptions that currently contain each root, so a change always
    /// reaches the views the object might have to leave.
    entity_watchers: DashMap<EntityId, HashSet<SubscriptionId>>,
    next_sub_id: AtomicUsize,
    /// Serializes notification fan-out and subscription setup so each view
    /// applies one change batch at a time and never misses a write between
    /// its initial scan and its registration.
    notify_lock: Mutex<()>,
}

impl Reactor {
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::new(),
            watchers: DashMap::new(),
            entity_watchers: DashMap::new(),
            next_sub_id: AtomicUsize::new(0),
            notify_lock: Mutex::new(()),
        }
    }

    /// Register a subscription. `initial` computes the starting membership
    /// under the notify lock, so no concurrent write can slip between the
    /// scan and the watcher registration.
    pub fn subscribe<F>(&self, predicate: Predicate, table: &PathTable, initial: F) -> Arc<Subscription>
    where
        F: FnOnce() -> HashSet<EntityId>,
    {
        let _guard = self.notify_lock.lock().unwrap();
        let id = SubscriptionId(self.next_sub_id.fetch_add(1, Ordering::Relaxed));
        let members = initial();

        Self::recurse_predicate(&predicate, &mut |path, operator, operands| {
            self.watchers.entry(table.intern(path)).or_default().add(operator, operands, id);
        });
        for member in &members {
            self.entity_watchers.entry(*member).or_default().insert(id);
        }

        let subscription = Arc::new(Subscription { id, predicate, matching: Mutex::new(members) });
        self.subscriptions.insert(id, subscription.clone());
        tracing::debug!("reactor.subscribe({:?}): {} initial members", id, subscription.len());
        subscription
    }

    /// Remove a subscription and every watcher it registered.
    pub fn unsubscribe(&self, subscription: &Subscription, table: &PathTable) {
        let _guard = self.notify_lock.lock().unwrap();
        let id = subscription.id;
        self.subscriptions.remove(&id);
        Self::recurse_predicate(&subscription.predicate, &mut |path, operator, operands| {
            if let Some(path_id) = table.lookup(path) {
                if let Some(mut index) = self.watchers.get_mut(&path_id) {
                    index.remove(operator, operands, id);
                }
            }
        });
        for member in subscription.matching.lock().unwrap().iter() {
            if let Some(mut watchers) = self.entity_watchers.get_mut(member) {
                watchers.remove(&id);
            }
        }
    }

    pub fn has_subscriptions(&self) -> bool { !self.subscriptions.is_empty() }

    /// Route a change batch to interested subscriptions and adjust their
    /// membership. Candidates are found through the per-path watcher
    /// indexes (old or new terminals touching a registered comparison) and
    /// through current membership; each candidate is confirmed by full
    /// predicate evaluation over the root's snapshot.
    pub fn notify(&self, buffer: &ChangeBuffer, registry: &Registry, table: &PathTable) {
        if buffer.is_empty() || !self.has_subscriptions() {
            return;
        }
        let _guard = self.notify_lock.lock().unwrap();
        tracing::debug!("reactor.notify({} path changes)", buffer.len());

        let mut candidates: HashMap<EntityId, BTreeSet<SubscriptionId>> = HashMap::new();
        for ((root, path), delta) in buffer.iter() {
            let entry = candidates.entry(*root).or_default();
            if let Some(index) = self.watchers.get(path) {
                entry.extend(index.find_matching(delta.removed.iter().chain(delta.added.iter())));
            }
            if let Some(watching) = self.entity_watchers.get(root) {
                entry.extend(watching.iter().copied());
            }
        }

        for (root, subs) in candidates {
            let record = registry.get(root);
            for sub_id in subs {
                let Some(subscription) = self.subscriptions.get(&sub_id).map(|s| s.clone()) else {
                    continue;
                };
                let matched = match &record {
                    Some(record) => {
                        let view = SnapshotView { record: record.as_ref(), table };
                        evaluate_predicate(&view, &subscription.predicate).unwrap_or(false)
                    }
                    None => false,
                };
                self.apply_membership(&subscription, root, matched);
            }
        }
    }

    /// Drop a removed root from every view that contains it.
    pub fn remove_entity(&self, id: EntityId) {
        let _guard = self.notify_lock.lock().unwrap();
        if let Some((_, watching)) = self.entity_watchers.remove(&id) {
            for sub_id in watching {
                if let Some(subscription) = self.subscriptions.get(&sub_id) {
                    subscription.matching.lock().unwrap().remove(&id);
                }
            }
        }
    }

    fn apply_membership(&self, subscription: &Subscription, root: EntityId, matched: bool) {
        let mut matching = subscription.matching.lock().unwrap();
        let had = matching.contains(&root);
        match (had, matched) {
            (false, true) => {
                matching.insert(root);
                self.entity_watchers.entry(root).or_default().insert(subscription.id);
            }
            (true, false) => {
                matching.remove(&root);
                if let Some(mut watchers) = self.entity_watchers.get_mut(&root) {
                    watchers.remove(&subscription.id);
                }
            }
            _ => {}
        }
    }

    fn recurse_predicate<F>(predicate: &Predicate, f: &mut F)
    where
        F: FnMut(&quarryql::ast::PathExpr, quarryql::ast::ComparisonOperator, &[quarryql::ast::Value]),
    {
        match predicate {
            Predicate::Comparison { path, operator, operands } => f(path, *operator, operands),
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    Self::recurse_predicate(child, f);
                }
            }
        }
    }
}
